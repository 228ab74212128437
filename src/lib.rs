pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod listing;
pub mod middleware;
pub mod models;
pub mod services;
pub mod uploads;

pub use app::{app, serve, AppState};
