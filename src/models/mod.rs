pub mod category;
pub mod favorite;
pub mod message;
pub mod payment;
pub mod product;
pub mod user;
