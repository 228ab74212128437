use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

pub const CONDITIONS: &[&str] = &["new", "like_new", "good", "fair", "poor"];

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub condition: String,
    pub rating: f64,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub views: i32,
    pub is_active: bool,
    pub is_negotiable: bool,
    pub is_hot_sale: bool,
    pub discount_percentage: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductImage {
    pub id: Uuid,
    pub product_id: Uuid,
    pub image_url: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

/// Listing row joined with the seller and category names plus the primary image
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub condition: String,
    pub rating: f64,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub views: i32,
    pub is_active: bool,
    pub is_negotiable: bool,
    pub is_hot_sale: bool,
    pub discount_percentage: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub category_name: Option<String>,
    pub seller_username: String,
    pub primary_image: Option<String>,
}

/// Detail row extends the summary with the seller card fields
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub condition: String,
    pub rating: f64,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub views: i32,
    pub is_active: bool,
    pub is_negotiable: bool,
    pub is_hot_sale: bool,
    pub discount_percentage: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub category_name: Option<String>,
    pub seller_username: String,
    pub seller_avatar_url: Option<String>,
    pub seller_verified: bool,
}
