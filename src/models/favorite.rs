use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Saved-products listing row: the product summary plus when it was saved
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FavoriteProduct {
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
    pub favorited_at: DateTime<Utc>,
}
