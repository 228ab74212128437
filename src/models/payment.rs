use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";
pub const STATUS_CANCELLED: &str = "cancelled";

pub const PAYMENT_STATUSES: &[&str] =
    &[STATUS_PENDING, STATUS_COMPLETED, STATUS_FAILED, STATUS_CANCELLED];

/// Mobile money providers accepted at checkout
pub const PAYMENT_METHODS: &[&str] = &["mpesa", "tigopesa", "airtel_money", "halopesa"];

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub phone_number: String,
    pub reference: String,
    pub status: String,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// History row joined with the product title
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentWithProduct {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub phone_number: String,
    pub reference: String,
    pub status: String,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub product_title: String,
}

/// Detail row also carries the seller id for the visibility check
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub phone_number: String,
    pub reference: String,
    pub status: String,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub product_title: String,
    pub seller_id: Uuid,
}
