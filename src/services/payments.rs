use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::payment::{Payment, PAYMENT_METHODS, STATUS_CANCELLED, STATUS_COMPLETED, STATUS_PENDING};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("product not found")]
    ProductNotFound,
    #[error("payment not found")]
    PaymentNotFound,
    #[error("cannot buy your own product")]
    OwnProduct,
    #[error("product is no longer available")]
    ProductUnavailable,
    #[error("amount does not match the product price")]
    AmountMismatch,
    #[error("unsupported payment method: {0}")]
    UnsupportedMethod(String),
    #[error("payment reference already in use")]
    ReferenceInUse,
    #[error("only pending payments can be cancelled")]
    NotPending,
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Debug)]
pub struct PaymentRequest {
    pub product_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub phone_number: String,
    pub reference: Option<String>,
}

pub struct PaymentService {
    pool: PgPool,
}

impl PaymentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record and settle a checkout in one transaction. The product comes off
    /// the market in the same commit as the payment rows.
    pub async fn process(
        &self,
        buyer_id: Uuid,
        request: PaymentRequest,
    ) -> Result<Payment, PaymentError> {
        if !PAYMENT_METHODS.contains(&request.payment_method.as_str()) {
            return Err(PaymentError::UnsupportedMethod(request.payment_method.clone()));
        }

        let mut tx = self.pool.begin().await?;

        let product: Option<(Uuid, Decimal, bool)> =
            sqlx::query_as("SELECT user_id, price, is_active FROM products WHERE id = $1")
                .bind(request.product_id)
                .fetch_optional(&mut *tx)
                .await?;
        let (seller_id, price, is_active) = product.ok_or(PaymentError::ProductNotFound)?;

        if seller_id == buyer_id {
            return Err(PaymentError::OwnProduct);
        }
        if !is_active {
            return Err(PaymentError::ProductUnavailable);
        }
        if request.amount != price {
            return Err(PaymentError::AmountMismatch);
        }

        let reference = match request.reference {
            Some(reference) => {
                let (taken,): (bool,) =
                    sqlx::query_as("SELECT EXISTS(SELECT 1 FROM payments WHERE reference = $1)")
                        .bind(&reference)
                        .fetch_one(&mut *tx)
                        .await?;
                if taken {
                    return Err(PaymentError::ReferenceInUse);
                }
                reference
            }
            None => format!("PAY-{}", Uuid::new_v4().simple()),
        };

        let pending: Payment = sqlx::query_as(
            r#"
            INSERT INTO payments (user_id, product_id, amount, payment_method, phone_number, reference, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(buyer_id)
        .bind(request.product_id)
        .bind(request.amount)
        .bind(&request.payment_method)
        .bind(&request.phone_number)
        .bind(&reference)
        .bind(STATUS_PENDING)
        .fetch_one(&mut *tx)
        .await?;

        // Provider integration stays out of this service; settle immediately
        // with a synthetic confirmation code.
        let transaction_id = format!("TXN-{}", Uuid::new_v4().simple());
        let payment: Payment = sqlx::query_as(
            "UPDATE payments SET status = $2, transaction_id = $3, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(pending.id)
        .bind(STATUS_COMPLETED)
        .bind(&transaction_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(request.product_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(payment_id = %payment.id, product_id = %request.product_id, "payment completed");
        Ok(payment)
    }

    /// Cancelling flips the payment to cancelled and puts the product back on
    /// the market, in its own transaction so both land together.
    pub async fn cancel(&self, payment_id: Uuid, caller_id: Uuid) -> Result<Payment, PaymentError> {
        let mut tx = self.pool.begin().await?;

        let payment: Option<Payment> = sqlx::query_as("SELECT * FROM payments WHERE id = $1")
            .bind(payment_id)
            .fetch_optional(&mut *tx)
            .await?;
        let payment = payment.ok_or(PaymentError::PaymentNotFound)?;

        // A stranger's cancel reads as a missing payment, not a forbidden one
        if payment.user_id != caller_id {
            return Err(PaymentError::PaymentNotFound);
        }
        if payment.status != STATUS_PENDING {
            return Err(PaymentError::NotPending);
        }

        let cancelled: Payment = sqlx::query_as(
            "UPDATE payments SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(payment.id)
        .bind(STATUS_CANCELLED)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE products SET is_active = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(payment.product_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(payment_id = %payment.id, "payment cancelled");
        Ok(cancelled)
    }
}
