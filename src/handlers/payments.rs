use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{json_body, optional_str, require_decimal, require_str, require_uuid};
use crate::app::AppState;
use crate::config::config;
use crate::error::{ApiError, ApiResult};
use crate::listing::ListQuery;
use crate::middleware::AuthUser;
use crate::models::payment::{PaymentDetail, PaymentWithProduct, PAYMENT_STATUSES};
use crate::services::{PaymentRequest, PaymentService};
use uuid::Uuid;

const LIST_SELECT: &str = r#"
    SELECT pay.*, p.title AS product_title
    FROM payments pay
    JOIN products p ON p.id = pay.product_id
"#;

const LIST_COUNT: &str = "SELECT COUNT(*) FROM payments pay";

/// POST /api/payments. Records the checkout and settles it against the
/// simulated mobile money provider.
pub async fn process(
    State(state): State<AppState>,
    user: AuthUser,
    body: Option<Json<Value>>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let body = json_body(body)?;
    let request = PaymentRequest {
        product_id: require_uuid(&body, "product_id")?,
        amount: require_decimal(&body, "amount")?,
        payment_method: require_str(&body, "payment_method")?,
        phone_number: require_str(&body, "phone_number")?,
        reference: optional_str(&body, "reference"),
    };

    let payment = PaymentService::new(state.db.clone()).process(user.id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({"success": true, "message": "Payment completed", "payment": payment})),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentFilters {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/payments. The caller's own history, newest first.
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filters): Query<PaymentFilters>,
) -> ApiResult<Json<Value>> {
    let mut query = ListQuery::new();
    query.eq("pay.user_id", user.id);
    if let Some(status) = filters.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        if !PAYMENT_STATUSES.contains(&status) {
            return Err(ApiError::bad_request("Unknown payment status"));
        }
        query.eq("pay.status", status);
    }
    query.order_by(None, None, &[], "pay.created_at");
    let cfg = &config().pagination;
    query.paginate(filters.page, filters.limit, cfg.default_limit, cfg.max_limit);

    let (payments, pagination): (Vec<PaymentWithProduct>, _) =
        query.fetch_paged(&state.db, LIST_SELECT, LIST_COUNT).await?;

    Ok(Json(json!({"success": true, "payments": payments, "pagination": pagination})))
}

/// GET /api/payments/:id. Visible to the buyer, the seller, and admins;
/// everyone else gets the same 404 as a missing row.
pub async fn detail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let payment: Option<PaymentDetail> = sqlx::query_as(
        r#"
        SELECT pay.*, p.title AS product_title, p.user_id AS seller_id
        FROM payments pay
        JOIN products p ON p.id = pay.product_id
        WHERE pay.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?;
    let payment = payment.ok_or_else(|| ApiError::not_found("Payment not found"))?;

    let visible = payment.user_id == user.id || payment.seller_id == user.id || user.is_admin();
    if !visible {
        return Err(ApiError::not_found("Payment not found"));
    }

    Ok(Json(json!({"success": true, "payment": payment})))
}

/// POST /api/payments/:id/cancel. Pending payments only; puts the product
/// back on the market.
pub async fn cancel(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let payment = PaymentService::new(state.db.clone()).cancel(id, user.id).await?;

    Ok(Json(json!({"success": true, "message": "Payment cancelled", "payment": payment})))
}
