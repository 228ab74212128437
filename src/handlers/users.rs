use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{json_body, optional_bool, require_str};
use crate::app::AppState;
use crate::config::config;
use crate::error::{ApiError, ApiResult};
use crate::listing::ListQuery;
use crate::middleware::{AuthUser, MaybeUser};
use crate::models::favorite::FavoriteProduct;
use crate::models::product::ProductSummary;
use crate::models::user::{PublicProfile, User, ROLES};

use super::products::{with_favorites, LIST_COUNT, LIST_SELECT};

const PROFILE_SELECT: &str = r#"
    SELECT u.id, u.username, u.full_name, u.avatar_url, u.location, u.is_verified, u.created_at,
           (SELECT COUNT(*) FROM products p
             WHERE p.user_id = u.id AND p.is_active = TRUE) AS active_products
    FROM users u
    WHERE u.id = $1
"#;

const FAVORITES_SELECT: &str = r#"
    SELECT p.*,
           c.name AS category_name,
           u.username AS seller_username,
           (SELECT pi.image_url FROM product_images pi
             WHERE pi.product_id = p.id
             ORDER BY pi.is_primary DESC, pi.created_at ASC
             LIMIT 1) AS primary_image,
           f.created_at AS favorited_at
    FROM favorites f
    JOIN products p ON p.id = f.product_id
    JOIN users u ON u.id = p.user_id
    LEFT JOIN categories c ON c.id = p.category_id
"#;

const FAVORITES_COUNT: &str = "SELECT COUNT(*) FROM favorites f";

/// GET /api/users/:id. The public seller card.
pub async fn public_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let profile: Option<PublicProfile> =
        sqlx::query_as(PROFILE_SELECT).bind(id).fetch_optional(&state.db).await?;
    let profile = profile.ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(json!({"success": true, "user": profile})))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserProductFilters {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/users/:id/products. Everyone sees the active listings; sellers
/// also see their own inactive ones here.
pub async fn user_products(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<Uuid>,
    Query(filters): Query<UserProductFilters>,
) -> ApiResult<Json<Value>> {
    let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(id)
        .fetch_one(&state.db)
        .await?;
    if !exists {
        return Err(ApiError::not_found("User not found"));
    }

    let mut query = ListQuery::new();
    query.eq("p.user_id", id);
    if viewer.id() != Some(id) {
        query.and("p.is_active = TRUE");
    }
    query.order_by(None, None, &[], "p.created_at");
    let cfg = &config().pagination;
    query.paginate(filters.page, filters.limit, cfg.default_limit, cfg.max_limit);

    let (products, pagination): (Vec<ProductSummary>, _) =
        query.fetch_paged(&state.db, LIST_SELECT, LIST_COUNT).await?;
    let products = with_favorites(&state.db, viewer.id(), products).await?;

    Ok(Json(json!({"success": true, "products": products, "pagination": pagination})))
}

#[derive(Debug, Default, Deserialize)]
pub struct FavoriteFilters {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/users/favorites. The caller's saved products, newest save first.
pub async fn favorites(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filters): Query<FavoriteFilters>,
) -> ApiResult<Json<Value>> {
    let mut query = ListQuery::new();
    query.eq("f.user_id", user.id);
    query.order_by(None, None, &[], "f.created_at");
    let cfg = &config().pagination;
    query.paginate(filters.page, filters.limit, cfg.default_limit, cfg.max_limit);

    let (favorites, pagination): (Vec<FavoriteProduct>, _) =
        query.fetch_paged(&state.db, FAVORITES_SELECT, FAVORITES_COUNT).await?;

    Ok(Json(json!({"success": true, "favorites": favorites, "pagination": pagination})))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserFilters {
    pub search: Option<String>,
    pub role: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/users. Admin account browser.
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filters): Query<UserFilters>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;

    let mut query = ListQuery::new();
    if let Some(term) = filters.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query.search(&["u.username", "u.email", "u.phone"], term);
    }
    if let Some(role) = filters.role.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        if !ROLES.contains(&role) {
            return Err(ApiError::bad_request("Unknown role"));
        }
        query.eq("u.role", role);
    }
    query.order_by(None, None, &[], "u.created_at");
    let cfg = &config().pagination;
    query.paginate(filters.page, filters.limit, cfg.default_limit, cfg.max_limit);

    let (users, pagination): (Vec<User>, _) =
        query.fetch_paged(&state.db, "SELECT u.* FROM users u", "SELECT COUNT(*) FROM users u").await?;

    Ok(Json(json!({"success": true, "users": users, "pagination": pagination})))
}

/// PUT /api/users/:id/role. Admin only.
pub async fn change_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<Json<Value>>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let body = json_body(body)?;
    let role = require_str(&body, "role")?;
    if !ROLES.contains(&role.as_str()) {
        return Err(ApiError::bad_request("Unknown role"));
    }

    let updated: Option<User> = sqlx::query_as(
        "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&role)
    .fetch_optional(&state.db)
    .await?;
    let updated = updated.ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!(user_id = %id, role = %role, "role changed");
    Ok(Json(json!({"success": true, "message": "Role updated", "user": updated})))
}

/// PUT /api/users/:id/verify. Admin only; sets or clears the verified badge.
pub async fn verify(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<Json<Value>>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let body = json_body(body)?;
    let is_verified = optional_bool(&body, "is_verified")?
        .ok_or_else(|| ApiError::bad_request("is_verified is required"))?;

    let updated: Option<User> = sqlx::query_as(
        "UPDATE users SET is_verified = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(is_verified)
    .fetch_optional(&state.db)
    .await?;
    let updated = updated.ok_or_else(|| ApiError::not_found("User not found"))?;

    let message = if is_verified { "User verified" } else { "Verification removed" };
    Ok(Json(json!({"success": true, "message": message, "user": updated})))
}

/// DELETE /api/users/:id. Admin only; listings, payments, messages, and
/// favorites cascade with the account.
pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    if id == user.id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let deleted = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&state.db).await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!(user_id = %id, "account deleted by admin");
    Ok(Json(json!({"success": true, "message": "User deleted"})))
}
