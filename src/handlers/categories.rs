use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{json_body, optional_str, require_str};
use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::models::category::{Category, CategoryWithCount};

/// GET /api/categories. Counts cover active products only.
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let categories: Vec<CategoryWithCount> = sqlx::query_as(
        r#"
        SELECT c.*, COUNT(p.id) AS product_count
        FROM categories c
        LEFT JOIN products p ON p.category_id = c.id AND p.is_active = TRUE
        GROUP BY c.id
        ORDER BY c.name ASC
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({"success": true, "categories": categories})))
}

/// GET /api/categories/:id
pub async fn detail(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Value>> {
    let category: Option<CategoryWithCount> = sqlx::query_as(
        r#"
        SELECT c.*, COUNT(p.id) AS product_count
        FROM categories c
        LEFT JOIN products p ON p.category_id = c.id AND p.is_active = TRUE
        WHERE c.id = $1
        GROUP BY c.id
        "#,
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?;
    let category = category.ok_or_else(|| ApiError::not_found("Category not found"))?;

    Ok(Json(json!({"success": true, "category": category})))
}

/// POST /api/categories. Admin only; names are unique case-insensitively.
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    body: Option<Json<Value>>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    user.require_admin()?;
    let body = json_body(body)?;
    let name = require_str(&body, "name")?;
    let icon = optional_str(&body, "icon");
    let description = optional_str(&body, "description");

    ensure_name_free(&state, &name, None).await?;

    let category: Category = sqlx::query_as(
        "INSERT INTO categories (name, icon, description) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&name)
    .bind(&icon)
    .bind(&description)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(category_id = %category.id, "category created");
    Ok((
        StatusCode::CREATED,
        Json(json!({"success": true, "message": "Category created", "category": category})),
    ))
}

/// PUT /api/categories/:id. Admin only.
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<Json<Value>>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let body = json_body(body)?;
    let name = optional_str(&body, "name");
    let icon = optional_str(&body, "icon");
    let description = optional_str(&body, "description");

    if name.is_none() && icon.is_none() && description.is_none() {
        return Err(ApiError::bad_request("Nothing to update"));
    }
    if let Some(name) = &name {
        ensure_name_free(&state, name, Some(id)).await?;
    }

    let category: Option<Category> = sqlx::query_as(
        r#"
        UPDATE categories SET
            name        = COALESCE($2, name),
            icon        = COALESCE($3, icon),
            description = COALESCE($4, description)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(icon)
    .bind(description)
    .fetch_optional(&state.db)
    .await?;
    let category = category.ok_or_else(|| ApiError::not_found("Category not found"))?;

    Ok(Json(json!({"success": true, "message": "Category updated", "category": category})))
}

/// DELETE /api/categories/:id. Admin only; refused while products still
/// reference the category.
pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;

    let (in_use,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM products WHERE category_id = $1")
            .bind(id)
            .fetch_one(&state.db)
            .await?;
    if in_use > 0 {
        return Err(ApiError::bad_request(format!("Category still has {in_use} products")));
    }

    let deleted = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Category not found"));
    }

    Ok(Json(json!({"success": true, "message": "Category deleted"})))
}

async fn ensure_name_free(
    state: &AppState,
    name: &str,
    exclude: Option<Uuid>,
) -> Result<(), ApiError> {
    let clash: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM categories WHERE LOWER(name) = LOWER($1)")
            .bind(name)
            .fetch_optional(&state.db)
            .await?;

    match clash {
        Some((existing,)) if Some(existing) != exclude => {
            Err(ApiError::bad_request("Category name is already in use"))
        }
        _ => Ok(()),
    }
}
