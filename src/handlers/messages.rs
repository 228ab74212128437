use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{json_body, optional_uuid, require_str, require_uuid};
use crate::app::AppState;
use crate::config::config;
use crate::error::{ApiError, ApiResult};
use crate::listing::ListQuery;
use crate::middleware::AuthUser;
use crate::models::message::{ConversationSummary, Message, MessageWithSender};

const THREAD_DEFAULT_LIMIT: i64 = 50;

const THREAD_SELECT: &str = r#"
    SELECT m.*, u.username AS sender_username
    FROM messages m
    JOIN users u ON u.id = m.sender_id
"#;

const THREAD_COUNT: &str = "SELECT COUNT(*) FROM messages m";

// Latest message per counterpart, with that counterpart's unread tally.
// Messages are flattened to (other_id, row) pairs first so DISTINCT ON can
// pick one row per counterpart regardless of direction.
const CONVERSATIONS_SQL: &str = r#"
    SELECT * FROM (
        SELECT DISTINCT ON (m.other_id)
               m.other_id   AS other_user_id,
               u.username   AS other_username,
               u.avatar_url AS other_avatar_url,
               m.id         AS last_message_id,
               m.content    AS last_message,
               m.sender_id  AS last_sender_id,
               m.created_at AS last_message_at,
               COALESCE(un.unread, 0) AS unread_count
        FROM (
            SELECT *, CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END AS other_id
            FROM messages
            WHERE sender_id = $1 OR receiver_id = $1
        ) m
        JOIN users u ON u.id = m.other_id
        LEFT JOIN (
            SELECT sender_id, COUNT(*) AS unread
            FROM messages
            WHERE receiver_id = $1 AND is_read = FALSE
            GROUP BY sender_id
        ) un ON un.sender_id = m.other_id
        ORDER BY m.other_id, m.created_at DESC
    ) conv
    ORDER BY conv.last_message_at DESC
"#;

/// POST /api/messages. Optionally pinned to a product.
pub async fn send(
    State(state): State<AppState>,
    user: AuthUser,
    body: Option<Json<Value>>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let body = json_body(body)?;
    let receiver_id = require_uuid(&body, "receiver_id")?;
    let content = require_str(&body, "content")?;
    let product_id = optional_uuid(&body, "product_id")?;

    if receiver_id == user.id {
        return Err(ApiError::bad_request("You cannot message yourself"));
    }
    let (receiver_exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(receiver_id)
            .fetch_one(&state.db)
            .await?;
    if !receiver_exists {
        return Err(ApiError::not_found("Receiver not found"));
    }
    if let Some(product_id) = product_id {
        let (product_exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
                .bind(product_id)
                .fetch_one(&state.db)
                .await?;
        if !product_exists {
            return Err(ApiError::not_found("Product not found"));
        }
    }

    let message: Message = sqlx::query_as(
        "INSERT INTO messages (sender_id, receiver_id, product_id, content) \
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(user.id)
    .bind(receiver_id)
    .bind(product_id)
    .bind(&content)
    .fetch_one(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({"success": true, "message": "Message sent", "data": message})),
    ))
}

/// GET /api/messages/conversations. One row per counterpart, newest first.
pub async fn conversations(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Value>> {
    let conversations: Vec<ConversationSummary> =
        sqlx::query_as(CONVERSATIONS_SQL).bind(user.id).fetch_all(&state.db).await?;

    Ok(Json(json!({"success": true, "conversations": conversations})))
}

#[derive(Debug, Default, Deserialize)]
pub struct ThreadFilters {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/messages/conversation/:user_id. Newest page first. Fetching a
/// page marks everything the counterpart has sent as read; the receipts
/// piggyback on the read the client was already making.
pub async fn thread(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
    Query(filters): Query<ThreadFilters>,
) -> ApiResult<Json<Value>> {
    let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(user_id)
        .fetch_one(&state.db)
        .await?;
    if !exists {
        return Err(ApiError::not_found("User not found"));
    }

    let mut query = ListQuery::new();
    let me = query.param(user.id);
    let other = query.param(user_id);
    query.and(format!(
        "((m.sender_id = {me} AND m.receiver_id = {other}) \
          OR (m.sender_id = {other} AND m.receiver_id = {me}))"
    ));
    query.order_by(None, None, &[], "m.created_at");
    query.paginate(filters.page, filters.limit, THREAD_DEFAULT_LIMIT, config().pagination.max_limit);

    let (messages, pagination): (Vec<MessageWithSender>, _) =
        query.fetch_paged(&state.db, THREAD_SELECT, THREAD_COUNT).await?;

    sqlx::query(
        "UPDATE messages SET is_read = TRUE \
         WHERE sender_id = $1 AND receiver_id = $2 AND is_read = FALSE",
    )
    .bind(user_id)
    .bind(user.id)
    .execute(&state.db)
    .await?;

    Ok(Json(json!({"success": true, "messages": messages, "pagination": pagination})))
}

/// GET /api/messages/unread-count
pub async fn unread_count(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Value>> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM messages WHERE receiver_id = $1 AND is_read = FALSE")
            .bind(user.id)
            .fetch_one(&state.db)
            .await?;

    Ok(Json(json!({"success": true, "unread_count": count})))
}

/// PUT /api/messages/:id/read. Only the receiver can mark a message read.
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let updated = sqlx::query("UPDATE messages SET is_read = TRUE WHERE id = $1 AND receiver_id = $2")
        .bind(id)
        .bind(user.id)
        .execute(&state.db)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(ApiError::not_found("Message not found"));
    }

    Ok(Json(json!({"success": true, "message": "Message marked as read"})))
}

/// DELETE /api/messages/:id. Senders can retract their own messages.
pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let deleted = sqlx::query("DELETE FROM messages WHERE id = $1 AND sender_id = $2")
        .bind(id)
        .bind(user.id)
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Message not found"));
    }

    Ok(Json(json!({"success": true, "message": "Message deleted"})))
}
