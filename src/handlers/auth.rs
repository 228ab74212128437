use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use super::{json_body, optional_str, require_str};
use crate::app::AppState;
use crate::auth;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::models::user::User;

const MIN_PASSWORD_LENGTH: usize = 8;

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    body: Option<Json<Value>>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let body = json_body(body)?;
    let username = require_str(&body, "username")?;
    let email = require_str(&body, "email")?.to_lowercase();
    let phone = require_str(&body, "phone")?;
    let password = require_str(&body, "password")?;
    let full_name = optional_str(&body, "full_name");
    let location = optional_str(&body, "location");

    validate_username(&username)?;
    validate_email(&email)?;
    validate_phone(&phone)?;
    validate_password(&password)?;

    let clash: Option<(String, String)> = sqlx::query_as(
        "SELECT username, email FROM users WHERE username = $1 OR email = $2 OR phone = $3 LIMIT 1",
    )
    .bind(&username)
    .bind(&email)
    .bind(&phone)
    .fetch_optional(&state.db)
    .await?;
    if let Some((existing_username, existing_email)) = clash {
        let message = if existing_username == username {
            "Username is already taken"
        } else if existing_email == email {
            "Email is already registered"
        } else {
            "Phone number is already registered"
        };
        return Err(ApiError::bad_request(message));
    }

    let password_hash = auth::hash_password(&password)?;
    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (username, email, phone, password_hash, full_name, location)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(&username)
    .bind(&email)
    .bind(&phone)
    .bind(&password_hash)
    .bind(&full_name)
    .bind(&location)
    .fetch_one(&state.db)
    .await?;

    let token = auth::generate_token(user.id, &user.username, &user.role)?;
    tracing::info!(user_id = %user.id, "account registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Account created",
            "token": token,
            "user": user,
        })),
    ))
}

/// POST /api/auth/login. The identifier may be a username, email, or phone.
pub async fn login(State(state): State<AppState>, body: Option<Json<Value>>) -> ApiResult<Json<Value>> {
    let body = json_body(body)?;
    let identifier = require_str(&body, "identifier")?;
    let password = require_str(&body, "password")?;

    let user: Option<User> =
        sqlx::query_as("SELECT * FROM users WHERE username = $1 OR email = LOWER($1) OR phone = $1")
            .bind(&identifier)
            .fetch_optional(&state.db)
            .await?;

    // Same message for unknown accounts and wrong passwords
    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;
    if !auth::verify_password(&password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = auth::generate_token(user.id, &user.username, &user.role)?;

    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "token": token,
        "user": user,
    })))
}

/// GET /api/auth/profile
pub async fn profile(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Value>> {
    let account: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user.id)
        .fetch_optional(&state.db)
        .await?;
    let account = account.ok_or_else(|| ApiError::not_found("Account no longer exists"))?;

    Ok(Json(json!({"success": true, "user": account})))
}

/// PUT /api/auth/profile
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    body: Option<Json<Value>>,
) -> ApiResult<Json<Value>> {
    let body = json_body(body)?;
    let full_name = optional_str(&body, "full_name");
    let avatar_url = optional_str(&body, "avatar_url");
    let location = optional_str(&body, "location");

    if full_name.is_none() && avatar_url.is_none() && location.is_none() {
        return Err(ApiError::bad_request("Nothing to update"));
    }

    let account: User = sqlx::query_as(
        r#"
        UPDATE users SET
            full_name  = COALESCE($2, full_name),
            avatar_url = COALESCE($3, avatar_url),
            location   = COALESCE($4, location),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(full_name)
    .bind(avatar_url)
    .bind(location)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({"success": true, "message": "Profile updated", "user": account})))
}

/// PUT /api/auth/password
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    body: Option<Json<Value>>,
) -> ApiResult<Json<Value>> {
    let body = json_body(body)?;
    let current = require_str(&body, "current_password")?;
    let new = require_str(&body, "new_password")?;
    validate_password(&new)?;

    let (stored_hash,): (String,) = sqlx::query_as("SELECT password_hash FROM users WHERE id = $1")
        .bind(user.id)
        .fetch_one(&state.db)
        .await?;
    if !auth::verify_password(&current, &stored_hash) {
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }

    let new_hash = auth::hash_password(&new)?;
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(user.id)
        .bind(&new_hash)
        .execute(&state.db)
        .await?;

    tracing::info!(user_id = %user.id, "password changed");
    Ok(Json(json!({"success": true, "message": "Password changed"})))
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.len() < 3 || username.len() > 30 {
        return Err(ApiError::bad_request("Username must be 3 to 30 characters"));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(ApiError::bad_request(
            "Username may only contain letters, numbers, hyphens, and underscores",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    };
    if !well_formed {
        return Err(ApiError::bad_request("Email address is not valid"));
    }
    Ok(())
}

fn validate_phone(phone: &str) -> Result<(), ApiError> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if digits.len() < 9 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::bad_request("Phone number must be 9 to 15 digits"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}
