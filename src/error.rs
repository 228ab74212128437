// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::is_development;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 500 Internal Server Error
    Internal(String),
}

/// Handler result that renders errors through the shared response envelope
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the raw error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Internal(msg) => msg,
        }
    }

    /// Get the client-safe error message. Internal details only leak in development.
    pub fn public_message(&self) -> &str {
        match self {
            ApiError::Internal(msg) if is_development!() => msg,
            ApiError::Internal(_) => "An internal error occurred",
            other => other.message(),
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "success": false,
            "error": self.public_message(),
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

// Convert other error types to ApiError
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::not_found("Resource not found"),
            other => {
                // Log the real error but return a generic message
                tracing::error!("SQLx error: {}", other);
                ApiError::internal(format!("Database error: {}", other))
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {}", err);
        ApiError::internal("Failed to format response")
    }
}

impl From<crate::auth::AuthError> for ApiError {
    fn from(err: crate::auth::AuthError) -> Self {
        match err {
            crate::auth::AuthError::InvalidToken | crate::auth::AuthError::ExpiredToken => {
                ApiError::unauthorized("Invalid or expired token")
            }
            crate::auth::AuthError::TokenCreation(msg) => {
                tracing::error!("JWT creation error: {}", msg);
                ApiError::internal("Failed to issue token")
            }
            crate::auth::AuthError::Hash(e) => {
                tracing::error!("bcrypt error: {}", e);
                ApiError::internal("Failed to process credentials")
            }
        }
    }
}

impl From<crate::uploads::UploadError> for ApiError {
    fn from(err: crate::uploads::UploadError) -> Self {
        match err {
            crate::uploads::UploadError::Io(e) => {
                tracing::error!("Upload I/O error: {}", e);
                ApiError::internal("Failed to store uploaded file")
            }
            other => ApiError::bad_request(other.to_string()),
        }
    }
}

impl From<crate::services::products::ProductError> for ApiError {
    fn from(err: crate::services::products::ProductError) -> Self {
        match err {
            crate::services::products::ProductError::NotFound => {
                ApiError::not_found("Product not found")
            }
            crate::services::products::ProductError::Forbidden => {
                ApiError::forbidden("You do not have permission to modify this product")
            }
            crate::services::products::ProductError::UnknownCategory => {
                ApiError::bad_request("Unknown category")
            }
            crate::services::products::ProductError::Db(e) => e.into(),
        }
    }
}

impl From<crate::services::payments::PaymentError> for ApiError {
    fn from(err: crate::services::payments::PaymentError) -> Self {
        use crate::services::payments::PaymentError;
        match err {
            PaymentError::ProductNotFound => ApiError::not_found("Product not found"),
            PaymentError::PaymentNotFound => ApiError::not_found("Payment not found"),
            PaymentError::OwnProduct => {
                ApiError::forbidden("You cannot buy your own product")
            }
            PaymentError::ProductUnavailable => {
                ApiError::bad_request("Product is no longer available")
            }
            PaymentError::AmountMismatch => {
                ApiError::bad_request("Payment amount does not match the product price")
            }
            PaymentError::UnsupportedMethod(m) => {
                ApiError::bad_request(format!("Unsupported payment method: {}", m))
            }
            PaymentError::ReferenceInUse => {
                ApiError::bad_request("Payment reference is already in use")
            }
            PaymentError::NotPending => {
                ApiError::bad_request("Only pending payments can be cancelled")
            }
            PaymentError::Db(e) => e.into(),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
