use axum::Json;
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;

pub mod auth;
pub mod categories;
pub mod messages;
pub mod payments;
pub mod products;
pub mod users;

/// Unwrap an optional JSON body, turning an absent or malformed one into a 400
pub(crate) fn json_body(body: Option<Json<Value>>) -> Result<Value, ApiError> {
    body.map(|Json(v)| v).ok_or_else(|| ApiError::bad_request("A JSON body is required"))
}

/// A required, non-blank string field
pub(crate) fn require_str(body: &Value, field: &str) -> Result<String, ApiError> {
    optional_str(body, field).ok_or_else(|| ApiError::bad_request(format!("{field} is required")))
}

/// An optional string field, treating blank values as absent
pub(crate) fn optional_str(body: &Value, field: &str) -> Option<String> {
    body.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

pub(crate) fn require_uuid(body: &Value, field: &str) -> Result<Uuid, ApiError> {
    let raw = require_str(body, field)?;
    raw.parse().map_err(|_| ApiError::bad_request(format!("{field} must be a valid id")))
}

pub(crate) fn optional_uuid(body: &Value, field: &str) -> Result<Option<Uuid>, ApiError> {
    match optional_str(body, field) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("{field} must be a valid id"))),
        None => Ok(None),
    }
}

/// Accepts JSON numbers as well as numeric strings
pub(crate) fn require_decimal(body: &Value, field: &str) -> Result<Decimal, ApiError> {
    let value = body
        .get(field)
        .filter(|v| !v.is_null())
        .ok_or_else(|| ApiError::bad_request(format!("{field} is required")))?;
    parse_decimal(value).ok_or_else(|| ApiError::bad_request(format!("{field} must be a number")))
}

fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accepts JSON booleans as well as "true"/"false"/"1"/"0" strings
pub(crate) fn optional_bool(body: &Value, field: &str) -> Result<Option<bool>, ApiError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) => match s.trim() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            _ => Err(ApiError::bad_request(format!("{field} must be a boolean"))),
        },
        Some(_) => Err(ApiError::bad_request(format!("{field} must be a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_require_str_rejects_blank_and_missing() {
        let body = json!({"title": "  ", "ok": "radio"});
        assert!(require_str(&body, "title").is_err());
        assert!(require_str(&body, "missing").is_err());
        assert_eq!(require_str(&body, "ok").unwrap(), "radio");
    }

    #[test]
    fn test_optional_str_trims() {
        let body = json!({"location": "  Dar es Salaam  "});
        assert_eq!(optional_str(&body, "location").unwrap(), "Dar es Salaam");
    }

    #[test]
    fn test_require_uuid_rejects_malformed() {
        let id = Uuid::new_v4();
        let body = json!({"good": id.to_string(), "bad": "not-a-uuid"});
        assert_eq!(require_uuid(&body, "good").unwrap(), id);
        assert!(require_uuid(&body, "bad").is_err());
    }

    #[test]
    fn test_require_decimal_accepts_numbers_and_strings() {
        let body = json!({"a": 1500, "b": "1500.50", "c": 12.5, "d": "abc"});
        assert_eq!(require_decimal(&body, "a").unwrap(), Decimal::new(1500, 0));
        assert_eq!(require_decimal(&body, "b").unwrap(), Decimal::new(150050, 2));
        assert_eq!(require_decimal(&body, "c").unwrap(), Decimal::new(125, 1));
        assert!(require_decimal(&body, "d").is_err());
        assert!(require_decimal(&body, "missing").is_err());
    }

    #[test]
    fn test_optional_bool_coerces_strings() {
        let body = json!({"a": true, "b": "false", "c": "1", "d": "maybe"});
        assert_eq!(optional_bool(&body, "a").unwrap(), Some(true));
        assert_eq!(optional_bool(&body, "b").unwrap(), Some(false));
        assert_eq!(optional_bool(&body, "c").unwrap(), Some(true));
        assert!(optional_bool(&body, "d").is_err());
        assert_eq!(optional_bool(&body, "missing").unwrap(), None);
    }
}
