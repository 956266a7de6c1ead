//! Project-specific utilities live here.

use time::OffsetDateTime;
use uuid::Uuid;

/// Fresh, time-ordered record id.
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Trim submitted text, treating blank input as absent.
pub fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Failure message for one field, as reported in validation details.
pub fn field_error(field: &str, message: &str) -> serde_json::Value {
    serde_json::json!({ "field": field, "error": message })
}
