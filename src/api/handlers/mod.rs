//! API handlers and shared utilities.
//!
//! Each resource owns a module; shared helpers for field-keyed validation
//! errors live here.

pub mod auth;
pub mod contracts;
pub mod health;
pub mod roles;
pub mod root;
pub mod transactions;
pub mod users;

use axum::Json;
use serde_json::Value;

/// Build a DRF-style `{"field": ["message", ...]}` error body.
pub(crate) fn field_errors(errors: &[(String, String)]) -> Json<Value> {
    let mut map = serde_json::Map::new();
    for (field, message) in errors {
        let entry = map
            .entry(field.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = entry {
            list.push(Value::String(message.clone()));
        }
    }
    Json(Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_groups_by_field() {
        let errors = vec![
            ("password".to_string(), "Too short.".to_string()),
            ("password".to_string(), "Needs a digit.".to_string()),
            ("email".to_string(), "Invalid.".to_string()),
        ];
        let Json(value) = field_errors(&errors);
        assert_eq!(value["password"].as_array().map(Vec::len), Some(2));
        assert_eq!(value["email"][0], "Invalid.");
    }

    #[test]
    fn field_errors_empty_is_empty_object() {
        let Json(value) = field_errors(&[]);
        assert_eq!(value, serde_json::json!({}));
    }
}
