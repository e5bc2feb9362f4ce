//! Domain modules: thin query builders over the table client.
//!
//! Each module covers one ServiceNow domain (incidents, changes, problems,
//! CMDB, catalog, companies): table constants, the default field list, a
//! closed action enum and the handlers behind `dispatch_action`. All of
//! them funnel through [`SnowClient`](crate::client::SnowClient).

pub mod catalog;
pub mod changes;
pub mod cmdb;
pub mod companies;
pub mod incidents;
pub mod problems;

use serde_json::{Map, Value};

use crate::error::SnowError;

/// Extracts a parameter as a string.
///
/// Numbers and booleans are rendered to their JSON text form so callers
/// can write `{"state": 1}` as well as `{"state": "1"}`.
pub(crate) fn opt_str(params: &Map<String, Value>, key: &str) -> Option<String> {
    match params.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Extracts a parameter as an integer, accepting numeric strings.
pub(crate) fn opt_i64(params: &Map<String, Value>, key: &str) -> Option<i64> {
    match params.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Extracts a parameter as a boolean, accepting `"true"`/`"false"` strings.
pub(crate) fn opt_bool(params: &Map<String, Value>, key: &str) -> Option<bool> {
    match params.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Extracts the required `action` parameter as a non-empty string.
pub(crate) fn require_action(
    params: &Map<String, Value>,
    valid_actions: &str,
) -> Result<String, SnowError> {
    opt_str(params, "action")
        .filter(|a| !a.is_empty())
        .ok_or_else(|| {
            SnowError::validation(format!("action is required. Valid actions: {valid_actions}"))
        })
}

/// Extracts a required, non-empty string parameter.
pub(crate) fn require_str(
    params: &Map<String, Value>,
    key: &str,
    action: &str,
) -> Result<String, SnowError> {
    opt_str(params, key)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SnowError::validation(format!("{key} is required for {action} action")))
}

/// Joins query fragments with `^`, yielding `None` for an empty set.
pub(crate) fn join_query(parts: Vec<String>) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("^"))
    }
}

/// Renders an `active`-style boolean filter value.
pub(crate) fn bool_filter(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Unwraps the `result` array from a list response, defaulting to empty.
pub(crate) fn result_list(response: Value) -> Value {
    match response {
        Value::Object(mut map) => match map.remove("result") {
            Some(list @ Value::Array(_)) => list,
            _ => Value::Array(Vec::new()),
        },
        _ => Value::Array(Vec::new()),
    }
}

/// Unwraps the `result` object from a single-record response, defaulting
/// to an empty object.
pub(crate) fn result_record(response: Value) -> Value {
    match response {
        Value::Object(mut map) => match map.remove("result") {
            Some(record @ Value::Object(_)) => record,
            _ => Value::Object(Map::new()),
        },
        _ => Value::Object(Map::new()),
    }
}

/// Pops the first record off a list response, if any.
pub(crate) fn first_record(response: Value) -> Option<Value> {
    match result_list(response) {
        Value::Array(mut records) if !records.is_empty() => Some(records.remove(0)),
        _ => None,
    }
}

/// Returns true for a missing or empty record object.
pub(crate) fn record_is_empty(record: &Value) -> bool {
    match record {
        Value::Object(map) => map.is_empty(),
        Value::Null => true,
        _ => false,
    }
}
