//! The JSON-over-stdio harness shared by every frost binary.
//!
//! Each domain binary reads one JSON object from stdin, dispatches the
//! requested action against a freshly built [`SnowClient`], and writes the
//! result as pretty-printed JSON to stdout. Failures of any kind are
//! written as a JSON error object to stderr and the process exits 1.
//!
//! Logging goes to stderr: stdout is reserved for the JSON result.

use std::future::Future;
use std::io::Read;

use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use crate::client::SnowClient;
use crate::config::Config;
use crate::domains::require_action;
use crate::error::SnowError;

/// Initializes tracing to stderr with `RUST_LOG`-style filtering.
///
/// Defaults to warnings only so normal runs emit nothing but the JSON
/// result and errors.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("frost=warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

/// Parses CLI input into a parameter map.
///
/// Empty or whitespace-only input yields an empty map. Anything else must
/// be a JSON object.
pub fn parse_params(input: &str) -> Result<Map<String, Value>, SnowError> {
    if input.trim().is_empty() {
        return Ok(Map::new());
    }
    serde_json::from_str(input)
        .map_err(|e| SnowError::validation(format!("Invalid JSON input: {e}")))
}

/// Reads one JSON object from standard input.
pub fn read_json_input() -> Result<Map<String, Value>, SnowError> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| SnowError::validation(format!("Failed to read stdin: {e}")))?;
    parse_params(&input)
}

/// Writes a value as indented JSON to stdout.
pub fn output_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("Failed to serialize output: {e}"),
    }
}

/// Writes an error as indented JSON to stderr.
pub fn output_error(error: &SnowError) {
    let payload = error.to_json();
    match serde_json::to_string_pretty(&payload) {
        Ok(text) => eprintln!("{text}"),
        Err(_) => eprintln!("{{\"error\": \"{}\"}}", error),
    }
}

/// Drives one CLI invocation: read params, build a client, dispatch.
///
/// The `action` parameter is checked before configuration is loaded, so a
/// missing action reports a validation error even when no credentials are
/// set. Returns the process exit code. The dispatch function receives an
/// owned client; each invocation constructs its own, so the cached OAuth
/// token never outlives the run.
pub async fn run<F, Fut>(valid_actions: &str, dispatch: F) -> i32
where
    F: FnOnce(SnowClient, Map<String, Value>) -> Fut,
    Fut: Future<Output = Result<Value, SnowError>>,
{
    let result = match read_json_input() {
        Ok(params) => dispatch_params(valid_actions, params, dispatch).await,
        Err(error) => Err(error),
    };
    match result {
        Ok(result) => {
            output_json(&result);
            0
        }
        Err(error) => {
            output_error(&error);
            1
        }
    }
}

async fn dispatch_params<F, Fut>(
    valid_actions: &str,
    params: Map<String, Value>,
    dispatch: F,
) -> Result<Value, SnowError>
where
    F: FnOnce(SnowClient, Map<String, Value>) -> Fut,
    Fut: Future<Output = Result<Value, SnowError>>,
{
    require_action(&params, valid_actions)?;
    let config = Config::load()?;
    let client = SnowClient::new(config, None)?;
    dispatch(client, params).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_params_empty_input() {
        assert_eq!(parse_params("").unwrap(), Map::new());
        assert_eq!(parse_params("   \n\t  ").unwrap(), Map::new());
    }

    #[test]
    fn test_parse_params_object() {
        let params = parse_params(r#"{"action": "get", "sys_id": "abc"}"#).unwrap();
        assert_eq!(params["action"], "get");
        assert_eq!(params["sys_id"], "abc");
    }

    #[test]
    fn test_parse_params_malformed_json() {
        let err = parse_params("{not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("Invalid JSON input"));
    }

    #[test]
    fn test_parse_params_non_object() {
        let err = parse_params("[1, 2, 3]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("Invalid JSON input"));
    }

    // A missing action must fail validation before any configuration is
    // read, so the error is the same with or without credentials set.
    #[tokio::test]
    async fn test_missing_action_checked_before_config() {
        let err = dispatch_params("get, query", Map::new(), |_client, _params| async {
            panic!("dispatch must not run without an action")
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "action is required. Valid actions: get, query");
    }
}
