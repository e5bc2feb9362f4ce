//! Error types for frost.
//!
//! This module defines `SnowError`, the unified error type used throughout
//! the crate. Every error carries a human-readable message plus an error
//! kind used for dispatch. Errors that originate from an HTTP response
//! also carry the numeric status code and the raw response body.
//!
//! At the CLI boundary the error serializes to a JSON object via
//! [`SnowError::to_json`], which is what the domain binaries print to
//! stderr before exiting non-zero.

use serde_json::{json, Value};
use thiserror::Error;

/// Semantic classification of a [`SnowError`].
///
/// The kind decides how the error is reported and whether the request
/// executor treats it specially (the single OAuth 401 refresh).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Required configuration is missing or invalid.
    Configuration,
    /// Authentication failed: no usable credentials, OAuth failure, 401/403.
    Authentication,
    /// Bad input: malformed CLI JSON, missing parameter, unknown action, HTTP 400.
    Validation,
    /// Requested resource does not exist (HTTP 404).
    NotFound,
    /// API rate limit exceeded (HTTP 429).
    RateLimit,
    /// Any other API or transport failure.
    Api,
}

/// Unified error type for all frost operations.
///
/// The message alone is the display form; status code and response body are
/// diagnostic payload surfaced through [`SnowError::to_json`].
#[derive(Error, Debug)]
#[error("{message}")]
pub struct SnowError {
    kind: ErrorKind,
    message: String,
    status_code: Option<u16>,
    response_body: Option<String>,
}

impl SnowError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        SnowError {
            kind,
            message: message.into(),
            status_code: None,
            response_body: None,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Creates a rate-limit error.
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimit, message)
    }

    /// Creates a generic API error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Api, message)
    }

    /// Attaches the HTTP status code this error originated from.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Attaches the raw response body, captured once at error time.
    ///
    /// Empty bodies are dropped so the serialized error stays compact.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        let body = body.into();
        if !body.is_empty() {
            self.response_body = Some(body);
        }
        self
    }

    /// Returns the semantic kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status code, if the error came from a response.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Returns the raw response body, if one was captured.
    pub fn response_body(&self) -> Option<&str> {
        self.response_body.as_deref()
    }

    /// Serializes the error for the CLI boundary.
    ///
    /// Always contains `error`; `status_code` and `details` are included
    /// when present. The response body is parsed as JSON when possible,
    /// otherwise included as a raw string.
    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("error".to_string(), json!(self.message));
        if let Some(status) = self.status_code {
            map.insert("status_code".to_string(), json!(status));
        }
        if let Some(body) = &self.response_body {
            let details = serde_json::from_str::<Value>(body)
                .unwrap_or_else(|_| Value::String(body.clone()));
            map.insert("details".to_string(), details);
        }
        Value::Object(map)
    }
}
