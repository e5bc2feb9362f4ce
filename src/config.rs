//! Configuration loading for frost.
//!
//! Configuration comes from two layers: an optional `KEY=VALUE` env file
//! (`~/.servicenow/env`, falling back to `./.servicenow/env`) and the
//! process environment. The process environment wins on every recognized
//! key, so a shell override always beats the file.
//!
//! Values in the env file may be wrapped in single or double quotes, with
//! backslash escapes resolved for the quote character, `\\`, `\n`, `\t`
//! and `\r`. Lines without `=`, blank lines and `#` comments are skipped.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SnowError;

/// Environment variables recognized by the config loader.
const RECOGNIZED_KEYS: [&str; 7] = [
    "SERVICENOW_INSTANCE",
    "SERVICENOW_USERNAME",
    "SERVICENOW_PASSWORD",
    "SERVICENOW_CLIENT_ID",
    "SERVICENOW_CLIENT_SECRET",
    "SERVICENOW_API_KEY",
    "SERVICENOW_TIMEOUT",
];

/// Resolved configuration for connecting to a ServiceNow instance.
///
/// `instance` is always present and carries no trailing slash. At least one
/// credential set (username/password, client_id/client_secret, or api_key)
/// is present and non-empty. Presence is a plain non-empty check; a
/// whitespace-only value passes.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Base URL of the ServiceNow instance, without trailing slash.
    pub instance: String,
    /// Username for Basic authentication.
    pub username: Option<String>,
    /// Password for Basic authentication.
    pub password: Option<String>,
    /// OAuth client id for the client-credentials flow.
    pub client_id: Option<String>,
    /// OAuth client secret for the client-credentials flow.
    pub client_secret: Option<String>,
    /// API key, sent as a bearer token. Never log this value.
    pub api_key: Option<String>,
    /// Request timeout in seconds, when configured.
    pub timeout: Option<u64>,
}

impl Config {
    /// Loads configuration from the env file and the process environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the instance URL is missing or
    /// when no authentication scheme is configured.
    pub fn load() -> Result<Self, SnowError> {
        let file_vars = load_env_file(None)?;
        let merged = merge_env_overrides(file_vars, |key| env::var(key).ok());
        Self::from_vars(&merged)
    }

    /// Builds a configuration from an already-merged variable map.
    ///
    /// Separated from [`Config::load`] so validation can be tested without
    /// touching the real process environment.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, SnowError> {
        let get = |key: &str| vars.get(key).cloned();

        let timeout = match get("SERVICENOW_TIMEOUT").filter(|s| !s.is_empty()) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) => Some(secs),
                Err(_) => {
                    tracing::warn!(
                        value = %raw,
                        "Invalid SERVICENOW_TIMEOUT value, using default"
                    );
                    None
                }
            },
            None => None,
        };

        let instance = match get("SERVICENOW_INSTANCE").filter(|s| !s.is_empty()) {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                return Err(SnowError::configuration(
                    "SERVICENOW_INSTANCE is required. Set it in ~/.servicenow/env \
                     or as an environment variable.",
                ));
            }
        };

        let config = Config {
            instance,
            username: get("SERVICENOW_USERNAME"),
            password: get("SERVICENOW_PASSWORD"),
            client_id: get("SERVICENOW_CLIENT_ID"),
            client_secret: get("SERVICENOW_CLIENT_SECRET"),
            api_key: get("SERVICENOW_API_KEY"),
            timeout,
        };

        if !(config.has_basic_auth() || config.has_oauth() || config.has_api_key()) {
            return Err(SnowError::configuration(
                "No valid authentication configured. Provide either:\n\
                 \x20 - SERVICENOW_USERNAME and SERVICENOW_PASSWORD for Basic auth\n\
                 \x20 - SERVICENOW_CLIENT_ID and SERVICENOW_CLIENT_SECRET for OAuth\n\
                 \x20 - SERVICENOW_API_KEY for API key authentication",
            ));
        }

        Ok(config)
    }

    /// Returns true when both Basic auth credentials are set and non-empty.
    pub fn has_basic_auth(&self) -> bool {
        is_present(&self.username) && is_present(&self.password)
    }

    /// Returns true when both OAuth credentials are set and non-empty.
    pub fn has_oauth(&self) -> bool {
        is_present(&self.client_id) && is_present(&self.client_secret)
    }

    /// Returns true when an API key is set and non-empty.
    pub fn has_api_key(&self) -> bool {
        is_present(&self.api_key)
    }
}

fn is_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.is_empty())
}

/// Overlays process-environment values onto file-sourced values.
///
/// The lookup closure stands in for `std::env::var` in tests. An override
/// applies whenever the variable is set, even to an empty string.
pub(crate) fn merge_env_overrides(
    file_vars: HashMap<String, String>,
    lookup: impl Fn(&str) -> Option<String>,
) -> HashMap<String, String> {
    let mut merged = file_vars;
    for key in RECOGNIZED_KEYS {
        if let Some(value) = lookup(key) {
            merged.insert(key.to_string(), value);
        }
    }
    merged
}

/// Loads `KEY=VALUE` pairs from the first existing env file.
///
/// With no explicit path, searches `~/.servicenow/env` then
/// `./.servicenow/env`; the first file found wins, and a missing file
/// yields an empty map. Only the first `=` on a line separates key from
/// value; later `=` characters belong to the value.
pub fn load_env_file(env_path: Option<&Path>) -> Result<HashMap<String, String>, SnowError> {
    let search_paths: Vec<PathBuf> = match env_path {
        Some(path) => vec![path.to_path_buf()],
        None => {
            let mut paths = Vec::new();
            if let Some(home) = dirs::home_dir() {
                paths.push(home.join(".servicenow").join("env"));
            }
            paths.push(PathBuf::from(".servicenow").join("env"));
            paths
        }
    };

    let mut vars = HashMap::new();
    for path in search_paths {
        if !path.exists() {
            continue;
        }
        let contents = fs::read_to_string(&path).map_err(|e| {
            SnowError::configuration(format!(
                "Failed to read env file {}: {}",
                path.display(),
                e
            ))
        })?;
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                vars.insert(key.trim().to_string(), parse_env_value(value));
            }
        }
        break; // first found file wins
    }

    Ok(vars)
}

/// Strips matching quotes from an env-file value and resolves escapes.
///
/// Quoted values support `\<quote>`, `\\`, `\n`, `\t` and `\r`. Unknown
/// escape sequences are kept verbatim, and unquoted values pass through
/// untouched apart from whitespace trimming.
fn parse_env_value(raw: &str) -> String {
    let value = raw.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return unescape(&value[1..value.len() - 1], quote);
        }
    }
    value.to_string()
}

fn unescape(inner: &str, quote: char) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(c) if c == quote => out.push(quote),
            Some(c) => {
                out.push('\\');
                out.push(c);
            }
            None => out.push('\\'),
        }
    }
    out
}
