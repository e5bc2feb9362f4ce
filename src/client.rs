//! HTTP client for the ServiceNow Table API.
//!
//! This module provides the `SnowClient` struct: auth header selection,
//! OAuth token caching, request execution and the table-oriented verbs
//! (`get`/`post`/`put`/`patch`/`delete`) the domain modules build on.
//!
//! # Authentication
//!
//! Exactly one scheme is selected per request, by strict precedence:
//! API key (bearer), then OAuth client credentials, then Basic. The OAuth
//! access token is cached on the client and refreshed at most once per
//! request lifecycle, when a 401 arrives while a cached token exists.
//!
//! # Concurrency
//!
//! The client is deliberately not shareable: the cached token is plain
//! mutable state and every verb takes `&mut self`. Construct one client
//! per logical invocation.

use std::time::Duration;

use reqwest::{header, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::SnowError;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// API path prefix for the generic Table API.
pub const TABLE_API_PATH: &str = "/api/now/table";

/// API path prefix for the CMDB instance API variant.
pub const CMDB_INSTANCE_API_PATH: &str = "/api/now/cmdb/instance";

/// Optional parameters for table GET requests.
///
/// Each set field maps to the corresponding `sysparm_*` query parameter;
/// absent fields are omitted entirely. `sys_id` selects the single-record
/// URL instead of contributing a query parameter, and `query` has no
/// effect when `sys_id` is given (the caller's responsibility).
#[derive(Debug, Clone, Default)]
pub struct GetParams {
    /// Target a single record by sys_id.
    pub sys_id: Option<String>,
    /// Encoded query string (`sysparm_query`).
    pub query: Option<String>,
    /// Comma-separated field list (`sysparm_fields`).
    pub fields: Option<String>,
    /// Maximum records to return (`sysparm_limit`).
    pub limit: Option<i64>,
    /// Starting record index (`sysparm_offset`).
    pub offset: Option<i64>,
    /// Sort field, `-` prefix for descending (`sysparm_order_by`).
    pub order_by: Option<String>,
    /// Display value mode: `true`, `false` or `all` (`sysparm_display_value`).
    pub display_value: Option<String>,
}

impl GetParams {
    /// Creates empty parameters (all records, server defaults).
    pub fn new() -> Self {
        Self::default()
    }

    fn to_query(&self) -> Vec<(String, String)> {
        fn set(value: &Option<String>) -> Option<&str> {
            value.as_deref().filter(|s| !s.is_empty())
        }

        let mut query = Vec::new();
        if let Some(q) = set(&self.query) {
            query.push(("sysparm_query".to_string(), q.to_string()));
        }
        if let Some(fields) = set(&self.fields) {
            query.push(("sysparm_fields".to_string(), fields.to_string()));
        }
        if let Some(limit) = self.limit {
            query.push(("sysparm_limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            query.push(("sysparm_offset".to_string(), offset.to_string()));
        }
        if let Some(order_by) = set(&self.order_by) {
            query.push(("sysparm_order_by".to_string(), order_by.to_string()));
        }
        if let Some(dv) = set(&self.display_value) {
            query.push(("sysparm_display_value".to_string(), dv.to_string()));
        }
        query
    }
}

/// Shape of the OAuth token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
}

/// HTTP client for the ServiceNow REST API.
///
/// # Example
///
/// ```ignore
/// let config = Config::load()?;
/// let mut client = SnowClient::new(config, None)?;
///
/// let incidents = client
///     .get("incident", GetParams { query: Some("active=true".into()), ..Default::default() })
///     .await?;
/// ```
pub struct SnowClient {
    /// The underlying HTTP client, built with the resolved timeout.
    http: reqwest::Client,

    /// Resolved configuration.
    /// SECURITY: never log the credential fields.
    config: Config,

    /// Resolved request timeout.
    timeout: Duration,

    /// Cached OAuth access token, set only under the OAuth scheme.
    access_token: Option<String>,

    /// Token type reported by the OAuth endpoint.
    token_type: String,
}

impl SnowClient {
    /// Creates a client from configuration.
    ///
    /// The timeout is resolved by precedence: the explicit `timeout`
    /// argument, then the configured `SERVICENOW_TIMEOUT`, then
    /// [`DEFAULT_TIMEOUT_SECS`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to initialize.
    pub fn new(config: Config, timeout: Option<u64>) -> Result<Self, SnowError> {
        let timeout = Duration::from_secs(
            timeout.or(config.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS),
        );
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SnowError::api(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            config,
            timeout,
            access_token: None,
            token_type: "Bearer".to_string(),
        })
    }

    /// Creates a client by loading configuration from the environment.
    pub fn from_env() -> Result<Self, SnowError> {
        Self::new(Config::load()?, None)
    }

    /// Returns the instance base URL.
    pub fn instance(&self) -> &str {
        &self.config.instance
    }

    /// Returns the resolved request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Builds the full URL for a table or single-record operation.
    pub fn record_url(&self, api_path: &str, table: &str, sys_id: Option<&str>) -> String {
        match sys_id {
            Some(id) => format!("{}{}/{}/{}", self.config.instance, api_path, table, id),
            None => format!("{}{}/{}", self.config.instance, api_path, table),
        }
    }

    /// Produces the Authorization header value for the configured scheme.
    ///
    /// Under OAuth this lazily fetches a token on first use and reuses the
    /// cached one afterwards.
    ///
    /// # Errors
    ///
    /// Returns an authentication error when no scheme is configured or the
    /// OAuth token fetch fails.
    pub async fn auth_header(&mut self) -> Result<String, SnowError> {
        if self.config.has_api_key() {
            let key = self.config.api_key.as_deref().unwrap_or_default();
            return Ok(format!("Bearer {key}"));
        }

        if self.config.has_oauth() {
            if self.access_token.is_none() {
                self.obtain_oauth_token().await?;
            }
            let token = self.access_token.as_deref().unwrap_or_default();
            return Ok(format!("{} {}", self.token_type, token));
        }

        if self.config.has_basic_auth() {
            use base64::engine::general_purpose::STANDARD;
            use base64::Engine;
            let credentials = format!(
                "{}:{}",
                self.config.username.as_deref().unwrap_or_default(),
                self.config.password.as_deref().unwrap_or_default()
            );
            return Ok(format!("Basic {}", STANDARD.encode(credentials)));
        }

        Err(SnowError::authentication(
            "No valid authentication method available",
        ))
    }

    /// Obtains an OAuth access token via the client-credentials flow and
    /// caches it on the client.
    async fn obtain_oauth_token(&mut self) -> Result<(), SnowError> {
        let token_url = format!("{}/oauth_token.do", self.config.instance);
        let form = [
            ("grant_type", "client_credentials"),
            (
                "client_id",
                self.config.client_id.as_deref().unwrap_or_default(),
            ),
            (
                "client_secret",
                self.config.client_secret.as_deref().unwrap_or_default(),
            ),
        ];

        tracing::debug!("Requesting OAuth token");

        let response = self
            .http
            .post(&token_url)
            .header(header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                SnowError::authentication(format!("Failed to connect for OAuth: {e}"))
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(SnowError::authentication(format!(
                "OAuth authentication failed: {}",
                status.canonical_reason().unwrap_or("request rejected")
            ))
            .with_status(status.as_u16())
            .with_body(body));
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            SnowError::authentication(format!("Failed to parse OAuth token response: {e}"))
        })?;

        match token.access_token.filter(|t| !t.is_empty()) {
            Some(access_token) => {
                self.access_token = Some(access_token);
                self.token_type = token.token_type.unwrap_or_else(|| "Bearer".to_string());
                Ok(())
            }
            None => Err(SnowError::authentication(
                "OAuth response did not contain access_token",
            )),
        }
    }

    /// Executes an HTTP request and maps the outcome to the error taxonomy.
    ///
    /// A 401 received while a cached OAuth token exists clears the token
    /// and repeats the request exactly once, preserving the original query
    /// parameters and body. No other retry occurs.
    async fn execute(
        &mut self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        params: &[(String, String)],
    ) -> Result<Value, SnowError> {
        let mut retried = false;
        loop {
            let auth = self.auth_header().await?;

            tracing::debug!(method = %method, url = %url, "ServiceNow API request");

            let mut request = self
                .http
                .request(method.clone(), url)
                .header(header::ACCEPT, "application/json")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, auth);
            if !params.is_empty() {
                request = request.query(&params);
            }
            if let Some(data) = body {
                request = request.json(data);
            }

            let response = request.send().await.map_err(|e| {
                SnowError::api(format!("Failed to connect to ServiceNow: {e}"))
            })?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| SnowError::api(format!("Failed to read response body: {e}")))?;

            if status.is_success() {
                if text.is_empty() {
                    return Ok(Value::Object(Map::new()));
                }
                return serde_json::from_str(&text).map_err(|e| {
                    SnowError::api(format!("Failed to parse response JSON: {e}"))
                });
            }

            if status == StatusCode::UNAUTHORIZED && self.access_token.is_some() && !retried {
                tracing::debug!("401 with cached OAuth token, refreshing and retrying once");
                self.access_token = None;
                retried = true;
                continue;
            }

            return Err(Self::status_error(status, text));
        }
    }

    /// Maps a non-success HTTP status to the error taxonomy, carrying the
    /// status code and raw body.
    fn status_error(status: StatusCode, body: String) -> SnowError {
        let error = match status {
            StatusCode::UNAUTHORIZED => SnowError::authentication("Authentication failed"),
            StatusCode::FORBIDDEN => {
                SnowError::authentication("Access forbidden - insufficient permissions")
            }
            StatusCode::NOT_FOUND => SnowError::not_found("Resource not found"),
            StatusCode::TOO_MANY_REQUESTS => {
                tracing::warn!("Rate limited by ServiceNow");
                SnowError::rate_limit("Rate limit exceeded")
            }
            StatusCode::BAD_REQUEST => SnowError::validation("Invalid request"),
            _ => SnowError::api(format!(
                "API request failed: {}",
                status.canonical_reason().unwrap_or("unknown error")
            )),
        };
        error.with_status(status.as_u16()).with_body(body)
    }

    /// Retrieves records from a table, or a single record when
    /// `params.sys_id` is set.
    pub async fn get(&mut self, table: &str, params: GetParams) -> Result<Value, SnowError> {
        let url = self.record_url(TABLE_API_PATH, table, params.sys_id.as_deref());
        self.execute(Method::GET, &url, None, &params.to_query()).await
    }

    /// Creates a record.
    pub async fn post(
        &mut self,
        table: &str,
        data: &Value,
        display_value: Option<&str>,
    ) -> Result<Value, SnowError> {
        let url = self.record_url(TABLE_API_PATH, table, None);
        self.execute(Method::POST, &url, Some(data), &display_query(display_value))
            .await
    }

    /// Replaces a record (full update).
    pub async fn put(
        &mut self,
        table: &str,
        sys_id: &str,
        data: &Value,
        display_value: Option<&str>,
    ) -> Result<Value, SnowError> {
        let url = self.record_url(TABLE_API_PATH, table, Some(sys_id));
        self.execute(Method::PUT, &url, Some(data), &display_query(display_value))
            .await
    }

    /// Partially updates a record.
    pub async fn patch(
        &mut self,
        table: &str,
        sys_id: &str,
        data: &Value,
        display_value: Option<&str>,
    ) -> Result<Value, SnowError> {
        let url = self.record_url(TABLE_API_PATH, table, Some(sys_id));
        self.execute(Method::PATCH, &url, Some(data), &display_query(display_value))
            .await
    }

    /// Deletes a record. Returns an empty object on success.
    pub async fn delete(&mut self, table: &str, sys_id: &str) -> Result<Value, SnowError> {
        let url = self.record_url(TABLE_API_PATH, table, Some(sys_id));
        self.execute(Method::DELETE, &url, None, &[]).await
    }
}

fn display_query(display_value: Option<&str>) -> Vec<(String, String)> {
    match display_value.filter(|dv| !dv.is_empty()) {
        Some(dv) => vec![("sysparm_display_value".to_string(), dv.to_string())],
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{
        body_json, body_string_contains, header, method, path, query_param,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn base_config(instance: &str) -> Config {
        Config {
            instance: instance.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    fn api_key_config(instance: &str) -> Config {
        Config {
            api_key: Some("key123".to_string()),
            ..base_config(instance)
        }
    }

    fn basic_config(instance: &str) -> Config {
        Config {
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            ..base_config(instance)
        }
    }

    fn oauth_config(instance: &str) -> Config {
        Config {
            client_id: Some("cid".to_string()),
            client_secret: Some("csecret".to_string()),
            ..base_config(instance)
        }
    }

    #[test]
    fn test_record_url() {
        let client = SnowClient::new(api_key_config("https://dev.service-now.com"), None).unwrap();
        assert_eq!(
            client.record_url(TABLE_API_PATH, "incident", None),
            "https://dev.service-now.com/api/now/table/incident"
        );
        assert_eq!(
            client.record_url(TABLE_API_PATH, "incident", Some("abc123")),
            "https://dev.service-now.com/api/now/table/incident/abc123"
        );
        assert_eq!(
            client.record_url(CMDB_INSTANCE_API_PATH, "cmdb_ci_server", None),
            "https://dev.service-now.com/api/now/cmdb/instance/cmdb_ci_server"
        );
    }

    #[test]
    fn test_timeout_precedence() {
        let mut config = api_key_config("https://dev.service-now.com");
        config.timeout = Some(60);

        let explicit = SnowClient::new(config.clone(), Some(5)).unwrap();
        assert_eq!(explicit.timeout(), Duration::from_secs(5));

        let from_config = SnowClient::new(config.clone(), None).unwrap();
        assert_eq!(from_config.timeout(), Duration::from_secs(60));

        config.timeout = None;
        let default = SnowClient::new(config, None).unwrap();
        assert_eq!(default.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_get_params_to_query_omits_absent() {
        let query = GetParams::new().to_query();
        assert!(query.is_empty());

        let query = GetParams {
            query: Some("state=1".to_string()),
            limit: Some(10),
            offset: Some(20),
            ..Default::default()
        }
        .to_query();
        assert_eq!(
            query,
            vec![
                ("sysparm_query".to_string(), "state=1".to_string()),
                ("sysparm_limit".to_string(), "10".to_string()),
                ("sysparm_offset".to_string(), "20".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_auth_method_available() {
        // Bypasses config validation on purpose: the client still refuses
        // to send a request without a usable scheme.
        let mut client = SnowClient::new(base_config("https://dev.service-now.com"), None).unwrap();
        let err = client.get("incident", GetParams::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert!(err.to_string().contains("No valid authentication"));
    }

    #[tokio::test]
    async fn test_api_key_header_takes_precedence() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/incident"))
            .and(header("Authorization", "Bearer key123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [] })))
            .expect(1)
            .mount(&server)
            .await;

        // All three schemes configured; the API key must win.
        let config = Config {
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            client_id: Some("cid".to_string()),
            client_secret: Some("csecret".to_string()),
            ..api_key_config(&server.uri())
        };
        let mut client = SnowClient::new(config, None).unwrap();
        let result = client.get("incident", GetParams::new()).await.unwrap();
        assert_eq!(result, json!({ "result": [] }));
    }

    #[tokio::test]
    async fn test_basic_auth_header() {
        let server = MockServer::start().await;
        // base64("admin:secret")
        Mock::given(method("GET"))
            .and(path("/api/now/table/incident"))
            .and(header("Authorization", "Basic YWRtaW46c2VjcmV0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = SnowClient::new(basic_config(&server.uri()), None).unwrap();
        client.get("incident", GetParams::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_oauth_token_fetched_once_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth_token.do"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=cid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok-1",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/incident"))
            .and(header("Authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [] })))
            .expect(2)
            .mount(&server)
            .await;

        let mut client = SnowClient::new(oauth_config(&server.uri()), None).unwrap();
        client.get("incident", GetParams::new()).await.unwrap();
        // Second call reuses the cached token; the token mock allows one hit.
        client.get("incident", GetParams::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_oauth_token_type_defaults_to_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth_token.do"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "access_token": "tok-2" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/incident"))
            .and(header("Authorization", "Bearer tok-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = SnowClient::new(oauth_config(&server.uri()), None).unwrap();
        client.get("incident", GetParams::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_oauth_missing_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth_token.do"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "scope": "useraccount" })))
            .mount(&server)
            .await;

        let mut client = SnowClient::new(oauth_config(&server.uri()), None).unwrap();
        let err = client.get("incident", GetParams::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert!(err.to_string().contains("access_token"));
    }

    #[tokio::test]
    async fn test_oauth_token_endpoint_failure_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth_token.do"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string(r#"{"error":"invalid_client"}"#),
            )
            .mount(&server)
            .await;

        let mut client = SnowClient::new(oauth_config(&server.uri()), None).unwrap();
        let err = client.get("incident", GetParams::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(err.status_code(), Some(401));
        assert_eq!(err.response_body(), Some(r#"{"error":"invalid_client"}"#));
    }

    #[tokio::test]
    async fn test_oauth_401_retries_exactly_once() {
        let server = MockServer::start().await;
        // Token endpoint answers twice: initial fetch plus the refresh.
        Mock::given(method("POST"))
            .and(path("/oauth_token.do"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "access_token": "tok-3" })),
            )
            .expect(2)
            .mount(&server)
            .await;
        // The table endpoint rejects both attempts; the original query
        // parameters must be preserved on the retry.
        Mock::given(method("GET"))
            .and(path("/api/now/table/incident"))
            .and(query_param("sysparm_query", "state=1"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .expect(2)
            .mount(&server)
            .await;

        let mut client = SnowClient::new(oauth_config(&server.uri()), None).unwrap();
        let err = client
            .get(
                "incident",
                GetParams {
                    query: Some("state=1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(err.status_code(), Some(401));
        assert_eq!(err.response_body(), Some("expired"));
        // Mock expectations assert the 2 + 2 underlying-call accounting.
    }

    #[tokio::test]
    async fn test_basic_auth_401_does_not_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/incident"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = SnowClient::new(basic_config(&server.uri()), None).unwrap();
        let err = client.get("incident", GetParams::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(err.status_code(), Some(401));
    }

    #[tokio::test]
    async fn test_status_code_mapping() {
        let cases = [
            (403, ErrorKind::Authentication),
            (404, ErrorKind::NotFound),
            (429, ErrorKind::RateLimit),
            (400, ErrorKind::Validation),
            (500, ErrorKind::Api),
            (503, ErrorKind::Api),
        ];
        for (status, kind) in cases {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/api/now/table/incident"))
                .respond_with(ResponseTemplate::new(status).set_body_string("details here"))
                .mount(&server)
                .await;

            let mut client = SnowClient::new(api_key_config(&server.uri()), None).unwrap();
            let err = client.get("incident", GetParams::new()).await.unwrap_err();
            assert_eq!(err.kind(), kind, "status {status}");
            assert_eq!(err.status_code(), Some(status));
            assert_eq!(err.response_body(), Some("details here"));
        }
    }

    #[tokio::test]
    async fn test_forbidden_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/incident"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let mut client = SnowClient::new(api_key_config(&server.uri()), None).unwrap();
        let err = client.get("incident", GetParams::new()).await.unwrap_err();
        assert!(err.to_string().contains("forbidden"));
        assert!(err.to_string().contains("insufficient permissions"));
    }

    #[tokio::test]
    async fn test_get_sends_sysparm_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/incident"))
            .and(query_param("sysparm_query", "state=1^active=true"))
            .and(query_param("sysparm_fields", "number,state"))
            .and(query_param("sysparm_limit", "10"))
            .and(query_param("sysparm_offset", "5"))
            .and(query_param("sysparm_order_by", "-opened_at"))
            .and(query_param("sysparm_display_value", "all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = SnowClient::new(api_key_config(&server.uri()), None).unwrap();
        client
            .get(
                "incident",
                GetParams {
                    query: Some("state=1^active=true".to_string()),
                    fields: Some("number,state".to_string()),
                    limit: Some(10),
                    offset: Some(5),
                    order_by: Some("-opened_at".to_string()),
                    display_value: Some("all".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        let record = json!({ "short_description": "Printer on fire" });
        Mock::given(method("POST"))
            .and(path("/api/now/table/incident"))
            .and(body_json(&record))
            .and(query_param("sysparm_display_value", "true"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "result": { "sys_id": "abc" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut client = SnowClient::new(api_key_config(&server.uri()), None).unwrap();
        let result = client.post("incident", &record, Some("true")).await.unwrap();
        assert_eq!(result, json!({ "result": { "sys_id": "abc" } }));
    }

    #[tokio::test]
    async fn test_put_replaces_record() {
        let server = MockServer::start().await;
        let record = json!({ "short_description": "Reimaged", "state": "7" });
        Mock::given(method("PUT"))
            .and(path("/api/now/table/incident/abc123"))
            .and(body_json(&record))
            .and(query_param("sysparm_display_value", "all"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "result": { "state": "7" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut client = SnowClient::new(api_key_config(&server.uri()), None).unwrap();
        let result = client
            .put("incident", "abc123", &record, Some("all"))
            .await
            .unwrap();
        assert_eq!(result, json!({ "result": { "state": "7" } }));
    }

    #[tokio::test]
    async fn test_empty_display_value_omitted_from_query() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/now/table/incident/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": {} })))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = SnowClient::new(api_key_config(&server.uri()), None).unwrap();
        client
            .put("incident", "abc123", &json!({ "state": "7" }), Some(""))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].url.query(), None);
    }

    #[tokio::test]
    async fn test_patch_targets_record_url() {
        let server = MockServer::start().await;
        let update = json!({ "state": "6" });
        Mock::given(method("PATCH"))
            .and(path("/api/now/table/incident/abc123"))
            .and(body_json(&update))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "result": { "state": "6" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut client = SnowClient::new(api_key_config(&server.uri()), None).unwrap();
        client.patch("incident", "abc123", &update, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_empty_body_yields_empty_object() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/now/table/incident/abc123"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = SnowClient::new(api_key_config(&server.uri()), None).unwrap();
        let result = client.delete("incident", "abc123").await.unwrap();
        assert_eq!(result, json!({}));
    }

    #[tokio::test]
    async fn test_connection_failure_message() {
        // Nothing listens on port 9; the connect is refused immediately.
        let mut client = SnowClient::new(api_key_config("http://127.0.0.1:9"), None).unwrap();
        let err = client.get("incident", GetParams::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Api);
        assert!(err.to_string().contains("Failed to connect to ServiceNow"));
    }
}
