//! # Frost
//!
//! Frost is a CLI toolkit for the ServiceNow Table API.
//!
//! It ships one binary per ITSM domain (incidents, change requests,
//! problems, CMDB, service catalog, companies). Each binary reads a single
//! JSON object from stdin describing an action, performs the corresponding
//! Table API calls, and writes the result as pretty-printed JSON to stdout.
//! Errors go to stderr as JSON with exit code 1, so the binaries compose
//! cleanly in pipelines and automation.
//!
//! ## Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`config`] - Configuration from `~/.servicenow/env` files and the
//!   process environment
//! - [`error`] - The [`SnowError`](error::SnowError) type and its JSON
//!   rendering for the CLI boundary
//! - [`client`] - HTTP client for the Table API with API key, OAuth, and
//!   basic authentication
//! - [`cli`] - stdin/stdout plumbing shared by every binary
//! - [`domains`] - per-domain action dispatchers
//!
//! ## Usage
//!
//! ```bash
//! # Look up an incident by number
//! echo '{"action": "get_by_number", "number": "INC0010001"}' | frost-incidents
//!
//! # Query operational servers
//! echo '{"action": "query", "ci_class": "cmdb_ci_server", "operational_status": "1"}' | frost-cmdb
//! ```
//!
//! ## Configuration
//!
//! Frost reads `SERVICENOW_*` variables from `~/.servicenow/env` (then
//! `./.servicenow/env`), with process environment variables taking
//! precedence:
//!
//! - `SERVICENOW_INSTANCE`: instance URL (required)
//! - `SERVICENOW_API_KEY`: API key for bearer authentication
//! - `SERVICENOW_CLIENT_ID` / `SERVICENOW_CLIENT_SECRET`: OAuth client
//!   credentials
//! - `SERVICENOW_USERNAME` / `SERVICENOW_PASSWORD`: basic authentication
//! - `SERVICENOW_TIMEOUT`: request timeout in seconds (default 30)
//!
//! When several credential sets are present, the API key wins over OAuth,
//! which wins over basic authentication.
//!
//! ## Example
//!
//! Using the [`SnowClient`](client::SnowClient) directly:
//!
//! ```ignore
//! use frost::client::{GetParams, SnowClient};
//!
//! async fn example() -> Result<(), frost::error::SnowError> {
//!     let mut client = SnowClient::from_env()?;
//!
//!     let params = GetParams {
//!         query: Some("state=1^priority=1".to_string()),
//!         limit: Some(5),
//!         ..Default::default()
//!     };
//!     let response = client.get("incident", params).await?;
//!     println!("{response}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cli;
pub mod client;
pub mod config;
pub mod domains;
pub mod error;
