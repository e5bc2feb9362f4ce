//! Company record operations.
//!
//! Actions: `get`, `get_by_name`, `query`, `search`, `latest`.
//! Table: `core_company`.
//! Query filters: name, city, state, country, customer, vendor,
//! manufacturer, active.
//!
//! Lookups that match nothing return an empty object rather than a
//! not-found error.

use serde_json::{Map, Value};

use crate::client::{GetParams, SnowClient};
use crate::error::SnowError;

use super::{
    bool_filter, first_record, join_query, opt_bool, opt_i64, opt_str, require_action, require_str,
    result_list, result_record,
};

/// The company table.
pub const TABLE: &str = "core_company";

/// Standard company fields returned when the caller supplies no `fields`.
pub const DEFAULT_FIELDS: &[&str] = &[
    "sys_id",
    "name",
    "street",
    "city",
    "state",
    "zip",
    "country",
    "phone",
    "fax",
    "website",
    "stock_symbol",
    "notes",
    "contact",
    "primary",
    "parent",
    "customer",
    "vendor",
    "manufacturer",
    "active",
    "sys_created_on",
    "sys_updated_on",
];

/// Record count returned by the `latest` action when no limit is given.
const DEFAULT_LATEST_LIMIT: i64 = 10;

/// Comma-separated names of the actions this module accepts.
pub const VALID_ACTIONS: &str = "get, get_by_name, query, search, latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Get,
    GetByName,
    Query,
    Search,
    Latest,
}

impl Action {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "get" => Some(Action::Get),
            "get_by_name" => Some(Action::GetByName),
            "query" => Some(Action::Query),
            "search" => Some(Action::Search),
            "latest" => Some(Action::Latest),
            _ => None,
        }
    }
}

fn default_fields(params: &Map<String, Value>) -> String {
    opt_str(params, "fields").unwrap_or_else(|| DEFAULT_FIELDS.join(","))
}

/// Dispatches a company action from CLI parameters.
pub async fn dispatch_action(
    mut client: SnowClient,
    params: Map<String, Value>,
) -> Result<Value, SnowError> {
    let name = require_action(&params, VALID_ACTIONS)?;
    let action = Action::parse(&name).ok_or_else(|| {
        SnowError::validation(format!(
            "Invalid action: {name}. Valid actions: {VALID_ACTIONS}"
        ))
    })?;

    match action {
        Action::Get => {
            let sys_id = require_str(&params, "sys_id", "get")?;
            get_company(&mut client, &sys_id, &params).await
        }
        Action::GetByName => {
            let name = require_str(&params, "name", "get_by_name")?;
            get_company_by_name(&mut client, &name, &params).await
        }
        Action::Query => query_companies(&mut client, &params).await,
        Action::Search => {
            let term = require_str(&params, "search_term", "search")?;
            search_companies(&mut client, &term, &params).await
        }
        Action::Latest => get_latest_companies(&mut client, &params).await,
    }
}

/// Retrieves a single company by sys_id.
async fn get_company(
    client: &mut SnowClient,
    sys_id: &str,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let response = client
        .get(
            TABLE,
            GetParams {
                sys_id: Some(sys_id.to_string()),
                fields: Some(default_fields(params)),
                display_value: opt_str(params, "display_value"),
                ..Default::default()
            },
        )
        .await?;

    Ok(result_record(response))
}

/// Retrieves a single company by exact name.
async fn get_company_by_name(
    client: &mut SnowClient,
    name: &str,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let response = client
        .get(
            TABLE,
            GetParams {
                query: Some(format!("name={name}")),
                fields: Some(default_fields(params)),
                limit: Some(1),
                display_value: opt_str(params, "display_value"),
                ..Default::default()
            },
        )
        .await?;

    Ok(first_record(response).unwrap_or_else(|| Value::Object(Map::new())))
}

/// Builds the encoded filter for a `query` action.
fn build_query(params: &Map<String, Value>) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(name) = opt_str(params, "name") {
        parts.push(format!("name={name}"));
    }
    if let Some(city) = opt_str(params, "city") {
        parts.push(format!("city={city}"));
    }
    if let Some(state) = opt_str(params, "state") {
        parts.push(format!("state={state}"));
    }
    if let Some(country) = opt_str(params, "country") {
        parts.push(format!("country={country}"));
    }
    for flag in ["customer", "vendor", "manufacturer", "active"] {
        if let Some(value) = opt_bool(params, flag) {
            parts.push(format!("{flag}={}", bool_filter(value)));
        }
    }
    if let Some(extra) = opt_str(params, "query").filter(|q| !q.is_empty()) {
        parts.push(extra);
    }
    join_query(parts)
}

/// Queries companies with optional filters.
async fn query_companies(
    client: &mut SnowClient,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let response = client
        .get(
            TABLE,
            GetParams {
                query: build_query(params),
                fields: Some(default_fields(params)),
                limit: opt_i64(params, "limit"),
                offset: opt_i64(params, "offset"),
                order_by: opt_str(params, "order_by"),
                display_value: opt_str(params, "display_value"),
                ..Default::default()
            },
        )
        .await?;

    Ok(result_list(response))
}

/// Searches companies by name, city, or stock symbol.
async fn search_companies(
    client: &mut SnowClient,
    search_term: &str,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let query = format!(
        "nameLIKE{search_term}^ORcityLIKE{search_term}^ORstock_symbolLIKE{search_term}"
    );

    let response = client
        .get(
            TABLE,
            GetParams {
                query: Some(query),
                fields: Some(default_fields(params)),
                limit: opt_i64(params, "limit"),
                offset: opt_i64(params, "offset"),
                order_by: opt_str(params, "order_by"),
                display_value: opt_str(params, "display_value"),
                ..Default::default()
            },
        )
        .await?;

    Ok(result_list(response))
}

/// Retrieves the most recently created companies, newest first.
async fn get_latest_companies(
    client: &mut SnowClient,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let response = client
        .get(
            TABLE,
            GetParams {
                fields: Some(default_fields(params)),
                limit: Some(opt_i64(params, "limit").unwrap_or(DEFAULT_LATEST_LIMIT)),
                order_by: Some("-sys_created_on".to_string()),
                display_value: opt_str(params, "display_value"),
                ..Default::default()
            },
        )
        .await?;

    Ok(result_list(response))
}
