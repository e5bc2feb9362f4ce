//! Incident operations.
//!
//! Actions: `get`, `get_by_number`, `query`.
//! Table: `incident`.
//! Query filters: state, urgency, impact, assignment_group, active.

use serde_json::{Map, Value};

use crate::client::{GetParams, SnowClient};
use crate::error::SnowError;

use super::{
    bool_filter, first_record, join_query, opt_bool, opt_i64, opt_str, record_is_empty,
    require_action, require_str, result_list, result_record,
};

/// The incident table.
pub const TABLE: &str = "incident";

/// Standard incident fields returned when the caller does not pick their own.
pub const DEFAULT_FIELDS: &[&str] = &[
    "sys_id",
    "number",
    "short_description",
    "description",
    "state",
    "urgency",
    "impact",
    "priority",
    "assignment_group",
    "assigned_to",
    "caller_id",
    "category",
    "subcategory",
    "opened_at",
    "opened_by",
    "resolved_at",
    "resolved_by",
    "closed_at",
    "closed_by",
    "close_code",
    "close_notes",
    "active",
    "sys_created_on",
    "sys_updated_on",
];

/// Comma-separated names of the actions this module accepts.
pub const VALID_ACTIONS: &str = "get, get_by_number, query";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Get,
    GetByNumber,
    Query,
}

impl Action {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "get" => Some(Action::Get),
            "get_by_number" => Some(Action::GetByNumber),
            "query" => Some(Action::Query),
            _ => None,
        }
    }
}

fn default_fields() -> String {
    DEFAULT_FIELDS.join(",")
}

/// Dispatches an incident action from CLI parameters.
///
/// # Errors
///
/// Returns a validation error for a missing or unknown action, or a
/// missing required parameter; otherwise whatever the API call produces.
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
            get_incident(&mut client, &sys_id, &params).await
        }
        Action::GetByNumber => {
            let number = require_str(&params, "number", "get_by_number")?;
            get_incident_by_number(&mut client, &number, &params).await
        }
        Action::Query => query_incidents(&mut client, &params).await,
    }
}

/// Retrieves a single incident by sys_id.
async fn get_incident(
    client: &mut SnowClient,
    sys_id: &str,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let response = client
        .get(
            TABLE,
            GetParams {
                sys_id: Some(sys_id.to_string()),
                fields: Some(opt_str(params, "fields").unwrap_or_else(default_fields)),
                display_value: opt_str(params, "display_value"),
                ..Default::default()
            },
        )
        .await?;

    let record = result_record(response);
    if record_is_empty(&record) {
        return Err(SnowError::not_found(format!(
            "Incident with sys_id '{sys_id}' not found"
        )));
    }
    Ok(record)
}

/// Retrieves a single incident by its number (e.g. `INC0010001`).
async fn get_incident_by_number(
    client: &mut SnowClient,
    number: &str,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let response = client
        .get(
            TABLE,
            GetParams {
                query: Some(format!("number={number}")),
                fields: Some(opt_str(params, "fields").unwrap_or_else(default_fields)),
                limit: Some(1),
                display_value: opt_str(params, "display_value"),
                ..Default::default()
            },
        )
        .await?;

    first_record(response).ok_or_else(|| {
        SnowError::not_found(format!("Incident with number '{number}' not found"))
    })
}

/// Builds the encoded filter for a `query` action.
fn build_query(params: &Map<String, Value>) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(state) = opt_str(params, "state") {
        parts.push(format!("state={state}"));
    }
    if let Some(urgency) = opt_str(params, "urgency") {
        parts.push(format!("urgency={urgency}"));
    }
    if let Some(impact) = opt_str(params, "impact") {
        parts.push(format!("impact={impact}"));
    }
    if let Some(group) = opt_str(params, "assignment_group") {
        parts.push(format!("assignment_group={group}"));
    }
    if let Some(active) = opt_bool(params, "active") {
        parts.push(format!("active={}", bool_filter(active)));
    }
    if let Some(extra) = opt_str(params, "query").filter(|q| !q.is_empty()) {
        parts.push(extra);
    }
    join_query(parts)
}

/// Queries incidents with optional filters, returning the result array.
async fn query_incidents(
    client: &mut SnowClient,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let response = client
        .get(
            TABLE,
            GetParams {
                query: build_query(params),
                fields: Some(opt_str(params, "fields").unwrap_or_else(default_fields)),
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
