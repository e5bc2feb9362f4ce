//! Change request operations.
//!
//! Actions: `get`, `get_by_number`, `query`.
//! Table: `change_request`.
//! Query filters: state, type, risk, assignment_group, active.
//!
//! Unlike incidents, lookups that match nothing return an empty object
//! rather than a not-found error.

use serde_json::{Map, Value};

use crate::client::{GetParams, SnowClient};
use crate::error::SnowError;

use super::{
    bool_filter, first_record, join_query, opt_bool, opt_i64, opt_str, require_action, require_str,
    result_list, result_record,
};

/// The change request table.
pub const TABLE: &str = "change_request";

/// Commonly requested change request fields. Requests omit
/// `sysparm_fields` unless the caller supplies a `fields` value.
pub const STANDARD_FIELDS: &[&str] = &[
    "sys_id",
    "number",
    "short_description",
    "description",
    "state",
    "type",
    "risk",
    "priority",
    "assignment_group",
    "assigned_to",
    "requested_by",
    "category",
    "start_date",
    "end_date",
    "planned_start_date",
    "planned_end_date",
    "work_start",
    "work_end",
    "opened_at",
    "opened_by",
    "closed_at",
    "closed_by",
    "close_code",
    "close_notes",
    "active",
    "approval",
    "phase",
    "reason",
    "conflict_status",
    "cab_required",
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

/// Dispatches a change request action from CLI parameters.
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
            get_change(&mut client, &sys_id, &params).await
        }
        Action::GetByNumber => {
            let number = require_str(&params, "number", "get_by_number")?;
            get_change_by_number(&mut client, &number, &params).await
        }
        Action::Query => query_changes(&mut client, &params).await,
    }
}

/// Retrieves a single change request by sys_id.
async fn get_change(
    client: &mut SnowClient,
    sys_id: &str,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let response = client
        .get(
            TABLE,
            GetParams {
                sys_id: Some(sys_id.to_string()),
                fields: opt_str(params, "fields"),
                display_value: opt_str(params, "display_value"),
                ..Default::default()
            },
        )
        .await?;

    Ok(result_record(response))
}

/// Retrieves a single change request by its number (e.g. `CHG0010001`).
async fn get_change_by_number(
    client: &mut SnowClient,
    number: &str,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let response = client
        .get(
            TABLE,
            GetParams {
                query: Some(format!("number={number}")),
                fields: opt_str(params, "fields"),
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
    if let Some(state) = opt_str(params, "state") {
        parts.push(format!("state={state}"));
    }
    if let Some(change_type) = opt_str(params, "type") {
        parts.push(format!("type={change_type}"));
    }
    if let Some(risk) = opt_str(params, "risk") {
        parts.push(format!("risk={risk}"));
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

/// Queries change requests with optional filters.
async fn query_changes(
    client: &mut SnowClient,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let response = client
        .get(
            TABLE,
            GetParams {
                query: build_query(params),
                fields: opt_str(params, "fields"),
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
