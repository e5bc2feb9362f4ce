//! Configuration Management Database (CMDB) operations.
//!
//! Actions: `get`, `get_by_name`, `query`, `search`, `relationships`,
//! `by_ip`, `by_serial`.
//! Tables: `cmdb_ci` for configuration items, `cmdb_rel_ci` for
//! relationships between them.
//! Query filters: ci_class, operational_status, location.

use serde_json::{Map, Value};

use crate::client::{GetParams, SnowClient};
use crate::error::SnowError;

use super::{
    first_record, join_query, opt_i64, opt_str, require_action, require_str, result_list,
    result_record,
};

/// The configuration item table.
pub const TABLE: &str = "cmdb_ci";

/// The CI relationship table.
pub const RELATIONSHIP_TABLE: &str = "cmdb_rel_ci";

/// Standard CI fields returned when the caller supplies no `fields`.
pub const DEFAULT_FIELDS: &[&str] = &[
    "sys_id",
    "name",
    "sys_class_name",
    "asset_tag",
    "serial_number",
    "ip_address",
    "mac_address",
    "dns_domain",
    "fqdn",
    "operational_status",
    "install_status",
    "location",
    "department",
    "company",
    "assigned_to",
    "managed_by",
    "owned_by",
    "supported_by",
    "manufacturer",
    "model_id",
    "model_number",
    "vendor",
    "cost",
    "cost_center",
    "purchase_date",
    "warranty_expiration",
    "first_discovered",
    "last_discovered",
    "discovery_source",
    "environment",
    "short_description",
    "comments",
    "active",
    "sys_created_on",
    "sys_updated_on",
];

/// Standard relationship fields returned when the caller supplies no
/// `fields`.
pub const RELATIONSHIP_FIELDS: &[&str] = &[
    "sys_id",
    "parent",
    "child",
    "type",
    "connection_strength",
    "port",
    "sys_created_on",
    "sys_updated_on",
];

/// Comma-separated names of the actions this module accepts.
pub const VALID_ACTIONS: &str = "get, get_by_name, query, search, relationships, by_ip, by_serial";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Get,
    GetByName,
    Query,
    Search,
    Relationships,
    ByIp,
    BySerial,
}

impl Action {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "get" => Some(Action::Get),
            "get_by_name" => Some(Action::GetByName),
            "query" => Some(Action::Query),
            "search" => Some(Action::Search),
            "relationships" => Some(Action::Relationships),
            "by_ip" => Some(Action::ByIp),
            "by_serial" => Some(Action::BySerial),
            _ => None,
        }
    }
}

fn ci_fields(params: &Map<String, Value>) -> String {
    opt_str(params, "fields").unwrap_or_else(|| DEFAULT_FIELDS.join(","))
}

fn relationship_fields(params: &Map<String, Value>) -> String {
    opt_str(params, "fields").unwrap_or_else(|| RELATIONSHIP_FIELDS.join(","))
}

/// Dispatches a CMDB action from CLI parameters.
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
            get_ci(&mut client, &sys_id, &params).await
        }
        Action::GetByName => {
            let name = require_str(&params, "name", "get_by_name")?;
            get_ci_by_name(&mut client, &name, &params).await
        }
        Action::Query => query_cis(&mut client, &params).await,
        Action::Search => {
            let term = require_str(&params, "search_term", "search")?;
            search_cis(&mut client, &term, &params).await
        }
        Action::Relationships => {
            let sys_id = require_str(&params, "sys_id", "relationships")?;
            get_ci_relationships(&mut client, &sys_id, &params).await
        }
        Action::ByIp => {
            let ip = require_str(&params, "ip_address", "by_ip")?;
            get_cis_by_field(&mut client, "ip_address", &ip, &params).await
        }
        Action::BySerial => {
            let serial = require_str(&params, "serial_number", "by_serial")?;
            get_cis_by_field(&mut client, "serial_number", &serial, &params).await
        }
    }
}

/// Retrieves a single configuration item by sys_id.
async fn get_ci(
    client: &mut SnowClient,
    sys_id: &str,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let response = client
        .get(
            TABLE,
            GetParams {
                sys_id: Some(sys_id.to_string()),
                fields: Some(ci_fields(params)),
                display_value: opt_str(params, "display_value"),
                ..Default::default()
            },
        )
        .await?;

    Ok(result_record(response))
}

/// Retrieves a single configuration item by name, optionally restricted
/// to a CI class.
async fn get_ci_by_name(
    client: &mut SnowClient,
    name: &str,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let mut parts = vec![format!("name={name}")];
    if let Some(ci_class) = opt_str(params, "ci_class") {
        parts.push(format!("sys_class_name={ci_class}"));
    }

    let response = client
        .get(
            TABLE,
            GetParams {
                query: join_query(parts),
                fields: Some(ci_fields(params)),
                limit: Some(1),
                display_value: opt_str(params, "display_value"),
                ..Default::default()
            },
        )
        .await?;

    first_record(response)
        .ok_or_else(|| SnowError::not_found(format!("CI with name '{name}' not found")))
}

/// Builds the encoded filter for a `query` action.
fn build_query(params: &Map<String, Value>) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(ci_class) = opt_str(params, "ci_class") {
        parts.push(format!("sys_class_name={ci_class}"));
    }
    if let Some(status) = opt_str(params, "operational_status") {
        parts.push(format!("operational_status={status}"));
    }
    if let Some(location) = opt_str(params, "location") {
        parts.push(format!("location={location}"));
    }
    if let Some(extra) = opt_str(params, "query").filter(|q| !q.is_empty()) {
        parts.push(extra);
    }
    join_query(parts)
}

/// Queries configuration items with optional filters.
async fn query_cis(
    client: &mut SnowClient,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let response = client
        .get(
            TABLE,
            GetParams {
                query: build_query(params),
                fields: Some(ci_fields(params)),
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

/// Builds the LIKE filter for a `search` action, restricted to a CI
/// class when one is given.
fn build_search_query(search_term: &str, ci_class: Option<&str>) -> String {
    let search = format!(
        "nameLIKE{search_term}^ORasset_tagLIKE{search_term}^ORserial_numberLIKE{search_term}"
    );
    match ci_class {
        Some(ci_class) => format!("sys_class_name={ci_class}^({search})"),
        None => search,
    }
}

/// Searches configuration items by name, asset tag, or serial number.
async fn search_cis(
    client: &mut SnowClient,
    search_term: &str,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let ci_class = opt_str(params, "ci_class");
    let response = client
        .get(
            TABLE,
            GetParams {
                query: Some(build_search_query(search_term, ci_class.as_deref())),
                fields: Some(ci_fields(params)),
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

/// Builds the relationship filter for a CI. Any direction other than
/// `parent` or `child` matches both ends.
fn build_relationship_query(sys_id: &str, direction: Option<&str>, rel_type: Option<&str>) -> String {
    let mut parts = vec![match direction {
        Some("parent") => format!("parent={sys_id}"),
        Some("child") => format!("child={sys_id}"),
        _ => format!("parent={sys_id}^ORchild={sys_id}"),
    }];
    if let Some(rel_type) = rel_type {
        parts.push(format!("type={rel_type}"));
    }
    parts.join("^")
}

/// Retrieves relationship records for a configuration item.
async fn get_ci_relationships(
    client: &mut SnowClient,
    sys_id: &str,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let direction = opt_str(params, "direction");
    let rel_type = opt_str(params, "relationship_type");

    let response = client
        .get(
            RELATIONSHIP_TABLE,
            GetParams {
                query: Some(build_relationship_query(
                    sys_id,
                    direction.as_deref(),
                    rel_type.as_deref(),
                )),
                fields: Some(relationship_fields(params)),
                limit: opt_i64(params, "limit"),
                offset: opt_i64(params, "offset"),
                display_value: opt_str(params, "display_value"),
                ..Default::default()
            },
        )
        .await?;

    Ok(result_list(response))
}

/// Retrieves configuration items matching an exact field value, used by
/// the `by_ip` and `by_serial` actions.
async fn get_cis_by_field(
    client: &mut SnowClient,
    field: &str,
    value: &str,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let mut parts = vec![format!("{field}={value}")];
    if let Some(ci_class) = opt_str(params, "ci_class") {
        parts.push(format!("sys_class_name={ci_class}"));
    }

    let response = client
        .get(
            TABLE,
            GetParams {
                query: join_query(parts),
                fields: Some(ci_fields(params)),
                display_value: opt_str(params, "display_value"),
                ..Default::default()
            },
        )
        .await?;

    Ok(result_list(response))
}
