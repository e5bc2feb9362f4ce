//! Service catalog operations.
//!
//! Actions: `get_category`, `get_item`, `categories`, `items`, `search`,
//! `status`, `query_requests`.
//! Tables: `sc_category`, `sc_cat_item`, `sc_request`, `sc_req_item`.

use serde_json::{json, Map, Value};

use crate::client::{GetParams, SnowClient};
use crate::error::SnowError;

use super::{
    bool_filter, first_record, join_query, opt_bool, opt_i64, opt_str, record_is_empty,
    require_action, require_str, result_list, result_record,
};

/// The catalog category table.
pub const CATEGORY_TABLE: &str = "sc_category";

/// The catalog item table.
pub const ITEM_TABLE: &str = "sc_cat_item";

/// The catalog request table.
pub const REQUEST_TABLE: &str = "sc_request";

/// The requested item table.
pub const REQ_ITEM_TABLE: &str = "sc_req_item";

/// Standard category fields returned when the caller supplies no `fields`.
pub const DEFAULT_CATEGORY_FIELDS: &[&str] = &[
    "sys_id",
    "title",
    "description",
    "parent",
    "active",
    "icon",
    "order",
    "sc_catalog",
    "sys_created_on",
    "sys_updated_on",
];

/// Standard item fields returned when the caller supplies no `fields`.
pub const DEFAULT_ITEM_FIELDS: &[&str] = &[
    "sys_id",
    "name",
    "short_description",
    "description",
    "category",
    "price",
    "active",
    "order",
    "availability",
    "icon",
    "picture",
    "sys_created_on",
    "sys_updated_on",
];

/// Standard request fields returned when the caller supplies no `fields`.
pub const DEFAULT_REQUEST_FIELDS: &[&str] = &[
    "sys_id",
    "number",
    "short_description",
    "description",
    "request_state",
    "stage",
    "requested_for",
    "opened_by",
    "opened_at",
    "closed_at",
    "closed_by",
    "active",
    "approval",
    "price",
    "sys_created_on",
    "sys_updated_on",
];

/// Standard requested-item fields returned when the caller supplies no
/// `fields`.
pub const DEFAULT_REQ_ITEM_FIELDS: &[&str] = &[
    "sys_id",
    "number",
    "short_description",
    "description",
    "request",
    "cat_item",
    "stage",
    "state",
    "quantity",
    "price",
    "opened_by",
    "opened_at",
    "closed_at",
    "closed_by",
    "active",
    "sys_created_on",
    "sys_updated_on",
];

/// Comma-separated names of the actions this module accepts.
pub const VALID_ACTIONS: &str =
    "get_category, get_item, categories, items, search, status, query_requests";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    GetCategory,
    GetItem,
    Categories,
    Items,
    Search,
    Status,
    QueryRequests,
}

impl Action {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "get_category" => Some(Action::GetCategory),
            "get_item" => Some(Action::GetItem),
            "categories" => Some(Action::Categories),
            "items" => Some(Action::Items),
            "search" => Some(Action::Search),
            "status" => Some(Action::Status),
            "query_requests" => Some(Action::QueryRequests),
            _ => None,
        }
    }
}

fn fields_or(params: &Map<String, Value>, defaults: &[&str]) -> String {
    opt_str(params, "fields").unwrap_or_else(|| defaults.join(","))
}

/// Dispatches a catalog action from CLI parameters.
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
        Action::GetCategory => {
            let sys_id = require_str(&params, "sys_id", "get_category")?;
            get_category(&mut client, &sys_id, &params).await
        }
        Action::GetItem => {
            let sys_id = require_str(&params, "sys_id", "get_item")?;
            get_item(&mut client, &sys_id, &params).await
        }
        Action::Categories => get_categories(&mut client, &params).await,
        Action::Items => get_items(&mut client, &params).await,
        Action::Search => {
            let term = require_str(&params, "search_term", "search")?;
            search_catalog(&mut client, &term, &params).await
        }
        Action::Status => get_request_status(&mut client, &params).await,
        Action::QueryRequests => query_requests(&mut client, &params).await,
    }
}

/// Retrieves a single catalog category by sys_id.
async fn get_category(
    client: &mut SnowClient,
    sys_id: &str,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let response = client
        .get(
            CATEGORY_TABLE,
            GetParams {
                sys_id: Some(sys_id.to_string()),
                fields: Some(fields_or(params, DEFAULT_CATEGORY_FIELDS)),
                display_value: opt_str(params, "display_value"),
                ..Default::default()
            },
        )
        .await?;

    let record = result_record(response);
    if record_is_empty(&record) {
        return Err(SnowError::not_found(format!(
            "Category with sys_id '{sys_id}' not found"
        )));
    }
    Ok(record)
}

/// Retrieves a single catalog item by sys_id.
async fn get_item(
    client: &mut SnowClient,
    sys_id: &str,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let response = client
        .get(
            ITEM_TABLE,
            GetParams {
                sys_id: Some(sys_id.to_string()),
                fields: Some(fields_or(params, DEFAULT_ITEM_FIELDS)),
                display_value: opt_str(params, "display_value"),
                ..Default::default()
            },
        )
        .await?;

    let record = result_record(response);
    if record_is_empty(&record) {
        return Err(SnowError::not_found(format!(
            "Catalog item with sys_id '{sys_id}' not found"
        )));
    }
    Ok(record)
}

/// Builds the category filter. A `parent` of literal `null` selects
/// top-level categories via `parentISEMPTY`.
fn build_category_query(params: &Map<String, Value>) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(parent) = opt_str(params, "parent") {
        if parent.eq_ignore_ascii_case("null") {
            parts.push("parentISEMPTY".to_string());
        } else {
            parts.push(format!("parent={parent}"));
        }
    }
    if let Some(active) = opt_bool(params, "active") {
        parts.push(format!("active={}", bool_filter(active)));
    }
    if let Some(extra) = opt_str(params, "query").filter(|q| !q.is_empty()) {
        parts.push(extra);
    }
    join_query(parts)
}

/// Lists catalog categories with optional filters.
async fn get_categories(
    client: &mut SnowClient,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let response = client
        .get(
            CATEGORY_TABLE,
            GetParams {
                query: build_category_query(params),
                fields: Some(fields_or(params, DEFAULT_CATEGORY_FIELDS)),
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

fn build_item_query(params: &Map<String, Value>) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(category) = opt_str(params, "category") {
        parts.push(format!("category={category}"));
    }
    if let Some(active) = opt_bool(params, "active") {
        parts.push(format!("active={}", bool_filter(active)));
    }
    if let Some(extra) = opt_str(params, "query").filter(|q| !q.is_empty()) {
        parts.push(extra);
    }
    join_query(parts)
}

/// Lists catalog items with optional filters.
async fn get_items(
    client: &mut SnowClient,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let response = client
        .get(
            ITEM_TABLE,
            GetParams {
                query: build_item_query(params),
                fields: Some(fields_or(params, DEFAULT_ITEM_FIELDS)),
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

/// Searches categories and items by text, returning both result lists.
/// The `search_categories`, `search_items`, and `active_only` flags all
/// default to true.
async fn search_catalog(
    client: &mut SnowClient,
    search_term: &str,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let search_categories = opt_bool(params, "search_categories").unwrap_or(true);
    let search_items = opt_bool(params, "search_items").unwrap_or(true);
    let active_only = opt_bool(params, "active_only").unwrap_or(true);

    let mut categories = Value::Array(Vec::new());
    let mut items = Value::Array(Vec::new());

    if search_categories {
        let mut parts = vec![format!(
            "titleLIKE{search_term}^ORdescriptionLIKE{search_term}"
        )];
        if active_only {
            parts.push("active=true".to_string());
        }

        let response = client
            .get(
                CATEGORY_TABLE,
                GetParams {
                    query: Some(parts.join("^")),
                    fields: Some(fields_or(params, DEFAULT_CATEGORY_FIELDS)),
                    limit: opt_i64(params, "limit"),
                    display_value: opt_str(params, "display_value"),
                    ..Default::default()
                },
            )
            .await?;
        categories = result_list(response);
    }

    if search_items {
        let mut parts = vec![format!(
            "nameLIKE{search_term}^ORshort_descriptionLIKE{search_term}^ORdescriptionLIKE{search_term}"
        )];
        if active_only {
            parts.push("active=true".to_string());
        }

        let response = client
            .get(
                ITEM_TABLE,
                GetParams {
                    query: Some(parts.join("^")),
                    fields: Some(fields_or(params, DEFAULT_ITEM_FIELDS)),
                    limit: opt_i64(params, "limit"),
                    display_value: opt_str(params, "display_value"),
                    ..Default::default()
                },
            )
            .await?;
        items = result_list(response);
    }

    Ok(json!({ "categories": categories, "items": items }))
}

/// Retrieves a catalog request by number or sys_id, with its requested
/// items when `include_items` is set (the default). Returns an empty
/// object when the request does not exist.
async fn get_request_status(
    client: &mut SnowClient,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let request_number = opt_str(params, "request_number").filter(|n| !n.is_empty());
    let request_sys_id = opt_str(params, "request_sys_id").filter(|s| !s.is_empty());
    if request_number.is_none() && request_sys_id.is_none() {
        return Err(SnowError::validation(
            "Either request_number or request_sys_id is required for status action",
        ));
    }

    let request_fields = fields_or(params, DEFAULT_REQUEST_FIELDS);
    let display_value = opt_str(params, "display_value");

    let request_data = if let Some(sys_id) = &request_sys_id {
        let response = client
            .get(
                REQUEST_TABLE,
                GetParams {
                    sys_id: Some(sys_id.clone()),
                    fields: Some(request_fields),
                    display_value: display_value.clone(),
                    ..Default::default()
                },
            )
            .await?;
        result_record(response)
    } else if let Some(number) = &request_number {
        let response = client
            .get(
                REQUEST_TABLE,
                GetParams {
                    query: Some(format!("number={number}")),
                    fields: Some(request_fields),
                    limit: Some(1),
                    display_value: display_value.clone(),
                    ..Default::default()
                },
            )
            .await?;
        first_record(response).unwrap_or_else(|| Value::Object(Map::new()))
    } else {
        Value::Object(Map::new())
    };

    if record_is_empty(&request_data) {
        return Ok(Value::Object(Map::new()));
    }

    let mut status = Map::new();

    if opt_bool(params, "include_items").unwrap_or(true) {
        let request_id = request_data
            .get("sys_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(request_sys_id);
        if let Some(request_id) = request_id {
            let response = client
                .get(
                    REQ_ITEM_TABLE,
                    GetParams {
                        query: Some(format!("request={request_id}")),
                        fields: Some(fields_or(params, DEFAULT_REQ_ITEM_FIELDS)),
                        display_value,
                        ..Default::default()
                    },
                )
                .await?;
            status.insert("items".to_string(), result_list(response));
        }
    }

    status.insert("request".to_string(), request_data);
    Ok(Value::Object(status))
}

/// Builds the encoded filter for a `query_requests` action.
fn build_request_query(params: &Map<String, Value>) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(state) = opt_str(params, "request_state") {
        parts.push(format!("request_state={state}"));
    }
    if let Some(stage) = opt_str(params, "stage") {
        parts.push(format!("stage={stage}"));
    }
    if let Some(requested_for) = opt_str(params, "requested_for") {
        parts.push(format!("requested_for={requested_for}"));
    }
    if let Some(opened_by) = opt_str(params, "opened_by") {
        parts.push(format!("opened_by={opened_by}"));
    }
    if let Some(active) = opt_bool(params, "active") {
        parts.push(format!("active={}", bool_filter(active)));
    }
    if let Some(extra) = opt_str(params, "query").filter(|q| !q.is_empty()) {
        parts.push(extra);
    }
    join_query(parts)
}

/// Queries catalog requests with optional filters.
async fn query_requests(
    client: &mut SnowClient,
    params: &Map<String, Value>,
) -> Result<Value, SnowError> {
    let response = client
        .get(
            REQUEST_TABLE,
            GetParams {
                query: build_request_query(params),
                fields: Some(fields_or(params, DEFAULT_REQUEST_FIELDS)),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::testutil;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_build_category_query_parent_null() {
        let params = testutil::params(json!({ "parent": "null", "active": true }));
        assert_eq!(
            build_category_query(&params),
            Some("parentISEMPTY^active=true".to_string())
        );
    }

    #[test]
    fn test_build_category_query_parent_sys_id() {
        let params = testutil::params(json!({ "parent": "cat123" }));
        assert_eq!(build_category_query(&params), Some("parent=cat123".to_string()));
    }

    #[test]
    fn test_build_request_query_filters() {
        let params = testutil::params(json!({
            "request_state": "approved",
            "stage": "fulfillment",
            "active": true
        }));
        assert_eq!(
            build_request_query(&params),
            Some("request_state=approved^stage=fulfillment^active=true".to_string())
        );
    }

    #[tokio::test]
    async fn test_get_category_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/sc_category/cat404"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": {} })))
            .mount(&server)
            .await;

        let client = testutil::client(&server.uri());
        let err = dispatch_action(
            client,
            testutil::params(json!({ "action": "get_category", "sys_id": "cat404" })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), "Category with sys_id 'cat404' not found");
    }

    #[tokio::test]
    async fn test_search_splits_categories_and_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/sc_category"))
            .and(query_param(
                "sysparm_query",
                "titleLIKElaptop^ORdescriptionLIKElaptop^active=true",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{ "title": "Laptops" }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/sc_cat_item"))
            .and(query_param(
                "sysparm_query",
                "nameLIKElaptop^ORshort_descriptionLIKElaptop^ORdescriptionLIKElaptop^active=true",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{ "name": "Standard Laptop" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = testutil::client(&server.uri());
        let result = dispatch_action(
            client,
            testutil::params(json!({ "action": "search", "search_term": "laptop" })),
        )
        .await
        .unwrap();
        assert_eq!(
            result,
            json!({
                "categories": [{ "title": "Laptops" }],
                "items": [{ "name": "Standard Laptop" }]
            })
        );
    }

    #[tokio::test]
    async fn test_search_items_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/sc_cat_item"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let client = testutil::client(&server.uri());
        let result = dispatch_action(
            client,
            testutil::params(json!({
                "action": "search",
                "search_term": "vpn",
                "search_categories": false
            })),
        )
        .await
        .unwrap();
        assert_eq!(result, json!({ "categories": [], "items": [] }));
    }

    #[tokio::test]
    async fn test_status_by_number_includes_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/sc_request"))
            .and(query_param("sysparm_query", "number=REQ0010001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{ "sys_id": "req1", "number": "REQ0010001" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/sc_req_item"))
            .and(query_param("sysparm_query", "request=req1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{ "number": "RITM0010001" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = testutil::client(&server.uri());
        let result = dispatch_action(
            client,
            testutil::params(json!({ "action": "status", "request_number": "REQ0010001" })),
        )
        .await
        .unwrap();
        assert_eq!(
            result,
            json!({
                "request": { "sys_id": "req1", "number": "REQ0010001" },
                "items": [{ "number": "RITM0010001" }]
            })
        );
    }

    #[tokio::test]
    async fn test_status_missing_request_yields_empty_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/sc_request"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [] })))
            .mount(&server)
            .await;

        let client = testutil::client(&server.uri());
        let result = dispatch_action(
            client,
            testutil::params(json!({ "action": "status", "request_number": "REQ0099999" })),
        )
        .await
        .unwrap();
        assert_eq!(result, json!({}));
    }

    #[tokio::test]
    async fn test_status_requires_identifier() {
        let client = testutil::client("https://dev.service-now.com");
        let err = dispatch_action(client, testutil::params(json!({ "action": "status" })))
            .await
            .unwrap_err();
        assert_eq!(
            err.message(),
            "Either request_number or request_sys_id is required for status action"
        );
    }
}
