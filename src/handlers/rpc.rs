//! JSON-RPC 2.0 adapter exposing an owner's entries as resources and tools.
//!
//! Each call is answered straight from the store; the live views are not used.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::date_utils::{parse_date, DateRange};
use crate::db::queries::entries::EntryFilter;
use crate::error::AppError;
use crate::models::{EntryInput, Totals};
use crate::services::aggregation::aggregate;
use crate::services::metrics::Stats;
use crate::state::AppState;

pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

const ENTRIES_URI: &str = "paylog://entries";
const WEEKS_URI: &str = "paylog://weekly-summaries";
const STATS_URI: &str = "paylog://stats";

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<AppError> for RpcError {
    fn from(err: AppError) -> Self {
        match &err {
            AppError::Validation { .. } | AppError::NotFound(_) => {
                RpcError::new(INVALID_PARAMS, err.to_string())
            }
            _ if err.is_store_unavailable() => {
                tracing::error!(error = %err, "Entry store failed during RPC call");
                RpcError::new(INTERNAL_ERROR, "Entry store unavailable")
            }
            _ => {
                tracing::error!(error = %err, "RPC call failed");
                RpcError::new(INTERNAL_ERROR, err.to_string())
            }
        }
    }
}

type RpcResult = Result<Value, RpcError>;

pub async fn handle(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Json(request): Json<RpcRequest>,
) -> Json<RpcResponse> {
    tracing::debug!(owner_id = %owner, method = %request.method, "RPC call");
    let outcome = dispatch(&state, &owner, &request.method, request.params);
    let (result, error) = match outcome {
        Ok(value) => (Some(value), None),
        Err(e) => (None, Some(e)),
    };
    Json(RpcResponse {
        jsonrpc: "2.0",
        id: request.id,
        result,
        error,
    })
}

fn dispatch(state: &AppState, owner: &str, method: &str, params: Value) -> RpcResult {
    match method {
        "resources/list" => Ok(list_resources()),
        "resources/read" => {
            #[derive(Deserialize)]
            struct ReadParams {
                uri: String,
            }
            let ReadParams { uri } = parse_params(params)?;
            read_resource(state, owner, &uri)
        }
        "tools/list" => Ok(list_tools()),
        "tools/call" => {
            #[derive(Deserialize)]
            struct CallParams {
                name: String,
                #[serde(default)]
                arguments: Value,
            }
            let CallParams { name, arguments } = parse_params(params)?;
            call_tool(state, owner, &name, arguments)
        }
        other => Err(RpcError::new(
            METHOD_NOT_FOUND,
            format!("Method not found: {}", other),
        )),
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params)
        .map_err(|e| RpcError::new(INVALID_PARAMS, format!("Invalid params: {}", e)))
}

fn list_resources() -> Value {
    json!({
        "resources": [
            {
                "uri": ENTRIES_URI,
                "mimeType": "application/json",
                "name": "Entries",
                "description": "All entries, most recent period first",
            },
            {
                "uri": WEEKS_URI,
                "mimeType": "application/json",
                "name": "Weekly Summaries",
                "description": "Entries grouped into calendar weeks with totals",
            },
            {
                "uri": STATS_URI,
                "mimeType": "application/json",
                "name": "Statistics",
                "description": "Overall totals and average hourly rate",
            },
        ]
    })
}

fn read_resource(state: &AppState, owner: &str, uri: &str) -> RpcResult {
    let entries = state.store.list_entries(owner, &EntryFilter::default())?;
    let body = match uri {
        ENTRIES_URI => serde_json::to_string_pretty(&entries),
        WEEKS_URI => serde_json::to_string_pretty(&aggregate(&entries, state.config.week_start)),
        STATS_URI => serde_json::to_string_pretty(&Stats::from_entries(&entries)),
        other => {
            return Err(RpcError::new(
                INVALID_PARAMS,
                format!("Unknown resource: {}", other),
            ))
        }
    }
    .map_err(|e| RpcError::new(INTERNAL_ERROR, e.to_string()))?;

    Ok(json!({
        "contents": [{ "uri": uri, "mimeType": "application/json", "text": body }]
    }))
}

fn entry_properties() -> Value {
    json!({
        "periodStart": { "type": "string", "description": "Start date in YYYY-MM-DD format" },
        "periodEnd": { "type": "string", "description": "End date in YYYY-MM-DD format" },
        "hoursWorked": { "type": "number", "description": "Total hours worked" },
        "extraHours": { "type": "number", "description": "Extra hours worked (overtime)" },
        "baseAmount": { "type": "number", "description": "Base pay amount" },
        "tipsAmount": { "type": "number", "description": "Tips received" },
        "currencyCode": { "type": "string", "description": "Currency code (e.g. USD, CAD)" },
        "note": { "type": "string", "description": "Optional free-text note" },
    })
}

fn list_tools() -> Value {
    let mut update_properties = entry_properties();
    if let Some(map) = update_properties.as_object_mut() {
        map.insert(
            "id".into(),
            json!({ "type": "string", "description": "Entry ID to update" }),
        );
    }

    json!({
        "tools": [
            {
                "name": "add_entry",
                "description": "Add a new entry with hours worked, pay and tips",
                "inputSchema": {
                    "type": "object",
                    "properties": entry_properties(),
                    "required": ["periodStart", "periodEnd", "hoursWorked", "baseAmount"],
                },
            },
            {
                "name": "update_entry",
                "description": "Update fields of an existing entry",
                "inputSchema": {
                    "type": "object",
                    "properties": update_properties,
                    "required": ["id"],
                },
            },
            {
                "name": "delete_entry",
                "description": "Delete an entry by ID",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "Entry ID to delete" },
                    },
                    "required": ["id"],
                },
            },
            {
                "name": "calculate_weekly_hours",
                "description": "Total regular and extra hours for the week starting on a date",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "week_start": {
                            "type": "string",
                            "description": "Week start date in YYYY-MM-DD format",
                        },
                    },
                    "required": ["week_start"],
                },
            },
        ]
    })
}

fn text_content(text: String) -> Value {
    json!({ "content": [{ "type": "text", "text": text }] })
}

fn pretty(value: &impl Serialize) -> Result<String, RpcError> {
    serde_json::to_string_pretty(value).map_err(|e| RpcError::new(INTERNAL_ERROR, e.to_string()))
}

fn call_tool(state: &AppState, owner: &str, name: &str, arguments: Value) -> RpcResult {
    match name {
        "add_entry" => {
            let input: EntryInput = parse_params(arguments)?;
            let entry = state.store.insert_entry(owner, input.into_new_entry()?)?;
            Ok(text_content(format!("Added entry: {}", pretty(&entry)?)))
        }
        "update_entry" => {
            #[derive(Deserialize)]
            struct UpdateArgs {
                id: String,
                #[serde(flatten)]
                fields: EntryInput,
            }
            let UpdateArgs { id, fields } = parse_params(arguments)?;
            let entry = state.store.update_entry(owner, &id, &fields.into_patch()?)?;
            Ok(text_content(format!("Updated entry: {}", pretty(&entry)?)))
        }
        "delete_entry" => {
            #[derive(Deserialize)]
            struct DeleteArgs {
                id: String,
            }
            let DeleteArgs { id } = parse_params(arguments)?;
            state.store.delete_entry(owner, &id)?;
            Ok(text_content(format!("Deleted entry with ID: {}", id)))
        }
        "calculate_weekly_hours" => {
            #[derive(Deserialize)]
            struct WeekArgs {
                week_start: String,
            }
            let WeekArgs { week_start } = parse_params(arguments)?;
            let start = parse_date("week_start", &week_start)?;
            let week = DateRange::week_from(start);
            let filter = EntryFilter {
                from_date: Some(week.from),
                to_date: Some(week.to),
            };
            let totals = Totals::of_entries(&state.store.list_entries(owner, &filter)?);
            Ok(text_content(format!(
                "Week of {}: {} regular hours, {} extra hours ({} total)",
                week_start.trim(),
                totals.total_hours,
                totals.total_extra_hours,
                totals.total_hours + totals.total_extra_hours
            )))
        }
        other => Err(RpcError::new(
            INVALID_PARAMS,
            format!("Unknown tool: {}", other),
        )),
    }
}
