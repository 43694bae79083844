//! Tool invocation over JSON-RPC 2.0.
//!
//! - `POST /mcp/jsonrpc` — invoke a handler by name (`method`)
//! - `GET  /mcp/tools`   — list handler definitions
//!
//! Protocol errors are reported in the JSON-RPC envelope with HTTP 200.

use axum::{
    extract::State,
    http::HeaderMap,
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use triage_core::handler::{CallContext, HandlerDefinition};

use crate::SharedState;

pub const INVALID_REQUEST: i64 = -32600;
pub const HANDLER_ERROR: i64 = -32000;

/// Header carrying the caller's identity.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Default, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: serde_json::Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn result(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: serde_json::Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

pub async fn jsonrpc_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    let id = request
        .id
        .filter(|id| !id.is_null())
        .unwrap_or_else(|| serde_json::Value::String(uuid::Uuid::new_v4().to_string()));

    let Some(method) = request.method.filter(|m| !m.trim().is_empty()) else {
        return Json(JsonRpcResponse::error(
            id,
            INVALID_REQUEST,
            "Invalid Request: method is required",
        ));
    };

    let owner_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let ctx = CallContext::new(owner_id);
    let params = request.params.unwrap_or_else(|| serde_json::json!({}));

    debug!(method = %method, connection_id = %ctx.connection_id, "JSON-RPC call");
    match state.registry.call(&method, params, &ctx).await {
        Ok(result) => Json(JsonRpcResponse::result(id, result)),
        Err(e) => {
            warn!(method = %method, error = %e, "Handler returned an error");
            Json(JsonRpcResponse::error(id, HANDLER_ERROR, e.to_string()))
        }
    }
}

#[derive(Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<HandlerDefinition>,
    pub count: usize,
}

pub async fn list_tools_handler(State(state): State<SharedState>) -> Json<ToolListResponse> {
    let tools = state.registry.definitions();
    let count = tools.len();
    Json(ToolListResponse { tools, count })
}
