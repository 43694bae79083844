//! Unified chat and usage endpoints.
//!
//! - `POST /api/ai/chat`          — classify and route one message
//! - `GET  /api/usage/{owner}`    — monthly usage for an identity

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use triage_agent::{RouteError, RouteRequest};
use triage_core::quota::UsageStats;

use crate::SharedState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub user_id: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub conversation_history: Option<serde_json::Value>,

    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub text: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_requests: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let owner_id = payload.user_id.trim();
    if owner_id.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "user_id is required"));
    }
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message is required"));
    }

    info!(owner_id = %owner_id, "Chat request");

    let mut request = RouteRequest::new(owner_id, payload.message.as_str());
    request.secondary_identifier = payload.email.filter(|e| !e.trim().is_empty());
    if let Some(history) = payload.conversation_history.as_ref().filter(|h| h.is_array()) {
        request = request.with_history(triage_tools::parse_history(history));
    }
    if let Some(id) = payload.conversation_id.filter(|id| !id.trim().is_empty()) {
        request = request.with_conversation(id);
    }

    match state.orchestrator.route(request).await {
        Ok(response) => Ok(Json(ChatResponse {
            text: response.text,
            model: response.model,
            tokens_used: response.tokens_used,
            classification: Some(response.classification),
            conversation_id: response.conversation_id,
            available_requests: response.available_requests,
        })),
        Err(RouteError::QuotaExceeded { owner_id }) => {
            warn!(owner_id = %owner_id, "Chat request over quota");
            Err(api_error(
                StatusCode::TOO_MANY_REQUESTS,
                "Monthly request limit exceeded",
            ))
        }
    }
}

pub async fn usage_handler(
    State(state): State<SharedState>,
    Path(owner): Path<String>,
) -> Json<UsageStats> {
    Json(state.quota.usage_stats(&owner).await)
}
