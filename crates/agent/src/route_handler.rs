//! `ai.route_with_master_prompt` — the orchestrator as a handler.

use async_trait::async_trait;
use std::sync::Arc;
use triage_core::error::HandlerError;
use triage_core::handler::{CallContext, Handler};
use triage_tools::parse_history;

use crate::orchestrator::{Orchestrator, RouteError, RouteRequest};
use crate::routing::ROUTE_HANDLER;

pub struct RouteHandler {
    orchestrator: Arc<Orchestrator>,
}

impl RouteHandler {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Handler for RouteHandler {
    fn name(&self) -> &str {
        ROUTE_HANDLER
    }

    fn description(&self) -> &str {
        "Classify a message and route it to the matching specialist handler."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "string" },
                "message": { "type": "string" },
                "conversation_history": { "type": "array" },
                "conversation_id": { "type": "string" },
                "include_rag": { "type": "boolean", "default": true }
            },
            "required": ["user_id", "message"]
        })
    }

    async fn call(
        &self,
        params: serde_json::Value,
        ctx: &CallContext,
    ) -> Result<serde_json::Value, HandlerError> {
        let owner_id = params["user_id"]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .or_else(|| ctx.owner_id.clone());
        let message = params["message"].as_str().filter(|s| !s.trim().is_empty());
        let (Some(owner_id), Some(message)) = (owner_id, message) else {
            return Ok(serde_json::json!({ "error": "user_id and message are required" }));
        };

        let mut request = RouteRequest::new(owner_id, message)
            .with_rag(params["include_rag"].as_bool().unwrap_or(true));
        if params["conversation_history"].is_array() {
            request = request.with_history(parse_history(&params["conversation_history"]));
        }
        if let Some(id) = params["conversation_id"].as_str() {
            request = request.with_conversation(id);
        }

        match self.orchestrator.route(request).await {
            Ok(response) => Ok(serde_json::json!({
                "text": response.text,
                "model": response.model,
                "tokensUsed": response.tokens_used.unwrap_or(0),
                "classification": response.classification,
                "handler": response.handler,
                "conversationId": response.conversation_id,
                "availableRequests": response.available_requests,
            })),
            Err(RouteError::QuotaExceeded { owner_id }) => Err(HandlerError::QuotaExceeded(owner_id)),
        }
    }
}
