//! Retrieval handler — exposes the context builder as
//! `rag.build_context_from_history`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use triage_core::error::HandlerError;
use triage_core::handler::{CallContext, Handler};
use triage_core::message::{Role, Turn};
use triage_memory::ContextBuilder;

use crate::str_param;

pub struct RagContextHandler {
    builder: ContextBuilder,
}

impl RagContextHandler {
    pub fn new(builder: ContextBuilder) -> Self {
        Self { builder }
    }
}

/// Read `[{role, content, timestamp?}]` leniently.
///
/// Missing roles read as user, entries without string content are
/// skipped, and an unparseable timestamp is dropped.
pub fn parse_history(value: &serde_json::Value) -> Vec<Turn> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let content = entry.get("content")?.as_str()?;
            let role = entry
                .get("role")
                .and_then(|r| r.as_str())
                .map(Role::parse_lossy)
                .unwrap_or(Role::User);
            let timestamp = entry
                .get("timestamp")
                .and_then(|t| t.as_str())
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&Utc));
            Some(Turn::new(role, content).at(timestamp))
        })
        .collect()
}

#[async_trait]
impl Handler for RagContextHandler {
    fn name(&self) -> &str {
        "rag.build_context_from_history"
    }

    fn description(&self) -> &str {
        "Score prior conversation turns against a message and return the most relevant ones as context."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": { "type": "string" },
                "conversation_history": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "role": { "type": "string" },
                            "content": { "type": "string" },
                            "timestamp": { "type": "string", "format": "date-time" }
                        },
                        "required": ["content"]
                    }
                },
                "top_k": { "type": "integer", "default": self.builder.top_k() },
                "recency_half_life_minutes": {
                    "type": "number",
                    "default": self.builder.half_life_minutes()
                }
            },
            "required": ["message"]
        })
    }

    async fn call(
        &self,
        params: serde_json::Value,
        _ctx: &CallContext,
    ) -> Result<serde_json::Value, HandlerError> {
        let message = str_param(&params, "message").unwrap_or_default();
        let history = parse_history(&params["conversation_history"]);

        let top_k = params["top_k"]
            .as_u64()
            .map(|k| k as usize)
            .unwrap_or(self.builder.top_k());
        let half_life = params["recency_half_life_minutes"]
            .as_f64()
            .filter(|h| *h > 0.0)
            .unwrap_or(self.builder.half_life_minutes());

        let retrieved = ContextBuilder::new(top_k, half_life).build(message, &history);
        serde_json::to_value(retrieved).map_err(|e| HandlerError::ExecutionFailed {
            handler: self.name().into(),
            reason: e.to_string(),
        })
    }
}
