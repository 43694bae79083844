//! General chat handler — the general-purpose route.
//!
//! Sends the user's message (behind the master prompt, when one exists) to
//! the generation service and returns the model's reply.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use triage_core::error::HandlerError;
use triage_core::handler::{CallContext, Handler};
use triage_core::prompt::{MASTER_PROMPT, PromptSource};
use triage_core::provider::Generator;

use crate::{owner_param, str_param};

pub struct ChatHandler {
    generator: Arc<dyn Generator>,
    prompts: Arc<dyn PromptSource>,
}

impl ChatHandler {
    pub fn new(generator: Arc<dyn Generator>, prompts: Arc<dyn PromptSource>) -> Self {
        Self { generator, prompts }
    }

    fn build_prompt(&self, message: &str) -> String {
        let master = self.prompts.get_or_empty(MASTER_PROMPT);
        if master.trim().is_empty() {
            message.to_string()
        } else {
            format!("{}\n\n[User Message]\n{message}", master.trim())
        }
    }
}

#[async_trait]
impl Handler for ChatHandler {
    fn name(&self) -> &str {
        "ai.chat"
    }

    fn description(&self) -> &str {
        "Answer a general health question with the configured chat model."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "user_id": {
                    "type": "string",
                    "description": "Caller identity, used for quota accounting"
                },
                "message": {
                    "type": "string",
                    "description": "The user's message"
                },
                "provider": {
                    "type": "string",
                    "description": "Provider name (default: the configured default provider)"
                }
            },
            "required": ["user_id", "message"]
        })
    }

    async fn call(
        &self,
        params: serde_json::Value,
        ctx: &CallContext,
    ) -> Result<serde_json::Value, HandlerError> {
        let (Some(user_id), Some(message)) = (owner_param(&params, ctx), str_param(&params, "message"))
        else {
            return Ok(serde_json::json!({ "error": "user_id and message are required" }));
        };
        let provider = str_param(&params, "provider").unwrap_or_default();

        debug!(owner_id = %user_id, provider = %provider, "Chat request");
        let generation = self
            .generator
            .generate(provider, &self.build_prompt(message), &user_id)
            .await?;

        Ok(serde_json::json!({
            "text": generation.text,
            "model": generation.model,
            "tokensUsed": generation.tokens_used,
        }))
    }
}
