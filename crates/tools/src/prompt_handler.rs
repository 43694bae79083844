//! Template-driven specialist handlers.
//!
//! `ai.tool.drug_info` and `ai.tool.diagnosis_support` differ only in the
//! template they put in front of the user's message, so both are instances
//! of [`PromptHandler`].
//!
//! A provider failure does not fail the call: the handler answers with
//! [`SERVICE_DOWN_REPLY`] and model `"error"`. Quota denial is the exception
//! and is returned as [`HandlerError::QuotaExceeded`].

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use triage_core::error::{HandlerError, ProviderError};
use triage_core::handler::{CallContext, FAILED_MODEL, Handler, SERVICE_DOWN_REPLY};
use triage_core::prompt::{MEDICAL_QUERY_PROMPT, MEDICATION_PROMPT, PromptSource};
use triage_core::provider::Generator;

use crate::{owner_param, str_param};

pub struct PromptHandler {
    name: &'static str,
    description: &'static str,

    /// Template names tried in order; the first non-blank one wins
    templates: &'static [&'static str],

    generator: Arc<dyn Generator>,
    prompts: Arc<dyn PromptSource>,
}

impl PromptHandler {
    pub fn drug_info(generator: Arc<dyn Generator>, prompts: Arc<dyn PromptSource>) -> Self {
        Self {
            name: "ai.tool.drug_info",
            description: "Explain a medication: common uses, dosing, side effects and interactions.",
            templates: &[MEDICATION_PROMPT, MEDICAL_QUERY_PROMPT],
            generator,
            prompts,
        }
    }

    pub fn diagnosis_support(generator: Arc<dyn Generator>, prompts: Arc<dyn PromptSource>) -> Self {
        Self {
            name: "ai.tool.diagnosis_support",
            description: "Discuss possible causes of described symptoms without giving a diagnosis.",
            templates: &[MEDICAL_QUERY_PROMPT],
            generator,
            prompts,
        }
    }

    fn template(&self) -> String {
        self.templates
            .iter()
            .map(|name| self.prompts.get_or_empty(name))
            .find(|text| !text.trim().is_empty())
            .unwrap_or_default()
    }

    fn build_prompt(&self, message: &str, context: Option<&str>) -> String {
        let mut prompt = String::new();
        let template = self.template();
        if !template.trim().is_empty() {
            prompt.push_str(template.trim());
            prompt.push_str("\n\n");
        }
        if let Some(ctx) = context.map(str::trim).filter(|c| !c.is_empty()) {
            prompt.push_str("[Context]\n");
            prompt.push_str(ctx);
            prompt.push_str("\n\n");
        }
        prompt.push_str("[User Message]\n");
        prompt.push_str(message);
        prompt
    }
}

#[async_trait]
impl Handler for PromptHandler {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "string" },
                "message": { "type": "string" },
                "context": {
                    "type": "string",
                    "description": "Retrieved conversation context to include"
                },
                "provider": { "type": "string" }
            },
            "required": ["user_id", "message"]
        })
    }

    async fn call(
        &self,
        params: serde_json::Value,
        ctx: &CallContext,
    ) -> Result<serde_json::Value, HandlerError> {
        let user_id = owner_param(&params, ctx)
            .ok_or_else(|| HandlerError::InvalidArguments("Missing 'user_id' argument".into()))?;
        let message = str_param(&params, "message")
            .ok_or_else(|| HandlerError::InvalidArguments("Missing 'message' argument".into()))?;
        let provider = str_param(&params, "provider").unwrap_or_default();

        let prompt = self.build_prompt(message, str_param(&params, "context"));
        debug!(handler = %self.name, owner_id = %user_id, "Prompt handler request");

        match self.generator.generate(provider, &prompt, &user_id).await {
            Ok(generation) => Ok(serde_json::json!({
                "text": generation.text,
                "model": generation.model,
                "tokensUsed": generation.tokens_used,
            })),
            Err(ProviderError::QuotaExceeded(owner)) => Err(HandlerError::QuotaExceeded(owner)),
            Err(e) => {
                warn!(handler = %self.name, owner_id = %user_id, error = %e, "Generation failed");
                Ok(serde_json::json!({
                    "text": SERVICE_DOWN_REPLY,
                    "model": FAILED_MODEL,
                    "tokensUsed": 0,
                }))
            }
        }
    }
}
