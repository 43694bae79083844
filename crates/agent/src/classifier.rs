//! Classifier adapter — asks a model what kind of message this is.
//!
//! The model is prompted with the classifier template (behind the master
//! prompt), the caller's identity, prior context, and the message, and is
//! expected to answer with a JSON object. Whatever goes wrong, the caller
//! gets a [`ClassificationResult`] back; failures become the deterministic
//! `ERROR` result.

use std::sync::Arc;
use tracing::{debug, warn};
use triage_core::classification::ClassificationResult;
use triage_core::message::Turn;
use triage_core::prompt::{CLASSIFIER_PROMPT, MASTER_PROMPT, PromptSource};
use triage_core::provider::Generator;

/// Shown in the `[Context]` block when there is nothing to show.
pub const NO_HISTORY: &str = "No previous conversation history.";

pub struct ClassifierAdapter {
    generator: Arc<dyn Generator>,
    prompts: Arc<dyn PromptSource>,

    /// Provider name; empty means the default provider
    provider: String,

    template: String,
    master_template: String,
}

impl ClassifierAdapter {
    pub fn new(generator: Arc<dyn Generator>, prompts: Arc<dyn PromptSource>) -> Self {
        Self {
            generator,
            prompts,
            provider: String::new(),
            template: CLASSIFIER_PROMPT.into(),
            master_template: MASTER_PROMPT.into(),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_templates(mut self, template: impl Into<String>, master_template: impl Into<String>) -> Self {
        self.template = template.into();
        self.master_template = master_template.into();
        self
    }

    /// Classify `message`. Never fails.
    pub async fn classify(
        &self,
        message: &str,
        owner_id: &str,
        secondary_identifier: Option<&str>,
        formatted_history: Option<&str>,
    ) -> ClassificationResult {
        let prompt = self.build_prompt(message, owner_id, secondary_identifier, formatted_history);

        let generation = match self.generator.generate(&self.provider, &prompt, owner_id).await {
            Ok(generation) => generation,
            Err(e) => {
                warn!(owner_id = %owner_id, error = %e, "Classifier generation failed");
                return ClassificationResult::error(e);
            }
        };

        match parse_classification(&generation.text) {
            Ok(result) => {
                debug!(
                    owner_id = %owner_id,
                    classification = %result.classification,
                    route_to = ?result.route_to,
                    parsed = ?result.parsed,
                    "Message classified"
                );
                result
            }
            Err(reason) => {
                warn!(owner_id = %owner_id, reason = %reason, "Unusable classifier output");
                ClassificationResult::error(reason)
            }
        }
    }

    /// Assemble the full classifier prompt.
    pub fn build_prompt(
        &self,
        message: &str,
        owner_id: &str,
        secondary_identifier: Option<&str>,
        formatted_history: Option<&str>,
    ) -> String {
        let history = formatted_history
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(NO_HISTORY);
        let user_context = serde_json::json!({
            "userId": owner_id,
            "email": secondary_identifier,
        })
        .to_string();

        let template = self
            .prompts
            .get_or_empty(&self.template)
            .replace("{message}", message)
            .replace("{messageHistory}", history)
            .replace("{userContext}", &user_context);

        let mut prompt = String::new();
        let master = self.prompts.get_or_empty(&self.master_template);
        if !master.trim().is_empty() {
            prompt.push_str(master.trim());
            prompt.push_str("\n\n");
        }
        if !template.trim().is_empty() {
            prompt.push_str(template.trim());
            prompt.push_str("\n\n");
        }
        prompt.push_str("[User Context]\n");
        prompt.push_str(&user_context);
        prompt.push_str("\n\n[Context]\n");
        prompt.push_str(history);
        prompt.push_str("\n\n[Message]\n");
        prompt.push_str(message);
        prompt
    }
}

/// Render turns as `ROLE: content` lines.
pub fn format_history(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}\n", t.role.as_str().to_uppercase(), t.content))
        .collect()
}

/// Pull the JSON object out of a model reply.
///
/// Tries a fenced ```json block, then the span from the first `{` to the
/// last `}`, then the trimmed text as-is.
pub fn extract_json(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let body = &text[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }
    if let (Some(open), Some(close)) = (text.find('{'), text.rfind('}'))
        && open < close
    {
        return &text[open..=close];
    }
    text.trim()
}

/// Parse a model reply into a classification.
pub fn parse_classification(text: &str) -> Result<ClassificationResult, String> {
    if text.trim().is_empty() {
        return Err("empty classifier reply".into());
    }
    let result: ClassificationResult =
        serde_json::from_str(extract_json(text)).map_err(|e| format!("invalid classifier JSON: {e}"))?;

    // The routing template reports `parsed` without a tag; anything else
    // needs the tag to be routable.
    if result.classification.trim().is_empty() && result.parsed.is_none() {
        return Err("classifier reply has no classification".into());
    }
    Ok(result)
}
