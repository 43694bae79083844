//! Provider trait — the abstraction over chat-completion backends.
//!
//! A [`Provider`] turns a prompt into generated text. A [`Generator`] sits
//! one level higher: it picks a provider by name and charges the call
//! against the caller's quota. Handlers only ever see a `Generator`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Turn;

/// A single completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The model to use (e.g., "gpt-4o-mini", "grok-2")
    pub model: String,

    pub messages: Vec<Turn>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl GenerationRequest {
    /// A request consisting of one user message.
    pub fn prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![Turn::user(prompt)],
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Generated text plus accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,

    /// Which model actually responded
    pub model: String,

    #[serde(default)]
    pub tokens_used: u32,
}

/// Every chat-completion backend implements this trait.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "grok").
    fn name(&self) -> &str;

    /// The model used when a request does not name one.
    fn default_model(&self) -> &str;

    async fn complete(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<Generation, ProviderError>;

    /// Health check — can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

/// The generation capability consumed by handlers and the classifier.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a reply to `prompt` with the named provider on behalf of
    /// `owner_id`. An empty provider name selects the default provider.
    async fn generate(
        &self,
        provider: &str,
        prompt: &str,
        owner_id: &str,
    ) -> std::result::Result<Generation, ProviderError>;
}
