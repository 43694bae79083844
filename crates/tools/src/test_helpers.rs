//! Scripted generator shared by the handler tests.

use async_trait::async_trait;
use std::sync::Mutex;
use triage_core::error::ProviderError;
use triage_core::provider::{Generation, Generator};

/// Replies with a fixed result and remembers every prompt it was given.
pub struct ScriptedGenerator {
    reply: Result<String, ProviderError>,
    pub calls: Mutex<Vec<(String, String, String)>>,
}

impl ScriptedGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: ProviderError) -> Self {
        Self {
            reply: Err(err),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn last_prompt(&self) -> String {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|(_, prompt, _)| prompt.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        provider: &str,
        prompt: &str,
        owner_id: &str,
    ) -> Result<Generation, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((provider.into(), prompt.into(), owner_id.into()));
        let text = self.reply.clone()?;
        Ok(Generation {
            text,
            model: "scripted-model".into(),
            tokens_used: 12,
        })
    }
}
