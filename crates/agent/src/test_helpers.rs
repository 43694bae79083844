//! Shared test helpers for classifier and orchestrator tests.

use async_trait::async_trait;
use std::sync::Mutex;
use triage_core::error::ProviderError;
use triage_core::provider::{Generation, Generator};

/// A generator that returns a sequence of scripted replies.
///
/// Each call returns the next reply in the queue; once the queue is down
/// to its last entry, that entry is repeated.
pub struct ScriptedGenerator {
    replies: Mutex<Vec<Result<String, ProviderError>>>,
    calls: Mutex<Vec<(String, String, String)>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(texts: Vec<&str>) -> Self {
        Self::new(texts.into_iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn failing(err: ProviderError) -> Self {
        Self::new(vec![Err(err)])
    }

    /// `(provider, prompt, owner_id)` for every call so far.
    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_prompt(&self) -> String {
        self.calls().last().map(|c| c.1.clone()).unwrap_or_default()
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

        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.remove(0)
            } else {
                replies
                    .first()
                    .cloned()
                    .unwrap_or_else(|| Err(ProviderError::NotConfigured("no scripted reply".into())))
            }
        };
        Ok(Generation {
            text: reply?,
            model: "mock-model".into(),
            tokens_used: 15,
        })
    }
}

/// Classifier JSON for a routable medical query.
pub fn medical_query(route_to: &str, deduct: bool) -> String {
    serde_json::json!({
        "classification": "MEDICAL_QUERY",
        "parsed": true,
        "routeTo": route_to,
        "responseText": "",
        "shouldDeductFromQuota": deduct,
        "isFollowUp": false,
        "followUpDataRequired": null
    })
    .to_string()
}
