//! The orchestrator: classify a message, then route it to a handler.
//!
//! # Flow
//!
//! 1. Gather history (from the request, else from conversation memory)
//! 2. Build retrieval context when there is history and retrieval is on
//! 3. Classify the message
//! 4. No routing signal → safe reply straight from the classification
//! 5. Otherwise resolve a handler and invoke it; any handler failure
//!    becomes the fixed "temporarily unavailable" reply
//! 6. Record the quota deduction, commit both turns to memory, report
//!    remaining requests
//!
//! Quota exhaustion is the only error returned to the caller.

use std::sync::Arc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use triage_core::classification::ClassificationResult;
use triage_core::error::HandlerError;
use triage_core::handler::{CallContext, FAILED_MODEL, HandlerRegistry};
use triage_core::memory::ConversationStore;
use triage_core::message::{Turn, owner_from_conversation_id};
use triage_core::quota::QuotaService;
use triage_memory::ContextBuilder;

use crate::classifier::{ClassifierAdapter, format_history};
use crate::routing::{CHAT_HANDLER, resolve_handler};

/// Reply when the classifier gives no routing signal and no text of its own.
pub const SAFE_REPLY: &str =
    "I can help with general health information. For emergencies, seek professional care.";

pub use triage_core::handler::SERVICE_DOWN_REPLY;

/// Most turns pulled from memory for one request.
const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Monthly request limit exceeded for {owner_id}")]
    QuotaExceeded { owner_id: String },
}

/// One message to route.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub owner_id: String,
    pub message: String,

    /// Email or other secondary identity shown to the classifier
    pub secondary_identifier: Option<String>,

    /// History supplied by the caller; takes precedence over memory
    pub conversation_history: Option<Vec<Turn>>,

    pub conversation_id: Option<String>,

    /// Retrieval for this request (on by default)
    pub include_rag: bool,
}

impl RouteRequest {
    pub fn new(owner_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            message: message.into(),
            secondary_identifier: None,
            conversation_history: None,
            conversation_id: None,
            include_rag: true,
        }
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.conversation_history = Some(history);
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_rag(mut self, include_rag: bool) -> Self {
        self.include_rag = include_rag;
        self
    }
}

/// The routed reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,

    pub classification: String,

    /// Handler that produced the reply; absent on the safe path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,

    pub deducted_from_quota: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_requests: Option<u32>,
}

pub struct Orchestrator {
    /// Leaf handlers the orchestrator routes to
    handlers: HandlerRegistry,
    classifier: ClassifierAdapter,
    builder: ContextBuilder,
    memory: Arc<dyn ConversationStore>,
    quota: Arc<dyn QuotaService>,
    retrieval_enabled: bool,
}

impl Orchestrator {
    pub fn new(
        handlers: HandlerRegistry,
        classifier: ClassifierAdapter,
        memory: Arc<dyn ConversationStore>,
        quota: Arc<dyn QuotaService>,
    ) -> Self {
        Self {
            handlers,
            classifier,
            builder: ContextBuilder::default(),
            memory,
            quota,
            retrieval_enabled: true,
        }
    }

    pub fn with_context_builder(mut self, builder: ContextBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Turn retrieval off for every request, whatever the request asks.
    pub fn with_retrieval(mut self, enabled: bool) -> Self {
        self.retrieval_enabled = enabled;
        self
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn memory(&self) -> &Arc<dyn ConversationStore> {
        &self.memory
    }

    pub fn classifier(&self) -> &ClassifierAdapter {
        &self.classifier
    }

    /// Classify and route one message.
    pub async fn route(&self, request: RouteRequest) -> Result<RouteResponse, RouteError> {
        let owner_id = request.owner_id.as_str();
        let message = request.message.as_str();
        info!(owner_id = %owner_id, "Routing message");

        let conversation_id = self.conversation_id(&request).await;
        let history = self.history(&request, conversation_id.as_deref()).await;

        let context = if request.include_rag && self.retrieval_enabled && !history.is_empty() {
            let retrieved = self.builder.build(message, &history);
            debug!(chunks = retrieved.chunks.len(), tokens = retrieved.tokens, "Context built");
            Some(retrieved.context).filter(|c| !c.trim().is_empty())
        } else {
            None
        };

        let formatted = match &context {
            Some(ctx) => Some(ctx.clone()),
            None if !history.is_empty() => Some(format_history(&history)),
            None => None,
        };
        let classification = self
            .classifier
            .classify(
                message,
                owner_id,
                request.secondary_identifier.as_deref(),
                formatted.as_deref(),
            )
            .await;

        let mut response = if classification.has_routing_signal() {
            let ctx = CallContext::new(Some(owner_id.to_string()));
            match self.dispatch(&classification, owner_id, message, context.as_deref(), &ctx).await {
                Ok(response) => response,
                Err(err) => {
                    self.commit(conversation_id.as_deref(), vec![Turn::user(message)])
                        .await;
                    return Err(err);
                }
            }
        } else {
            safe_reply(&classification)
        };

        if response.deducted_from_quota {
            let handler = response.handler.as_deref().unwrap_or(CHAT_HANDLER);
            self.quota.record(owner_id, handler, true, None).await;
        }

        self.commit(
            conversation_id.as_deref(),
            vec![Turn::user(message), Turn::assistant(response.text.clone())],
        )
        .await;

        response.conversation_id = conversation_id;
        response.available_requests = self
            .available_requests(owner_id, response.deducted_from_quota)
            .await;

        info!(
            owner_id = %owner_id,
            classification = %response.classification,
            handler = ?response.handler,
            deducted = response.deducted_from_quota,
            "Message routed"
        );
        Ok(response)
    }

    async fn dispatch(
        &self,
        classification: &ClassificationResult,
        owner_id: &str,
        message: &str,
        context: Option<&str>,
        ctx: &CallContext,
    ) -> Result<RouteResponse, RouteError> {
        let tag = classification
            .message_type()
            .unwrap_or(&classification.classification);
        let handler = resolve_handler(classification.route_to.as_deref(), tag, message);

        let mut params = serde_json::json!({ "user_id": owner_id, "message": message });
        if let Some(ctx_text) = context
            && handler != CHAT_HANDLER
        {
            params["context"] = serde_json::Value::String(ctx_text.to_string());
        }

        debug!(owner_id = %owner_id, handler = %handler, "Invoking handler");
        let outcome = self.handlers.call(handler, params, ctx).await;

        let reply = match outcome {
            Ok(value) => match value["text"].as_str() {
                Some(text)
                    if value.get("error").is_none()
                        && value["model"].as_str() != Some(FAILED_MODEL)
                        && !text.trim().is_empty() =>
                {
                    Some((
                        text.to_string(),
                        value["model"].as_str().map(str::to_string),
                        value["tokensUsed"].as_u64(),
                    ))
                }
                _ => {
                    error!(handler = %handler, result = %value, "Handler returned no usable reply");
                    None
                }
            },
            Err(HandlerError::QuotaExceeded(who)) => {
                warn!(owner_id = %who, handler = %handler, "Quota exceeded");
                return Err(RouteError::QuotaExceeded {
                    owner_id: owner_id.to_string(),
                });
            }
            Err(e) => {
                error!(handler = %handler, error = %e, "Handler failed");
                None
            }
        };

        let (text, model, tokens_used) = reply.unwrap_or_else(|| {
            (SERVICE_DOWN_REPLY.to_string(), Some(FAILED_MODEL.to_string()), Some(0))
        });

        Ok(RouteResponse {
            text,
            model,
            tokens_used,
            classification: classification.classification.clone(),
            handler: Some(handler.to_string()),
            deducted_from_quota: classification.should_deduct_from_quota,
            conversation_id: None,
            available_requests: None,
        })
    }

    /// The conversation this request belongs to, created when missing.
    ///
    /// A supplied id another owner holds is replaced by a fresh conversation.
    async fn conversation_id(&self, request: &RouteRequest) -> Option<String> {
        if let Some(id) = request.conversation_id.as_deref().filter(|id| !id.trim().is_empty()) {
            if self.may_use(id, &request.owner_id).await {
                return Some(id.to_string());
            }
            warn!(
                owner_id = %request.owner_id,
                conversation_id = %id,
                "Conversation not owned by caller, starting a new one"
            );
        }
        match self.memory.create(&request.owner_id).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(owner_id = %request.owner_id, error = %e, "Failed to create conversation");
                None
            }
        }
    }

    /// A live conversation must belong to `owner_id`; an unknown id is
    /// accepted only when the owner embedded in it is `owner_id`.
    async fn may_use(&self, conversation_id: &str, owner_id: &str) -> bool {
        match self.memory.owned_by(conversation_id, owner_id).await {
            Ok(true) => true,
            Ok(false) => {
                matches!(self.memory.stats(conversation_id).await, Ok(None))
                    && owner_from_conversation_id(conversation_id).as_deref() == Some(owner_id)
            }
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "Ownership check failed");
                false
            }
        }
    }

    async fn history(&self, request: &RouteRequest, conversation_id: Option<&str>) -> Vec<Turn> {
        if let Some(history) = &request.conversation_history {
            let skip = history.len().saturating_sub(HISTORY_LIMIT);
            return history[skip..].to_vec();
        }
        let Some(id) = conversation_id else {
            return Vec::new();
        };
        self.memory.get(id, HISTORY_LIMIT).await.unwrap_or_else(|e| {
            warn!(conversation_id = %id, error = %e, "Failed to load conversation history");
            Vec::new()
        })
    }

    async fn commit(&self, conversation_id: Option<&str>, turns: Vec<Turn>) {
        let Some(id) = conversation_id else {
            return;
        };
        if let Err(e) = self.memory.add(id, turns).await {
            warn!(conversation_id = %id, error = %e, "Failed to update conversation memory");
        }
    }

    async fn available_requests(&self, owner_id: &str, deducted: bool) -> Option<u32> {
        let stats = self.quota.usage_stats(owner_id).await;
        if deducted {
            Some(stats.remaining)
        } else {
            Some(stats.remaining.saturating_add(1))
        }
    }
}

fn safe_reply(classification: &ClassificationResult) -> RouteResponse {
    debug!(classification = %classification.classification, "No routing signal, replying directly");
    RouteResponse {
        text: classification.reply().unwrap_or(SAFE_REPLY).to_string(),
        model: Some("classifier".into()),
        tokens_used: Some(0),
        classification: classification.classification.clone(),
        handler: None,
        deducted_from_quota: false,
        conversation_id: None,
        available_requests: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedGenerator, medical_query};
    use triage_core::error::ProviderError;
    use triage_core::message::Role;
    use triage_core::prompt::PromptLibrary;
    use triage_memory::InMemoryConversationStore;
    use triage_usage::QuotaLedger;

    struct Fixture {
        orchestrator: Orchestrator,
        generator: Arc<ScriptedGenerator>,
        memory: Arc<InMemoryConversationStore>,
        quota: Arc<QuotaLedger>,
    }

    fn fixture(generator: ScriptedGenerator, limit: u32) -> Fixture {
        let generator = Arc::new(generator);
        let prompts = Arc::new(PromptLibrary::builtin());
        let memory = Arc::new(InMemoryConversationStore::default());
        let quota = Arc::new(QuotaLedger::new(limit));
        let handlers = triage_tools::default_registry(
            generator.clone(),
            prompts.clone(),
            ContextBuilder::default(),
        );
        let classifier = ClassifierAdapter::new(generator.clone(), prompts);
        Fixture {
            orchestrator: Orchestrator::new(handlers, classifier, memory.clone(), quota.clone()),
            generator,
            memory,
            quota,
        }
    }

    #[tokio::test]
    async fn routes_to_chat_and_deducts() {
        let fx = fixture(
            ScriptedGenerator::replying(vec![
                &medical_query("MedicalQueryService", true),
                "Rest, hydrate, and see a doctor if it persists.",
            ]),
            100,
        );
        let response = fx
            .orchestrator
            .route(RouteRequest::new("alice", "I have a headache"))
            .await
            .unwrap();

        assert_eq!(response.text, "Rest, hydrate, and see a doctor if it persists.");
        assert_eq!(response.handler.as_deref(), Some("ai.chat"));
        assert_eq!(response.classification, "MEDICAL_QUERY");
        assert!(response.deducted_from_quota);
        assert_eq!(response.model.as_deref(), Some("mock-model"));
        assert_eq!(fx.quota.usage_stats("alice").await.used, 1);
        assert_eq!(response.available_requests, Some(99));

        let id = response.conversation_id.unwrap();
        let turns = fx.memory.get(&id, 10).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "I have a headache");
        assert_eq!(turns[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn unparsed_gets_safe_reply_without_deduction() {
        let classification = serde_json::json!({
            "classification": "NON_HEALTH",
            "parsed": false,
            "responseText": ""
        })
        .to_string();
        let fx = fixture(ScriptedGenerator::replying(vec![&classification]), 100);
        let response = fx
            .orchestrator
            .route(RouteRequest::new("bob", "what's the weather"))
            .await
            .unwrap();

        assert_eq!(response.text, SAFE_REPLY);
        assert_eq!(response.model.as_deref(), Some("classifier"));
        assert_eq!(response.tokens_used, Some(0));
        assert!(response.handler.is_none());
        assert!(!response.deducted_from_quota);
        assert_eq!(fx.generator.calls().len(), 1);
        assert_eq!(fx.quota.usage_stats("bob").await.used, 0);
        assert_eq!(response.available_requests, Some(101));
    }

    #[tokio::test]
    async fn classifier_reply_is_used_on_safe_path() {
        let classification = r#"{"parsed": false, "reply": "Could you describe the pain?"}"#;
        let fx = fixture(ScriptedGenerator::replying(vec![classification]), 100);
        let response = fx
            .orchestrator
            .route(RouteRequest::new("bob", "it hurts"))
            .await
            .unwrap();
        assert_eq!(response.text, "Could you describe the pain?");
    }

    #[tokio::test]
    async fn classifier_outage_is_safe() {
        let fx = fixture(ScriptedGenerator::failing(ProviderError::Network("down".into())), 100);
        let response = fx
            .orchestrator
            .route(RouteRequest::new("carol", "I have a headache"))
            .await
            .unwrap();
        assert_eq!(response.classification, "ERROR");
        assert!(!response.text.is_empty());
        assert!(!response.deducted_from_quota);
    }

    #[tokio::test]
    async fn handler_failure_is_masked_and_message_kept() {
        let fx = fixture(
            ScriptedGenerator::new(vec![
                Ok(medical_query("MedicalQueryService", true)),
                Err(ProviderError::ApiError {
                    status_code: 500,
                    message: "boom".into(),
                }),
            ]),
            100,
        );
        let response = fx
            .orchestrator
            .route(RouteRequest::new("dave", "I have a headache"))
            .await
            .unwrap();

        assert_eq!(response.text, SERVICE_DOWN_REPLY);
        assert_eq!(response.model.as_deref(), Some("error"));
        assert!(response.deducted_from_quota);

        let id = response.conversation_id.unwrap();
        let turns = fx.memory.get(&id, 10).await.unwrap();
        assert_eq!(turns[0].content, "I have a headache");
    }

    #[tokio::test]
    async fn specialist_failures_get_the_down_reply() {
        for (route_to, message, expected) in [
            ("MedicationService", "ibuprofen with alcohol?", "ai.tool.drug_info"),
            ("MedicalQueryService", "what could this be, rash and fever", "ai.tool.diagnosis_support"),
        ] {
            let fx = fixture(
                ScriptedGenerator::new(vec![
                    Ok(medical_query(route_to, false)),
                    Err(ProviderError::ApiError {
                        status_code: 500,
                        message: "boom".into(),
                    }),
                ]),
                100,
            );
            let response = fx
                .orchestrator
                .route(RouteRequest::new("erin", message))
                .await
                .unwrap();

            assert_eq!(response.handler.as_deref(), Some(expected));
            assert_eq!(response.text, SERVICE_DOWN_REPLY);
            assert_eq!(response.model.as_deref(), Some(FAILED_MODEL));
            assert_eq!(response.tokens_used, Some(0));
        }
    }

    #[tokio::test]
    async fn medication_route_passes_context() {
        let fx = fixture(
            ScriptedGenerator::replying(vec![
                &medical_query("MedicationService", false),
                "Take it with food.",
            ]),
            100,
        );
        let history = vec![Turn::user("I take ibuprofen for my knee").at(None)];
        let response = fx
            .orchestrator
            .route(RouteRequest::new("erin", "how much ibuprofen can I take").with_history(history))
            .await
            .unwrap();

        assert_eq!(response.handler.as_deref(), Some("ai.tool.drug_info"));
        assert!(!response.deducted_from_quota);
        assert_eq!(fx.quota.usage_stats("erin").await.used, 0);

        let calls = fx.generator.calls();
        assert!(calls[0].1.contains("[Context]\n[user] I take ibuprofen for my knee"));
        assert!(calls[1].1.contains("[Context]\n[user] I take ibuprofen for my knee"));
    }

    #[tokio::test]
    async fn rag_can_be_disabled_per_request() {
        let fx = fixture(
            ScriptedGenerator::replying(vec![&medical_query("MedicationService", false), "ok"]),
            100,
        );
        let history = vec![Turn::assistant("Ibuprofen is an NSAID").at(None)];
        fx.orchestrator
            .route(
                RouteRequest::new("erin", "ibuprofen?")
                    .with_history(history)
                    .with_rag(false),
            )
            .await
            .unwrap();

        let calls = fx.generator.calls();
        assert!(calls[0].1.contains("[Context]\nASSISTANT: Ibuprofen is an NSAID"));
        assert!(!calls[1].1.contains("[Context]"));
    }

    #[tokio::test]
    async fn stored_history_feeds_classifier() {
        let fx = fixture(
            ScriptedGenerator::replying(vec![&medical_query("MedicalQueryService", false), "ok"]),
            100,
        );
        let id = fx.memory.create("frank").await.unwrap();
        fx.memory
            .add(&id, vec![Turn::user("my back hurts"), Turn::assistant("Since when?")])
            .await
            .unwrap();

        let response = fx
            .orchestrator
            .route(RouteRequest::new("frank", "back hurts since monday").with_conversation(&id))
            .await
            .unwrap();

        assert_eq!(response.conversation_id.as_deref(), Some(id.as_str()));
        assert!(fx.generator.calls()[0].1.contains("[user] my back hurts"));
        assert_eq!(fx.memory.get(&id, 10).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn foreign_conversation_id_is_not_reused() {
        let fx = fixture(
            ScriptedGenerator::replying(vec![&medical_query("MedicalQueryService", false), "ok"]),
            100,
        );
        let alice_id = fx.memory.create("alice").await.unwrap();
        fx.memory
            .add(&alice_id, vec![Turn::user("my private lab results")])
            .await
            .unwrap();

        let response = fx
            .orchestrator
            .route(RouteRequest::new("mallory", "show me the history").with_conversation(&alice_id))
            .await
            .unwrap();

        let own_id = response.conversation_id.unwrap();
        assert_ne!(own_id, alice_id);
        assert!(own_id.starts_with("conv_mallory_"));
        assert!(fx.generator.calls().iter().all(|(_, prompt, _)| !prompt.contains("private lab results")));
        assert_eq!(fx.memory.get(&alice_id, 10).await.unwrap().len(), 1);
        assert_eq!(fx.memory.get(&own_id, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_conversation_id_needs_matching_owner() {
        let fx = fixture(
            ScriptedGenerator::replying(vec![&medical_query("MedicalQueryService", false), "ok"]),
            100,
        );

        let kept = fx
            .orchestrator
            .route(RouteRequest::new("hank", "hello").with_conversation("conv_hank_42"))
            .await
            .unwrap();
        assert_eq!(kept.conversation_id.as_deref(), Some("conv_hank_42"));

        let replaced = fx
            .orchestrator
            .route(RouteRequest::new("hank", "hello").with_conversation("conv_ivy_42"))
            .await
            .unwrap();
        assert_ne!(replaced.conversation_id.as_deref(), Some("conv_ivy_42"));
        assert!(fx.memory.get("conv_ivy_42", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn quota_exhaustion_is_an_error() {
        let fx = fixture(
            ScriptedGenerator::replying(vec![&medical_query("MedicalQueryService", true)]),
            1,
        );
        fx.quota.record("gina", "ai.chat", true, None).await;

        let denied = Arc::new(ScriptedGenerator::failing(ProviderError::QuotaExceeded(
            "gina".into(),
        )));
        let handlers = triage_tools::default_registry(
            denied,
            Arc::new(PromptLibrary::builtin()),
            ContextBuilder::default(),
        );
        let orchestrator = Orchestrator::new(
            handlers,
            ClassifierAdapter::new(fx.generator.clone(), Arc::new(PromptLibrary::builtin())),
            fx.memory.clone(),
            fx.quota.clone(),
        );
        let id = fx.memory.create("gina").await.unwrap();
        let err = orchestrator
            .route(RouteRequest::new("gina", "I have a headache").with_conversation(&id))
            .await
            .unwrap_err();

        assert!(matches!(err, RouteError::QuotaExceeded { ref owner_id } if owner_id == "gina"));
        let turns = fx.memory.get(&id, 10).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "I have a headache");
        assert_eq!(fx.quota.usage_stats("gina").await.used, 1);
    }
}
