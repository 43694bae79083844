//! Handler trait — the abstraction over named capabilities.
//!
//! Everything the router can dispatch to (chat, drug information,
//! diagnosis support, retrieval, prompt lookup, the router itself) is a
//! handler registered under a unique dotted name such as `ai.chat`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::HandlerError;

/// Reply shown when a generation-backed handler could not produce an answer.
pub const SERVICE_DOWN_REPLY: &str = "The AI service is temporarily unavailable. \
Please try again in a minute. Your message has been saved.";

/// Model reported by a handler that answered with [`SERVICE_DOWN_REPLY`].
pub const FAILED_MODEL: &str = "error";

/// Request-scoped information passed to every handler call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallContext {
    /// Identifies the inbound request
    pub connection_id: String,

    pub request_time: DateTime<Utc>,

    /// Caller identity from the transport, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

impl CallContext {
    pub fn new(owner_id: Option<String>) -> Self {
        Self {
            connection_id: uuid::Uuid::new_v4().to_string(),
            request_time: Utc::now(),
            owner_id,
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Name, description and parameter schema of a handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerDefinition {
    pub name: String,
    pub description: String,

    /// JSON Schema describing the handler's parameters
    pub parameters: serde_json::Value,
}

/// The core Handler trait.
///
/// Handlers take a JSON object and return a JSON value. A handler that
/// wants to report a soft failure may return an object carrying an
/// `error` key instead of an `Err`.
#[async_trait]
pub trait Handler: Send + Sync {
    /// The unique name of this handler (e.g., "ai.chat").
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema describing this handler's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Invoke the handler.
    async fn call(
        &self,
        params: serde_json::Value,
        ctx: &CallContext,
    ) -> std::result::Result<serde_json::Value, HandlerError>;

    fn to_definition(&self) -> HandlerDefinition {
        HandlerDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of named handlers.
///
/// Built once at startup and read-only afterwards. Entries are shared, so
/// cloning is cheap; an extended registry is made by cloning a base one and
/// registering more handlers on the clone.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Replaces any existing handler with the same name.
    pub fn register(&mut self, handler: Arc<dyn Handler>) {
        let name = handler.name().to_string();
        self.handlers.insert(name, handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Invoke a handler by name.
    ///
    /// An unknown name is not an error: the caller gets back
    /// `{"error": "Unknown tool: <name>"}`.
    pub async fn call(
        &self,
        name: &str,
        params: serde_json::Value,
        ctx: &CallContext,
    ) -> std::result::Result<serde_json::Value, HandlerError> {
        match self.handlers.get(name) {
            Some(handler) => handler.call(params, ctx).await,
            None => {
                tracing::warn!(handler = %name, "Unknown handler requested");
                Ok(serde_json::json!({ "error": format!("Unknown tool: {name}") }))
            }
        }
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Definitions of every handler, sorted by name.
    pub fn definitions(&self) -> Vec<HandlerDefinition> {
        let mut defs: Vec<HandlerDefinition> =
            self.handlers.values().map(|h| h.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl Handler for EchoHandler {
        fn name(&self) -> &str {
            "test.echo"
        }
        fn description(&self) -> &str {
            "Echoes back the message"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({
                "type": "object",
                "properties": { "message": { "type": "string" } },
                "required": ["message"]
            })
        }
        async fn call(
            &self,
            params: serde_json::Value,
            ctx: &CallContext,
        ) -> std::result::Result<serde_json::Value, HandlerError> {
            let message = params["message"]
                .as_str()
                .ok_or_else(|| HandlerError::InvalidArguments("missing message".into()))?;
            Ok(json!({ "echo": message, "owner": ctx.owner_id }))
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl Handler for FailingHandler {
        fn name(&self) -> &str {
            "test.fail"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({ "type": "object" })
        }
        async fn call(
            &self,
            _params: serde_json::Value,
            _ctx: &CallContext,
        ) -> std::result::Result<serde_json::Value, HandlerError> {
            Err(HandlerError::ExecutionFailed {
                handler: "test.fail".into(),
                reason: "boom".into(),
            })
        }
    }

    fn registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(EchoHandler));
        registry.register(Arc::new(FailingHandler));
        registry
    }

    #[tokio::test]
    async fn calls_registered_handler() {
        let ctx = CallContext::new(Some("alice".into()));
        let out = registry()
            .call("test.echo", json!({"message": "hi"}), &ctx)
            .await
            .unwrap();
        assert_eq!(out["echo"], "hi");
        assert_eq!(out["owner"], "alice");
    }

    #[tokio::test]
    async fn unknown_name_returns_error_object() {
        let out = registry()
            .call("x", json!({}), &CallContext::default())
            .await
            .unwrap();
        assert_eq!(out, json!({"error": "Unknown tool: x"}));
    }

    #[tokio::test]
    async fn handler_errors_propagate() {
        let err = registry()
            .call("test.fail", json!({}), &CallContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::ExecutionFailed { .. }));
    }

    #[test]
    fn clone_then_extend_leaves_base_untouched() {
        let base = {
            let mut r = HandlerRegistry::new();
            r.register(Arc::new(EchoHandler));
            r
        };
        let mut extended = base.clone();
        extended.register(Arc::new(FailingHandler));
        assert_eq!(base.names(), vec!["test.echo"]);
        assert_eq!(extended.names(), vec!["test.echo", "test.fail"]);
    }

    #[test]
    fn register_replaces_same_name() {
        let mut r = registry();
        r.register(Arc::new(EchoHandler));
        assert_eq!(r.len(), 2);
        assert_eq!(r.definitions()[0].name, "test.echo");
    }
}
