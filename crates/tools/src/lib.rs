//! Built-in handlers for Triage.
//!
//! Handlers are the leaves the router dispatches to: general chat, the
//! medication and symptom specialists, retrieval over conversation
//! history, and prompt template lookup.

pub mod chat;
pub mod prompt_handler;
pub mod prompts;
pub mod rag;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;
use triage_core::handler::{CallContext, HandlerRegistry};
use triage_core::prompt::PromptSource;
use triage_core::provider::Generator;
use triage_memory::ContextBuilder;

pub use chat::ChatHandler;
pub use prompt_handler::PromptHandler;
pub use prompts::{PromptGetHandler, PromptListHandler};
pub use rag::{RagContextHandler, parse_history};

/// Create a registry holding every built-in handler.
pub fn default_registry(
    generator: Arc<dyn Generator>,
    prompts: Arc<dyn PromptSource>,
    builder: ContextBuilder,
) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(ChatHandler::new(generator.clone(), prompts.clone())));
    registry.register(Arc::new(PromptHandler::drug_info(generator.clone(), prompts.clone())));
    registry.register(Arc::new(PromptHandler::diagnosis_support(generator, prompts.clone())));
    registry.register(Arc::new(RagContextHandler::new(builder)));
    registry.register(Arc::new(PromptGetHandler::new(prompts.clone())));
    registry.register(Arc::new(PromptListHandler::new(prompts)));
    registry
}

/// A non-blank string parameter.
pub(crate) fn str_param<'a>(params: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

/// The caller: `user_id` from the params, else the transport's identity.
pub(crate) fn owner_param(params: &serde_json::Value, ctx: &CallContext) -> Option<String> {
    str_param(params, "user_id")
        .map(str::to_string)
        .or_else(|| ctx.owner_id.clone().filter(|o| !o.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_helpers::ScriptedGenerator;
    use triage_core::prompt::PromptLibrary;

    fn registry() -> HandlerRegistry {
        default_registry(
            Arc::new(ScriptedGenerator::replying("ok")),
            Arc::new(PromptLibrary::builtin()),
            ContextBuilder::default(),
        )
    }

    #[test]
    fn registers_all_builtins() {
        assert_eq!(
            registry().names(),
            vec![
                "ai.chat",
                "ai.tool.diagnosis_support",
                "ai.tool.drug_info",
                "prompts.get",
                "prompts.list",
                "rag.build_context_from_history",
            ]
        );
    }

    #[test]
    fn definitions_carry_schemas() {
        for def in registry().definitions() {
            assert_eq!(def.parameters["type"], "object", "{}", def.name);
            assert!(!def.description.is_empty());
        }
    }

    #[tokio::test]
    async fn unknown_handler_is_an_error_object() {
        let out = registry()
            .call("x", serde_json::json!({}), &CallContext::default())
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!({"error": "Unknown tool: x"}));
    }
}
