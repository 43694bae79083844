//! Classify-then-route orchestration for Triage.
//!
//! A message passes through:
//!
//! 1. **Context** — relevant prior turns are picked by the context builder
//! 2. **Classification** — a model labels the message and suggests a route
//! 3. **Routing** — the label maps to a handler, which produces the reply
//!
//! When classification yields no routing signal the classifier's own reply
//! (or a fixed safe message) is returned without calling any handler.

pub mod classifier;
pub mod orchestrator;
pub mod route_handler;
pub mod routing;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;
use triage_core::handler::HandlerRegistry;

pub use classifier::{ClassifierAdapter, extract_json, format_history, parse_classification};
pub use orchestrator::{Orchestrator, RouteError, RouteRequest, RouteResponse};
pub use route_handler::RouteHandler;
pub use routing::resolve_handler;

/// The orchestrator's leaf handlers plus the orchestrator itself.
///
/// The orchestrator keeps its own copy of the leaf registry, so this
/// registry can hold it without a cycle.
pub fn extended_registry(leaves: &HandlerRegistry, orchestrator: Arc<Orchestrator>) -> HandlerRegistry {
    let mut registry = leaves.clone();
    registry.register(Arc::new(RouteHandler::new(orchestrator)));
    registry
}
