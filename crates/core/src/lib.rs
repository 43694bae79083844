//! # Triage Core
//!
//! Domain types, traits, and error definitions for the Triage message router.
//! This crate has **no framework dependencies** — it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator is defined as a trait here (generation, quota,
//! prompt templates, conversation storage, handlers). Implementations live
//! in their respective crates, so the pipeline can be exercised with
//! scripted stand-ins in tests.

pub mod classification;
pub mod error;
pub mod handler;
pub mod memory;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod quota;

// Re-export key types at crate root for ergonomics
pub use classification::ClassificationResult;
pub use error::{HandlerError, MemoryError, ProviderError};
pub use handler::{CallContext, Handler, HandlerDefinition, HandlerRegistry};
pub use memory::{ConversationStats, ConversationStore};
pub use message::{ConversationContext, Role, Turn};
pub use prompt::{PromptLibrary, PromptSource};
pub use provider::{Generation, GenerationRequest, Generator, Provider};
pub use quota::{QuotaService, UsageStats};
