//! Conversation memory and retrieval context for Triage.
//!
//! - [`InMemoryConversationStore`]: bounded, TTL-expiring turn history
//! - [`ContextBuilder`]: ranks prior turns against a new message

pub mod conversation;
pub mod retrieval;

pub use conversation::{spawn_sweeper, Clock, InMemoryConversationStore};
pub use retrieval::{ContextBuilder, RetrievalChunk, RetrievedContext};
