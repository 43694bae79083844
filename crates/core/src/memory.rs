//! Conversation storage trait.
//!
//! Conversations are bounded (oldest turns dropped first) and expire after
//! a period of inactivity. Expired records read as absent.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;
use crate::message::{ConversationContext, Turn};

/// Summary of a live conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationStats {
    pub id: String,
    pub owner_id: String,
    pub turn_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl From<&ConversationContext> for ConversationStats {
    fn from(ctx: &ConversationContext) -> Self {
        Self {
            id: ctx.id.clone(),
            owner_id: ctx.owner_id.clone(),
            turn_count: ctx.turn_count(),
            created_at: ctx.created_at,
            last_activity: ctx.last_activity,
        }
    }
}

/// The conversation store.
///
/// Implementations must make `add` atomic per conversation: two concurrent
/// adds to the same id never interleave their turns.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Start a new conversation for `owner_id` and return its id.
    async fn create(&self, owner_id: &str) -> std::result::Result<String, MemoryError>;

    /// Append turns, creating the conversation if absent.
    async fn add(&self, conversation_id: &str, turns: Vec<Turn>) -> std::result::Result<(), MemoryError>;

    /// Up to the last `last_n` turns, oldest first. Empty when absent or expired.
    async fn get(&self, conversation_id: &str, last_n: usize) -> std::result::Result<Vec<Turn>, MemoryError>;

    /// Snapshot of the whole conversation, if live.
    async fn context(&self, conversation_id: &str) -> std::result::Result<Option<ConversationContext>, MemoryError>;

    async fn set_session_value(
        &self,
        conversation_id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> std::result::Result<(), MemoryError>;

    async fn get_session_value(
        &self,
        conversation_id: &str,
        key: &str,
    ) -> std::result::Result<Option<serde_json::Value>, MemoryError>;

    /// Remove a conversation. Returns whether it existed.
    async fn clear(&self, conversation_id: &str) -> std::result::Result<bool, MemoryError>;

    /// Evict every expired conversation and return how many were removed.
    async fn cleanup_expired(&self) -> std::result::Result<usize, MemoryError>;

    async fn active_count(&self) -> std::result::Result<usize, MemoryError>;

    async fn stats(&self, conversation_id: &str) -> std::result::Result<Option<ConversationStats>, MemoryError>;

    /// Whether a live conversation belongs to `owner_id`.
    async fn owned_by(&self, conversation_id: &str, owner_id: &str) -> std::result::Result<bool, MemoryError> {
        Ok(self
            .stats(conversation_id)
            .await?
            .is_some_and(|s| s.owner_id == owner_id))
    }
}
