//! In-memory conversation store — bounded, TTL-expiring history per id.
//!
//! The map is guarded by a `RwLock`; each conversation sits behind its own
//! `Mutex`, so different ids never contend beyond the map lookup and
//! updates to one id are serialized. Lock order is always map, then record.
//!
//! Nothing here survives a restart.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use triage_core::error::MemoryError;
use triage_core::memory::{ConversationStats, ConversationStore};
use triage_core::message::{
    new_conversation_id, owner_from_conversation_id, ConversationContext, Turn,
};

/// Source of "now", replaceable in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

type Record = Arc<Mutex<ConversationContext>>;

pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<String, Record>>,
    max_turns: usize,
    max_inactive: Duration,
    clock: Clock,
}

impl InMemoryConversationStore {
    pub fn new(max_turns: usize, max_inactive_minutes: i64) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            max_turns: max_turns.max(1),
            max_inactive: Duration::minutes(max_inactive_minutes),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn fresh_context(&self, conversation_id: &str) -> ConversationContext {
        let owner = owner_from_conversation_id(conversation_id).unwrap_or_default();
        let now = self.now();
        let mut ctx = ConversationContext::new(conversation_id, owner);
        ctx.created_at = now;
        ctx.last_activity = now;
        ctx
    }

    async fn record(&self, conversation_id: &str) -> Option<Record> {
        self.conversations.read().await.get(conversation_id).cloned()
    }

    /// Remove `record` if it is still the live entry for the id and still expired.
    async fn evict_if_expired(&self, conversation_id: &str, record: &Record) {
        let mut map = self.conversations.write().await;
        let still_expired = match map.get(conversation_id) {
            Some(current) if Arc::ptr_eq(current, record) => {
                current.lock().await.is_expired(self.max_inactive, self.now())
            }
            _ => false,
        };
        if still_expired {
            map.remove(conversation_id);
            debug!(conversation_id = %conversation_id, "Conversation expired, evicted");
        }
    }

    /// Run `f` against a live conversation; expired ones are evicted and read as absent.
    async fn with_live<T>(
        &self,
        conversation_id: &str,
        f: impl FnOnce(&ConversationContext) -> T,
    ) -> Option<T> {
        let record = self.record(conversation_id).await?;
        {
            let ctx = record.lock().await;
            if !ctx.is_expired(self.max_inactive, self.now()) {
                return Some(f(&ctx));
            }
        }
        self.evict_if_expired(conversation_id, &record).await;
        None
    }

    /// Lock the record for mutation, restarting it if it had expired.
    ///
    /// The record is locked while the map guard is still held, so a
    /// concurrent eviction cannot remove it between lookup and write.
    async fn mutate<T>(
        &self,
        conversation_id: &str,
        f: impl FnOnce(&mut ConversationContext, DateTime<Utc>) -> T,
    ) -> T {
        {
            let map = self.conversations.read().await;
            if let Some(record) = map.get(conversation_id) {
                let mut ctx = record.lock().await;
                return self.apply(conversation_id, &mut ctx, f);
            }
        }

        let mut map = self.conversations.write().await;
        let record = map
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                debug!(conversation_id = %conversation_id, "Creating conversation");
                Arc::new(Mutex::new(self.fresh_context(conversation_id)))
            })
            .clone();
        let mut ctx = record.lock().await;
        self.apply(conversation_id, &mut ctx, f)
    }

    fn apply<T>(
        &self,
        conversation_id: &str,
        ctx: &mut ConversationContext,
        f: impl FnOnce(&mut ConversationContext, DateTime<Utc>) -> T,
    ) -> T {
        let now = self.now();
        if ctx.is_expired(self.max_inactive, now) {
            debug!(conversation_id = %conversation_id, "Restarting expired conversation");
            *ctx = self.fresh_context(conversation_id);
        }
        f(ctx, now)
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new(100, 1440)
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create(&self, owner_id: &str) -> Result<String, MemoryError> {
        let id = new_conversation_id(owner_id);
        let mut ctx = self.fresh_context(&id);
        ctx.owner_id = owner_id.to_string();
        self.conversations
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(ctx)));
        debug!(conversation_id = %id, owner_id = %owner_id, "Created conversation");
        Ok(id)
    }

    async fn add(&self, conversation_id: &str, turns: Vec<Turn>) -> Result<(), MemoryError> {
        if conversation_id.trim().is_empty() {
            return Err(MemoryError::Storage("conversation id must not be empty".into()));
        }
        let max_turns = self.max_turns;
        let count = self
            .mutate(conversation_id, |ctx, now| {
                ctx.append(turns, now);
                ctx.trim_to(max_turns);
                ctx.turn_count()
            })
            .await;
        debug!(conversation_id = %conversation_id, turns = count, "Conversation updated");
        Ok(())
    }

    async fn get(&self, conversation_id: &str, last_n: usize) -> Result<Vec<Turn>, MemoryError> {
        Ok(self
            .with_live(conversation_id, |ctx| ctx.last_turns(last_n))
            .await
            .unwrap_or_default())
    }

    async fn context(&self, conversation_id: &str) -> Result<Option<ConversationContext>, MemoryError> {
        Ok(self.with_live(conversation_id, |ctx| ctx.clone()).await)
    }

    async fn set_session_value(
        &self,
        conversation_id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), MemoryError> {
        self.mutate(conversation_id, |ctx, now| {
            ctx.set_session_value(key, value, now)
        })
        .await;
        Ok(())
    }

    async fn get_session_value(
        &self,
        conversation_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, MemoryError> {
        Ok(self
            .with_live(conversation_id, |ctx| ctx.session_value(key).cloned())
            .await
            .flatten())
    }

    async fn clear(&self, conversation_id: &str) -> Result<bool, MemoryError> {
        Ok(self
            .conversations
            .write()
            .await
            .remove(conversation_id)
            .is_some())
    }

    async fn cleanup_expired(&self) -> Result<usize, MemoryError> {
        let now = self.now();
        let mut map = self.conversations.write().await;
        let mut expired = Vec::new();
        for (id, record) in map.iter() {
            if record.lock().await.is_expired(self.max_inactive, now) {
                expired.push(id.clone());
            }
        }
        for id in &expired {
            map.remove(id);
        }
        Ok(expired.len())
    }

    async fn active_count(&self) -> Result<usize, MemoryError> {
        Ok(self.conversations.read().await.len())
    }

    async fn stats(&self, conversation_id: &str) -> Result<Option<ConversationStats>, MemoryError> {
        Ok(self
            .with_live(conversation_id, |ctx| ConversationStats::from(ctx))
            .await)
    }
}

/// Periodically evict expired conversations.
///
/// The first sweep happens one full interval after start.
pub fn spawn_sweeper(
    store: Arc<dyn ConversationStore>,
    every: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;

        loop {
            interval.tick().await;
            match store.cleanup_expired().await {
                Ok(0) => debug!("Conversation sweep: nothing expired"),
                Ok(removed) => {
                    let active = store.active_count().await.unwrap_or(0);
                    info!(removed, active, "Conversation sweep evicted expired conversations");
                }
                Err(e) => tracing::warn!(error = %e, "Conversation sweep failed"),
            }
        }
    })
}
