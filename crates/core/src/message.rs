//! Turn and conversation domain types.
//!
//! A turn is one utterance in a conversation. Turns flow through the whole
//! pipeline: inbound history → context builder → classifier → memory.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of every conversation id minted by [`new_conversation_id`].
pub const CONVERSATION_PREFIX: &str = "conv_";

/// The role of a turn's author.
///
/// Deserialization is lenient: any unrecognized role string is read as
/// [`Role::User`], matching how inbound history without a role is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
    /// Tool execution result
    Tool,
}

impl Role {
    /// Parse a role name, falling back to `User` for anything unknown.
    pub fn parse_lossy(role: &str) -> Self {
        match role.trim().to_ascii_lowercase().as_str() {
            "assistant" => Role::Assistant,
            "system" => Role::System,
            "tool" => Role::Tool,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::parse_lossy(&value)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single turn in a conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// When the turn happened, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Turn {
    /// Create a turn stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a new tool turn.
    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    /// Replace the timestamp (`None` means "unknown").
    pub fn at(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Everything remembered about one conversation.
///
/// Owned by the conversation store; callers only ever see clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub id: String,

    /// Owner of the conversation (may be empty when unknown)
    pub owner_id: String,

    /// Ordered turns, oldest first
    pub turns: Vec<Turn>,

    /// Routing hints and provisional state, independent of turn trimming
    #[serde(default)]
    pub session_data: serde_json::Map<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,

    /// Never moves backwards
    pub last_activity: DateTime<Utc>,
}

impl ConversationContext {
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            turns: Vec::new(),
            session_data: serde_json::Map::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Bump `last_activity`, keeping it monotonic.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    /// Append turns in order and bump activity.
    pub fn append(&mut self, turns: impl IntoIterator<Item = Turn>, now: DateTime<Utc>) {
        self.turns.extend(turns);
        self.touch(now);
    }

    /// Drop the oldest turns until at most `max_turns` remain.
    pub fn trim_to(&mut self, max_turns: usize) {
        if self.turns.len() > max_turns {
            let excess = self.turns.len() - max_turns;
            self.turns.drain(..excess);
        }
    }

    /// The last `n` turns in chronological order.
    pub fn last_turns(&self, n: usize) -> Vec<Turn> {
        let start = self.turns.len().saturating_sub(n);
        self.turns[start..].to_vec()
    }

    pub fn set_session_value(&mut self, key: impl Into<String>, value: serde_json::Value, now: DateTime<Utc>) {
        self.session_data.insert(key.into(), value);
        self.touch(now);
    }

    pub fn session_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.session_data.get(key)
    }

    /// True iff `now - last_activity > max_inactive`.
    pub fn is_expired(&self, max_inactive: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_activity > max_inactive
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }
}

/// Mint a conversation id that embeds its owner: `conv_<owner>_<millis>`.
pub fn new_conversation_id(owner_id: &str) -> String {
    format!(
        "{CONVERSATION_PREFIX}{owner_id}_{}",
        Utc::now().timestamp_millis()
    )
}

/// Recover the owner from an id minted by [`new_conversation_id`].
pub fn owner_from_conversation_id(conversation_id: &str) -> Option<String> {
    let rest = conversation_id.strip_prefix(CONVERSATION_PREFIX)?;
    let (owner, millis) = rest.rsplit_once('_')?;
    if owner.is_empty() || millis.is_empty() {
        return None;
    }
    Some(owner.to_string())
}
