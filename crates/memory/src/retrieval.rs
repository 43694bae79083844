//! Context builder — lexical retrieval over prior conversation turns.
//!
//! Each turn is scored as `jaccard × recency × role`:
//! - Jaccard similarity of lower-cased alphanumeric token sets
//! - exponential recency decay with a configurable half-life
//! - a fixed weight per role
//!
//! The best `top_k` turns are rendered as `"[role] content\n"` lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use triage_core::message::{Role, Turn};

/// Reason string attached to every chunk.
pub const SCORE_REASON: &str = "jaccard*recency*role";

/// A scored turn selected for the context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalChunk {
    pub role: Role,
    pub content: String,
    pub score: f64,
    pub reason: String,
}

/// Output of one context-building pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub context: String,
    pub chunks: Vec<RetrievalChunk>,

    /// Rough token estimate: a quarter of the context length
    pub tokens: usize,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ContextBuilder {
    top_k: usize,
    half_life_minutes: f64,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(8, 1440.0)
    }
}

impl ContextBuilder {
    pub fn new(top_k: usize, half_life_minutes: f64) -> Self {
        Self {
            top_k,
            half_life_minutes,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn half_life_minutes(&self) -> f64 {
        self.half_life_minutes
    }

    /// Score `history` against `message` as of now.
    pub fn build(&self, message: &str, history: &[Turn]) -> RetrievedContext {
        self.build_at(message, history, Utc::now())
    }

    /// Score `history` against `message` as of `now`.
    pub fn build_at(&self, message: &str, history: &[Turn], now: DateTime<Utc>) -> RetrievedContext {
        if history.is_empty() {
            return RetrievedContext::default();
        }

        let query = tokenize(message);
        let mut chunks: Vec<RetrievalChunk> = history
            .iter()
            .filter(|turn| !turn.content.is_empty())
            .map(|turn| {
                let overlap = jaccard(&query, &tokenize(&turn.content));
                let recency = recency_weight(turn.timestamp, now, self.half_life_minutes);
                RetrievalChunk {
                    role: turn.role,
                    content: turn.content.clone(),
                    score: overlap * recency * role_weight(turn.role),
                    reason: SCORE_REASON.to_string(),
                }
            })
            .collect();

        // Stable: equal scores keep history order.
        chunks.sort_by(|a, b| b.score.total_cmp(&a.score));
        chunks.truncate(self.top_k);

        let context: String = chunks
            .iter()
            .map(|c| format!("[{}] {}\n", c.role, c.content))
            .collect();
        let tokens = context.chars().count() / 4;

        RetrievedContext {
            context,
            chunks,
            tokens,
        }
    }
}

/// Lower-cased tokens split on runs of non-alphanumeric characters.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// |A ∩ B| / |A ∪ B|, or 0.0 when either side is empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// `exp(-ln 2 / half_life × age)` with age in whole minutes, floored at 0.
///
/// A turn without a timestamp is treated as current.
pub fn recency_weight(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>, half_life_minutes: f64) -> f64 {
    let Some(ts) = timestamp else {
        return 1.0;
    };
    let age_minutes = (now - ts).num_minutes().max(0) as f64;
    let lambda = std::f64::consts::LN_2 / half_life_minutes;
    (-lambda * age_minutes).exp()
}

pub fn role_weight(role: Role) -> f64 {
    match role {
        Role::System => 1.2,
        Role::Tool => 0.9,
        Role::Assistant => 0.8,
        Role::User => 1.0,
    }
}
