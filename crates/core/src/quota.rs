//! Quota trait — per-identity monthly request accounting.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Usage for one identity in the current period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    /// Successful requests this period
    pub used: u32,
    pub remaining: u32,
    pub limit: u32,

    /// `YYYY-MM`
    pub period: String,
}

/// The quota/usage service.
#[async_trait]
pub trait QuotaService: Send + Sync {
    /// Whether `identity` may make another request this period.
    async fn is_allowed(&self, identity: &str) -> bool;

    /// Record one request outcome. Only successes count against the limit.
    async fn record(&self, identity: &str, provider: &str, success: bool, error: Option<&str>);

    async fn usage_stats(&self, identity: &str) -> UsageStats;
}
