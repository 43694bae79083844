//! Thread-safe quota ledger — counts successful requests per identity per
//! calendar month and denies once the monthly limit is reached.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use triage_core::quota::{QuotaService, UsageStats};

/// Stored error messages are cut to this many characters.
pub const MAX_ERROR_CHARS: usize = 500;

/// Source of "now", replaceable in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// One identity's accounting for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Successful requests this period
    pub request_count: u32,
    pub provider: String,
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub last_request_at: DateTime<Utc>,
}

pub struct QuotaLedger {
    monthly_limit: u32,
    records: Mutex<HashMap<(String, String), UsageRecord>>,
    clock: Clock,
}

impl QuotaLedger {
    pub fn new(monthly_limit: u32) -> Self {
        Self {
            monthly_limit,
            records: Mutex::new(HashMap::new()),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn monthly_limit(&self) -> u32 {
        self.monthly_limit
    }

    /// The current period key, `YYYY-MM`.
    pub fn current_period(&self) -> String {
        period_of((self.clock)())
    }

    /// Latest record for `identity` in the current period.
    pub fn record_for(&self, identity: &str) -> Option<UsageRecord> {
        let key = (identity.to_string(), self.current_period());
        self.lock().get(&key).cloned()
    }

    fn used(&self, identity: &str, period: &str) -> u32 {
        self.lock()
            .get(&(identity.to_string(), period.to_string()))
            .map(|r| r.request_count)
            .unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(String, String), UsageRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for QuotaLedger {
    fn default() -> Self {
        Self::new(100)
    }
}

fn period_of(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

fn truncate(message: &str, max_chars: usize) -> String {
    match message.char_indices().nth(max_chars) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

#[async_trait]
impl QuotaService for QuotaLedger {
    async fn is_allowed(&self, identity: &str) -> bool {
        let period = self.current_period();
        let used = self.used(identity, &period);
        let allowed = used < self.monthly_limit;
        if !allowed {
            debug!(identity = %identity, used, limit = self.monthly_limit, "Quota exhausted");
        }
        allowed
    }

    async fn record(&self, identity: &str, provider: &str, success: bool, error: Option<&str>) {
        let now = (self.clock)();
        let key = (identity.to_string(), period_of(now));
        let mut records = self.lock();
        let record = records.entry(key).or_insert_with(|| UsageRecord {
            request_count: 0,
            provider: provider.to_string(),
            success,
            error_message: None,
            last_request_at: now,
        });

        record.provider = provider.to_string();
        record.last_request_at = now;
        record.success = success;
        if success {
            record.request_count += 1;
            record.error_message = None;
        } else {
            record.error_message = error.map(|e| truncate(e, MAX_ERROR_CHARS));
        }

        if record.request_count == self.monthly_limit && success {
            info!(identity = %identity, limit = self.monthly_limit, "Monthly quota reached");
        }
    }

    async fn usage_stats(&self, identity: &str) -> UsageStats {
        let period = self.current_period();
        let used = self.used(identity, &period);
        UsageStats {
            used,
            remaining: self.monthly_limit.saturating_sub(used),
            limit: self.monthly_limit,
            period,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ledger_at(limit: u32, start: DateTime<Utc>) -> (QuotaLedger, Arc<Mutex<DateTime<Utc>>>) {
        let now = Arc::new(Mutex::new(start));
        let handle = now.clone();
        let ledger = QuotaLedger::new(limit).with_clock(Arc::new(move || *handle.lock().unwrap()));
        (ledger, now)
    }

    #[tokio::test]
    async fn denies_at_limit() {
        let ledger = QuotaLedger::new(2);
        assert!(ledger.is_allowed("alice").await);
        ledger.record("alice", "openai", true, None).await;
        assert!(ledger.is_allowed("alice").await);
        ledger.record("alice", "openai", true, None).await;
        assert!(!ledger.is_allowed("alice").await);
        assert!(ledger.is_allowed("bob").await);
    }

    #[tokio::test]
    async fn only_successes_count() {
        let ledger = QuotaLedger::new(1);
        ledger.record("alice", "openai", false, Some("timeout")).await;
        ledger.record("alice", "openai", false, Some("timeout")).await;
        assert!(ledger.is_allowed("alice").await);

        let stats = ledger.usage_stats("alice").await;
        assert_eq!(stats.used, 0);
        assert_eq!(stats.remaining, 1);
        let record = ledger.record_for("alice").unwrap();
        assert!(!record.success);
        assert_eq!(record.error_message.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn stats_report_period_and_remaining() {
        let start = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        let (ledger, _) = ledger_at(100, start);
        for _ in 0..3 {
            ledger.record("alice", "grok", true, None).await;
        }
        let stats = ledger.usage_stats("alice").await;
        assert_eq!(stats.used, 3);
        assert_eq!(stats.remaining, 97);
        assert_eq!(stats.limit, 100);
        assert_eq!(stats.period, "2026-03");
    }

    #[tokio::test]
    async fn new_month_resets_usage() {
        let start = Utc.with_ymd_and_hms(2026, 1, 31, 23, 59, 0).unwrap();
        let (ledger, clock) = ledger_at(1, start);
        ledger.record("alice", "openai", true, None).await;
        assert!(!ledger.is_allowed("alice").await);

        *clock.lock().unwrap() = Utc.with_ymd_and_hms(2026, 2, 1, 0, 1, 0).unwrap();
        assert!(ledger.is_allowed("alice").await);
        assert_eq!(ledger.usage_stats("alice").await.period, "2026-02");
    }

    #[tokio::test]
    async fn errors_are_truncated() {
        let ledger = QuotaLedger::default();
        let long = "é".repeat(800);
        ledger.record("alice", "openai", false, Some(&long)).await;
        let stored = ledger.record_for("alice").unwrap().error_message.unwrap();
        assert_eq!(stored.chars().count(), MAX_ERROR_CHARS);
    }

    #[tokio::test]
    async fn success_clears_error() {
        let ledger = QuotaLedger::default();
        ledger.record("alice", "openai", false, Some("boom")).await;
        ledger.record("alice", "gemini", true, None).await;
        let record = ledger.record_for("alice").unwrap();
        assert!(record.success);
        assert!(record.error_message.is_none());
        assert_eq!(record.provider, "gemini");
        assert_eq!(record.request_count, 1);
    }
}
