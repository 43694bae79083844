//! Monthly request quota accounting for Triage.
//!
//! The ledger is in-memory and resets with the process, like conversation
//! memory.

pub mod ledger;

pub use ledger::{QuotaLedger, UsageRecord};
