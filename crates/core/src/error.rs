//! Error types for the Triage domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Monthly request limit exceeded for {0}")]
    QuotaExceeded(String),
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Invalid handler arguments: {0}")]
    InvalidArguments(String),

    #[error("Handler execution failed: {handler}: {reason}")]
    ExecutionFailed { handler: String, reason: String },

    #[error("Monthly request limit exceeded for {0}")]
    QuotaExceeded(String),

    #[error(transparent)]
    Provider(ProviderError),
}

impl From<ProviderError> for HandlerError {
    /// Quota denial stays a distinct condition all the way up.
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::QuotaExceeded(identity) => HandlerError::QuotaExceeded(identity),
            other => HandlerError::Provider(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = HandlerError::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn quota_error_survives_conversion() {
        let err: HandlerError = ProviderError::QuotaExceeded("alice".into()).into();
        assert!(matches!(err, HandlerError::QuotaExceeded(ref who) if who == "alice"));
    }

    #[test]
    fn other_provider_errors_wrap() {
        let err: HandlerError = ProviderError::Network("connection reset".into()).into();
        assert!(matches!(err, HandlerError::Provider(ProviderError::Network(_))));
    }

    #[test]
    fn execution_failure_message_is_plain() {
        let err = HandlerError::ExecutionFailed {
            handler: "ai.chat".into(),
            reason: "empty reply".into(),
        };
        assert_eq!(err.to_string(), "Handler execution failed: ai.chat: empty reply");
        assert!(err.to_string().is_ascii());
        assert!(err.to_string().contains("connection reset"));
    }
}
