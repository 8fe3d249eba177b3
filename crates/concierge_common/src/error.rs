//! Core error taxonomy.
//!
//! Admission and validation errors map to specific HTTP statuses; upstream
//! and parse failures are recovered into localized user-safe fallbacks.

use std::time::Duration;

/// Errors produced by the answering core.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("origin not allowed: {0}")]
    OriginRejected(String),

    #[error("challenge verification failed")]
    ChallengeFailed,

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Model overload/quota/5xx. Retried with backoff before surfacing.
    #[error("transient upstream failure: {0}")]
    UpstreamTransient(String),

    /// Auth/config errors from upstream. Never retried.
    #[error("fatal upstream failure: {0}")]
    UpstreamFatal(String),

    /// Malformed model output. Downgraded to the "no information" answer.
    #[error("unparsable model output: {0}")]
    Parse(String),

    /// Durable-store write failure during caching. Logged, not fatal.
    #[error("cache write failed: {0}")]
    CacheWrite(String),

    #[error("store error: {0}")]
    Store(String),
}

impl CoreError {
    /// Whether a retry with backoff is worthwhile.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::UpstreamTransient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(CoreError::UpstreamTransient("overloaded".into()).is_retryable());
        assert!(!CoreError::UpstreamFatal("bad api key".into()).is_retryable());
        assert!(!CoreError::Parse("garbage".into()).is_retryable());
        assert!(!CoreError::ChallengeFailed.is_retryable());
    }
}
