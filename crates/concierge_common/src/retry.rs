//! Retry policy with exponential backoff and jitter.
//!
//! One policy object serves every upstream call site; the caller decides
//! retryability through [`crate::error::CoreError::is_retryable`].

use rand::Rng;
use std::time::Duration;

/// Explicit backoff policy: `2^attempt * base + rand(0..jitter)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_jitter,
        }
    }

    /// Delay before the retry following `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
        };
        exp + jitter
    }

    /// Whether another attempt is allowed after `attempt` attempts failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_growth() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::ZERO);
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn test_jitter_bounded() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_millis(50));
        for attempt in 0..3 {
            let base = Duration::from_millis(100) * (1 << attempt);
            let delay = policy.delay_for(attempt);
            assert!(delay >= base);
            assert!(delay < base + Duration::from_millis(50));
        }
    }

    #[test]
    fn test_attempt_limit() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
    }
}
