//! Retry bounds and delays between attempts

use std::time::Duration;

/// Default attempts per API call
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default ceiling for any single wait between attempts
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// How many attempts a call gets and how long to wait between them.
///
/// Delays grow as `base_delay * 2^(attempt-1)` and never exceed `max_delay`.
/// A zero `base_delay` retries immediately unless the server sends a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::ZERO,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff after the `attempt`-th failure (1-based)
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Wait before the next attempt, honoring a server hint up to `max_delay`.
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let backoff = self.backoff_duration(attempt);
        match hint {
            Some(h) => backoff.max(h.min(self.max_delay)),
            None => backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base_ms: u64, max_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
        }
    }

    #[test]
    fn backoff_exponential() {
        let p = policy(2_000, 60_000);
        assert_eq!(p.backoff_duration(1), Duration::from_secs(2));
        assert_eq!(p.backoff_duration(2), Duration::from_secs(4));
        assert_eq!(p.backoff_duration(3), Duration::from_secs(8));
    }

    #[test]
    fn backoff_capped() {
        let p = policy(2_000, 5_000);
        assert_eq!(p.backoff_duration(10), Duration::from_secs(5));
        assert_eq!(p.backoff_duration(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn zero_base_means_immediate() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff_duration(1), Duration::ZERO);
        assert_eq!(p.delay_for(3, None), Duration::ZERO);
    }

    #[test]
    fn hint_raises_delay_but_respects_cap() {
        let p = policy(0, 10_000);
        assert_eq!(
            p.delay_for(1, Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
        assert_eq!(
            p.delay_for(1, Some(Duration::from_secs(120))),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn hint_shorter_than_backoff_is_ignored() {
        let p = policy(4_000, 60_000);
        assert_eq!(
            p.delay_for(2, Some(Duration::from_secs(1))),
            Duration::from_secs(8)
        );
    }
}
