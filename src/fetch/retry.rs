//! Retry schedule with exponential backoff shared by listing and file requests.
//!
//! The policy sleeps *before* each attempt: attempt `k` (0-indexed) waits
//! `(2^k - 1)` backoff units, so the first attempt goes out immediately and the
//! default five attempts wait 0, 1, 3, 7 and 15 seconds.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use mirrordl_core::fetch::RetryPolicy;
//!
//! let policy = RetryPolicy::default();
//! let secs: Vec<u64> = policy.schedule().iter().map(Duration::as_secs).collect();
//! assert_eq!(secs, vec![0, 1, 3, 7, 15]);
//! ```

use std::time::Duration;

use tracing::debug;

use super::constants::{DEFAULT_BACKOFF_UNIT, DEFAULT_MAX_ATTEMPTS};

/// Upper bound on the exponent so the delay arithmetic cannot overflow.
const MAX_EXPONENT: u32 = 20;

/// Configuration for retry behavior with exponential backoff.
///
/// # Default Values
///
/// - `max_attempts`: 5
/// - `unit`: 1 second
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Length of one backoff unit.
    unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            unit: DEFAULT_BACKOFF_UNIT,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom settings (`max_attempts` is clamped to at least 1).
    #[must_use]
    pub fn new(max_attempts: u32, unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            unit,
        }
    }

    /// Creates a policy with a custom backoff unit and the default attempt count.
    #[must_use]
    pub fn with_unit(unit: Duration) -> Self {
        Self {
            unit,
            ..Self::default()
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the backoff unit.
    #[must_use]
    pub fn unit(&self) -> Duration {
        self.unit
    }

    /// Delay to sleep before the 0-indexed `attempt`.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(MAX_EXPONENT);
        let units = (1_u32 << exponent) - 1;
        let delay = self.unit.saturating_mul(units);
        debug!(attempt, delay_ms = delay.as_millis(), "backoff delay");
        delay
    }

    /// The full sequence of pre-attempt delays, one entry per attempt.
    #[must_use]
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_attempts).map(|k| self.delay_before(k)).collect()
    }

    /// Total time slept if every attempt fails.
    #[must_use]
    pub fn worst_case_delay(&self) -> Duration {
        self.schedule().into_iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.unit(), Duration::from_secs(1));
    }

    #[test]
    fn test_retry_policy_default_schedule_is_two_pow_k_minus_one() {
        let policy = RetryPolicy::default();
        let secs: Vec<u64> = policy.schedule().iter().map(Duration::as_secs).collect();
        assert_eq!(secs, vec![0, 1, 3, 7, 15]);
    }

    #[test]
    fn test_retry_policy_first_attempt_has_no_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(0), Duration::ZERO);
    }

    #[test]
    fn test_retry_policy_worst_case_is_26_seconds() {
        assert_eq!(
            RetryPolicy::default().worst_case_delay(),
            Duration::from_secs(26)
        );
    }

    #[test]
    fn test_retry_policy_custom_unit_scales_schedule() {
        let policy = RetryPolicy::with_unit(Duration::from_millis(10));
        let ms: Vec<u128> = policy.schedule().iter().map(Duration::as_millis).collect();
        assert_eq!(ms, vec![0, 10, 30, 70, 150]);
    }

    #[test]
    fn test_retry_policy_max_attempts_minimum_is_one() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.schedule(), vec![Duration::ZERO]);
    }

    #[test]
    fn test_retry_policy_large_attempt_does_not_overflow() {
        let policy = RetryPolicy::default();
        let delay = policy.delay_before(u32::MAX);
        assert_eq!(delay, Duration::from_secs((1 << MAX_EXPONENT) - 1));
    }
}
