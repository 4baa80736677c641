//! # Retry Policy
//!
//! ```text
//! delay(n) = min(base * 2^(n-1) * (overload ? overload_multiplier : 1), max)
//! ```
//!
//! `n` is the 1-based number of the attempt that just failed.

use std::time::Duration;

/// Backoff and timeout parameters for heartbeat delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Budget for a single attempt before it counts as a timeout.
    pub attempt_timeout: Duration,
    /// Extra factor applied after a `503`.
    pub overload_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(2_000),
            max_delay: Duration::from_millis(60_000),
            max_attempts: 6,
            attempt_timeout: Duration::from_secs(30),
            overload_multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Millisecond-scale policy for tests.
    pub fn for_testing() -> Self {
        Self {
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(80),
            max_attempts: 6,
            attempt_timeout: Duration::from_millis(200),
            overload_multiplier: 2,
        }
    }

    /// Delay to sleep after attempt `attempt` failed.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, overload: bool) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        let mut delay = self.base_delay.saturating_mul(factor);
        if overload {
            delay = delay.saturating_mul(self.overload_multiplier.max(1));
        }
        delay.min(self.max_delay)
    }
}
