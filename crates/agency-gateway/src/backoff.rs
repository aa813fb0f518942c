//! Retry and backoff policy for provider calls.

use std::time::Duration;

/// Bounded exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts per call, including the first.
    pub attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling for any single delay.
    pub max_delay: Duration,
    /// Exponential multiplier between retries.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (0-based).
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let delay =
            self.base_delay.as_millis() as f64 * self.multiplier.powi(retry as i32);
        let delay = delay.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(delay as u64)
    }
}
