use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Exponential backoff schedule for transient execution failures.
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub multiplier: u64,
    pub max_delay: Duration,
    /// Total tries, inclusive of the initial one.
    pub max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(15),
            multiplier: 2,
            max_delay: Duration::from_secs(300),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    /// True when a task on its `attempt`-th try (1-based) may try again.
    pub fn allows_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the retry that follows the `attempt`-th try.
    pub fn delay_after_attempt(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        let scaled_ms = (self.base_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(scaled_ms).min(self.max_delay)
    }
}
