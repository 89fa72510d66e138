//! # Retry Policy Module
//!
//! Exponential backoff with jitter, used by the consumption loop to space out
//! polls after transport failures and to retry failed acknowledgements.

use rand::Rng;
use std::time::Duration;

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;

/// Exponent cap so `powi` never overflows for long failure streaks
const MAX_EXPONENT: u32 = 32;

/// Backoff schedule for a repeated operation
///
/// # Examples
///
/// ```rust
/// use queue_bridge_core::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, Duration::from_millis(200), Duration::from_secs(2), 2.0);
/// assert!(policy.should_retry(2));
/// assert!(!policy.should_retry(3));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_attempts: u32,

    pub initial_delay: Duration,

    /// Cap applied before jitter
    pub max_delay: Duration,

    pub backoff_multiplier: f64,

    pub use_jitter: bool,

    /// Jitter range as a fraction of the delay (0.25 = ±25%)
    pub jitter_percent: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            use_jitter: true,
            jitter_percent: 0.25,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_multiplier,
            use_jitter: true,
            jitter_percent: 0.25,
        }
    }

    /// Policy that never gives up, for loops that back off and keep going
    pub fn unbounded(initial_delay: Duration, max_delay: Duration, backoff_multiplier: f64) -> Self {
        Self::new(u32::MAX, initial_delay, max_delay, backoff_multiplier)
    }

    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    pub fn with_jitter_percent(mut self, percent: f64) -> Self {
        self.jitter_percent = percent.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `attempt` (0-based):
    /// `initial * multiplier^attempt`, capped at `max_delay`, then jittered.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(MAX_EXPONENT) as i32;
        let base_secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        // NaN and negative products from odd multipliers become zero
        let capped_secs = base_secs.max(0.0).min(self.max_delay.as_secs_f64());

        let final_secs = if self.use_jitter {
            Self::add_jitter(capped_secs, self.jitter_percent)
        } else {
            capped_secs
        };

        Duration::from_secs_f64(final_secs)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    fn add_jitter(delay_secs: f64, jitter_percent: f64) -> f64 {
        let jitter_range = delay_secs * jitter_percent;
        if jitter_range <= 0.0 {
            return delay_secs;
        }

        let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        (delay_secs + jitter).max(0.0)
    }
}

/// Tracks progress through a [`RetryPolicy`]
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// Retries made so far (0 while on the first attempt)
    pub attempt: u32,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_attempt(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn get_delay(&self, policy: &RetryPolicy) -> Duration {
        policy.calculate_delay(self.attempt)
    }

    pub fn can_retry(&self, policy: &RetryPolicy) -> bool {
        policy.should_retry(self.attempt)
    }
}
