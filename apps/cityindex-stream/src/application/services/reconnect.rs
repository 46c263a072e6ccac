//! Reconnection Backoff
//!
//! Exponential backoff with symmetric jitter, one policy per adapter set.
//! The supervisor asks for the next delay after each `Disconnected` and
//! resets the policy once the connection reports `Connected`. There is no
//! terminal state: once the attempt budget is spent, retries continue at
//! `max_delay`.

use std::time::Duration;

use rand::Rng;

/// Backoff settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first attempt after a drop.
    pub initial_delay: Duration,
    /// Upper bound for any single delay (before jitter).
    pub max_delay: Duration,
    /// Growth factor applied after each attempt.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = up to 10% either way).
    pub jitter_factor: f64,
    /// Attempts at growing delays before settling at `max_delay`; 0 means
    /// the delay grows until it reaches `max_delay` on its own.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }
}

impl ReconnectConfig {
    /// Fixed delay with no growth and no jitter.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter_factor: 0.0,
            max_attempts: 0,
        }
    }
}

/// Backoff state for one connection.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use cityindex_stream::application::services::{ReconnectConfig, ReconnectPolicy};
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::fixed(Duration::from_millis(250)));
/// assert_eq!(policy.next_delay(), Duration::from_millis(250));
/// assert_eq!(policy.attempt_count(), 1);
///
/// policy.reset();
/// assert_eq!(policy.attempt_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    base_delay: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Create a policy at its initial delay.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let base_delay = config.initial_delay;
        Self {
            config,
            base_delay,
            attempts: 0,
        }
    }

    /// Delay before the next attempt. Once the attempt budget is spent,
    /// every delay is `max_delay` (jittered).
    #[must_use]
    pub fn next_delay(&mut self) -> Duration {
        let spent = self.budget_spent();
        self.attempts = self.attempts.saturating_add(1);
        if spent {
            return self.jittered(self.config.max_delay);
        }

        let delay = self.jittered(self.base_delay);
        self.base_delay = self.grown(self.base_delay);
        delay
    }

    /// Back to the initial delay with a fresh attempt budget.
    pub const fn reset(&mut self) {
        self.base_delay = self.config.initial_delay;
        self.attempts = 0;
    }

    /// Attempts made since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempts
    }

    /// True once `max_attempts` growing delays have been handed out.
    #[must_use]
    pub const fn budget_spent(&self) -> bool {
        self.config.max_attempts != 0 && self.attempts >= self.config.max_attempts
    }

    fn grown(&self, delay: Duration) -> Duration {
        let max = self.config.max_delay;
        Duration::try_from_secs_f64(delay.as_secs_f64() * self.config.multiplier)
            .map_or(max, |next| next.min(max))
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let factor = self.config.jitter_factor;
        if factor <= 0.0 || delay.is_zero() {
            return delay;
        }

        let spread = delay.as_secs_f64() * factor;
        let offset = rand::rng().random_range(-spread..=spread);
        Duration::try_from_secs_f64((delay.as_secs_f64() + offset).max(0.0)).unwrap_or(delay)
    }
}
