//! REST Rate Limiting
//!
//! Leaky bucket shared by every REST call. Tokens refill continuously at
//! `per_second` up to `capacity`; a caller finding less than one token
//! sleeps exactly long enough for one to accumulate.
//!
//! The refill, the wait and the debit form one critical section, so
//! concurrent callers are served one at a time in lock order.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::infrastructure::metrics;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Leaky bucket limiter.
#[derive(Debug)]
pub struct LeakyBucket {
    capacity: f64,
    per_second: f64,
    state: Mutex<BucketState>,
}

impl LeakyBucket {
    /// Full bucket holding `capacity` tokens, refilled at `per_second`.
    ///
    /// A bucket holds at least one token. A non-positive rate is treated as
    /// the smallest positive rate; [`RateLimitSettings`] refuses both
    /// before they get here.
    ///
    /// [`RateLimitSettings`]: crate::infrastructure::config::RateLimitSettings
    #[must_use]
    pub fn new(capacity: u32, per_second: f64) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            capacity,
            per_second: per_second.max(f64::EPSILON),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Suspend until a token is available, then take it.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        self.refill(&mut state);

        if state.tokens < 1.0 {
            let wait = Duration::try_from_secs_f64((1.0 - state.tokens) / self.per_second)
                .unwrap_or(Duration::MAX);
            tracing::trace!(wait_ms = wait.as_secs_f64() * 1000.0, "Rate limited");
            metrics::record_rate_limit_wait(wait);

            tokio::time::sleep(wait).await;
            self.refill(&mut state);
        }

        state.tokens -= 1.0;
    }

    /// Take a token if one is available right now.
    ///
    /// Returns `false` without waiting when the bucket is empty or another
    /// caller is waiting for a token.
    pub fn try_acquire(&self) -> bool {
        let Ok(mut state) = self.state.try_lock() else {
            return false;
        };
        self.refill(&mut state);

        if state.tokens < 1.0 {
            return false;
        }
        state.tokens -= 1.0;
        true
    }

    /// Tokens currently available.
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        state.tokens
    }

    /// Burst size.
    #[must_use]
    pub const fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Refill rate in tokens per second.
    #[must_use]
    pub const fn per_second(&self) -> f64 {
        self.per_second
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = elapsed.mul_add(self.per_second, state.tokens).min(self.capacity);
        state.last_refill = now;
    }
}
