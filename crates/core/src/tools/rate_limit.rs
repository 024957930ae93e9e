//! # Token Bucket
//!
//! Throttles calls to one external source to a steady rate with a small burst.
//! Backed by a direct (unkeyed) `governor` limiter; waiters are never dropped.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;

const MIN_RATE: f64 = 0.001;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiter shared by all callers of one source
pub struct TokenBucket {
    rate: f64,
    capacity: u32,
    // None = unthrottled
    limiter: Option<DirectLimiter>,
}

impl TokenBucket {
    /// `rate` tokens per second, at most `capacity` stored. The bucket starts full.
    pub fn new(rate: f64, capacity: u32) -> Self {
        let rate = if rate.is_finite() { rate.max(MIN_RATE) } else { MIN_RATE };
        let burst = NonZeroU32::new(capacity).unwrap_or(NonZeroU32::MIN);
        let limiter = Quota::with_period(Duration::from_secs_f64(1.0 / rate))
            .map(|quota| RateLimiter::direct(quota.allow_burst(burst)));

        Self {
            rate,
            capacity: burst.get(),
            limiter,
        }
    }

    /// Unthrottled bucket for in-process fakes and tests
    pub fn unlimited() -> Self {
        Self {
            rate: f64::INFINITY,
            capacity: u32::MAX,
            limiter: None,
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Wait until a token is available, then consume it. Never fails.
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("rate", &self.rate)
            .field("capacity", &self.capacity)
            .field("throttled", &self.limiter.is_some())
            .finish()
    }
}
