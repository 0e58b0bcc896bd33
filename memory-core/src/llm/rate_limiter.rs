//! Token-bucket rate limiting, one bucket per provider (spec §4.2).

use parking_lot::Mutex;
use std::time::{Duration, Instant};

struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }
}

/// A simple token-bucket limiter guarding calls to a single LLM provider.
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_minute` steady-state
    /// throughput with a burst capacity equal to that same count.
    #[must_use]
    pub fn new(requests_per_minute: u32) -> Self {
        let capacity = f64::from(requests_per_minute.max(1));
        Self {
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                capacity,
                refill_per_sec: capacity / 60.0,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Attempt to consume one token. Returns `true` if the call may
    /// proceed, `false` if the caller should back off.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock();
        bucket.refill();
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// How long the caller should wait before a retry is likely to
    /// succeed, based on the current deficit.
    #[must_use]
    pub fn retry_after(&self) -> Duration {
        let bucket = self.bucket.lock();
        if bucket.tokens >= 1.0 {
            return Duration::ZERO;
        }
        let deficit = 1.0 - bucket.tokens;
        Duration::from_secs_f64(deficit / bucket.refill_per_sec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_then_recovers_over_time() {
        let limiter = RateLimiter::new(60);
        for _ in 0..60 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
        assert!(limiter.retry_after() > Duration::ZERO);
    }

    #[test]
    fn new_limiter_allows_at_least_one_call() {
        let limiter = RateLimiter::new(0);
        assert!(limiter.try_acquire());
    }
}
