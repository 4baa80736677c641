//! # Rate Limiter
//!
//! Token bucket used by the hub to shed heartbeat load.
//!
//! A refused token maps to `503 Service Unavailable`, which nodes treat as
//! an overload signal and answer with a wider backoff.

use parking_lot::Mutex;
use std::time::Instant;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

/// Admission bucket refilled continuously at `refill_rate` tokens per second.
///
/// Partial tokens carry over between calls, so a slow refill rate still
/// admits its full budget over time.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    refill_rate: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Full bucket of `capacity` tokens, refilled at `refill_rate` per second.
    pub fn new(capacity: u64, refill_rate: u64) -> Self {
        Self {
            capacity: capacity as f64,
            refill_rate: refill_rate as f64,
            bucket: Mutex::new(Bucket {
                tokens: capacity as f64,
                refilled_at: Instant::now(),
            }),
        }
    }

    /// Bucket sized for a per-second heartbeat budget, bursting to twice that.
    pub fn per_second(rate: u64) -> Self {
        Self::new(rate.saturating_mul(2).max(1), rate)
    }

    /// Take one token if available.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock();
        self.top_up(&mut bucket, Instant::now());
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whole tokens currently in the bucket.
    pub fn available(&self) -> u64 {
        let mut bucket = self.bucket.lock();
        self.top_up(&mut bucket, Instant::now());
        bucket.tokens.floor() as u64
    }

    pub fn is_limited(&self) -> bool {
        self.available() == 0
    }

    fn top_up(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.refilled_at);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        bucket.refilled_at = now;
    }
}
