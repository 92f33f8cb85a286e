//! Token bucket rate limiting.
//!
//! Tokens accrue at a fixed rate up to a capacity; each admitted request
//! spends its cost. Bursts up to the capacity are allowed after idle
//! periods, then admission smooths out to the refill rate.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::rate_limit::{RateLimitDecision, RateLimitStrategy};

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket limiter.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    capacity: u32,
    refill_per_sec: f64,
    entries: DashMap<String, Bucket>,
}

impl TokenBucketLimiter {
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            refill_per_sec,
            entries: DashMap::new(),
        }
    }
}

impl RateLimitStrategy for TokenBucketLimiter {
    fn consume(&self, key: &str, cost: u32) -> RateLimitDecision {
        let now = Instant::now();
        let capacity = self.capacity as f64;
        let cost = cost as f64;

        let mut bucket = self.entries.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        let refilled = (bucket.tokens + elapsed * self.refill_per_sec).min(capacity);

        let allowed = refilled >= cost;
        if allowed {
            // Rejections leave the bucket untouched; the refill is purely
            // time-derived, so skipping the write loses nothing.
            bucket.tokens = refilled - cost;
            bucket.last_refill = now;
        }

        let tokens_after = if allowed { refilled - cost } else { refilled };
        let reset_after = if allowed {
            // Time until the bucket is full again.
            Duration::from_secs_f64((capacity - tokens_after) / self.refill_per_sec)
        } else {
            // Time until enough tokens accrue for this cost.
            Duration::from_secs_f64((cost - refilled) / self.refill_per_sec)
        };

        RateLimitDecision {
            allowed,
            limit: self.capacity,
            remaining: tokens_after.floor() as u32,
            reset_after,
        }
    }

    fn purge_expired(&self) {
        // A bucket that would be full again carries no admission state.
        let refill = self.refill_per_sec;
        let capacity = self.capacity as f64;
        self.entries.retain(|_, bucket| {
            let elapsed = bucket.last_refill.elapsed().as_secs_f64();
            bucket.tokens + elapsed * refill < capacity
        });
    }

    fn name(&self) -> &'static str {
        "token_bucket"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_up_to_capacity() {
        let limiter = TokenBucketLimiter::new(3, 1.0);
        assert!(limiter.consume("k", 1).allowed);
        assert!(limiter.consume("k", 1).allowed);
        assert!(limiter.consume("k", 1).allowed);
        assert!(!limiter.consume("k", 1).allowed);
    }

    #[test]
    fn refill_caps_at_capacity() {
        // Drain, then idle well past capacity/rate: available tokens must
        // equal capacity exactly, never more.
        let limiter = TokenBucketLimiter::new(2, 10.0);
        assert!(limiter.consume("k", 2).allowed);
        assert!(!limiter.consume("k", 1).allowed);

        std::thread::sleep(Duration::from_millis(250)); // >= capacity/rate

        let d = limiter.consume("k", 1);
        assert!(d.allowed);
        assert_eq!(d.remaining, 1); // capacity 2, one spent
        assert!(limiter.consume("k", 1).allowed);
        assert!(!limiter.consume("k", 1).allowed);
    }

    #[test]
    fn rejection_does_not_mutate_state() {
        let limiter = TokenBucketLimiter::new(1, 1000.0);
        assert!(limiter.consume("k", 1).allowed);

        // An immediate oversized request is rejected.
        let denied = limiter.consume("k", 5);
        assert!(!denied.allowed);

        // The rejection must not have reset the refill clock.
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.consume("k", 1).allowed);
    }

    #[test]
    fn denied_decision_reports_wait_time() {
        let limiter = TokenBucketLimiter::new(1, 2.0);
        assert!(limiter.consume("k", 1).allowed);
        let d = limiter.consume("k", 1);
        assert!(!d.allowed);
        // One token at 2/sec is about half a second out.
        assert!(d.reset_after >= Duration::from_millis(300));
        assert!(d.reset_after <= Duration::from_millis(600));
    }

    #[test]
    fn purge_drops_full_buckets() {
        let limiter = TokenBucketLimiter::new(1, 100.0);
        limiter.consume("idle", 1);
        std::thread::sleep(Duration::from_millis(30)); // fully refilled

        limiter.purge_expired();
        assert!(!limiter.entries.contains_key("idle"));
    }
}
