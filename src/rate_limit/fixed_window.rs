//! Fixed window rate limiting.
//!
//! One counter per key per window. Cheapest strategy, with a documented
//! edge: two adjacent windows can each admit up to the limit, so a short
//! interval straddling the boundary can see up to twice the limit. That
//! trade-off is intentional; use the sliding window strategy when exact
//! enforcement matters.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::rate_limit::{RateLimitDecision, RateLimitStrategy};

#[derive(Debug)]
struct WindowEntry {
    count: u32,
    window_started: Instant,
}

/// Fixed-window counter limiter.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    max_requests: u32,
    window: Duration,
    entries: DashMap<String, WindowEntry>,
}

impl FixedWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            entries: DashMap::new(),
        }
    }

    /// Consume against an explicit limit. The adaptive strategy calls this
    /// with its per-key tuned limit; `consume` uses the configured one.
    ///
    /// The counter increments whether or not the request is admitted,
    /// mirroring atomic-increment store semantics.
    pub(crate) fn consume_with_limit(&self, key: &str, cost: u32, limit: u32) -> RateLimitDecision {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| WindowEntry {
                count: 0,
                window_started: Instant::now(),
            });

        let elapsed = entry.window_started.elapsed();
        if elapsed >= self.window {
            entry.count = 0;
            entry.window_started = Instant::now();
        }

        entry.count = entry.count.saturating_add(cost);
        let allowed = entry.count <= limit;

        RateLimitDecision {
            allowed,
            limit,
            remaining: limit.saturating_sub(entry.count),
            reset_after: self.window.saturating_sub(entry.window_started.elapsed()),
        }
    }
}

impl RateLimitStrategy for FixedWindowLimiter {
    fn consume(&self, key: &str, cost: u32) -> RateLimitDecision {
        self.consume_with_limit(key, cost, self.max_requests)
    }

    fn purge_expired(&self) {
        self.entries
            .retain(|_, entry| entry.window_started.elapsed() < self.window);
    }

    fn name(&self) -> &'static str {
        "fixed_window"
    }
}
