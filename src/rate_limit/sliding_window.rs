//! Sliding window log rate limiting.
//!
//! Tracks the exact timestamp of every admitted request inside the
//! trailing window. Exact enforcement (no boundary double-admission),
//! paid for with memory proportional to request volume per key.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::rate_limit::{RateLimitDecision, RateLimitStrategy};

/// Sliding-window log limiter.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_requests: u32,
    window: Duration,
    entries: DashMap<String, VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            entries: DashMap::new(),
        }
    }
}

impl RateLimitStrategy for SlidingWindowLimiter {
    fn consume(&self, key: &str, cost: u32) -> RateLimitDecision {
        let now = Instant::now();
        let mut log = self
            .entries
            .entry(key.to_string())
            .or_insert_with(VecDeque::new);

        // Drop timestamps that have slid out of the trailing window.
        while let Some(front) = log.front() {
            if now.duration_since(*front) >= self.window {
                log.pop_front();
            } else {
                break;
            }
        }

        let in_window = log.len() as u32;
        let allowed = in_window + cost <= self.max_requests;
        if allowed {
            for _ in 0..cost {
                log.push_back(now);
            }
        }

        let counted = if allowed { in_window + cost } else { in_window };
        // The window frees a slot when the earliest admitted request ages out.
        let reset_after = log
            .front()
            .map(|front| self.window.saturating_sub(now.duration_since(*front)))
            .unwrap_or(Duration::ZERO);

        RateLimitDecision {
            allowed,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(counted),
            reset_after,
        }
    }

    fn purge_expired(&self) {
        let window = self.window;
        self.entries.retain(|_, log| {
            log.back()
                .map(|last| last.elapsed() < window)
                .unwrap_or(false)
        });
    }

    fn name(&self) -> &'static str {
        "sliding_window"
    }
}
