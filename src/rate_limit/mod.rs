//! Rate limiting subsystem.
//!
//! # Data Flow
//! ```text
//! Request admitted into the gateway handler
//!     → key built from (identity-or-ip, path)
//!     → strategy.consume(key) decides allow/deny
//!     → decision drives 429 + X-RateLimit-* headers
//!
//! After the upstream call completes:
//!     → record_outcome(key, success, latency)
//!     → adaptive strategy re-tunes per-key limits on window boundaries
//! ```
//!
//! # Design Decisions
//! - One capability across strategies: consume(key, cost) → decision
//! - Entries are created lazily per key and swept by a cleanup task owned
//!   by the limiter (stopped via the shutdown broadcast)
//! - Fixed window keeps its documented boundary double-admission; sliding
//!   window and adaptive exist as the stricter alternatives

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::config::{RateLimitConfig, RateLimitStrategyKind};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

pub mod adaptive;
pub mod fixed_window;
pub mod sliding_window;
pub mod token_bucket;

pub use adaptive::AdaptiveLimiter;
pub use fixed_window::FixedWindowLimiter;
pub use sliding_window::SlidingWindowLimiter;
pub use token_bucket::TokenBucketLimiter;

/// Outcome of a consume() call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Limit currently in force for the key.
    pub limit: u32,
    /// Admissions left in the current window (0 when denied).
    pub remaining: u32,
    /// Time until the window resets (or enough tokens accrue).
    pub reset_after: Duration,
}

/// Signal fed back to strategies that adapt to observed behavior.
#[derive(Debug, Clone, Copy)]
pub struct RequestOutcome {
    pub success: bool,
    pub latency: Duration,
}

/// A rate limiting strategy, polymorphic over one capability.
pub trait RateLimitStrategy: Send + Sync {
    /// Admit or reject `cost` units for `key`.
    fn consume(&self, key: &str, cost: u32) -> RateLimitDecision;

    /// Observe the outcome of an admitted request. Only the adaptive
    /// strategy uses this.
    fn record_outcome(&self, _key: &str, _outcome: RequestOutcome) {}

    /// Drop entries whose window has fully elapsed.
    fn purge_expired(&self);

    /// Strategy name for logs and metrics.
    fn name(&self) -> &'static str;
}

/// Keyed rate limiter facade over the configured strategy.
pub struct RateLimiter {
    strategy: Arc<dyn RateLimitStrategy>,
    enabled: bool,
    cleanup_interval: Duration,
}

impl RateLimiter {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let window = Duration::from_millis(config.window_ms);
        let strategy: Arc<dyn RateLimitStrategy> = match config.strategy {
            RateLimitStrategyKind::FixedWindow => {
                Arc::new(FixedWindowLimiter::new(config.max_requests, window))
            }
            RateLimitStrategyKind::SlidingWindow => {
                Arc::new(SlidingWindowLimiter::new(config.max_requests, window))
            }
            RateLimitStrategyKind::TokenBucket => Arc::new(TokenBucketLimiter::new(
                config.burst_capacity,
                config.refill_per_sec,
            )),
            RateLimitStrategyKind::Adaptive => Arc::new(AdaptiveLimiter::new(
                config.max_requests,
                window,
                config.adaptive.clone(),
            )),
        };

        tracing::info!(strategy = strategy.name(), enabled = config.enabled, "Rate limiter ready");

        Self {
            strategy,
            enabled: config.enabled,
            cleanup_interval: Duration::from_secs(config.cleanup_interval_secs),
        }
    }

    /// Admit or reject one request for `key`.
    pub fn consume(&self, key: &str, cost: u32) -> RateLimitDecision {
        if !self.enabled {
            return RateLimitDecision {
                allowed: true,
                limit: u32::MAX,
                remaining: u32::MAX,
                reset_after: Duration::ZERO,
            };
        }
        let decision = self.strategy.consume(key, cost);
        if !decision.allowed {
            tracing::warn!(
                key = %key,
                strategy = self.strategy.name(),
                limit = decision.limit,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited(self.strategy.name());
        }
        decision
    }

    /// Feed an observed request outcome back to the strategy.
    pub fn record_outcome(&self, key: &str, outcome: RequestOutcome) {
        if self.enabled {
            self.strategy.record_outcome(key, outcome);
        }
    }

    /// Spawn the expired-entry sweep loop, stopped by the shutdown
    /// broadcast. The timer is owned here, never a process-wide global.
    pub fn spawn_cleanup(&self, shutdown: &Shutdown) {
        if !self.enabled {
            return;
        }
        let strategy = self.strategy.clone();
        let interval = self.cleanup_interval;
        let mut rx = shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        strategy.purge_expired();
                    }
                    _ = rx.recv() => {
                        tracing::debug!("Rate limit cleanup received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        });
    }
}

/// Rate limit key for a request: authenticated identity when present,
/// client IP otherwise, always scoped by path.
pub fn request_key(identity: &str, path: &str) -> String {
    format!("{}:{}", identity, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_limiter_always_allows() {
        let mut config = RateLimitConfig::default();
        config.enabled = false;
        config.max_requests = 1;
        let limiter = RateLimiter::from_config(&config);

        for _ in 0..10 {
            assert!(limiter.consume("k:/p", 1).allowed);
        }
    }

    #[test]
    fn facade_delegates_to_configured_strategy() {
        let mut config = RateLimitConfig::default();
        config.strategy = RateLimitStrategyKind::SlidingWindow;
        config.max_requests = 2;
        config.window_ms = 60_000;
        let limiter = RateLimiter::from_config(&config);

        assert!(limiter.consume("k:/p", 1).allowed);
        assert!(limiter.consume("k:/p", 1).allowed);
        assert!(!limiter.consume("k:/p", 1).allowed);
        // Other keys are unaffected.
        assert!(limiter.consume("other:/p", 1).allowed);
    }

    #[test]
    fn key_combines_identity_and_path() {
        assert_eq!(request_key("10.0.0.1", "/api/devices"), "10.0.0.1:/api/devices");
    }
}
