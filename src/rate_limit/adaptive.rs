//! Adaptive rate limiting.
//!
//! Wraps fixed-window accounting with a per-key limit that reacts to
//! observed backend behavior: a healthy, fast backend earns a higher
//! limit; a failing or slow one gets throttled down. Adjustments happen
//! only on evaluation boundaries (every `evaluation_window` outcomes),
//! never mid-window.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::schema::AdaptiveConfig;
use crate::rate_limit::fixed_window::FixedWindowLimiter;
use crate::rate_limit::{RateLimitDecision, RateLimitStrategy, RequestOutcome};

/// Success rate above which the limit is raised.
const RAISE_SUCCESS_RATE: f64 = 0.95;
/// Success rate below which the limit is lowered.
const LOWER_SUCCESS_RATE: f64 = 0.8;

#[derive(Debug)]
struct KeyState {
    current_limit: u32,
    observed: u32,
    successes: u32,
    latency_sum: Duration,
    last_activity: Instant,
}

/// Adaptive limiter built on fixed-window admission.
pub struct AdaptiveLimiter {
    window_accounting: FixedWindowLimiter,
    base_limit: u32,
    window: Duration,
    config: AdaptiveConfig,
    keys: DashMap<String, KeyState>,
}

impl AdaptiveLimiter {
    pub fn new(base_limit: u32, window: Duration, config: AdaptiveConfig) -> Self {
        Self {
            window_accounting: FixedWindowLimiter::new(base_limit, window),
            base_limit: base_limit.clamp(config.limit_min, config.limit_max),
            window,
            config,
            keys: DashMap::new(),
        }
    }

    /// Current per-key limit (the base limit until first adjustment).
    pub fn limit_for(&self, key: &str) -> u32 {
        self.keys
            .get(key)
            .map(|s| s.current_limit)
            .unwrap_or(self.base_limit)
    }

    fn evaluate(&self, key: &str, state: &mut KeyState) {
        let success_rate = state.successes as f64 / state.observed as f64;
        let avg_latency = state.latency_sum / state.observed;
        let factor = self.config.adjust_factor;

        let previous = state.current_limit;
        if success_rate > RAISE_SUCCESS_RATE
            && avg_latency < Duration::from_millis(self.config.latency_low_ms)
        {
            let raised = ((previous as f64) * (1.0 + factor)).round() as u32;
            state.current_limit = raised.max(previous + 1).min(self.config.limit_max);
        } else if success_rate < LOWER_SUCCESS_RATE
            || avg_latency > Duration::from_millis(self.config.latency_high_ms)
        {
            let lowered = ((previous as f64) * (1.0 - factor)).round() as u32;
            state.current_limit = lowered.min(previous.saturating_sub(1)).max(self.config.limit_min);
        }

        if state.current_limit != previous {
            tracing::info!(
                key = %key,
                previous_limit = previous,
                new_limit = state.current_limit,
                success_rate = format!("{:.2}", success_rate),
                avg_latency_ms = avg_latency.as_millis() as u64,
                "Adaptive limit adjusted"
            );
        }

        state.observed = 0;
        state.successes = 0;
        state.latency_sum = Duration::ZERO;
    }
}

impl RateLimitStrategy for AdaptiveLimiter {
    fn consume(&self, key: &str, cost: u32) -> RateLimitDecision {
        let limit = self.limit_for(key);
        self.window_accounting.consume_with_limit(key, cost, limit)
    }

    fn record_outcome(&self, key: &str, outcome: RequestOutcome) {
        let mut state = self.keys.entry(key.to_string()).or_insert_with(|| KeyState {
            current_limit: self.base_limit,
            observed: 0,
            successes: 0,
            latency_sum: Duration::ZERO,
            last_activity: Instant::now(),
        });

        state.observed += 1;
        if outcome.success {
            state.successes += 1;
        }
        state.latency_sum += outcome.latency;
        state.last_activity = Instant::now();

        if state.observed >= self.config.evaluation_window {
            let key_owned = state.key().clone();
            self.evaluate(&key_owned, state.value_mut());
        }
    }

    fn purge_expired(&self) {
        self.window_accounting.purge_expired();
        // Tuning state for keys idle for many windows is stale; drop it so
        // a returning key starts from the base limit.
        let idle_cutoff = self.window * 10;
        self.keys
            .retain(|_, state| state.last_activity.elapsed() < idle_cutoff);
    }

    fn name(&self) -> &'static str {
        "adaptive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AdaptiveConfig {
        AdaptiveConfig {
            evaluation_window: 4,
            adjust_factor: 0.25,
            limit_min: 2,
            limit_max: 20,
            latency_low_ms: 100,
            latency_high_ms: 1000,
        }
    }

    fn outcome(success: bool, latency_ms: u64) -> RequestOutcome {
        RequestOutcome {
            success,
            latency: Duration::from_millis(latency_ms),
        }
    }

    #[test]
    fn raises_limit_on_healthy_traffic() {
        let limiter = AdaptiveLimiter::new(8, Duration::from_secs(60), config());
        assert_eq!(limiter.limit_for("k"), 8);

        for _ in 0..4 {
            limiter.record_outcome("k", outcome(true, 10));
        }
        assert_eq!(limiter.limit_for("k"), 10); // 8 * 1.25
    }

    #[test]
    fn lowers_limit_on_failures() {
        let limiter = AdaptiveLimiter::new(8, Duration::from_secs(60), config());
        for _ in 0..2 {
            limiter.record_outcome("k", outcome(true, 10));
        }
        for _ in 0..2 {
            limiter.record_outcome("k", outcome(false, 10));
        }
        assert_eq!(limiter.limit_for("k"), 6); // 8 * 0.75
    }

    #[test]
    fn lowers_limit_on_high_latency() {
        let limiter = AdaptiveLimiter::new(8, Duration::from_secs(60), config());
        for _ in 0..4 {
            limiter.record_outcome("k", outcome(true, 5000));
        }
        assert_eq!(limiter.limit_for("k"), 6);
    }

    #[test]
    fn adjusts_only_on_evaluation_boundaries() {
        let limiter = AdaptiveLimiter::new(8, Duration::from_secs(60), config());
        for _ in 0..3 {
            limiter.record_outcome("k", outcome(true, 10));
            assert_eq!(limiter.limit_for("k"), 8);
        }
        limiter.record_outcome("k", outcome(true, 10));
        assert_eq!(limiter.limit_for("k"), 10);
    }

    #[test]
    fn limit_respects_bounds() {
        let limiter = AdaptiveLimiter::new(8, Duration::from_secs(60), config());

        // Drive the limit to the floor.
        for _ in 0..20 {
            for _ in 0..4 {
                limiter.record_outcome("k", outcome(false, 10));
            }
        }
        assert_eq!(limiter.limit_for("k"), 2);

        // And back up to the ceiling.
        for _ in 0..40 {
            for _ in 0..4 {
                limiter.record_outcome("k", outcome(true, 10));
            }
        }
        assert_eq!(limiter.limit_for("k"), 20);
    }

    #[test]
    fn admission_uses_tuned_limit() {
        let limiter = AdaptiveLimiter::new(4, Duration::from_secs(60), config());
        for _ in 0..4 {
            limiter.record_outcome("k", outcome(false, 10));
        }
        let tuned = limiter.limit_for("k");
        assert_eq!(tuned, 3);

        let mut admitted = 0;
        for _ in 0..10 {
            if limiter.consume("k", 1).allowed {
                admitted += 1;
            }
        }
        assert_eq!(admitted, tuned);
    }

    #[test]
    fn midband_traffic_leaves_limit_unchanged() {
        let mut cfg = config();
        cfg.evaluation_window = 8;
        let limiter = AdaptiveLimiter::new(8, Duration::from_secs(60), cfg);

        for _ in 0..7 {
            limiter.record_outcome("k", outcome(true, 500));
        }
        limiter.record_outcome("k", outcome(false, 500));

        // 0.875 success and mid-band latency: no adjustment either way.
        assert_eq!(limiter.limit_for("k"), 8);
    }
}
