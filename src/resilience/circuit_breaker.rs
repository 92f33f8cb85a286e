//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: testing if backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold
//! Open → Half-Open: after retry timeout, first caller becomes the trial
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails, timeout restarts
//! ```
//!
//! # Design Decisions
//! - Per-service circuit breaker (not per-instance)
//! - Fail fast in Open state: the wrapped call is never started
//! - Exactly one trial in Half-Open; concurrent callers are rejected as if
//!   the circuit were still Open, so a recovering backend sees one probe

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open; the call was not started.
    #[error("circuit open")]
    Open,
    /// The call ran and failed; the failure has been counted.
    #[error("wrapped call failed")]
    Inner(E),
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

enum Admission {
    Allowed { trial: bool },
    Rejected,
}

/// Circuit breaker guarding one logical service.
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    failure_threshold: u32,
    retry_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self {
            service: service.into(),
            failure_threshold: config.failure_threshold,
            retry_timeout: Duration::from_millis(config.retry_timeout_ms),
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Run `call` under the breaker. In Open state the future is dropped
    /// without being polled. Success and failure of the call update the
    /// breaker before the result is returned.
    pub async fn execute<T, E, F>(&self, call: F) -> Result<T, BreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        let trial = match self.try_admit() {
            Admission::Allowed { trial } => trial,
            Admission::Rejected => return Err(BreakerError::Open),
        };

        match call.await {
            Ok(value) => {
                self.record_success(trial);
                Ok(value)
            }
            Err(e) => {
                self.record_failure(trial);
                Err(BreakerError::Inner(e))
            }
        }
    }

    /// Current state, refreshing Open → HalfOpen eligibility is NOT done
    /// here; this is a plain observation for status reporting and tests.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("breaker mutex poisoned").state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner
            .lock()
            .expect("breaker mutex poisoned")
            .failure_count
    }

    fn try_admit(&self) -> Admission {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        match inner.state {
            CircuitState::Closed => Admission::Allowed { trial: false },
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed < self.retry_timeout {
                    return Admission::Rejected;
                }
                inner.state = CircuitState::HalfOpen;
                inner.trial_in_flight = true;
                tracing::info!(service = %self.service, "Circuit half-open, admitting trial call");
                metrics::record_circuit_transition(&self.service, CircuitState::HalfOpen);
                Admission::Allowed { trial: true }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    // Treated as still-open: fail fast instead of piling a
                    // retry herd onto a possibly-still-broken backend.
                    Admission::Rejected
                } else {
                    inner.trial_in_flight = true;
                    Admission::Allowed { trial: true }
                }
            }
        }
    }

    fn record_success(&self, trial: bool) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        inner.failure_count = 0;
        if trial {
            inner.trial_in_flight = false;
        }
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Closed;
            inner.opened_at = None;
            tracing::info!(service = %self.service, "Circuit closed after successful trial");
            metrics::record_circuit_transition(&self.service, CircuitState::Closed);
        }
    }

    fn record_failure(&self, trial: bool) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        inner.failure_count += 1;
        if trial {
            inner.trial_in_flight = false;
        }
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                tracing::warn!(service = %self.service, "Circuit re-opened after failed trial");
                metrics::record_circuit_transition(&self.service, CircuitState::Open);
            }
            CircuitState::Closed => {
                if inner.failure_count >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    tracing::warn!(
                        service = %self.service,
                        failures = inner.failure_count,
                        "Circuit opened"
                    );
                    metrics::record_circuit_transition(&self.service, CircuitState::Open);
                }
            }
            // A call admitted before the circuit opened may report late;
            // the count was already taken above, nothing else to do.
            CircuitState::Open => {}
        }
    }
}

/// Lazily-populated map of per-service breakers sharing one config.
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: CircuitBreakerConfig,
}

impl BreakerRegistry {
    /// Build the registry, pre-creating a breaker per known service.
    pub fn new(config: CircuitBreakerConfig, services: &[String]) -> Self {
        let breakers = DashMap::new();
        for service in services {
            breakers.insert(
                service.clone(),
                Arc::new(CircuitBreaker::new(service.clone(), &config)),
            );
        }
        Self { breakers, config }
    }

    /// Breaker for a service, created on first use for services registered
    /// after startup.
    pub fn breaker(&self, service: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(service, &self.config)))
            .clone()
    }

    /// (service, state) pairs for status reporting.
    pub fn states(&self) -> Vec<(String, CircuitState)> {
        self.breakers
            .iter()
            .map(|e| (e.key().clone(), e.value().state()))
            .collect()
    }
}
