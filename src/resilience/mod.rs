//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → bounded timeout around the upstream call (http layer)
//!     → circuit_breaker.rs (track failures, open circuit on threshold)
//!     → Open circuit: fail fast, call never dispatched
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline and
//!   a timeout counts as a circuit failure
//! - No automatic retries inside a request: the next request re-selects
//!   an instance instead, so outages are never amplified
//! - Circuit breaker is per logical service, independent of which
//!   instance the balancer picked

pub mod circuit_breaker;

pub use circuit_breaker::{BreakerError, BreakerRegistry, CircuitBreaker, CircuitState};
