//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → structured log events (tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!     → tracer.rs (per-request completion records)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Trace ID flows through all subsystems and to the backend
//! - Metrics are cheap (atomic increments)
//! - The tracer is an explicit collaborator injected into the router

pub mod metrics;
pub mod tracer;

pub use tracer::{RequestTrace, Tracer};
