//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Per-service periodic timer
//!     → Probe each instance's health path
//!     → Flip instance health flag, record response time
//! ```
//!
//! # Design Decisions
//! - One probe loop per service, each on its own timer
//! - A single failed probe marks an instance unhealthy (no debounce);
//!   flapping under an intermittent backend is an accepted trade-off
//! - Probe loops stop on the shutdown broadcast, never leaked

pub mod active;

pub use active::HealthMonitor;
