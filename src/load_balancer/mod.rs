//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Path prefix matched → service name identified
//!     → registry.rs (snapshot current instances, filter healthy)
//!     → Apply balancing strategy over the healthy set:
//!         - round_robin.rs (rotate through instances)
//!         - least_conn.rs (pick instance with fewest connections)
//!         - fastest.rs (pick instance with lowest response time)
//!     → instance.rs (acquire connection guard)
//!     → Return instance or degraded fallback
//! ```
//!
//! # Design Decisions
//! - Strategies see only the healthy subset; degraded fallback is the
//!   registry's responsibility
//! - Instance lists are immutable snapshots; readers never observe a
//!   half-written record
//! - Ties broken by registration order

use std::sync::Arc;

pub mod fastest;
pub mod instance;
pub mod least_conn;
pub mod registry;
pub mod round_robin;

pub use instance::{ConnectionGuard, ServiceInstance};
pub use registry::ServiceRegistry;

/// Strategy for picking one instance out of the healthy set.
pub trait InstanceSelector: Send + Sync + std::fmt::Debug {
    /// Select an instance. `instances` is already filtered to healthy
    /// members, in registration order.
    fn select(&self, instances: &[Arc<ServiceInstance>]) -> Option<Arc<ServiceInstance>>;
}
