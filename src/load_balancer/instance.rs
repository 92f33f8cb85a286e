//! Service instance abstraction.
//!
//! # Responsibilities
//! - Represent a single backend instance of a logical service
//! - Track active connections (for Least Connections LB)
//! - Track health state and last observed response time
//!
//! # Design Decisions
//! - All mutable fields are atomics; instances are shared via Arc and
//!   never locked
//! - Connection counting is a selection signal, not an admission gate

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use url::Url;
use uuid::Uuid;

/// A single instance of a logical backend service.
#[derive(Debug)]
pub struct ServiceInstance {
    /// Stable instance identifier.
    pub id: Uuid,
    /// Base URL requests are forwarded to.
    pub url: Url,
    /// Current health flag. Instances start healthy (optimistic).
    healthy: AtomicBool,
    /// Number of currently active forwarded requests.
    pub active_connections: AtomicUsize,
    /// Last probe round-trip in milliseconds.
    response_time_ms: AtomicU64,
    /// Unix timestamp (ms) of the last completed probe.
    last_check_unix_ms: AtomicU64,
}

impl ServiceInstance {
    /// Create a new instance. Starts healthy so traffic flows before the
    /// first probe completes.
    pub fn new(url: Url) -> Self {
        Self {
            id: Uuid::new_v4(),
            url,
            healthy: AtomicBool::new(true),
            active_connections: AtomicUsize::new(0),
            response_time_ms: AtomicU64::new(0),
            last_check_unix_ms: AtomicU64::new(0),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    /// Record a successful probe. Returns true if this flipped the
    /// instance from unhealthy to healthy.
    pub fn mark_healthy(&self, response_time_ms: u64) -> bool {
        self.response_time_ms.store(response_time_ms, Ordering::Relaxed);
        self.touch_last_check();
        !self.healthy.swap(true, Ordering::Relaxed)
    }

    /// Record a failed probe. Returns true if this flipped the instance
    /// from healthy to unhealthy.
    pub fn mark_unhealthy(&self) -> bool {
        self.touch_last_check();
        self.healthy.swap(false, Ordering::Relaxed)
    }

    pub fn response_time_ms(&self) -> u64 {
        self.response_time_ms.load(Ordering::Relaxed)
    }

    pub fn last_check_unix_ms(&self) -> u64 {
        self.last_check_unix_ms.load(Ordering::Relaxed)
    }

    /// Get the current number of active connections.
    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Increment active connection count.
    pub fn inc_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement active connection count, flooring at zero.
    pub fn dec_connections(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Create a guard that holds one active connection slot and releases
    /// it on drop, whatever the exit path.
    pub fn connection_guard(self: &Arc<Self>) -> ConnectionGuard {
        self.inc_connections();
        ConnectionGuard {
            instance: self.clone(),
        }
    }

    fn touch_last_check(&self) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.last_check_unix_ms.store(now_ms, Ordering::Relaxed);
    }
}

/// A RAII guard that manages the active connection count.
#[derive(Debug)]
pub struct ConnectionGuard {
    pub instance: Arc<ServiceInstance>,
}

impl Deref for ConnectionGuard {
    type Target = ServiceInstance;
    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.instance.dec_connections();
    }
}
