//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{InstanceSelector, ServiceInstance};

/// Least connections selector.
/// Selects the instance with the minimum number of active connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InstanceSelector for LeastConnections {
    fn select(&self, instances: &[Arc<ServiceInstance>]) -> Option<Arc<ServiceInstance>> {
        // In case of tie, the first one is selected (registration order)
        instances
            .iter()
            .min_by_key(|i| i.connection_count())
            .cloned()
    }
}
