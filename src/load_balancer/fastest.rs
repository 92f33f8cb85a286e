//! Fastest-response load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{InstanceSelector, ServiceInstance};

/// Fastest response selector.
/// Selects the instance with the lowest response time observed by the
/// health checker. Fresh instances report 0ms and therefore win until a
/// probe has measured them.
#[derive(Debug, Default)]
pub struct FastestResponse;

impl FastestResponse {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InstanceSelector for FastestResponse {
    fn select(&self, instances: &[Arc<ServiceInstance>]) -> Option<Arc<ServiceInstance>> {
        // In case of tie, the first one is selected (registration order)
        instances
            .iter()
            .min_by_key(|i| i.response_time_ms())
            .cloned()
    }
}
