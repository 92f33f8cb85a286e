//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{InstanceSelector, ServiceInstance};

/// Round-robin selector.
/// Stores an internal cursor to rotate through instances.
///
/// The cursor increments unconditionally, even across concurrent callers;
/// a race may skip or repeat an instance, which is acceptable since strict
/// fairness is not required. The cursor is reduced modulo the healthy
/// count at selection time, never a stale count.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InstanceSelector for RoundRobin {
    fn select(&self, instances: &[Arc<ServiceInstance>]) -> Option<Arc<ServiceInstance>> {
        if instances.is_empty() {
            return None;
        }

        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % instances.len();
        Some(instances[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn instance(port: u16) -> Arc<ServiceInstance> {
        let url = Url::parse(&format!("http://127.0.0.1:{}", port)).unwrap();
        Arc::new(ServiceInstance::new(url))
    }

    #[test]
    fn rotates_a_b_a() {
        let lb = RoundRobin::new();
        let a = instance(3001);
        let b = instance(3002);
        let instances = vec![a.clone(), b.clone()];

        assert_eq!(lb.select(&instances).unwrap().id, a.id);
        assert_eq!(lb.select(&instances).unwrap().id, b.id);
        assert_eq!(lb.select(&instances).unwrap().id, a.id);
    }

    #[test]
    fn cursor_wraps_when_set_shrinks() {
        let lb = RoundRobin::new();
        let a = instance(3001);
        let b = instance(3002);

        // Advance cursor over a two-instance set, then shrink to one.
        let both = vec![a.clone(), b.clone()];
        lb.select(&both);
        lb.select(&both);

        let only_a = vec![a.clone()];
        assert_eq!(lb.select(&only_a).unwrap().id, a.id);
    }

    #[test]
    fn empty_set_yields_none() {
        let lb = RoundRobin::new();
        assert!(lb.select(&[]).is_none());
    }
}
