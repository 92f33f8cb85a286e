//! Service registry and instance selection.
//!
//! # Responsibilities
//! - Manage instances grouped by logical service name
//! - Apply the configured balancing strategy to select an instance
//! - Fall back to a raw instance when no healthy one exists (degraded mode)
//!
//! # Design Decisions
//! - Instance lists are ArcSwap snapshots: registration replaces the whole
//!   list atomically, selection reads a consistent snapshot without locks
//! - Availability over strict health: an all-unhealthy service still gets
//!   its first instance, with a warning logged

use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use url::Url;
use uuid::Uuid;

use crate::config::schema::{BalanceStrategy, HealthCheckConfig, ServiceConfig};
use crate::load_balancer::fastest::FastestResponse;
use crate::load_balancer::instance::ServiceInstance;
use crate::load_balancer::least_conn::LeastConnections;
use crate::load_balancer::round_robin::RoundRobin;
use crate::load_balancer::InstanceSelector;

/// One logical service: its instances and how to pick among them.
struct ServiceGroup {
    instances: ArcSwap<Vec<Arc<ServiceInstance>>>,
    selector: Box<dyn InstanceSelector>,
    health_check: HealthCheckConfig,
}

/// Error registering a service.
#[derive(Debug, thiserror::Error)]
#[error("invalid instance URL {url:?} for service {service:?}")]
pub struct RegisterError {
    pub service: String,
    pub url: String,
}

/// Registry of logical services and their instances.
pub struct ServiceRegistry {
    services: DashMap<String, ServiceGroup>,
    by_id: DashMap<Uuid, Arc<ServiceInstance>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
            by_id: DashMap::new(),
        }
    }

    /// Register (or re-register) a service. Idempotent: registering the
    /// same name again atomically replaces its instance list.
    pub fn register_service(&self, config: &ServiceConfig) -> Result<(), RegisterError> {
        let mut instances = Vec::with_capacity(config.instances.len());
        for raw in &config.instances {
            let url = Url::parse(raw).map_err(|_| RegisterError {
                service: config.name.clone(),
                url: raw.clone(),
            })?;
            instances.push(Arc::new(ServiceInstance::new(url)));
        }

        let selector: Box<dyn InstanceSelector> = match config.strategy {
            BalanceStrategy::RoundRobin => Box::new(RoundRobin::new()),
            BalanceStrategy::LeastConnections => Box::new(LeastConnections::new()),
            BalanceStrategy::FastestResponse => Box::new(FastestResponse::new()),
        };

        for instance in &instances {
            self.by_id.insert(instance.id, instance.clone());
        }

        if let Some(group) = self.services.get(&config.name) {
            // Re-registration: drop the old snapshot's id index entries.
            for old in group.instances.load().iter() {
                self.by_id.remove(&old.id);
            }
            group.instances.store(Arc::new(instances));
        } else {
            self.services.insert(
                config.name.clone(),
                ServiceGroup {
                    instances: ArcSwap::from_pointee(instances),
                    selector,
                    health_check: config.health_check.clone(),
                },
            );
        }

        tracing::info!(
            service = %config.name,
            instances = config.instances.len(),
            strategy = ?config.strategy,
            "Service registered"
        );
        Ok(())
    }

    /// Select an instance for the given service.
    ///
    /// Filters to healthy instances first. If every instance is down the
    /// first raw instance is returned (degraded mode): availability is
    /// prioritized over strict health enforcement when the whole service
    /// looks dead. Returns None only when the service has no instances.
    pub fn select_instance(&self, service: &str) -> Option<Arc<ServiceInstance>> {
        let group = self.services.get(service)?;
        let snapshot = group.instances.load_full();
        if snapshot.is_empty() {
            return None;
        }

        let healthy: Vec<Arc<ServiceInstance>> = snapshot
            .iter()
            .filter(|i| i.is_healthy())
            .cloned()
            .collect();

        if healthy.is_empty() {
            tracing::warn!(
                service = %service,
                instances = snapshot.len(),
                "No healthy instances, serving degraded from first instance"
            );
            return Some(snapshot[0].clone());
        }

        group.selector.select(&healthy)
    }

    /// Look up an instance by id.
    pub fn instance(&self, id: Uuid) -> Option<Arc<ServiceInstance>> {
        self.by_id.get(&id).map(|i| i.value().clone())
    }

    /// Increment the active connection count for an instance.
    pub fn increment_connections(&self, id: Uuid) {
        if let Some(instance) = self.by_id.get(&id) {
            instance.inc_connections();
        }
    }

    /// Decrement the active connection count for an instance (floors at 0).
    pub fn decrement_connections(&self, id: Uuid) {
        if let Some(instance) = self.by_id.get(&id) {
            instance.dec_connections();
        }
    }

    /// Names of all registered services.
    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|e| e.key().clone()).collect()
    }

    /// Snapshot of a service's instances (registration order).
    pub fn instances_of(&self, service: &str) -> Option<Arc<Vec<Arc<ServiceInstance>>>> {
        self.services.get(service).map(|g| g.instances.load_full())
    }

    /// Health check settings for a service.
    pub fn health_config(&self, service: &str) -> Option<HealthCheckConfig> {
        self.services.get(service).map(|g| g.health_check.clone())
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
