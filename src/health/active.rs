//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every instance of every service
//! - Update instance health state and response time from results

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use rand::Rng;
use tokio::sync::broadcast;
use tokio::time;

use crate::lifecycle::Shutdown;
use crate::load_balancer::{ServiceInstance, ServiceRegistry};
use crate::observability::metrics;

pub struct HealthMonitor {
    registry: Arc<ServiceRegistry>,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self { registry, client }
    }

    /// Spawn one probe loop per registered service. Each loop owns its
    /// timer and exits on the shutdown broadcast.
    pub fn spawn_all(self, shutdown: &Shutdown) {
        let monitor = Arc::new(self);
        for service in monitor.registry.service_names() {
            let Some(config) = monitor.registry.health_config(&service) else {
                continue;
            };
            if !config.enabled {
                tracing::info!(service = %service, "Active health checks disabled");
                continue;
            }

            tracing::info!(
                service = %service,
                interval = config.interval_secs,
                path = %config.path,
                "Health monitor starting"
            );

            let monitor = monitor.clone();
            let rx = shutdown.subscribe();
            tokio::spawn(async move {
                monitor.run_service_loop(service, config, rx).await;
            });
        }
    }

    async fn run_service_loop(
        self: Arc<Self>,
        service: String,
        config: crate::config::HealthCheckConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        // Stagger loop starts so services don't probe in lockstep.
        let jitter_ms = rand::thread_rng().gen_range(0..=config.interval_secs * 100);
        time::sleep(Duration::from_millis(jitter_ms)).await;

        let mut ticker = time::interval(Duration::from_secs(config.interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_service(&service, &config).await;
                }
                _ = shutdown.recv() => {
                    tracing::info!(service = %service, "Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn check_service(&self, service: &str, config: &crate::config::HealthCheckConfig) {
        let Some(instances) = self.registry.instances_of(service) else {
            return;
        };

        for instance in instances.iter() {
            self.probe(service, instance, config).await;
        }
    }

    async fn probe(
        &self,
        service: &str,
        instance: &Arc<ServiceInstance>,
        config: &crate::config::HealthCheckConfig,
    ) {
        let mut probe_url = instance.url.clone();
        probe_url.set_path(&config.path);

        let request = match Request::builder()
            .method("GET")
            .uri(probe_url.as_str())
            .header("user-agent", "api-gateway-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build health check request");
                return;
            }
        };

        let timeout = Duration::from_secs(config.timeout_secs);
        let started = Instant::now();

        let healthy = match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::warn!(
                        service = %service,
                        url = %instance.url,
                        status = %response.status(),
                        "Health check failed: non-success status"
                    );
                }
                success
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    service = %service,
                    url = %instance.url,
                    error = %e,
                    "Health check failed: connection error"
                );
                false
            }
            Err(_) => {
                tracing::warn!(
                    service = %service,
                    url = %instance.url,
                    "Health check failed: timeout"
                );
                false
            }
        };

        if healthy {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            if instance.mark_healthy(elapsed_ms) {
                tracing::info!(
                    service = %service,
                    url = %instance.url,
                    response_time_ms = elapsed_ms,
                    "Instance recovered"
                );
            }
        } else if instance.mark_unhealthy() {
            tracing::warn!(service = %service, url = %instance.url, "Instance marked unhealthy");
        }

        metrics::record_instance_health(service, instance.url.as_str(), instance.is_healthy());
    }
}
