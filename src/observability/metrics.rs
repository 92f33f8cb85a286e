//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (RPS, latency, rejections, circuit state)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-service and aggregate metrics
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, service
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rate_limited_total` (counter): rejections by strategy
//! - `gateway_circuit_transitions_total` (counter): transitions by service, state
//! - `gateway_instance_health` (gauge): 1=healthy, 0=unhealthy
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Labels for service, instance, status code

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitState;

/// Install the Prometheus exporter on the given address.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed gateway request.
pub fn record_request(method: &str, status: u16, service: &str, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "service" => service.to_string(),
    )
    .increment(1);
    metrics::histogram!(
        "gateway_request_duration_seconds",
        "service" => service.to_string(),
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a rate-limit rejection.
pub fn record_rate_limited(strategy: &str) {
    metrics::counter!(
        "gateway_rate_limited_total",
        "strategy" => strategy.to_string(),
    )
    .increment(1);
}

/// Record a circuit breaker state transition.
pub fn record_circuit_transition(service: &str, state: CircuitState) {
    metrics::counter!(
        "gateway_circuit_transitions_total",
        "service" => service.to_string(),
        "state" => state.as_str(),
    )
    .increment(1);
}

/// Record instance health as a gauge.
pub fn record_instance_health(service: &str, instance: &str, healthy: bool) {
    metrics::gauge!(
        "gateway_instance_health",
        "service" => service.to_string(),
        "instance" => instance.to_string(),
    )
    .set(if healthy { 1.0 } else { 0.0 });
}
