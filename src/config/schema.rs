//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limits).
    pub listener: ListenerConfig,

    /// Logical service definitions (path prefix, instances, balancing).
    pub services: Vec<ServiceConfig>,

    /// Rate limiting settings.
    pub rate_limit: RateLimitConfig,

    /// Circuit breaker settings (applied per service).
    pub circuit_breaker: CircuitBreakerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// A logical backend service fronted by the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Service identifier for routing, logging and metrics.
    pub name: String,

    /// Path prefix that routes to this service (e.g., "/api/devices").
    pub path_prefix: String,

    /// Instance base URLs (e.g., "http://127.0.0.1:3001").
    pub instances: Vec<String>,

    /// Load balancing strategy for this service.
    #[serde(default)]
    pub strategy: BalanceStrategy,

    /// Health check settings for this service's instances.
    #[serde(default)]
    pub health_check: HealthCheckConfig,
}

/// Load balancing strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStrategy {
    #[default]
    RoundRobin,
    LeastConnections,
    FastestResponse,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe for HTTP health checks.
    pub path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: 5,
            path: "/health".to_string(),
        }
    }
}

/// Rate limiting strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitStrategyKind {
    #[default]
    FixedWindow,
    SlidingWindow,
    TokenBucket,
    Adaptive,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Admission strategy.
    pub strategy: RateLimitStrategyKind,

    /// Maximum requests per window (fixed/sliding/adaptive).
    pub max_requests: u32,

    /// Window length in milliseconds (fixed/sliding/adaptive).
    pub window_ms: u64,

    /// Token bucket capacity.
    pub burst_capacity: u32,

    /// Token bucket refill rate in tokens per second.
    pub refill_per_sec: f64,

    /// Interval between expired-entry sweeps in seconds.
    pub cleanup_interval_secs: u64,

    /// Adaptive strategy tuning.
    pub adaptive: AdaptiveConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: RateLimitStrategyKind::FixedWindow,
            max_requests: 100,
            window_ms: 60_000,
            burst_capacity: 50,
            refill_per_sec: 10.0,
            cleanup_interval_secs: 60,
            adaptive: AdaptiveConfig::default(),
        }
    }
}

/// Adaptive rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// Outcomes observed per key before each limit re-evaluation.
    pub evaluation_window: u32,

    /// Fractional adjustment applied at each evaluation (e.g., 0.1 = 10%).
    pub adjust_factor: f64,

    /// Lower bound for the per-key limit.
    pub limit_min: u32,

    /// Upper bound for the per-key limit.
    pub limit_max: u32,

    /// Average latency below this is considered fast (milliseconds).
    pub latency_low_ms: u64,

    /// Average latency above this is considered degraded (milliseconds).
    pub latency_high_ms: u64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            evaluation_window: 10,
            adjust_factor: 0.1,
            limit_min: 10,
            limit_max: 1000,
            latency_low_ms: 100,
            latency_high_ms: 1000,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in Closed state before the circuit opens.
    pub failure_threshold: u32,

    /// Time the circuit stays open before admitting a trial call, in ms.
    pub retry_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            retry_timeout_ms: 30_000,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream call timeout (counted as a circuit failure) in seconds.
    pub upstream_secs: u64,

    /// Total request timeout enforced at the listener in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            upstream_secs: 30,
            request_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
