//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, thresholds > 0)
//! - Check instance URLs parse before the registry ever sees them
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic validation failure.
#[derive(Debug)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g., "services[0].path_prefix").
    pub field: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a deserialized configuration, collecting all failures.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (i, service) in config.services.iter().enumerate() {
        if service.name.is_empty() {
            errors.push(ValidationError {
                field: format!("services[{}].name", i),
                message: "service name must not be empty".into(),
            });
        }
        if !service.path_prefix.starts_with('/') {
            errors.push(ValidationError {
                field: format!("services[{}].path_prefix", i),
                message: format!("path prefix {:?} must start with '/'", service.path_prefix),
            });
        }
        for (j, instance) in service.instances.iter().enumerate() {
            if Url::parse(instance).is_err() {
                errors.push(ValidationError {
                    field: format!("services[{}].instances[{}]", i, j),
                    message: format!("{:?} is not a valid URL", instance),
                });
            }
        }
        if service.health_check.enabled && service.health_check.interval_secs == 0 {
            errors.push(ValidationError {
                field: format!("services[{}].health_check.interval_secs", i),
                message: "interval must be at least 1 second".into(),
            });
        }
    }

    let rl = &config.rate_limit;
    if rl.window_ms == 0 {
        errors.push(ValidationError {
            field: "rate_limit.window_ms".into(),
            message: "window must be non-zero".into(),
        });
    }
    if rl.max_requests == 0 {
        errors.push(ValidationError {
            field: "rate_limit.max_requests".into(),
            message: "limit must be non-zero".into(),
        });
    }
    if rl.refill_per_sec <= 0.0 {
        errors.push(ValidationError {
            field: "rate_limit.refill_per_sec".into(),
            message: "refill rate must be positive".into(),
        });
    }
    if rl.adaptive.limit_min > rl.adaptive.limit_max {
        errors.push(ValidationError {
            field: "rate_limit.adaptive".into(),
            message: format!(
                "limit_min ({}) exceeds limit_max ({})",
                rl.adaptive.limit_min, rl.adaptive.limit_max
            ),
        });
    }
    if rl.adaptive.evaluation_window == 0 {
        errors.push(ValidationError {
            field: "rate_limit.adaptive.evaluation_window".into(),
            message: "evaluation window must be non-zero".into(),
        });
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError {
            field: "circuit_breaker.failure_threshold".into(),
            message: "threshold must be non-zero".into(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
