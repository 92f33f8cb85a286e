//! Gateway error taxonomy.
//!
//! # Design Decisions
//! - One enum at the router boundary; each variant maps to exactly one status
//! - Downstream HTTP responses are NOT errors (forwarded verbatim)
//! - Internal errors never leak detail to the client, only to logs

use axum::http::StatusCode;
use thiserror::Error;

/// Errors surfaced by the gateway request path.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No service is registered for the request path prefix, or the
    /// registry holds no instances for the resolved service.
    #[error("no service found for path {path:?}")]
    ServiceNotFound { path: String },

    /// The rate limiter rejected the request key.
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// The circuit for the service is open; the backend was not contacted.
    #[error("circuit open for service {service:?}")]
    CircuitOpen { service: String },

    /// The upstream call exceeded its deadline.
    #[error("upstream call to {service:?} timed out")]
    DownstreamTimeout { service: String },

    /// The upstream call failed at the transport level.
    #[error("upstream call to {service:?} failed")]
    DownstreamUnreachable { service: String },

    /// Anything unexpected; surfaced as a generic 500.
    #[error("internal gateway error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::ServiceNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::DownstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::DownstreamUnreachable { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Intentionally coarse for internal errors.
    pub fn public_message(&self) -> &'static str {
        match self {
            GatewayError::ServiceNotFound { .. } => "Service not found",
            GatewayError::RateLimitExceeded => "Rate limit exceeded",
            GatewayError::CircuitOpen { .. } => "Service temporarily unavailable",
            GatewayError::DownstreamTimeout { .. } => "Upstream timed out",
            GatewayError::DownstreamUnreachable { .. } => "Upstream unavailable",
            GatewayError::Internal(_) => "Internal server error",
        }
    }
}
