//! Response shaping.
//!
//! # Responsibilities
//! - Map gateway errors to client responses without leaking internals
//! - Attach X-RateLimit-* headers to every admitted response
//! - Build the 429 rejection with its retry hint
//!
//! # Design Decisions
//! - X-RateLimit-Reset is absolute unix seconds; retryAfter is relative
//! - Backend responses pass through untouched apart from the rate-limit
//!   headers

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::GatewayError;
use crate::rate_limit::RateLimitDecision;

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if matches!(self, GatewayError::Internal(_)) {
            tracing::error!(error = %self, "Internal gateway error");
        }
        let body = Json(json!({ "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}

/// Unix timestamp (seconds) at which the caller's window resets.
fn reset_timestamp(reset_after: Duration) -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|now| (now + reset_after).as_secs())
        .unwrap_or(0)
}

/// Attach the three X-RateLimit-* headers to an admitted response.
pub fn with_rate_limit_headers(mut response: Response, decision: &RateLimitDecision) -> Response {
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert(
        "x-ratelimit-reset",
        HeaderValue::from(reset_timestamp(decision.reset_after)),
    );
    response
}

/// Build the 429 rejection for a denied decision.
pub fn rate_limited(decision: &RateLimitDecision) -> Response {
    let retry_after_secs = decision.reset_after.as_secs().max(1);
    let body = Json(json!({
        "error": "Rate limit exceeded",
        "message": format!(
            "Request rate above {} per window, retry in {}s",
            decision.limit, retry_after_secs
        ),
        "retryAfter": retry_after_secs,
    }));

    with_rate_limit_headers(
        (StatusCode::TOO_MANY_REQUESTS, body).into_response(),
        decision,
    )
}
