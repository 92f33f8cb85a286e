//! Upstream request construction and dispatch.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the selected instance
//! - Preserve method, body and query; inject forwarding headers
//! - Bound every upstream call with a timeout
//!
//! # Design Decisions
//! - The body streams through untouched; nothing is buffered because
//!   requests are never retried
//! - 502/503/504 from the backend count as circuit failures but still
//!   carry the backend's response to the client verbatim

use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{Authority, Scheme};
use axum::http::{header, HeaderValue, Request, Response, StatusCode, Uri};
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use thiserror::Error;

use crate::load_balancer::ServiceInstance;

/// Header carrying the gateway trace id end to end.
pub const X_TRACE_ID: &str = "x-trace-id";

/// Failure modes of one upstream call. All variants count against the
/// circuit breaker.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// Deadline elapsed before the backend answered.
    #[error("upstream call timed out")]
    Timeout,
    /// Transport-level failure (connect refused, reset, protocol error).
    #[error("upstream transport error: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),
    /// The backend answered with a gateway-class error status. The
    /// response is carried so it can be forwarded verbatim.
    #[error("upstream returned {}", .0.status())]
    BadStatus(Response<Incoming>),
}

/// Build the request forwarded to `instance` from the inbound parts.
pub fn build_upstream_request(
    parts: &axum::http::request::Parts,
    body: Body,
    instance: &ServiceInstance,
    client_ip: IpAddr,
    trace_id: &str,
) -> Result<Request<Body>, axum::http::Error> {
    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::try_from(instance.url.scheme()).unwrap_or(Scheme::HTTP));
    if let Ok(authority) = Authority::from_str(instance.url.authority()) {
        uri_parts.authority = Some(authority);
    }
    let uri = Uri::from_parts(uri_parts).unwrap_or_else(|_| parts.uri.clone());

    let original_host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut builder = Request::builder()
        .method(parts.method.clone())
        .uri(uri)
        .version(parts.version);

    if let Some(headers) = builder.headers_mut() {
        for (name, value) in parts.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
        // The instance authority replaces the inbound host.
        headers.remove(header::HOST);

        if let Ok(value) = HeaderValue::from_str(trace_id) {
            headers.insert(X_TRACE_ID, value);
        }

        let forwarded_for = match parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
        {
            Some(existing) => format!("{}, {}", existing, client_ip),
            None => client_ip.to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert("x-forwarded-for", value);
        }

        headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));

        if let Some(host) = original_host {
            if let Ok(value) = HeaderValue::from_str(&host) {
                headers.insert("x-forwarded-host", value);
            }
        }
    }

    builder.body(body)
}

/// Dispatch an upstream call with a bounded deadline, classifying the
/// outcome for circuit-breaker accounting.
pub async fn dispatch(
    client: &Client<HttpConnector, Body>,
    request: Request<Body>,
    timeout: Duration,
) -> Result<Response<Incoming>, ForwardError> {
    let response = tokio::time::timeout(timeout, client.request(request))
        .await
        .map_err(|_| ForwardError::Timeout)??;

    match response.status() {
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            Err(ForwardError::BadStatus(response))
        }
        _ => Ok(response),
    }
}
