//! Per-request trace recording.
//!
//! # Responsibilities
//! - Carry the trace id and start time through a request's lifetime
//! - Emit one structured completion event per request with latency,
//!   status and the instance that served it
//!
//! # Design Decisions
//! - The tracer is an injected collaborator of the router, not a global
//! - Completion feeds the same latency number to logs and metrics so
//!   both tell one story

use std::time::Instant;

use crate::observability::metrics;

/// An in-flight request trace.
#[derive(Debug)]
pub struct RequestTrace {
    pub trace_id: String,
    pub method: String,
    pub path: String,
    started: Instant,
}

impl RequestTrace {
    pub fn latency_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Records request lifecycles.
#[derive(Debug, Default)]
pub struct Tracer;

impl Tracer {
    pub fn new() -> Self {
        Self
    }

    /// Begin a trace for an inbound request.
    pub fn start(&self, trace_id: impl Into<String>, method: &str, path: &str) -> RequestTrace {
        let trace = RequestTrace {
            trace_id: trace_id.into(),
            method: method.to_string(),
            path: path.to_string(),
            started: Instant::now(),
        };
        tracing::debug!(
            trace_id = %trace.trace_id,
            method = %trace.method,
            path = %trace.path,
            "Request started"
        );
        trace
    }

    /// Record completion of a request, wherever it terminated.
    pub fn complete(&self, trace: &RequestTrace, status: u16, service: &str, instance: Option<&str>) {
        tracing::info!(
            trace_id = %trace.trace_id,
            method = %trace.method,
            path = %trace.path,
            status = status,
            service = %service,
            instance = instance.unwrap_or("-"),
            latency_ms = trace.latency_ms(),
            "Request completed"
        );
        metrics::record_request(&trace.method, status, service, trace.started);
    }
}
