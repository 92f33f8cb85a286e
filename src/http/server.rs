//! HTTP server setup and request handling.
//!
//! # Responsibilities
//! - Create Axum Router with the gateway handler
//! - Wire up middleware (tracing, limits, trace ID)
//! - Resolve service, consult rate limiter, select instance
//! - Invoke the upstream call through the circuit breaker
//! - Record trace/latency data and outcome signals
//! - Serve the read-only status endpoint

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderName, Request},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::health::HealthMonitor;
use crate::http::forward::{self, ForwardError, X_TRACE_ID};
use crate::http::response::{rate_limited, with_rate_limit_headers};
use crate::lifecycle::Shutdown;
use crate::load_balancer::registry::RegisterError;
use crate::load_balancer::ServiceRegistry;
use crate::rate_limit::{request_key, RateLimiter, RequestOutcome};
use crate::resilience::{BreakerError, BreakerRegistry};
use crate::routing::RouteTable;
use crate::observability::Tracer;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub registry: Arc<ServiceRegistry>,
    pub breakers: Arc<BreakerRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub tracer: Arc<Tracer>,
    pub client: Client<HttpConnector, Body>,
    pub upstream_timeout: Duration,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    registry: Arc<ServiceRegistry>,
    limiter: Arc<RateLimiter>,
}

impl GatewayServer {
    /// Create a new gateway server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, RegisterError> {
        let registry = Arc::new(ServiceRegistry::new());
        for service in &config.services {
            registry.register_service(service)?;
        }

        let service_names: Vec<String> = config.services.iter().map(|s| s.name.clone()).collect();
        let breakers = Arc::new(BreakerRegistry::new(
            config.circuit_breaker.clone(),
            &service_names,
        ));
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let routes = Arc::new(RouteTable::from_services(&config.services));
        let tracer = Arc::new(Tracer::new());

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            routes,
            registry: registry.clone(),
            breakers,
            limiter: limiter.clone(),
            tracer,
            client,
            upstream_timeout: Duration::from_secs(config.timeouts.upstream_secs),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            registry,
            limiter,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let trace_id_header = HeaderName::from_static(X_TRACE_ID);
        Router::new()
            .route("/_gateway/status", get(status_handler))
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            // Set must wrap Propagate so the id exists before it is copied
            // onto the response.
            .layer(PropagateRequestIdLayer::new(trace_id_header.clone()))
            .layer(SetRequestIdLayer::new(trace_id_header, MakeRequestUuid))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    /// Background tasks (probe loops, limiter sweep) stop on the shutdown
    /// broadcast, and the listener drains gracefully.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway server starting");

        HealthMonitor::new(self.registry.clone()).spawn_all(shutdown);
        self.limiter.spawn_cleanup(shutdown);

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let mut rx = shutdown.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.recv().await;
            })
            .await?;

        tracing::info!("Gateway server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Registry accessor (status tooling, tests).
    pub fn registry(&self) -> Arc<ServiceRegistry> {
        self.registry.clone()
    }
}

/// The identity a rate-limit key is built from: the opaque bearer token
/// when the request is authenticated, the client IP otherwise.
fn request_identity(request: &Request<Body>, addr: SocketAddr) -> String {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
        .unwrap_or_else(|| addr.ip().to_string())
}

/// Main gateway handler.
/// Resolves the service, enforces admission, selects an instance and
/// forwards through the circuit breaker.
async fn gateway_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let trace_id = request
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let path = request.uri().path().to_string();
    let method = request.method().to_string();
    let trace = state.tracer.start(trace_id, &method, &path);

    // 1. Resolve service from the path prefix
    let Some(service) = state.routes.resolve(&path).map(str::to_string) else {
        tracing::warn!(trace_id = %trace.trace_id, path = %path, "No service for path");
        state.tracer.complete(&trace, 404, "none", None);
        return GatewayError::ServiceNotFound { path }.into_response();
    };

    // 2. Admission: rate limit on (identity, path)
    let key = request_key(&request_identity(&request, addr), &path);
    let decision = state.limiter.consume(&key, 1);
    if !decision.allowed {
        state.tracer.complete(&trace, 429, &service, None);
        return rate_limited(&decision);
    }

    // 3. Pick an instance (degraded fallback happens inside the registry)
    let Some(instance) = state.registry.select_instance(&service) else {
        tracing::warn!(trace_id = %trace.trace_id, service = %service, "No instances registered");
        state.tracer.complete(&trace, 404, &service, None);
        return GatewayError::ServiceNotFound { path }.into_response();
    };

    // 4. Forward through the circuit breaker, holding a connection slot
    // for the duration. The guard decrements on every exit path.
    let guard = instance.connection_guard();
    let (parts, body) = request.into_parts();
    let upstream = match forward::build_upstream_request(
        &parts,
        body,
        &instance,
        addr.ip(),
        &trace.trace_id,
    ) {
        Ok(req) => req,
        Err(e) => {
            state.tracer.complete(&trace, 500, &service, None);
            return GatewayError::Internal(e.to_string()).into_response();
        }
    };

    let breaker = state.breakers.breaker(&service);
    let outcome = breaker
        .execute(forward::dispatch(&state.client, upstream, state.upstream_timeout))
        .await;
    drop(guard);

    let response = match outcome {
        Ok(upstream_response) => {
            let (parts, body) = upstream_response.into_parts();
            Response::from_parts(parts, Body::new(body)).into_response()
        }
        Err(BreakerError::Open) => {
            tracing::warn!(trace_id = %trace.trace_id, service = %service, "Circuit open, failing fast");
            GatewayError::CircuitOpen { service: service.clone() }.into_response()
        }
        Err(BreakerError::Inner(ForwardError::BadStatus(upstream_response))) => {
            // Counted against the circuit, but the client still sees the
            // backend's own response.
            let (parts, body) = upstream_response.into_parts();
            Response::from_parts(parts, Body::new(body)).into_response()
        }
        Err(BreakerError::Inner(ForwardError::Timeout)) => {
            tracing::warn!(trace_id = %trace.trace_id, service = %service, "Upstream timed out");
            GatewayError::DownstreamTimeout { service: service.clone() }.into_response()
        }
        Err(BreakerError::Inner(ForwardError::Transport(e))) => {
            tracing::error!(trace_id = %trace.trace_id, service = %service, error = %e, "Upstream transport error");
            GatewayError::DownstreamUnreachable { service: service.clone() }.into_response()
        }
    };

    let status = response.status().as_u16();
    state.limiter.record_outcome(
        &key,
        RequestOutcome {
            success: status < 500,
            latency: Duration::from_millis(trace.latency_ms()),
        },
    );
    state
        .tracer
        .complete(&trace, status, &service, Some(instance.url.as_str()));

    with_rate_limit_headers(response, &decision)
}

/// Read-only summary of services, instances and circuit states.
async fn status_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut services = Vec::new();
    for name in state.registry.service_names() {
        let instances: Vec<serde_json::Value> = state
            .registry
            .instances_of(&name)
            .map(|snapshot| {
                snapshot
                    .iter()
                    .map(|i| {
                        json!({
                            "id": i.id,
                            "url": i.url.as_str(),
                            "healthy": i.is_healthy(),
                            "active_connections": i.connection_count(),
                            "response_time_ms": i.response_time_ms(),
                            "last_check_unix_ms": i.last_check_unix_ms(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        services.push(json!({
            "name": name,
            "circuit": state.breakers.breaker(&name).state().as_str(),
            "instances": instances,
        }));
    }

    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "services": services,
    }))
}
