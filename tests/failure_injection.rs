//! Failure injection tests for the gateway.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use api_gateway::config::schema::{GatewayConfig, ServiceConfig};
use api_gateway::lifecycle::Shutdown;
use api_gateway::GatewayServer;
use axum::http::StatusCode;

mod common;

fn service(name: &str, prefix: &str, backends: &[SocketAddr]) -> ServiceConfig {
    ServiceConfig {
        name: name.into(),
        path_prefix: prefix.into(),
        instances: backends.iter().map(|a| format!("http://{}", a)).collect(),
        strategy: Default::default(),
        health_check: Default::default(),
    }
}

async fn start_gateway(config: GatewayConfig, addr: SocketAddr) -> Shutdown {
    let shutdown = Shutdown::new();
    let server = GatewayServer::new(config).unwrap();
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, &server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Backend that serves its name on regular paths and a togglable health
/// endpoint on /health.
async fn start_named_backend(addr: SocketAddr, name: &'static str, healthy: Arc<AtomicBool>) {
    common::start_programmable_backend(addr, move |path| {
        let healthy = healthy.clone();
        async move {
            if path == "/health" {
                if healthy.load(Ordering::SeqCst) {
                    (200, "up".into())
                } else {
                    (503, "down".into())
                }
            } else {
                (200, name.to_string())
            }
        }
    })
    .await;
}

#[tokio::test]
async fn failed_probe_evicts_instance_from_rotation() {
    let b1_addr: SocketAddr = "127.0.0.1:29201".parse().unwrap();
    let b2_addr: SocketAddr = "127.0.0.1:29202".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29203".parse().unwrap();

    let b1_healthy = Arc::new(AtomicBool::new(true));
    let b2_healthy = Arc::new(AtomicBool::new(true));
    start_named_backend(b1_addr, "b1", b1_healthy.clone()).await;
    start_named_backend(b2_addr, "b2", b2_healthy.clone()).await;

    let mut config = GatewayConfig::default();
    config.listener.bind_address = gateway_addr.to_string();
    let mut device = service("device", "/api/devices", &[b1_addr, b2_addr]);
    device.health_check.interval_secs = 1;
    config.services.push(device);

    let shutdown = start_gateway(config, gateway_addr).await;
    let client = client();
    let url = format!("http://{}/api/devices", gateway_addr);

    // Both healthy: strict round-robin b1, b2, b1.
    let mut bodies = Vec::new();
    for _ in 0..3 {
        let res = client.get(&url).send().await.unwrap();
        bodies.push(res.text().await.unwrap());
    }
    assert_eq!(bodies, vec!["b1", "b2", "b1"]);

    // b2's next probe fails; selection must stop returning it.
    b2_healthy.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(3)).await;

    for _ in 0..4 {
        let res = client.get(&url).send().await.unwrap();
        assert_eq!(res.text().await.unwrap(), "b1");
    }

    // Recovery: one good probe brings b2 back.
    b2_healthy.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(3)).await;

    let mut seen_b2 = false;
    for _ in 0..4 {
        let res = client.get(&url).send().await.unwrap();
        if res.text().await.unwrap() == "b2" {
            seen_b2 = true;
        }
    }
    assert!(seen_b2, "b2 should rejoin rotation after recovery");

    shutdown.trigger();
}

#[tokio::test]
async fn circuit_opens_after_threshold_and_fails_fast() {
    let backend_addr: SocketAddr = "127.0.0.1:29211".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29212".parse().unwrap();

    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    common::start_programmable_backend(backend_addr, move |_path| {
        let cc = cc.clone();
        async move {
            cc.fetch_add(1, Ordering::SeqCst);
            (503, "broken".into())
        }
    })
    .await;

    let mut config = GatewayConfig::default();
    config.listener.bind_address = gateway_addr.to_string();
    let mut device = service("device", "/api/devices", &[backend_addr]);
    device.health_check.enabled = false;
    config.services.push(device);
    config.circuit_breaker.failure_threshold = 2;
    config.circuit_breaker.retry_timeout_ms = 60_000;

    let shutdown = start_gateway(config, gateway_addr).await;
    let client = client();
    let url = format!("http://{}/api/devices", gateway_addr);

    // First two failures pass the backend's 503 through verbatim.
    for _ in 0..2 {
        let res = client.get(&url).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.text().await.unwrap(), "broken");
    }
    assert_eq!(call_count.load(Ordering::SeqCst), 2);

    // Circuit is open: fail fast, backend no longer contacted.
    for _ in 0..3 {
        let res = client.get(&url).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "Service temporarily unavailable");
    }
    assert_eq!(call_count.load(Ordering::SeqCst), 2);

    shutdown.trigger();
}

#[tokio::test]
async fn circuit_recovers_through_half_open_trial() {
    let backend_addr: SocketAddr = "127.0.0.1:29221".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29222".parse().unwrap();

    let broken = Arc::new(AtomicBool::new(true));
    let b = broken.clone();
    common::start_programmable_backend(backend_addr, move |_path| {
        let b = b.clone();
        async move {
            if b.load(Ordering::SeqCst) {
                (503, "broken".into())
            } else {
                (200, "recovered".into())
            }
        }
    })
    .await;

    let mut config = GatewayConfig::default();
    config.listener.bind_address = gateway_addr.to_string();
    let mut device = service("device", "/api/devices", &[backend_addr]);
    device.health_check.enabled = false;
    config.services.push(device);
    config.circuit_breaker.failure_threshold = 1;
    config.circuit_breaker.retry_timeout_ms = 500;

    let shutdown = start_gateway(config, gateway_addr).await;
    let client = client();
    let url = format!("http://{}/api/devices", gateway_addr);

    // One failure opens the circuit.
    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    // Inside the retry timeout: fail fast without reaching the backend.
    let res = client.get(&url).send().await.unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Service temporarily unavailable");

    // Backend heals; after the timeout the single trial call closes the
    // circuit again.
    broken.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(700)).await;

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "recovered");

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    shutdown.trigger();
}

#[tokio::test]
async fn all_instances_down_serves_degraded() {
    let backend_addr: SocketAddr = "127.0.0.1:29231".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29232".parse().unwrap();

    // Health endpoint fails, but the instance still answers requests.
    let healthy = Arc::new(AtomicBool::new(false));
    start_named_backend(backend_addr, "limping", healthy).await;

    let mut config = GatewayConfig::default();
    config.listener.bind_address = gateway_addr.to_string();
    let mut device = service("device", "/api/devices", &[backend_addr]);
    device.health_check.interval_secs = 1;
    config.services.push(device);

    let shutdown = start_gateway(config, gateway_addr).await;

    // Give the probe time to mark the instance unhealthy.
    tokio::time::sleep(Duration::from_secs(2)).await;

    let res = client()
        .get(format!("http://{}/api/devices", gateway_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "limping");

    shutdown.trigger();
}

#[tokio::test]
async fn upstream_timeout_surfaces_504_and_trips_breaker() {
    let backend_addr: SocketAddr = "127.0.0.1:29241".parse().unwrap();
    let gateway_addr: SocketAddr = "127.0.0.1:29242".parse().unwrap();

    common::start_programmable_backend(backend_addr, move |_path| async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        (200, "too late".into())
    })
    .await;

    let mut config = GatewayConfig::default();
    config.listener.bind_address = gateway_addr.to_string();
    let mut device = service("device", "/api/devices", &[backend_addr]);
    device.health_check.enabled = false;
    config.services.push(device);
    config.timeouts.upstream_secs = 1;
    config.circuit_breaker.failure_threshold = 1;
    config.circuit_breaker.retry_timeout_ms = 60_000;

    let shutdown = start_gateway(config, gateway_addr).await;
    let client = client();
    let url = format!("http://{}/api/devices", gateway_addr);

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);

    // The timeout counted as a failure; the circuit is now open.
    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Service temporarily unavailable");

    shutdown.trigger();
}
