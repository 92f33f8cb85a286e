//! Resilient API Gateway
//!
//! A request gateway fronting independently deployed backend services,
//! built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                 API GATEWAY                   │
//!                        │                                               │
//!     Client Request     │  ┌─────────┐   ┌────────────┐   ┌─────────┐  │
//!     ───────────────────┼─▶│  http   │──▶│  routing   │──▶│  rate   │  │
//!                        │  │ server  │   │  (prefix)  │   │  limit  │  │
//!                        │  └─────────┘   └────────────┘   └────┬────┘  │
//!                        │                                      │       │
//!                        │                                      ▼       │
//!                        │  ┌──────────────┐            ┌──────────────┐│
//!                        │  │  resilience  │◀───────────│load_balancer ││
//!                        │  │   (breaker)  │            │  + registry  ││
//!                        │  └──────┬───────┘            └──────────────┘│
//!                        │         │                                    │
//!     Client Response    │         ▼                                    │
//!     ◀──────────────────┼── forwarded call ──────────────────────────▶ │──── Backend
//!                        │                                               │     Instance
//!                        │  ┌─────────────────────────────────────────┐ │
//!                        │  │          Cross-Cutting Concerns          │ │
//!                        │  │  config · health checks · observability  │ │
//!                        │  │            · lifecycle                   │ │
//!                        │  └─────────────────────────────────────────┘ │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_gateway::config::loader::load_config;
use api_gateway::config::GatewayConfig;
use api_gateway::lifecycle::Shutdown;
use api_gateway::observability::metrics;
use api_gateway::GatewayServer;

#[derive(Parser, Debug)]
#[command(name = "api-gateway", about = "Resilient API gateway", version)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "api_gateway={},tower_http=info",
                    config.observability.log_level
                ))
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-gateway starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        rate_limit_strategy = ?config.rate_limit.strategy,
        upstream_timeout_secs = config.timeouts.upstream_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let server = GatewayServer::new(config)?;
    server.run(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
