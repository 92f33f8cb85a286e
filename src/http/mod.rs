//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, gateway handler)
//!     → routing layer resolves the service
//!     → rate limiter admits or rejects
//!     → load balancer picks an instance
//!     → forward.rs (rewrite, dispatch through circuit breaker)
//!     → response.rs (headers, error shaping)
//!     → Send to client
//! ```

pub mod forward;
pub mod response;
pub mod server;

pub use server::GatewayServer;
