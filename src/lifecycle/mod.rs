//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build registry/limiter/breakers →
//!     Spawn probe/sweep tasks → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast → Tasks exit loops →
//!     Listener drains → Exit
//! ```
//!
//! # Design Decisions
//! - Components are constructed explicitly at startup and injected;
//!   nothing lives in a process-wide singleton
//! - Every background task holds a shutdown receiver; none outlive the
//!   coordinator

pub mod shutdown;

pub use shutdown::Shutdown;
