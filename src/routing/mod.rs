//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → matcher.rs (longest-prefix lookup)
//!     → Return: logical service name or NoMatch
//!
//! Route Compilation (at startup):
//!     ServiceConfig[]
//!     → Sort prefixes longest-first
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Longest prefix wins, so "/api/devices" shadows "/api"

pub mod matcher;

pub use matcher::RouteTable;
