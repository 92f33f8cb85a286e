//! Path-prefix to service resolution.
//!
//! # Responsibilities
//! - Map a request path to the logical service that owns its prefix
//! - Prefer the most specific (longest) matching prefix
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - O(n) scan over prefixes sorted longest-first; route counts are
//!   small enough that a trie would be overhead without payoff

use crate::config::schema::ServiceConfig;

#[derive(Debug, Clone)]
struct Route {
    prefix: String,
    service: String,
}

/// Immutable table resolving path prefixes to service names.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Compile the table from service configuration. Longest prefixes are
    /// checked first so overlapping prefixes resolve to the most specific
    /// service.
    pub fn from_services(services: &[ServiceConfig]) -> Self {
        let mut routes: Vec<Route> = services
            .iter()
            .map(|s| Route {
                prefix: s.path_prefix.clone(),
                service: s.name.clone(),
            })
            .collect();
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { routes }
    }

    /// Resolve a request path to a service name.
    pub fn resolve(&self, path: &str) -> Option<&str> {
        self.routes
            .iter()
            .find(|r| path.starts_with(r.prefix.as_str()))
            .map(|r| r.service.as_str())
    }
}
