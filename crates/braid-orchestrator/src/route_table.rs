//! Route lookup.
//!
//! Routes are an ordered list of URL patterns, each bound to a graph's
//! proxy handler. Lookup is a first-match scan: a pattern matches a path
//! exactly or as a prefix ending at a `/` boundary. O(n) over the route
//! count, which is small in practice.

use std::sync::Arc;

use crate::proxy::ProxyHandler;

pub struct RouteTable {
    routes: Vec<(String, Arc<ProxyHandler>)>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Appends a route. Earlier routes win over later ones.
    pub fn add(&mut self, pattern: impl Into<String>, handler: Arc<ProxyHandler>) {
        self.routes.push((pattern.into(), handler));
    }

    /// First route whose pattern matches `path`, or `None`.
    pub fn lookup(&self, path: &str) -> Option<&Arc<ProxyHandler>> {
        self.routes
            .iter()
            .find(|(pattern, _)| route_matches(pattern, path))
            .map(|(_, handler)| handler)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Exact match, or prefix match at a path-segment boundary.
fn route_matches(pattern: &str, path: &str) -> bool {
    match path.strip_prefix(pattern) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || pattern.ends_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(route_matches("/x", "/x"));
        assert!(!route_matches("/x", "/y"));
    }

    #[test]
    fn test_prefix_match_at_segment_boundary() {
        assert!(route_matches("/api", "/api/users"));
        assert!(!route_matches("/api", "/apiary"));
    }

    #[test]
    fn test_trailing_slash_pattern_matches_any_continuation() {
        assert!(route_matches("/api/", "/api/users"));
        assert!(route_matches("/", "/anything"));
        assert!(route_matches("/", "/"));
    }

    #[test]
    fn test_pattern_longer_than_path() {
        assert!(!route_matches("/api/users", "/api"));
    }
}
