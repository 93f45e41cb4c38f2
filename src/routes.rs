// ==============================================================================
// routes.rs - Route Table
// ==============================================================================
// Description: Immutable, ordered route table with first-match lookup
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================
//
// Patterns are matched segment by segment against the raw request path:
//
//   /service1/orders     literal segments, exact segment count
//   /users/:id/profile   `:name` matches exactly one non-empty segment
//   /service1/*          trailing `*` (or `*name`) matches zero or more segments
//
// The full inbound path and query are appended to the target base; the matched
// prefix is never stripped.
//
// ==============================================================================

use std::fmt;
use std::sync::Arc;

use reqwest::Url;

use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

/// Parsed route pattern
#[derive(Debug, Clone)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidPattern {
            pattern: raw.to_string(),
            reason: reason.to_string(),
        };

        let rest = raw
            .strip_prefix('/')
            .ok_or_else(|| invalid("must start with '/'"))?;

        let parts: Vec<&str> = rest.split('/').collect();
        let last = parts.len() - 1;
        let mut segments = Vec::with_capacity(parts.len());

        for (i, part) in parts.iter().enumerate() {
            let segment = if part.starts_with('*') {
                if i != last {
                    return Err(invalid("wildcard must be the last segment"));
                }
                Segment::Wildcard
            } else if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(invalid("parameter segment needs a name"));
                }
                Segment::Param(name.to_string())
            } else {
                if part.contains('*') {
                    return Err(invalid("'*' is only allowed as a whole segment"));
                }
                if is_dot_segment(part) {
                    return Err(invalid("dot segments are not allowed"));
                }
                Segment::Literal(part.to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn has_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Wildcard))
    }

    /// Whether `path` (no query string) is covered by this pattern
    pub fn matches(&self, path: &str) -> bool {
        if is_ambiguous_path(path) {
            return false;
        }
        let Some(rest) = path.strip_prefix('/') else {
            return false;
        };
        let request: Vec<&str> = rest.split('/').collect();

        if request.iter().any(|s| is_dot_segment(s)) {
            return false;
        }

        let fixed = if self.has_wildcard() {
            &self.segments[..self.segments.len() - 1]
        } else {
            if request.len() != self.segments.len() {
                return false;
            }
            &self.segments[..]
        };

        // `/service1/*` also covers `/service1` itself
        if request.len() < fixed.len() {
            return false;
        }

        fixed.iter().zip(&request).all(|(segment, actual)| match segment {
            Segment::Literal(expected) => expected == actual,
            Segment::Param(_) => !actual.is_empty(),
            Segment::Wildcard => true,
        })
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// `.` and `..` in any spelling the URL parser would resolve
fn is_dot_segment(segment: &str) -> bool {
    let lowered = segment.to_ascii_lowercase();
    matches!(
        lowered.as_str(),
        "." | ".." | "%2e" | ".%2e" | "%2e." | "%2e%2e"
    )
}

/// Paths a URL parser could read with more separators than we split on.
/// The http crate accepts `\` in a path but http(s) URL parsing treats it as `/`.
fn is_ambiguous_path(path: &str) -> bool {
    path.contains('\\') || path.to_ascii_lowercase().contains("%5c")
}

/// One immutable entry of the route table
#[derive(Debug, Clone)]
pub struct Route {
    pattern: RoutePattern,
    target_base: String,
    auth_required: bool,
}

impl Route {
    pub fn new(pattern: &str, target: &str, auth_required: bool) -> Result<Self, ConfigError> {
        let pattern = RoutePattern::parse(pattern)?;
        let target_base = validate_target(target)?;

        Ok(Self {
            pattern,
            target_base,
            auth_required,
        })
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn target_base(&self) -> &str {
        &self.target_base
    }

    pub fn auth_required(&self) -> bool {
        self.auth_required
    }

    /// Outbound URL for an inbound path and query, e.g. `/service1/orders/42?x=1`
    pub fn outbound_url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.target_base, path_and_query)
    }

    /// Parsed outbound URL, or `None` if parsing would send the backend a
    /// different path than the one this route matched
    pub fn resolve(&self, path: &str, path_and_query: &str) -> Option<Url> {
        let url = Url::parse(&self.outbound_url(path_and_query)).ok()?;
        (url.path() == path).then_some(url)
    }
}

fn validate_target(target: &str) -> Result<String, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidTarget {
        target: target.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(target).map_err(|e| invalid(&e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("must be scheme://host[:port] without path or query"));
    }

    Ok(target.trim_end_matches('/').to_string())
}

/// Ordered, read-only route table shared by all requests
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Arc<[Route]>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Result<Self, ConfigError> {
        if routes.is_empty() {
            return Err(ConfigError::EmptyRouteTable);
        }

        Ok(Self {
            routes: routes.into(),
        })
    }

    /// First configured route whose pattern covers `path`
    pub fn find(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.pattern.matches(path))
    }

    pub fn requires_auth(&self) -> bool {
        self.routes.iter().any(Route::auth_required)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(raw: &str) -> RoutePattern {
        RoutePattern::parse(raw).unwrap()
    }

    #[test]
    fn test_wildcard_matches_base_and_descendants() {
        let p = pattern("/service1/*");
        assert!(p.matches("/service1"));
        assert!(p.matches("/service1/"));
        assert!(p.matches("/service1/orders/42"));
        assert!(!p.matches("/service1x"));
        assert!(!p.matches("/service2/orders"));
        assert!(!p.matches("/"));
    }

    #[test]
    fn test_named_wildcard() {
        let p = pattern("/service2/*any");
        assert!(p.has_wildcard());
        assert!(p.matches("/service2/a/b/c"));
    }

    #[test]
    fn test_literal_pattern_is_exact() {
        let p = pattern("/health");
        assert!(p.matches("/health"));
        assert!(!p.matches("/health/"));
        assert!(!p.matches("/health/deep"));
    }

    #[test]
    fn test_root_patterns() {
        assert!(pattern("/").matches("/"));
        assert!(!pattern("/").matches("/a"));

        let catch_all = pattern("/*");
        assert!(catch_all.matches("/"));
        assert!(catch_all.matches("/anything/at/all"));
    }

    #[test]
    fn test_param_segment() {
        let p = pattern("/users/:id/profile");
        assert!(p.matches("/users/42/profile"));
        assert!(!p.matches("/users//profile"));
        assert!(!p.matches("/users/42"));
    }

    #[test]
    fn test_dot_segments_never_match() {
        let p = pattern("/service2/*");
        assert!(!p.matches("/service2/../service1/secret"));
        assert!(!p.matches("/service2/./x"));
        assert!(!p.matches("/service2/%2E%2e/service1"));
    }

    #[test]
    fn test_backslash_paths_never_match() {
        let p = pattern("/public/*");
        assert!(!p.matches("/public/..\\admin/secret"));
        assert!(!p.matches("/public/a\\b"));
        assert!(!p.matches("/public/..%5Cadmin/secret"));
        assert!(!p.matches("/public/..%5cadmin/secret"));
        assert!(p.matches("/public/admin/secret"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(RoutePattern::parse("service1/*").is_err());
        assert!(RoutePattern::parse("/a/*/b").is_err());
        assert!(RoutePattern::parse("/a/:").is_err());
        assert!(RoutePattern::parse("/a*b").is_err());
        assert!(RoutePattern::parse("/a/../b").is_err());
    }

    #[test]
    fn test_target_validation() {
        let route = Route::new("/x/*", "http://localhost:8081/", false).unwrap();
        assert_eq!(route.target_base(), "http://localhost:8081");

        assert!(Route::new("/x/*", "ftp://localhost", false).is_err());
        assert!(Route::new("/x/*", "http://localhost:8081/api", false).is_err());
        assert!(Route::new("/x/*", "http://localhost:8081?a=b", false).is_err());
        assert!(Route::new("/x/*", "not a url", false).is_err());
    }

    #[test]
    fn test_wildcard_forwards_full_path() {
        let route = Route::new("/service1/*", "http://localhost:8081", true).unwrap();
        assert_eq!(
            route.outbound_url("/service1/orders/42"),
            "http://localhost:8081/service1/orders/42"
        );
    }

    #[test]
    fn test_resolve_requires_identical_path() {
        let route = Route::new("/public/*", "http://localhost:8082", false).unwrap();

        let url = route.resolve("/public/a%20b", "/public/a%20b?x=1").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8082/public/a%20b?x=1");

        assert!(route
            .resolve("/public/..\\admin/secret", "/public/..\\admin/secret")
            .is_none());
        assert!(route.resolve("/public/../admin", "/public/../admin").is_none());
    }

    #[test]
    fn test_outbound_url_keeps_query() {
        let route = Route::new("/service/*", "http://localhost:9090", false).unwrap();
        assert_eq!(
            route.outbound_url("/service/foo?x=1"),
            "http://localhost:9090/service/foo?x=1"
        );
    }

    #[test]
    fn test_first_match_wins() {
        let table = RouteTable::new(vec![
            Route::new("/api/admin/*", "http://admin:9000", true).unwrap(),
            Route::new("/api/*", "http://public:9001", false).unwrap(),
        ])
        .unwrap();

        assert_eq!(table.find("/api/admin/users").unwrap().target_base(), "http://admin:9000");
        assert_eq!(table.find("/api/items").unwrap().target_base(), "http://public:9001");
        assert!(table.find("/other").is_none());
        assert!(table.requires_auth());
    }

    #[test]
    fn test_declaration_order_is_preserved() {
        let table = RouteTable::new(vec![
            Route::new("/*", "http://catchall:1", false).unwrap(),
            Route::new("/api/*", "http://never:2", false).unwrap(),
        ])
        .unwrap();

        assert_eq!(table.find("/api/x").unwrap().target_base(), "http://catchall:1");
        let patterns: Vec<&str> = table.iter().map(|r| r.pattern().as_str()).collect();
        assert_eq!(patterns, vec!["/*", "/api/*"]);
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(matches!(
            RouteTable::new(Vec::new()),
            Err(ConfigError::EmptyRouteTable)
        ));
    }
}
