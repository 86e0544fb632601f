//! Proxy rules and the ordered rule table.
//!
//! # Responsibilities
//! - Compile route configs into immutable rules
//! - Look up the first rule accepting a path for a given transport
//! - Build backend URIs for forwarded requests
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in declaration order; no specificity ranking
//! - Explicit `None` rather than silent default

use std::str::FromStr;

use axum::http::uri::{Authority, PathAndQuery, Uri};
use url::Url;

use crate::config::{ErrorPolicy, MatchKind, RouteConfig, Transport};
use crate::routing::matcher::{AnyMatcher, ExactMatcher, Matcher, PrefixMatcher};

/// Error compiling a route config into a rule.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("route {route:?}: invalid destination {destination:?}: {reason}")]
    Destination {
        route: String,
        destination: String,
        reason: String,
    },
}

/// A compiled proxy rule.
#[derive(Debug)]
pub struct Rule {
    pub name: String,
    pub matcher: Box<dyn Matcher>,
    pub destination: Url,
    pub transport: Transport,
    pub on_error: ErrorPolicy,
    authority: Authority,
}

impl Rule {
    /// Build a rule from its parts.
    ///
    /// The destination must be a plain `http` or `ws` origin.
    pub fn new(
        name: impl Into<String>,
        matcher: Box<dyn Matcher>,
        destination: Url,
        transport: Transport,
        on_error: ErrorPolicy,
    ) -> Result<Self, RuleError> {
        let name = name.into();
        let authority = match destination.scheme() {
            "http" | "ws" => authority_of(&destination),
            scheme => Err(format!("unsupported scheme {scheme:?}")),
        }
        .map_err(|reason| RuleError::Destination {
            route: name.clone(),
            destination: destination.to_string(),
            reason,
        })?;

        Ok(Self {
            name,
            matcher,
            destination,
            transport,
            on_error,
            authority,
        })
    }

    /// Compile a route config, using `backend` when the route names no
    /// destination of its own.
    pub fn from_config(route: &RouteConfig, backend: &Url) -> Result<Self, RuleError> {
        let destination = match &route.destination {
            Some(raw) => Url::parse(raw).map_err(|e| RuleError::Destination {
                route: route.name.clone(),
                destination: raw.clone(),
                reason: e.to_string(),
            })?,
            None => backend.clone(),
        };

        let mut matchers: Vec<Box<dyn Matcher>> = route
            .paths
            .iter()
            .map(|path| -> Box<dyn Matcher> {
                match route.match_kind {
                    MatchKind::Exact => Box::new(ExactMatcher::new(path)),
                    MatchKind::Prefix => Box::new(PrefixMatcher::new(path)),
                }
            })
            .collect();

        let matcher = if matchers.len() == 1 {
            matchers.remove(0)
        } else {
            Box::new(AnyMatcher::new(matchers))
        };

        Self::new(&route.name, matcher, destination, route.transport, route.on_error)
    }

    /// URI on the backend for a plain HTTP forward.
    pub fn http_uri(
        &self,
        path_and_query: Option<&PathAndQuery>,
    ) -> Result<Uri, axum::http::Error> {
        self.uri_with_scheme("http", path_and_query)
    }

    /// URI on the backend for a WebSocket forward.
    pub fn websocket_uri(
        &self,
        path_and_query: Option<&PathAndQuery>,
    ) -> Result<Uri, axum::http::Error> {
        self.uri_with_scheme("ws", path_and_query)
    }

    fn uri_with_scheme(
        &self,
        scheme: &str,
        path_and_query: Option<&PathAndQuery>,
    ) -> Result<Uri, axum::http::Error> {
        Uri::builder()
            .scheme(scheme)
            .authority(self.authority.clone())
            .path_and_query(path_and_query.map(PathAndQuery::as_str).unwrap_or("/"))
            .build()
    }
}

fn authority_of(url: &Url) -> Result<Authority, String> {
    let host = url.host_str().ok_or_else(|| "missing host".to_string())?;
    let authority = match url.port_or_known_default() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Authority::from_str(&authority).map_err(|e| e.to_string())
}

/// Ordered rule table. First match wins.
#[derive(Debug, Default)]
pub struct RouteTable {
    rules: Vec<Rule>,
}

impl RouteTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Compile routes in their declared order.
    pub fn from_config(routes: &[RouteConfig], backend: &Url) -> Result<Self, RuleError> {
        let rules = routes
            .iter()
            .map(|route| Rule::from_config(route, backend))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// First rule of the given transport whose matcher accepts `path`.
    ///
    /// `path` must already be normalized.
    pub fn find(&self, path: &str, transport: Transport) -> Option<&Rule> {
        self.rules
            .iter()
            .filter(|rule| rule.transport == transport)
            .find(|rule| rule.matcher.matches(path))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::default_routes;
    use crate::routing::matcher::FnMatcher;

    fn backend() -> Url {
        Url::parse("http://127.0.0.1:3000").unwrap()
    }

    fn default_table() -> RouteTable {
        RouteTable::from_config(&default_routes(), &backend()).unwrap()
    }

    #[test]
    fn test_backend_prefixes_forward_over_http() {
        let table = default_table();
        for prefix in [
            "/api",
            "/admin",
            "/account",
            "/install",
            "/embed/auth",
            "/embed/bootstrap",
            "/graphiql",
        ] {
            let rule = table.find(prefix, Transport::Http).expect(prefix);
            assert_eq!(rule.name, "backend");
            let nested = format!("{prefix}/nested/path");
            assert_eq!(table.find(&nested, Transport::Http).unwrap().name, "backend");
        }
        assert!(table.find("/embed", Transport::Http).is_none());
        assert!(table.find("/administrator", Transport::Http).is_none());
    }

    #[test]
    fn test_transport_selects_rule() {
        let table = default_table();
        assert_eq!(
            table.find("/api/graphql/live", Transport::Ws).unwrap().name,
            "graphql-live"
        );
        assert_eq!(
            table.find("/api/graphql/live", Transport::Http).unwrap().name,
            "backend"
        );
        assert!(table.find("/api/graphql", Transport::Ws).is_none());
    }

    #[test]
    fn test_declaration_order_wins() {
        let rules = vec![
            Rule::new(
                "broad",
                Box::new(PrefixMatcher::new("/api")),
                backend(),
                Transport::Http,
                ErrorPolicy::Document,
            )
            .unwrap(),
            Rule::new(
                "narrow",
                Box::new(PrefixMatcher::new("/api/v2")),
                Url::parse("http://127.0.0.1:4000").unwrap(),
                Transport::Http,
                ErrorPolicy::Document,
            )
            .unwrap(),
        ];
        let table = RouteTable::new(rules);
        assert_eq!(table.find("/api/v2/users", Transport::Http).unwrap().name, "broad");
    }

    #[test]
    fn test_fn_rule() {
        let rule = Rule::new(
            "assets",
            Box::new(FnMatcher::new("hashed", |p| p.contains(".chunk."))),
            backend(),
            Transport::Http,
            ErrorPolicy::BadGateway,
        )
        .unwrap();
        let table = RouteTable::new(vec![rule]);
        assert!(table.find("/static/main.chunk.js", Transport::Http).is_some());
        assert!(table.find("/static/main.js", Transport::Http).is_none());
    }

    #[test]
    fn test_backend_uris() {
        let table = default_table();
        let rule = table.find("/api", Transport::Http).unwrap();
        let pq = PathAndQuery::from_static("/api/users?page=2");

        assert_eq!(
            rule.http_uri(Some(&pq)).unwrap().to_string(),
            "http://127.0.0.1:3000/api/users?page=2"
        );
        assert_eq!(
            rule.websocket_uri(Some(&pq)).unwrap().to_string(),
            "ws://127.0.0.1:3000/api/users?page=2"
        );
        assert_eq!(rule.http_uri(None).unwrap().to_string(), "http://127.0.0.1:3000/");
    }

    #[test]
    fn test_default_port_is_made_explicit() {
        let rule = Rule::new(
            "ws",
            Box::new(PrefixMatcher::new("/live")),
            Url::parse("ws://localhost").unwrap(),
            Transport::Ws,
            ErrorPolicy::Document,
        )
        .unwrap();
        assert_eq!(rule.websocket_uri(None).unwrap().to_string(), "ws://localhost:80/");
    }

    #[test]
    fn test_rejects_tls_destinations() {
        for destination in ["https://127.0.0.1:3443", "wss://127.0.0.1:3443"] {
            let err = Rule::new(
                "tls",
                Box::new(PrefixMatcher::new("/api")),
                Url::parse(destination).unwrap(),
                Transport::Ws,
                ErrorPolicy::Document,
            )
            .unwrap_err();
            assert!(err.to_string().contains("unsupported scheme"), "{err}");
        }
    }
}
