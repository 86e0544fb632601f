//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files, and
//! every section defaults to the development topology the router was built
//! for: a dev listener on `127.0.0.1:8080` in front of an application server
//! on `127.0.0.1:3000`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the development router.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Listener configuration (bind address, host identity).
    pub listener: ListenerConfig,

    /// The backend application server.
    pub backend: BackendConfig,

    /// Proxy rules, evaluated in declaration order.
    pub routes: Vec<RouteConfig>,

    /// SPA history fallback.
    pub fallback: FallbackConfig,

    /// Local development assets.
    pub assets: AssetsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            backend: BackendConfig::default(),
            routes: default_routes(),
            fallback: FallbackConfig::default(),
            assets: AssetsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,

    /// Public `host:port` identity the dev server is reached at.
    pub public_host: String,

    /// `Host` header values the listener answers to.
    pub allowed_hosts: Vec<String>,

    /// Headers added to every response that does not already carry them.
    pub response_headers: BTreeMap<String, String>,

    /// Gzip responses for clients that accept it.
    pub compress: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        let response_headers = [
            ("access-control-allow-origin", "*"),
            (
                "access-control-allow-methods",
                "GET, POST, PUT, DELETE, PATCH, OPTIONS",
            ),
            (
                "access-control-allow-headers",
                "X-Requested-With, content-type, Authorization",
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            public_host: "127.0.0.1:8080".to_string(),
            allowed_hosts: vec!["127.0.0.1:8080".to_string(), "127.0.0.1:3000".to_string()],
            response_headers,
            compress: true,
        }
    }
}

/// Backend application server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL (`scheme://host:port`) of the application server.
    pub url: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3000".to_string(),
            connect_timeout_secs: 5,
        }
    }
}

/// How a route's path patterns are compared against the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Path must equal the pattern.
    Exact,
    /// Path equals the pattern or continues it with `/...`.
    #[default]
    Prefix,
}

/// Protocol a route forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Plain request/response forwarding.
    #[default]
    Http,
    /// WebSocket upgrades only.
    Ws,
}

/// What the client sees when the backend cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Serve the error document with a 500.
    #[default]
    Document,
    /// Empty 502 and close the connection.
    BadGateway,
}

/// A proxy rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path patterns; the route matches if any of them does.
    pub paths: Vec<String>,

    #[serde(default, rename = "match")]
    pub match_kind: MatchKind,

    #[serde(default)]
    pub transport: Transport,

    /// Overrides `backend.url` for this route.
    #[serde(default)]
    pub destination: Option<String>,

    #[serde(default)]
    pub on_error: ErrorPolicy,
}

impl RouteConfig {
    fn prefixes(name: &str, paths: &[&str], transport: Transport) -> Self {
        Self {
            name: name.to_string(),
            paths: paths.iter().map(|p| p.to_string()).collect(),
            match_kind: MatchKind::Prefix,
            transport,
            destination: None,
            on_error: ErrorPolicy::Document,
        }
    }
}

/// The live-query socket is listed ahead of the broader `/api` rule so that
/// upgrades on it reach the WebSocket path.
pub fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig::prefixes("graphql-live", &["/api/graphql/live"], Transport::Ws),
        RouteConfig::prefixes(
            "backend",
            &[
                "/embed/auth",
                "/embed/bootstrap",
                "/admin",
                "/account",
                "/install",
                "/api",
                "/graphiql",
            ],
            Transport::Http,
        ),
    ]
}

/// SPA history fallback configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,

    /// Document served for client-side routes.
    pub index: String,

    /// Path prefixes that never fall back.
    pub exclude: Vec<String>,

    /// Also rewrite paths whose last segment looks like a file name.
    pub rewrite_dotted_paths: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            index: "/embed.html".to_string(),
            exclude: Vec::new(),
            rewrite_dotted_paths: false,
        }
    }
}

/// Local development assets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Directory holding the build output and public files.
    pub content_base: PathBuf,

    /// HTML page served when the backend is unreachable.
    /// The bundled page is used when unset.
    pub error_document: Option<PathBuf>,

    /// Answer `/service-worker.js` with a self-unregistering worker.
    pub service_worker_reset: bool,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            content_base: PathBuf::from("public"),
            error_document: None,
            service_worker_reset: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Emit JSON log lines instead of the pretty format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "dev_router=info,tower_http=info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
