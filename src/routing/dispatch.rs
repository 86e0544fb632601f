//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! Request
//!     → Host header against AllowedHosts (reject early)
//!     → upgrade? scan WebSocket rules : scan HTTP rules
//!     → Forward(rule) | Fallback(document) | Unhandled
//! ```

use axum::http::{header, HeaderMap, Request};
use url::Url;

use crate::config::{RouterConfig, Transport};
use crate::error::RouterError;
use crate::routing::fallback::FallbackPolicy;
use crate::routing::hosts::{request_host, AllowedHosts};
use crate::routing::matcher::normalize_path;
use crate::routing::router::{Rule, RouteTable, RuleError};

/// Outcome of dispatching a request.
#[derive(Debug)]
pub enum Action<'a> {
    /// Relay to the rule's destination over its transport.
    Forward(&'a Rule),
    /// Serve this document in place of the requested path.
    Fallback(&'a str),
    /// Hand the request to the asset server.
    Unhandled,
}

impl Action<'_> {
    /// Label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Action::Forward(rule) if rule.transport == Transport::Ws => "forward_ws",
            Action::Forward(_) => "forward_http",
            Action::Fallback(_) => "fallback",
            Action::Unhandled => "unhandled",
        }
    }
}

/// Host gate, rule table and fallback policy, built once at startup.
#[derive(Debug)]
pub struct Dispatcher {
    hosts: AllowedHosts,
    table: RouteTable,
    fallback: FallbackPolicy,
}

impl Dispatcher {
    pub fn new(hosts: AllowedHosts, table: RouteTable, fallback: FallbackPolicy) -> Self {
        Self {
            hosts,
            table,
            fallback,
        }
    }

    /// Compile the routing parts of a validated config.
    pub fn from_config(config: &RouterConfig) -> Result<Self, RuleError> {
        let backend = Url::parse(&config.backend.url).map_err(|e| RuleError::Destination {
            route: "backend".to_string(),
            destination: config.backend.url.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self::new(
            AllowedHosts::new(&config.listener.allowed_hosts),
            RouteTable::from_config(&config.routes, &backend)?,
            FallbackPolicy::from_config(&config.fallback),
        ))
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Decide what to do with a request.
    pub fn dispatch<B>(&self, req: &Request<B>) -> Result<Action<'_>, RouterError> {
        match request_host(req) {
            Some(host) if self.hosts.contains(host) => {}
            host => {
                return Err(RouterError::HostRejected {
                    host: host.unwrap_or_default().to_string(),
                })
            }
        }

        let path = normalize_path(req.uri().path());

        if is_websocket_upgrade(req.headers()) {
            return match self.table.find(&path, Transport::Ws) {
                Some(rule) => Ok(Action::Forward(rule)),
                None => Err(RouterError::UpgradeMismatch {
                    path: req.uri().path().to_string(),
                }),
            };
        }

        if let Some(rule) = self.table.find(&path, Transport::Http) {
            return Ok(Action::Forward(rule));
        }

        if self.fallback.applies(req.method(), &path, req.headers()) {
            Ok(Action::Fallback(self.fallback.target_document()))
        } else {
            Ok(Action::Unhandled)
        }
    }
}

/// `Connection: upgrade` together with `Upgrade: websocket`.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    let upgrade_websocket = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    connection_upgrade && upgrade_websocket
}
