//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every destination is a usable base URL
//! - Check host identities and path patterns
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

use crate::config::schema::{RouterConfig, Transport};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address {0:?}")]
    BindAddress(String),

    #[error("allowed_hosts must not be empty")]
    NoAllowedHosts,

    #[error("allowed host {0:?} is not of the form host:port")]
    AllowedHost(String),

    #[error("invalid response header {0:?}")]
    ResponseHeader(String),

    #[error("{field}: {reason}")]
    Destination { field: String, reason: String },

    #[error("route #{0} has an empty name")]
    UnnamedRoute(usize),

    #[error("duplicate route name {0:?}")]
    DuplicateRoute(String),

    #[error("route {0:?} has no paths")]
    EmptyRoute(String),

    #[error("route {route:?}: path {path:?} must start with '/'")]
    RoutePath { route: String, path: String },

    #[error("fallback index {0:?} must start with '/'")]
    FallbackIndex(String),

    #[error("fallback exclude {0:?} must start with '/'")]
    FallbackExclude(String),

    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.listener.allowed_hosts.is_empty() {
        errors.push(ValidationError::NoAllowedHosts);
    }
    for host in &config.listener.allowed_hosts {
        if !is_host_port(host) {
            errors.push(ValidationError::AllowedHost(host.clone()));
        }
    }

    for (name, value) in &config.listener.response_headers {
        let valid_name = HeaderName::from_bytes(name.as_bytes()).is_ok();
        if !valid_name || HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::ResponseHeader(name.clone()));
        }
    }

    if let Err(reason) = check_destination(&config.backend.url, Transport::Http) {
        errors.push(ValidationError::Destination {
            field: "backend.url".to_string(),
            reason,
        });
    }

    let mut names = HashSet::new();
    for (i, route) in config.routes.iter().enumerate() {
        if route.name.trim().is_empty() {
            errors.push(ValidationError::UnnamedRoute(i));
        } else if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }

        if route.paths.is_empty() {
            errors.push(ValidationError::EmptyRoute(route.name.clone()));
        }
        for path in &route.paths {
            if !path.starts_with('/') {
                errors.push(ValidationError::RoutePath {
                    route: route.name.clone(),
                    path: path.clone(),
                });
            }
        }

        let destination = route.destination.as_deref().unwrap_or(&config.backend.url);
        if let Err(reason) = check_destination(destination, route.transport) {
            errors.push(ValidationError::Destination {
                field: format!("routes.{}.destination", route.name),
                reason,
            });
        }
    }

    if !config.fallback.index.starts_with('/') {
        errors.push(ValidationError::FallbackIndex(config.fallback.index.clone()));
    }
    for prefix in &config.fallback.exclude {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::FallbackExclude(prefix.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `host:port` with a non-empty host and a numeric port.
fn is_host_port(value: &str) -> bool {
    match value.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

/// Destinations are origins only; TLS to the backend is not supported.
fn check_destination(raw: &str, transport: Transport) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("{raw:?} is not a URL: {e}"))?;

    match (url.scheme(), transport) {
        ("http", _) | ("ws", Transport::Ws) => {}
        ("ws", Transport::Http) => {
            return Err(format!("{raw:?} uses ws:// on an HTTP route"));
        }
        (scheme, _) => return Err(format!("unsupported scheme {scheme:?} in {raw:?}")),
    }

    if url.host_str().is_none() {
        return Err(format!("{raw:?} has no host"));
    }
    if url.path() != "/" || url.query().is_some() {
        return Err(format!("{raw:?} must not carry a path or query"));
    }
    Ok(())
}
