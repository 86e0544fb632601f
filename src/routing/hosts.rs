//! `Host` header validation.
//!
//! Requests addressed to a name the dev listener does not own are refused
//! before any routing happens; this closes the DNS-rebinding hole where a
//! hostile page resolves its own name to the loopback listener.

use std::collections::HashSet;

use axum::http::{header, Request};

/// Set of `host:port` identities the listener answers to.
#[derive(Debug, Clone, Default)]
pub struct AllowedHosts {
    hosts: HashSet<String>,
}

impl AllowedHosts {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Case-insensitive membership.
    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains(&host.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// The host a request is addressed to: the `Host` header, or the URI
/// authority for HTTP/2 requests that carry `:authority` only.
pub fn request_host<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().authority().map(|a| a.as_str()))
}
