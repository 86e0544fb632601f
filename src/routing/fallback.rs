//! SPA history fallback.
//!
//! Client-side routes such as `/settings/profile` have no file behind them;
//! navigation requests for them are rewritten to the single bootstrap
//! document so the frontend router can take over. Requests that look like
//! files keep failing with 404 so broken asset links stay visible.

use axum::http::{header, HeaderMap, Method};

use crate::config::FallbackConfig;
use crate::routing::matcher::{Matcher, PrefixMatcher};

/// When an unmatched request is served the SPA shell instead.
#[derive(Debug)]
pub struct FallbackPolicy {
    enabled: bool,
    target_document: String,
    exclude: Vec<PrefixMatcher>,
    rewrite_dotted_paths: bool,
}

impl FallbackPolicy {
    pub fn new(target_document: impl Into<String>) -> Self {
        Self {
            enabled: true,
            target_document: target_document.into(),
            exclude: Vec::new(),
            rewrite_dotted_paths: false,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new("/")
        }
    }

    pub fn from_config(config: &FallbackConfig) -> Self {
        Self {
            enabled: config.enabled,
            target_document: config.index.clone(),
            exclude: config.exclude.iter().map(PrefixMatcher::new).collect(),
            rewrite_dotted_paths: config.rewrite_dotted_paths,
        }
    }

    pub fn exclude(mut self, prefix: &str) -> Self {
        self.exclude.push(PrefixMatcher::new(prefix));
        self
    }

    pub fn target_document(&self) -> &str {
        &self.target_document
    }

    /// Whether an unmatched request should receive the target document.
    ///
    /// `path` must already be normalized.
    pub fn applies(&self, method: &Method, path: &str, headers: &HeaderMap) -> bool {
        self.enabled
            && (method == Method::GET || method == Method::HEAD)
            && !self.exclude.iter().any(|m| m.matches(path))
            && (self.rewrite_dotted_paths || !has_file_extension(path))
            && accepts_html(headers)
    }
}

/// Last path segment of the form `stem.ext`.
pub fn has_file_extension(path: &str) -> bool {
    let segment = path.rsplit('/').next().unwrap_or(path);
    match segment.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

/// Requests without an `Accept` header are treated as navigations.
fn accepts_html(headers: &HeaderMap) -> bool {
    let mut values = headers.get_all(header::ACCEPT).iter().peekable();
    if values.peek().is_none() {
        return true;
    }
    values
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|media| media.split(';').next().unwrap_or("").trim())
        .any(|media| media.eq_ignore_ascii_case("text/html") || media == "*/*")
}
