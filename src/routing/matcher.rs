//! Path matching logic.
//!
//! # Responsibilities
//! - Match a path exactly or by segment-bounded prefix
//! - Match through arbitrary classification functions
//! - Combine patterns with OR semantics
//!
//! # Design Decisions
//! - Matchers see the path already lower-cased; patterns are lower-cased
//!   once at construction
//! - Prefix matching respects segment boundaries: `/api` matches `/api` and
//!   `/api/x`, never `/apix`
//! - No regex, no allocation on the match path

use std::fmt;
use std::sync::Arc;

/// Trait for matching a normalized (lower-cased) request path.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;
}

/// Lower-case a request path for matching.
pub fn normalize_path(path: &str) -> String {
    path.to_lowercase()
}

/// Patterns ignore a trailing slash, so `/admin/` behaves like `/admin`.
fn normalize_pattern(pattern: &str) -> String {
    pattern.trim_end_matches('/').to_lowercase()
}

/// Matches a single path exactly.
#[derive(Debug, Clone)]
pub struct ExactMatcher {
    path: String,
}

impl ExactMatcher {
    pub fn new(path: impl AsRef<str>) -> Self {
        let path = normalize_pattern(path.as_ref());
        Self {
            path: if path.is_empty() { "/".to_string() } else { path },
        }
    }
}

impl Matcher for ExactMatcher {
    fn matches(&self, path: &str) -> bool {
        path == self.path || (path.is_empty() && self.path == "/")
    }
}

/// Matches a path and everything beneath it.
#[derive(Debug, Clone)]
pub struct PrefixMatcher {
    prefix: String,
}

impl PrefixMatcher {
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self {
            prefix: normalize_pattern(prefix.as_ref()),
        }
    }
}

impl Matcher for PrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        // Root prefix covers everything.
        if self.prefix.is_empty() {
            return true;
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Matches through a caller-supplied classification function.
#[derive(Clone)]
pub struct FnMatcher {
    name: &'static str,
    predicate: Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

impl FnMatcher {
    pub fn new<F>(name: &'static str, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            name,
            predicate: Arc::new(predicate),
        }
    }
}

impl fmt::Debug for FnMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMatcher").field("name", &self.name).finish()
    }
}

impl Matcher for FnMatcher {
    fn matches(&self, path: &str) -> bool {
        (self.predicate)(path)
    }
}

/// Combines multiple matchers with OR semantics.
#[derive(Debug)]
pub struct AnyMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AnyMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AnyMatcher {
    fn matches(&self, path: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(path))
    }
}
