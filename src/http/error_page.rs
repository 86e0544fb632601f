//! Diagnostic page for unreachable backends.

use std::path::{Path, PathBuf};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Response, StatusCode};

static BUNDLED: &[u8] = include_bytes!("../../static/proxy_error.html");

#[derive(Debug, Clone)]
enum Source {
    Fixed(Bytes),
    File(PathBuf),
}

/// The HTML payload served on every forward failure.
///
/// A file-backed document is read when the failure happens, so edits show
/// up on the next error without a restart. While the file is unchanged
/// every failure gets the same bytes.
#[derive(Debug, Clone)]
pub struct ErrorDocument {
    source: Source,
}

impl ErrorDocument {
    /// A fixed payload.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            source: Source::Fixed(body.into()),
        }
    }

    /// The page shipped with the router.
    pub fn bundled() -> Self {
        Self::new(Bytes::from_static(BUNDLED))
    }

    /// Read from `path` on each failure.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::File(path.into()),
        }
    }

    /// The configured file, or the bundled page.
    pub fn load(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::file(path),
            None => Self::bundled(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::File(path) => Some(path),
            Source::Fixed(_) => None,
        }
    }

    /// Current payload. An unreadable file yields the bundled page.
    pub async fn body(&self) -> Bytes {
        match &self.source {
            Source::Fixed(body) => body.clone(),
            Source::File(path) => match tokio::fs::read(path).await {
                Ok(body) => Bytes::from(body),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Cannot read error document, serving bundled page"
                    );
                    Bytes::from_static(BUNDLED)
                }
            },
        }
    }

    /// 500 with `text/html`.
    pub async fn response(&self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body().await));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        response
    }
}

impl Default for ErrorDocument {
    fn default() -> Self {
        Self::bundled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_page() -> PathBuf {
        std::env::temp_dir().join(format!("dev-router-error-{}.html", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_response_is_identical_every_time() {
        let doc = ErrorDocument::bundled();
        let mut bodies = Vec::new();
        for _ in 0..3 {
            let response = doc.response().await;
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
            bodies.push(axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap());
        }
        assert!(bodies.iter().all(|b| b == BUNDLED));
        assert!(bodies[0].starts_with(b"<!DOCTYPE html>"));
    }

    #[tokio::test]
    async fn test_load() {
        let doc = ErrorDocument::load(None);
        assert!(doc.path().is_none());
        assert_eq!(doc.body().await, Bytes::from_static(BUNDLED));

        let path = temp_page();
        let doc = ErrorDocument::load(Some(&path));
        assert_eq!(doc.path(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_file_is_reread_on_each_failure() {
        let path = temp_page();
        let doc = ErrorDocument::file(&path);

        std::fs::write(&path, "<p>v1</p>").unwrap();
        assert_eq!(doc.body().await.as_ref(), b"<p>v1</p>");

        std::fs::write(&path, "<p>v2</p>").unwrap();
        assert_eq!(doc.body().await.as_ref(), b"<p>v2</p>");

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_unreadable_file_serves_bundled_page() {
        let doc = ErrorDocument::file("/nonexistent/error.html");
        let response = doc.response().await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], BUNDLED);
    }
}
