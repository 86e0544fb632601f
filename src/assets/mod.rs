//! Local development assets.
//!
//! # Responsibilities
//! - Serve the build output directory for requests no proxy rule took
//! - Serve the SPA shell for history fallbacks
//! - Answer the service worker reset hook before touching the disk
//!
//! # Data Flow
//! ```text
//! Unhandled request
//!     → service_worker.rs (reset script, if enabled)
//!     → directory index rewrite (`/docs/` → `/docs/embed.html`)
//!     → ServeDir (file or 404)
//! ```

pub mod service_worker;

use std::path::Path;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode, Uri};
use axum::response::IntoResponse;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::config::RouterConfig;

/// Serves files from the content base.
#[derive(Debug, Clone)]
pub struct AssetServer {
    files: ServeDir,
    index: String,
    service_worker_reset: bool,
}

impl AssetServer {
    pub fn new(content_base: impl AsRef<Path>, index: impl Into<String>) -> Self {
        Self {
            files: ServeDir::new(content_base).append_index_html_on_directories(false),
            index: index.into(),
            service_worker_reset: true,
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(&config.assets.content_base, config.fallback.index.clone())
            .service_worker_reset(config.assets.service_worker_reset)
    }

    pub fn service_worker_reset(mut self, enabled: bool) -> Self {
        self.service_worker_reset = enabled;
        self
    }

    /// Serve `request` from disk, after the development hooks.
    pub async fn serve(&self, mut request: Request<Body>) -> Response<Body> {
        let path = request.uri().path();

        if self.service_worker_reset && path == service_worker::SERVICE_WORKER_PATH {
            return service_worker::noop_response();
        }

        if path.ends_with('/') {
            let index = self.index.trim_start_matches('/');
            match format!("{path}{index}").parse::<Uri>() {
                Ok(uri) => *request.uri_mut() = uri,
                Err(e) => tracing::debug!(error = %e, "Cannot resolve directory index"),
            }
        }

        match self.files.clone().oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        }
    }

    /// Serve `document` in place of whatever `request` asked for.
    pub async fn serve_document(
        &self,
        document: &str,
        mut request: Request<Body>,
    ) -> Response<Body> {
        match document.parse::<Uri>() {
            Ok(uri) => *request.uri_mut() = uri,
            Err(e) => {
                tracing::error!(document, error = %e, "Invalid fallback document");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
        self.serve(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use std::path::PathBuf;

    fn content_base() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dev-router-assets-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("static")).unwrap();
        std::fs::write(dir.join("embed.html"), "<div id=\"app\"></div>").unwrap();
        std::fs::write(dir.join("static/app.js"), "console.log(1)").unwrap();
        dir
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_serves_files_and_404s() {
        let dir = content_base();
        let assets = AssetServer::new(&dir, "/embed.html");

        let response = assets.serve(get("/static/app.js")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "console.log(1)");

        let response = assets.serve(get("/static/missing.png")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_directory_index() {
        let dir = content_base();
        let assets = AssetServer::new(&dir, "/embed.html");

        let response = assets.serve(get("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<div id=\"app\"></div>");

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_serve_document() {
        let dir = content_base();
        let assets = AssetServer::new(&dir, "/embed.html");

        let response = assets.serve_document("/embed.html", get("/settings/profile?tab=2")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<div id=\"app\"></div>");

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_service_worker_reset() {
        let dir = content_base();
        let assets = AssetServer::new(&dir, "/embed.html");

        let response = assets.serve(get("/service-worker.js")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/javascript");
        assert!(body_string(response).await.contains("unregister()"));

        let assets = assets.service_worker_reset(false);
        let response = assets.serve(get("/service-worker.js")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        std::fs::remove_dir_all(dir).unwrap();
    }
}
