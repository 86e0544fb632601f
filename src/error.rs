//! Per-request routing failures.
//!
//! Every variant is terminal for its request and is turned into a response
//! at the router boundary; nothing here is retried.

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use axum::response::IntoResponse;
use thiserror::Error;

/// Boxed transport error from the HTTP client or WebSocket handshake.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum RouterError {
    /// `Host` header missing or not in the allowed set.
    #[error("host {host:?} is not allowed")]
    HostRejected { host: String },

    /// WebSocket upgrade with no WebSocket rule for the path.
    #[error("no websocket route for {path}")]
    UpgradeMismatch { path: String },

    /// The destination could not be reached.
    #[error("backend {destination} unreachable: {source}")]
    BackendUnreachable {
        destination: String,
        #[source]
        source: BoxError,
    },
}

impl RouterError {
    pub fn backend_unreachable(destination: impl ToString, source: impl Into<BoxError>) -> Self {
        RouterError::BackendUnreachable {
            destination: destination.to_string(),
            source: source.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RouterError::HostRejected { .. } => StatusCode::FORBIDDEN,
            RouterError::UpgradeMismatch { .. } => StatusCode::BAD_REQUEST,
            RouterError::BackendUnreachable { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RouterError::HostRejected { .. } => "host_rejected",
            RouterError::UpgradeMismatch { .. } => "upgrade_mismatch",
            RouterError::BackendUnreachable { .. } => "backend_unreachable",
        }
    }
}

impl IntoResponse for RouterError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        match self {
            RouterError::HostRejected { .. } => {
                (status, "Invalid Host header").into_response()
            }
            // No body; the connection is not reused.
            RouterError::UpgradeMismatch { .. } | RouterError::BackendUnreachable { .. } => {
                let mut response = Response::new(Body::empty());
                *response.status_mut() = status;
                response
                    .headers_mut()
                    .insert(header::CONNECTION, HeaderValue::from_static("close"));
                response
            }
        }
    }
}
