//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the single dispatch handler
//! - Wire up middleware (tracing, request ID, response headers, gzip)
//! - Bind server to listener
//! - Dispatch requests: forward, upgrade, fallback or serve assets
//! - Observability (metrics, correlation IDs)

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{Extensions, HeaderMap, HeaderName, HeaderValue, StatusCode, Version},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::compression::{predicate::DefaultPredicate, CompressionLayer, Predicate};
use tower_http::trace::TraceLayer;

use crate::assets::AssetServer;
use crate::config::{validate_config, ConfigError, RouterConfig, Transport, ValidationError};
use crate::http::error_page::ErrorDocument;
use crate::http::forward::{self, HttpClient};
use crate::http::request;
use crate::http::websocket;
use crate::observability::metrics;
use crate::routing::{Action, Dispatcher, RuleError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub client: HttpClient,
    pub assets: AssetServer,
    pub error_document: ErrorDocument,
    pub connect_timeout: Duration,
}

/// HTTP server for the development router.
pub struct HttpServer {
    router: Router,
    config: RouterConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Validates the config and compiles the rule table.
    pub fn new(config: RouterConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let dispatcher = Dispatcher::from_config(&config).map_err(|e| match e {
            RuleError::Destination { route, reason, .. } => {
                ConfigError::Validation(vec![ValidationError::Destination {
                    field: format!("routes.{route}.destination"),
                    reason,
                }])
            }
        })?;

        let error_document = ErrorDocument::load(config.assets.error_document.as_deref());
        if let Some(path) = error_document.path().filter(|path| !path.is_file()) {
            tracing::warn!(
                path = %path.display(),
                "Error document not found, the bundled page is served until it exists"
            );
        }
        let connect_timeout = Duration::from_secs(config.backend.connect_timeout_secs);

        tracing::info!(
            rules = dispatcher.table().len(),
            backend = %config.backend.url,
            content_base = %config.assets.content_base.display(),
            "Dispatcher ready"
        );

        let state = AppState {
            dispatcher: Arc::new(dispatcher),
            client: forward::build_client(connect_timeout),
            assets: AssetServer::from_config(&config),
            error_document,
            connect_timeout,
        };

        let response_headers = Arc::new(response_headers(&config));
        let router = Self::build_router(state, response_headers, config.listener.compress);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState, response_headers: Arc<HeaderMap>, compress: bool) -> Router {
        let router = Router::new()
            .route("/{*path}", any(dispatch_handler))
            .route("/", any(dispatch_handler))
            .with_state(state);

        let router = if compress {
            router.layer(compression_layer())
        } else {
            router
        };

        router
            .layer(middleware::from_fn_with_state(
                response_headers,
                add_response_headers,
            ))
            .layer(request::propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(request::set_request_id_layer())
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            public_host = %self.config.listener.public_host,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Single entry point: every method, every path.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request::request_id(&request).to_string();

    let action = match state.dispatcher.dispatch(&request) {
        Ok(action) => action,
        Err(err) => {
            tracing::warn!(
                request_id = %request_id,
                method = %request.method(),
                path = %request.uri().path(),
                error = %err,
                "Request rejected"
            );
            metrics::record_rejection(err.kind());
            return err.into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        action = action.label(),
        "Dispatching request"
    );
    metrics::record_dispatch(action.label());

    match action {
        Action::Forward(rule) => match rule.transport {
            Transport::Ws => websocket::proxy(rule, request, state.connect_timeout).await,
            Transport::Http => {
                forward::forward(&state.client, rule, request, &state.error_document).await
            }
        },
        Action::Fallback(document) => state.assets.serve_document(document, request).await,
        Action::Unhandled => state.assets.serve(request).await,
    }
}

/// Add the configured headers to responses that lack them.
async fn add_response_headers(
    State(headers): State<Arc<HeaderMap>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    for (name, value) in headers.iter() {
        if !response.headers().contains_key(name) {
            response.headers_mut().insert(name.clone(), value.clone());
        }
    }
    response
}

/// Gzip for every response the client accepts it on, proxied ones included.
/// Upgrade handshakes are left alone.
fn compression_layer() -> CompressionLayer<impl Predicate + Clone> {
    let not_upgrade = |status: StatusCode, _: Version, _: &HeaderMap, _: &Extensions| {
        status != StatusCode::SWITCHING_PROTOCOLS
    };
    CompressionLayer::new().compress_when(DefaultPredicate::new().and(not_upgrade))
}

/// Entries were checked by validation; anything unparsable is skipped.
fn response_headers(config: &RouterConfig) -> HeaderMap {
    config
        .listener
        .response_headers
        .iter()
        .filter_map(|(name, value)| {
            let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
            let value = HeaderValue::from_str(value).ok()?;
            Some((name, value))
        })
        .collect()
}
