//! HTTP forwarding and the proxy error responder.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the rule's destination
//! - Strip hop-by-hop headers in both directions
//! - Stream bodies through without buffering
//! - Turn any backend failure into the rule's error response
//!
//! # Design Decisions
//! - Single attempt; a failed forward is never retried
//! - `Host` is passed through unchanged
//! - The backend's status is returned as-is, including its 5xx responses

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, Request, Response};
use axum::response::IntoResponse;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::ErrorPolicy;
use crate::error::RouterError;
use crate::http::error_page::ErrorDocument;
use crate::observability::metrics;
use crate::routing::Rule;

/// Client used for every HTTP forward.
pub type HttpClient = Client<HttpConnector, Body>;

/// Build the forwarding client.
pub fn build_client(connect_timeout: Duration) -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    Client::builder(TokioExecutor::new()).build(connector)
}

/// Headers scoped to a single connection (RFC 9110 §7.6.1).
static HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Names listed in Connection are hop-by-hop too.
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Forward `request` to the rule's destination.
///
/// Never fails: an unreachable backend yields the rule's error response.
pub async fn forward(
    client: &HttpClient,
    rule: &Rule,
    request: Request<Body>,
    error_document: &ErrorDocument,
) -> Response<Body> {
    let start = Instant::now();

    match send(client, rule, request).await {
        Ok(response) => {
            metrics::record_forward(&rule.name, response.status().as_u16(), start);
            response
        }
        Err(err) => {
            tracing::debug!(rule = %rule.name, error = %err, "Backend unreachable");
            metrics::record_forward_error(&rule.name, err.kind());
            match rule.on_error {
                ErrorPolicy::Document => error_document.response().await,
                ErrorPolicy::BadGateway => err.into_response(),
            }
        }
    }
}

async fn send(
    client: &HttpClient,
    rule: &Rule,
    request: Request<Body>,
) -> Result<Response<Body>, RouterError> {
    let (mut parts, body) = request.into_parts();

    parts.uri = rule
        .http_uri(parts.uri.path_and_query())
        .map_err(|e| RouterError::backend_unreachable(&rule.destination, e))?;
    strip_hop_by_hop(&mut parts.headers);

    let response = client
        .request(Request::from_parts(parts, body))
        .await
        .map_err(|e| RouterError::backend_unreachable(&rule.destination, e))?;

    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Ok(Response::from_parts(parts, Body::new(body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Transport;
    use crate::routing::matcher::PrefixMatcher;
    use axum::http::StatusCode;
    use url::Url;

    fn rule_to(addr: std::net::SocketAddr, on_error: ErrorPolicy) -> Rule {
        Rule::new(
            "backend",
            Box::new(PrefixMatcher::new("/api")),
            Url::parse(&format!("http://{addr}")).unwrap(),
            Transport::Http,
            on_error,
        )
        .unwrap()
    }

    async fn refused_addr() -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    fn request() -> Request<Body> {
        Request::builder()
            .uri("/api/users")
            .header("Host", "127.0.0.1:8080")
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, "keep-alive, x-session-hint".parse().unwrap());
        headers.insert("keep-alive", "timeout=5".parse().unwrap());
        headers.insert("x-session-hint", "1".parse().unwrap());
        headers.insert(header::TRANSFER_ENCODING, "chunked".parse().unwrap());
        headers.insert(header::COOKIE, "sid=abc".parse().unwrap());

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers[header::COOKIE], "sid=abc");
    }

    #[tokio::test]
    async fn test_refused_backend_serves_error_document() {
        let client = build_client(Duration::from_secs(1));
        let rule = rule_to(refused_addr().await, ErrorPolicy::Document);
        let doc = ErrorDocument::new("<h1>down</h1>");

        for _ in 0..2 {
            let response = forward(&client, &rule, request(), &doc).await;
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
            let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert_eq!(&body[..], b"<h1>down</h1>");
        }
    }

    #[tokio::test]
    async fn test_refused_backend_bad_gateway_policy() {
        let client = build_client(Duration::from_secs(1));
        let rule = rule_to(refused_addr().await, ErrorPolicy::BadGateway);

        let response = forward(&client, &rule, request(), &ErrorDocument::bundled()).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }
}
