//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Open the backend WebSocket before answering the client handshake
//! - Complete upgrade handshake with client, echoing the backend subprotocol
//! - Bidirectional frame forwarding
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Router ←──── WebSocket frames ────→ Backend
//! ```
//!
//! # Design Decisions
//! - Frame-level forwarding (no message buffering)
//! - Close frames propagated in both directions
//! - Ping/pong relayed like any other frame
//! - One side ending tears down the whole pairing

use std::time::Duration;

use axum::body::Body;
use axum::extract::ws::{self, WebSocket, WebSocketUpgrade};
use axum::extract::FromRequestParts;
use axum::http::{header, HeaderMap, HeaderName, Request};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::RouterError;
use crate::observability::metrics;
use crate::routing::Rule;

type BackendSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Headers the WebSocket client library generates for the backend handshake.
static HANDSHAKE_HEADERS: [HeaderName; 8] = [
    header::HOST,
    header::CONNECTION,
    header::UPGRADE,
    header::SEC_WEBSOCKET_KEY,
    header::SEC_WEBSOCKET_VERSION,
    header::SEC_WEBSOCKET_EXTENSIONS,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
];

/// Proxy a WebSocket upgrade to the rule's destination.
///
/// The backend is dialled first so that a dead backend refuses the client
/// handshake instead of accepting it and hanging up straight away.
pub async fn proxy(rule: &Rule, request: Request<Body>, connect_timeout: Duration) -> Response {
    let (mut parts, _body) = request.into_parts();

    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let connected = connect(
        rule,
        parts.uri.path_and_query(),
        &parts.headers,
        connect_timeout,
    )
    .await;
    let backend = match connected {
        Ok(backend) => backend,
        Err(err) => {
            tracing::debug!(rule = %rule.name, error = %err, "WebSocket backend unreachable");
            metrics::record_forward_error(&rule.name, err.kind());
            return err.into_response();
        }
    };

    let (socket, protocol) = backend;
    let upgrade = match protocol {
        Some(protocol) => upgrade.protocols([protocol]),
        None => upgrade,
    };

    let name = rule.name.clone();
    upgrade.on_upgrade(move |client| async move {
        metrics::websocket_opened();
        relay(client, socket).await;
        metrics::websocket_closed();
        tracing::debug!(rule = %name, "WebSocket closed");
    })
}

/// Dial the backend, returning its socket and the subprotocol it selected.
async fn connect(
    rule: &Rule,
    path_and_query: Option<&axum::http::uri::PathAndQuery>,
    client_headers: &HeaderMap,
    connect_timeout: Duration,
) -> Result<(BackendSocket, Option<String>), RouterError> {
    let uri = rule
        .websocket_uri(path_and_query)
        .map_err(|e| RouterError::backend_unreachable(&rule.destination, e))?;
    let target = uri.to_string();

    let mut request = uri
        .into_client_request()
        .map_err(|e| RouterError::backend_unreachable(&target, e))?;
    for (name, value) in client_headers {
        if !HANDSHAKE_HEADERS.contains(name) {
            request.headers_mut().append(name.clone(), value.clone());
        }
    }

    let handshake = tokio_tungstenite::connect_async(request);
    let (socket, response) = match tokio::time::timeout(connect_timeout, handshake).await {
        Ok(Ok(connected)) => connected,
        Ok(Err(e)) => return Err(RouterError::backend_unreachable(&target, e)),
        Err(elapsed) => return Err(RouterError::backend_unreachable(&target, elapsed)),
    };

    let protocol = response
        .headers()
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    Ok((socket, protocol))
}

/// Pump frames both ways until either side finishes.
async fn relay(client: WebSocket, backend: BackendSocket) {
    let (mut client_tx, mut client_rx) = client.split();
    let (mut backend_tx, mut backend_rx) = backend.split();

    let upstream = async {
        while let Some(Ok(message)) = client_rx.next().await {
            let closing = matches!(message, ws::Message::Close(_));
            if backend_tx.send(to_backend(message)).await.is_err() || closing {
                break;
            }
        }
    };

    let downstream = async {
        while let Some(Ok(message)) = backend_rx.next().await {
            let Some(message) = to_client(message) else {
                continue;
            };
            let closing = matches!(message, ws::Message::Close(_));
            if client_tx.send(message).await.is_err() || closing {
                break;
            }
        }
    };

    let client_ended = tokio::select! {
        _ = upstream => true,
        _ = downstream => false,
    };

    // The survivor gets a close frame even when its peer vanished without one.
    if client_ended {
        tracing::trace!("Client side of WebSocket ended");
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, backend_tx.close()).await;
    } else {
        tracing::trace!("Backend side of WebSocket ended");
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, client_tx.close()).await;
    }
}

fn to_backend(message: ws::Message) -> Message {
    match message {
        ws::Message::Text(text) => Message::Text(text.as_str().to_owned().into()),
        ws::Message::Binary(data) => Message::Binary(data),
        ws::Message::Ping(data) => Message::Ping(data),
        ws::Message::Pong(data) => Message::Pong(data),
        ws::Message::Close(frame) => Message::Close(frame.map(|f| CloseFrame {
            code: CloseCode::from(f.code),
            reason: f.reason.as_str().to_owned().into(),
        })),
    }
}

/// Raw frames never surface from a reading socket.
fn to_client(message: tungstenite::Message) -> Option<ws::Message> {
    Some(match message {
        Message::Text(text) => ws::Message::Text(text.as_str().to_owned().into()),
        Message::Binary(data) => ws::Message::Binary(data),
        Message::Ping(data) => ws::Message::Ping(data),
        Message::Pong(data) => ws::Message::Pong(data),
        Message::Close(frame) => ws::Message::Close(frame.map(|f| ws::CloseFrame {
            code: u16::from(f.code),
            reason: f.reason.as_str().to_owned().into(),
        })),
        Message::Frame(_) => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    #[test]
    fn test_frames_convert_unchanged() {
        match to_backend(ws::Message::Text(String::from("subscribe").into())) {
            Message::Text(text) => assert_eq!(text.as_str(), "subscribe"),
            other => panic!("unexpected {:?}", other),
        }
        match to_client(Message::Binary(Bytes::from_static(b"\x01\x02"))) {
            Some(ws::Message::Binary(data)) => assert_eq!(&data[..], b"\x01\x02"),
            other => panic!("unexpected {:?}", other),
        }
        match to_client(Message::Close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: String::from("bye").into(),
        }))) {
            Some(ws::Message::Close(Some(frame))) => {
                assert_eq!(frame.code, 1001);
                assert_eq!(frame.reason.as_str(), "bye");
            }
            other => panic!("unexpected {:?}", other),
        }
        match to_backend(ws::Message::Close(Some(ws::CloseFrame {
            code: 1000,
            reason: String::new().into(),
        }))) {
            Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Normal),
            other => panic!("unexpected {:?}", other),
        }
    }
}
