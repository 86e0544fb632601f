//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::Message;

use dev_router::{HttpServer, RouterConfig, Shutdown};

pub const SHELL: &str = "<!DOCTYPE html><div id=\"app\"></div>";

/// Start a mock backend that answers every request with its own request
/// line, e.g. `GET /api/users?page=2`.
pub async fn start_mock_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }

                let head = String::from_utf8_lossy(&head);
                let request_line = head.lines().next().unwrap_or_default();
                let body = request_line
                    .rsplit_once(' ')
                    .map(|(line, _version)| line)
                    .unwrap_or(request_line)
                    .to_string();

                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a WebSocket backend that echoes text and binary frames.
///
/// A text frame reading `close` makes it close the session itself. It
/// selects the first subprotocol the client offers, and reports on the
/// returned channel whenever a session ends.
pub async fn start_ws_echo_backend() -> (SocketAddr, mpsc::UnboundedReceiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let closed_tx = closed_tx.clone();
            tokio::spawn(async move {
                let select_protocol = |request: &Request, mut response: Response| {
                    let offered = request
                        .headers()
                        .get(SEC_WEBSOCKET_PROTOCOL)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.split(',').next())
                        .map(|p| p.trim().to_string());
                    if let Some(protocol) = offered {
                        response
                            .headers_mut()
                            .insert(SEC_WEBSOCKET_PROTOCOL, protocol.parse().unwrap());
                    }
                    Ok::<_, ErrorResponse>(response)
                };

                let Ok(mut socket) =
                    tokio_tungstenite::accept_hdr_async(stream, select_protocol).await
                else {
                    return;
                };

                while let Some(Ok(message)) = socket.next().await {
                    match message {
                        Message::Text(text) if text.as_str() == "close" => {
                            let _ = socket.close(None).await;
                            break;
                        }
                        Message::Text(_) | Message::Binary(_) => {
                            if socket.send(message).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                let _ = closed_tx.send(());
            });
        }
    });

    (addr, closed_rx)
}

/// An address nothing listens on.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A running router on an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub content_base: PathBuf,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
        let _ = std::fs::remove_dir_all(&self.content_base);
    }
}

/// Start the router with `config`, on 127.0.0.1:0, serving a temporary
/// content base that holds the SPA shell and one static file.
pub async fn start_proxy(mut config: RouterConfig) -> TestProxy {
    let content_base =
        std::env::temp_dir().join(format!("dev-router-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(content_base.join("static")).unwrap();
    std::fs::write(content_base.join("embed.html"), SHELL).unwrap();
    std::fs::write(content_base.join("static/app.js"), "console.log('app')").unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    config.listener.bind_address = addr.to_string();
    config.listener.public_host = addr.to_string();
    config.listener.allowed_hosts = vec![addr.to_string()];
    config.assets.content_base = content_base.clone();
    config.backend.connect_timeout_secs = 2;

    let server = HttpServer::new(config).unwrap();
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });

    TestProxy {
        addr,
        shutdown,
        content_base,
    }
}

/// Plain HTTP client that never goes through an environment proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}
