//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, dispatch)
//!     → request.rs (request ID)
//!     → routing::Dispatcher decides the action
//!     → forward.rs (plain HTTP) | websocket.rs (upgrade relay) | assets
//!     → error_page.rs when the backend cannot be reached
//!     → Send to client
//! ```

pub mod error_page;
pub mod forward;
pub mod request;
pub mod server;
pub mod websocket;

pub use error_page::ErrorDocument;
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
