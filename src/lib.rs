//! Development router library.
//!
//! Host check, path rules and SPA fallback in [`routing`], the HTTP and
//! WebSocket relays in [`http`], and the local file server in [`assets`].

pub mod assets;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::RouterConfig;
pub use error::RouterError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
