//! Development router.
//!
//! A local front server for frontend development: proxies API and GraphQL
//! traffic (including live-query WebSockets) to the application server,
//! serves the build output, and falls back to the SPA shell for
//! client-side routes.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                  DEV ROUTER                   │
//!     Browser request     │  ┌─────────┐    ┌────────────┐                │
//!     ────────────────────┼─▶│  http   │───▶│  routing   │                │
//!                         │  │ server  │    │ dispatcher │                │
//!                         │  └─────────┘    └─────┬──────┘                │
//!                         │        ┌──────────────┼──────────────┐        │
//!                         │        ▼              ▼              ▼        │
//!                         │  ┌──────────┐  ┌────────────┐  ┌──────────┐   │
//!                         │  │ forward  │  │ websocket  │  │  assets  │   │
//!                         │  │  (HTTP)  │  │   relay    │  │ (disk)   │   │
//!                         │  └────┬─────┘  └─────┬──────┘  └──────────┘   │
//!                         └───────┼──────────────┼────────────────────────┘
//!                                 ▼              ▼
//!                            Application server (backend)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use dev_router::config::{self, ConfigError, RouterConfig};
use dev_router::lifecycle::{signals, Shutdown};
use dev_router::observability::{logging, metrics};
use dev_router::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "dev-router")]
#[command(about = "Development router for a single-page frontend", long_about = None)]
struct Cli {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override `backend.url`.
    #[arg(long)]
    backend: Option<String>,

    /// Override `assets.content_base`.
    #[arg(long)]
    content_base: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn apply(&self, config: &mut RouterConfig) {
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(backend) = &self.backend {
            config.backend.url = backend.clone();
        }
        if let Some(content_base) = &self.content_base {
            config.assets.content_base = content_base.clone();
        }
        if self.json_logs {
            config.observability.json_logs = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::read_config(path)?,
        None => RouterConfig::default(),
    };
    cli.apply(&mut config);
    config::validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dev-router starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.url,
        routes = config.routes.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let server = HttpServer::new(config)?;

    // Bind last: traffic only once everything above succeeded.
    let listener = TcpListener::bind(&server.config().listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    signals::spawn_signal_listener(shutdown);

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
