//! Conflict retry service.
//!
//! Serves a counter store over HTTP with every request running behind the retry layer.
//!
//! ```text
//!     Client Request
//!     ──────────────▶ axum (request ID, trace, body limit, timeout)
//!                       │
//!                       ▼  spawn_blocking
//!                     Retry ──▶ CounterApp ──▶ VersionedStore
//!                       │  ◀── WriteConflict (replay body, try again)
//!                       ▼
//!     ◀────────────── status + headers + body of the final attempt
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use conflict_retry::config::{load_config, ServiceConfig};
use conflict_retry::http::HttpServer;
use conflict_retry::observability::{logging, metrics};
use conflict_retry::resilience::{ErrorKindRegistry, Retry, RetryPolicy};
use conflict_retry::store::{CounterApp, VersionedStore};

#[derive(Parser)]
#[command(name = "conflict-retry")]
#[command(about = "Counter service behind a conflict-retry layer", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let registry = ErrorKindRegistry::default();

    let mut config = match &cli.config {
        Some(path) => load_config(path, &registry)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability.log_filter);
    tracing::info!("conflict-retry v{} starting", env!("CARGO_PKG_VERSION"));

    let policy = RetryPolicy::from_config(&config.retry, &config.body, &registry)?;
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_attempts = policy.max_attempts(),
        retryable = ?config.retry.retryable,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = VersionedStore::new(Duration::from_millis(config.store.contention_delay_ms));
    let retryable = policy.retryable().clone();
    let app = Retry::new(CounterApp::new(store), policy);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config, Arc::new(app), retryable);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
