//! Capture gateway binary.
//!
//! ```text
//!     Client ──▶ TraceLayer ─▶ request id ─▶ timeout ─▶ ┌──────────────────┐
//!                                                       │ request-body     │ log request body
//!                                                       │ response-body    │ log response body + latency
//!                                                       └────────┬─────────┘
//!                                                                ▼
//!     Client ◀───────────────────────────────────────────── upstream backend
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use capture_gateway::config::{load_config, validate_config, GatewayConfig};
use capture_gateway::lifecycle::{wait_for_signal, Shutdown};
use capture_gateway::observability::{logging, metrics};
use capture_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "capture-gateway")]
#[command(about = "Reverse proxy that logs request and response bodies", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(long)]
    bind: Option<String>,

    /// Override `upstream.address`.
    #[arg(long)]
    upstream: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(upstream) = cli.upstream {
        config.upstream.address = upstream;
    }
    if let Err(errors) = validate_config(&config) {
        for e in &errors {
            eprintln!("invalid configuration: {e}");
        }
        return Err("configuration rejected".into());
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("capture-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        max_body_bytes = config.capture.max_body_bytes,
        request_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = GatewayServer::new(config)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => {
                shutdown.trigger();
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for shutdown signals");
                // Dropping `shutdown` would close the channel and stop the server.
                std::future::pending::<()>().await;
            }
        }
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
