//! Fronting relay.
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                        RELAY                         │
//!   Outer request     │  ┌─────────┐   ┌──────────┐   ┌────────────────┐    │
//!   (envelope body)   │  │   net   │──▶│  tunnel  │──▶│  http::request │    │
//!   ──────────────────┼─▶│listener │   │ envelope │   │  reconstruct   │    │
//!                     │  └─────────┘   └──────────┘   └───────┬────────┘    │
//!                     │                                       ▼             │
//!                     │                              ┌────────────────┐     │
//!                     │                              │   security     │     │
//!                     │                              │   allowlist    │     │
//!                     │                              └───────┬────────┘     │
//!                     │                                      ▼              │
//!   Outer 200         │  ┌──────────────┐            ┌────────────────┐     │
//!   (raw response)    │  │http::response│◀───────────│ http::forward  │◀────┼── Backend
//!   ◀─────────────────┼──│  serializer  │            │ pooled TLS     │     │
//!                     │  └──────────────┘            └────────────────┘     │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use front_relay::config;
use front_relay::http::HttpServer;
use front_relay::lifecycle::{signals, Shutdown};
use front_relay::net::listener;
use front_relay::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "front-relay")]
#[command(about = "Envelope-tunneling HTTP relay", long_about = None)]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    logging::init_logging(&config.observability.log_level);

    tracing::info!("front-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        static_root = %config.static_files.root,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        if let Err(e) = metrics::init_metrics(addr) {
            tracing::error!(error = %e, "Failed to start metrics exporter");
        }
    }

    let server = HttpServer::new(config.clone())?;

    // Bind last; a failure here ends the process.
    let listener = listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        signals::trigger_on_signal(&shutdown).await;
    });

    server.run(listener, signal).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
