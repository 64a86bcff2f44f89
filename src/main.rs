//! Telemetry receiver.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                  RECEIVER                     │
//!                         │                                               │
//!   gRPC client  ────┐    │  ┌──────────┐    ┌─────────┐   ┌──────────┐  │
//!                    ├────┼─▶│ listener │───▶│  demux  │──▶│   rpc    │──┼──▶ TraceSink
//!   HTTP/JSON    ────┘    │  └──────────┘    └────┬────┘   │  server  │──┼──▶ MetricsSink
//!                         │                       │        └────▲─────┘  │
//!                         │                       ▼             │        │
//!                         │                  ┌─────────┐  loopback gRPC  │
//!                         │                  │ gateway │────────┘        │
//!                         │                  └─────────┘                 │
//!                         │                                               │
//!                         │  lifecycle: once guards, state, startup probe │
//!                         └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use telemetry_receiver::config::{load_config, ReceiverConfig};
use telemetry_receiver::observability::{logging, metrics};
use telemetry_receiver::{LoggingSink, Receiver};

#[derive(Parser)]
#[command(name = "telemetry-receiver")]
#[command(
    about = "Receives traces and metrics over gRPC and HTTP/JSON on one port",
    long_about = None
)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration file.
    #[arg(short, long)]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ReceiverConfig::default(),
    };
    if let Some(address) = args.address {
        config.bind_address = address;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("telemetry-receiver v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.bind_address,
        probe_timeout_ms = config.receiver.startup.probe_timeout_ms,
        log_format = %config.observability.log_format,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let receiver = Receiver::new(&config.bind_address, config.receiver.clone()).await?;
    let sink = Arc::new(LoggingSink);
    let _ = receiver.start(sink.clone(), sink).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    let _ = receiver.stop().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
