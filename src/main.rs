//! Markdown interceptor host.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ dispatcher ──Decline──▶ forwarder ──▶ Upstream
//!                                        │
//!                                    Intercept
//!                                        ▼
//!                                  proxy loader ──fetch──▶ Upstream
//!                                        │
//!                                    transform (Markdown → HTML)
//!                                        ▼
//!     Client Response ◀────────── bounded channel
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use markdown_interceptor::config::{load_config, ConfigWatcher};
use markdown_interceptor::lifecycle::{wait_for_termination, Shutdown};
use markdown_interceptor::observability::{logging, metrics};
use markdown_interceptor::{AppConfig, HttpServer};

#[derive(Parser)]
#[command(name = "markdown-interceptor", version)]
#[command(about = "Serves Markdown documents as HTML by intercepting their requests", long_about = None)]
struct Cli {
    /// TOML config file; watched for interceptor changes
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Validate the config and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::with_markdown_defaults(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability.log_level);

    if cli.check {
        tracing::info!(interceptors = config.interceptors.len(), "Configuration is valid");
        return Ok(());
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        interceptors = config.interceptors.len(),
        failure_policy = ?config.loader.failure_policy,
        "markdown-interceptor starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => (None, tokio::sync::mpsc::unbounded_channel().1),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(wait_for_termination(shutdown));

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
