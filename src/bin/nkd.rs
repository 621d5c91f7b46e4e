//! nodekeeper daemon - in-memory znode tree served over TCP
//!
//! # Usage
//!
//! ```bash
//! # Start on the default address (0.0.0.0:8123)
//! nkd
//!
//! # Listen somewhere else
//! nkd --listen 127.0.0.1:9000
//! NKD_LISTEN=127.0.0.1:9000 nkd
//!
//! # Read settings from a file
//! nkd --config ./nkd.toml
//!
//! # Enable debug logging
//! RUST_LOG=nkd=debug nkd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use nkd::config::DaemonConfig;
use nkd::namespace::spawn_namespace;
use nkd::server::DaemonServer;

/// Filter used when neither `RUST_LOG` nor the config file sets one
const DEFAULT_LOG_FILTER: &str = "nkd=info,nk_core=info,nk_protocol=info";

/// nodekeeper daemon - hierarchical coordination service
#[derive(Parser, Debug)]
#[command(name = "nkd", version, about)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides config and NKD_LISTEN)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Longest accepted request line in bytes
    #[arg(long)]
    max_line_bytes: Option<usize>,
}

impl Args {
    /// Resolves the full configuration; flags win over every other layer.
    fn into_config(self) -> Result<DaemonConfig> {
        let mut config = DaemonConfig::resolve(self.config.as_deref())
            .context("Failed to load configuration")?;

        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(max_line_bytes) = self.max_line_bytes {
            config.max_line_bytes = max_line_bytes;
        }

        Ok(config)
    }
}

fn main() -> Result<()> {
    let config = Args::parse().into_config()?;
    run_daemon(config)
}

fn init_tracing(config_filter: Option<&str>) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config_filter.unwrap_or(DEFAULT_LOG_FILTER))
            .context("Invalid log_filter")?,
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon(config: DaemonConfig) -> Result<()> {
    init_tracing(config.log_filter.as_deref())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "nodekeeper daemon starting"
    );

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let namespace = spawn_namespace();
    info!("Namespace started");

    let server = DaemonServer::bind(&config, namespace, cancel_token)
        .await
        .context("Failed to start server")?;

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("nodekeeper daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
