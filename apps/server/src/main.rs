//! Cantata Server - standalone headless HTTP/JSON bridge.
//!
//! Boots the control-plane core (discovery, eventing, topology, device
//! control) and fronts it with the generic JSON router plus the SSE
//! event stream. Designed to run as a background daemon on the LAN the
//! players live on.

mod config;
mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cantata_core::bootstrap_services;
use clap::Parser;
use tokio::signal;

use crate::config::ServerConfig;

/// Cantata Server - LAN control plane for UPnP multi-room audio players.
#[derive(Parser, Debug)]
#[command(name = "cantata-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "CANTATA_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// API bind port (overrides config file).
    #[arg(short = 'p', long, env = "CANTATA_BIND_PORT")]
    port: Option<u16>,

    /// Advertise IP address for callbacks (overrides config file).
    #[arg(short = 'a', long, env = "CANTATA_ADVERTISE_IP")]
    advertise_ip: Option<String>,

    /// Data directory for persistent state (station cache, backoff).
    #[arg(short = 'd', long, env = "CANTATA_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Cantata Server v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ServerConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;

    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(ip) = args.advertise_ip {
        config.advertise_ip = Some(ip);
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = Some(data_dir);
    }

    let core_config = config.to_core_config();
    let services =
        Arc::new(bootstrap_services(&core_config).context("Failed to bootstrap services")?);
    let callback_port = services
        .start(&core_config)
        .await
        .context("Failed to start core services")?;
    log::info!("Core started (callback port {})", callback_port);

    // The outer JSON router. Everything interesting lives in the core;
    // this is the thin collaborator surface.
    let app = routes::router(Arc::clone(&services));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.bind_port))
        .await
        .with_context(|| format!("Failed to bind API port {}", config.bind_port))?;
    log::info!("HTTP API listening on port {}", config.bind_port);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::error!("API server error: {}", e);
        }
    });

    shutdown_signal().await;
    log::info!("Shutdown signal received, cleaning up...");

    services.shutdown().await;
    server_handle.abort();

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
