//! wbs-ss (Scan Session) - warehouse box scanning session service
//!
//! Holds scan sessions in the record store, reconciles scans with OCR
//! results and manual corrections, and notifies the booking system when a
//! session is finalized.

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;

use wbs_common::config::{default_config_path, load_toml_config};
use wbs_ss::config::{Args, ServiceConfig};
use wbs_ss::{build_router, build_state};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(|| default_config_path("wbs-ss"));
    let toml = load_toml_config(config_path.as_deref());
    let config = ServiceConfig::resolve(&args, &toml);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("wbs_ss={0},wbs_common={0},tower_http=info", config.log_level).into()),
        )
        .init();

    info!("Starting WBS Scan Session service (wbs-ss) v{}", env!("CARGO_PKG_VERSION"));

    config.validate().context("Invalid configuration")?;

    let state = build_state(&config)
        .await
        .context("Failed to initialize service state")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
    info!("wbs-ss listening on http://{}", config.bind_address);
    info!("Scan links use base URL {}", config.public_base_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
