//! dcol-ingest - audio acquisition service
//!
//! Accepts acquisition requests over HTTP, stores canonical 16 kHz mono WAV
//! files and tracks collection progress in the metadata document.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dcol_common::config::{load_or_default, RootFolderInitializer, RootFolderResolver};
use dcol_ingest::{AppState, Collector, IngestConfig};

/// Command-line arguments for dcol-ingest
#[derive(Parser, Debug)]
#[command(name = "dcol-ingest")]
#[command(about = "Audio acquisition service for diarization data collection")]
#[command(version)]
struct Args {
    /// Root folder holding audio, metadata and reports
    #[arg(short, long, env = "DCOL_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Explicit TOML config file
    #[arg(short, long, env = "DCOL_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "DCOL_PORT")]
    port: Option<u16>,

    /// Bind address (overrides config)
    #[arg(long, env = "DCOL_BIND_ADDRESS")]
    bind_address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = load_or_default(args.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "dcol_ingest={level},dcol_common={level},tower_http={level}",
                    level = toml_config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting dcol-ingest {}", env!("CARGO_PKG_VERSION"));

    let root_folder = RootFolderResolver::new("dcol-ingest")
        .with_cli_arg(args.root_folder)
        .resolve(&toml_config);
    RootFolderInitializer::new(root_folder.clone())
        .ensure_directory_exists()
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;
    info!("Root folder: {}", root_folder.display());

    let mut config = IngestConfig::from_toml(root_folder, &toml_config);
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind_address) = args.bind_address {
        config.bind_address = bind_address;
    }

    let collector = Arc::new(Collector::new(config.clone()).context("Failed to initialize collector")?);
    info!(
        records = collector.metadata().record_count().await,
        "Metadata: {}",
        config.metadata_file.display()
    );
    info!("Storage: {}", config.storage_dir.display());

    let app = dcol_ingest::build_router(AppState::new(collector));

    let address = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;
    info!("Listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
