mod ipc;
mod rotation;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use walld_core::config::Configuration;
use walld_core::dispatch::Dispatcher;
use walld_core::paths::WalldPaths;
use walld_core::scan::scan_directory;
use walld_core::store::Store;

use rotation::engine::RotationEngine;
use rotation::DaemonCommand;

#[derive(Parser)]
#[command(name = "walld-daemon", about = "Wallpaper rotation daemon")]
struct Args {
    /// Configuration file (defaults to ~/.config/walld/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "walld_daemon=info,walld_core=info".into()),
        )
        .init();

    let args = Args::parse();
    let config_path = match args.config {
        Some(path) => path,
        None => WalldPaths::new()?.config_file(),
    };

    let config = Configuration::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    info!(
        config = %config_path.display(),
        interval_secs = config.interval.as_secs(),
        shuffle = config.shuffle,
        active = ?config.active_interfaces,
        "starting walld-daemon"
    );

    let wallpapers = match &config.source_path {
        Some(root) => scan_directory(root, config.recursive).unwrap_or_else(|e| {
            warn!("initial scan failed: {e}");
            Vec::new()
        }),
        None => Vec::new(),
    };
    info!(count = wallpapers.len(), "wallpaper set loaded");

    let store = Store::new(config, wallpapers);
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // spawn IPC server
    let socket = WalldPaths::socket_path();
    let ipc_shutdown = shutdown_rx.clone();
    let ipc_tx = cmd_tx.clone();
    let ipc_socket = socket.clone();
    let ipc_handle = tokio::spawn(async move {
        if let Err(e) = ipc::serve_ipc(ipc_socket, ipc_tx, ipc_shutdown).await {
            tracing::error!("IPC server error: {e}");
        }
    });

    // SIGUSR1 rotates immediately
    let mut usr1 = signal(SignalKind::user_defined1()).context("failed to register SIGUSR1")?;
    let usr1_tx = cmd_tx.clone();
    tokio::spawn(async move {
        while usr1.recv().await.is_some() {
            info!("SIGUSR1 received, rotating");
            if usr1_tx.send(DaemonCommand::Rotate).await.is_err() {
                break;
            }
        }
    });
    drop(cmd_tx);

    // spawn rotation engine
    let engine = RotationEngine::new(store, Dispatcher::processes());
    let mut engine_handle = tokio::spawn(engine.run(cmd_rx, shutdown_rx));

    let mut term = signal(SignalKind::terminate()).context("failed to register SIGTERM")?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received ctrl+c, shutting down"),
        _ = term.recv() => info!("received SIGTERM, shutting down"),
        _ = &mut engine_handle => info!("engine stopped"),
    }
    let _ = shutdown_tx.send(true);

    if !engine_handle.is_finished() {
        let _ = engine_handle.await;
    }
    // pending replies (the answer to `quit` among them) are written first
    let _ = ipc_handle.await;

    if socket.exists() {
        let _ = std::fs::remove_file(&socket);
    }

    info!("walld-daemon stopped");
    Ok(())
}
