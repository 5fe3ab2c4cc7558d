use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[clap(version)]
struct Args {
    #[clap(name = "config")]
    config_path: PathBuf,
    /// Overrides the port from the config file.
    #[clap(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args { config_path, port } = Args::parse();

    let config = indexer_service::IndexerConfig::from_path(&config_path)?;

    if let Some(ref rust_log) = config.override_rust_log {
        unsafe {
            std::env::set_var(indexer_service::RUST_LOG, rust_log);
        }
    }
    env_logger::init();

    let port = port.unwrap_or(config.port);
    let cancellation_token = listen_for_shutdown_signal();

    let mut indexer_handle = indexer_service::run_server(config, port).await?;

    tokio::select! {
        _ = cancellation_token.cancelled() => {
            info!("Shutting down server...");
        }
        res = indexer_handle.stopped() => {
            match res {
                Ok(()) => error!("Server stopped unexpectedly"),
                Err(err) => error!("Server stopped unexpectedly: {err:#}"),
            }
        }
    }

    indexer_handle.shutdown().await?;

    info!("Server shutdown complete");

    Ok(())
}

fn listen_for_shutdown_signal() -> CancellationToken {
    let cancellation_token = CancellationToken::new();
    let cancellation_token_clone = cancellation_token.clone();

    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C signal: {err}");
            return;
        }
        info!("Received Ctrl-C signal");
        cancellation_token_clone.cancel();
    });

    cancellation_token
}
