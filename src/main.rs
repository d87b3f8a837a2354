use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vidserve::catalog::Catalog;
use vidserve::config::Config;
use vidserve::thumbnails::FfmpegExtractor;
use vidserve::web::server::run_server;
use vidserve::web::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    info!("Logging initialized, starting the application");

    let config = Config::from_env()?;

    // Create required directories
    tokio::fs::create_dir_all(&config.videos_dir)
        .await
        .with_context(|| format!("Failed to create videos directory {}", config.videos_dir))?;
    tokio::fs::create_dir_all(&config.thumbs_dir)
        .await
        .with_context(|| format!("Failed to create thumbs directory {}", config.thumbs_dir))?;

    let catalog = Arc::new(Catalog::open(config.catalog_file())?);
    let extractor = Arc::new(FfmpegExtractor::new(
        config.ffmpeg_bin.clone(),
        config.thumbnail_seek.clone(),
        config.thumbnail_width,
    ));
    let state = AppState::new(&config, catalog, extractor);

    if config.thumbnail_prewarm {
        let sources = state.thumbnail_sources();
        info!("Prewarming thumbnails for {} videos", sources.len());
        state.thumbnails.prewarm(sources);
    }

    let addr = format!("{}:{}", config.host, config.port)
        .parse::<SocketAddr>()
        .context("Failed to parse host and port into SocketAddr")?;

    // Create shutdown signal
    let shutdown = Arc::new(Notify::new());
    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Ctrl+C received, shutting down");
        ctrl_c_shutdown.notify_one();
    });

    if let Err(e) = run_server(addr, state, shutdown).await {
        error!("Video server error: {:?}", e);
        return Err(e.into());
    }

    info!("Shutdown complete");
    Ok(())
}
