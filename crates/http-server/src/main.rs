//! Ticker Avg - multi-source moving averages
//!
//! Main entry point for the HTTP read API and source pollers

use std::env;
use std::sync::Arc;

use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ticker_core::{ServiceConfig, DEFAULT_CONFIG_PATH};
use ticker_http_server::{HttpServerBuilder, HttpServerConfig};
use ticker_price_feed::AggregationRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting Ticker Avg v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path =
        env::var("TICKER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = ServiceConfig::load(&config_path)?;

    info!(
        "Window {}s across {} source(s), serving on {}",
        config.window.window_duration().num_seconds(),
        config.enabled_sources().count(),
        config.http.address()
    );

    // Start pollers
    let registry = Arc::new(AggregationRegistry::from_config(&config)?);
    registry.start();
    info!("Pollers started for {:?}", registry.source_names());

    let server = HttpServerBuilder::new()
        .config(HttpServerConfig::from(&config.http))
        .registry(registry.clone())
        .build();

    // Setup shutdown channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    warn!("Failed to install signal handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C");
            }
            _ = terminate => {
                info!("Received termination signal");
            }
        }

        let _ = shutdown_tx.send(());
    });

    // Start server
    info!("HTTP server listening on {}", server.address());
    info!("Press Ctrl+C to shutdown");

    let served = server.start_with_shutdown(shutdown_rx).await;

    registry.stop().await;

    if let Err(e) = served {
        error!("Server error: {}", e);
        return Err(e);
    }

    info!("Server shutdown complete");
    Ok(())
}
