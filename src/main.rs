// Library holdings HTTP service
//
// Loads config.yaml (or $LIBRARY_HOLDINGS_CONFIG), starts the shared browser
// and serves the lookup API until Ctrl-C or SIGTERM.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use library_holdings::{HoldingService, load_yaml_config, start_server};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "library_holdings=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_yaml_config().context("Failed to load configuration")?;
    tracing::info!("Starting library holdings v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Catalog: {}", config.catalog.base_search_url);
    tracing::info!(
        "Cache: ttl={}s max_entries={} | gate capacity={}",
        config.cache.ttl_seconds,
        config.cache.max_entries,
        config.gate.capacity
    );

    let service = Arc::new(HoldingService::with_chromium(&config)?);

    if config.server.prelaunch_browser {
        match service.warm_up().await {
            Ok(()) => tracing::info!("Browser pre-launched"),
            Err(e) => tracing::warn!("Browser pre-launch failed: {}. Will retry on first lookup", e),
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    start_server(addr, service, shutdown_signal()).await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
