//! Library holdings lookup
//!
//! Answers "does the library hold this book, and can it be borrowed?" by
//! rendering the catalog's SPA search page in a shared headless browser and
//! classifying the visible text. Results are cached with a TTL and renders
//! are bounded by a concurrency gate.

pub mod api_probe;
mod browser;
pub mod browser_setup;
pub mod cache;
pub mod config;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod lookup;
mod manager;
pub mod render;
pub mod routes;
pub mod search_term;
pub mod service;
pub mod stats;
mod utils;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

pub use cache::ResultCache;
pub use config::{Config, ConfigError, load_yaml_config};
pub use error::{ServiceError, ServiceResult};
pub use extractor::{Classification, Classifier, Verdict};
pub use gate::{ConcurrencyGate, GateClosed, GatePermit};
pub use lookup::{HoldingDetails, LookupResponse, LookupResult, ResultSource};
pub use manager::BrowserManager;
pub use render::{ChromiumRenderDriver, RenderDriver, RenderError, RenderedPage};
pub use routes::AppState;
pub use search_term::{SearchTerm, TermKind};
pub use service::{CacheCleared, HealthStatus, HoldingService, LookupQuery};

/// Bind `addr` and serve until `shutdown` resolves
///
/// The service is shut down (gate closed, browser released) after the
/// server has drained.
pub async fn start_server<F>(
    addr: SocketAddr,
    service: Arc<HoldingService>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    start_server_with_listener(listener, service, shutdown).await
}

/// Serve on a pre-bound listener until `shutdown` resolves
pub async fn start_server_with_listener<F>(
    listener: tokio::net::TcpListener,
    service: Arc<HoldingService>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = routes::router(AppState::new(service.clone()));

    tracing::info!("Listening on {}", listener.local_addr()?);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    service.shutdown().await;
    served.map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
