//! Request orchestrator
//!
//! `NORMALIZE -> CACHE_LOOKUP -> (hit) RETURN`
//! `                          -> (miss) [API] -> GATE -> RENDER -> EXTRACT -> CACHE_STORE -> RETURN`
//!
//! The service is built once at startup and shared behind an `Arc`. Apart
//! from a missing search term, every failure below this layer is folded into
//! a `LookupResult` carrying an error message.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api_probe::ApiProbe;
use crate::cache::ResultCache;
use crate::config::Config;
use crate::error::ServiceResult;
use crate::extractor::{Classifier, Verdict};
use crate::gate::ConcurrencyGate;
use crate::lookup::{LookupResponse, LookupResult, ResultSource};
use crate::render::{ChromiumRenderDriver, RenderDriver, RenderError};
use crate::search_term::SearchTerm;
use crate::stats::{CacheStats, GateStats, ServiceStats, StatsSnapshot};

/// Lookup input; at least one field must normalize to a usable term
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupQuery {
    pub isbn: Option<String>,
    pub title: Option<String>,
}

impl LookupQuery {
    pub fn isbn(isbn: impl Into<String>) -> Self {
        Self {
            isbn: Some(isbn.into()),
            title: None,
        }
    }

    pub fn title(title: impl Into<String>) -> Self {
        Self {
            isbn: None,
            title: Some(title.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheCleared {
    pub evicted_count: usize,
    pub message: String,
}

pub struct HoldingService {
    classifier: Classifier,
    cache: ResultCache,
    gate: ConcurrencyGate,
    driver: Arc<dyn RenderDriver>,
    api_probe: Option<ApiProbe>,
    base_search_url: String,
    stats: ServiceStats,
}

impl HoldingService {
    /// Build a service around an arbitrary render driver
    pub fn new(config: &Config, driver: Arc<dyn RenderDriver>) -> ServiceResult<Self> {
        config.validate()?;
        let classifier = Classifier::new(config.extractor.clone())?;

        let api_probe = config
            .api_probe
            .enabled
            .then(|| ApiProbe::new(&config.api_probe, &config.browser.user_agent))
            .transpose()?;

        Ok(Self {
            classifier,
            cache: ResultCache::from_config(&config.cache),
            gate: ConcurrencyGate::new(config.gate.capacity),
            driver,
            api_probe,
            base_search_url: config.catalog.base_search_url.clone(),
            stats: ServiceStats::default(),
        })
    }

    /// Build a service that renders in a shared headless Chromium
    pub fn with_chromium(config: &Config) -> ServiceResult<Self> {
        let driver = ChromiumRenderDriver::new(
            config.browser.clone(),
            config.render.clone(),
            config.catalog.base_search_url.clone(),
        );
        Self::new(config, Arc::new(driver))
    }

    pub async fn check_holding(&self, query: &LookupQuery) -> ServiceResult<LookupResponse> {
        let started = Instant::now();
        self.stats.record_request();

        let term = SearchTerm::from_query(query.isbn.as_deref(), query.title.as_deref())?;

        if let Some(result) = self.cache.get(&term).await {
            self.stats.record_cache_hit();
            info!(%term, "Cache hit");
            return Ok(respond(result, ResultSource::Cache, started));
        }

        let detail_url = term.detail_url(&self.base_search_url);

        if let Some(probe) = &self.api_probe
            && let Some(result) = probe
                .lookup(&term, &detail_url, self.classifier.config())
                .await
        {
            self.stats.record_api_answer();
            self.store(&term, &result).await;
            return Ok(respond(result, ResultSource::Api, started));
        }

        let result = self.render_and_classify(&term, &detail_url).await;
        self.store(&term, &result).await;

        info!(
            %term,
            found = result.is_found(),
            available = result.is_available(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Lookup finished"
        );
        Ok(respond(result, ResultSource::Render, started))
    }

    async fn render_and_classify(&self, term: &SearchTerm, detail_url: &str) -> LookupResult {
        let permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!(%term, "Lookup rejected: {}", e);
                return LookupResult::failed(detail_url, format!("render failed: {e}"));
            }
        };
        self.stats.record_render();

        // The permit travels with the render task: a cancelled request keeps
        // its gate slot until the render it started has finished and the
        // session is disposed.
        let driver = self.driver.clone();
        let render_term = term.clone();
        let fetched = tokio::spawn(async move {
            let _permit = permit;
            driver.fetch_rendered_text(&render_term).await
        })
        .await
        .unwrap_or_else(|e| Err(RenderError::SessionFailed(format!("render task failed: {e}"))));

        match fetched {
            Ok(page) => {
                let classification = self.classifier.classify(&page.text);
                debug!(%term, rule = classification.rule, "Classified render");
                if classification.verdict == Verdict::LoadFailure {
                    self.stats.record_load_failure();
                }
                classification.into_result(page.canonical_url)
            }
            Err(e) => {
                self.stats.record_render_error();
                log_render_error(term, &e);
                LookupResult::failed(detail_url, format!("render failed: {e}"))
            }
        }
    }

    /// Only definite answers are cached; failures retry on the next call
    async fn store(&self, term: &SearchTerm, result: &LookupResult) {
        if result.is_definite() {
            self.cache.put(term.clone(), result.clone()).await;
        }
    }

    pub fn health_check(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    pub async fn clear_cache(&self) -> CacheCleared {
        let evicted_count = self.cache.clear().await;
        info!(evicted_count, "Cache cleared");
        CacheCleared {
            evicted_count,
            message: format!("Cleared {evicted_count} cached results"),
        }
    }

    pub async fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            started_at: self.stats.started_at(),
            uptime_seconds: self.stats.uptime_seconds(),
            stats: self.stats.counters(),
            cache: CacheStats {
                size: self.cache.len().await,
                max_entries: self.cache.max_entries(),
                ttl_seconds: self.cache.ttl().as_secs(),
            },
            gate: GateStats {
                capacity: self.gate.capacity(),
                in_use: self.gate.in_use(),
            },
        }
    }

    /// Launch the browser before the first request
    pub async fn warm_up(&self) -> Result<(), RenderError> {
        self.driver.warm_up().await
    }

    /// Reject new renders and release the browser
    pub async fn shutdown(&self) {
        self.gate.close();
        if let Err(e) = self.driver.shutdown().await {
            warn!("Render driver shutdown failed: {:#}", e);
        }
        info!("Holding service stopped");
    }
}

fn respond(result: LookupResult, source: ResultSource, started: Instant) -> LookupResponse {
    LookupResponse {
        result,
        cached: source == ResultSource::Cache,
        source,
        response_time_ms: started.elapsed().as_millis() as u64,
    }
}

fn log_render_error(term: &SearchTerm, error: &RenderError) {
    match error {
        RenderError::BrowserUnavailable(_) => {
            tracing::error!(%term, "Browser unavailable: {}", error)
        }
        _ => warn!(%term, "Render failed: {}", error),
    }
}
