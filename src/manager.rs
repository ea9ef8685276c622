//! Shared browser lifecycle
//!
//! One browser process serves every render session. It is launched lazily,
//! relaunched after a crash and closed when the service stops.
//!
//! # Lock Requirements
//!
//! The slot is a `tokio::sync::RwLock`. Opening and disposing browser
//! contexts only need `&Browser`, so they run under shared read guards and
//! never wait on each other. The write guard is taken only to launch,
//! recover from a crash, or shut down. Navigation never runs under either.

use anyhow::{Result, anyhow};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{OwnedRwLockReadGuard, RwLock};
use tracing::{debug, info, warn};

use crate::browser::{BrowserWrapper, launch_browser};
use crate::config::BrowserConfig;

/// Shared read access to a running browser
pub type BrowserGuard = OwnedRwLockReadGuard<Option<BrowserWrapper>, BrowserWrapper>;

/// Owner of the shared browser process
///
/// # Performance Characteristics
///
/// - First `acquire()`: ~2-3 seconds (launches Chrome)
/// - Later calls: an uncontended read lock, no CDP round trip
/// - Recovery from a crash: one `Browser.getVersion` check, close, fresh launch
pub struct BrowserManager {
    browser: Arc<RwLock<Option<BrowserWrapper>>>,
    config: BrowserConfig,
    launches: AtomicU64,
}

impl BrowserManager {
    /// Browser launches lazily on the first `acquire()` call
    #[must_use]
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            browser: Arc::new(RwLock::new(None)),
            config,
            launches: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Shared access to the browser, launching it if none is running
    ///
    /// No health check happens here; callers report session failures through
    /// [`recover`](Self::recover).
    pub async fn acquire(&self) -> Result<BrowserGuard> {
        if let Some(guard) = self.current().await {
            return Ok(guard);
        }

        let mut slot = self.browser.clone().write_owned().await;
        // another caller may have launched while we waited for the write lock
        if slot.is_none() {
            *slot = Some(self.launch().await?);
        }

        OwnedRwLockReadGuard::try_map(slot.downgrade(), Option::as_ref)
            .map_err(|_| anyhow!("browser was shut down"))
    }

    /// Shared access to the running browser without launching one
    pub async fn current(&self) -> Option<BrowserGuard> {
        OwnedRwLockReadGuard::try_map(self.browser.clone().read_owned().await, Option::as_ref).ok()
    }

    /// Health-check the browser after a failed session operation
    ///
    /// 1. Take the write lock
    /// 2. If a browser exists and answers `version()`, keep it
    /// 3. Otherwise close the crashed browser and launch a new one
    pub async fn recover(&self) -> Result<()> {
        let mut slot = self.browser.write().await;

        if let Some(wrapper) = slot.as_ref() {
            match wrapper.browser().version().await {
                Ok(_) => {
                    debug!("Browser health check passed, keeping existing browser");
                    return Ok(());
                }
                Err(e) => warn!("Browser health check failed: {}. Relaunching", e),
            }
        }

        if let Some(mut crashed) = slot.take() {
            crashed.close().await;
        }
        *slot = Some(self.launch().await?);
        Ok(())
    }

    async fn launch(&self) -> Result<BrowserWrapper> {
        let generation = self.launches.fetch_add(1, Ordering::Relaxed);
        launch_browser(&self.config, generation).await
    }

    /// Close the browser if running; later calls are no-ops
    ///
    /// Waits for in-flight context operations to release their read guards.
    /// `BrowserWrapper::drop()` only aborts the handler task, so the process
    /// must be closed and awaited here to avoid a zombie Chrome.
    pub async fn shutdown(&self) -> Result<()> {
        let mut slot = self.browser.write().await;

        if let Some(mut wrapper) = slot.take() {
            info!("Shutting down browser");
            wrapper.close().await;
        }

        Ok(())
    }

    pub async fn is_browser_running(&self) -> bool {
        self.browser.read().await.is_some()
    }

    /// Launch attempts so far, relaunches included
    pub fn launch_count(&self) -> u64 {
        self.launches.load(Ordering::Relaxed)
    }
}
