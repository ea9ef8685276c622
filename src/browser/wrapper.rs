//! Browser process plus its CDP handler task

use anyhow::Result;
use chromiumoxide::browser::Browser;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::BrowserConfig;

/// Wrapper for Browser and its event handler task
///
/// The handler is aborted on drop. Dropping does not close the browser
/// process cleanly; use `BrowserManager::shutdown` for that.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    pub(crate) fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        }
    }

    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Close the process, wait for exit, then remove the profile dir
    ///
    /// Failures are logged; the crashed-browser path calls this on a process
    /// that may already be gone.
    pub(crate) async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            tracing::warn!("Failed to wait for browser exit: {}", e);
        }
        self.cleanup_temp_dir();
    }

    /// Remove the profile directory
    ///
    /// MUST run after `browser.wait()` so Chrome has released its file handles.
    pub fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            info!("Cleaning up temp directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                tracing::warn!(
                    "Failed to clean up temp directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        self.handler.abort();

        if let Some(path) = &self.user_data_dir {
            tracing::warn!(
                "BrowserWrapper dropped without shutdown, profile dir orphaned: {}",
                path.display()
            );
        }
    }
}

/// Launch the shared browser with a per-process, per-generation profile dir
///
/// `generation` increments on every relaunch so a crashed browser's profile
/// lock never blocks its replacement.
pub async fn launch_browser(config: &BrowserConfig, generation: u64) -> Result<BrowserWrapper> {
    let user_data_dir = std::env::temp_dir().join(format!(
        "library_holdings_browser_{}_{}",
        std::process::id(),
        generation
    ));
    info!("Launching shared browser (generation {})", generation);

    let (browser, handler) = crate::browser_setup::launch_browser(config, &user_data_dir).await?;
    Ok(BrowserWrapper::new(browser, handler, user_data_dir))
}
