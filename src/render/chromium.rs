//! Chromium render driver
//!
//! Every request gets its own CDP browser context (separate cookies and
//! storage) inside the shared browser, with one page in it. The context is
//! disposed on every exit path the future runs to; callers that may be
//! cancelled run it on its own task.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use chromiumoxide_cdp::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide_cdp::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide_cdp::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide_cdp::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{BrowserConfig, RenderConfig};
use crate::manager::BrowserManager;
use crate::search_term::SearchTerm;
use crate::utils::constants::BODY_TEXT_SCRIPT;

use super::readiness::wait_for_content;
use super::{RenderDriver, RenderError, RenderedPage};

/// One isolated context and its page
struct RenderSession {
    context_id: BrowserContextId,
    page: Page,
}

struct DriverInner {
    manager: BrowserManager,
    render: RenderConfig,
    base_search_url: String,
}

/// Renders catalog pages in the shared Chromium instance
///
/// Cloning is cheap; clones share one browser.
#[derive(Clone)]
pub struct ChromiumRenderDriver {
    inner: Arc<DriverInner>,
}

impl ChromiumRenderDriver {
    pub fn new(browser: BrowserConfig, render: RenderConfig, base_search_url: String) -> Self {
        Self {
            inner: Arc::new(DriverInner {
                manager: BrowserManager::new(browser),
                render,
                base_search_url,
            }),
        }
    }

    pub fn manager(&self) -> &BrowserManager {
        &self.inner.manager
    }
}

#[async_trait]
impl RenderDriver for ChromiumRenderDriver {
    async fn fetch_rendered_text(&self, term: &SearchTerm) -> Result<RenderedPage, RenderError> {
        self.inner.render(term).await
    }

    async fn warm_up(&self) -> Result<(), RenderError> {
        self.inner
            .manager
            .acquire()
            .await
            .map(|_| ())
            .map_err(|e| RenderError::BrowserUnavailable(format!("{e:#}")))
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        self.inner.manager.shutdown().await
    }
}

impl DriverInner {
    async fn render(&self, term: &SearchTerm) -> Result<RenderedPage, RenderError> {
        let url = term.detail_url(&self.base_search_url);
        let started = Instant::now();

        let session = self.open_session().await?;
        let outcome = self.load_text(&session.page, &url).await;
        self.close_session(session).await;

        let text = outcome?;
        info!(
            %term,
            chars = text.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rendered catalog page"
        );
        Ok(RenderedPage {
            text,
            canonical_url: url,
        })
    }

    /// Open a session, checking browser health and retrying once on failure
    async fn open_session(&self) -> Result<RenderSession, RenderError> {
        match self.try_open_session().await {
            Err(RenderError::SessionFailed(reason)) => {
                warn!("Render session failed ({}), checking browser health", reason);
                self.manager
                    .recover()
                    .await
                    .map_err(|e| RenderError::BrowserUnavailable(format!("{e:#}")))?;
                self.try_open_session().await
            }
            other => other,
        }
    }

    async fn try_open_session(&self) -> Result<RenderSession, RenderError> {
        let wrapper = self
            .manager
            .acquire()
            .await
            .map_err(|e| RenderError::BrowserUnavailable(format!("{e:#}")))?;
        let browser = wrapper.browser();

        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| RenderError::SessionFailed(format!("failed to create context: {e}")))?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(RenderError::SessionFailed)?;

        match browser.new_page(target).await {
            Ok(page) => {
                debug!(context = ?context_id, "Opened render session");
                Ok(RenderSession { context_id, page })
            }
            Err(e) => {
                dispose_context(browser, context_id).await;
                Err(RenderError::SessionFailed(format!("failed to open page: {e}")))
            }
        }
    }

    async fn close_session(&self, session: RenderSession) {
        let RenderSession { context_id, page } = session;

        if let Err(e) = page.close().await {
            debug!("Failed to close render page: {}", e);
        }

        // a browser relaunched since the session opened took the context with it
        if let Some(wrapper) = self.manager.current().await {
            dispose_context(wrapper.browser(), context_id).await;
        }
    }

    async fn load_text(&self, page: &Page, url: &str) -> Result<String, RenderError> {
        self.configure_page(page).await?;

        let timeout_ms = self.render.navigation_timeout_ms;
        match timeout(self.render.navigation_timeout(), page.goto(url)).await {
            Err(_) => {
                return Err(RenderError::NavigationTimeout {
                    url: url.to_string(),
                    timeout_ms,
                });
            }
            Ok(Err(e)) => {
                return Err(RenderError::NavigationFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
            }
            Ok(Ok(_)) => {}
        }

        let ready = wait_for_content(|| body_text(page), &self.render.readiness).await?;
        if !ready.ready {
            warn!(url, attempts = ready.attempts, "Content never became ready, using partial text");
        }

        if ready.text.trim().is_empty() {
            // SPA rendered into nodes without innerText
            return html_text(page).await;
        }
        Ok(ready.text)
    }

    async fn configure_page(&self, page: &Page) -> Result<(), RenderError> {
        let browser = self.manager.config();

        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(browser.window.width),
            i64::from(browser.window.height),
            1.0,
            false,
        ))
        .await
        .map_err(|e| RenderError::SessionFailed(format!("failed to set viewport: {e}")))?;

        page.execute(SetUserAgentOverrideParams::new(browser.user_agent.clone()))
            .await
            .map_err(|e| RenderError::SessionFailed(format!("failed to set user agent: {e}")))?;

        Ok(())
    }
}

async fn dispose_context(browser: &Browser, context_id: BrowserContextId) {
    if let Err(e) = browser
        .execute(DisposeBrowserContextParams::new(context_id))
        .await
    {
        warn!("Failed to dispose browser context: {}", e);
    }
}

async fn body_text(page: &Page) -> Result<String, RenderError> {
    let value = page
        .evaluate(BODY_TEXT_SCRIPT)
        .await
        .map_err(|e| RenderError::TextExtractionFailed(e.to_string()))?
        .into_value::<serde_json::Value>()
        .map_err(|e| RenderError::TextExtractionFailed(e.to_string()))?;

    match value {
        serde_json::Value::String(text) => Ok(text),
        _ => Ok(String::new()),
    }
}

async fn html_text(page: &Page) -> Result<String, RenderError> {
    let html = page
        .content()
        .await
        .map_err(|e| RenderError::TextExtractionFailed(format!("failed to read page HTML: {e}")))?;
    Ok(html2md::parse_html(&html))
}
