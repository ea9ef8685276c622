//! Render driver abstraction
//!
//! A [`RenderDriver`] turns a search term into the visible text of the
//! catalog's result page. The production driver renders in Chromium; tests
//! substitute scripted drivers.

mod chromium;
pub mod readiness;

pub use chromium::ChromiumRenderDriver;

use async_trait::async_trait;
use thiserror::Error;

use crate::search_term::SearchTerm;

/// Visible text of a rendered result page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub text: String,
    pub canonical_url: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Browser could not be launched or was lost mid-request
    #[error("browser unavailable: {0}")]
    BrowserUnavailable(String),

    /// Isolated context or page could not be created or configured
    #[error("render session failed: {0}")]
    SessionFailed(String),

    #[error("navigation timed out after {timeout_ms}ms: {url}")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("navigation failed for {url}: {reason}")]
    NavigationFailed { url: String, reason: String },

    #[error("text extraction failed: {0}")]
    TextExtractionFailed(String),
}

#[async_trait]
pub trait RenderDriver: Send + Sync {
    /// Render the catalog page for `term` and return its visible text
    async fn fetch_rendered_text(&self, term: &SearchTerm) -> Result<RenderedPage, RenderError>;

    /// Start expensive resources ahead of the first request
    async fn warm_up(&self) -> Result<(), RenderError> {
        Ok(())
    }

    /// Release every resource held by the driver
    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
