//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use library_holdings::{
    Config, HoldingService, RenderDriver, RenderError, RenderedPage, SearchTerm,
};

pub const BASE_URL: &str = "https://lib.example.ac.kr/Cheetah/Search/AdvenceSearch";

/// Pad with filler that matches no keyword and no call number
pub fn pad(text: &str, chars: usize) -> String {
    let mut out = text.to_string();
    while out.chars().count() < chars {
        out.push_str(" lorem ipsum dolor sit amet");
    }
    out
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.catalog.base_search_url = BASE_URL.to_string();
    config
}

enum Reply {
    Text(String),
    Fail(RenderError),
}

/// Render driver that replays a fixed reply and records its calls
pub struct ScriptedDriver {
    reply: Reply,
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedDriver {
    pub fn text(text: impl Into<String>) -> Self {
        Self::with_reply(Reply::Text(text.into()))
    }

    pub fn failing(error: RenderError) -> Self {
        Self::with_reply(Reply::Fail(error))
    }

    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of renders observed in flight at once
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderDriver for ScriptedDriver {
    async fn fetch_rendered_text(&self, term: &SearchTerm) -> Result<RenderedPage, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);

        match &self.reply {
            Reply::Text(text) => Ok(RenderedPage {
                text: text.clone(),
                canonical_url: term.detail_url(BASE_URL),
            }),
            Reply::Fail(error) => Err(error.clone()),
        }
    }
}

/// Service over a scripted driver; the driver handle stays with the test
pub fn service_with(driver: ScriptedDriver) -> (Arc<HoldingService>, Arc<ScriptedDriver>) {
    service_with_config(&test_config(), driver)
}

pub fn service_with_config(
    config: &Config,
    driver: ScriptedDriver,
) -> (Arc<HoldingService>, Arc<ScriptedDriver>) {
    let driver = Arc::new(driver);
    let service = HoldingService::new(config, driver.clone()).expect("valid test config");
    (Arc::new(service), driver)
}
