//! Content-ready polling for SPA result pages
//!
//! The catalog gives no reliable "loading done" signal, so the body text is
//! polled until it either shows a result marker or is long enough. Each
//! attempt is bounded; after the last one the page gets a final grace wait
//! and whatever text is present is taken as final.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, trace};

use crate::config::ReadinessConfig;
use crate::utils::constants::{POLL_INITIAL_DELAY_MS, POLL_MAX_DELAY_MS};

use super::RenderError;

/// Body text once polling stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyText {
    pub text: String,
    /// False when every attempt timed out and the grace-wait text was taken
    pub ready: bool,
    pub attempts: u32,
}

/// Marker present, or text longer than `min_ready_chars`
pub fn is_content_ready(text: &str, config: &ReadinessConfig) -> bool {
    if config
        .markers
        .iter()
        .any(|marker| !marker.is_empty() && text.contains(marker.as_str()))
    {
        return true;
    }
    text.chars().count() > config.min_ready_chars
}

/// Poll `probe` for body text until the content-ready condition holds
///
/// Probe errors during polling are treated as "not ready yet" (the SPA may be
/// swapping documents). Only the final read after the grace wait propagates
/// its error.
pub async fn wait_for_content<F, Fut>(
    mut probe: F,
    config: &ReadinessConfig,
) -> Result<ReadyText, RenderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, RenderError>>,
{
    let attempt_timeout = Duration::from_millis(config.attempt_timeout_ms);
    let attempts = config.attempts.max(1);

    for attempt in 1..=attempts {
        match timeout(attempt_timeout, poll_until_ready(&mut probe, config)).await {
            Ok(text) => {
                debug!(attempt, chars = text.chars().count(), "Content ready");
                return Ok(ReadyText {
                    text,
                    ready: true,
                    attempts: attempt,
                });
            }
            Err(_) => {
                debug!(attempt, attempts, "Content not ready within attempt timeout");
                if attempt < attempts {
                    sleep(Duration::from_millis(config.retry_delay_ms)).await;
                }
            }
        }
    }

    sleep(Duration::from_millis(config.final_grace_ms)).await;
    let text = probe().await?;
    debug!(chars = text.chars().count(), "Taking text after final grace wait");

    Ok(ReadyText {
        text,
        ready: false,
        attempts,
    })
}

/// Exponential backoff from 100ms, doubling, capped at 1s
async fn poll_until_ready<F, Fut>(probe: &mut F, config: &ReadinessConfig) -> String
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, RenderError>>,
{
    let mut poll_interval = Duration::from_millis(POLL_INITIAL_DELAY_MS);
    let max_interval = Duration::from_millis(POLL_MAX_DELAY_MS);

    loop {
        match probe().await {
            Ok(text) if is_content_ready(&text, config) => return text,
            Ok(_) => {}
            Err(e) => trace!("Body text probe failed while polling: {}", e),
        }

        sleep(poll_interval).await;
        poll_interval = (poll_interval * 2).min(max_interval);
    }
}
