//! Shared configuration constants
//!
//! Default values used by the config layer and the render driver.

/// Chrome user agent string applied to every render session
///
/// Updated: 2025-01-29 to Chrome 132 (current stable)
///
/// Chrome releases new stable versions ~every 4 weeks.
/// Update quarterly to stay within reasonable version window.
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Search page of the upstream SPA catalog
pub const DEFAULT_BASE_SEARCH_URL: &str = "https://lib.yju.ac.kr/Cheetah/Search/AdvenceSearch";

/// Initial delay between body-text polls
pub const POLL_INITIAL_DELAY_MS: u64 = 100;

/// Upper bound for the body-text poll delay
pub const POLL_MAX_DELAY_MS: u64 = 1000;

/// JavaScript expression returning the visible page text
pub const BODY_TEXT_SCRIPT: &str = "document.body ? document.body.innerText : ''";
