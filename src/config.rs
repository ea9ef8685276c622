//! Service configuration
//!
//! Every field has a `default_*` function so a partial `config.yaml` (or none
//! at all) still yields a complete configuration. The defaults reproduce the
//! browser-reuse deployment: 30 minute TTL, 5000 cached terms, three
//! concurrent renders.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::utils::constants::{CHROME_USER_AGENT, DEFAULT_BASE_SEARCH_URL};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "LIBRARY_HOLDINGS_CONFIG";

/// Maximum timeout for browser navigation (5 minutes)
pub const MAX_NAVIGATION_TIMEOUT_MS: u64 = 300_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub gate: GateConfig,

    #[serde(default)]
    pub extractor: ExtractorConfig,

    #[serde(default)]
    pub api_probe: ApiProbeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Launch the browser at startup instead of on the first cache miss
    #[serde(default = "default_prelaunch_browser")]
    pub prelaunch_browser: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Search page of the SPA catalog; deep links append `#/total/{term}`
    #[serde(default = "default_base_search_url")]
    pub base_search_url: String,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default = "default_disable_security")]
    pub disable_security: bool,

    /// Viewport applied to every render session
    #[serde(default)]
    pub window: WindowConfig,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// CDP request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    #[serde(default)]
    pub readiness: ReadinessConfig,
}

/// Content-ready polling for the SPA result page
///
/// The page is ready when its text contains any marker or is longer than
/// `min_ready_chars`. Each attempt polls for at most `attempt_timeout_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessConfig {
    #[serde(default = "default_readiness_attempts")]
    pub attempts: u32,

    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_final_grace_ms")]
    pub final_grace_ms: u64,

    #[serde(default = "default_min_ready_chars")]
    pub min_ready_chars: usize,

    #[serde(default = "default_readiness_markers")]
    pub markers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Maximum concurrent render sessions
    #[serde(default = "default_gate_capacity")]
    pub capacity: usize,
}

/// Keyword lists, patterns, thresholds and default policies of the classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Below this many characters the render is treated as incomplete
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// An undecided negative on text shorter than this becomes a load failure
    #[serde(default = "default_ambiguous_veto_chars")]
    pub ambiguous_veto_chars: usize,

    /// Length above which text without a negative phrase counts as found
    #[serde(default = "default_long_text_chars")]
    pub long_text_chars: usize,

    #[serde(default = "default_no_result_markers")]
    pub no_result_markers: Vec<String>,

    /// Any of these vetoes the explicit negative
    #[serde(default = "default_positive_keywords")]
    pub positive_keywords: Vec<String>,

    /// Collection count patterns, most specific first; group 1 is the count
    #[serde(default = "default_count_patterns")]
    pub count_patterns: Vec<String>,

    #[serde(default = "default_held_item_keywords")]
    pub held_item_keywords: Vec<String>,

    #[serde(default = "default_loan_keywords")]
    pub loan_keywords: Vec<String>,

    #[serde(default = "default_shelf_keywords")]
    pub shelf_keywords: Vec<String>,

    #[serde(default = "default_negative_phrases")]
    pub negative_phrases: Vec<String>,

    /// Availability checks in priority order
    #[serde(default = "default_availability_rules")]
    pub availability_rules: Vec<AvailabilityRule>,

    /// Location labels in priority order
    #[serde(default = "default_locations")]
    pub locations: Vec<LocationLabel>,

    #[serde(default = "default_location_label")]
    pub default_location: String,

    #[serde(default = "default_call_number_pattern")]
    pub call_number_pattern: String,

    #[serde(default)]
    pub policies: DefaultPolicies,
}

/// Guesses about upstream semantics that no documented contract backs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultPolicies {
    /// Found but no loan status keyword: report available
    #[serde(default = "default_true")]
    pub available_when_unknown: bool,

    /// Long text with no negative phrase: report found
    #[serde(default = "default_true")]
    pub long_text_implies_found: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRule {
    pub name: String,
    pub keywords: Vec<String>,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationLabel {
    /// Label reported to callers
    pub label: String,
    /// Spellings that appear in rendered text
    pub aliases: Vec<String>,
}

/// Speculative JSON endpoints tried before rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiProbeConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_api_timeout_ms")]
    pub timeout_ms: u64,

    /// Endpoint calls in flight at once, across all requests
    #[serde(default = "default_api_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_api_endpoints")]
    pub endpoints: Vec<ApiEndpoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApiMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub method: ApiMethod,
    /// `{term}` is replaced with the normalized search term
    pub url: String,
    /// JSON body for POST; string values may contain `{term}`
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_prelaunch_browser() -> bool {
    true
}

fn default_base_search_url() -> String {
    DEFAULT_BASE_SEARCH_URL.to_string()
}

fn default_headless() -> bool {
    true
}

fn default_disable_security() -> bool {
    false // SECURE BY DEFAULT
}

fn default_user_agent() -> String {
    CHROME_USER_AGENT.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

fn default_navigation_timeout_ms() -> u64 {
    25_000
}

fn default_readiness_attempts() -> u32 {
    5
}

fn default_attempt_timeout_ms() -> u64 {
    8_000
}

fn default_retry_delay_ms() -> u64 {
    2_000
}

fn default_final_grace_ms() -> u64 {
    3_000
}

fn default_min_ready_chars() -> usize {
    800
}

fn default_readiness_markers() -> Vec<String> {
    strings(&[
        "소장자료",
        "검색결과가 없습니다",
        "검색 결과가 없습니다",
        "단행본",
        "held items",
        "no results",
        "monograph",
    ])
}

fn default_ttl_seconds() -> u64 {
    1800
}

fn default_max_entries() -> usize {
    5000
}

fn default_gate_capacity() -> usize {
    3
}

fn default_min_content_chars() -> usize {
    800
}

fn default_ambiguous_veto_chars() -> usize {
    1000
}

fn default_long_text_chars() -> usize {
    1000
}

fn default_no_result_markers() -> Vec<String> {
    strings(&[
        "검색결과가 없습니다",
        "검색 결과가 없습니다",
        "결과가 없습니다",
        "no results found",
        "no results",
    ])
}

fn default_positive_keywords() -> Vec<String> {
    strings(&[
        "소장자료",
        "소장",
        "단행본",
        "도서",
        "대출가능",
        "대출 가능",
        "대출중",
        "대출 중",
        "이용가능",
        "이용 가능",
        "청구기호",
        "서가",
        "자료실",
        "held items",
        "monograph",
        "loan available",
        "on loan",
        "usable",
        "call number",
        "shelf",
        "reading room",
    ])
}

fn default_count_patterns() -> Vec<String> {
    strings(&[
        r"소장자료\s*:?\s*(\d+)",
        r"(?i)held items\s*:?\s*(\d+)",
        r"소장\s*(\d+)",
        r"(\d+)\s*건",
        r"(?i)\b(\d+)\s*(?:results|hits)\b",
    ])
}

fn default_held_item_keywords() -> Vec<String> {
    strings(&["소장자료", "held items"])
}

fn default_loan_keywords() -> Vec<String> {
    strings(&[
        "대출가능",
        "대출 가능",
        "대출중",
        "대출 중",
        "이용가능",
        "이용 가능",
        "청구기호",
        "단행본",
        "loan available",
        "on loan",
        "usable",
        "call number",
        "monograph",
    ])
}

fn default_shelf_keywords() -> Vec<String> {
    strings(&[
        "제1자료실",
        "제2자료실",
        "중앙도서관",
        "참고자료실",
        "정기간행물실",
        "서가",
        "자료실",
        "central library",
        "reading room",
        "reference room",
        "periodicals room",
        "shelf",
    ])
}

fn default_negative_phrases() -> Vec<String> {
    strings(&["없습니다", "no results", "not found"])
}

fn default_availability_rules() -> Vec<AvailabilityRule> {
    vec![
        AvailabilityRule {
            name: "loan_available".to_string(),
            keywords: strings(&["대출가능", "대출 가능", "loan available", "available for loan"]),
            available: true,
        },
        AvailabilityRule {
            name: "on_loan".to_string(),
            keywords: strings(&["대출중", "대출 중", "on loan", "checked out"]),
            available: false,
        },
        AvailabilityRule {
            name: "usable".to_string(),
            keywords: strings(&["이용가능", "이용 가능", "usable", "in-library use"]),
            available: true,
        },
    ]
}

fn default_locations() -> Vec<LocationLabel> {
    [
        ("제1자료실", &["제1자료실", "제 1 자료실"][..]),
        ("제2자료실", &["제2자료실", "제 2 자료실"][..]),
        ("중앙도서관", &["중앙도서관"][..]),
        ("참고자료실", &["참고자료실"][..]),
        ("정기간행물실", &["정기간행물실"][..]),
        ("first reading room", &["first reading room"][..]),
        ("second reading room", &["second reading room"][..]),
        ("central library", &["central library"][..]),
        ("reference room", &["reference room"][..]),
        ("periodicals room", &["periodicals room"][..]),
    ]
    .into_iter()
    .map(|(label, aliases)| LocationLabel {
        label: label.to_string(),
        aliases: strings(aliases),
    })
    .collect()
}

fn default_location_label() -> String {
    "held".to_string()
}

fn default_call_number_pattern() -> String {
    r"\b\d{3}(?:\.\d+)?\b".to_string()
}

fn default_api_timeout_ms() -> u64 {
    8_000
}

fn default_api_max_concurrent() -> usize {
    10
}

fn default_api_endpoints() -> Vec<ApiEndpoint> {
    vec![
        ApiEndpoint {
            method: ApiMethod::Post,
            url: "https://lib.yju.ac.kr/api/search/list".to_string(),
            body: Some(serde_json::json!({ "query": "{term}", "type": "total" })),
        },
        ApiEndpoint {
            method: ApiMethod::Post,
            url: "https://lib.yju.ac.kr/Cheetah/api/search".to_string(),
            body: Some(serde_json::json!({ "keyword": "{term}", "target": "all" })),
        },
        ApiEndpoint {
            method: ApiMethod::Get,
            url: "https://lib.yju.ac.kr/api/holdings?isbn={term}".to_string(),
            body: None,
        },
    ]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            prelaunch_browser: default_prelaunch_browser(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_search_url: default_base_search_url(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: default_disable_security(),
            window: WindowConfig::default(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: default_navigation_timeout_ms(),
            readiness: ReadinessConfig::default(),
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            attempts: default_readiness_attempts(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            final_grace_ms: default_final_grace_ms(),
            min_ready_chars: default_min_ready_chars(),
            markers: default_readiness_markers(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            max_entries: default_max_entries(),
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            capacity: default_gate_capacity(),
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_content_chars: default_min_content_chars(),
            ambiguous_veto_chars: default_ambiguous_veto_chars(),
            long_text_chars: default_long_text_chars(),
            no_result_markers: default_no_result_markers(),
            positive_keywords: default_positive_keywords(),
            count_patterns: default_count_patterns(),
            held_item_keywords: default_held_item_keywords(),
            loan_keywords: default_loan_keywords(),
            shelf_keywords: default_shelf_keywords(),
            negative_phrases: default_negative_phrases(),
            availability_rules: default_availability_rules(),
            locations: default_locations(),
            default_location: default_location_label(),
            call_number_pattern: default_call_number_pattern(),
            policies: DefaultPolicies::default(),
        }
    }
}

impl Default for DefaultPolicies {
    fn default() -> Self {
        Self {
            available_when_unknown: true,
            long_text_implies_found: true,
        }
    }
}

impl Default for ApiProbeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_ms: default_api_timeout_ms(),
            max_concurrent: default_api_max_concurrent(),
            endpoints: default_api_endpoints(),
        }
    }
}

impl RenderConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Config {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Reject values that would make the service unable to answer
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gate.capacity == 0 {
            return Err(ConfigError::Invalid("gate.capacity must be at least 1".into()));
        }
        if self.api_probe.enabled && self.api_probe.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "api_probe.max_concurrent must be at least 1".into(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid("cache.max_entries must be at least 1".into()));
        }
        if self.render.readiness.attempts == 0 {
            return Err(ConfigError::Invalid(
                "render.readiness.attempts must be at least 1".into(),
            ));
        }
        if self.render.navigation_timeout_ms > MAX_NAVIGATION_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "render.navigation_timeout_ms cannot exceed {}ms ({} minutes). Received: {}ms",
                MAX_NAVIGATION_TIMEOUT_MS,
                MAX_NAVIGATION_TIMEOUT_MS / 60_000,
                self.render.navigation_timeout_ms
            )));
        }
        if self.extractor.ambiguous_veto_chars < self.extractor.min_content_chars {
            return Err(ConfigError::Invalid(
                "extractor.ambiguous_veto_chars must not be below extractor.min_content_chars"
                    .into(),
            ));
        }
        Ok(())
    }
}

/// Load config from `$LIBRARY_HOLDINGS_CONFIG`, else `config.yaml` in the package root
///
/// A missing file yields defaults; a present but invalid file is an error.
pub fn load_yaml_config() -> Result<Config, ConfigError> {
    let config_path = std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.yaml"));

    if config_path.exists() {
        Config::from_path(&config_path)
    } else {
        Ok(Config::default())
    }
}
