//! Optional JSON fast path
//!
//! The catalog has no documented API, but some deployments answer JSON
//! search endpoints. When enabled, each configured endpoint is tried once
//! before rendering. Only a payload with a non-empty item list or an explicit
//! zero total is trusted; anything else falls through to the render path.
//! Endpoint calls share one semaphore so a burst of cache misses cannot
//! flood the catalog.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::config::{ApiEndpoint, ApiMethod, ApiProbeConfig, ExtractorConfig};
use crate::lookup::{HoldingDetails, LookupResult};
use crate::search_term::SearchTerm;

const TERM_PLACEHOLDER: &str = "{term}";
const ITEM_KEYS: &[&str] = &["items", "list", "results"];
const TOTAL_KEYS: &[&str] = &["total", "totalCount", "count"];

#[derive(Clone)]
pub struct ApiProbe {
    client: reqwest::Client,
    endpoints: Vec<ApiEndpoint>,
    slots: Arc<Semaphore>,
    max_concurrent: usize,
}

impl ApiProbe {
    /// Fails when the HTTP client cannot be built (bad user agent, TLS backend)
    pub fn new(config: &ApiProbeConfig, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(user_agent)
            .build()?;

        let max_concurrent = config.max_concurrent.max(1);
        Ok(Self {
            client,
            endpoints: config.endpoints.clone(),
            slots: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Endpoint calls currently in flight
    pub fn in_flight(&self) -> usize {
        self.max_concurrent
            .saturating_sub(self.slots.available_permits())
    }

    /// First definite answer from the configured endpoints, if any
    pub async fn lookup(
        &self,
        term: &SearchTerm,
        detail_url: &str,
        extractor: &ExtractorConfig,
    ) -> Option<LookupResult> {
        for endpoint in &self.endpoints {
            let Some(payload) = self.fetch(endpoint, term).await else {
                continue;
            };
            if let Some(result) = interpret_api_payload(&payload, detail_url, extractor) {
                info!(%term, url = %endpoint.url, "Answered from catalog API");
                return Some(result);
            }
            debug!(url = %endpoint.url, "API payload had no recognizable result");
        }
        None
    }

    async fn fetch(&self, endpoint: &ApiEndpoint, term: &SearchTerm) -> Option<Value> {
        // never closed, so acquire only fails if that changes
        let _slot = self.slots.acquire().await.ok()?;
        let url = endpoint.url.replace(TERM_PLACEHOLDER, term.as_str());
        let request = match endpoint.method {
            ApiMethod::Get => self.client.get(&url),
            ApiMethod::Post => {
                let body = endpoint
                    .body
                    .as_ref()
                    .map(|b| substitute_term(b, term.as_str()))
                    .unwrap_or(Value::Null);
                self.client.post(&url).json(&body)
            }
        };

        let response = match request.send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(%url, status = r.status().as_u16(), "API endpoint rejected request");
                return None;
            }
            Err(e) => {
                debug!(%url, "API endpoint unreachable: {}", e);
                return None;
            }
        };

        match response.json::<Value>().await {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!(%url, "API response was not JSON: {}", e);
                None
            }
        }
    }
}

/// Replace `{term}` in every string inside a JSON body template
fn substitute_term(template: &Value, term: &str) -> Value {
    match template {
        Value::String(s) => Value::String(s.replace(TERM_PLACEHOLDER, term)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_term(v, term)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_term(v, term)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Map a search payload to a result
///
/// The first item of `items` | `list` | `results` is a holding; its
/// `loanStatus` is matched against the availability rules (no match means
/// unavailable, since the field was present to say so). A zero in `total` |
/// `totalCount` | `count` with no items is a confident negative. Any other
/// shape yields `None`.
pub fn interpret_api_payload(
    payload: &Value,
    detail_url: &str,
    extractor: &ExtractorConfig,
) -> Option<LookupResult> {
    let items = ITEM_KEYS
        .iter()
        .find_map(|key| payload.get(*key))
        .and_then(Value::as_array);

    if let Some(first) = items.and_then(|items| items.first()) {
        let text_field = |key: &str| {
            first
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default()
                .to_string()
        };

        let loan_status = text_field("loanStatus").to_lowercase();
        let available = extractor
            .availability_rules
            .iter()
            .find(|rule| {
                rule.keywords
                    .iter()
                    .any(|k| !k.is_empty() && loan_status.contains(&k.to_lowercase()))
            })
            .is_some_and(|rule| rule.available);

        let location = Some(text_field("location"))
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| extractor.default_location.clone());

        let details = HoldingDetails {
            title: text_field("title"),
            author: text_field("author"),
            publisher: text_field("publisher"),
            pub_year: scalar_field(first, "pubYear"),
            isbn: scalar_field(first, "isbn"),
            loan_status: text_field("loanStatus"),
        };

        return Some(
            LookupResult::found(available, location, text_field("callNo"), detail_url)
                .with_details(details),
        );
    }

    let total = TOTAL_KEYS
        .iter()
        .find_map(|key| payload.get(*key))
        .and_then(Value::as_u64);

    (total == Some(0)).then(|| LookupResult::not_found(detail_url))
}

/// String or number field as text; catalogs disagree on `pubYear`'s type
fn scalar_field(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
