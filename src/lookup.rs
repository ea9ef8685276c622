//! Lookup result types returned to callers

use serde::Serialize;

/// Outcome of one holding lookup
///
/// Fields are private so that a not-found result can never carry an
/// availability flag, a location or a call number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupResult {
    found: bool,
    available: bool,
    location: String,
    call_number: String,
    detail_url: String,
    error_message: String,
    /// Bibliographic fields, only when a catalog API answered
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    details: Option<HoldingDetails>,
}

/// Record fields reported by the catalog API for a held item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HoldingDetails {
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub pub_year: String,
    pub isbn: String,
    /// Raw loan status text, before availability rules were applied
    pub loan_status: String,
}

impl LookupResult {
    pub fn found(
        available: bool,
        location: impl Into<String>,
        call_number: impl Into<String>,
        detail_url: impl Into<String>,
    ) -> Self {
        Self {
            found: true,
            available,
            location: location.into(),
            call_number: call_number.into(),
            detail_url: detail_url.into(),
            error_message: String::new(),
            details: None,
        }
    }

    /// Attach API record fields; ignored on a not-found result
    pub fn with_details(mut self, details: HoldingDetails) -> Self {
        if self.found {
            self.details = Some(details);
        }
        self
    }

    /// Confident negative: the catalog said it has no such item
    pub fn not_found(detail_url: impl Into<String>) -> Self {
        Self::failed(detail_url, "")
    }

    /// The page never rendered enough content to decide
    pub fn load_failure(detail_url: impl Into<String>) -> Self {
        Self::failed(detail_url, "page load failed")
    }

    pub fn failed(detail_url: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            found: false,
            available: false,
            location: String::new(),
            call_number: String::new(),
            detail_url: detail_url.into(),
            error_message: error_message.into(),
            details: None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.found
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn call_number(&self) -> &str {
        &self.call_number
    }

    pub fn detail_url(&self) -> &str {
        &self.detail_url
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    pub fn details(&self) -> Option<&HoldingDetails> {
        self.details.as_ref()
    }

    /// Definite answers (positive or confident negative) carry no error
    pub fn is_definite(&self) -> bool {
        self.error_message.is_empty()
    }
}

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Cache,
    Render,
    Api,
}

/// Lookup result plus request metadata, as served over HTTP
#[derive(Debug, Clone, Serialize)]
pub struct LookupResponse {
    #[serde(flatten)]
    pub result: LookupResult,
    pub cached: bool,
    pub source: ResultSource,
    pub response_time_ms: u64,
}
