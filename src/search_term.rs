//! Search term normalization
//!
//! A [`SearchTerm`] is both the render input and the cache key. Normalization
//! is deterministic and idempotent so that the same raw input always maps to
//! the same cache slot and the same catalog deep link.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::ServiceError;

/// Which query field produced the term
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TermKind {
    /// ISBN-like identifier code, digits only
    Identifier,
    /// Free-text title, trimmed
    Title,
}

/// Normalized search term
///
/// Equality and hashing only look at the normalized value: an identifier and a
/// title that normalize to the same text share one cache entry, because they
/// produce the same catalog link.
#[derive(Debug, Clone)]
pub struct SearchTerm {
    kind: TermKind,
    value: String,
}

impl SearchTerm {
    /// Build a term from an identifier code. Returns `None` when no digits remain.
    pub fn identifier(raw: &str) -> Option<Self> {
        let value = normalize_identifier(raw);
        if value.is_empty() {
            return None;
        }
        Some(Self {
            kind: TermKind::Identifier,
            value,
        })
    }

    /// Build a term from a title. Returns `None` for blank input.
    pub fn title(raw: &str) -> Option<Self> {
        let value = normalize_title(raw);
        if value.is_empty() {
            return None;
        }
        Some(Self {
            kind: TermKind::Title,
            value,
        })
    }

    /// Pick the search term for a lookup query
    ///
    /// The identifier wins when it still has digits after normalization,
    /// otherwise a non-blank title is used. Neither present is a client error.
    pub fn from_query(identifier: Option<&str>, title: Option<&str>) -> Result<Self, ServiceError> {
        identifier
            .and_then(Self::identifier)
            .or_else(|| title.and_then(Self::title))
            .ok_or_else(|| {
                ServiceError::InvalidArgument("an ISBN or a title is required".to_string())
            })
    }

    pub fn kind(&self) -> TermKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Canonical catalog deep link: `{base_search_url}#/total/{term}`
    pub fn detail_url(&self, base_search_url: &str) -> String {
        format!("{}#/total/{}", base_search_url, self.value)
    }
}

impl PartialEq for SearchTerm {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for SearchTerm {}

impl Hash for SearchTerm {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Strip every non-digit character (hyphens, spaces, ISBN prefixes)
pub fn normalize_identifier(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

pub fn normalize_title(raw: &str) -> String {
    raw.trim().to_string()
}
