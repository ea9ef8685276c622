//! Content extractor
//!
//! Maps the rendered catalog text to a [`LookupResult`]. Classification is
//! pure and total: every input yields a result, and the only configuration
//! failure (a bad regex) is reported once when the [`Classifier`] is built.

mod rules;

pub use rules::{CLASSIFICATION_RULES, ClassificationRule, RuleInput, Verdict};

use regex::Regex;
use tracing::debug;

use crate::config::{ConfigError, ExtractorConfig};
use crate::lookup::LookupResult;

/// Name reported when the short-text veto overrides a verdict
pub const SHORT_TEXT_VETO: &str = "short_text_veto";

/// Extracted fields for one page, before the detail URL is attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub verdict: Verdict,
    /// Name of the rule that decided the verdict
    pub rule: &'static str,
    pub available: bool,
    pub location: String,
    pub call_number: String,
}

impl Classification {
    pub fn into_result(self, detail_url: impl Into<String>) -> LookupResult {
        match self.verdict {
            Verdict::Found => {
                LookupResult::found(self.available, self.location, self.call_number, detail_url)
            }
            Verdict::NotFound { .. } | Verdict::Ambiguous => LookupResult::not_found(detail_url),
            Verdict::LoadFailure => LookupResult::load_failure(detail_url),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    config: ExtractorConfig,
    count_patterns: Vec<Regex>,
    call_number: Regex,
}

impl Classifier {
    /// Compile the configured patterns
    pub fn new(config: ExtractorConfig) -> Result<Self, ConfigError> {
        let count_patterns = config
            .count_patterns
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, _>>()?;
        let call_number = compile(&config.call_number_pattern)?;

        Ok(Self {
            config,
            count_patterns,
            call_number,
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn classify(&self, text: &str) -> Classification {
        let input = RuleInput::new(text, &self.config, &self.count_patterns);
        let (rule, verdict) = rules::first_verdict(&input);

        let (rule, verdict) = match verdict {
            Verdict::NotFound { explicit: false } | Verdict::Ambiguous
                if input.char_count < self.config.ambiguous_veto_chars =>
            {
                (SHORT_TEXT_VETO, Verdict::LoadFailure)
            }
            Verdict::Ambiguous => (rule, Verdict::NotFound { explicit: false }),
            other => (rule, other),
        };

        debug!(rule, ?verdict, chars = input.char_count, "Classified rendered text");

        if verdict != Verdict::Found {
            return Classification {
                verdict,
                rule,
                available: false,
                location: String::new(),
                call_number: String::new(),
            };
        }

        Classification {
            verdict,
            rule,
            available: self.availability(&input),
            location: self.location(&input),
            call_number: self.call_number(text),
        }
    }

    /// Classify and attach the canonical detail URL
    pub fn classify_to_result(&self, text: &str, detail_url: impl Into<String>) -> LookupResult {
        self.classify(text).into_result(detail_url)
    }

    fn availability(&self, input: &RuleInput<'_>) -> bool {
        self.config
            .availability_rules
            .iter()
            .find(|rule| input.contains_any(&rule.keywords))
            .map(|rule| rule.available)
            .unwrap_or(self.config.policies.available_when_unknown)
    }

    fn location(&self, input: &RuleInput<'_>) -> String {
        self.config
            .locations
            .iter()
            .find(|loc| input.contains_any(&loc.aliases))
            .map(|loc| loc.label.clone())
            .unwrap_or_else(|| self.config.default_location.clone())
    }

    fn call_number(&self, text: &str) -> String {
        self.call_number
            .find(text)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://lib.example/#/total/9788966262281";

    fn classifier() -> Classifier {
        Classifier::new(ExtractorConfig::default()).unwrap()
    }

    /// Pad with filler that matches no keyword and no call number
    fn pad(text: &str, chars: usize) -> String {
        let mut out = text.to_string();
        while out.chars().count() < chars {
            out.push_str(" lorem ipsum dolor sit amet");
        }
        out
    }

    #[test]
    fn short_text_is_load_failure() {
        let c = classifier();
        for text in ["", "검색결과가 없습니다", "held items 3 loan available"] {
            let result = c.classify_to_result(text, URL);
            assert!(!result.is_found());
            assert_eq!(result.error_message(), "page load failed");
            assert_eq!(result.detail_url(), URL);
        }
    }

    #[test]
    fn explicit_negative_is_confident() {
        let c = classifier();
        let classification = c.classify(&pad("no results found", 850));
        assert_eq!(classification.rule, "explicit_negative");
        let result = classification.into_result(URL);
        assert!(!result.is_found());
        assert_eq!(result.error_message(), "");
    }

    #[test]
    fn korean_negative_is_confident() {
        let result = classifier().classify_to_result(&pad("검색결과가 없습니다", 850), URL);
        assert!(!result.is_found());
        assert!(result.is_definite());
    }

    #[test]
    fn held_items_with_loan_and_location() {
        let text = pad("held items 1 loan available central library 005.133", 900);
        let result = classifier().classify_to_result(&text, URL);
        assert!(result.is_found());
        assert!(result.is_available());
        assert_eq!(result.location(), "central library");
        assert_eq!(result.call_number(), "005.133");
        assert_eq!(result.error_message(), "");
    }

    #[test]
    fn zero_count_is_not_found() {
        let c = classifier();
        let long = c.classify(&pad("소장자료 0", 1100));
        assert_eq!(long.rule, "collection_count");
        assert_eq!(long.verdict, Verdict::NotFound { explicit: false });
        assert!(!long.into_result(URL).is_found());
    }

    #[test]
    fn zero_count_on_short_text_is_vetoed() {
        let classification = classifier().classify(&pad("소장자료 0", 850));
        assert_eq!(classification.rule, SHORT_TEXT_VETO);
        assert_eq!(classification.verdict, Verdict::LoadFailure);
    }

    #[test]
    fn positive_count_is_found() {
        let classification = classifier().classify(&pad("소장자료 3", 850));
        assert_eq!(classification.verdict, Verdict::Found);
        assert_eq!(classification.location, "held");
        assert!(classification.available);
    }

    #[test]
    fn on_loan_is_unavailable() {
        let result = classifier().classify_to_result(&pad("소장자료 1 대출중 제2자료실 813.6", 850), URL);
        assert!(result.is_found());
        assert!(!result.is_available());
        assert_eq!(result.location(), "제2자료실");
        assert_eq!(result.call_number(), "813.6");
    }

    #[test]
    fn spaced_location_alias_maps_to_label() {
        let result = classifier().classify_to_result(&pad("소장자료 1 제 1 자료실", 850), URL);
        assert_eq!(result.location(), "제1자료실");
    }

    #[test]
    fn unknown_availability_follows_policy() {
        let mut config = ExtractorConfig::default();
        config.policies.available_when_unknown = false;
        let c = Classifier::new(config).unwrap();
        let result = c.classify_to_result(&pad("held items 2", 850), URL);
        assert!(result.is_found());
        assert!(!result.is_available());
    }

    #[test]
    fn ambiguous_long_text_with_negative_phrase_is_not_found() {
        let text = pad("item not found in this branch", 1200);
        let classification = classifier().classify(&text);
        assert_eq!(classification.verdict, Verdict::NotFound { explicit: false });
        assert!(classification.into_result(URL).is_definite());
    }

    #[test]
    fn long_text_without_negative_is_found() {
        let classification = classifier().classify(&pad("", 1200));
        assert_eq!(classification.rule, "long_text_without_negative");
        assert_eq!(classification.verdict, Verdict::Found);
        assert_eq!(classification.call_number, "");
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let mut config = ExtractorConfig::default();
        config.count_patterns.push("(unclosed".to_string());
        assert!(matches!(
            Classifier::new(config),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }
}
