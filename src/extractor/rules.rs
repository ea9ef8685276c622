//! Ordered found/not-found rules
//!
//! Each rule is a pure function of the rendered text. The classifier walks
//! [`CLASSIFICATION_RULES`] in order and takes the first verdict returned.

use regex::Regex;

use crate::config::ExtractorConfig;

/// Found/not-found decision before the short-text veto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Found,
    /// `explicit` is set only when the catalog printed a no-results marker
    NotFound { explicit: bool },
    LoadFailure,
    /// No rule could decide
    Ambiguous,
}

/// Pre-computed view of the text shared by every rule
pub struct RuleInput<'a> {
    pub text: &'a str,
    /// Lowercased copy for case-insensitive keyword matching
    pub lowered: String,
    /// Length in characters, not bytes
    pub char_count: usize,
    pub config: &'a ExtractorConfig,
    pub count_patterns: &'a [Regex],
}

impl<'a> RuleInput<'a> {
    pub fn new(text: &'a str, config: &'a ExtractorConfig, count_patterns: &'a [Regex]) -> Self {
        Self {
            text,
            lowered: text.to_lowercase(),
            char_count: text.chars().count(),
            config,
            count_patterns,
        }
    }

    pub fn contains_any(&self, keywords: &[String]) -> bool {
        keywords
            .iter()
            .any(|k| !k.is_empty() && self.lowered.contains(&k.to_lowercase()))
    }

    /// First collection count found by the patterns, most specific first
    pub fn collection_count(&self) -> Option<u64> {
        self.count_patterns.iter().find_map(|pattern| {
            pattern
                .captures(self.text)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u64>().ok())
        })
    }
}

/// A named predicate-plus-outcome pair
pub struct ClassificationRule {
    pub name: &'static str,
    pub apply: fn(&RuleInput<'_>) -> Option<Verdict>,
}

pub const CLASSIFICATION_RULES: &[ClassificationRule] = &[
    ClassificationRule {
        name: "too_short",
        apply: too_short,
    },
    ClassificationRule {
        name: "explicit_negative",
        apply: explicit_negative,
    },
    ClassificationRule {
        name: "collection_count",
        apply: collection_count,
    },
    ClassificationRule {
        name: "held_item_keyword",
        apply: held_item_keyword,
    },
    ClassificationRule {
        name: "loan_status_keyword",
        apply: loan_status_keyword,
    },
    ClassificationRule {
        name: "shelf_keyword",
        apply: shelf_keyword,
    },
    ClassificationRule {
        name: "long_text_without_negative",
        apply: long_text_without_negative,
    },
];

fn too_short(input: &RuleInput<'_>) -> Option<Verdict> {
    (input.char_count < input.config.min_content_chars).then_some(Verdict::LoadFailure)
}

fn explicit_negative(input: &RuleInput<'_>) -> Option<Verdict> {
    let negative = input.contains_any(&input.config.no_result_markers);
    let positive = input.contains_any(&input.config.positive_keywords);
    (negative && !positive).then_some(Verdict::NotFound { explicit: true })
}

fn collection_count(input: &RuleInput<'_>) -> Option<Verdict> {
    input.collection_count().map(|count| {
        if count == 0 {
            Verdict::NotFound { explicit: false }
        } else {
            Verdict::Found
        }
    })
}

fn held_item_keyword(input: &RuleInput<'_>) -> Option<Verdict> {
    input
        .contains_any(&input.config.held_item_keywords)
        .then_some(Verdict::Found)
}

fn loan_status_keyword(input: &RuleInput<'_>) -> Option<Verdict> {
    input
        .contains_any(&input.config.loan_keywords)
        .then_some(Verdict::Found)
}

fn shelf_keyword(input: &RuleInput<'_>) -> Option<Verdict> {
    input
        .contains_any(&input.config.shelf_keywords)
        .then_some(Verdict::Found)
}

/// Governed by the `long_text_implies_found` policy
fn long_text_without_negative(input: &RuleInput<'_>) -> Option<Verdict> {
    let config = input.config;
    (config.policies.long_text_implies_found
        && input.char_count > config.long_text_chars
        && !input.contains_any(&config.negative_phrases))
        .then_some(Verdict::Found)
}

/// Run the rules in order; `("ambiguous", Ambiguous)` when none fires
pub fn first_verdict(input: &RuleInput<'_>) -> (&'static str, Verdict) {
    CLASSIFICATION_RULES
        .iter()
        .find_map(|rule| (rule.apply)(input).map(|verdict| (rule.name, verdict)))
        .unwrap_or(("ambiguous", Verdict::Ambiguous))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(config: &ExtractorConfig) -> Vec<Regex> {
        config
            .count_patterns
            .iter()
            .map(|p| Regex::new(p).unwrap())
            .collect()
    }

    fn pad(text: &str, chars: usize) -> String {
        let mut out = text.to_string();
        while out.chars().count() < chars {
            out.push_str(" lorem ipsum dolor sit amet");
        }
        out
    }

    #[test]
    fn rule_order_is_stable() {
        let names: Vec<_> = CLASSIFICATION_RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            [
                "too_short",
                "explicit_negative",
                "collection_count",
                "held_item_keyword",
                "loan_status_keyword",
                "shelf_keyword",
                "long_text_without_negative",
            ]
        );
    }

    #[test]
    fn char_count_ignores_utf8_width() {
        let config = ExtractorConfig::default();
        let pats = patterns(&config);
        let input = RuleInput::new("소장자료", &config, &pats);
        assert_eq!(input.char_count, 4);
    }

    #[test]
    fn count_patterns_prefer_specific_match() {
        let config = ExtractorConfig::default();
        let pats = patterns(&config);
        let input = RuleInput::new("소장자료 2 / 전체 7건", &config, &pats);
        assert_eq!(input.collection_count(), Some(2));
    }

    #[test]
    fn positive_keyword_blocks_explicit_negative() {
        let config = ExtractorConfig::default();
        let pats = patterns(&config);
        let text = pad("검색결과가 없습니다 단행본", 900);
        let input = RuleInput::new(&text, &config, &pats);
        assert_eq!(explicit_negative(&input), None);
        assert_eq!(first_verdict(&input), ("loan_status_keyword", Verdict::Found));
    }

    #[test]
    fn long_text_policy_can_be_disabled() {
        let mut config = ExtractorConfig::default();
        config.policies.long_text_implies_found = false;
        let pats = patterns(&config);
        let text = pad("", 1200);
        let input = RuleInput::new(&text, &config, &pats);
        assert_eq!(first_verdict(&input), ("ambiguous", Verdict::Ambiguous));
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let config = ExtractorConfig::default();
        let pats = patterns(&config);
        let text = pad("Central Library", 900);
        let input = RuleInput::new(&text, &config, &pats);
        assert_eq!(first_verdict(&input), ("shelf_keyword", Verdict::Found));
    }
}
