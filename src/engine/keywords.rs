use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Function words plus regulatory boilerplate that carries no topical signal.
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "the",
    "and",
    "or",
    "of",
    "to",
    "for",
    "in",
    "on",
    "at",
    "by",
    "with",
    "from",
    "into",
    "through",
    "during",
    "including",
    "until",
    "against",
    "among",
    "throughout",
    "despite",
    "towards",
    "upon",
    "concerning",
    "rule",
    "rules",
    "regulation",
    "regulations",
    "emergency",
    "temporary",
];

pub const DEFAULT_MIN_KEYWORD_LENGTH: usize = 4;

/// Keyword filter settings. Stopwords are stored lowercase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub min_length: usize,
    pub stopwords: BTreeSet<String>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_KEYWORD_LENGTH,
            stopwords: DEFAULT_STOPWORDS.iter().map(|word| word.to_string()).collect(),
        }
    }
}

impl KeywordConfig {
    pub fn extract(&self, text: Option<&str>) -> Vec<String> {
        extract_keywords(text, self.min_length, &self.stopwords)
    }
}

/// Lowercase `text` and keep maximal runs of ASCII letters that are at least
/// `min_length` long and not stopwords. Digits and punctuation separate
/// tokens and are dropped. Order and repeats follow the input.
pub fn extract_keywords(
    text: Option<&str>,
    min_length: usize,
    stopwords: &BTreeSet<String>,
) -> Vec<String> {
    let Some(text) = text else {
        return Vec::new();
    };

    text.to_lowercase()
        .split(|ch: char| !ch.is_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .filter(|token| token.chars().count() >= min_length)
        .filter(|token| !stopwords.contains(*token))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> KeywordConfig {
        KeywordConfig::default()
    }

    #[test]
    fn strips_stopwords_short_words_and_digits() {
        let keywords = defaults().extract(Some("Emergency Rule on Workplace Safety Standards 2024"));
        assert_eq!(keywords, vec!["workplace", "safety", "standards"]);
    }

    #[test]
    fn digits_and_punctuation_split_tokens() {
        let keywords = defaults().extract(Some("Title-X funding/grants:phase2tests"));
        assert_eq!(keywords, vec!["title", "funding", "grants", "phase", "tests"]);
    }

    #[test]
    fn empty_and_missing_text_yield_nothing() {
        assert!(defaults().extract(None).is_empty());
        assert!(defaults().extract(Some("")).is_empty());
        assert!(defaults().extract(Some("2024 - 17")).is_empty());
    }

    #[test]
    fn extraction_is_idempotent_over_its_own_output() {
        let config = defaults();
        let first = config.extract(Some("Abortion Reporting Requirements; Clinic Licensing (2023)"));
        let second = config.extract(Some(&first.join(" ")));
        assert_eq!(first, second);
    }

    #[test]
    fn custom_minimum_length_is_honoured() {
        let stopwords = BTreeSet::new();
        let keywords = extract_keywords(Some("sex ed act"), 3, &stopwords);
        assert_eq!(keywords, vec!["sex", "act"]);
    }
}
