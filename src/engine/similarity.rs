/// Fraction of `keywords` found as substrings of the lowercased candidate
/// text. Containment is not whole-word: "care" matches inside "healthcare".
pub fn overlap_score(keywords: &[String], candidate_text: Option<&str>) -> f64 {
    let Some(candidate_text) = candidate_text else {
        return 0.0;
    };
    if keywords.is_empty() {
        return 0.0;
    }

    let haystack = candidate_text.to_lowercase();
    let found = keywords
        .iter()
        .filter(|keyword| haystack.contains(keyword.as_str()))
        .count();

    found as f64 / keywords.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|word| word.to_string()).collect()
    }

    #[test]
    fn scores_fraction_of_keywords_present() {
        let score = overlap_score(
            &keywords(&["workplace", "safety", "standards"]),
            Some("Workplace Safety Guidelines 2019"),
        );
        assert!((score - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_inputs_score_zero() {
        assert_eq!(overlap_score(&[], Some("anything at all")), 0.0);
        assert_eq!(overlap_score(&keywords(&["safety"]), Some("")), 0.0);
        assert_eq!(overlap_score(&keywords(&["safety"]), None), 0.0);
    }

    #[test]
    fn substring_containment_matches_inside_longer_words() {
        let score = overlap_score(&keywords(&["care"]), Some("Healthcare Access"));
        assert_eq!(score, 1.0);
    }

    #[test]
    fn identical_keyword_sets_score_fully_in_both_directions() {
        let words = keywords(&["clinic", "licensing"]);
        let text = "Clinic Licensing";
        assert_eq!(overlap_score(&words, Some(text)), 1.0);
        assert_eq!(overlap_score(&words, Some("licensing clinic")), 1.0);
    }
}
