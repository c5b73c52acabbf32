use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::report::{Report, Section};
use crate::store::RecordId;

/// Coarse bucketing of a similarity score for reviewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceThresholds {
    pub high: f64,
    pub medium: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high: 0.75,
            medium: 0.6,
        }
    }
}

impl ConfidenceThresholds {
    /// Monotonic in `score` as long as `high >= medium`.
    pub fn tier_for(&self, score: f64) -> ConfidenceTier {
        if score >= self.high {
            ConfidenceTier::High
        } else if score >= self.medium {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

/// A scored candidate pair, seen from the source record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub candidate_id: RecordId,
    /// Business identifier shown to reviewers (e.g. the regulation id).
    pub candidate_ref: String,
    pub candidate_text: String,
    pub time_key: Option<i64>,
    pub score: f64,
    pub tier: ConfidenceTier,
}

impl Match {
    pub fn percent(&self) -> String {
        format!("{:.0}%", (self.score * 100.0).round())
    }

    fn time_label(&self) -> String {
        self.time_key
            .map(|time| time.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Score descending, then more recent candidates first. Stable for ties.
pub fn rank(mut matches: Vec<Match>) -> Vec<Match> {
    matches.sort_by(|left, right| {
        right
            .score
            .partial_cmp(&left.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| right.time_key.cmp(&left.time_key))
    });
    matches
}

/// How a rendered match note is written back into its text field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum NoteWriteMode {
    /// Overwrite a dedicated field with the latest report.
    Replace,
    /// Append to a running log, separated by `delimiter`.
    Append { delimiter: String },
}

impl Default for NoteWriteMode {
    fn default() -> Self {
        Self::Replace
    }
}

impl NoteWriteMode {
    pub fn append() -> Self {
        Self::Append {
            delimiter: "\n".to_string(),
        }
    }

    /// New field content given what the field currently holds.
    pub fn apply(&self, existing: Option<&str>, note: &str) -> String {
        match self {
            Self::Replace => note.to_string(),
            Self::Append { delimiter } => match existing {
                Some(existing) if !existing.is_empty() => {
                    format!("{existing}{delimiter}{note}")
                }
                _ => note.to_string(),
            },
        }
    }
}

pub const REVIEW_CALL_TO_ACTION: &str = "Action: Review these suggestions and create manual links in the \"Superseded By\" or \"Supersedes\" fields if confirmed.";

const LOG_CALL_TO_ACTION: &str = "Review these and create manual links if confirmed.";

/// Ranked matches for one source record, ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchReport {
    pub checked_on: NaiveDate,
    pub matches: Vec<Match>,
    pub limit: usize,
}

impl MatchReport {
    pub fn new(checked_on: NaiveDate, matches: Vec<Match>, limit: usize) -> Self {
        Self {
            checked_on,
            matches: rank(matches),
            limit,
        }
    }

    pub fn shown(&self) -> &[Match] {
        let end = self.limit.min(self.matches.len());
        &self.matches[..end]
    }

    pub fn hidden(&self) -> usize {
        self.matches.len().saturating_sub(self.limit)
    }

    pub fn to_report(&self) -> Report {
        let count = self.matches.len();
        let mut report = Report::new("Supersedes Detection").with_section(
            Section::untitled()
                .entry("Last checked", self.checked_on.format("%m/%d/%Y"))
                .entry("Potential relationships", count),
        );
        for candidate in self.shown() {
            report.push(
                Section::new(format!("{} CONFIDENCE", candidate.tier.label()))
                    .entry("Candidate", &candidate.candidate_ref)
                    .entry("Year", candidate.time_label())
                    .entry("Title", &candidate.candidate_text)
                    .entry("Match Score", candidate.percent()),
            );
        }
        let hidden = self.hidden();
        if hidden > 0 {
            report.push(
                Section::untitled().paragraph(format!("... and {hidden} more potential matches")),
            );
        }
        report.push(Section::untitled().paragraph(REVIEW_CALL_TO_ACTION));
        report
    }

    /// Field text for the configured write mode.
    pub fn render_note(&self, mode: &NoteWriteMode) -> String {
        match mode {
            NoteWriteMode::Replace => self.render_detection_field(),
            NoteWriteMode::Append { .. } => self.render_log_entry(),
        }
    }

    fn render_detection_field(&self) -> String {
        let count = self.matches.len();
        let plural = if count == 1 { "" } else { "s" };
        let mut out = format!(
            "Last checked: {}\n\nFound {count} potential supersedes relationship{plural}:\n\n",
            self.checked_on.format("%m/%d/%Y")
        );
        for candidate in self.shown() {
            out.push_str(&format!(
                "{} CONFIDENCE:\n• {} (Year: {})\n  Title: \"{}\"\n  Match Score: {}\n\n",
                candidate.tier.label(),
                candidate.candidate_ref,
                candidate.time_label(),
                candidate.candidate_text,
                candidate.percent()
            ));
        }
        let hidden = self.hidden();
        if hidden > 0 {
            out.push_str(&format!("... and {hidden} more potential matches\n\n"));
        }
        out.push_str(REVIEW_CALL_TO_ACTION);
        out
    }

    fn render_log_entry(&self) -> String {
        let mut out = format!(
            "--- Supersedes Detection ({}) ---\nPotential supersedes relationships found:\n",
            self.checked_on.format("%m/%d/%Y")
        );
        for candidate in self.shown() {
            out.push_str(&format!(
                "• {} ({}) - {} confidence\n  \"{}\"\n",
                candidate.candidate_ref,
                candidate.time_label(),
                candidate.tier.title(),
                candidate.candidate_text
            ));
        }
        let hidden = self.hidden();
        if hidden > 0 {
            out.push_str(&format!("• ... and {hidden} more potential matches\n"));
        }
        out.push_str(&format!("\n{LOG_CALL_TO_ACTION}\n---\n"));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, year: i64, score: f64) -> Match {
        Match {
            candidate_id: RecordId::from(id),
            candidate_ref: format!("REG-{id}"),
            candidate_text: format!("Title {id}"),
            time_key: Some(year),
            score,
            tier: ConfidenceThresholds::default().tier_for(score),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).expect("valid date")
    }

    #[test]
    fn percent_rounds_halves_away_from_zero() {
        assert_eq!(candidate("a", 2020, 0.625).percent(), "63%");
        assert_eq!(candidate("b", 2020, 0.125).percent(), "13%");
        assert_eq!(candidate("c", 2020, 2.0 / 3.0).percent(), "67%");
    }

    #[test]
    fn tiers_follow_thresholds_and_stay_monotonic() {
        let thresholds = ConfidenceThresholds::default();
        assert_eq!(thresholds.tier_for(2.0 / 3.0), ConfidenceTier::Medium);
        assert_eq!(thresholds.tier_for(0.75), ConfidenceTier::High);
        assert_eq!(thresholds.tier_for(0.59), ConfidenceTier::Low);

        let mut previous = ConfidenceTier::Low;
        for step in 0..=100 {
            let tier = thresholds.tier_for(step as f64 / 100.0);
            assert!(tier >= previous);
            previous = tier;
        }
    }

    #[test]
    fn ranks_by_score_then_recency() {
        let ranked = rank(vec![
            candidate("a", 2019, 0.5),
            candidate("b", 2020, 1.0),
            candidate("c", 2022, 0.5),
        ]);
        let order: Vec<&str> = ranked.iter().map(|m| m.candidate_id.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn detection_field_lists_limited_entries_and_remainder() {
        let report = MatchReport::new(
            day(),
            vec![
                candidate("a", 2021, 1.0),
                candidate("b", 2020, 2.0 / 3.0),
                candidate("c", 2019, 0.5),
            ],
            2,
        );

        let text = report.render_note(&NoteWriteMode::Replace);
        assert!(text.starts_with(
            "Last checked: 03/14/2025\n\nFound 3 potential supersedes relationships:\n\n"
        ));
        assert!(text.contains(
            "HIGH CONFIDENCE:\n• REG-a (Year: 2021)\n  Title: \"Title a\"\n  Match Score: 100%\n\n"
        ));
        assert!(text.contains("MEDIUM CONFIDENCE:\n• REG-b (Year: 2020)"));
        assert!(text.contains("Match Score: 67%"));
        assert!(!text.contains("REG-c"));
        assert!(text.contains("... and 1 more potential matches\n\n"));
        assert!(text.ends_with(REVIEW_CALL_TO_ACTION));
    }

    #[test]
    fn single_match_uses_singular_wording() {
        let report = MatchReport::new(day(), vec![candidate("a", 2021, 0.8)], 10);
        let text = report.render_note(&NoteWriteMode::Replace);
        assert!(text.contains("Found 1 potential supersedes relationship:\n"));
        assert!(!text.contains("more potential matches"));
    }

    #[test]
    fn append_mode_keeps_existing_notes() {
        let mode = NoteWriteMode::append();
        let report = MatchReport::new(day(), vec![candidate("a", 2021, 0.5)], 5);
        let entry = report.render_note(&mode);

        assert!(entry.starts_with("--- Supersedes Detection (03/14/2025) ---\n"));
        assert!(entry.contains("• REG-a (2021) - Low confidence\n  \"Title a\"\n"));

        let updated = mode.apply(Some("Prior note"), &entry);
        assert!(updated.starts_with("Prior note\n--- Supersedes Detection"));
        assert_eq!(mode.apply(None, &entry), entry);
        assert_eq!(NoteWriteMode::Replace.apply(Some("Prior note"), &entry), entry);
    }

    #[test]
    fn structured_report_mirrors_rendered_note() {
        let report = MatchReport::new(day(), vec![candidate("a", 2021, 0.8)], 10).to_report();
        let section = report.section("HIGH CONFIDENCE").expect("tier section");
        assert_eq!(section.value("Candidate"), Some("REG-a"));
        assert_eq!(section.value("Match Score"), Some("80%"));
    }
}
