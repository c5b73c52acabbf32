//! Detects regulations that probably replace older ones from the same state
//! and issuing agency, and writes reviewer notes back onto the newer record.

mod overview;

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::WorkflowError;
use crate::engine::candidates::{integer_key, select_candidates, JurisdictionKey};
use crate::engine::{
    overlap_score, ConfidenceThresholds, KeywordConfig, Match, MatchReport, NoteWriteMode,
    WriteConfig, WriteSummary,
};
use crate::report::{Report, Section};
use crate::store::{FieldValue, Query, Record, RecordId, RecordStore, RecordUpdate};

pub use overview::{AgencyGroup, DatasetOverview, SharedAgencyName};

/// Field names of the Regulations table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegulationFields {
    pub reg_id: String,
    pub state: String,
    pub year: String,
    pub agency: String,
    pub title: String,
    /// Running log written in append mode.
    pub internal_notes: String,
    /// Dedicated field overwritten in replace mode.
    pub detection: String,
}

impl Default for RegulationFields {
    fn default() -> Self {
        Self {
            reg_id: "Reg-ID".to_string(),
            state: "State".to_string(),
            year: "Year".to_string(),
            agency: "Issuing Agency Link".to_string(),
            title: "Title".to_string(),
            internal_notes: "Internal Notes".to_string(),
            detection: "Supersedes Detection".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupersedesConfig {
    pub table: String,
    pub fields: RegulationFields,
    pub keywords: KeywordConfig,
    /// Share of source keywords a candidate title must contain.
    pub min_match_score: f64,
    /// How many years back a candidate may be.
    pub max_year_diff: i64,
    pub thresholds: ConfidenceThresholds,
    pub note_mode: NoteWriteMode,
    /// Entries shown per note; defaults to 5 when appending and 10 when replacing.
    pub report_limit: Option<usize>,
}

impl Default for SupersedesConfig {
    fn default() -> Self {
        Self {
            table: "Regulations".to_string(),
            fields: RegulationFields::default(),
            keywords: KeywordConfig::default(),
            min_match_score: 0.5,
            max_year_diff: 5,
            thresholds: ConfidenceThresholds::default(),
            note_mode: NoteWriteMode::default(),
            report_limit: None,
        }
    }
}

impl SupersedesConfig {
    pub fn note_field(&self) -> &str {
        match self.note_mode {
            NoteWriteMode::Replace => &self.fields.detection,
            NoteWriteMode::Append { .. } => &self.fields.internal_notes,
        }
    }

    pub fn report_limit(&self) -> usize {
        self.report_limit.unwrap_or(match self.note_mode {
            NoteWriteMode::Replace => 10,
            NoteWriteMode::Append { .. } => 5,
        })
    }

    fn jurisdiction(&self) -> JurisdictionKey {
        JurisdictionKey::new(&self.fields.state, &self.fields.agency)
    }

    fn query_fields(&self) -> Vec<String> {
        let fields = &self.fields;
        vec![
            fields.reg_id.clone(),
            fields.state.clone(),
            fields.year.clone(),
            fields.agency.clone(),
            fields.title.clone(),
            self.note_field().to_string(),
        ]
    }
}

/// Why a regulation produced no note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoTitle,
    MissingFields,
    NoCandidates,
    NoKeywords,
}

impl SkipReason {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NoTitle => "no title",
            Self::MissingFields => "missing state, agency or year",
            Self::NoCandidates => "no candidates from earlier years",
            Self::NoKeywords => "no extractable keywords",
        }
    }
}

/// Outcome of evaluating one regulation against the rest of the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Detection {
    Skipped { reason: SkipReason },
    BelowThreshold { candidates: usize, best_score: f64 },
    Matched { report: MatchReport },
}

impl Detection {
    pub fn summary(&self) -> String {
        match self {
            Detection::Skipped { reason } => format!("skipped: {}", reason.label()),
            Detection::BelowThreshold {
                candidates,
                best_score,
            } => format!(
                "no match among {candidates} candidate(s), best score {:.0}%",
                (best_score * 100.0).round()
            ),
            Detection::Matched { report } => {
                format!("{} potential supersedes relationship(s)", report.matches.len())
            }
        }
    }
}

/// A regulation whose candidates all scored under the match threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowScore {
    pub reg_ref: String,
    pub best_score: f64,
    pub candidate_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkDetectionSummary {
    pub processed: usize,
    pub with_matches: usize,
    pub no_title: usize,
    pub missing_fields: usize,
    pub no_candidates: usize,
    pub no_keywords: usize,
    pub low_scores: Vec<LowScore>,
    pub overview: DatasetOverview,
    pub write: WriteSummary,
}

impl BulkDetectionSummary {
    pub fn to_report(&self) -> Report {
        let mut report = Report::new("Bulk Supersedes Detection")
            .with_section(
                Section::new("Processing")
                    .entry("Total regulations processed", self.processed)
                    .entry("Regulations with matches found", self.with_matches)
                    .entry("Notes written", self.write.written),
            )
            .with_section(
                Section::new("Diagnostics")
                    .entry("Records with no title", self.no_title)
                    .entry("Records missing state, agency or year", self.missing_fields)
                    .entry("Records with no extractable keywords", self.no_keywords)
                    .entry(
                        "Records with no candidates from earlier years",
                        self.no_candidates,
                    ),
            );

        let mut low = Section::new("Candidates below the match threshold").bullets(
            self.low_scores.iter().take(5).map(|item| {
                format!(
                    "{}: Best score {:.0}% from {} candidates",
                    item.reg_ref,
                    (item.best_score * 100.0).round(),
                    item.candidate_count
                )
            }),
        );
        if self.low_scores.len() > 5 {
            low = low.paragraph(format!("... and {} more", self.low_scores.len() - 5));
        }
        report.push(low);

        if let Some(failure) = &self.write.failure {
            report.push(Section::new("Write Failure").paragraph(format!(
                "chunk {} failed; {} note(s) were not written",
                failure.chunk_index,
                self.write.unwritten()
            )));
        }

        for section in self.overview.to_report().sections {
            report.push(section);
        }
        report
    }
}

/// Supersedes detector over a regulations table.
pub struct SupersedesDetector<S> {
    store: Arc<S>,
    config: SupersedesConfig,
    write: WriteConfig,
}

impl<S> SupersedesDetector<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>, config: SupersedesConfig, write: WriteConfig) -> Self {
        Self {
            store,
            config,
            write,
        }
    }

    pub fn config(&self) -> &SupersedesConfig {
        &self.config
    }

    /// Evaluate one regulation and write its note when matches exist.
    pub async fn detect_for(
        &self,
        record_id: &RecordId,
        today: NaiveDate,
    ) -> Result<Detection, WorkflowError> {
        let source = self
            .store
            .fetch(&self.config.table, record_id)
            .await?
            .ok_or_else(|| WorkflowError::RecordNotFound {
                table: self.config.table.clone(),
                id: record_id.clone(),
            })?;
        let pool = self.load_pool().await?;

        let detection = self.evaluate(&source, &pool, today);
        info!(record = %record_id, outcome = %detection.summary(), "supersedes detection finished");

        if let Detection::Matched { report } = &detection {
            let update = self.note_update(&source, report);
            self.store.update(&self.config.table, vec![update]).await?;
        }
        Ok(detection)
    }

    /// Evaluate every regulation and write all notes in chunks.
    pub async fn detect_all(&self, today: NaiveDate) -> Result<BulkDetectionSummary, WorkflowError> {
        let pool = self.load_pool().await?;
        info!(records = pool.len(), "starting bulk supersedes detection");
        let overview = DatasetOverview::from_records(&pool, &self.config.fields);

        let mut summary = BulkDetectionSummary {
            processed: 0,
            with_matches: 0,
            no_title: 0,
            missing_fields: 0,
            no_candidates: 0,
            no_keywords: 0,
            low_scores: Vec::new(),
            overview,
            write: WriteSummary::default(),
        };
        let mut updates = Vec::new();

        for source in &pool {
            summary.processed += 1;
            match self.evaluate(source, &pool, today) {
                Detection::Skipped { reason } => match reason {
                    SkipReason::NoTitle => summary.no_title += 1,
                    SkipReason::MissingFields => summary.missing_fields += 1,
                    SkipReason::NoCandidates => summary.no_candidates += 1,
                    SkipReason::NoKeywords => summary.no_keywords += 1,
                },
                Detection::BelowThreshold {
                    candidates,
                    best_score,
                } => {
                    if best_score > 0.0 {
                        summary.low_scores.push(LowScore {
                            reg_ref: self.reg_ref(source),
                            best_score,
                            candidate_count: candidates,
                        });
                    }
                }
                Detection::Matched { report } => {
                    summary.with_matches += 1;
                    debug!(record = %source.id, matches = report.matches.len(), "matches found");
                    updates.push(self.note_update(source, &report));
                }
            }
        }

        summary.write = self
            .write
            .writer(self.store.as_ref(), self.config.table.clone())
            .update_all(updates)
            .await;
        info!(
            processed = summary.processed,
            with_matches = summary.with_matches,
            written = summary.write.written,
            "bulk supersedes detection complete"
        );
        Ok(summary)
    }

    /// Pure matching step shared by both modes.
    pub fn evaluate(&self, source: &Record, pool: &[Record], today: NaiveDate) -> Detection {
        let config = &self.config;
        let fields = &config.fields;
        let Some(title) = source.present_text(&fields.title) else {
            return Detection::Skipped {
                reason: SkipReason::NoTitle,
            };
        };
        let jurisdiction = config.jurisdiction();
        let year = integer_key(&fields.year);
        if jurisdiction.key(source).is_none() || year(source).is_none() {
            return Detection::Skipped {
                reason: SkipReason::MissingFields,
            };
        }

        let candidates = select_candidates(
            source,
            pool,
            |record| jurisdiction.key(record),
            &year,
            config.max_year_diff,
        );
        if candidates.is_empty() {
            return Detection::Skipped {
                reason: SkipReason::NoCandidates,
            };
        }

        let keywords = config.keywords.extract(Some(&title));
        if keywords.is_empty() {
            return Detection::Skipped {
                reason: SkipReason::NoKeywords,
            };
        }

        let mut best_score: f64 = 0.0;
        let mut matches = Vec::new();
        for candidate in &candidates {
            let Some(candidate_title) = candidate.present_text(&fields.title) else {
                continue;
            };
            let score = overlap_score(&keywords, Some(&candidate_title));
            best_score = best_score.max(score);
            if score >= config.min_match_score {
                matches.push(Match {
                    candidate_id: candidate.id.clone(),
                    candidate_ref: self.reg_ref(candidate),
                    candidate_text: candidate_title,
                    time_key: year(candidate),
                    score,
                    tier: config.thresholds.tier_for(score),
                });
            }
        }

        if matches.is_empty() {
            return Detection::BelowThreshold {
                candidates: candidates.len(),
                best_score,
            };
        }
        Detection::Matched {
            report: MatchReport::new(today, matches, config.report_limit()),
        }
    }

    async fn load_pool(&self) -> Result<Vec<Record>, WorkflowError> {
        let query = Query::all().fields(self.config.query_fields());
        Ok(self.store.select(&self.config.table, &query).await?)
    }

    fn reg_ref(&self, record: &Record) -> String {
        record
            .present_text(&self.config.fields.reg_id)
            .unwrap_or_else(|| record.id.to_string())
    }

    fn note_update(&self, source: &Record, report: &MatchReport) -> RecordUpdate {
        let field = self.config.note_field();
        let note = report.render_note(&self.config.note_mode);
        let existing = source.display(field);
        let content = self.config.note_mode.apply(existing.as_deref(), &note);

        RecordUpdate {
            id: source.id.clone(),
            fields: [(field.to_string(), FieldValue::text(content))]
                .into_iter()
                .collect(),
        }
    }
}
