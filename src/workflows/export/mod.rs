//! Website export: preflight checks, an operator confirmation gate, per-bill
//! validation and transformation, a chunked rewrite of the destination table,
//! and a persisted quality report.

mod metrics;
mod preflight;
mod transform;

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::bills::BillFields;
use super::WorkflowError;
use crate::engine::validation::rules;
use crate::engine::{
    BatchProcessor, DuplicateIndex, QualityPolicy, QualityReport, QualityScorer, RecordError,
    RunState, RunTracker, Validator, WriteConfig, WriteSummary,
};
use crate::report::{render_markdown, ConfirmationPrompt, Report, ReportSink, Section};
use crate::store::{FieldMap, FieldValue, Query, RecordStore};

pub use metrics::{ExportMetrics, ExportWarning, IntentDistribution};
pub use preflight::{IssueKind, Preflight, PreflightIssue};
pub use transform::{collapse_whitespace, split_subpolicies, transform_bill, Subpolicies};

pub const DATE_VALIDATION_RULE: &str = "date-validation";
pub const REQUIRED_FIELDS_RULE: &str = "required-fields";
pub const DUPLICATE_RULE: &str = "duplicate-bill-id";

const DEFAULT_UNSUPPORTED_SUBPOLICIES: &[&str] = &[
    "AB Misc Neutral",
    "AB Ban Partial-Birth Abortion",
    "CPC Misc Restrictive",
    "FP Funding Restricted Other",
    "FP Right to Contraception",
    "INS Misc Positive",
    "Pregnancy HIV Test for Preg Women",
    "Parental Leave",
    "Repeals Ban All or Most AB Ban",
    "Repeals Counsel Perinatal Hospice Info",
    "Sex Ed Misc Neutral",
    "Sex Ed Misc Positive",
    "Sex Ed Misc Restrictive",
    "STI Misc Positive",
    "STI Misc Restrictive",
    "Sed Ed STI Neutral",
    "Repeals Ban on D and E Method",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub source: String,
    pub destination: String,
    pub quality_table: String,
    pub fields: BillFields,
    /// Marker the date-validation formula writes for real date problems.
    pub date_flag_marker: String,
    pub unsupported_subpolicies: Vec<String>,
    pub subpolicy_slots: usize,
    pub final_statuses: Vec<String>,
    pub date_issue_examples: usize,
    pub duplicate_examples: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            source: "Bills".to_string(),
            destination: "Website Exports".to_string(),
            quality_table: "Export Quality Reports".to_string(),
            fields: BillFields::default(),
            date_flag_marker: "🚫".to_string(),
            unsupported_subpolicies: DEFAULT_UNSUPPORTED_SUBPOLICIES
                .iter()
                .map(|name| name.to_string())
                .collect(),
            subpolicy_slots: 10,
            final_statuses: vec!["Enacted".to_string(), "Vetoed".to_string()],
            date_issue_examples: 10,
            duplicate_examples: 5,
        }
    }
}

/// Everything a finished or cancelled run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutcome {
    pub state: RunState,
    pub preflight: Preflight,
    pub critical_issues_ignored: bool,
    pub errors: Vec<RecordError>,
    pub metrics: ExportMetrics,
    pub quality: Option<QualityReport>,
    pub clear: Option<WriteSummary>,
    pub write: Option<WriteSummary>,
    pub report_saved: bool,
    pub rows: Vec<FieldMap>,
}

impl ExportOutcome {
    fn cancelled(preflight: Preflight) -> Self {
        Self {
            state: RunState::Cancelled,
            preflight,
            critical_issues_ignored: false,
            errors: Vec::new(),
            metrics: ExportMetrics::default(),
            quality: None,
            clear: None,
            write: None,
            report_saved: false,
            rows: Vec::new(),
        }
    }
}

pub struct WebsiteExport<S> {
    store: Arc<S>,
    config: ExportConfig,
    write: WriteConfig,
    scorer: QualityScorer,
}

impl<S> WebsiteExport<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>, config: ExportConfig, write: WriteConfig, quality: QualityPolicy) -> Self {
        Self {
            store,
            config,
            write,
            scorer: QualityScorer::new(quality),
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Per-bill rules. Every rule runs so a bill reports all of its problems.
    pub fn validator(&self, duplicates: Arc<DuplicateIndex>) -> Validator {
        let fields = &self.config.fields;
        Validator::new(vec![
            rules::flag_field_clear(DATE_VALIDATION_RULE, &fields.date_validation)
                .map_detail(|detail| format!("Date validation: {detail}")),
            rules::required_fields(REQUIRED_FIELDS_RULE, fields.identity()).map_detail(|detail| {
                format!(
                    "Missing required fields: {}",
                    detail.trim_start_matches("missing ")
                )
            }),
            rules::not_duplicate(DUPLICATE_RULE, duplicates)
                .map_detail(|detail| {
                    format!("Duplicate BillID ({detail}); only the first instance is exported")
                }),
        ])
    }

    pub async fn run(
        &self,
        prompt: &dyn ConfirmationPrompt,
        sink: &dyn ReportSink,
        now: NaiveDateTime,
    ) -> Result<ExportOutcome, WorkflowError> {
        let started = Instant::now();
        let config = &self.config;
        let mut tracker = RunTracker::new();

        tracker.advance(RunState::ValidatingPreflight)?;
        let bills = self.store.select(&config.source, &Query::all()).await?;
        let duplicates = Arc::new(DuplicateIndex::build(&bills, [&config.fields.bill_id]));
        let preflight = Preflight::run(self.store.as_ref(), config, &bills, &duplicates).await?;
        sink.emit(&render_markdown(&preflight.to_report()));

        let mut critical_issues_ignored = false;
        if preflight.has_critical() {
            tracker.advance(RunState::AwaitingConfirmation)?;
            let proceed = prompt
                .confirm(&preflight.confirmation_message(), &Preflight::options())
                .await;
            if !proceed {
                tracker.advance(RunState::Cancelled)?;
                info!("export cancelled at the confirmation gate");
                sink.emit("❌ Export cancelled by user due to validation issues.");
                return Ok(ExportOutcome::cancelled(preflight));
            }
            warn!(
                issues = preflight.critical().count(),
                "export continuing despite critical preflight issues"
            );
            critical_issues_ignored = true;
        }

        tracker.advance(RunState::Processing)?;
        let validator = self.validator(Arc::clone(&duplicates));
        let mut metrics = ExportMetrics {
            total_records: bills.len(),
            complete_records: bills
                .iter()
                .filter(|bill| {
                    config
                        .fields
                        .identity()
                        .iter()
                        .all(|field| bill.present_text(field).is_some())
                })
                .count(),
            duplicates: duplicates.len(),
            ..ExportMetrics::default()
        };
        let outcome = BatchProcessor::new(&validator).process(
            &bills,
            |record| transform_bill(record, config, &mut metrics),
            |record| config.fields.reference(record),
        );
        metrics.date_errors = outcome.validation.violations(DATE_VALIDATION_RULE);
        metrics.successful = outcome.accepted.len();
        metrics.failed = outcome.errors.len();
        info!(
            processed = outcome.processed(),
            exported = metrics.successful,
            failed = metrics.failed,
            "bills processed"
        );

        tracker.advance(RunState::Writing)?;
        let clear = self.clear_destination(sink).await;
        let rows = outcome.accepted;
        let write = if rows.is_empty() {
            sink.emit("⚠️ No records to export");
            None
        } else {
            let summary = self
                .write
                .writer(self.store.as_ref(), config.destination.clone())
                .create_all(rows.clone())
                .await;
            match &summary.failure {
                None => sink.emit(&format!(
                    "✅ Successfully created {} export records",
                    summary.written
                )),
                Some(failure) => sink.emit(&format!(
                    "❌ Error creating export records: chunk {} failed, {} of {} rows written",
                    failure.chunk_index, summary.written, summary.requested
                )),
            }
            Some(summary)
        };

        tracker.advance(RunState::Reporting)?;
        let quality = self
            .scorer
            .score(&metrics.aggregate())
            .with_violations(outcome.validation.violations_by_rule.clone())
            .overridden(critical_issues_ignored);
        let elapsed = started.elapsed().as_secs_f64();

        let mut report_saved = false;
        if write.as_ref().map(WriteSummary::is_complete).unwrap_or(false) {
            let fields = quality_record(&quality, &metrics, &preflight, now, elapsed);
            match self.store.create(&config.quality_table, vec![fields]).await {
                Ok(_) => {
                    report_saved = true;
                    sink.emit("✅ Quality report saved to Export Quality Reports table");
                }
                Err(err) => {
                    warn!(error = %err, "could not save quality report");
                    sink.emit(&format!("⚠️ Could not save quality report: {err}"));
                }
            }
        }

        let summary = export_summary(
            &quality,
            &metrics,
            &outcome.errors,
            &preflight,
            critical_issues_ignored,
            elapsed,
        );
        sink.emit(&render_markdown(&summary));

        tracker.advance(RunState::Done)?;
        Ok(ExportOutcome {
            state: tracker.state(),
            preflight,
            critical_issues_ignored,
            errors: outcome.errors,
            metrics,
            quality: Some(quality),
            clear,
            write,
            report_saved,
            rows,
        })
    }

    async fn clear_destination(&self, sink: &dyn ReportSink) -> Option<WriteSummary> {
        let destination = &self.config.destination;
        let existing = match self.store.select(destination, &Query::all()).await {
            Ok(existing) => existing,
            Err(err) => {
                warn!(table = %destination, error = %err, "could not read export table");
                sink.emit(&format!("⚠️ Error clearing export table: {err}"));
                return None;
            }
        };
        if existing.is_empty() {
            sink.emit("No existing records to delete");
            return None;
        }

        let ids = existing.into_iter().map(|record| record.id).collect();
        let summary = self
            .write
            .writer(self.store.as_ref(), destination.clone())
            .delete_all(ids)
            .await;
        if summary.is_complete() {
            sink.emit(&format!("✅ Previous export cleared ({} records)", summary.written));
        } else {
            sink.emit(&format!(
                "⚠️ Error clearing export table: {} of {} records deleted",
                summary.written, summary.requested
            ));
        }
        Some(summary)
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Serialize)]
struct FullReport<'a> {
    quality: &'a QualityReport,
    metrics: &'a ExportMetrics,
}

fn quality_record(
    quality: &QualityReport,
    metrics: &ExportMetrics,
    preflight: &Preflight,
    now: NaiveDateTime,
    elapsed: f64,
) -> FieldMap {
    let ignored: Vec<&PreflightIssue> = if quality.critical_issues_overridden {
        preflight.critical().collect()
    } else {
        Vec::new()
    };
    let details = if ignored.is_empty() {
        String::new()
    } else {
        serde_json::to_string(&ignored).unwrap_or_default()
    };
    let full_report = FullReport { quality, metrics };
    let components = &quality.components;

    let mut fields = FieldMap::new();
    let mut put = |name: &str, value: FieldValue| {
        fields.insert(name.to_string(), value);
    };
    put("Export Date", FieldValue::date(now.date()));
    put("Quality Score", FieldValue::number(quality.rounded_total() as f64));
    put("Grade", FieldValue::text(&quality.grade));
    put("Total Records", FieldValue::number(metrics.total_records as f64));
    put("Success Rate", FieldValue::number(round1(metrics.success_rate())));
    put("Duration (seconds)", FieldValue::number(round1(elapsed)));
    put("Completeness Score", FieldValue::number(components.completeness.round()));
    put("Accuracy Score", FieldValue::number(components.accuracy.round()));
    put("Consistency Score", FieldValue::number(components.consistency.round()));
    put("Source Blurbs", FieldValue::number(metrics.source_blurbs as f64));
    put("Exported Blurbs", FieldValue::number(metrics.exported_blurbs as f64));
    put("Blurb Failures", FieldValue::number(metrics.blurb_failures() as f64));
    put(
        "Blurb Fidelity",
        FieldValue::number(round1(metrics.aggregate().fidelity())),
    );
    put("Date Errors", FieldValue::number(metrics.date_errors as f64));
    put("States Count", FieldValue::number(metrics.states.len() as f64));
    put(
        "Critical Issues Ignored",
        FieldValue::text(if quality.critical_issues_overridden { "YES" } else { "NO" }),
    );
    put("Critical Issues Count", FieldValue::number(ignored.len() as f64));
    put("Critical Issues Details", FieldValue::text(details));
    put(
        "Recommendations",
        FieldValue::text(serde_json::to_string(&quality.recommendations).unwrap_or_default()),
    );
    put(
        "Full Report",
        FieldValue::text(serde_json::to_string_pretty(&full_report).unwrap_or_default()),
    );
    fields
}

fn score_emoji(total: f64) -> &'static str {
    if total >= 90.0 {
        "🏆"
    } else if total >= 80.0 {
        "✅"
    } else if total >= 70.0 {
        "⚠️"
    } else {
        "❌"
    }
}

/// Operator summary emitted at the end of every completed run.
pub fn export_summary(
    quality: &QualityReport,
    metrics: &ExportMetrics,
    errors: &[RecordError],
    preflight: &Preflight,
    critical_issues_ignored: bool,
    elapsed: f64,
) -> Report {
    let components = &quality.components;
    let mut report = Report::new("📊 Website Export Summary");

    report.push(
        Section::new(format!(
            "{} Quality Score: {}/100 ({})",
            score_emoji(quality.total),
            quality.rounded_total(),
            quality.grade
        ))
        .entry(
            "Completeness",
            format!("{:.0}% - Data field coverage", components.completeness.round()),
        )
        .entry("Accuracy", format!("{:.0}% - Valid dates and formats", components.accuracy.round()))
        .entry("Consistency", format!("{:.0}% - No duplicates", components.consistency.round())),
    );

    report.push(
        Section::new("📈 Export Statistics")
            .entry("Total Processed", metrics.total_records)
            .entry("Successfully Exported", metrics.successful)
            .entry("Failed", errors.len())
            .entry("Success Rate", format!("{:.1}%", metrics.success_rate()))
            .entry("Processing Time", format!("{elapsed:.1} seconds")),
    );

    if critical_issues_ignored {
        let ignored: Vec<&PreflightIssue> = preflight.critical().collect();
        report.push(
            Section::new("⚠️ Critical Issues Ignored")
                .paragraph(format!(
                    "WARNING: Export proceeded despite {} critical validation issue(s)",
                    ignored.len()
                ))
                .bullets(
                    ignored
                        .iter()
                        .map(|issue| format!("{}: {} records", issue.kind.label(), issue.count)),
                ),
        );
    }

    report.push(
        Section::new("🗺️ Coverage Analysis")
            .entry("States Represented", format!("{}/50", metrics.states.len()))
            .entry("Unique Policies", metrics.policies.len())
            .entry("Positive", metrics.intent.positive)
            .entry("Neutral", metrics.intent.neutral)
            .entry("Restrictive", metrics.intent.restrictive)
            .entry("No Intent", metrics.intent.none),
    );

    let aggregate = metrics.aggregate();
    let mut fidelity = Section::new("📝 Website Blurb Fidelity")
        .entry("Bills with Source Blurbs", metrics.source_blurbs)
        .entry("Successfully Exported", metrics.exported_blurbs)
        .entry("Processing Failures", metrics.blurb_failures())
        .entry("Fidelity Rate", format!("{:.1}%", aggregate.fidelity()));
    fidelity = if metrics.blurb_failures() > 0 {
        fidelity.paragraph(format!(
            "❌ CRITICAL: {} existing blurbs failed to export!",
            metrics.blurb_failures()
        ))
    } else {
        fidelity.paragraph("✅ Perfect fidelity: All existing blurbs exported successfully")
    };
    report.push(fidelity);

    let mut issues = Section::new("⚠️ Data Quality Issues");
    if metrics.date_errors > 0 {
        issues = issues.entry("Date Validation Errors", metrics.date_errors);
    }
    if metrics.format_errors > 0 {
        issues = issues.entry("Format Errors", metrics.format_errors);
    }
    if metrics.duplicates > 0 {
        issues = issues.entry("Duplicate BillIDs", metrics.duplicates);
    }
    if !metrics.warnings.is_empty() {
        issues = issues.entry("Bills with Unsupported Subpolicies", metrics.warnings.len());
    }
    report.push(issues);

    report.push(
        Section::new("💡 Recommendations").bullets(quality.recommendations.iter().map(|rec| {
            format!("{}: {} → {}", rec.priority.label(), rec.message, rec.action)
        })),
    );

    let mut failures = Section::new("❌ Export Errors (First 10)").bullets(
        errors
            .iter()
            .take(10)
            .map(|error| format!("{}: {}", error.record_ref, error.reason.summary())),
    );
    if errors.len() > 10 {
        failures = failures.paragraph(format!("... and {} more errors", errors.len() - 10));
    }
    report.push(failures);
    report
}
