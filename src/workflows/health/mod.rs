//! Periodic health check of the Bills table. Each run is compared with the
//! previous System Monitor record and persisted as a new one.

mod metrics;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::bills::BillFields;
use super::WorkflowError;
use crate::engine::{QualityPolicy, QualityReport, QualityScorer, Trend};
use crate::report::{render_plain, Report, ReportSink, Section};
use crate::store::{FieldMap, FieldValue, Filter, Query, RecordId, RecordStore};

pub use metrics::{ranked, HealthIssue, HealthMetrics, MissingBlurb};

pub const POST_IMPORT_CHECK: &str = "Post-Import";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub bills: String,
    pub monitor: String,
    pub exports: String,
    pub raw_import: String,
    pub import_batch_field: String,
    pub fields: BillFields,
    pub active_statuses: Vec<String>,
    pub needs_blurb_statuses: Vec<String>,
    /// Action type exempt from the enacted-date requirement.
    pub exempt_action_type: String,
    pub default_window_days: i64,
    /// Share of uncategorized bills above which categorizing is recommended.
    pub category_gap_ratio: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            bills: "Bills".to_string(),
            monitor: "System Monitor".to_string(),
            exports: "Website Exports".to_string(),
            raw_import: "StateNet Raw Import".to_string(),
            import_batch_field: "Import Batch".to_string(),
            fields: BillFields::default(),
            active_statuses: [
                "Introduced",
                "In First Chamber",
                "Passed First Chamber",
                "In Second Chamber",
                "Passed Both Chambers",
                "On Governor's Desk",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            needs_blurb_statuses: vec!["Enacted".to_string(), "Vetoed".to_string()],
            exempt_action_type: "Executive Order".to_string(),
            default_window_days: 7,
            category_gap_ratio: 0.05,
        }
    }
}

/// Why this check runs; a post-import check names its import batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckRequest {
    pub check_type: String,
    pub related_import: Option<String>,
}

impl Default for HealthCheckRequest {
    fn default() -> Self {
        Self {
            check_type: "Weekly".to_string(),
            related_import: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheckOutcome {
    pub record_id: Option<RecordId>,
    pub metrics: HealthMetrics,
    pub trend: Trend,
    pub quality: QualityReport,
    pub export_count: usize,
    pub last_export_date: Option<NaiveDate>,
    pub import_records: Option<usize>,
    pub report: String,
}

pub struct HealthMonitor<S> {
    store: Arc<S>,
    config: HealthConfig,
    scorer: QualityScorer,
}

impl<S> HealthMonitor<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>, config: HealthConfig, quality: QualityPolicy) -> Self {
        Self {
            store,
            config,
            scorer: QualityScorer::new(quality),
        }
    }

    pub async fn run(
        &self,
        request: &HealthCheckRequest,
        sink: &dyn ReportSink,
        now: NaiveDateTime,
    ) -> Result<HealthCheckOutcome, WorkflowError> {
        let config = &self.config;
        info!(check_type = %request.check_type, "starting system health check");

        let previous = self
            .store
            .select(
                &config.monitor,
                &Query::all()
                    .fields(["Check Date", "Last Export Date"])
                    .sort_desc("Check Date")
                    .limit(1),
            )
            .await?;
        let previous = previous.first();
        let trend = Trend::between(
            now.date(),
            previous.and_then(|record| record.date("Check Date")),
            config.default_window_days,
        );
        info!(commentary = %trend.commentary(), "comparison window resolved");

        let bills = self.store.select(&config.bills, &Query::all()).await?;
        let exports = self.store.select(&config.exports, &Query::all()).await?;

        let import_records = match (&request.related_import, request.check_type.as_str()) {
            (Some(batch), POST_IMPORT_CHECK) => {
                let rows = self
                    .store
                    .select(
                        &config.raw_import,
                        &Query::all().filter(Filter::equals(&config.import_batch_field, batch)),
                    )
                    .await?;
                info!(batch = %batch, records = rows.len(), "check linked to import batch");
                Some(rows.len())
            }
            _ => None,
        };

        let metrics = HealthMetrics::collect(&bills, config, trend.window_start());
        let quality = self.scorer.score(&metrics.aggregate()).with_trend(trend);
        let last_export_date = if exports.is_empty() {
            previous.and_then(|record| record.date("Last Export Date"))
        } else {
            Some(now.date())
        };

        let report = self.render(&metrics, &quality, exports.len(), import_records, now);
        let record = self.monitor_record(
            request,
            &metrics,
            &quality,
            exports.len(),
            last_export_date,
            &report,
            now,
        );
        let created = self.store.create(&config.monitor, vec![record]).await?;
        info!(
            bills = metrics.total,
            quality = quality.rounded_total(),
            high_priority = metrics.missing_blurbs.len(),
            "health check record created"
        );
        sink.emit(&report);

        Ok(HealthCheckOutcome {
            record_id: created.into_iter().next(),
            metrics,
            trend,
            quality,
            export_count: exports.len(),
            last_export_date,
            import_records,
            report,
        })
    }

    fn render(
        &self,
        metrics: &HealthMetrics,
        quality: &QualityReport,
        export_count: usize,
        import_records: Option<usize>,
        now: NaiveDateTime,
    ) -> String {
        let days = quality
            .trend
            .map(|trend| trend.days_since_last_check)
            .unwrap_or(self.config.default_window_days);
        let with_share = |count: usize| format!("{count} ({}%)", metrics.percent_of_total(count));
        let mut report = Report::new(format!(
            "System Health Report ({})",
            now.format("%Y-%m-%d %H:%M")
        ));

        let mut overview = Section::new("DATABASE OVERVIEW")
            .entry("Total Bills Tracked", metrics.total)
            .entry("New Bills", format!("{} (in the last {days} days)", metrics.new_bills))
            .entry(
                "Modified Bills",
                format!("{} (in the last {days} days)", metrics.recently_modified),
            )
            .entry(
                "Status Changes",
                format!("{} (in the last {days} days)", metrics.status_changes),
            )
            .entry("Latest Export", format!("{export_count} bills"));
        if let Some(count) = import_records {
            overview = overview.entry("Import Batch Records", count);
        }
        report.push(overview);

        report.push(
            Section::new("DATA QUALITY")
                .entry("Quality Score", format!("{}/100 ({})", quality.rounded_total(), quality.grade))
                .entry("Bills Missing Info", with_share(metrics.missing_info))
                .entry("Bills Missing Categories", with_share(metrics.missing_categories))
                .entry("Bills Missing Blurbs", metrics.missing_blurbs.len())
                .entry("High Priority Items", metrics.missing_blurbs.len())
                .bullets(metrics.missing_blurbs.iter().map(MissingBlurb::describe)),
        );

        let breakdown = |heading: &str, counts: &BTreeMap<String, usize>| {
            Section::new(heading).bullets(
                ranked(counts)
                    .into_iter()
                    .map(|(name, count)| format!("{name}: {}", with_share(count))),
            )
        };
        report.push(breakdown("BILL STATUS BREAKDOWN", &metrics.by_status));
        report.push(breakdown("CATEGORY BREAKDOWN", &metrics.categories));
        report.push(breakdown("INTENT BREAKDOWN", &metrics.intents));

        report.push(Section::new("POTENTIAL ISSUES").bullets(metrics.issues().iter().map(
            |issue| {
                format!(
                    "{}: {} occurrences (Examples: {})",
                    issue.kind,
                    issue.count,
                    issue.examples.join(", ")
                )
            },
        )));
        report.push(
            Section::new("NOTES")
                .bullets([format!(
                    "{}s are exempt from the enacted date requirement",
                    self.config.exempt_action_type
                )]),
        );
        report.push(
            Section::new("RECOMMENDED ACTIONS")
                .bullets(metrics.recommended_actions(self.config.category_gap_ratio)),
        );
        render_plain(&report)
    }

    #[allow(clippy::too_many_arguments)]
    fn monitor_record(
        &self,
        request: &HealthCheckRequest,
        metrics: &HealthMetrics,
        quality: &QualityReport,
        export_count: usize,
        last_export_date: Option<NaiveDate>,
        report: &str,
        now: NaiveDateTime,
    ) -> FieldMap {
        let lines = |entries: Vec<(&str, usize)>| {
            entries
                .into_iter()
                .map(|(name, count)| format!("{name}: {count}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let join = |values: &BTreeSet<String>| {
            values.iter().cloned().collect::<Vec<_>>().join(", ")
        };
        let count = |value: usize| FieldValue::number(value as f64);
        let days = quality
            .trend
            .map(|trend| trend.days_since_last_check)
            .unwrap_or(self.config.default_window_days);

        let mut fields = FieldMap::new();
        fields.insert("Check Date".into(), FieldValue::date(now.date()));
        fields.insert("Check Type".into(), FieldValue::text(&request.check_type));
        if let Some(import) = &request.related_import {
            fields.insert("Related Import".into(), FieldValue::text(import));
        }
        fields.insert("Days Since Last Check".into(), FieldValue::number(days as f64));
        fields.insert("Bills Count".into(), count(metrics.total));
        fields.insert(
            "Bills by Status".into(),
            FieldValue::text(lines(ranked(&metrics.by_status))),
        );
        fields.insert("Bills Missing Info".into(), count(metrics.missing_info));
        fields.insert("Bills Missing Categories".into(), count(metrics.missing_categories));
        fields.insert("Bills Missing Blurbs".into(), count(metrics.missing_blurbs.len()));
        fields.insert("Recently Modified".into(), count(metrics.recently_modified));
        if let Some(date) = last_export_date {
            fields.insert("Last Export Date".into(), FieldValue::date(date));
        }
        fields.insert("Export Count".into(), count(export_count));
        fields.insert("New Bills Since Last Check".into(), count(metrics.new_bills));
        fields.insert("Active States".into(), FieldValue::text(join(&metrics.active_states)));
        fields.insert("All States".into(), FieldValue::text(join(&metrics.states)));
        fields.insert(
            "Categories Coverage".into(),
            FieldValue::text(lines(ranked(&metrics.categories))),
        );
        fields.insert(
            "Status Changes Since Last Check".into(),
            count(metrics.status_changes),
        );
        fields.insert(
            "Intent Breakdown".into(),
            FieldValue::text(lines(ranked(&metrics.intents))),
        );
        fields.insert("High Priority Items".into(), count(metrics.missing_blurbs.len()));
        fields.insert(
            "Potential Issues".into(),
            FieldValue::text(metrics.potential_issues().join("\n")),
        );
        fields.insert(
            "Quality Score".into(),
            FieldValue::number(quality.rounded_total() as f64),
        );
        fields.insert("Grade".into(), FieldValue::text(&quality.grade));
        fields.insert("Detailed Report".into(), FieldValue::text(report));
        fields
    }
}
