use std::collections::BTreeSet;

use serde::Serialize;
use tracing::info;

use super::ExportConfig;
use crate::engine::DuplicateIndex;
use crate::report::{PromptOption, Report, Section};
use crate::store::{Filter, Query, Record, RecordStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    FutureDates,
    MissingRequiredFields,
    DuplicateIds,
    MissingDescriptions,
}

impl IssueKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::FutureDates => "🚫 Future Date Issues",
            Self::MissingRequiredFields => "📋 Missing Required Fields",
            Self::DuplicateIds => "🔁 Duplicate BillIDs Found",
            Self::MissingDescriptions => "📝 Website Descriptions Status",
        }
    }

    /// Critical issues require operator confirmation before anything is written.
    pub const fn is_critical(self) -> bool {
        !matches!(self, Self::MissingDescriptions)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreflightIssue {
    pub kind: IssueKind,
    pub count: usize,
    pub impact: String,
    pub examples: Vec<String>,
    /// Per-field counts, for missing required fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub states_affected: Vec<String>,
}

impl PreflightIssue {
    fn new(kind: IssueKind, count: usize, impact: impl Into<String>) -> Self {
        Self {
            kind,
            count,
            impact: impact.into(),
            examples: Vec::new(),
            breakdown: None,
            states_affected: Vec::new(),
        }
    }
}

/// Whole-table checks run before an export touches the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Preflight {
    pub issues: Vec<PreflightIssue>,
}

impl Preflight {
    pub async fn run<S>(
        store: &S,
        config: &ExportConfig,
        bills: &[Record],
        duplicates: &DuplicateIndex,
    ) -> Result<Self, StoreError>
    where
        S: RecordStore + ?Sized,
    {
        let fields = &config.fields;
        let mut issues = Vec::new();

        let flagged = store
            .select(
                &config.source,
                &Query::all()
                    .fields([&fields.bill_id, &fields.date_validation, &fields.state])
                    .filter(Filter::contains(&fields.date_validation, &config.date_flag_marker)),
            )
            .await?;
        if !flagged.is_empty() {
            let mut issue = PreflightIssue::new(
                IssueKind::FutureDates,
                flagged.len(),
                "Bills have future dates that need to be corrected",
            );
            issue.examples = flagged
                .iter()
                .take(config.date_issue_examples)
                .map(|record| {
                    format!(
                        "{}: {}",
                        fields.reference(record),
                        record.display(&fields.date_validation).unwrap_or_default()
                    )
                })
                .collect();
            issues.push(issue);
        }

        let final_status = Filter::Any(
            config
                .final_statuses
                .iter()
                .map(|status| Filter::equals(&fields.status, status))
                .collect(),
        );
        let undescribed = store
            .select(
                &config.source,
                &Query::all()
                    .fields([&fields.bill_id, &fields.status, &fields.state])
                    .filter(Filter::All(vec![
                        final_status,
                        Filter::blank(&fields.website_blurb),
                    ])),
            )
            .await?;
        if !undescribed.is_empty() {
            let mut issue = PreflightIssue::new(
                IssueKind::MissingDescriptions,
                undescribed.len(),
                "Standard - most bills export without descriptions",
            );
            let states: BTreeSet<String> = undescribed
                .iter()
                .filter_map(|record| record.present_text(&fields.state))
                .collect();
            issue.states_affected = states.into_iter().collect();
            issues.push(issue);
        }

        let incomplete = store
            .select(
                &config.source,
                &Query::all()
                    .fields([
                        &fields.bill_id,
                        &fields.state,
                        &fields.bill_type,
                        &fields.bill_number,
                    ])
                    .filter(Filter::Any(
                        fields.identity().into_iter().map(Filter::blank).collect(),
                    )),
            )
            .await?;
        if !incomplete.is_empty() {
            issues.push(missing_fields_issue(&incomplete, config));
        }

        if !duplicates.is_empty() {
            let mut issue = PreflightIssue::new(
                IssueKind::DuplicateIds,
                duplicates.len(),
                "Only first instance will be exported",
            );
            issue.examples = duplicates
                .entries()
                .iter()
                .filter_map(|entry| bills.iter().find(|bill| bill.id == entry.duplicate))
                .take(config.duplicate_examples)
                .map(|bill| format!("{} ({})", fields.reference(bill), fields.descriptor(bill)))
                .collect();
            issues.push(issue);
        }

        let preflight = Self { issues };
        info!(
            critical = preflight.critical().count(),
            issues = preflight.issues.len(),
            "preflight validation finished"
        );
        Ok(preflight)
    }

    pub fn critical(&self) -> impl Iterator<Item = &PreflightIssue> {
        self.issues.iter().filter(|issue| issue.kind.is_critical())
    }

    pub fn has_critical(&self) -> bool {
        self.critical().next().is_some()
    }

    pub fn confirmation_message(&self) -> String {
        let mut message = String::from("🚨 CRITICAL ISSUES FOUND:\n\n");
        for issue in self.critical() {
            let noun = if issue.count == 1 { "record" } else { "records" };
            message.push_str(&format!(
                "❌ {}: {} {noun}\n   Impact: {}\n\n",
                issue.kind.label(),
                issue.count,
                issue.impact
            ));
        }
        message.push_str("Do you want to continue with the export despite these critical issues?");
        message
    }

    pub fn options() -> [PromptOption; 2] {
        [
            PromptOption::new("✅ Continue Anyway", true),
            PromptOption::new("❌ Cancel Export", false),
        ]
    }

    pub fn to_report(&self) -> Report {
        let mut report = Report::new("🔍 Pre-flight Validation");
        for issue in &self.issues {
            let mut section = Section::new(issue.kind.label())
                .entry("Count", format!("{} records", issue.count))
                .entry(
                    if issue.kind.is_critical() { "Impact" } else { "Status" },
                    &issue.impact,
                );
            if let Some(breakdown) = &issue.breakdown {
                section = section.entry("Missing fields breakdown", breakdown);
            }
            if !issue.states_affected.is_empty() {
                section = section.entry("States affected", issue.states_affected.join(", "));
            }
            report.push(section.bullets(issue.examples.iter().cloned()));
        }
        if !self.has_critical() {
            report.push(
                Section::new("✅ Ready to Export")
                    .paragraph("No critical issues found. Ready to export!"),
            );
        }
        report
    }
}

fn missing_fields_issue(incomplete: &[Record], config: &ExportConfig) -> PreflightIssue {
    let fields = &config.fields;
    let mut breakdown = Vec::new();
    let mut examples = Vec::new();
    let mut count = 0;

    for field in fields.identity() {
        let missing: Vec<String> = incomplete
            .iter()
            .filter(|record| !record.is_present(field))
            .map(|record| {
                record
                    .present_text(&fields.bill_id)
                    .unwrap_or_else(|| "Unknown".to_string())
            })
            .collect();
        if missing.is_empty() {
            continue;
        }
        count += missing.len();
        breakdown.push(format!("{field}: {} bills", missing.len()));
        examples.extend(missing.into_iter().map(|bill| format!("{bill}: Missing {field}")));
    }

    let mut issue = PreflightIssue::new(
        IssueKind::MissingRequiredFields,
        count,
        format!("{count} bills missing critical fields will fail to export"),
    );
    issue.breakdown = Some(breakdown.join(", "));
    issue.examples = examples;
    issue
}
