//! Flags bills whose status or recent history needs a reviewer's attention.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::bills::BillFields;
use super::WorkflowError;
use crate::engine::{WriteConfig, WriteSummary};
use crate::report::ReportSink;
use crate::store::{FieldMap, FieldValue, Query, Record, RecordStore, RecordUpdate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub table: String,
    pub fields: BillFields,
    pub critical_statuses: Vec<String>,
    /// Critical statuses that also need a website blurb before publishing.
    pub website_statuses: Vec<String>,
    pub review_statuses: Vec<String>,
    /// Matched case-insensitively against the first line of History.
    pub significant_actions: Vec<String>,
    pub needs_review: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        let owned = |items: &[&str]| -> Vec<String> {
            items.iter().map(|item| item.to_string()).collect()
        };
        Self {
            table: "Bills".to_string(),
            fields: BillFields::default(),
            critical_statuses: owned(&["Enacted", "Vetoed", "Dead"]),
            website_statuses: owned(&["Enacted", "Vetoed"]),
            review_statuses: owned(&[
                "Passed First Chamber",
                "Passed Second Chamber",
                "On Govs Desk",
            ]),
            significant_actions: owned(&[
                "amended",
                "substituted",
                "chapter no",
                "signed by gov",
                "veto override",
                "conference committee",
            ]),
            needs_review: "Needs Review".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Critical,
    Action,
    Review,
}

impl ChangeKind {
    pub const fn heading(self) -> &'static str {
        match self {
            Self::Critical => "🚨 **Critical Updates Needed**",
            Self::Action => "📝 **Significant Actions**",
            Self::Review => "👀 **Review Needed**",
        }
    }
}

/// One reason a bill was flagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub kind: ChangeKind,
    pub bill: String,
    pub status: Option<String>,
    pub message: String,
    /// Text written to the review notes for this trigger.
    pub note: String,
}

impl StatusChange {
    fn describe(&self) -> String {
        match (&self.kind, &self.status) {
            (ChangeKind::Action, _) | (_, None) => format!("{}: {}", self.bill, self.message),
            (_, Some(status)) => format!("{} ({status}): {}", self.bill, self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRun {
    pub scanned: usize,
    pub changes: Vec<StatusChange>,
    pub write: WriteSummary,
}

impl StatusRun {
    pub fn flagged(&self) -> usize {
        self.write.requested
    }

    pub fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &StatusChange> {
        self.changes.iter().filter(move |change| change.kind == kind)
    }

    pub fn summary(&self) -> String {
        if self.changes.is_empty() {
            return "**No significant changes detected**".to_string();
        }
        let mut groups = Vec::new();
        for kind in [ChangeKind::Critical, ChangeKind::Action, ChangeKind::Review] {
            let lines: Vec<String> = self
                .of_kind(kind)
                .map(|change| format!("- {}", change.describe()))
                .collect();
            if !lines.is_empty() {
                groups.push(format!("{}\n{}\n", kind.heading(), lines.join("\n")));
            }
        }
        format!("**Status Change Detection Summary**\n\n{}", groups.join("\n"))
    }
}

pub struct StatusDetector<S> {
    store: Arc<S>,
    config: StatusConfig,
    write: WriteConfig,
}

impl<S> StatusDetector<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>, config: StatusConfig, write: WriteConfig) -> Self {
        Self {
            store,
            config,
            write,
        }
    }

    /// Every trigger a bill hits, in critical, action, review order.
    pub fn changes_for(&self, bill: &Record) -> Vec<StatusChange> {
        let config = &self.config;
        let fields = &config.fields;
        let label = fields.label(bill);
        let status = fields.status(bill);
        let mut changes = Vec::new();

        if let Some(current) = status.as_ref() {
            let needs_blurb = config.critical_statuses.contains(current)
                && config.website_statuses.contains(current)
                && !bill.is_present(&fields.ready_for_website);
            if needs_blurb {
                changes.push(StatusChange {
                    kind: ChangeKind::Critical,
                    bill: label.clone(),
                    status: Some(current.clone()),
                    message: "Needs website update".to_string(),
                    note: format!("{current}: Needs website blurb"),
                });
            }
        }

        let history = bill.display(&fields.history).unwrap_or_default();
        let recent = history.lines().next().unwrap_or_default().trim();
        let lowered = recent.to_lowercase();
        if config
            .significant_actions
            .iter()
            .any(|action| lowered.contains(&action.to_lowercase()))
        {
            changes.push(StatusChange {
                kind: ChangeKind::Action,
                bill: label.clone(),
                status: status.clone(),
                message: recent.to_string(),
                note: format!("Action: {recent}"),
            });
        }

        let status_history = bill.display(&fields.status_history).unwrap_or_default();
        if config
            .review_statuses
            .iter()
            .any(|review| status_history.contains(review.as_str()))
        {
            changes.push(StatusChange {
                kind: ChangeKind::Review,
                bill: label,
                status: status.clone(),
                message: "Chamber movement detected".to_string(),
                note: format!("Movement: {}", status.unwrap_or_default()),
            });
        }
        changes
    }

    /// One merged update per flagged bill: the review flag plus a timestamped
    /// note line per trigger.
    fn review_update(
        &self,
        bill: &Record,
        changes: &[StatusChange],
        now: NaiveDateTime,
    ) -> RecordUpdate {
        let stamp = now.format("%Y-%m-%d %H:%M:%S");
        let notes = changes
            .iter()
            .map(|change| format!("[{stamp}] {}", change.note))
            .collect::<Vec<_>>()
            .join("\n");
        let mut fields = FieldMap::new();
        fields.insert(
            self.config.fields.review_status.clone(),
            FieldValue::choice(&self.config.needs_review),
        );
        fields.insert(self.config.fields.review_notes.clone(), FieldValue::text(notes));
        RecordUpdate {
            id: bill.id.clone(),
            fields,
        }
    }

    pub async fn run(
        &self,
        sink: &dyn ReportSink,
        now: NaiveDateTime,
    ) -> Result<StatusRun, WorkflowError> {
        sink.emit("**Starting Status Change Detection**");
        let bills = self.store.select(&self.config.table, &Query::all()).await?;

        let mut changes = Vec::new();
        let mut updates = Vec::new();
        for bill in &bills {
            let found = self.changes_for(bill);
            if found.is_empty() {
                continue;
            }
            updates.push(self.review_update(bill, &found, now));
            changes.extend(found);
        }

        let write = self
            .write
            .writer(self.store.as_ref(), self.config.table.clone())
            .update_all(updates)
            .await;
        if let Some(failure) = &write.failure {
            warn!(
                chunk = failure.chunk_index,
                unwritten = write.unwritten(),
                "review flags partially written"
            );
            sink.emit(&format!(
                "⚠️ **Error updating records:** {} of {} updates were not written",
                write.unwritten(),
                write.requested
            ));
        }

        let run = StatusRun {
            scanned: bills.len(),
            changes,
            write,
        };
        info!(
            scanned = run.scanned,
            flagged = run.flagged(),
            written = run.write.written,
            "status change detection complete"
        );
        sink.emit(&run.summary());
        Ok(run)
    }
}
