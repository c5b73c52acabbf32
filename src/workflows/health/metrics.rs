use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use super::HealthConfig;
use crate::engine::validation::rules::StatusDateRequirement;
use crate::engine::{AggregateMetrics, DuplicateIndex};
use crate::store::Record;

/// A final-status bill that still has no website blurb.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingBlurb {
    pub bill: String,
    pub last_action: Option<String>,
}

impl MissingBlurb {
    pub fn describe(&self) -> String {
        format!(
            "{} (Last action: {})",
            self.bill,
            self.last_action.as_deref().unwrap_or("Unknown")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthIssue {
    pub kind: String,
    pub count: usize,
    pub examples: Vec<String>,
}

/// Snapshot statistics over the Bills table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthMetrics {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub missing_info: usize,
    pub missing_categories: usize,
    pub needing_blurbs: usize,
    pub missing_blurbs: Vec<MissingBlurb>,
    pub recently_modified: usize,
    pub new_bills: usize,
    pub status_changes: usize,
    pub states: BTreeSet<String>,
    pub active_states: BTreeSet<String>,
    pub categories: BTreeMap<String, usize>,
    pub intents: BTreeMap<String, usize>,
    pub inconsistent: Vec<String>,
    pub duplicates: Vec<String>,
}

/// Highest count first; ties keep name order.
pub fn ranked(counts: &BTreeMap<String, usize>) -> Vec<(&str, usize)> {
    let mut entries: Vec<(&str, usize)> = counts
        .iter()
        .map(|(name, count)| (name.as_str(), *count))
        .collect();
    entries.sort_by(|left, right| right.1.cmp(&left.1));
    entries
}

fn since(record: &Record, field: &str, window_start: NaiveDate) -> bool {
    record
        .date(field)
        .map(|date| date >= window_start)
        .unwrap_or(false)
}

impl HealthMetrics {
    pub fn collect(bills: &[Record], config: &HealthConfig, window_start: NaiveDate) -> Self {
        let fields = &config.fields;
        let enacted_date = StatusDateRequirement::new(&fields.status, "Enacted", &fields.enacted)
            .exempt_when(&fields.action_type, &config.exempt_action_type);
        let mut metrics = Self {
            total: bills.len(),
            ..Self::default()
        };

        for bill in bills {
            let status = fields.status(bill);
            *metrics
                .by_status
                .entry(status.clone().unwrap_or_else(|| "No Status".to_string()))
                .or_default() += 1;

            if fields.identity().iter().any(|field| !bill.is_present(field)) {
                metrics.missing_info += 1;
            }

            let categories = bill.names(&fields.categories);
            if categories.is_empty() {
                metrics.missing_categories += 1;
            }
            for category in categories {
                *metrics.categories.entry(category).or_default() += 1;
            }
            for intent in bill.names(&fields.intent) {
                *metrics.intents.entry(intent).or_default() += 1;
            }

            let needs_blurb = status
                .as_ref()
                .map(|status| config.needs_blurb_statuses.contains(status))
                .unwrap_or(false);
            if needs_blurb {
                metrics.needing_blurbs += 1;
                if !bill.is_present(&fields.website_blurb) {
                    metrics.missing_blurbs.push(MissingBlurb {
                        bill: fields.descriptor(bill),
                        last_action: bill.present_text(&fields.last_action),
                    });
                }
            }

            if since(bill, &fields.last_updated, window_start) {
                metrics.recently_modified += 1;
            }
            if since(bill, &fields.import_date, window_start) {
                metrics.new_bills += 1;
            }
            if since(bill, &fields.last_action, window_start) {
                metrics.status_changes += 1;
            }

            if let Some(state) = bill.present_text(&fields.state) {
                let active = status
                    .as_ref()
                    .map(|status| config.active_statuses.contains(status))
                    .unwrap_or(false);
                if active {
                    metrics.active_states.insert(state.clone());
                }
                metrics.states.insert(state);
            }

            if enacted_date.is_violated_by(bill) {
                metrics.inconsistent.push(fields.descriptor(bill));
            }
        }

        let duplicates = DuplicateIndex::build(bills, fields.identity());
        metrics.duplicates = duplicates
            .entries()
            .iter()
            .filter_map(|entry| bills.iter().find(|bill| bill.id == entry.duplicate))
            .map(|bill| fields.descriptor(bill))
            .collect();
        metrics
    }

    /// Input to the shared quality scorer. Completeness blends required-field
    /// completeness with blurb coverage of final-status bills.
    pub fn aggregate(&self) -> AggregateMetrics {
        AggregateMetrics {
            total_records: self.total,
            complete_records: self.total - self.missing_info,
            fidelity_expected: self.needing_blurbs,
            fidelity_delivered: self.needing_blurbs - self.missing_blurbs.len(),
            date_errors: self.inconsistent.len(),
            format_errors: 0,
            duplicates: self.duplicates.len(),
            coverage: self.states.len(),
        }
    }

    pub fn percent_of_total(&self, count: usize) -> i64 {
        if self.total == 0 {
            0
        } else {
            (count as f64 / self.total as f64 * 100.0).round() as i64
        }
    }

    pub fn issues(&self) -> Vec<HealthIssue> {
        let mut issues = Vec::new();
        if !self.inconsistent.is_empty() {
            issues.push(HealthIssue {
                kind: "Status Date Inconsistency".to_string(),
                count: self.inconsistent.len(),
                examples: self.inconsistent.iter().take(3).cloned().collect(),
            });
        }
        if !self.duplicates.is_empty() {
            issues.push(HealthIssue {
                kind: "Duplicate Bills".to_string(),
                count: self.duplicates.len(),
                examples: self.duplicates.iter().take(3).cloned().collect(),
            });
        }
        issues
    }

    /// One line per issue, as stored in the monitor record.
    pub fn potential_issues(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.inconsistent.is_empty() {
            lines.push(format!(
                "{} bills have status/date inconsistencies",
                self.inconsistent.len()
            ));
        }
        if !self.duplicates.is_empty() {
            lines.push(format!("{} duplicate bill IDs found", self.duplicates.len()));
        }
        lines
    }

    pub fn recommended_actions(&self, category_gap_ratio: f64) -> Vec<String> {
        let mut actions = Vec::new();
        if !self.missing_blurbs.is_empty() {
            actions.push(format!(
                "Add website blurbs to {} enacted/vetoed bills",
                self.missing_blurbs.len()
            ));
        }
        if self.missing_categories as f64 > self.total as f64 * category_gap_ratio {
            actions.push(format!(
                "Assign categories to {} uncategorized bills",
                self.missing_categories
            ));
        }
        if self.missing_info > 0 {
            actions.push(format!(
                "Complete basic information for {} bills with missing required fields",
                self.missing_info
            ));
        }
        if !self.duplicates.is_empty() {
            actions.push("Review and resolve duplicate bills found in the database".to_string());
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FieldValue, RecordId};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).expect("valid date")
    }

    fn bill(id: &str, state: &str, number: f64, status: &str) -> Record {
        Record::new(RecordId::from(id))
            .with_field("State", FieldValue::choice(state))
            .with_field("BillType", FieldValue::choice("HB"))
            .with_field("BillNumber", FieldValue::number(number))
            .with_field("Current Bill Status", FieldValue::choice(status))
            .with_field("Policy Categories", FieldValue::choices(["Abortion"]))
    }

    #[test]
    fn executive_orders_are_exempt_from_the_enacted_date_check() {
        let bills = vec![
            bill("r1", "TX", 1.0, "Enacted"),
            bill("r2", "TX", 2.0, "Enacted")
                .with_field("Action Type", FieldValue::choices(["Executive Order"])),
            bill("r3", "OH", 3.0, "Enacted").with_field("Enacted Date", FieldValue::date(day(1))),
        ];

        let metrics = HealthMetrics::collect(&bills, &HealthConfig::default(), day(1));

        assert_eq!(metrics.inconsistent, vec!["TX-HB1".to_string()]);
        assert_eq!(metrics.needing_blurbs, 3);
        assert_eq!(metrics.missing_blurbs.len(), 3);
        assert_eq!(
            metrics.missing_blurbs[0].describe(),
            "TX-HB1 (Last action: Unknown)"
        );
    }

    #[test]
    fn window_counts_include_the_window_start() {
        let bills = vec![
            bill("r1", "TX", 1.0, "Introduced")
                .with_field("Last Updated", FieldValue::date(day(8)))
                .with_field("Import Date", FieldValue::date(day(7))),
            bill("r2", "TX", 2.0, "Introduced").with_field("Last Updated", FieldValue::date(day(6))),
        ];

        let metrics = HealthMetrics::collect(&bills, &HealthConfig::default(), day(7));

        assert_eq!(metrics.recently_modified, 1);
        assert_eq!(metrics.new_bills, 1);
        assert_eq!(metrics.active_states.len(), 1);
    }

    #[test]
    fn duplicates_and_gaps_drive_recommended_actions() {
        let mut uncategorized = bill("r3", "OH", 9.0, "Dead");
        uncategorized.set("Policy Categories", FieldValue::List(Vec::new()));
        let bills = vec![
            bill("r1", "TX", 1.0, "Introduced"),
            bill("r2", "TX", 1.0, "Introduced"),
            uncategorized,
        ];

        let metrics = HealthMetrics::collect(&bills, &HealthConfig::default(), day(1));
        let actions = metrics.recommended_actions(0.05);

        assert_eq!(metrics.duplicates, vec!["TX-HB1".to_string()]);
        assert_eq!(
            actions,
            vec![
                "Assign categories to 1 uncategorized bills".to_string(),
                "Review and resolve duplicate bills found in the database".to_string(),
            ]
        );
        assert_eq!(metrics.aggregate().complete_records, 3);
    }
}
