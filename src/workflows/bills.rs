use serde::{Deserialize, Serialize};

use crate::store::Record;

/// Field names of the Bills table, shared by every bill workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillFields {
    pub bill_id: String,
    pub state: String,
    pub bill_type: String,
    pub bill_number: String,
    pub status: String,
    pub status_history: String,
    pub history: String,
    pub last_action: String,
    pub last_updated: String,
    pub import_date: String,
    pub intent: String,
    pub categories: String,
    pub specific_policies: String,
    pub action_type: String,
    pub website_blurb: String,
    pub description: String,
    pub introduced: String,
    pub passed_first_chamber: String,
    pub passed_legislature: String,
    pub vetoed: String,
    pub enacted: String,
    pub date_validation: String,
    pub review_status: String,
    pub review_notes: String,
    pub ready_for_website: String,
}

impl Default for BillFields {
    fn default() -> Self {
        Self {
            bill_id: "BillID".to_string(),
            state: "State".to_string(),
            bill_type: "BillType".to_string(),
            bill_number: "BillNumber".to_string(),
            status: "Current Bill Status".to_string(),
            status_history: "Bill Status History".to_string(),
            history: "History".to_string(),
            last_action: "Last Action".to_string(),
            last_updated: "Last Updated".to_string(),
            import_date: "Import Date".to_string(),
            intent: "Intent".to_string(),
            categories: "Policy Categories".to_string(),
            specific_policies: "Specific Policies".to_string(),
            action_type: "Action Type".to_string(),
            website_blurb: "Website Blurb".to_string(),
            description: "Description".to_string(),
            introduced: "Introduction Date".to_string(),
            passed_first_chamber: "Passed 1 Chamber Date".to_string(),
            passed_legislature: "Passed Legislature Date".to_string(),
            vetoed: "Vetoed Date".to_string(),
            enacted: "Enacted Date".to_string(),
            date_validation: "Date Validation".to_string(),
            review_status: "Review Status".to_string(),
            review_notes: "Review Notes".to_string(),
            ready_for_website: "Ready for Website".to_string(),
        }
    }
}

impl BillFields {
    /// State, type and number: the fields a bill cannot be published without.
    pub fn identity(&self) -> [&str; 3] {
        [&self.state, &self.bill_type, &self.bill_number]
    }

    fn part(&self, record: &Record, field: &str) -> String {
        record.present_text(field).unwrap_or_default()
    }

    pub fn status(&self, record: &Record) -> Option<String> {
        record.present_text(&self.status)
    }

    /// `TX-HB100`, with `Unknown` standing in for a missing state.
    pub fn descriptor(&self, record: &Record) -> String {
        let state = record
            .present_text(&self.state)
            .unwrap_or_else(|| "Unknown".to_string());
        format!(
            "{state}-{}{}",
            self.part(record, &self.bill_type),
            self.part(record, &self.bill_number)
        )
    }

    /// The BillID when set, otherwise the descriptor.
    pub fn reference(&self, record: &Record) -> String {
        record
            .present_text(&self.bill_id)
            .unwrap_or_else(|| self.descriptor(record))
    }

    /// `TX HB100`, the form reviewers see in status notifications.
    pub fn label(&self, record: &Record) -> String {
        format!(
            "{} {}{}",
            self.part(record, &self.state),
            self.part(record, &self.bill_type),
            self.part(record, &self.bill_number)
        )
    }
}
