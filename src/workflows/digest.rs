//! Bi-weekly partner e-mail: bills that reached a milestone inside the
//! window, grouped by intent.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::bills::BillFields;
use super::WorkflowError;
use crate::store::{Query, Record, RecordStore};

pub const NO_ACTIVITY: &str = "No legislative activity to report in the past two weeks.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub table: String,
    pub fields: BillFields,
    pub window_days: i64,
    pub positive_intents: Vec<String>,
    pub restrictive_intents: Vec<String>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            table: "Bills".to_string(),
            fields: BillFields::default(),
            window_days: 14,
            positive_intents: vec!["Positive".to_string(), "Protective".to_string()],
            restrictive_intents: vec!["Restrictive".to_string()],
        }
    }
}

/// Legislative milestones, most significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    Enacted,
    Vetoed,
    PassedLegislature,
    PassedFirstChamber,
}

impl Milestone {
    pub const ALL: [Milestone; 4] = [
        Self::Enacted,
        Self::Vetoed,
        Self::PassedLegislature,
        Self::PassedFirstChamber,
    ];

    pub const fn phrase(self) -> &'static str {
        match self {
            Self::Enacted => "was enacted",
            Self::Vetoed => "was vetoed",
            Self::PassedLegislature => "passed the legislature",
            Self::PassedFirstChamber => "passed the first chamber",
        }
    }

    fn field(self, fields: &BillFields) -> &str {
        match self {
            Self::Enacted => &fields.enacted,
            Self::Vetoed => &fields.vetoed,
            Self::PassedLegislature => &fields.passed_legislature,
            Self::PassedFirstChamber => &fields.passed_first_chamber,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestEntry {
    pub bill: String,
    pub milestone: Milestone,
    pub date: NaiveDate,
    pub blurb: String,
}

impl DigestEntry {
    pub fn headline(&self) -> String {
        format!(
            "{} {} on {}.",
            self.bill,
            self.milestone.phrase(),
            self.date.format("%m/%d")
        )
    }

    pub fn text(&self) -> String {
        format!("{}\n{}", self.headline(), self.blurb)
    }

    fn html(&self) -> String {
        let rest = self
            .blurb
            .lines()
            .map(escape_html)
            .collect::<Vec<_>>()
            .join("<br>");
        format!("<p><u>{}</u><br>{rest}</p>", escape_html(&self.headline()))
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Digest {
    pub window_start: Option<NaiveDate>,
    pub positive: Vec<DigestEntry>,
    pub restrictive: Vec<DigestEntry>,
    /// Records with no milestone in the window and at least one milestone
    /// date that could not be read.
    pub skipped: Vec<String>,
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.restrictive.is_empty()
    }

    fn sections(&self) -> impl Iterator<Item = (&'static str, &[DigestEntry])> {
        [
            ("Positive", self.positive.as_slice()),
            ("Restrictive", self.restrictive.as_slice()),
        ]
        .into_iter()
        .filter(|(_, entries)| !entries.is_empty())
    }

    pub fn text(&self) -> String {
        if self.is_empty() {
            return NO_ACTIVITY.to_string();
        }
        let sections: Vec<String> = self
            .sections()
            .map(|(title, entries)| {
                let entries: Vec<String> = entries.iter().map(DigestEntry::text).collect();
                format!("*{title}*\n\n{}", entries.join("\n\n"))
            })
            .collect();
        format!("Bi-Weekly Legislative Update\n\n{}", sections.join("\n\n"))
    }

    pub fn html(&self) -> String {
        if self.is_empty() {
            return format!("<html><body><p>{NO_ACTIVITY}</p></body></html>");
        }
        let mut body = String::from("<html><body>");
        for (title, entries) in self.sections() {
            body.push_str(&format!("<p><strong><em>{title}</em></strong></p>"));
            for entry in entries {
                body.push_str(&entry.html());
            }
        }
        body.push_str("</body></html>");
        body
    }
}

pub struct PartnerDigest<S> {
    store: Arc<S>,
    config: DigestConfig,
}

impl<S> PartnerDigest<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>, config: DigestConfig) -> Self {
        Self { store, config }
    }

    pub async fn run(&self, today: NaiveDate) -> Result<Digest, WorkflowError> {
        let bills = self.store.select(&self.config.table, &Query::all()).await?;
        let digest = self.compile(&bills, today);
        info!(
            positive = digest.positive.len(),
            restrictive = digest.restrictive.len(),
            skipped = digest.skipped.len(),
            "partner digest compiled"
        );
        Ok(digest)
    }

    pub fn compile(&self, bills: &[Record], today: NaiveDate) -> Digest {
        let window_start = Duration::try_days(self.config.window_days)
            .and_then(|window| today.checked_sub_signed(window))
            .unwrap_or(NaiveDate::MIN);
        debug!(%window_start, "checking for actions");
        let mut digest = Digest {
            window_start: Some(window_start),
            ..Digest::default()
        };

        for bill in bills {
            let (reached, unreadable) = self.milestone_for(bill, window_start);
            let Some((milestone, date)) = reached else {
                if !unreadable.is_empty() {
                    warn!(record = %bill.id, fields = ?unreadable, "milestone dates could not be read");
                    digest.skipped.push(bill.id.to_string());
                }
                continue;
            };
            let entry = self.entry(bill, milestone, date);
            let intents = bill.names(&self.config.fields.intent);
            let has_any = |wanted: &[String]| intents.iter().any(|intent| wanted.contains(intent));
            if has_any(&self.config.positive_intents) {
                digest.positive.push(entry);
            } else if has_any(&self.config.restrictive_intents) {
                digest.restrictive.push(entry);
            }
        }
        digest
    }

    /// The most significant milestone reached inside the window. A value
    /// that is not a date counts as not reached; its field is reported.
    fn milestone_for(
        &self,
        bill: &Record,
        window_start: NaiveDate,
    ) -> (Option<(Milestone, NaiveDate)>, Vec<&str>) {
        let mut unreadable = Vec::new();
        for milestone in Milestone::ALL {
            let field = milestone.field(&self.config.fields);
            let Some(value) = bill.get(field).filter(|value| value.is_present()) else {
                continue;
            };
            match value.as_date() {
                Some(date) if date >= window_start => return (Some((milestone, date)), unreadable),
                Some(_) => {}
                None => unreadable.push(field),
            }
        }
        (None, unreadable)
    }

    fn entry(&self, bill: &Record, milestone: Milestone, date: NaiveDate) -> DigestEntry {
        let fields = &self.config.fields;
        let part = |field: &str| bill.present_text(field).unwrap_or_default();
        let state = bill
            .present_text(&fields.state)
            .unwrap_or_else(|| "Unknown".to_string());
        let blurb = bill
            .present_text(&fields.website_blurb)
            .or_else(|| bill.present_text(&fields.description))
            .unwrap_or_else(|| "No description available".to_string());
        DigestEntry {
            bill: format!(
                "{state} {} {}",
                part(&fields.bill_type),
                part(&fields.bill_number)
            ),
            milestone,
            date,
            blurb,
        }
    }
}
