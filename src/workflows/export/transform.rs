use chrono::NaiveDate;

use super::metrics::{ExportMetrics, ExportWarning};
use super::ExportConfig;
use crate::store::{FieldMap, FieldValue, Record};

/// Collapse runs of whitespace, including line breaks and tabs, to one space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Supported subpolicies in their original order, plus the ones removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subpolicies {
    pub kept: Vec<String>,
    pub unsupported: Vec<String>,
}

pub fn split_subpolicies(names: Vec<String>, unsupported: &[String]) -> Subpolicies {
    let mut result = Subpolicies::default();
    for name in names {
        let name = collapse_whitespace(&name);
        if name.is_empty() {
            continue;
        }
        if unsupported.contains(&name) {
            result.unsupported.push(name);
        } else {
            result.kept.push(name);
        }
    }
    result
}

fn flag(value: bool) -> FieldValue {
    FieldValue::text(if value { "1" } else { "0" })
}

/// Reads an optional date cell. Text that is not a date fails the row.
fn optional_date(record: &Record, field: &str) -> Result<Option<NaiveDate>, String> {
    match record.get(field).filter(|value| value.is_present()) {
        None => Ok(None),
        Some(value) => value
            .as_date()
            .map(Some)
            .ok_or_else(|| format!("{field} is not a valid date: {}", value.display())),
    }
}

fn date_cell(date: Option<NaiveDate>) -> FieldValue {
    date.map(FieldValue::date)
        .unwrap_or_else(|| FieldValue::text(""))
}

/// Build one website row from a validated bill and update the run metrics.
pub fn transform_bill(
    record: &Record,
    config: &ExportConfig,
    metrics: &mut ExportMetrics,
) -> Result<FieldMap, String> {
    let fields = &config.fields;
    let state = record.present_text(&fields.state).unwrap_or_default();
    let bill_type = record.present_text(&fields.bill_type).unwrap_or_default();
    let bill_number = record.present_text(&fields.bill_number).unwrap_or_default();

    let dated = (|| {
        Ok::<_, String>([
            ("Last Action Date", optional_date(record, &fields.last_action)?),
            ("IntroducedDate", optional_date(record, &fields.introduced)?),
            (
                "Passed1ChamberDate",
                optional_date(record, &fields.passed_first_chamber)?,
            ),
            (
                "PassedLegislature",
                optional_date(record, &fields.passed_legislature)?,
            ),
            ("VetoedDate", optional_date(record, &fields.vetoed)?),
            ("EnactedDate", optional_date(record, &fields.enacted)?),
        ])
    })();
    let dates = match dated {
        Ok(dates) => dates,
        Err(message) => {
            metrics.format_errors += 1;
            return Err(message);
        }
    };

    let source_blurb = record.present_text(&fields.website_blurb);
    let blurb = source_blurb
        .as_deref()
        .map(collapse_whitespace)
        .unwrap_or_default();
    if source_blurb.is_some() {
        metrics.source_blurbs += 1;
        if !blurb.is_empty() {
            metrics.exported_blurbs += 1;
        }
    }

    let intents = record.names(&fields.intent);
    let has_intent = |word: &str| intents.iter().any(|intent| intent.contains(word));
    let (positive, neutral, restrictive) = (
        has_intent("Positive"),
        has_intent("Neutral"),
        has_intent("Restrictive"),
    );
    metrics.intent.record(positive, neutral, restrictive);

    let actions = record.names(&fields.action_type);
    let has_action = |name: &str| actions.iter().any(|action| action == name);

    let subpolicies = split_subpolicies(
        record.names(&fields.specific_policies),
        &config.unsupported_subpolicies,
    );
    metrics.policies.extend(subpolicies.kept.iter().cloned());
    if !subpolicies.unsupported.is_empty() {
        metrics.warnings.push(ExportWarning {
            kind: "Unsupported Subpolicy".to_string(),
            bill: format!("{state}-{bill_type}{bill_number}"),
            policies: subpolicies.unsupported.clone(),
        });
    }
    if !state.is_empty() {
        metrics.states.insert(state.clone());
    }

    let mut row = FieldMap::new();
    row.insert("State".to_string(), FieldValue::text(state));
    row.insert("BillType".to_string(), FieldValue::text(bill_type));
    row.insert("BillNumber".to_string(), FieldValue::text(bill_number));
    row.insert("Ballot Initiative".to_string(), flag(has_action("Ballot Initiative")));
    row.insert("Court Case".to_string(), flag(has_action("Court Case")));
    for slot in 0..config.subpolicy_slots {
        let value = subpolicies.kept.get(slot).cloned().unwrap_or_default();
        row.insert(format!("Subpolicy{}", slot + 1), FieldValue::text(value));
    }
    row.insert("WebsiteBlurb".to_string(), FieldValue::text(blurb));

    let is_set = |name: &str| {
        dates
            .iter()
            .any(|(column, date)| *column == name && date.is_some())
    };
    row.insert("Passed 2 Chamber".to_string(), flag(is_set("PassedLegislature")));
    row.insert("Vetoed".to_string(), flag(is_set("VetoedDate")));
    row.insert("Enacted".to_string(), flag(is_set("EnactedDate")));
    for (column, date) in dates {
        row.insert(column.to_string(), date_cell(date));
    }

    row.insert("Positive".to_string(), flag(positive));
    row.insert("Neutral".to_string(), flag(neutral));
    row.insert("Restrictive".to_string(), flag(restrictive));
    Ok(row)
}
