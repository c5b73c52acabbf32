//! Built-in rule shapes. Every constructor returns a critical [`Rule`];
//! call [`Rule::non_critical`] to downgrade.

use std::sync::Arc;

use chrono::NaiveDate;

use super::{DuplicateIndex, Rule};
use crate::store::Record;

fn owned<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

/// Every listed field must be present and non-blank.
pub fn required_fields<I, S>(name: impl Into<String>, fields: I) -> Rule
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let fields = owned(fields);
    Rule::new(name, true, move |record: &Record| {
        let missing: Vec<&str> = fields
            .iter()
            .filter(|field| !record.is_present(field))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("missing {}", missing.join(", ")))
        }
    })
}

/// `field` is required only when `condition_field` holds one of `values`.
pub fn required_when<I, S>(
    name: impl Into<String>,
    field: impl Into<String>,
    condition_field: impl Into<String>,
    values: I,
) -> Rule
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let field = field.into();
    let condition_field = condition_field.into();
    let values = owned(values);
    Rule::new(name, true, move |record: &Record| {
        let Some(current) = record.present_text(&condition_field) else {
            return Ok(());
        };
        if values.contains(&current) && !record.is_present(&field) {
            return Err(format!("{current} record is missing {field}"));
        }
        Ok(())
    })
}

/// A text field whose content is itself a validation verdict: any non-blank
/// value fails, and that value is the reason.
pub fn flag_field_clear(name: impl Into<String>, field: impl Into<String>) -> Rule {
    let field = field.into();
    Rule::new(name, true, move |record: &Record| {
        match record.present_text(&field) {
            Some(verdict) => Err(verdict.trim().to_string()),
            None => Ok(()),
        }
    })
}

/// Records whose `status_field` equals `status` must carry `date_field`,
/// unless `exempt_field` contains `exempt_marker`.
#[derive(Debug, Clone)]
pub struct StatusDateRequirement {
    pub status_field: String,
    pub status: String,
    pub date_field: String,
    pub exempt_field: Option<String>,
    pub exempt_marker: Option<String>,
}

impl StatusDateRequirement {
    pub fn new(
        status_field: impl Into<String>,
        status: impl Into<String>,
        date_field: impl Into<String>,
    ) -> Self {
        Self {
            status_field: status_field.into(),
            status: status.into(),
            date_field: date_field.into(),
            exempt_field: None,
            exempt_marker: None,
        }
    }

    pub fn exempt_when(mut self, field: impl Into<String>, marker: impl Into<String>) -> Self {
        self.exempt_field = Some(field.into());
        self.exempt_marker = Some(marker.into());
        self
    }

    pub fn is_violated_by(&self, record: &Record) -> bool {
        if record.display(&self.status_field).as_deref() != Some(self.status.as_str()) {
            return false;
        }
        if let (Some(field), Some(marker)) = (&self.exempt_field, &self.exempt_marker) {
            let exempt = record
                .names(field)
                .iter()
                .any(|name| name.contains(marker.as_str()));
            if exempt {
                return false;
            }
        }
        record.date(&self.date_field).is_none()
    }

    pub fn into_rule(self, name: impl Into<String>) -> Rule {
        Rule::new(name, true, move |record: &Record| {
            if self.is_violated_by(record) {
                Err(format!("{} without {}", self.status, self.date_field))
            } else {
                Ok(())
            }
        })
    }
}

/// Listed date fields may not fall after `today`. Unparseable values are
/// left to other rules.
pub fn dates_not_after<I, S>(name: impl Into<String>, fields: I, today: NaiveDate) -> Rule
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let fields = owned(fields);
    Rule::new(name, true, move |record: &Record| {
        let future: Vec<String> = fields
            .iter()
            .filter_map(|field| {
                record
                    .date(field)
                    .filter(|date| *date > today)
                    .map(|date| format!("{field} {date} is in the future"))
            })
            .collect();
        if future.is_empty() {
            Ok(())
        } else {
            Err(future.join(", "))
        }
    })
}

/// Fails for every occurrence of a key after the first.
pub fn not_duplicate(name: impl Into<String>, index: Arc<DuplicateIndex>) -> Rule {
    Rule::new(name, true, move |record: &Record| {
        match index.duplicate_of(&record.id) {
            Some(kept) => Err(format!("duplicate of {kept}")),
            None => Ok(()),
        }
    })
}
