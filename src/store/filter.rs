use super::record::Record;

/// Predicate over a record, mirroring the subset of the platform formula
/// language the workflows rely on.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field is empty, blank text or an empty list.
    Blank(String),
    /// Field display text contains the needle (case sensitive, like `FIND`).
    Contains { field: String, needle: String },
    /// Field display text equals the value.
    Equals { field: String, value: String },
    Any(Vec<Filter>),
    All(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn blank(field: impl Into<String>) -> Self {
        Self::Blank(field.into())
    }

    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::Contains {
            field: field.into(),
            needle: needle.into(),
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::Blank(field) => !record.is_present(field),
            Filter::Contains { field, needle } => record
                .display(field)
                .map(|text| text.contains(needle.as_str()))
                .unwrap_or(false),
            Filter::Equals { field, value } => record
                .display(field)
                .map(|text| text == *value)
                .unwrap_or(false),
            Filter::Any(filters) => filters.iter().any(|filter| filter.matches(record)),
            Filter::All(filters) => filters.iter().all(|filter| filter.matches(record)),
            Filter::Not(filter) => !filter.matches(record),
        }
    }

    /// Render the predicate as a `filterByFormula` expression for remote adapters.
    pub fn to_formula(&self) -> String {
        match self {
            Filter::Blank(field) => format!("OR({{{field}}} = '', {{{field}}} = BLANK())"),
            Filter::Contains { field, needle } => {
                format!("FIND('{}', {{{field}}}) > 0", escape(needle))
            }
            Filter::Equals { field, value } => format!("{{{field}}} = '{}'", escape(value)),
            Filter::Any(filters) => format!("OR({})", join_formulas(filters)),
            Filter::All(filters) => format!("AND({})", join_formulas(filters)),
            Filter::Not(filter) => format!("NOT({})", filter.to_formula()),
        }
    }
}

fn join_formulas(filters: &[Filter]) -> String {
    filters
        .iter()
        .map(Filter::to_formula)
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape(value: &str) -> String {
    value.replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FieldValue, RecordId};

    fn bill(status: &str, blurb: Option<&str>) -> Record {
        let mut record = Record::new(RecordId::from("rec1"))
            .with_field("Current Bill Status", FieldValue::choice(status));
        if let Some(blurb) = blurb {
            record = record.with_field("Website Blurb", FieldValue::text(blurb));
        }
        record
    }

    #[test]
    fn composite_filters_follow_formula_semantics() {
        let needs_blurb = Filter::All(vec![
            Filter::Any(vec![
                Filter::equals("Current Bill Status", "Enacted"),
                Filter::equals("Current Bill Status", "Vetoed"),
            ]),
            Filter::blank("Website Blurb"),
        ]);

        assert!(needs_blurb.matches(&bill("Enacted", None)));
        assert!(needs_blurb.matches(&bill("Vetoed", Some("  "))));
        assert!(!needs_blurb.matches(&bill("Enacted", Some("Signed into law"))));
        assert!(!needs_blurb.matches(&bill("Introduced", None)));
    }

    #[test]
    fn renders_platform_formula() {
        let filter = Filter::contains("Date Validation", "🚫");
        assert_eq!(filter.to_formula(), "FIND('🚫', {Date Validation}) > 0");

        let filter = Filter::Any(vec![Filter::blank("State"), Filter::blank("BillType")]);
        assert_eq!(
            filter.to_formula(),
            "OR(OR({State} = '', {State} = BLANK()), OR({BillType} = '', {BillType} = BLANK()))"
        );
    }
}
