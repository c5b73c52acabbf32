use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single-valued cell content after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Flag(bool),
}

impl Scalar {
    pub fn display(&self) -> String {
        match self {
            Scalar::Text(text) => text.clone(),
            Scalar::Number(number) => number.to_string(),
            Scalar::Date(date) => date.format("%Y-%m-%d").to_string(),
            Scalar::Flag(flag) => flag.to_string(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Scalar::Text(text) => Value::String(text.clone()),
            Scalar::Number(number) => serde_json::Number::from_f64(*number)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Scalar::Date(date) => Value::String(date.format("%Y-%m-%d").to_string()),
            Scalar::Flag(flag) => Value::Bool(*flag),
        }
    }

    fn is_present(&self) -> bool {
        match self {
            Scalar::Text(text) => !text.trim().is_empty(),
            Scalar::Flag(flag) => *flag,
            Scalar::Number(_) | Scalar::Date(_) => true,
        }
    }
}

/// Select option or linked record. Linked records carry a stable `id`; two
/// choices with equal names but different ids are different entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
}

impl Choice {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    pub fn linked(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
        }
    }
}

/// Member of a multi-valued cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Choice(Choice),
    Scalar(Scalar),
}

impl Element {
    pub fn display(&self) -> String {
        match self {
            Element::Scalar(scalar) => scalar.display(),
            Element::Choice(choice) => choice.name.clone(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Element::Scalar(scalar) => scalar.to_json(),
            Element::Choice(choice) => serde_json::to_value(choice).unwrap_or(Value::Null),
        }
    }
}

/// Tagged union every raw store value is normalized into before it reaches
/// the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Choice(Choice),
    List(Vec<Element>),
    Scalar(Scalar),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Scalar(Scalar::Text(value.into()))
    }

    pub fn number(value: f64) -> Self {
        Self::Scalar(Scalar::Number(value))
    }

    pub fn date(value: NaiveDate) -> Self {
        Self::Scalar(Scalar::Date(value))
    }

    pub fn flag(value: bool) -> Self {
        Self::Scalar(Scalar::Flag(value))
    }

    pub fn choice(name: impl Into<String>) -> Self {
        Self::Choice(Choice::named(name))
    }

    pub fn link(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::List(vec![Element::Choice(Choice::linked(id, name))])
    }

    pub fn choices<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(
            names
                .into_iter()
                .map(|name| Element::Choice(Choice::named(name)))
                .collect(),
        )
    }

    /// Normalize a raw JSON cell. `None` means the cell is empty.
    pub fn from_json(raw: &Value) -> Option<Self> {
        match raw {
            Value::Null => None,
            Value::Array(items) => {
                let elements: Vec<Element> = items.iter().filter_map(element_from_json).collect();
                Some(Self::List(elements))
            }
            other => element_from_json(other).map(|element| match element {
                Element::Scalar(scalar) => Self::Scalar(scalar),
                Element::Choice(choice) => Self::Choice(choice),
            }),
        }
    }

    /// Normalize a CSV cell, which only ever carries scalars. Numbers are
    /// kept only when they print back exactly, so "0012" stays text.
    pub fn from_cell(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Some(date) = parse_date(trimmed) {
            return Some(Self::date(date));
        }
        if let Ok(number) = trimmed.parse::<f64>() {
            if number.is_finite() && number.to_string() == trimmed {
                return Some(Self::number(number));
            }
        }
        Some(Self::text(raw))
    }

    /// Inverse of [`FieldValue::from_json`], used when persisting snapshots.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Scalar(scalar) => scalar.to_json(),
            FieldValue::Choice(choice) => serde_json::to_value(choice).unwrap_or(Value::Null),
            FieldValue::List(items) => Value::Array(items.iter().map(Element::to_json).collect()),
        }
    }

    /// Human-readable rendering; lists are joined with ", ".
    pub fn display(&self) -> String {
        match self {
            FieldValue::Scalar(scalar) => scalar.display(),
            FieldValue::Choice(choice) => choice.name.clone(),
            FieldValue::List(items) => items
                .iter()
                .map(Element::display)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(Scalar::Text(text)) => Some(text),
            FieldValue::Choice(choice) => Some(&choice.name),
            _ => None,
        }
    }

    /// Integer view used for year-like time keys. Text and choice names are
    /// parsed; fractional numbers are truncated.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Scalar(Scalar::Number(number)) if number.is_finite() => {
                Some(number.trunc() as i64)
            }
            FieldValue::Scalar(Scalar::Text(text)) => text.trim().parse().ok(),
            FieldValue::Choice(choice) => choice.name.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Scalar(Scalar::Date(date)) => Some(*date),
            FieldValue::Scalar(Scalar::Text(text)) => parse_date(text),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Scalar(Scalar::Flag(flag)) => Some(*flag),
            _ => None,
        }
    }

    /// First choice held by the cell, used for linked-record identity.
    pub fn first_choice(&self) -> Option<&Choice> {
        match self {
            FieldValue::Choice(choice) => Some(choice),
            FieldValue::List(items) => items.iter().find_map(|item| match item {
                Element::Choice(choice) => Some(choice),
                Element::Scalar(_) => None,
            }),
            FieldValue::Scalar(_) => None,
        }
    }

    /// Every value name in the cell. Comma separated text is split.
    pub fn names(&self) -> Vec<String> {
        match self {
            FieldValue::List(items) => items
                .iter()
                .map(Element::display)
                .filter(|name| !name.trim().is_empty())
                .collect(),
            FieldValue::Choice(choice) => vec![choice.name.clone()],
            FieldValue::Scalar(Scalar::Text(text)) => text
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
            FieldValue::Scalar(scalar) => vec![scalar.display()],
        }
    }

    /// Blank text, unchecked flags and empty lists count as absent.
    pub fn is_present(&self) -> bool {
        match self {
            FieldValue::Scalar(scalar) => scalar.is_present(),
            FieldValue::Choice(choice) => !choice.name.trim().is_empty(),
            FieldValue::List(items) => !items.is_empty(),
        }
    }
}

fn element_from_json(raw: &Value) -> Option<Element> {
    match raw {
        Value::Null | Value::Array(_) => None,
        Value::Bool(flag) => Some(Element::Scalar(Scalar::Flag(*flag))),
        Value::Number(number) => number
            .as_f64()
            .map(|value| Element::Scalar(Scalar::Number(value))),
        Value::String(text) => Some(Element::Scalar(match parse_date(text) {
            Some(date) => Scalar::Date(date),
            None => Scalar::Text(text.clone()),
        })),
        Value::Object(map) => {
            if let Some(name) = map.get("name").and_then(Value::as_str) {
                let id = map.get("id").and_then(Value::as_str).map(str::to_string);
                return Some(Element::Choice(Choice {
                    id,
                    name: name.to_string(),
                }));
            }
            map.get("text")
                .and_then(Value::as_str)
                .map(|text| Element::Scalar(Scalar::Text(text.to_string())))
        }
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_heterogeneous_json_cells() {
        assert_eq!(FieldValue::from_json(&json!(null)), None);
        assert_eq!(
            FieldValue::from_json(&json!({"id": "sel1", "name": "TX"})),
            Some(FieldValue::Choice(Choice::linked("sel1", "TX")))
        );
        assert_eq!(
            FieldValue::from_json(&json!("2024-03-01")),
            Some(FieldValue::date(
                NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date")
            ))
        );
        assert_eq!(
            FieldValue::from_json(&json!({"text": "Rich blurb"})),
            Some(FieldValue::text("Rich blurb"))
        );

        let agencies = FieldValue::from_json(&json!([{"id": "rec9", "name": "Health"}, null]))
            .expect("list normalizes");
        assert_eq!(
            agencies.first_choice().and_then(|choice| choice.id.as_deref()),
            Some("rec9")
        );
        assert_eq!(agencies.names(), vec!["Health".to_string()]);
    }

    #[test]
    fn integer_view_reads_select_named_years() {
        let year = FieldValue::from_json(&json!({"name": "2021"})).expect("choice");
        assert_eq!(year.as_integer(), Some(2021));
        assert_eq!(FieldValue::number(2019.0).as_integer(), Some(2019));
        assert_eq!(FieldValue::text("n/a").as_integer(), None);
    }

    #[test]
    fn presence_ignores_blank_text_and_empty_lists() {
        assert!(!FieldValue::text("   ").is_present());
        assert!(!FieldValue::List(Vec::new()).is_present());
        assert!(FieldValue::number(0.0).is_present());
        assert!(FieldValue::choices(["Positive"]).is_present());
    }

    #[test]
    fn csv_cells_become_typed_scalars() {
        assert_eq!(FieldValue::from_cell(""), None);
        assert_eq!(FieldValue::from_cell("100"), Some(FieldValue::number(100.0)));
        assert_eq!(FieldValue::from_cell("HB"), Some(FieldValue::text("HB")));
        assert_eq!(FieldValue::number(100.0).display(), "100");
        assert_eq!(FieldValue::from_cell("12.5"), Some(FieldValue::number(12.5)));
    }

    #[test]
    fn csv_cells_that_would_not_print_back_stay_text() {
        assert_eq!(FieldValue::from_cell("0012"), Some(FieldValue::text("0012")));
        assert_eq!(FieldValue::from_cell("1e3"), Some(FieldValue::text("1e3")));
        assert_eq!(
            FieldValue::from_cell("0012").map(|value| value.display()).as_deref(),
            Some("0012")
        );
    }
}
