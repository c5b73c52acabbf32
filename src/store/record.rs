use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::value::FieldValue;

/// Opaque store identifier, unique within a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Field name to normalized value, used for creates and updates.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Snapshot of one row. Missing fields are simply absent from the map.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    fields: FieldMap,
}

impl Record {
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            fields: FieldMap::new(),
        }
    }

    pub fn from_fields(id: RecordId, fields: FieldMap) -> Self {
        Self { id, fields }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn display(&self, name: &str) -> Option<String> {
        self.get(name).map(FieldValue::display)
    }

    /// Display text only when the field is present and non-blank.
    pub fn present_text(&self, name: &str) -> Option<String> {
        self.get(name)
            .filter(|value| value.is_present())
            .map(FieldValue::display)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_integer)
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        self.get(name).and_then(FieldValue::as_date)
    }

    pub fn names(&self, name: &str) -> Vec<String> {
        self.get(name).map(FieldValue::names).unwrap_or_default()
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.get(name).map(FieldValue::is_present).unwrap_or(false)
    }

    /// Parse the `{"id": ..., "fields": {...}}` snapshot shape.
    pub fn from_json(raw: &Value) -> Option<Self> {
        let object = raw.as_object()?;
        let id = object.get("id")?.as_str()?;
        let fields = object
            .get("fields")
            .and_then(Value::as_object)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|(name, value)| {
                        FieldValue::from_json(value).map(|value| (name.clone(), value))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Some(Self::from_fields(RecordId::from(id), fields))
    }

    pub fn to_json(&self) -> Value {
        let fields: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        let mut object = Map::new();
        object.insert("id".to_string(), Value::String(self.id.0.clone()));
        object.insert("fields".to_string(), Value::Object(fields));
        Value::Object(object)
    }
}

/// Partial update addressed to an existing record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    pub id: RecordId,
    pub fields: FieldMap,
}
