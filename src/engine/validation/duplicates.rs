use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::store::{Record, RecordId};

/// A later record sharing a key with an earlier one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateEntry {
    pub key: Vec<String>,
    pub kept: RecordId,
    pub duplicate: RecordId,
}

/// Key occurrences across a whole record set. The first record seen with a
/// key is kept; each later one is a duplicate. Records missing any key field
/// are never keyed.
#[derive(Debug, Clone, Default)]
pub struct DuplicateIndex {
    key_fields: Vec<String>,
    entries: Vec<DuplicateEntry>,
    by_duplicate: HashMap<RecordId, usize>,
}

impl DuplicateIndex {
    pub fn build<I, S>(records: &[Record], key_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key_fields: Vec<String> = key_fields.into_iter().map(Into::into).collect();
        let mut first_seen: BTreeMap<Vec<String>, RecordId> = BTreeMap::new();
        let mut entries = Vec::new();
        let mut by_duplicate = HashMap::new();

        for record in records {
            let Some(key) = key_for(record, &key_fields) else {
                continue;
            };
            match first_seen.get(&key) {
                Some(kept) => {
                    by_duplicate.insert(record.id.clone(), entries.len());
                    entries.push(DuplicateEntry {
                        key,
                        kept: kept.clone(),
                        duplicate: record.id.clone(),
                    });
                }
                None => {
                    first_seen.insert(key, record.id.clone());
                }
            }
        }

        Self {
            key_fields,
            entries,
            by_duplicate,
        }
    }

    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    pub fn entries(&self) -> &[DuplicateEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The kept record this one duplicates, if any.
    pub fn duplicate_of(&self, id: &RecordId) -> Option<&RecordId> {
        self.by_duplicate
            .get(id)
            .map(|position| &self.entries[*position].kept)
    }
}

/// Linked fields contribute their record id; everything else its text.
fn key_for(record: &Record, fields: &[String]) -> Option<Vec<String>> {
    fields
        .iter()
        .map(|field| {
            let value = record.get(field).filter(|value| value.is_present())?;
            match value.first_choice().and_then(|choice| choice.id.clone()) {
                Some(id) => Some(id),
                None => Some(value.display().trim().to_string()),
            }
        })
        .collect()
}
