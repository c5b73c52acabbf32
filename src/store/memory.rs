use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::record::{FieldMap, Record, RecordId, RecordUpdate};
use super::value::{FieldValue, Scalar};
use super::{Query, RecordStore, SortDirection, StoreError, MAX_RECORDS_PER_WRITE};

type Tables = BTreeMap<String, Vec<Record>>;

/// In-process store backing the CLI snapshot mode and the test suite.
/// Enforces the same per-call write limit as the platform.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    sequence: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, name: impl Into<String>, records: Vec<Record>) -> Self {
        self.lock().insert(name.into(), records);
        self
    }

    pub fn ensure_table(&self, name: &str) {
        self.lock().entry(name.to_string()).or_default();
    }

    pub fn table_names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Copy of every record in a table, in insertion order.
    pub fn records(&self, table: &str) -> Vec<Record> {
        self.lock().get(table).cloned().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A poisoned lock only means another test thread panicked mid-write.
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_id(&self) -> RecordId {
        let id = self.sequence.fetch_add(1, AtomicOrdering::Relaxed) + 1;
        RecordId(format!("mem{id:06}"))
    }
}

fn check_limit(found: usize) -> Result<(), StoreError> {
    if found > MAX_RECORDS_PER_WRITE {
        return Err(StoreError::PayloadTooLarge {
            limit: MAX_RECORDS_PER_WRITE,
            found,
        });
    }
    Ok(())
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Record>, StoreError> {
        let guard = self.lock();
        let rows = guard
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        let mut selected: Vec<Record> = rows
            .iter()
            .filter(|record| {
                query
                    .filter
                    .as_ref()
                    .map(|filter| filter.matches(record))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        if let Some(sort) = &query.sort {
            selected.sort_by(|left, right| {
                let ordering = compare_cells(left.get(&sort.field), right.get(&sort.field));
                match sort.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = query.max_records {
            selected.truncate(limit);
        }

        if let Some(fields) = &query.fields {
            selected = selected
                .into_iter()
                .map(|record| {
                    let projected: FieldMap = record
                        .fields()
                        .iter()
                        .filter(|(name, _)| fields.iter().any(|field| field == *name))
                        .map(|(name, value)| (name.clone(), value.clone()))
                        .collect();
                    Record::from_fields(record.id, projected)
                })
                .collect();
        }

        Ok(selected)
    }

    async fn fetch(&self, table: &str, id: &RecordId) -> Result<Option<Record>, StoreError> {
        let guard = self.lock();
        let rows = guard
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        Ok(rows.iter().find(|record| &record.id == id).cloned())
    }

    async fn create(
        &self,
        table: &str,
        records: Vec<FieldMap>,
    ) -> Result<Vec<RecordId>, StoreError> {
        check_limit(records.len())?;
        let ids: Vec<RecordId> = records.iter().map(|_| self.next_id()).collect();
        let mut guard = self.lock();
        let rows = guard
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        rows.extend(
            ids.iter()
                .cloned()
                .zip(records)
                .map(|(id, fields)| Record::from_fields(id, fields)),
        );
        Ok(ids)
    }

    async fn update(&self, table: &str, updates: Vec<RecordUpdate>) -> Result<(), StoreError> {
        check_limit(updates.len())?;
        let mut guard = self.lock();
        let rows = guard
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        if let Some(missing) = updates
            .iter()
            .find(|update| !rows.iter().any(|record| record.id == update.id))
        {
            return Err(StoreError::RecordNotFound(missing.id.clone()));
        }

        for update in updates {
            if let Some(record) = rows.iter_mut().find(|record| record.id == update.id) {
                for (name, value) in update.fields {
                    record.set(name, value);
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, table: &str, ids: Vec<RecordId>) -> Result<(), StoreError> {
        check_limit(ids.len())?;
        let mut guard = self.lock();
        let rows = guard
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        rows.retain(|record| !ids.contains(&record.id));
        Ok(())
    }
}

/// Empty cells sort first; numbers and dates compare by value, everything
/// else by display text.
fn compare_cells(left: Option<&FieldValue>, right: Option<&FieldValue>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(left), Some(right)) => match (left, right) {
            (FieldValue::Scalar(Scalar::Number(a)), FieldValue::Scalar(Scalar::Number(b))) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            _ => match (left.as_date(), right.as_date()) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => left.display().cmp(&right.display()),
            },
        },
    }
}
