use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::engine::{RetryPolicy, WriteConfig};
use crate::report::PromptOption;
use crate::store::{
    FieldMap, FieldValue, MemoryStore, Query, Record, RecordId, RecordStore, RecordUpdate,
    StoreError,
};

pub(super) fn day(year: i32, month: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, d).expect("valid date")
}

pub(super) fn now() -> NaiveDateTime {
    day(2025, 6, 15).and_hms_opt(9, 30, 0).expect("valid time")
}

pub(super) fn write_config(chunk_size: usize) -> WriteConfig {
    WriteConfig {
        chunk_size,
        retry: RetryPolicy::none(),
        budget_ms: None,
    }
}

pub(super) fn regulation(id: &str, agency: (&str, &str), year: i64, title: &str) -> Record {
    Record::new(RecordId::from(id))
        .with_field("Reg-ID", FieldValue::text(format!("REG-{id}")))
        .with_field("State", FieldValue::choice("CA"))
        .with_field("Year", FieldValue::number(year as f64))
        .with_field("Issuing Agency Link", FieldValue::link(agency.0, agency.1))
        .with_field("Title", FieldValue::text(title))
}

pub(super) fn bill(id: &str, state: &str, number: u32) -> Record {
    Record::new(RecordId::from(id))
        .with_field("BillID", FieldValue::text(format!("{state}2025HB{number}")))
        .with_field("State", FieldValue::choice(state))
        .with_field("BillType", FieldValue::choice("HB"))
        .with_field("BillNumber", FieldValue::number(f64::from(number)))
}

pub(super) fn accept(_: &str, options: &[PromptOption]) -> bool {
    options[0].value
}

pub(super) fn decline(_: &str, options: &[PromptOption]) -> bool {
    options[1].value
}

/// Memory store whose creates and updates against one table start failing
/// after a number of successful calls.
pub(super) struct FlakyStore {
    pub(super) inner: MemoryStore,
    table: String,
    healthy_writes: usize,
    writes: AtomicUsize,
}

impl FlakyStore {
    pub(super) fn new(inner: MemoryStore, table: &str, healthy_writes: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            table: table.to_string(),
            healthy_writes,
            writes: AtomicUsize::new(0),
        })
    }

    fn check(&self, table: &str) -> Result<(), StoreError> {
        if table != self.table {
            return Ok(());
        }
        let call = self.writes.fetch_add(1, Ordering::SeqCst);
        if call >= self.healthy_writes {
            return Err(StoreError::Rejected(format!("{table} is read-only")));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Record>, StoreError> {
        self.inner.select(table, query).await
    }

    async fn fetch(&self, table: &str, id: &RecordId) -> Result<Option<Record>, StoreError> {
        self.inner.fetch(table, id).await
    }

    async fn create(
        &self,
        table: &str,
        records: Vec<FieldMap>,
    ) -> Result<Vec<RecordId>, StoreError> {
        self.check(table)?;
        self.inner.create(table, records).await
    }

    async fn update(&self, table: &str, updates: Vec<RecordUpdate>) -> Result<(), StoreError> {
        self.check(table)?;
        self.inner.update(table, updates).await
    }

    async fn delete(&self, table: &str, ids: Vec<RecordId>) -> Result<(), StoreError> {
        self.inner.delete(table, ids).await
    }
}
