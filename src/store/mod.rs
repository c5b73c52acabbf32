//! External record store boundary.
//!
//! The hosting platform owns storage; the engine only sees snapshot reads and
//! bulk create/update/delete calls through [`RecordStore`]. Raw heterogeneous
//! cell values are normalized into [`FieldValue`] here so nothing downstream
//! branches on runtime type.

mod filter;
mod memory;
mod record;
mod value;

use async_trait::async_trait;

pub use filter::Filter;
pub use memory::MemoryStore;
pub use record::{FieldMap, Record, RecordId, RecordUpdate};
pub use value::{Choice, Element, FieldValue, Scalar};

/// Per-call record limit imposed by the platform write API.
pub const MAX_RECORDS_PER_WRITE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// Snapshot query. Every part is optional; the default selects everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub fields: Option<Vec<String>>,
    pub filter: Option<Filter>,
    pub sort: Option<Sort>,
    pub max_records: Option<usize>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort_desc(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            direction: SortDirection::Descending,
        });
        self
    }

    pub fn sort_asc(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            direction: SortDirection::Ascending,
        });
        self
    }

    pub fn limit(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("table '{0}' not found")]
    TableNotFound(String),
    #[error("record {0} not found")]
    RecordNotFound(RecordId),
    #[error("write of {found} records exceeds the per-call limit of {limit}")]
    PayloadTooLarge { limit: usize, found: usize },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store rejected request: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Only availability failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Storage abstraction so workflows can run against the platform API, a
/// local snapshot file, or test doubles.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Record>, StoreError>;

    async fn fetch(&self, table: &str, id: &RecordId) -> Result<Option<Record>, StoreError>;

    /// Create up to [`MAX_RECORDS_PER_WRITE`] records, returning their ids.
    async fn create(&self, table: &str, records: Vec<FieldMap>)
        -> Result<Vec<RecordId>, StoreError>;

    async fn update(&self, table: &str, updates: Vec<RecordUpdate>) -> Result<(), StoreError>;

    async fn delete(&self, table: &str, ids: Vec<RecordId>) -> Result<(), StoreError>;
}
