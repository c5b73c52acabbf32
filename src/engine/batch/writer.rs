use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::store::{FieldMap, RecordId, RecordStore, RecordUpdate, StoreError, MAX_RECORDS_PER_WRITE};

/// Bounded retry for transient store failures, with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub initial_backoff: Duration,
    #[serde(with = "millis")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Chunking, retry and time budget for every bulk write a workflow issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteConfig {
    pub chunk_size: usize,
    pub retry: RetryPolicy,
    /// Wall-clock budget for one bulk write, in milliseconds.
    pub budget_ms: Option<u64>,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            chunk_size: MAX_RECORDS_PER_WRITE,
            retry: RetryPolicy::default(),
            budget_ms: None,
        }
    }
}

impl WriteConfig {
    pub fn budget(&self) -> Option<Duration> {
        self.budget_ms.map(Duration::from_millis)
    }

    pub fn writer<'a, S>(&self, store: &'a S, table: impl Into<String>) -> ChunkedWriter<'a, S>
    where
        S: RecordStore + ?Sized,
    {
        ChunkedWriter::new(store, table)
            .chunk_size(self.chunk_size)
            .retry(self.retry)
            .budget(self.budget())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ChunkFailureCause {
    Store(String),
    BudgetExhausted,
}

/// The chunk that stopped a write. Chunks after it were never issued.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    pub chunk_len: usize,
    pub cause: ChunkFailureCause,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteSummary {
    pub requested: usize,
    pub written: usize,
    pub chunks_written: usize,
    pub created: Vec<RecordId>,
    pub failure: Option<ChunkFailure>,
}

impl WriteSummary {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    pub fn unwritten(&self) -> usize {
        self.requested - self.written
    }
}

enum Chunk {
    Create(Vec<FieldMap>),
    Update(Vec<RecordUpdate>),
    Delete(Vec<RecordId>),
}

impl Chunk {
    fn len(&self) -> usize {
        match self {
            Chunk::Create(rows) => rows.len(),
            Chunk::Update(rows) => rows.len(),
            Chunk::Delete(ids) => ids.len(),
        }
    }
}

/// Strictly sequential fixed-size writes against one table. A failed chunk
/// stops the write; chunks already written stay written.
pub struct ChunkedWriter<'a, S: ?Sized> {
    store: &'a S,
    table: String,
    chunk_size: usize,
    retry: RetryPolicy,
    budget: Option<Duration>,
}

impl<'a, S> ChunkedWriter<'a, S>
where
    S: RecordStore + ?Sized,
{
    pub fn new(store: &'a S, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
            chunk_size: MAX_RECORDS_PER_WRITE,
            retry: RetryPolicy::default(),
            budget: None,
        }
    }

    /// Clamped to `1..=MAX_RECORDS_PER_WRITE`.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.clamp(1, MAX_RECORDS_PER_WRITE);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn budget(mut self, budget: Option<Duration>) -> Self {
        self.budget = budget;
        self
    }

    pub async fn create_all(&self, rows: Vec<FieldMap>) -> WriteSummary {
        let chunks = rows
            .chunks(self.chunk_size)
            .map(|chunk| Chunk::Create(chunk.to_vec()))
            .collect();
        self.write(rows.len(), chunks).await
    }

    pub async fn update_all(&self, updates: Vec<RecordUpdate>) -> WriteSummary {
        let chunks = updates
            .chunks(self.chunk_size)
            .map(|chunk| Chunk::Update(chunk.to_vec()))
            .collect();
        self.write(updates.len(), chunks).await
    }

    pub async fn delete_all(&self, ids: Vec<RecordId>) -> WriteSummary {
        let chunks = ids
            .chunks(self.chunk_size)
            .map(|chunk| Chunk::Delete(chunk.to_vec()))
            .collect();
        self.write(ids.len(), chunks).await
    }

    async fn write(&self, requested: usize, chunks: Vec<Chunk>) -> WriteSummary {
        let started = Instant::now();
        let mut summary = WriteSummary {
            requested,
            ..WriteSummary::default()
        };

        for (chunk_index, chunk) in chunks.iter().enumerate() {
            if let Some(budget) = self.budget {
                if started.elapsed() >= budget {
                    warn!(table = %self.table, chunk_index, "write budget exhausted");
                    summary.failure = Some(ChunkFailure {
                        chunk_index,
                        chunk_len: chunk.len(),
                        cause: ChunkFailureCause::BudgetExhausted,
                    });
                    break;
                }
            }

            match self.send_with_retry(chunk).await {
                Ok(created) => {
                    summary.written += chunk.len();
                    summary.chunks_written += 1;
                    summary.created.extend(created);
                    debug!(table = %self.table, chunk_index, written = summary.written, "chunk written");
                }
                Err(err) => {
                    warn!(table = %self.table, chunk_index, error = %err, "chunk write failed");
                    summary.failure = Some(ChunkFailure {
                        chunk_index,
                        chunk_len: chunk.len(),
                        cause: ChunkFailureCause::Store(err.to_string()),
                    });
                    break;
                }
            }
        }

        summary
    }

    async fn send_with_retry(&self, chunk: &Chunk) -> Result<Vec<RecordId>, StoreError> {
        let mut attempt = 1;
        loop {
            match self.send(chunk).await {
                Ok(created) => return Ok(created),
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(table = %self.table, attempt, ?delay, error = %err, "retrying chunk");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send(&self, chunk: &Chunk) -> Result<Vec<RecordId>, StoreError> {
        match chunk {
            Chunk::Create(rows) => self.store.create(&self.table, rows.clone()).await,
            Chunk::Update(rows) => self
                .store
                .update(&self.table, rows.clone())
                .await
                .map(|_| Vec::new()),
            Chunk::Delete(ids) => self
                .store
                .delete(&self.table, ids.clone())
                .await
                .map(|_| Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::store::{MemoryStore, Query, Record};

    /// Fails the nth create call (0-based) with the given error, every time
    /// or only once.
    struct FlakyStore {
        inner: MemoryStore,
        calls: AtomicUsize,
        fail_call: usize,
        error: StoreError,
        persistent: bool,
    }

    impl FlakyStore {
        fn new(fail_call: usize, error: StoreError, persistent: bool) -> Self {
            Self {
                inner: MemoryStore::new().with_table("Exports", Vec::new()),
                calls: AtomicUsize::new(0),
                fail_call,
                error,
                persistent,
            }
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

        async fn create(&self, table: &str, records: Vec<FieldMap>) -> Result<Vec<RecordId>, StoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let failing = if self.persistent {
                call >= self.fail_call
            } else {
                call == self.fail_call
            };
            if failing {
                return Err(self.error.clone());
            }
            self.inner.create(table, records).await
        }

        async fn update(&self, table: &str, updates: Vec<RecordUpdate>) -> Result<(), StoreError> {
            self.inner.update(table, updates).await
        }

        async fn delete(&self, table: &str, ids: Vec<RecordId>) -> Result<(), StoreError> {
            self.inner.delete(table, ids).await
        }
    }

    fn rows(count: usize) -> Vec<FieldMap> {
        vec![FieldMap::new(); count]
    }

    #[tokio::test]
    async fn splits_into_chunks_of_at_most_fifty() {
        let store = MemoryStore::new().with_table("Exports", Vec::new());

        let summary = ChunkedWriter::new(&store, "Exports").create_all(rows(120)).await;

        assert!(summary.is_complete());
        assert_eq!(summary.chunks_written, 3);
        assert_eq!(summary.written, 120);
        assert_eq!(summary.created.len(), 120);
        assert_eq!(store.records("Exports").len(), 120);
    }

    #[tokio::test]
    async fn chunk_failure_keeps_earlier_chunks_and_stops() {
        let store = FlakyStore::new(1, StoreError::Rejected("invalid field".to_string()), true);

        let summary = ChunkedWriter::new(&store, "Exports")
            .chunk_size(10)
            .create_all(rows(35))
            .await;

        let failure = summary.failure.clone().expect("second chunk fails");
        assert_eq!(failure.chunk_index, 1);
        assert_eq!(summary.written, 10);
        assert_eq!(summary.unwritten(), 25);
        assert_eq!(store.inner.records("Exports").len(), 10);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_with_backoff() {
        let store = FlakyStore::new(0, StoreError::Unavailable("503".to_string()), false);

        let summary = ChunkedWriter::new(&store, "Exports").create_all(rows(5)).await;

        assert!(summary.is_complete());
        assert_eq!(summary.written, 5);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_stop_after_max_attempts() {
        let store = FlakyStore::new(0, StoreError::Unavailable("503".to_string()), true);

        let summary = ChunkedWriter::new(&store, "Exports").create_all(rows(5)).await;

        assert!(matches!(
            summary.failure.map(|failure| failure.cause),
            Some(ChunkFailureCause::Store(_))
        ));
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_leaves_remaining_chunks_unwritten() {
        let store = FlakyStore::new(0, StoreError::Unavailable("503".to_string()), false);

        let summary = ChunkedWriter::new(&store, "Exports")
            .chunk_size(2)
            .budget(Some(Duration::from_millis(100)))
            .create_all(rows(4))
            .await;

        let failure = summary.failure.expect("budget stops the write");
        assert_eq!(failure.cause, ChunkFailureCause::BudgetExhausted);
        assert_eq!(failure.chunk_index, 1);
        assert_eq!(summary.written, 2);
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(5), Duration::from_secs(2));
    }
}
