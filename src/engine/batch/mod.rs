mod run;
mod writer;

use serde::Serialize;

use super::validation::{RuleFailure, ValidationTally, Validator};
use crate::store::{Record, RecordId};

pub use run::{RunState, RunTracker, TransitionError};
pub use writer::{
    ChunkFailure, ChunkFailureCause, ChunkedWriter, RetryPolicy, WriteConfig, WriteSummary,
};

/// Why a record was left out of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    Invalid { failures: Vec<RuleFailure> },
    TransformFailed { message: String },
}

impl RejectReason {
    pub fn summary(&self) -> String {
        match self {
            RejectReason::Invalid { failures } => failures
                .iter()
                .filter(|failure| failure.critical)
                .map(|failure| failure.detail.as_str())
                .collect::<Vec<_>>()
                .join("; "),
            RejectReason::TransformFailed { message } => format!("transform failed: {message}"),
        }
    }
}

/// Structured per-record error: which record, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordError {
    pub record_id: RecordId,
    /// Business-facing reference such as a bill id.
    pub record_ref: String,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome<T> {
    pub accepted: Vec<T>,
    pub errors: Vec<RecordError>,
    pub validation: ValidationTally,
}

impl<T> BatchOutcome<T> {
    pub fn processed(&self) -> usize {
        self.accepted.len() + self.errors.len()
    }
}

/// Validate-then-transform over a record set. One record's failure never
/// stops the batch.
pub struct BatchProcessor<'a> {
    validator: &'a Validator,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(validator: &'a Validator) -> Self {
        Self { validator }
    }

    /// `transform` runs only for valid records, in input order, and may
    /// accumulate run metrics through its captures. `record_ref` names a
    /// record in error output.
    pub fn process<T, F, R>(&self, records: &[Record], mut transform: F, record_ref: R) -> BatchOutcome<T>
    where
        F: FnMut(&Record) -> Result<T, String>,
        R: Fn(&Record) -> String,
    {
        let mut accepted = Vec::new();
        let mut errors = Vec::new();
        let mut validation = ValidationTally::default();

        for record in records {
            let result = self.validator.validate(record);
            validation.add(&result);
            if !result.valid {
                errors.push(RecordError {
                    record_id: record.id.clone(),
                    record_ref: record_ref(record),
                    reason: RejectReason::Invalid {
                        failures: result.failures,
                    },
                });
                continue;
            }

            match transform(record) {
                Ok(row) => accepted.push(row),
                Err(message) => {
                    tracing::debug!(record = %record.id, %message, "transform rejected record");
                    errors.push(RecordError {
                        record_id: record.id.clone(),
                        record_ref: record_ref(record),
                        reason: RejectReason::TransformFailed { message },
                    });
                }
            }
        }

        BatchOutcome {
            accepted,
            errors,
            validation,
        }
    }
}
