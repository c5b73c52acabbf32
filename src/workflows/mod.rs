//! Operator workflows over the policy tracker tables. Each workflow holds an
//! `Arc` to the record store and its own slice of the engine configuration.

pub mod bills;
pub mod digest;
pub mod export;
pub mod health;
pub mod status;
pub mod supersedes;

#[cfg(test)]
mod tests;

use crate::engine::batch::TransitionError;
use crate::store::{RecordId, StoreError};

/// Errors that abort a workflow run. Per-record problems never surface here.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("record {id} not found in table '{table}'")]
    RecordNotFound { table: String, id: RecordId },
}
