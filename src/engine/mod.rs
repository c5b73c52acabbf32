//! Record matching and data-quality scoring primitives shared by every
//! workflow. Nothing here touches the store except [`batch::ChunkedWriter`].

pub mod batch;
pub mod candidates;
pub mod keywords;
pub mod matching;
pub mod quality;
pub mod similarity;
pub mod validation;

pub use batch::{
    BatchOutcome, BatchProcessor, ChunkedWriter, RecordError, RejectReason, RetryPolicy, RunState,
    RunTracker, WriteConfig, WriteSummary,
};
pub use candidates::{select_candidates, JurisdictionKey};
pub use keywords::{extract_keywords, KeywordConfig};
pub use matching::{rank, ConfidenceThresholds, ConfidenceTier, Match, MatchReport, NoteWriteMode};
pub use quality::{AggregateMetrics, QualityPolicy, QualityReport, QualityScorer, Trend};
pub use similarity::overlap_score;
pub use validation::{DuplicateIndex, Rule, ValidationResult, Validator};
