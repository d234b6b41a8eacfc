//! Threshold Error Types

use crate::rule::Direction;
use dataset::DatasetError;
use evaluation::EvaluationError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors while fitting, combining or persisting threshold rules
#[derive(Debug, Error)]
pub enum ThresholdError {
    /// The same field used with two comparison directions
    #[error("Field {field} used with both {first} and {second}")]
    ConflictingDirection {
        field: String,
        first: Direction,
        second: Direction,
    },

    #[error("A conjunction needs at least one rule")]
    EmptyConjunction,

    #[error("Unknown direction {0:?} (expected \"le\" or \"gt\")")]
    UnknownDirection(String),

    /// Values and labels differ in length
    #[error("{values} values but {labels} labels")]
    LengthMismatch { values: usize, labels: usize },

    #[error("Failed to access rule file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid rule file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}
