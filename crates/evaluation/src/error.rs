//! Evaluation Error Types

use dataset::DatasetError;
use thiserror::Error;

/// Errors while scoring predictions
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// Ground truth cell that is not 0 or 1
    #[error("Label {column} at row {row} is not binary: {value:?}")]
    NonBinaryLabel {
        column: String,
        row: usize,
        value: String,
    },

    /// Ground truth and predictions differ in length
    #[error("{truth} ground-truth labels but {predicted} predictions")]
    LengthMismatch { truth: usize, predicted: usize },

    /// Underlying table error
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}
