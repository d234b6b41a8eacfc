//! Feature Extraction Error Types

use dataset::DatasetError;
use thiserror::Error;

/// Errors during feature extraction
#[derive(Debug, Error)]
pub enum FeatureError {
    /// Window size or stride of zero
    #[error("Invalid window: size {size}, stride {stride} (both must be positive)")]
    InvalidWindow { size: usize, stride: usize },

    /// Field length differs from the sequence length
    #[error("Field {field} has {actual} values, sequence has {expected}")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    /// Underlying table error
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}
