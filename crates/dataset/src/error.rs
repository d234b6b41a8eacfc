//! Dataset Error Types

use std::path::PathBuf;
use thiserror::Error;

/// Errors while reading, reshaping or splitting tables
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Input file or directory could not be opened
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV content
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Referenced column does not exist
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Column added twice
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// Column length differs from the table row count
    #[error("Column {column} has {actual} rows, table has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// Cell could not be interpreted as a date
    #[error("Invalid date {value:?} in row {row}")]
    InvalidDate { row: usize, value: String },

    /// Split ratio outside [0, 1]
    #[error("Ratio {0} is outside [0, 1]")]
    InvalidRatio(f64),

    /// Date range with start after end
    #[error("Date range starts at {start} after it ends at {end}")]
    InvalidRange { start: String, end: String },
}

impl DatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DatasetError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        DatasetError::Csv {
            path: path.into(),
            source,
        }
    }
}
