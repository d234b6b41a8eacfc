//! Forest Error Types

use dataset::DatasetError;
use evaluation::EvaluationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForestError {
    #[error("Training table has no rows")]
    EmptyTrainingSet,

    #[error("Training table has no numeric feature besides label column {0}")]
    NoFeatures(String),

    #[error("Invalid forest config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}
