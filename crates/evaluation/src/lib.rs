//! Classifier Evaluation
//!
//! Confusion matrix, F1 and per-class classification reports for binary
//! anomaly labels, plus the interface every classifier implements.

mod classifier;
mod error;
mod metrics;

pub use classifier::{binary_labels, evaluate, Classifier, Evaluation};
pub use error::EvaluationError;
pub use metrics::{f1_score, ClassMetrics, ClassificationReport, ConfusionMatrix};
