//! Classifier Interface and Evaluation

use crate::metrics::{ClassificationReport, ConfusionMatrix};
use crate::EvaluationError;
use dataset::{Cell, Table};
use serde::Serialize;
use tracing::info;

/// Anything that maps table rows to binary predictions
pub trait Classifier {
    /// One 0/1 prediction per row
    fn predict(&self, table: &Table) -> Result<Vec<u8>, EvaluationError>;

    /// Short name used in logs and reports
    fn describe(&self) -> String {
        "classifier".to_string()
    }
}

/// Binary ground truth of a label column. Missing or non-0/1 cells are errors.
pub fn binary_labels(table: &Table, column: &str) -> Result<Vec<u8>, EvaluationError> {
    table
        .column(column)?
        .iter()
        .enumerate()
        .map(|(row, cell)| match cell.as_f64() {
            Some(v) if v == 0.0 => Ok(0),
            Some(v) if v == 1.0 => Ok(1),
            _ => Err(EvaluationError::NonBinaryLabel {
                column: column.to_string(),
                row,
                value: match cell {
                    Cell::Empty => String::new(),
                    other => other.to_string(),
                },
            }),
        })
        .collect()
}

/// Result of scoring a classifier on a labeled table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub matrix: ConfusionMatrix,
    pub report: ClassificationReport,
    pub f1: f64,
}

/// Predict every row of `table` and score against `label_column`
pub fn evaluate<C: Classifier + ?Sized>(
    classifier: &C,
    table: &Table,
    label_column: &str,
) -> Result<Evaluation, EvaluationError> {
    let truth = binary_labels(table, label_column)?;
    let predicted = classifier.predict(table)?;
    let matrix = ConfusionMatrix::from_predictions(&truth, &predicted)?;
    let report = ClassificationReport::from_matrix(&matrix);

    info!(
        "Evaluated {} on {} rows: F1 {:.4} (tp={}, fp={}, fn={}, tn={})",
        classifier.describe(),
        truth.len(),
        matrix.f1(),
        matrix.tp,
        matrix.fp,
        matrix.fn_,
        matrix.tn
    );

    Ok(Evaluation {
        f1: matrix.f1(),
        matrix,
        report,
    })
}
