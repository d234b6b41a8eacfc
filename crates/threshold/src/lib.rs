//! Threshold Classifier
//!
//! Monotone single-field rules, their conjunction, and exhaustive grid search
//! of the cutoff that maximizes F1 on labeled training data.

mod error;
mod rule;
mod search;

pub use error::ThresholdError;
pub use rule::{Conjunction, Direction, ThresholdRule};
pub use search::{
    column_candidates, fit_conjunction, grid_search, linspace, numeric_fields, score_cutoff,
    search_all_fields, search_field, Candidate, ConjunctionFit, FieldSearch, SearchConfig,
    SearchOutcome,
};
