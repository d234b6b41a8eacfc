//! Random Forest Classifier
//!
//! Bagged entropy trees trained on windowed features, with missing cells
//! imputed from training means. Scored through the shared `Classifier`
//! interface like the threshold rules.

mod error;
mod forest;
mod matrix;
mod tree;

pub use error::ForestError;
pub use forest::{ForestConfig, RandomForest};
pub use matrix::{column_means, FeatureMatrix};
pub use tree::{DecisionTree, TreeConfig};
