//! Feature Engineering Engine
//!
//! Sliding-window statistics over multivariate sensor sequences, window
//! labeling and per-use-instance summaries.

mod error;
mod features;
mod label;
mod statistics;
mod use_instance;
mod window;

pub use error::FeatureError;
pub use features::{ExtractorConfig, FeatureExtractor, FeatureVector, ObservationSequence};
pub use label::{label_from_f64, majority_label};
pub use statistics::{
    change_first_to_last, mean, mean_abs_change, median, Stat, Statistic, WindowStatistics,
};
pub use use_instance::{date_from_file_name, summarise_use_instances, UseInstanceConfig};
pub use window::{WindowBounds, WindowSpec};
