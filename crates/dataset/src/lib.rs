//! Telemetry Dataset Preparation
//!
//! CSV tables with missing cells, per-unit concatenation, anomaly labeling,
//! sensor grouping and train/test partitioning.

mod concat;
mod error;
mod grouping;
mod labeling;
mod split;
mod table;

pub use concat::{concatenate_units, list_csv_files, list_unit_dirs};
pub use error::DatasetError;
pub use grouping::{group_averages, pump_sensor_groups, SensorGroup};
pub use labeling::{
    label_date_ranges, map_status_labels, parse_date, pump_status_mapping, DateRange,
};
pub use split::{chronological_split, entity_split, EntitySplit};
pub use table::{Cell, Table};
