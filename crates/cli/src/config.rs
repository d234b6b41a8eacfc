//! Pipeline Configuration
//!
//! Every field has a default; an optional TOML file and `ANOMALY_LAB__*`
//! environment variables override them. `__` separates nesting levels, e.g.
//! `ANOMALY_LAB__WINDOW__WINDOW__SIZE=30` sets `window.window.size`.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use config::{Config, Environment, File};
use dataset::{pump_sensor_groups, pump_status_mapping, DateRange, SensorGroup};
use feature_engine::{ExtractorConfig, UseInstanceConfig};
use forest::ForestConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use threshold::SearchConfig;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Train/test partitioning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Share of entities assigned to train
    pub ratio: f64,
    /// Fixed shuffle seed; random when unset
    pub seed: Option<u64>,
    pub entity_column: String,
    pub label_column: String,
    /// Chronological split: leading share of rows used for training
    pub train_fraction: f64,
    /// Chronological split: trailing share (of the train length) left out of test
    pub tail_trim: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            ratio: 0.8,
            seed: None,
            entity_column: "craneID".to_string(),
            label_column: "danger_zone".to_string(),
            train_fraction: 0.5,
            tail_trim: 0.3,
        }
    }
}

/// Date-range labeling of crane use instances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelingConfig {
    pub date_column: String,
    pub label_column: String,
    /// Known danger-zone periods keyed by crane folder name
    pub danger_zones: BTreeMap<String, Vec<DateRange>>,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            date_column: "date".to_string(),
            label_column: "danger_zone".to_string(),
            danger_zones: crane_danger_zones(),
        }
    }
}

impl LabelingConfig {
    /// Ranges for one entity, empty when it never entered a danger zone.
    /// Falls back to a case-insensitive match since config sources may lowercase keys.
    pub fn ranges_for(&self, entity: &str) -> &[DateRange] {
        self.danger_zones
            .get(entity)
            .or_else(|| {
                self.danger_zones
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(entity))
                    .map(|(_, ranges)| ranges)
            })
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn range(start: (i32, u32, u32), end: (i32, u32, u32)) -> Option<DateRange> {
    Some(DateRange {
        start: NaiveDate::from_ymd_opt(start.0, start.1, start.2)?,
        end: NaiveDate::from_ymd_opt(end.0, end.1, end.2)?,
    })
}

/// Recorded danger-zone periods of the crane fleet
fn crane_danger_zones() -> BTreeMap<String, Vec<DateRange>> {
    let zones = [
        (
            "LT1200-1-P02-002_uncompressed",
            vec![range((2023, 8, 1), (2023, 8, 5))],
        ),
        (
            "LT1200-2-P01-002_uncompressed",
            vec![
                range((2024, 1, 12), (2024, 1, 31)),
                range((2023, 6, 5), (2023, 7, 2)),
            ],
        ),
        (
            "LT1200-2-P03-001_uncompressed",
            vec![range((2022, 4, 21), (2022, 5, 17))],
        ),
        (
            "Kran 4 uncompressed",
            vec![range((2023, 7, 21), (2023, 8, 18))],
        ),
        (
            "Kran 7 uncompressed",
            vec![
                range((2023, 10, 10), (2023, 11, 8)),
                range((2023, 4, 26), (2023, 5, 17)),
            ],
        ),
    ];

    zones
        .into_iter()
        .map(|(crane, ranges)| (crane.to_string(), ranges.into_iter().flatten().collect()))
        .collect()
}

/// Status mapping, sensor grouping and gap filling of the pump dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    pub status_column: String,
    pub status_mapping: BTreeMap<String, i64>,
    pub groups: Vec<SensorGroup>,
    /// Columns copied unchanged after the group averages
    pub keep: Vec<String>,
    /// Replacement for cells still missing after averaging
    pub fill_value: Option<f64>,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            status_column: "machine_status".to_string(),
            status_mapping: pump_status_mapping(),
            groups: pump_sensor_groups(),
            keep: vec!["machine_status".to_string()],
            fill_value: Some(0.0),
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    pub logging: LoggingConfig,
    pub window: ExtractorConfig,
    pub split: SplitConfig,
    pub search: SearchConfig,
    pub labeling: LabelingConfig,
    pub use_instances: UseInstanceConfig,
    pub grouping: GroupingConfig,
    pub forest: ForestConfig,
}

impl LabConfig {
    /// Reject values serde cannot rule out
    pub fn validate(&self) -> Result<()> {
        self.window.window.validate()?;
        self.forest.validate()?;

        for (name, ratio) in [
            ("split.ratio", self.split.ratio),
            ("split.train_fraction", self.split.train_fraction),
            ("split.tail_trim", self.split.tail_trim),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                bail!("{} must be within [0, 1], got {}", name, ratio);
            }
        }

        for (entity, ranges) in &self.labeling.danger_zones {
            for r in ranges {
                DateRange::new(r.start, r.end)
                    .with_context(|| format!("Invalid danger zone for {}", entity))?;
            }
        }
        Ok(())
    }
}

/// Load defaults, then the optional file, then environment overrides
pub fn load_config(path: Option<&Path>) -> Result<LabConfig> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }
    builder = builder.add_source(
        Environment::with_prefix("ANOMALY_LAB")
            .separator("__")
            .try_parsing(true),
    );

    let config: LabConfig = builder
        .build()
        .and_then(|settings| settings.try_deserialize())
        .with_context(|| match path {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Failed to load configuration from the environment".to_string(),
        })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use threshold::Direction;

    #[test]
    fn test_defaults() {
        let config = LabConfig::default();
        assert_eq!(config.window.window.size, 7);
        assert_eq!(config.window.window.stride, 1);
        assert_eq!(config.split.ratio, 0.8);
        assert_eq!(config.split.entity_column, "craneID");
        assert_eq!(config.search.candidates, 50);
        assert_eq!(config.use_instances.min_rows, 300);
        assert_eq!(config.labeling.ranges_for("Kran 7 uncompressed").len(), 2);
        assert!(config.labeling.ranges_for("Kran 1 uncompressed").is_empty());
        assert_eq!(config.grouping.groups.len(), 8);
        assert_eq!(config.search.label_column, config.split.label_column);
        assert_eq!(config.window.label_field, config.labeling.label_column);
        assert_eq!(config.search.direction_for("index_useinstance"), Direction::Above);
        assert_eq!(config.forest.n_trees, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab.toml");
        fs::write(
            &path,
            r#"
[window]
label_field = "danger_zone"

[window.window]
size = 30
stride = 5

[split]
seed = 42

[search]
candidates = 20

[search.directions]
sensor_a = "gt"

[labeling.danger_zones]
"Kran 9" = [{ start = "2023-01-01", end = "2023-01-10" }]
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.window.window.size, 30);
        assert_eq!(config.window.window.stride, 5);
        assert_eq!(config.window.label_field, "danger_zone");
        assert_eq!(config.split.seed, Some(42));
        assert_eq!(config.split.ratio, 0.8);
        assert_eq!(config.search.candidates, 20);
        assert_eq!(config.search.direction_for("sensor_a"), Direction::Above);
        assert_eq!(config.search.direction_for("sensor_b"), Direction::AtMost);
        assert_eq!(config.labeling.ranges_for("Kran 9").len(), 1);
    }

    #[test]
    fn test_mixed_case_map_keys_survive_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab.toml");
        fs::write(
            &path,
            r#"
[search.directions]
Feature_1 = "gt"

[grouping.status_mapping]
NORMAL = 0
BROKEN = 1
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.search.direction_for("Feature_1"), Direction::Above);

        let mut table =
            dataset::Table::from_reader("machine_status\nNORMAL\nBROKEN\n".as_bytes()).unwrap();
        let unmapped = dataset::map_status_labels(
            &mut table,
            "machine_status",
            &config.grouping.status_mapping,
        )
        .unwrap();
        assert_eq!(unmapped, 0);
        assert_eq!(
            table.numeric("machine_status").unwrap(),
            vec![Some(0.0), Some(1.0)]
        );
    }

    #[test]
    fn test_environment_overrides_nested_keys() {
        // keys no other test asserts on, since tests share the process environment
        std::env::set_var("ANOMALY_LAB__SPLIT__TAIL_TRIM", "0.25");
        std::env::set_var("ANOMALY_LAB__FOREST__N_TREES", "12");
        let config = load_config(None);
        std::env::remove_var("ANOMALY_LAB__SPLIT__TAIL_TRIM");
        std::env::remove_var("ANOMALY_LAB__FOREST__N_TREES");

        let config = config.unwrap();
        assert_eq!(config.split.tail_trim, 0.25);
        assert_eq!(config.forest.n_trees, 12);
    }

    #[test]
    fn test_invalid_window_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab.toml");
        fs::write(&path, "[window.window]\nsize = 0\nstride = 1\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut config = LabConfig::default();
        config.labeling.danger_zones.insert(
            "Kran 9".to_string(),
            vec![DateRange {
                start: NaiveDate::from_ymd_opt(2023, 2, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            }],
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(load_config(Some(Path::new("/nonexistent/lab.toml"))).is_err());
    }
}
