//! Use-Instance Summaries
//!
//! Each raw crane export file is one use instance. The whole file is reduced
//! to a single row: the signal median plus bookkeeping columns.

use crate::statistics::{median, Stat};
use crate::FeatureError;
use chrono::NaiveDate;
use dataset::{list_csv_files, Cell, Table};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{error, info};

/// Column layout of the use-instance table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UseInstanceConfig {
    /// Raw signal reduced by median
    pub signal_column: String,
    /// Instances with fewer rows are dropped
    pub min_rows: usize,
    pub label_column: String,
    pub date_column: String,
    pub length_column: String,
    pub entity_column: String,
    pub index_column: String,
}

impl Default for UseInstanceConfig {
    fn default() -> Self {
        Self {
            signal_column: "Values.WiFiSignalStrengthN".to_string(),
            min_rows: 300,
            label_column: "danger_zone".to_string(),
            date_column: "date".to_string(),
            length_column: "usecase_length".to_string(),
            entity_column: "craneID".to_string(),
            index_column: "index_useinstance".to_string(),
        }
    }
}

/// Date encoded in the first three `_`-separated parts of a file name,
/// e.g. `2023_08_01_14_02_33.csv`
pub fn date_from_file_name(name: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = name.splitn(4, '_').take(3).collect();
    if parts.len() < 3 {
        return None;
    }
    NaiveDate::parse_from_str(&parts.join("_"), "%Y_%m_%d").ok()
}

struct UseInstance {
    median: Stat,
    date: NaiveDate,
    rows: usize,
}

/// Summarise every CSV file in `dir` (one crane) into a use-instance table.
///
/// Files without a date in their name are logged and skipped. Instances
/// shorter than `min_rows` are dropped, the rest sorted by date and numbered
/// from 1. Returns `None` when no instance is left.
pub fn summarise_use_instances(
    dir: &Path,
    entity: &str,
    config: &UseInstanceConfig,
) -> Result<Option<Table>, FeatureError> {
    let mut instances = Vec::new();

    for file in list_csv_files(dir)? {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(date) = date_from_file_name(&name) else {
            error!("No date in file name {}, skipping", file.display());
            continue;
        };

        let table = Table::read_csv(&file)?;
        let signal = table.numeric(&config.signal_column)?;
        instances.push(UseInstance {
            median: median(&signal),
            date,
            rows: table.len(),
        });
    }

    let total = instances.len();
    instances.retain(|i| i.rows >= config.min_rows);
    info!(
        "Crane {}: kept {} of {} use instances with at least {} rows",
        entity,
        instances.len(),
        total,
        config.min_rows
    );
    if instances.is_empty() {
        return Ok(None);
    }

    // stable: same-day instances keep file order
    instances.sort_by_key(|i| i.date);

    let n = instances.len();
    let mut table = Table::new();
    table.push_column(
        format!("{}_median", config.signal_column),
        instances.iter().map(|i| Cell::from(i.median.value())).collect(),
    )?;
    table.push_column(config.label_column.clone(), vec![Cell::Number(0.0); n])?;
    table.push_column(
        config.date_column.clone(),
        instances
            .iter()
            .map(|i| Cell::Text(i.date.format("%Y-%m-%d").to_string()))
            .collect(),
    )?;
    table.push_column(
        config.length_column.clone(),
        instances.iter().map(|i| Cell::from(i.rows as i64)).collect(),
    )?;
    table.push_column(config.entity_column.clone(), vec![Cell::from(entity); n])?;
    table.push_column(
        config.index_column.clone(),
        (1..=n).map(|i| Cell::from(i as i64)).collect(),
    )?;

    Ok(Some(table))
}
