//! Anomaly Labeling
//!
//! Marks rows as anomalous either by date range (crane danger zones) or by
//! mapping a textual machine status to a binary label (pump data).

use crate::error::DatasetError;
use crate::table::{Cell, Table};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DatasetError> {
        if start > end {
            return Err(DatasetError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Parse the date formats found in the exports:
/// `2023-08-01`, `2023-08-01 13:45:00`, `2023-08-01T13:45:00` and `2023_08_01`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y_%m_%d"))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
                .ok()
                .map(|dt| dt.date())
        })
}

/// Set `label_column` to 1 for every row whose date falls in one of `ranges`.
///
/// Rows outside all ranges keep their label; the column is created with 0
/// when absent. Returns the number of rows inside a range.
pub fn label_date_ranges(
    table: &mut Table,
    date_column: &str,
    label_column: &str,
    ranges: &[DateRange],
) -> Result<usize, DatasetError> {
    let dates = table
        .column(date_column)?
        .iter()
        .enumerate()
        .map(|(row, cell)| {
            let raw = cell.to_string();
            parse_date(&raw).ok_or(DatasetError::InvalidDate { row, value: raw })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut labels = if table.has_column(label_column) {
        table.column(label_column)?.to_vec()
    } else {
        vec![Cell::Number(0.0); table.len()]
    };

    let mut marked = 0;
    for (label, date) in labels.iter_mut().zip(&dates) {
        if ranges.iter().any(|r| r.contains(*date)) {
            *label = Cell::Number(1.0);
            marked += 1;
        }
    }

    table.set_column(label_column, labels)?;
    info!(
        "Labeled {} of {} rows as anomalous across {} date ranges",
        marked,
        table.len(),
        ranges.len()
    );
    Ok(marked)
}

fn status_label(mapping: &BTreeMap<String, i64>, status: &str) -> Option<i64> {
    mapping
        .get(status)
        .or_else(|| {
            mapping
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(status))
                .map(|(_, label)| label)
        })
        .copied()
}

/// Replace textual statuses with numeric labels.
///
/// Statuses are matched exactly, then ignoring ASCII case. Statuses missing
/// from `mapping` become empty cells; their count is returned and logged.
pub fn map_status_labels(
    table: &mut Table,
    column: &str,
    mapping: &BTreeMap<String, i64>,
) -> Result<usize, DatasetError> {
    let mut unmapped = 0;
    let cells: Vec<Cell> = table
        .column(column)?
        .iter()
        .map(|cell| match status_label(mapping, cell.to_string().trim()) {
            Some(label) => Cell::from(label),
            None => {
                unmapped += 1;
                Cell::Empty
            }
        })
        .collect();

    table.set_column(column, cells)?;
    if unmapped > 0 {
        warn!("{} rows of {} had a status without a label mapping", unmapped, column);
    }
    Ok(unmapped)
}

/// Status mapping used by the pump sensor dataset
pub fn pump_status_mapping() -> BTreeMap<String, i64> {
    BTreeMap::from([
        ("NORMAL".to_string(), 0),
        ("BROKEN".to_string(), 1),
        ("RECOVERING".to_string(), 1),
    ])
}
