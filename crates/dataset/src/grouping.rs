//! Sensor Group Averaging
//!
//! Reduces many correlated sensor columns to one averaged column per group.

use crate::error::DatasetError;
use crate::table::{Cell, Table};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Named set of sensor columns averaged into one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorGroup {
    /// Output column name
    pub name: String,
    /// Input sensor columns
    pub members: Vec<String>,
}

impl SensorGroup {
    pub fn new(name: impl Into<String>, members: &[&str]) -> Self {
        Self {
            name: name.into(),
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Row-wise mean of each group's members, skipping missing cells.
///
/// A row where every member is missing yields an empty cell. The `keep`
/// columns are copied after the group columns, unchanged.
pub fn group_averages(
    table: &Table,
    groups: &[SensorGroup],
    keep: &[&str],
) -> Result<Table, DatasetError> {
    let mut out = Table::new();

    for group in groups {
        let members = group
            .members
            .iter()
            .map(|m| table.numeric(m))
            .collect::<Result<Vec<_>, _>>()?;

        let cells: Vec<Cell> = (0..table.len())
            .map(|row| {
                let (sum, count) = members
                    .iter()
                    .filter_map(|column| column[row])
                    .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
                if count == 0 {
                    Cell::Empty
                } else {
                    Cell::Number(sum / count as f64)
                }
            })
            .collect();

        debug!("Averaged {} sensors into {}", group.members.len(), group.name);
        out.push_column(group.name.clone(), cells)?;
    }

    for name in keep {
        out.push_column(*name, table.column(name)?.to_vec())?;
    }

    Ok(out)
}

/// Sensor grouping of the pump dataset (52 sensors reduced to 8 features)
pub fn pump_sensor_groups() -> Vec<SensorGroup> {
    vec![
        SensorGroup::new("Feature_1", &["sensor_01", "sensor_02"]),
        SensorGroup::new(
            "Feature_2",
            &["sensor_03", "sensor_04", "sensor_05", "sensor_06", "sensor_07", "sensor_08"],
        ),
        SensorGroup::new("Feature_3", &["sensor_09", "sensor_10", "sensor_11"]),
        SensorGroup::new("Feature_4", &["sensor_13", "sensor_16", "sensor_17"]),
        SensorGroup::new(
            "Feature_5",
            &["sensor_18", "sensor_19", "sensor_20", "sensor_21", "sensor_22", "sensor_23"],
        ),
        SensorGroup::new(
            "Feature_6",
            &[
                "sensor_24", "sensor_25", "sensor_27", "sensor_28", "sensor_29", "sensor_30",
                "sensor_31", "sensor_32",
            ],
        ),
        SensorGroup::new("Feature_7", &["sensor_33", "sensor_34"]),
        SensorGroup::new(
            "Feature_8",
            &[
                "sensor_37", "sensor_38", "sensor_39", "sensor_40", "sensor_41", "sensor_42",
                "sensor_44", "sensor_45", "sensor_46",
            ],
        ),
    ]
}
