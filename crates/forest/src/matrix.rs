//! Dense Feature Matrix

use dataset::{DatasetError, Table};

/// Mean of the present values of each column, 0 for a column with none
pub fn column_means(table: &Table, names: &[String]) -> Result<Vec<f64>, DatasetError> {
    names
        .iter()
        .map(|name| {
            let values = table.numeric(name)?;
            let (sum, count) = values
                .iter()
                .flatten()
                .filter(|v| v.is_finite())
                .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
            Ok(if count == 0 { 0.0 } else { sum / count as f64 })
        })
        .collect()
}

/// Row-major numeric features; missing cells hold the column's fill value
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: Vec<Vec<f64>>,
    width: usize,
}

impl FeatureMatrix {
    /// Gather `names` from a table, replacing missing cells with `fill`
    pub fn from_table(table: &Table, names: &[String], fill: &[f64]) -> Result<Self, DatasetError> {
        let mut rows = vec![Vec::with_capacity(names.len()); table.len()];
        for (name, &fill) in names.iter().zip(fill) {
            for (row, value) in rows.iter_mut().zip(table.numeric(name)?) {
                row.push(value.filter(|v| v.is_finite()).unwrap_or(fill));
            }
        }
        Ok(Self {
            rows,
            width: names.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of features per row
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row(&self, index: usize) -> &[f64] {
        &self.rows[index]
    }

    pub fn value(&self, row: usize, feature: usize) -> f64 {
        self.rows[row][feature]
    }
}
