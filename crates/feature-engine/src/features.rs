//! Feature Vector Assembly
//!
//! Slides a window over an observation sequence and reduces every window to
//! `{field}_{statistic}` features plus the window's majority label.

use crate::label::{label_from_f64, majority_label};
use crate::statistics::{Stat, Statistic, WindowStatistics};
use crate::window::WindowSpec;
use crate::FeatureError;
use dataset::{Cell, Table};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{debug, info, warn};

/// Time-ordered numeric fields with an optional label field
#[derive(Debug, Clone, Default)]
pub struct ObservationSequence {
    fields: Vec<(String, Vec<Option<f64>>)>,
    labels: Option<Vec<Option<i64>>>,
    len: usize,
}

impl ObservationSequence {
    /// Empty sequence of a given length; fields must match it
    pub fn with_len(len: usize) -> Self {
        Self {
            len,
            ..Default::default()
        }
    }

    /// Add a numeric field
    pub fn with_field(
        mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<Self, FeatureError> {
        let name = name.into();
        if values.len() != self.len {
            return Err(FeatureError::LengthMismatch {
                field: name,
                expected: self.len,
                actual: values.len(),
            });
        }
        self.fields.push((name, values));
        Ok(self)
    }

    /// Attach the label field
    pub fn with_labels(mut self, labels: Vec<Option<i64>>) -> Result<Self, FeatureError> {
        if labels.len() != self.len {
            return Err(FeatureError::LengthMismatch {
                field: "label".to_string(),
                expected: self.len,
                actual: labels.len(),
            });
        }
        self.labels = Some(labels);
        Ok(self)
    }

    /// Every numeric column except the label field and `exclude` becomes a
    /// field. Columns without a single numeric cell are skipped.
    pub fn from_table(
        table: &Table,
        label_field: &str,
        exclude: &[String],
    ) -> Result<Self, FeatureError> {
        let fields = feature_columns(table, label_field, exclude);
        Self::from_columns(table, &fields, label_field)
    }

    /// Build from the named fields of a table plus its label field, if present
    pub fn from_columns(
        table: &Table,
        fields: &[String],
        label_field: &str,
    ) -> Result<Self, FeatureError> {
        let mut sequence = Self::with_len(table.len());
        for name in fields {
            sequence = sequence.with_field(name.as_str(), table.numeric(name)?)?;
        }
        if table.has_column(label_field) {
            let labels: Vec<Option<i64>> = table
                .numeric(label_field)?
                .into_iter()
                .map(label_from_f64)
                .collect();
            sequence = sequence.with_labels(labels)?;
        }
        Ok(sequence)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn has_labels(&self) -> bool {
        self.labels.is_some()
    }
}

fn feature_columns(table: &Table, label_field: &str, exclude: &[String]) -> Vec<String> {
    let numeric: Vec<&str> = table.numeric_columns().collect();
    let mut fields = Vec::new();
    for name in table.headers() {
        if name == label_field || exclude.iter().any(|e| e == name) {
            continue;
        }
        if numeric.contains(&name) {
            fields.push(name.to_string());
        } else {
            debug!("Skipping non-numeric column {}", name);
        }
    }
    fields
}

/// Features of one window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    /// First row of the window
    pub start: usize,
    /// One past the last row
    pub end: usize,
    /// `{field}_{statistic}` features in column order
    pub features: Vec<(String, Stat)>,
    /// Majority label, `None` when the window has no labels
    pub label: Option<i64>,
}

impl FeatureVector {
    /// Look up a feature by column name
    pub fn get(&self, name: &str) -> Option<Stat> {
        self.features
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, stat)| *stat)
    }
}

/// Feature extraction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub window: WindowSpec,
    /// Label column, reduced by majority vote
    pub label_field: String,
    /// Columns that are neither features nor label (ids, timestamps)
    pub exclude: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            window: WindowSpec::default(),
            label_field: "danger_zone".to_string(),
            exclude: Vec::new(),
        }
    }
}

/// Sliding-window feature extractor
pub struct FeatureExtractor {
    config: ExtractorConfig,
}

impl FeatureExtractor {
    /// Create a new feature extractor
    pub fn new(config: ExtractorConfig) -> Result<Self, FeatureError> {
        config.window.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Lazily extract one feature vector per window
    pub fn extract<'a>(
        &'a self,
        sequence: &'a ObservationSequence,
    ) -> impl Iterator<Item = FeatureVector> + 'a {
        let names: Vec<Vec<String>> = sequence
            .fields
            .iter()
            .map(|(field, _)| Statistic::ALL.iter().map(|s| s.column_name(field)).collect())
            .collect();

        self.config
            .window
            .bounds(sequence.len())
            .map(move |range| Self::extract_window(sequence, &names, range))
    }

    fn extract_window(
        sequence: &ObservationSequence,
        names: &[Vec<String>],
        range: Range<usize>,
    ) -> FeatureVector {
        let mut features = Vec::with_capacity(names.len() * Statistic::ALL.len());
        for ((_, values), field_names) in sequence.fields.iter().zip(names) {
            let stats = WindowStatistics::compute(&values[range.clone()]);
            for ((_, stat), name) in stats.iter().zip(field_names) {
                features.push((name.clone(), stat));
            }
        }

        let label = sequence
            .labels
            .as_ref()
            .and_then(|labels| majority_label(&labels[range.clone()]));

        FeatureVector {
            start: range.start,
            end: range.end,
            features,
            label,
        }
    }

    /// Window a whole table into a feature table (one row per window).
    ///
    /// Returns `None` when no window could be formed, e.g. the table is
    /// shorter than the window size.
    pub fn segment_table(&self, table: &Table) -> Result<Option<Table>, FeatureError> {
        let sequence =
            ObservationSequence::from_table(table, &self.config.label_field, &self.config.exclude)?;
        let vectors: Vec<FeatureVector> = self.extract(&sequence).collect();

        if vectors.is_empty() {
            info!(
                "No segmentation performed: {} rows, window size {}",
                table.len(),
                self.config.window.size
            );
            return Ok(None);
        }

        info!("Calculated statistical features for {} windows", vectors.len());
        let labeled = sequence.has_labels();
        Ok(Some(self.to_table(&vectors, labeled, None)?))
    }

    /// Window each entity separately so no window spans two entities.
    ///
    /// Entities keep their first-appearance order and rows keep their order
    /// within an entity. The entity column is appended to the output.
    pub fn segment_by_entity(
        &self,
        table: &Table,
        entity_column: &str,
    ) -> Result<Option<Table>, FeatureError> {
        let keys = table.keys(entity_column)?;

        let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
        let mut dropped = 0;
        for (row, key) in keys.into_iter().enumerate() {
            let Some(key) = key else {
                dropped += 1;
                continue;
            };
            match groups.iter().position(|(k, _)| *k == key) {
                Some(idx) => groups[idx].1.push(row),
                None => groups.push((key, vec![row])),
            }
        }
        if dropped > 0 {
            warn!("Dropped {} rows without {}", dropped, entity_column);
        }

        // same fields for every entity, even one whose part of a column is empty
        let mut exclude = self.config.exclude.clone();
        exclude.push(entity_column.to_string());
        let fields = feature_columns(table, &self.config.label_field, &exclude);

        let mut tables = Vec::new();
        for (entity, rows) in groups {
            let part = table.take_rows(&rows);
            let sequence =
                ObservationSequence::from_columns(&part, &fields, &self.config.label_field)?;
            let vectors: Vec<FeatureVector> = self.extract(&sequence).collect();
            if vectors.is_empty() {
                debug!("Entity {} too short for a window ({} rows)", entity, rows.len());
                continue;
            }
            debug!("Entity {}: {} windows", entity, vectors.len());
            let ids = vec![Cell::from(entity.as_str()); vectors.len()];
            tables.push(self.to_table(&vectors, sequence.has_labels(), Some((entity_column, ids)))?);
        }

        if tables.is_empty() {
            info!("No segmentation performed: every entity is shorter than the window");
            return Ok(None);
        }

        let out = Table::concat(tables);
        info!("Calculated statistical features for {} windows", out.len());
        Ok(Some(out))
    }

    fn to_table(
        &self,
        vectors: &[FeatureVector],
        labeled: bool,
        entity: Option<(&str, Vec<Cell>)>,
    ) -> Result<Table, FeatureError> {
        let mut table = Table::new();
        let Some(first) = vectors.first() else {
            return Ok(table);
        };

        for (idx, (name, _)) in first.features.iter().enumerate() {
            let cells: Vec<Cell> = vectors
                .iter()
                .map(|v| Cell::from(v.features[idx].1.value()))
                .collect();
            table.push_column(name.clone(), cells)?;
        }
        if labeled {
            let labels: Vec<Cell> = vectors
                .iter()
                .map(|v| v.label.map(Cell::from).unwrap_or(Cell::Empty))
                .collect();
            table.push_column(self.config.label_field.clone(), labels)?;
        }
        if let Some((name, ids)) = entity {
            table.push_column(name, ids)?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(size: usize, stride: usize) -> FeatureExtractor {
        FeatureExtractor::new(ExtractorConfig {
            window: WindowSpec::new(size, stride).unwrap(),
            label_field: "y".to_string(),
            exclude: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn test_single_window_example() {
        let sequence = ObservationSequence::with_len(5)
            .with_field("v", (1..=5).map(|v| Some(v as f64)).collect())
            .unwrap()
            .with_labels(vec![Some(0), Some(0), Some(1), Some(1), Some(1)])
            .unwrap();

        let extractor = extractor(5, 1);
        let vectors: Vec<_> = extractor.extract(&sequence).collect();
        assert_eq!(vectors.len(), 1);

        let window = &vectors[0];
        assert_eq!(window.label, Some(1));
        assert_eq!(window.get("v_median"), Some(Stat::Value(3.0)));
        assert_eq!(window.get("v_minimum"), Some(Stat::Value(1.0)));
        assert_eq!(window.get("v_maximum"), Some(Stat::Value(5.0)));
        assert_eq!(window.get("v_change_first_to_last"), Some(Stat::Value(4.0)));
        assert_eq!(window.get("v_abs_diff_minmax"), Some(Stat::Value(4.0)));
        assert_eq!(window.features.len(), 10);
    }

    #[test]
    fn test_extraction_is_lazy_and_ordered() {
        let sequence = ObservationSequence::with_len(10)
            .with_field("v", (0..10).map(|v| Some(v as f64)).collect())
            .unwrap();
        let extractor = extractor(3, 3);

        let starts: Vec<usize> = extractor.extract(&sequence).map(|v| v.start).collect();
        assert_eq!(starts, vec![0, 3, 6]);

        let first = extractor.extract(&sequence).next().unwrap();
        assert_eq!(first.label, None);
        assert_eq!(first.get("v_mean"), Some(Stat::Value(1.0)));
    }

    #[test]
    fn test_degenerate_window_does_not_abort() {
        let sequence = ObservationSequence::with_len(4)
            .with_field("v", vec![None, None, Some(2.0), Some(4.0)])
            .unwrap();
        let vectors: Vec<_> = extractor(2, 1).extract(&sequence).collect();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0].get("v_mean"), Some(Stat::Undefined));
        assert_eq!(vectors[1].get("v_mean"), Some(Stat::Value(2.0)));
        assert_eq!(vectors[1].get("v_standard_deviation"), Some(Stat::Undefined));
        assert_eq!(vectors[2].get("v_variance"), Some(Stat::Value(2.0)));
    }

    #[test]
    fn test_length_mismatch() {
        let err = ObservationSequence::with_len(3)
            .with_field("v", vec![Some(1.0)])
            .unwrap_err();
        assert!(matches!(err, FeatureError::LengthMismatch { .. }));
    }

    #[test]
    fn test_segment_table() {
        let table =
            Table::from_reader("a,b,y\n1,10,0\n2,,0\n3,30,1\n4,40,1\n".as_bytes()).unwrap();
        let out = extractor(2, 2).segment_table(&table).unwrap().unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out.width(), 21);
        assert_eq!(out.numeric("a_mean").unwrap(), vec![Some(1.5), Some(3.5)]);
        assert_eq!(out.numeric("b_mean").unwrap(), vec![Some(10.0), Some(35.0)]);
        assert_eq!(out.numeric("y").unwrap(), vec![Some(0.0), Some(1.0)]);
        // single present value: undefined spread, written as an empty cell
        assert_eq!(out.column("b_variance").unwrap()[0], Cell::Empty);
    }

    #[test]
    fn test_text_columns_are_not_features() {
        let table = Table::from_reader(
            "timestamp,v,y\n2018-04-01 00:00:00,1,0\n2018-04-01 00:01:00,3,1\n".as_bytes(),
        )
        .unwrap();
        let out = extractor(2, 1).segment_table(&table).unwrap().unwrap();

        assert_eq!(out.width(), 11);
        assert!(!out.has_column("timestamp_mean"));
        assert_eq!(out.numeric("v_mean").unwrap(), vec![Some(2.0)]);
    }

    #[test]
    fn test_segment_short_table_is_none() {
        let table = Table::from_reader("a,y\n1,0\n2,1\n".as_bytes()).unwrap();
        assert!(extractor(7, 1).segment_table(&table).unwrap().is_none());
    }

    #[test]
    fn test_segment_by_entity_never_spans_entities() {
        let table = Table::from_reader(
            "craneID,v,y\nA,1,0\nA,2,0\nB,10,1\nA,3,0\nB,20,1\nC,5,0\n".as_bytes(),
        )
        .unwrap();
        let out = extractor(2, 1)
            .segment_by_entity(&table, "craneID")
            .unwrap()
            .unwrap();

        // A: rows 1,2,3 -> 2 windows; B: 10,20 -> 1 window; C too short
        assert_eq!(out.len(), 3);
        assert_eq!(
            out.keys("craneID").unwrap(),
            vec![Some("A".to_string()), Some("A".to_string()), Some("B".to_string())]
        );
        assert_eq!(
            out.numeric("v_mean").unwrap(),
            vec![Some(1.5), Some(2.5), Some(15.0)]
        );
        assert!(!out.has_column("craneID_mean"));
    }

    #[test]
    fn test_segment_by_entity_keeps_columns_empty_for_one_entity() {
        let table = Table::from_reader(
            "craneID,v,w,y\nA,1,,0\nA,2,,0\nB,3,7,1\nB,4,8,1\nC,5,,0\n".as_bytes(),
        )
        .unwrap();
        let out = extractor(2, 1)
            .segment_by_entity(&table, "craneID")
            .unwrap()
            .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out.numeric("w_mean").unwrap(), vec![None, Some(7.5)]);
        let headers: Vec<_> = out.headers().collect();
        assert_eq!(headers.last(), Some(&"craneID"));
        assert_eq!(headers.len(), 22);
    }

    #[test]
    fn test_segment_by_entity_drops_rows_without_entity() {
        let table =
            Table::from_reader("craneID,v,y\nA,1,0\n,9,1\nA,2,0\n".as_bytes()).unwrap();
        let out = extractor(2, 1)
            .segment_by_entity(&table, "craneID")
            .unwrap()
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.numeric("v_mean").unwrap(), vec![Some(1.5)]);
    }
}
