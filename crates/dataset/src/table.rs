//! Column-oriented CSV Table

use crate::error::DatasetError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::ops::Range;
use std::path::Path;
use tracing::debug;

/// A single CSV cell
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Cell {
    /// Empty field (missing value)
    #[default]
    Empty,
    /// Computed numeric value
    Number(f64),
    /// Numeric field read from CSV; `raw` is written back and used as its key,
    /// so `007`, `7` and `7.0` stay distinct
    Parsed { value: f64, raw: String },
    /// Anything that is not a number
    Text(String),
}

impl Cell {
    /// Parse a raw CSV field
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_nan() => Cell::Empty,
            Ok(value) => Cell::Parsed {
                value,
                raw: trimmed.to_string(),
            },
            Err(_) => Cell::Text(raw.to_string()),
        }
    }

    /// Numeric value, `None` for empty and text cells
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) | Cell::Parsed { value: v, .. } => Some(*v),
            _ => None,
        }
    }

    /// Text value, `None` for empty and numeric cells
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the cell holds no value
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Number(v) => write!(f, "{}", v),
            Cell::Parsed { raw, .. } => f.write_str(raw),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            Cell::Empty
        } else {
            Cell::Number(value)
        }
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map(Cell::from).unwrap_or(Cell::Empty)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

/// Named column of cells
#[derive(Debug, Clone, PartialEq)]
struct Column {
    name: String,
    cells: Vec<Cell>,
}

/// Ordered, column-oriented table read from or written to CSV
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from named columns of equal length
    pub fn from_columns<S: Into<String>>(
        columns: impl IntoIterator<Item = (S, Vec<Cell>)>,
    ) -> Result<Self, DatasetError> {
        let mut table = Self::new();
        for (name, cells) in columns {
            table.push_column(name, cells)?;
        }
        Ok(table)
    }

    /// Read a CSV file with a header row
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| DatasetError::io(path, e))?;
        let table = Self::from_reader(file).map_err(|e| DatasetError::csv(path, e))?;
        debug!(
            "Read {} rows x {} columns from {}",
            table.len(),
            table.width(),
            path.display()
        );
        Ok(table)
    }

    /// Parse CSV content from any reader
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let mut columns: Vec<Column> = reader
            .headers()?
            .iter()
            .map(|name| Column {
                name: name.trim().to_string(),
                cells: Vec::new(),
            })
            .collect();

        let mut rows = 0;
        for record in reader.records() {
            let record = record?;
            for (column, field) in columns.iter_mut().zip(record.iter()) {
                column.cells.push(Cell::parse(field));
            }
            rows += 1;
        }

        Ok(Self { columns, rows })
    }

    /// Write the table as CSV with a header row and no index column.
    /// Parent directories are created when missing.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), DatasetError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| DatasetError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| DatasetError::io(path, e))?;
        self.to_writer(file).map_err(|e| DatasetError::csv(path, e))?;
        debug!("Wrote {} rows to {}", self.rows, path.display());
        Ok(())
    }

    /// Serialize CSV content into any writer
    pub fn to_writer<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(self.columns.iter().map(|c| c.name.as_str()))?;
        for row in 0..self.rows {
            writer.write_record(self.columns.iter().map(|c| c.cells[row].to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Column names in order
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Cells of a column
    pub fn column(&self, name: &str) -> Result<&[Cell], DatasetError> {
        self.position(name)
            .map(|idx| self.columns[idx].cells.as_slice())
            .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
    }

    /// Columns holding at least one numeric cell, in order
    pub fn numeric_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.cells.iter().any(|cell| cell.as_f64().is_some()))
            .map(|c| c.name.as_str())
    }

    /// Numeric view of a column: empty and text cells become `None`
    pub fn numeric(&self, name: &str) -> Result<Vec<Option<f64>>, DatasetError> {
        Ok(self.column(name)?.iter().map(Cell::as_f64).collect())
    }

    /// String keys of a column (e.g. entity ids): empty cells become `None`
    pub fn keys(&self, name: &str) -> Result<Vec<Option<String>>, DatasetError> {
        Ok(self
            .column(name)?
            .iter()
            .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
            .collect())
    }

    /// Append a column. The first column of an empty table defines the row count.
    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        cells: Vec<Cell>,
    ) -> Result<(), DatasetError> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(DatasetError::DuplicateColumn(name));
        }
        if self.columns.is_empty() {
            self.rows = cells.len();
        } else if cells.len() != self.rows {
            return Err(DatasetError::LengthMismatch {
                column: name,
                expected: self.rows,
                actual: cells.len(),
            });
        }
        self.columns.push(Column { name, cells });
        Ok(())
    }

    /// Replace a column in place, or append it when absent
    pub fn set_column(
        &mut self,
        name: impl Into<String>,
        cells: Vec<Cell>,
    ) -> Result<(), DatasetError> {
        let name = name.into();
        match self.position(&name) {
            Some(idx) => {
                if cells.len() != self.rows {
                    return Err(DatasetError::LengthMismatch {
                        column: name,
                        expected: self.rows,
                        actual: cells.len(),
                    });
                }
                self.columns[idx].cells = cells;
                Ok(())
            }
            None => self.push_column(name, cells),
        }
    }

    /// Remove the named columns; every name must exist
    pub fn drop_columns(&mut self, names: &[&str]) -> Result<(), DatasetError> {
        if let Some(missing) = names.iter().find(|n| !self.has_column(n)) {
            return Err(DatasetError::MissingColumn(missing.to_string()));
        }
        self.columns.retain(|c| !names.contains(&c.name.as_str()));
        if self.columns.is_empty() {
            self.rows = 0;
        }
        Ok(())
    }

    /// New table holding only the named columns, in the given order
    pub fn select(&self, names: &[&str]) -> Result<Table, DatasetError> {
        let mut table = Table::new();
        for name in names {
            table.push_column(*name, self.column(name)?.to_vec())?;
        }
        Ok(table)
    }

    /// New table holding the given rows in the given order
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                cells: indices.iter().map(|&i| c.cells[i].clone()).collect(),
            })
            .collect();
        Table {
            columns,
            rows: indices.len(),
        }
    }

    /// New table holding rows where `mask` is true
    pub fn filter_rows(&self, mask: &[bool]) -> Table {
        let indices: Vec<usize> = mask
            .iter()
            .take(self.rows)
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        self.take_rows(&indices)
    }

    /// Contiguous row slice, clamped to the table length
    pub fn slice_rows(&self, range: Range<usize>) -> Table {
        let end = range.end.min(self.rows);
        let start = range.start.min(end);
        let indices: Vec<usize> = (start..end).collect();
        self.take_rows(&indices)
    }

    /// Replace every empty cell with a number; text cells are untouched
    pub fn fill_missing(&mut self, value: f64) -> usize {
        let mut filled = 0;
        for column in &mut self.columns {
            for cell in column.cells.iter_mut().filter(|c| c.is_empty()) {
                *cell = Cell::Number(value);
                filled += 1;
            }
        }
        filled
    }

    /// Row-wise concatenation. Headers are the union in first-seen order;
    /// columns a table lacks are filled with empty cells.
    pub fn concat(tables: impl IntoIterator<Item = Table>) -> Table {
        let mut out = Table::new();
        for table in tables {
            let offset = out.rows;
            for column in &mut out.columns {
                let incoming = table
                    .position(&column.name)
                    .map(|idx| table.columns[idx].cells.clone())
                    .unwrap_or_else(|| vec![Cell::Empty; table.rows]);
                column.cells.extend(incoming);
            }
            for column in table.columns {
                if !out.has_column(&column.name) {
                    let mut cells = vec![Cell::Empty; offset];
                    cells.extend(column.cells);
                    out.columns.push(Column {
                        name: column.name,
                        cells,
                    });
                }
            }
            out.rows = offset + table.rows;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let csv = "a,b,label\n1,2.5,0\n,x,1\n3,4,\n";
        Table::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_cells() {
        assert_eq!(Cell::parse(""), Cell::Empty);
        assert_eq!(Cell::parse(" 1.5 ").as_f64(), Some(1.5));
        assert_eq!(Cell::parse(" 1.5 ").to_string(), "1.5");
        assert_eq!(Cell::parse("NaN"), Cell::Empty);
        assert_eq!(Cell::parse("BROKEN"), Cell::Text("BROKEN".into()));
    }

    #[test]
    fn test_read_from_reader() {
        let table = sample();
        assert_eq!(table.len(), 3);
        assert_eq!(table.width(), 3);
        assert_eq!(
            table.numeric("a").unwrap(),
            vec![Some(1.0), None, Some(3.0)]
        );
        // text cells are missing in the numeric view
        assert_eq!(table.numeric("b").unwrap()[1], None);
        assert!(matches!(
            table.column("nope"),
            Err(DatasetError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_write_round_trip_keeps_empty_cells() {
        let table = sample();
        let mut out = Vec::new();
        table.to_writer(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "a,b,label\n1,2.5,0\n,x,1\n3,4,\n");
    }

    #[test]
    fn test_numeric_text_written_back_unchanged() {
        let csv = "id,a,b\n007,7.0,1e3\n7,-0,2.50\n";
        let table = Table::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.numeric("a").unwrap(), vec![Some(7.0), Some(-0.0)]);
        assert_eq!(table.numeric("b").unwrap(), vec![Some(1000.0), Some(2.5)]);

        let mut out = Vec::new();
        table.to_writer(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), csv);
    }

    #[test]
    fn test_numeric_ids_keep_distinct_keys() {
        let table = Table::from_reader("craneID\n007\n7\n7.0\n".as_bytes()).unwrap();
        assert_eq!(
            table.keys("craneID").unwrap(),
            vec![
                Some("007".to_string()),
                Some("7".to_string()),
                Some("7.0".to_string())
            ]
        );
    }

    #[test]
    fn test_numeric_columns_skip_text() {
        let mut table = sample();
        table
            .push_column("note", vec![Cell::from("x"), Cell::Empty, Cell::from("y")])
            .unwrap();
        assert_eq!(
            table.numeric_columns().collect::<Vec<_>>(),
            vec!["a", "b", "label"]
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Table::read_csv("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.csv"));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        sample().write_csv(&path).unwrap();
        let back = Table::read_csv(&path).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_push_column_length_mismatch() {
        let mut table = sample();
        let err = table.push_column("c", vec![Cell::Empty]).unwrap_err();
        assert!(matches!(err, DatasetError::LengthMismatch { .. }));
        assert!(matches!(
            table.push_column("a", vec![Cell::Empty; 3]),
            Err(DatasetError::DuplicateColumn(_))
        ));
    }

    #[test]
    fn test_concat_unions_headers() {
        let first = Table::from_reader("a,b\n1,2\n".as_bytes()).unwrap();
        let second = Table::from_reader("b,c\n3,4\n5,6\n".as_bytes()).unwrap();
        let joined = Table::concat(vec![first, second]);

        assert_eq!(joined.len(), 3);
        assert_eq!(joined.headers().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(joined.numeric("a").unwrap(), vec![Some(1.0), None, None]);
        assert_eq!(
            joined.numeric("b").unwrap(),
            vec![Some(2.0), Some(3.0), Some(5.0)]
        );
        assert_eq!(joined.numeric("c").unwrap(), vec![None, Some(4.0), Some(6.0)]);
    }

    #[test]
    fn test_row_selection() {
        let table = sample();
        assert_eq!(table.slice_rows(1..10).len(), 2);
        assert_eq!(table.slice_rows(5..10).len(), 0);

        let filtered = table.filter_rows(&[true, false, true]);
        assert_eq!(filtered.numeric("a").unwrap(), vec![Some(1.0), Some(3.0)]);
    }

    #[test]
    fn test_fill_and_drop() {
        let mut table = sample();
        assert_eq!(table.fill_missing(0.0), 2);
        assert_eq!(table.numeric("a").unwrap()[1], Some(0.0));
        assert_eq!(table.column("b").unwrap()[1], Cell::Text("x".into()));

        table.drop_columns(&["b"]).unwrap();
        assert_eq!(table.headers().collect::<Vec<_>>(), vec!["a", "label"]);
        assert!(table.drop_columns(&["b"]).is_err());
    }
}
