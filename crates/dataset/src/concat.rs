//! Per-unit CSV Concatenation
//!
//! Raw exports are laid out as one sub-directory per unit (crane, machine),
//! each holding CSV files. These helpers walk that layout.

use crate::error::DatasetError;
use crate::table::Table;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Sub-directories of `source`, sorted by name
pub fn list_unit_dirs(source: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let entries = fs::read_dir(source).map_err(|e| DatasetError::io(source, e))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DatasetError::io(source, e))?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();

    if dirs.is_empty() {
        warn!("No unit directories within {}", source.display());
    } else {
        info!("Found {} unit directories within {}", dirs.len(), source.display());
    }
    Ok(dirs)
}

/// `*.csv` files directly inside `dir`, sorted by name
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let entries = fs::read_dir(dir).map_err(|e| DatasetError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| DatasetError::io(dir, e))?.path();
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Concatenate the first CSV file of every unit directory under `source`.
///
/// Returns `Ok(None)` when no unit directory contained a CSV file.
pub fn concatenate_units(source: &Path) -> Result<Option<Table>, DatasetError> {
    let mut tables = Vec::new();

    for dir in list_unit_dirs(source)? {
        match list_csv_files(&dir)?.first() {
            Some(file) => {
                let table = Table::read_csv(file)?;
                info!("Appended {} ({} rows)", file.display(), table.len());
                tables.push(table);
            }
            None => warn!("No CSV file found in {}", dir.display()),
        }
    }

    if tables.is_empty() {
        warn!("No CSV files found in the unit directories of {}", source.display());
        return Ok(None);
    }

    let table = Table::concat(tables);
    info!("Concatenated {} rows", table.len());
    Ok(Some(table))
}
