//! Pipeline Steps
//!
//! One function per subcommand. Each reads its inputs from explicit paths,
//! writes its outputs and returns a summary for the caller to print.

use crate::config::LabConfig;
use anyhow::{Context, Result};
use dataset::{
    chronological_split, concatenate_units, entity_split, group_averages, label_date_ranges,
    list_unit_dirs, map_status_labels, Table,
};
use evaluation::{evaluate, Classifier, Evaluation};
use feature_engine::{summarise_use_instances, FeatureExtractor};
use forest::RandomForest;
use serde::Serialize;
use std::path::{Path, PathBuf};
use threshold::{fit_conjunction, Conjunction, ConjunctionFit};
use tracing::{info, warn};

/// File name of the per-crane use-instance table
pub const USE_INSTANCE_FILE: &str = "useinstance.csv";

fn read_table(path: &Path) -> Result<Table> {
    Table::read_csv(path).with_context(|| format!("Cannot read input table {}", path.display()))
}

fn write_table(table: &Table, path: &Path) -> Result<()> {
    table
        .write_csv(path)
        .with_context(|| format!("Cannot write {}", path.display()))?;
    info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

/// Rows and columns of a written table; `None` when nothing was written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

impl TableSummary {
    fn of(table: &Table, path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            rows: table.len(),
            columns: table.width(),
        }
    }
}

/// Concatenate one CSV per unit folder into a single table
pub fn concat(source: &Path, output: &Path) -> Result<Option<TableSummary>> {
    let Some(table) = concatenate_units(source)
        .with_context(|| format!("Cannot concatenate units in {}", source.display()))?
    else {
        warn!("Nothing to concatenate in {}, no output written", source.display());
        return Ok(None);
    };
    write_table(&table, output)?;
    Ok(Some(TableSummary::of(&table, output)))
}

/// Use-instance table written for one crane
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CraneSummary {
    pub crane: String,
    pub instances: usize,
    pub danger_zone: usize,
    pub path: PathBuf,
}

/// Summarise every crane folder under `source` into
/// `output_dir/<crane>/useinstance.csv`, labeled from the configured danger zones
pub fn use_instances(
    config: &LabConfig,
    source: &Path,
    output_dir: &Path,
) -> Result<Vec<CraneSummary>> {
    let mut summaries = Vec::new();

    for dir in list_unit_dirs(source)
        .with_context(|| format!("Cannot list crane folders in {}", source.display()))?
    {
        let crane = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let Some(mut table) = summarise_use_instances(&dir, &crane, &config.use_instances)
            .with_context(|| format!("Cannot summarise {}", dir.display()))?
        else {
            warn!("{}: no use instance long enough, skipping", crane);
            continue;
        };

        let danger_zone = label_date_ranges(
            &mut table,
            &config.use_instances.date_column,
            &config.use_instances.label_column,
            config.labeling.ranges_for(&crane),
        )?;

        let path = output_dir.join(&crane).join(USE_INSTANCE_FILE);
        write_table(&table, &path)?;
        summaries.push(CraneSummary {
            crane,
            instances: table.len(),
            danger_zone,
            path,
        });
    }

    Ok(summaries)
}

/// Labeling applied by [`label`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelSummary {
    pub table: TableSummary,
    /// Rows inside a danger zone (date labeling)
    pub labeled: Option<usize>,
    /// Statuses without a mapping (status labeling)
    pub unmapped: Option<usize>,
}

/// Label a table: by the entity's danger zones when `entity` is given,
/// otherwise by mapping the status column
pub fn label(
    config: &LabConfig,
    input: &Path,
    output: &Path,
    entity: Option<&str>,
) -> Result<LabelSummary> {
    let mut table = read_table(input)?;
    let (labeled, unmapped) = match entity {
        Some(entity) => {
            let ranges = config.labeling.ranges_for(entity);
            if ranges.is_empty() {
                info!("{} has no danger zones, all rows labeled 0", entity);
            }
            let marked = label_date_ranges(
                &mut table,
                &config.labeling.date_column,
                &config.labeling.label_column,
                ranges,
            )?;
            (Some(marked), None)
        }
        None => {
            let unmapped = map_status_labels(
                &mut table,
                &config.grouping.status_column,
                &config.grouping.status_mapping,
            )?;
            (None, Some(unmapped))
        }
    };

    write_table(&table, output)?;
    Ok(LabelSummary {
        table: TableSummary::of(&table, output),
        labeled,
        unmapped,
    })
}

/// Sliding-window features, optionally per entity
pub fn segment(
    config: &LabConfig,
    input: &Path,
    output: &Path,
    entity_column: Option<&str>,
) -> Result<Option<TableSummary>> {
    let table = read_table(input)?;
    let extractor = FeatureExtractor::new(config.window.clone())?;

    let features = match entity_column {
        Some(column) => extractor.segment_by_entity(&table, column)?,
        None => extractor.segment_table(&table)?,
    };
    let Some(features) = features else {
        warn!(
            "{} is shorter than one window, no output written",
            input.display()
        );
        return Ok(None);
    };

    write_table(&features, output)?;
    Ok(Some(TableSummary::of(&features, output)))
}

/// Map statuses to labels, average sensor groups and fill gaps
pub fn group(config: &LabConfig, input: &Path, output: &Path) -> Result<TableSummary> {
    let grouping = &config.grouping;
    let mut table = read_table(input)?;

    if table.has_column(&grouping.status_column) {
        map_status_labels(&mut table, &grouping.status_column, &grouping.status_mapping)?;
    }

    let keep: Vec<&str> = grouping
        .keep
        .iter()
        .map(String::as_str)
        .filter(|name| table.has_column(name))
        .collect();
    let mut grouped = group_averages(&table, &grouping.groups, &keep)?;

    if let Some(value) = grouping.fill_value {
        let filled = grouped.fill_missing(value);
        info!("Filled {} missing cells with {}", filled, value);
    }

    write_table(&grouped, output)?;
    Ok(TableSummary::of(&grouped, output))
}

/// Train and test tables written by [`split`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitSummary {
    pub train: TableSummary,
    pub test: TableSummary,
    pub train_entities: Vec<String>,
    pub test_entities: Vec<String>,
}

/// Entity-disjoint split, or a time-ordered one for a single sequence
pub fn split(
    config: &LabConfig,
    input: &Path,
    train_path: &Path,
    test_path: &Path,
    chronological: bool,
) -> Result<SplitSummary> {
    let table = read_table(input)?;
    let settings = &config.split;

    let (train, test, train_entities, test_entities) = if chronological {
        let (train, test) =
            chronological_split(&table, settings.train_fraction, settings.tail_trim)?;
        (train, test, Vec::new(), Vec::new())
    } else {
        let split = entity_split(
            &table,
            &settings.entity_column,
            &settings.label_column,
            settings.ratio,
            settings.seed,
        )?;
        (split.train, split.test, split.train_entities, split.test_entities)
    };

    write_table(&train, train_path)?;
    write_table(&test, test_path)?;
    Ok(SplitSummary {
        train: TableSummary::of(&train, train_path),
        test: TableSummary::of(&test, test_path),
        train_entities,
        test_entities,
    })
}

/// Per-field search results and the rules built from them
pub type SearchSummary = ConjunctionFit;

/// Grid search the given fields (all numeric fields when empty). With an
/// output path, the found cutoffs are saved as one conjunction.
pub fn search(
    config: &LabConfig,
    input: &Path,
    fields: &[String],
    output: Option<&Path>,
) -> Result<SearchSummary> {
    let table = read_table(input)?;
    let fit = fit_conjunction(&table, fields, &config.search)?;

    if let (Some(path), Some(rules)) = (output, &fit.rules) {
        rules.save_json(path)?;
        info!("Saved {} to {}", rules.describe(), path.display());
    }
    Ok(fit)
}

/// Apply saved rules to a labeled table
pub fn evaluate_rules(config: &LabConfig, input: &Path, rules: &Path) -> Result<Evaluation> {
    let conjunction = Conjunction::load_json(rules)
        .with_context(|| format!("Cannot load rules from {}", rules.display()))?;
    let table = read_table(input)?;
    Ok(evaluate(&conjunction, &table, &config.search.label_column)?)
}

/// Train a random forest on one feature table and score it on another
pub fn evaluate_forest(config: &LabConfig, train: &Path, test: &Path) -> Result<Evaluation> {
    let label = &config.search.label_column;
    let forest = RandomForest::fit(&read_table(train)?, label, &config.forest)
        .with_context(|| format!("Cannot train a random forest on {}", train.display()))?;
    let table = read_table(test)?;
    Ok(evaluate(&forest, &table, label)?)
}
