//! Cutoff Grid Search

use crate::rule::{Conjunction, Direction, ThresholdRule};
use crate::ThresholdError;
use dataset::Table;
use evaluation::{binary_labels, f1_score};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Search settings shared by every field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Binary ground-truth column
    pub label_column: String,
    /// Number of evenly spaced cutoffs between a column's min and max
    pub candidates: usize,
    pub default_direction: Direction,
    /// Per-field direction overrides
    pub directions: BTreeMap<String, Direction>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            label_column: "danger_zone".to_string(),
            candidates: 50,
            default_direction: Direction::AtMost,
            // late use instances of a crane are the anomalous ones
            directions: BTreeMap::from([("index_useinstance".to_string(), Direction::Above)]),
        }
    }
}

impl SearchConfig {
    /// Override for `field`, matched exactly first and then ignoring ASCII
    /// case, since config sources may lowercase map keys
    pub fn direction_for(&self, field: &str) -> Direction {
        self.directions
            .get(field)
            .or_else(|| {
                self.directions
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(field))
                    .map(|(_, direction)| direction)
            })
            .copied()
            .unwrap_or(self.default_direction)
    }
}

/// `num` evenly spaced values from `min` to `max`, both included
pub fn linspace(min: f64, max: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (num - 1) as f64;
            (0..num)
                .map(|i| if i == num - 1 { max } else { min + step * i as f64 })
                .collect()
        }
    }
}

/// Candidates spanning the observed range of a column; empty when nothing is present
pub fn column_candidates(values: &[Option<f64>], num: usize) -> Vec<f64> {
    let mut present = values.iter().flatten().copied().filter(|v| v.is_finite());
    let Some(first) = present.next() else {
        return Vec::new();
    };
    let (min, max) = present.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    linspace(min, max, num)
}

/// F1 of predicting with one cutoff
pub fn score_cutoff(values: &[Option<f64>], labels: &[u8], direction: Direction, cutoff: f64) -> f64 {
    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (value, &label) in values.iter().zip(labels) {
        let predicted = value.map_or(false, |v| direction.holds(v, cutoff));
        match (predicted, label != 0) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            (false, false) => {}
        }
    }
    f1_score(tp, fp, fn_)
}

/// Cutoff and the F1 it reached on the training data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub cutoff: f64,
    pub f1: f64,
}

/// Result of one grid search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// `None` when no candidate reached an F1 above 0
    pub best: Option<Candidate>,
    pub evaluated: usize,
}

/// Evaluate every candidate and keep the one with the strictly greatest F1.
///
/// Ties keep the earliest candidate. The running best starts at F1 0, so a
/// search where every candidate scores 0 has no best.
pub fn grid_search(
    values: &[Option<f64>],
    labels: &[u8],
    direction: Direction,
    candidates: &[f64],
) -> Result<SearchOutcome, ThresholdError> {
    if values.len() != labels.len() {
        return Err(ThresholdError::LengthMismatch {
            values: values.len(),
            labels: labels.len(),
        });
    }

    let scores: Vec<f64> = candidates
        .par_iter()
        .map(|&cutoff| score_cutoff(values, labels, direction, cutoff))
        .collect();

    let mut best: Option<Candidate> = None;
    let mut best_f1 = 0.0;
    for (&cutoff, &f1) in candidates.iter().zip(&scores) {
        if f1 > best_f1 {
            best_f1 = f1;
            best = Some(Candidate { cutoff, f1 });
        }
    }

    debug!(
        "Grid search over {} candidates ({}): best {:?}",
        candidates.len(),
        direction,
        best
    );
    Ok(SearchOutcome {
        best,
        evaluated: candidates.len(),
    })
}

/// Search outcome for one named field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSearch {
    pub field: String,
    pub direction: Direction,
    pub outcome: SearchOutcome,
}

impl FieldSearch {
    /// The fitted rule, if the search found one
    pub fn rule(&self) -> Option<ThresholdRule> {
        self.outcome
            .best
            .map(|best| ThresholdRule::new(self.field.clone(), best.cutoff, self.direction))
    }
}

/// Columns with at least one numeric value, excluding the label
pub fn numeric_fields(table: &Table, label_column: &str) -> Vec<String> {
    table
        .numeric_columns()
        .filter(|name| *name != label_column)
        .map(str::to_string)
        .collect()
}

fn search_with_labels(
    table: &Table,
    field: &str,
    labels: &[u8],
    config: &SearchConfig,
) -> Result<FieldSearch, ThresholdError> {
    let values = table.numeric(field)?;
    let direction = config.direction_for(field);
    let candidates = column_candidates(&values, config.candidates);
    let outcome = grid_search(&values, labels, direction, &candidates)?;

    match outcome.best {
        Some(best) => info!(
            "{}: best cutoff {} ({}) with F1 {:.4}",
            field, best.cutoff, direction, best.f1
        ),
        None => warn!("{}: no cutoff reached an F1 above 0", field),
    }

    Ok(FieldSearch {
        field: field.to_string(),
        direction,
        outcome,
    })
}

/// Grid search one field against the configured label column
pub fn search_field(
    table: &Table,
    field: &str,
    config: &SearchConfig,
) -> Result<FieldSearch, ThresholdError> {
    let labels = binary_labels(table, &config.label_column)?;
    search_with_labels(table, field, &labels, config)
}

/// Independent search for every numeric field
pub fn search_all_fields(
    table: &Table,
    config: &SearchConfig,
) -> Result<Vec<FieldSearch>, ThresholdError> {
    let labels = binary_labels(table, &config.label_column)?;
    numeric_fields(table, &config.label_column)
        .iter()
        .map(|field| search_with_labels(table, field, &labels, config))
        .collect()
}

/// Per-field searches and the conjunction built from them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConjunctionFit {
    pub fields: Vec<FieldSearch>,
    /// `None` when no field produced a rule
    pub rules: Option<Conjunction>,
}

/// Fit one rule per field and combine them. An empty `fields` means every
/// numeric field. Fields without a best cutoff are left out of the conjunction.
pub fn fit_conjunction(
    table: &Table,
    fields: &[String],
    config: &SearchConfig,
) -> Result<ConjunctionFit, ThresholdError> {
    let searches = if fields.is_empty() {
        search_all_fields(table, config)?
    } else {
        let labels = binary_labels(table, &config.label_column)?;
        fields
            .iter()
            .map(|field| search_with_labels(table, field, &labels, config))
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut rules = Vec::new();
    for search in &searches {
        match search.rule() {
            Some(rule) => rules.push(rule),
            None => warn!("Leaving {} out of the conjunction", search.field),
        }
    }

    let rules = if rules.is_empty() {
        warn!("No field produced a cutoff with an F1 above 0");
        None
    } else {
        Some(Conjunction::new(rules)?)
    };
    Ok(ConjunctionFit {
        fields: searches,
        rules,
    })
}
