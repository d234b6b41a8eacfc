//! Train/Test Partitioning
//!
//! Entity-aware splitting keeps every row of a crane or machine on one side
//! of the boundary so windows from the same entity never leak into test.

use crate::error::DatasetError;
use crate::table::Table;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use tracing::{info, warn};

/// Result of an entity-aware split
#[derive(Debug, Clone)]
pub struct EntitySplit {
    pub train: Table,
    pub test: Table,
    /// Entities assigned to train, positives first
    pub train_entities: Vec<String>,
    /// Entities assigned to test, positives first
    pub test_entities: Vec<String>,
}

fn check_ratio(ratio: f64) -> Result<(), DatasetError> {
    if (0.0..=1.0).contains(&ratio) {
        Ok(())
    } else {
        Err(DatasetError::InvalidRatio(ratio))
    }
}

/// Split rows by entity, stratified on whether the entity has any positive row.
///
/// Entities with at least one `label == 1` row and the remaining entities
/// are shuffled separately; `floor(len * train_ratio)` of each group go to
/// train. Rows without an entity id are dropped.
pub fn entity_split(
    table: &Table,
    entity_column: &str,
    label_column: &str,
    train_ratio: f64,
    seed: Option<u64>,
) -> Result<EntitySplit, DatasetError> {
    check_ratio(train_ratio)?;

    let entities = table.keys(entity_column)?;
    let labels = table.numeric(label_column)?;

    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    let mut positive = HashSet::new();
    for (entity, label) in entities.iter().zip(&labels) {
        let Some(entity) = entity else { continue };
        if seen.insert(entity.clone()) {
            ordered.push(entity.clone());
        }
        if *label == Some(1.0) {
            positive.insert(entity.clone());
        }
    }

    let (mut positives, mut others): (Vec<String>, Vec<String>) =
        ordered.into_iter().partition(|e| positive.contains(e));

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    positives.shuffle(&mut rng);
    others.shuffle(&mut rng);

    let positive_cut = (positives.len() as f64 * train_ratio) as usize;
    let other_cut = (others.len() as f64 * train_ratio) as usize;

    let train_entities: Vec<String> = positives[..positive_cut]
        .iter()
        .chain(&others[..other_cut])
        .cloned()
        .collect();
    let test_entities: Vec<String> = positives[positive_cut..]
        .iter()
        .chain(&others[other_cut..])
        .cloned()
        .collect();

    let train_set: HashSet<&str> = train_entities.iter().map(String::as_str).collect();
    let test_set: HashSet<&str> = test_entities.iter().map(String::as_str).collect();

    let dropped = entities.iter().filter(|e| e.is_none()).count();
    if dropped > 0 {
        warn!("Dropped {} rows without {}", dropped, entity_column);
    }

    let in_set = |set: &HashSet<&str>| -> Vec<bool> {
        entities
            .iter()
            .map(|e| e.as_deref().map(|e| set.contains(e)).unwrap_or(false))
            .collect()
    };
    let train = table.filter_rows(&in_set(&train_set));
    let test = table.filter_rows(&in_set(&test_set));

    info!(
        "Entity split: {} train entities ({} rows), {} test entities ({} rows), {} positive entities",
        train_entities.len(),
        train.len(),
        test_entities.len(),
        test.len(),
        positives.len()
    );

    Ok(EntitySplit {
        train,
        test,
        train_entities,
        test_entities,
    })
}

/// Time-ordered split for a single long sequence.
///
/// The first `floor(n * train_fraction)` rows are train. Test starts right
/// after and stops `tail_trim` of the train length before the end, which
/// drops the trailing part of the recording.
pub fn chronological_split(
    table: &Table,
    train_fraction: f64,
    tail_trim: f64,
) -> Result<(Table, Table), DatasetError> {
    check_ratio(train_fraction)?;
    check_ratio(tail_trim)?;

    let n = table.len();
    let split = (n as f64 * train_fraction) as usize;
    let end = ((n as f64 - split as f64 * tail_trim) as usize).max(split);

    let train = table.slice_rows(0..split);
    let test = table.slice_rows(split..end);
    info!(
        "Chronological split: train rows [0, {}), test rows [{}, {})",
        split, split, end
    );
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fleet() -> Table {
        let mut csv = String::from("craneID,danger_zone,v\n");
        for crane in 0..10 {
            for row in 0..3 {
                let label = if crane < 4 && row == 2 { 1 } else { 0 };
                csv.push_str(&format!("C{},{},{}\n", crane, label, row));
            }
        }
        Table::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_entity_split_counts() {
        let split = entity_split(&fleet(), "craneID", "danger_zone", 0.75, Some(7)).unwrap();
        // 4 positive cranes -> 3 train, 6 others -> 4 train
        assert_eq!(split.train_entities.len(), 7);
        assert_eq!(split.test_entities.len(), 3);
        assert_eq!(split.train.len(), 21);
        assert_eq!(split.test.len(), 9);
    }

    #[test]
    fn test_entity_split_is_seeded() {
        let a = entity_split(&fleet(), "craneID", "danger_zone", 0.5, Some(42)).unwrap();
        let b = entity_split(&fleet(), "craneID", "danger_zone", 0.5, Some(42)).unwrap();
        assert_eq!(a.train_entities, b.train_entities);
        assert_eq!(a.test_entities, b.test_entities);
    }

    #[test]
    fn test_entity_split_rejects_bad_ratio() {
        assert!(matches!(
            entity_split(&fleet(), "craneID", "danger_zone", 1.5, None),
            Err(DatasetError::InvalidRatio(_))
        ));
    }

    #[test]
    fn test_rows_without_entity_are_dropped() {
        let table =
            Table::from_reader("craneID,danger_zone\nA,0\n,1\nB,1\n".as_bytes()).unwrap();
        let split = entity_split(&table, "craneID", "danger_zone", 1.0, Some(1)).unwrap();
        assert_eq!(split.train.len(), 2);
        assert!(split.test.is_empty());
    }

    #[test]
    fn test_numeric_entity_ids_stay_distinct() {
        let table =
            Table::from_reader("craneID,danger_zone\n007,1\n7,0\n7.0,0\n".as_bytes()).unwrap();
        let split = entity_split(&table, "craneID", "danger_zone", 1.0, Some(3)).unwrap();
        assert_eq!(split.train_entities.len(), 3);
        assert_eq!(split.train_entities[0], "007");

        let mut out = Vec::new();
        split.train.to_writer(&mut out).unwrap();
        let written = String::from_utf8(out).unwrap();
        assert!(written.contains("007,1\n"));
        assert!(written.contains("7.0,0\n"));
    }

    #[test]
    fn test_chronological_split_trims_tail() {
        let mut csv = String::from("v\n");
        for i in 0..100 {
            csv.push_str(&format!("{}\n", i));
        }
        let table = Table::from_reader(csv.as_bytes()).unwrap();

        let (train, test) = chronological_split(&table, 0.5, 0.3).unwrap();
        assert_eq!(train.len(), 50);
        // test covers [50, 85)
        assert_eq!(test.len(), 35);
        assert_eq!(test.numeric("v").unwrap()[0], Some(50.0));
    }

    proptest! {
        #[test]
        fn prop_no_entity_on_both_sides(ratio in 0.0f64..=1.0, seed in any::<u64>()) {
            let split = entity_split(&fleet(), "craneID", "danger_zone", ratio, Some(seed)).unwrap();
            let train: HashSet<_> = split.train.keys("craneID").unwrap().into_iter().collect();
            let test: HashSet<_> = split.test.keys("craneID").unwrap().into_iter().collect();
            prop_assert!(train.is_disjoint(&test));
            prop_assert_eq!(split.train.len() + split.test.len(), 30);
        }
    }
}
