//! Bagged Tree Ensemble

use crate::matrix::{column_means, FeatureMatrix};
use crate::tree::{DecisionTree, TreeConfig};
use crate::ForestError;
use dataset::{DatasetError, Table};
use evaluation::{binary_labels, Classifier, EvaluationError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Random forest settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Minimum share of a tree's sample weight on each side of a split
    pub min_weight_fraction_leaf: f64,
    /// Features tried per split; square root of the feature count when unset
    pub max_features: Option<usize>,
    /// Reweight every bootstrap sample so both classes carry equal weight
    pub balanced: bool,
    /// Tree `i` draws its bootstrap sample from `seed + i`
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 50,
            max_depth: 5,
            min_samples_split: 10,
            min_samples_leaf: 4,
            min_weight_fraction_leaf: 0.3,
            max_features: None,
            balanced: true,
            seed: 42,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<(), ForestError> {
        if self.n_trees == 0 {
            return Err(ForestError::InvalidConfig("n_trees must be at least 1".into()));
        }
        if self.min_samples_leaf == 0 {
            return Err(ForestError::InvalidConfig(
                "min_samples_leaf must be at least 1".into(),
            ));
        }
        if !(0.0..=0.5).contains(&self.min_weight_fraction_leaf) {
            return Err(ForestError::InvalidConfig(format!(
                "min_weight_fraction_leaf must be within [0, 0.5], got {}",
                self.min_weight_fraction_leaf
            )));
        }
        Ok(())
    }

    fn tree_config(&self, width: usize) -> TreeConfig {
        let sqrt = (width as f64).sqrt().ceil() as usize;
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            min_weight_fraction_leaf: self.min_weight_fraction_leaf,
            max_features: Some(self.max_features.unwrap_or(sqrt).clamp(1, width)),
        }
    }
}

/// Per-sample weights of one bootstrap draw: `len / (2 * class count)` when
/// balanced, 1 otherwise
fn sample_weights(labels: &[u8], balanced: bool) -> Vec<f64> {
    if !balanced {
        return vec![1.0; labels.len()];
    }
    let positives = labels.iter().filter(|&&l| l == 1).count();
    let negatives = labels.len() - positives;
    let weight = |count: usize| labels.len() as f64 / (2.0 * count as f64);
    labels
        .iter()
        .map(|&l| if l == 1 { weight(positives) } else { weight(negatives) })
        .collect()
}

/// Trained forest; remembers its feature columns and the training means
/// used to fill missing cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    features: Vec<String>,
    fill: Vec<f64>,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Train on every numeric column of `table` except `label_column`
    pub fn fit(
        table: &Table,
        label_column: &str,
        config: &ForestConfig,
    ) -> Result<Self, ForestError> {
        config.validate()?;
        if table.is_empty() {
            return Err(ForestError::EmptyTrainingSet);
        }

        let labels = binary_labels(table, label_column)?;
        let features: Vec<String> = table
            .numeric_columns()
            .filter(|name| *name != label_column)
            .map(str::to_string)
            .collect();
        if features.is_empty() {
            return Err(ForestError::NoFeatures(label_column.to_string()));
        }

        let fill = column_means(table, &features)?;
        let matrix = FeatureMatrix::from_table(table, &features, &fill)?;
        let tree_config = config.tree_config(features.len());
        let n = matrix.len();

        let trees: Vec<DecisionTree> = (0..config.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(i as u64));
                let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let bag_labels: Vec<u8> = rows.iter().map(|&r| labels[r]).collect();
                let weights = sample_weights(&bag_labels, config.balanced);
                DecisionTree::fit(&matrix, &rows, &bag_labels, &weights, &tree_config, &mut rng)
            })
            .collect();

        debug!(
            "Tree depths: {:?}",
            trees.iter().map(DecisionTree::depth).collect::<Vec<_>>()
        );
        info!(
            "Trained {} trees on {} rows x {} features",
            trees.len(),
            n,
            features.len()
        );
        Ok(Self {
            features,
            fill,
            trees,
        })
    }

    /// Feature columns in training order
    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Positive-class probability per row, averaged over the trees
    pub fn predict_proba(&self, table: &Table) -> Result<Vec<f64>, DatasetError> {
        let matrix = FeatureMatrix::from_table(table, &self.features, &self.fill)?;
        Ok((0..matrix.len())
            .map(|row| {
                let sum: f64 = self
                    .trees
                    .iter()
                    .map(|tree| tree.predict_proba(matrix.row(row)))
                    .sum();
                sum / self.trees.len() as f64
            })
            .collect())
    }
}

impl Classifier for RandomForest {
    /// Positive only when the averaged probability exceeds one half
    fn predict(&self, table: &Table) -> Result<Vec<u8>, EvaluationError> {
        Ok(self
            .predict_proba(table)?
            .into_iter()
            .map(|p| u8::from(p > 0.5))
            .collect())
    }

    fn describe(&self) -> String {
        format!(
            "random forest ({} trees, {} features)",
            self.trees.len(),
            self.features.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evaluation::evaluate;

    /// `x` separates the classes at 20; `z` is noise and `note` is text
    fn separable(rows: usize) -> Table {
        let mut csv = String::from("x,z,note,danger_zone\n");
        for i in 0..rows {
            let label = u8::from(i >= rows / 2);
            let z = if i % 7 == 3 { String::new() } else { format!("{}", (i * 7) % 5) };
            csv.push_str(&format!("{},{},n{},{}\n", i, z, i, label));
        }
        Table::from_reader(csv.as_bytes()).unwrap()
    }

    fn small() -> ForestConfig {
        ForestConfig {
            n_trees: 15,
            min_samples_split: 4,
            min_samples_leaf: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_learns_separable_feature() {
        let train = separable(40);
        let forest = RandomForest::fit(&train, "danger_zone", &small()).unwrap();
        assert_eq!(forest.features(), &["x".to_string(), "z".to_string()]);
        assert_eq!(forest.n_trees(), 15);

        let test = Table::from_reader("x,z,danger_zone\n2,1,0\n8,,0\n33,4,1\n38,0,1\n".as_bytes())
            .unwrap();
        assert_eq!(forest.predict(&test).unwrap(), vec![0, 0, 1, 1]);

        let evaluation = evaluate(&forest, &test, "danger_zone").unwrap();
        assert_eq!(evaluation.f1, 1.0);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let train = separable(30);
        let a = RandomForest::fit(&train, "danger_zone", &small()).unwrap();
        let b = RandomForest::fit(&train, "danger_zone", &small()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.predict_proba(&train).unwrap(), b.predict_proba(&train).unwrap());
    }

    #[test]
    fn test_balanced_weights() {
        let weights = sample_weights(&[0, 0, 0, 1], true);
        assert_eq!(weights, vec![4.0 / 6.0, 4.0 / 6.0, 4.0 / 6.0, 2.0]);
        assert_eq!(sample_weights(&[0, 1], false), vec![1.0, 1.0]);
    }

    #[test]
    fn test_missing_feature_column_at_prediction() {
        let forest = RandomForest::fit(&separable(20), "danger_zone", &small()).unwrap();
        let test = Table::from_reader("x,danger_zone\n1,0\n".as_bytes()).unwrap();
        assert!(matches!(
            forest.predict(&test),
            Err(EvaluationError::Dataset(DatasetError::MissingColumn(_)))
        ));
    }

    #[test]
    fn test_rejects_unusable_training_tables() {
        let empty = Table::from_reader("x,danger_zone\n".as_bytes()).unwrap();
        assert!(matches!(
            RandomForest::fit(&empty, "danger_zone", &small()),
            Err(ForestError::EmptyTrainingSet)
        ));

        let labels_only = Table::from_reader("note,danger_zone\na,0\nb,1\n".as_bytes()).unwrap();
        assert!(matches!(
            RandomForest::fit(&labels_only, "danger_zone", &small()),
            Err(ForestError::NoFeatures(_))
        ));

        let bad = ForestConfig {
            n_trees: 0,
            ..Default::default()
        };
        assert!(matches!(
            RandomForest::fit(&separable(10), "danger_zone", &bad),
            Err(ForestError::InvalidConfig(_))
        ));
    }
}
