//! Weighted Entropy Decision Tree

use crate::matrix::FeatureMatrix;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Growth limits of a single tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    pub max_depth: usize,
    /// Minimum samples a node needs to be split
    pub min_samples_split: usize,
    /// Minimum samples on each side of a split
    pub min_samples_leaf: usize,
    /// Minimum share of the total sample weight on each side of a split
    pub min_weight_fraction_leaf: f64,
    /// Features tried per split, all when `None`
    pub max_features: Option<usize>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            min_samples_split: 10,
            min_samples_leaf: 4,
            min_weight_fraction_leaf: 0.0,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    /// Weighted share of the positive class
    Leaf { positive: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// One training sample: matrix row, 0/1 label and weight
#[derive(Debug, Clone, Copy)]
struct Sample {
    row: usize,
    label: u8,
    weight: f64,
}

/// Weighted class totals of a node
#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    negative: f64,
    positive: f64,
}

impl Totals {
    fn of(samples: &[Sample]) -> Self {
        samples.iter().fold(Self::default(), |mut t, s| {
            t.add(s);
            t
        })
    }

    fn add(&mut self, sample: &Sample) {
        if sample.label == 1 {
            self.positive += sample.weight;
        } else {
            self.negative += sample.weight;
        }
    }

    fn weight(&self) -> f64 {
        self.negative + self.positive
    }

    fn positive_share(&self) -> f64 {
        if self.weight() > 0.0 {
            self.positive / self.weight()
        } else {
            0.0
        }
    }

    /// Shannon entropy in bits
    fn entropy(&self) -> f64 {
        let total = self.weight();
        if total <= 0.0 {
            return 0.0;
        }
        [self.negative, self.positive]
            .iter()
            .filter(|&&w| w > 0.0)
            .map(|&w| {
                let p = w / total;
                -p * p.log2()
            })
            .sum()
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct Builder<'a> {
    matrix: &'a FeatureMatrix,
    config: &'a TreeConfig,
    min_leaf_weight: f64,
    rng: &'a mut StdRng,
}

impl Builder<'_> {
    fn build(&mut self, samples: Vec<Sample>, depth: usize) -> Node {
        let totals = Totals::of(&samples);
        let leaf = Node::Leaf {
            positive: totals.positive_share(),
        };

        if depth >= self.config.max_depth
            || samples.len() < self.config.min_samples_split
            || totals.entropy() <= 0.0
        {
            return leaf;
        }

        let Some(best) = self.best_split(&samples, totals) else {
            return leaf;
        };

        let (left, right): (Vec<Sample>, Vec<Sample>) = samples
            .into_iter()
            .partition(|s| self.matrix.value(s.row, best.feature) <= best.threshold);

        Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.build(left, depth + 1)),
            right: Box::new(self.build(right, depth + 1)),
        }
    }

    /// Highest information gain over a random subset of features.
    /// Thresholds are midpoints between consecutive distinct values.
    fn best_split(&mut self, samples: &[Sample], parent: Totals) -> Option<BestSplit> {
        let width = self.matrix.width();
        let mut features: Vec<usize> = (0..width).collect();
        features.shuffle(&mut *self.rng);
        features.truncate(self.config.max_features.unwrap_or(width).clamp(1, width.max(1)));

        let parent_entropy = parent.entropy();
        let total = parent.weight();
        let mut best: Option<BestSplit> = None;

        for feature in features {
            let mut sorted = samples.to_vec();
            sorted.sort_by(|a, b| {
                self.matrix
                    .value(a.row, feature)
                    .partial_cmp(&self.matrix.value(b.row, feature))
                    .unwrap_or(Ordering::Equal)
            });

            let mut left = Totals::default();
            for i in 0..sorted.len() - 1 {
                left.add(&sorted[i]);
                let here = self.matrix.value(sorted[i].row, feature);
                let next = self.matrix.value(sorted[i + 1].row, feature);
                if here == next {
                    continue;
                }

                let left_count = i + 1;
                let right_count = sorted.len() - left_count;
                let right = Totals {
                    negative: parent.negative - left.negative,
                    positive: parent.positive - left.positive,
                };
                if left_count < self.config.min_samples_leaf
                    || right_count < self.config.min_samples_leaf
                    || left.weight() < self.min_leaf_weight
                    || right.weight() < self.min_leaf_weight
                {
                    continue;
                }

                let children = (left.weight() * left.entropy() + right.weight() * right.entropy())
                    / total;
                let gain = parent_entropy - children;
                if gain > best.as_ref().map_or(0.0, |b| b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: (here + next) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }
}

/// Binary classification tree grown on weighted samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Node,
}

impl DecisionTree {
    /// Grow a tree on the matrix rows in `rows` (repeats allowed), each with
    /// its label and weight
    pub fn fit(
        matrix: &FeatureMatrix,
        rows: &[usize],
        labels: &[u8],
        weights: &[f64],
        config: &TreeConfig,
        rng: &mut StdRng,
    ) -> Self {
        let samples: Vec<Sample> = rows
            .iter()
            .zip(labels)
            .zip(weights)
            .map(|((&row, &label), &weight)| Sample { row, label, weight })
            .collect();
        let min_leaf_weight = config.min_weight_fraction_leaf * Totals::of(&samples).weight();

        let mut builder = Builder {
            matrix,
            config,
            min_leaf_weight,
            rng,
        };
        Self {
            root: builder.build(samples, 0),
        }
    }

    /// Probability of the positive class for one feature row
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { positive } => return *positive,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Levels below the root; 0 for a single leaf
    pub fn depth(&self) -> usize {
        fn walk(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }
}
