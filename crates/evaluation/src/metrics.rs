//! Binary Classification Metrics

use crate::EvaluationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `num / den`, or 0 when the denominator is 0
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// F1 of the positive class: `2tp / (2tp + fp + fn)`, 0 when undefined
pub fn f1_score(tp: usize, fp: usize, fn_: usize) -> f64 {
    ratio(2 * tp, 2 * tp + fp + fn_)
}

/// 2x2 confusion matrix, positive class is 1
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    /// Count outcomes over equal-length truth and prediction vectors.
    /// Any non-zero value counts as positive.
    pub fn from_predictions(truth: &[u8], predicted: &[u8]) -> Result<Self, EvaluationError> {
        if truth.len() != predicted.len() {
            return Err(EvaluationError::LengthMismatch {
                truth: truth.len(),
                predicted: predicted.len(),
            });
        }

        let mut matrix = Self::default();
        for (&t, &p) in truth.iter().zip(predicted) {
            match (t != 0, p != 0) {
                (false, false) => matrix.tn += 1,
                (false, true) => matrix.fp += 1,
                (true, false) => matrix.fn_ += 1,
                (true, true) => matrix.tp += 1,
            }
        }
        Ok(matrix)
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }

    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn f1(&self) -> f64 {
        f1_score(self.tp, self.fp, self.fn_)
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    /// Cell shares of the total in percent, rows = actual, columns = predicted
    pub fn percentages(&self) -> [[f64; 2]; 2] {
        let total = self.total();
        let pct = |n: usize| ratio(n, total) * 100.0;
        [
            [pct(self.tn), pct(self.fp)],
            [pct(self.fn_), pct(self.tp)],
        ]
    }

    /// Text rendering of the percentage heatmap
    pub fn render_heatmap(&self) -> String {
        let pct = self.percentages();
        let mut out = String::new();
        out.push_str(&format!("{:>12}{:>12}{:>12}\n", "", "pred 0", "pred 1"));
        for (actual, row) in pct.iter().enumerate() {
            out.push_str(&format!(
                "{:>12}{:>11.2}%{:>11.2}%\n",
                format!("actual {}", actual),
                row[0],
                row[1]
            ));
        }
        out
    }
}

/// Precision, recall, F1 and support of one class
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn from_counts(tp: usize, fp: usize, fn_: usize) -> Self {
        Self {
            precision: ratio(tp, tp + fp),
            recall: ratio(tp, tp + fn_),
            f1: f1_score(tp, fp, fn_),
            support: tp + fn_,
        }
    }
}

/// Per-class report for labels 0 and 1 with accuracy and averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn from_matrix(m: &ConfusionMatrix) -> Self {
        // class 0 as positive swaps the roles of tn/tp and fp/fn
        let negative = ClassMetrics::from_counts(m.tn, m.fn_, m.fp);
        let positive = ClassMetrics::from_counts(m.tp, m.fp, m.fn_);
        let classes = [negative, positive];
        let total = m.total();

        let macro_avg = ClassMetrics {
            precision: (negative.precision + positive.precision) / 2.0,
            recall: (negative.recall + positive.recall) / 2.0,
            f1: (negative.f1 + positive.f1) / 2.0,
            support: total,
        };

        let weighted = |get: fn(&ClassMetrics) -> f64| {
            if total == 0 {
                return 0.0;
            }
            classes
                .iter()
                .map(|c| get(c) * c.support as f64)
                .sum::<f64>()
                / total as f64
        };
        let weighted_avg = ClassMetrics {
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1: weighted(|c| c.f1),
            support: total,
        };

        Self {
            classes,
            accuracy: m.accuracy(),
            macro_avg,
            weighted_avg,
        }
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, name: &str, m: &ClassMetrics) -> fmt::Result {
    writeln!(
        f,
        "{:>12}{:>10.2}{:>10.2}{:>10.2}{:>10}",
        name, m.precision, m.recall, m.f1, m.support
    )
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>12}{:>10}{:>10}{:>10}{:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for (label, metrics) in self.classes.iter().enumerate() {
            write_row(f, &label.to_string(), metrics)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12}{:>10}{:>10}{:>10.2}{:>10}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        write_row(f, "macro avg", &self.macro_avg)?;
        write_row(f, "weighted avg", &self.weighted_avg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_confusion_counts() {
        let truth = [0, 0, 1, 1, 1, 0];
        let predicted = [0, 1, 1, 0, 1, 0];
        let m = ConfusionMatrix::from_predictions(&truth, &predicted).unwrap();
        assert_eq!(
            m,
            ConfusionMatrix {
                tn: 2,
                fp: 1,
                fn_: 1,
                tp: 2
            }
        );
        assert!(approx(m.precision(), 2.0 / 3.0));
        assert!(approx(m.recall(), 2.0 / 3.0));
        assert!(approx(m.f1(), 4.0 / 6.0));
        assert!(approx(m.accuracy(), 4.0 / 6.0));
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            ConfusionMatrix::from_predictions(&[0, 1], &[0]),
            Err(EvaluationError::LengthMismatch {
                truth: 2,
                predicted: 1
            })
        ));
    }

    #[test]
    fn test_f1_zero_division() {
        assert_eq!(f1_score(0, 0, 0), 0.0);
        let m = ConfusionMatrix::from_predictions(&[0, 0], &[0, 0]).unwrap();
        assert_eq!(m.f1(), 0.0);
        assert_eq!(m.precision(), 0.0);
    }

    #[test]
    fn test_percentages_sum_to_100() {
        let m = ConfusionMatrix {
            tn: 45,
            fp: 5,
            fn_: 3,
            tp: 47,
        };
        let pct = m.percentages();
        assert!(approx(pct[0][0], 45.0));
        assert!(approx(pct[1][1], 47.0));
        let sum: f64 = pct.iter().flatten().sum();
        assert!(approx(sum, 100.0));

        let heatmap = m.render_heatmap();
        assert!(heatmap.contains("actual 1"));
        assert!(heatmap.contains("47.00%"));
    }

    #[test]
    fn test_empty_matrix_percentages() {
        let pct = ConfusionMatrix::default().percentages();
        assert_eq!(pct, [[0.0, 0.0], [0.0, 0.0]]);
    }

    #[test]
    fn test_report_per_class() {
        let m = ConfusionMatrix {
            tn: 8,
            fp: 2,
            fn_: 1,
            tp: 4,
        };
        let report = ClassificationReport::from_matrix(&m);

        assert_eq!(report.classes[0].support, 10);
        assert_eq!(report.classes[1].support, 5);
        assert!(approx(report.classes[0].precision, 8.0 / 9.0));
        assert!(approx(report.classes[0].recall, 0.8));
        assert!(approx(report.classes[1].precision, 4.0 / 6.0));
        assert!(approx(report.classes[1].recall, 0.8));
        assert!(approx(report.accuracy, 12.0 / 15.0));
        assert!(approx(
            report.macro_avg.recall,
            (report.classes[0].recall + report.classes[1].recall) / 2.0
        ));
        assert!(approx(
            report.weighted_avg.precision,
            (8.0 / 9.0 * 10.0 + 4.0 / 6.0 * 5.0) / 15.0
        ));

        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("weighted avg"));
        assert!(text.contains("0.80"));
    }

    proptest! {
        #[test]
        fn prop_scores_bounded(pairs in proptest::collection::vec((0u8..2, 0u8..2), 0..100)) {
            let (truth, predicted): (Vec<u8>, Vec<u8>) = pairs.into_iter().unzip();
            let m = ConfusionMatrix::from_predictions(&truth, &predicted).unwrap();
            prop_assert_eq!(m.total(), truth.len());
            for score in [m.precision(), m.recall(), m.f1(), m.accuracy()] {
                prop_assert!((0.0..=1.0).contains(&score));
            }
            if m.total() > 0 {
                let sum: f64 = m.percentages().iter().flatten().sum();
                prop_assert!((sum - 100.0).abs() < 1e-9);
            }
        }
    }
}
