//! Majority Label Reduction

use std::collections::BTreeMap;

/// Statistical mode of the present labels.
///
/// Ties go to the smallest label. Returns `None` when every label is missing,
/// so an unlabeled window stays unlabeled.
pub fn majority_label(labels: &[Option<i64>]) -> Option<i64> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for label in labels.iter().flatten() {
        *counts.entry(*label).or_default() += 1;
    }

    let mut best: Option<(i64, usize)> = None;
    for (label, count) in counts {
        // ascending keys: only a strictly larger count replaces the smaller label
        if best.map(|(_, c)| count > c).unwrap_or(true) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label)
}

/// Interpret a numeric cell as an integer label; fractional values are not labels
pub fn label_from_f64(value: Option<f64>) -> Option<i64> {
    value.filter(|v| v.is_finite() && v.fract() == 0.0).map(|v| v as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_majority() {
        assert_eq!(
            majority_label(&[Some(0), Some(0), Some(1), Some(1), Some(1)]),
            Some(1)
        );
    }

    #[test]
    fn test_tie_goes_to_smallest() {
        assert_eq!(majority_label(&[Some(1), Some(0), Some(1), Some(0)]), Some(0));
        assert_eq!(majority_label(&[Some(3), Some(2)]), Some(2));
    }

    #[test]
    fn test_missing_labels() {
        assert_eq!(majority_label(&[None, None]), None);
        assert_eq!(majority_label(&[]), None);
        assert_eq!(majority_label(&[None, Some(1), None]), Some(1));
    }

    #[test]
    fn test_label_from_f64() {
        assert_eq!(label_from_f64(Some(1.0)), Some(1));
        assert_eq!(label_from_f64(Some(0.5)), None);
        assert_eq!(label_from_f64(None), None);
    }

    proptest! {
        #[test]
        fn prop_order_independent(
            mut labels in proptest::collection::vec(proptest::option::of(0i64..3), 0..40),
            rotate in 0usize..40,
        ) {
            let before = majority_label(&labels);
            labels.reverse();
            prop_assert_eq!(majority_label(&labels), before);
            if !labels.is_empty() {
                let by = rotate % labels.len();
                labels.rotate_left(by);
                prop_assert_eq!(majority_label(&labels), before);
            }
        }
    }
}
