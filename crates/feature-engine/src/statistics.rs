//! Window Statistics Computation
//!
//! Every statistic is a pure function of the window's values. Missing values
//! are skipped; a statistic that cannot be computed from what is left is
//! reported as [`Stat::Undefined`] instead of a default number.

use serde::{Deserialize, Serialize};

/// Floating point noise below this is treated as zero when checking for
/// constant windows
const FP_EPSILON: f64 = 1e-14;

/// Result of one statistic over one window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Stat {
    /// Computed value
    Value(f64),
    /// Not computable (too few values, all missing)
    #[default]
    Undefined,
}

impl Stat {
    /// Wrap a number, mapping NaN and infinities to `Undefined`
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            Stat::Value(value)
        } else {
            Stat::Undefined
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Stat::Value(v) => Some(v),
            Stat::Undefined => None,
        }
    }

    pub fn is_undefined(self) -> bool {
        matches!(self, Stat::Undefined)
    }
}

impl From<Option<f64>> for Stat {
    fn from(value: Option<f64>) -> Self {
        value.map(Stat::from_f64).unwrap_or(Stat::Undefined)
    }
}

/// Statistic computed for each field of each window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    Median,
    Mean,
    Skewness,
    Minimum,
    Maximum,
    StandardDeviation,
    Variance,
    MeanAbsChange,
    AbsDiffMinMax,
    ChangeFirstToLast,
}

impl Statistic {
    /// All statistics in output column order
    pub const ALL: [Statistic; 10] = [
        Statistic::Median,
        Statistic::Mean,
        Statistic::Skewness,
        Statistic::Minimum,
        Statistic::Maximum,
        Statistic::StandardDeviation,
        Statistic::Variance,
        Statistic::MeanAbsChange,
        Statistic::AbsDiffMinMax,
        Statistic::ChangeFirstToLast,
    ];

    /// Column suffix
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Median => "median",
            Statistic::Mean => "mean",
            Statistic::Skewness => "skewness",
            Statistic::Minimum => "minimum",
            Statistic::Maximum => "maximum",
            Statistic::StandardDeviation => "standard_deviation",
            Statistic::Variance => "variance",
            Statistic::MeanAbsChange => "mean_abs_change",
            Statistic::AbsDiffMinMax => "abs_diff_minmax",
            Statistic::ChangeFirstToLast => "change_first_to_last",
        }
    }

    /// `{field}_{statistic}`
    pub fn column_name(&self, field: &str) -> String {
        format!("{}_{}", field, self.as_str())
    }
}

/// Statistical features for one field over one window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowStatistics {
    pub median: Stat,
    pub mean: Stat,
    /// Adjusted Fisher-Pearson skewness
    pub skewness: Stat,
    pub minimum: Stat,
    pub maximum: Stat,
    /// Sample standard deviation (n - 1)
    pub standard_deviation: Stat,
    /// Sample variance (n - 1)
    pub variance: Stat,
    /// Mean of |x[k] - x[k-1]| over adjacent present pairs
    pub mean_abs_change: Stat,
    /// |max - min|
    pub abs_diff_minmax: Stat,
    /// Last value minus first value
    pub change_first_to_last: Stat,
}

impl WindowStatistics {
    /// Compute all statistics for a window of possibly missing values
    pub fn compute(values: &[Option<f64>]) -> Self {
        let mut present: Vec<f64> = values.iter().flatten().copied().collect();

        let mean = mean_of(&present);
        let variance = variance_of(&present, mean);
        let skewness = skewness_of(&present, mean);

        present.sort_by(f64::total_cmp);
        let minimum = present.first().copied();
        let maximum = present.last().copied();

        Self {
            median: median_of_sorted(&present).into(),
            mean: mean.into(),
            skewness: skewness.into(),
            minimum: minimum.into(),
            maximum: maximum.into(),
            standard_deviation: variance.map(f64::sqrt).into(),
            variance: variance.into(),
            mean_abs_change: mean_abs_change(values),
            abs_diff_minmax: minimum.zip(maximum).map(|(lo, hi)| (hi - lo).abs()).into(),
            change_first_to_last: change_first_to_last(values),
        }
    }

    /// Value of one statistic
    pub fn get(&self, statistic: Statistic) -> Stat {
        match statistic {
            Statistic::Median => self.median,
            Statistic::Mean => self.mean,
            Statistic::Skewness => self.skewness,
            Statistic::Minimum => self.minimum,
            Statistic::Maximum => self.maximum,
            Statistic::StandardDeviation => self.standard_deviation,
            Statistic::Variance => self.variance,
            Statistic::MeanAbsChange => self.mean_abs_change,
            Statistic::AbsDiffMinMax => self.abs_diff_minmax,
            Statistic::ChangeFirstToLast => self.change_first_to_last,
        }
    }

    /// All statistics in column order
    pub fn iter(&self) -> impl Iterator<Item = (Statistic, Stat)> + '_ {
        Statistic::ALL.iter().map(move |&s| (s, self.get(s)))
    }
}

fn mean_of(present: &[f64]) -> Option<f64> {
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

fn variance_of(present: &[f64], mean: Option<f64>) -> Option<f64> {
    let mean = mean?;
    if present.len() < 2 {
        return None;
    }
    let m2: f64 = present.iter().map(|v| (v - mean).powi(2)).sum();
    Some(m2 / (present.len() - 1) as f64)
}

fn skewness_of(present: &[f64], mean: Option<f64>) -> Option<f64> {
    let mean = mean?;
    let n = present.len() as f64;
    if present.len() < 3 {
        return None;
    }

    let mut m2 = 0.0_f64;
    let mut m3 = 0.0_f64;
    for &v in present {
        let d = v - mean;
        m2 += d * d;
        m3 += d * d * d;
    }
    if m2.abs() < FP_EPSILON {
        return Some(0.0);
    }
    if m3.abs() < FP_EPSILON {
        m3 = 0.0;
    }

    Some(n * (n - 1.0).sqrt() / (n - 2.0) * m3 / m2.powf(1.5))
}

fn median_of_sorted(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

/// Median of the present values
pub fn median(values: &[Option<f64>]) -> Stat {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    present.sort_by(f64::total_cmp);
    median_of_sorted(&present).into()
}

/// Mean of the present values
pub fn mean(values: &[Option<f64>]) -> Stat {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    mean_of(&present).into()
}

/// Mean absolute first difference over positions where both neighbours are present
pub fn mean_abs_change(values: &[Option<f64>]) -> Stat {
    let (total, pairs) = values
        .windows(2)
        .filter_map(|pair| Some((pair[1]? - pair[0]?).abs()))
        .fold((0.0, 0usize), |(t, c), d| (t + d, c + 1));
    if pairs == 0 {
        Stat::Undefined
    } else {
        Stat::from_f64(total / pairs as f64)
    }
}

/// Last value minus first value of the window, by position
pub fn change_first_to_last(values: &[Option<f64>]) -> Stat {
    match (values.first(), values.last()) {
        (Some(Some(first)), Some(Some(last))) => Stat::from_f64(last - first),
        _ => Stat::Undefined,
    }
}
