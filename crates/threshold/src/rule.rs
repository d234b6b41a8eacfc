//! Threshold Rules

use crate::ThresholdError;
use dataset::Table;
use evaluation::{Classifier, EvaluationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Comparison that makes a value positive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// `value <= cutoff`
    #[serde(rename = "le")]
    AtMost,
    /// `value > cutoff`
    #[serde(rename = "gt")]
    Above,
}

impl Direction {
    pub fn holds(self, value: f64, cutoff: f64) -> bool {
        match self {
            Direction::AtMost => value <= cutoff,
            Direction::Above => value > cutoff,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::AtMost => "le",
            Direction::Above => "gt",
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Direction::AtMost => "<=",
            Direction::Above => ">",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "le" | "<=" => Ok(Direction::AtMost),
            "gt" | ">" => Ok(Direction::Above),
            other => Err(ThresholdError::UnknownDirection(other.to_string())),
        }
    }
}

/// One field compared against one cutoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub field: String,
    pub cutoff: f64,
    pub direction: Direction,
}

impl ThresholdRule {
    pub fn new(field: impl Into<String>, cutoff: f64, direction: Direction) -> Self {
        Self {
            field: field.into(),
            cutoff,
            direction,
        }
    }

    /// A missing value never satisfies the rule
    pub fn predict(&self, value: Option<f64>) -> bool {
        value.map_or(false, |v| self.direction.holds(v, self.cutoff))
    }

    pub fn predict_column(&self, values: &[Option<f64>]) -> Vec<u8> {
        values.iter().map(|&v| u8::from(self.predict(v))).collect()
    }
}

impl fmt::Display for ThresholdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.direction.symbol(), self.cutoff)
    }
}

impl Classifier for ThresholdRule {
    fn predict(&self, table: &Table) -> Result<Vec<u8>, EvaluationError> {
        Ok(self.predict_column(&table.numeric(&self.field)?))
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

/// Rows are positive only when every rule is positive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conjunction {
    rules: Vec<ThresholdRule>,
}

impl Conjunction {
    /// Combine rules; a field may appear more than once only with one direction
    pub fn new(rules: Vec<ThresholdRule>) -> Result<Self, ThresholdError> {
        if rules.is_empty() {
            return Err(ThresholdError::EmptyConjunction);
        }

        let mut directions: BTreeMap<&str, Direction> = BTreeMap::new();
        for rule in &rules {
            match directions.get(rule.field.as_str()) {
                Some(&first) if first != rule.direction => {
                    return Err(ThresholdError::ConflictingDirection {
                        field: rule.field.clone(),
                        first,
                        second: rule.direction,
                    });
                }
                Some(_) => {}
                None => {
                    directions.insert(&rule.field, rule.direction);
                }
            }
        }

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    /// Write the rules as pretty JSON
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), ThresholdError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|source| ThresholdError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ThresholdError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, json).map_err(|source| ThresholdError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Saved {} rules to {}", self.rules.len(), path.display());
        Ok(())
    }

    /// Read rules written by [`Conjunction::save_json`], validating them again
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ThresholdError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ThresholdError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: Conjunction =
            serde_json::from_str(&raw).map_err(|source| ThresholdError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(parsed.rules)
    }
}

impl Classifier for Conjunction {
    fn predict(&self, table: &Table) -> Result<Vec<u8>, EvaluationError> {
        let mut predicted = vec![1u8; table.len()];
        for rule in &self.rules {
            let values = table.numeric(&rule.field)?;
            for (p, v) in predicted.iter_mut().zip(values) {
                *p &= u8::from(rule.predict(v));
            }
        }
        Ok(predicted)
    }

    fn describe(&self) -> String {
        self.rules
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataset::Cell;

    fn table() -> Table {
        Table::from_columns([
            (
                "pressure",
                vec![
                    Cell::Number(1.0),
                    Cell::Number(6.0),
                    Cell::Empty,
                    Cell::Number(8.0),
                ],
            ),
            (
                "flow",
                vec![
                    Cell::Number(10.0),
                    Cell::Number(2.0),
                    Cell::Number(1.0),
                    Cell::Number(9.0),
                ],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_direction_parse_and_holds() {
        assert_eq!("le".parse::<Direction>().unwrap(), Direction::AtMost);
        assert_eq!(">".parse::<Direction>().unwrap(), Direction::Above);
        assert!("ge".parse::<Direction>().is_err());
        assert!(Direction::AtMost.holds(5.0, 5.0));
        assert!(!Direction::Above.holds(5.0, 5.0));
    }

    #[test]
    fn test_missing_value_predicts_zero() {
        let rule = ThresholdRule::new("pressure", 5.0, Direction::AtMost);
        assert!(!rule.predict(None));
        assert_eq!(
            rule.predict_column(&[Some(1.0), None, Some(9.0)]),
            vec![1, 0, 0]
        );
    }

    #[test]
    fn test_conjunction_is_logical_and() {
        let conjunction = Conjunction::new(vec![
            ThresholdRule::new("pressure", 5.0, Direction::Above),
            ThresholdRule::new("flow", 5.0, Direction::AtMost),
        ])
        .unwrap();
        // only row 1 satisfies both; row 2 has no pressure
        assert_eq!(conjunction.predict(&table()).unwrap(), vec![0, 1, 0, 0]);
        assert_eq!(conjunction.describe(), "pressure > 5 AND flow <= 5");
    }

    #[test]
    fn test_conflicting_direction_rejected() {
        let result = Conjunction::new(vec![
            ThresholdRule::new("flow", 5.0, Direction::Above),
            ThresholdRule::new("flow", 2.0, Direction::AtMost),
        ]);
        assert!(matches!(
            result,
            Err(ThresholdError::ConflictingDirection { ref field, .. }) if field == "flow"
        ));

        // same field, same direction is fine
        assert!(Conjunction::new(vec![
            ThresholdRule::new("flow", 5.0, Direction::Above),
            ThresholdRule::new("flow", 2.0, Direction::Above),
        ])
        .is_ok());
    }

    #[test]
    fn test_empty_conjunction_rejected() {
        assert!(matches!(
            Conjunction::new(Vec::new()),
            Err(ThresholdError::EmptyConjunction)
        ));
    }

    #[test]
    fn test_unknown_field_is_error() {
        let rule = ThresholdRule::new("temperature", 1.0, Direction::Above);
        assert!(Classifier::predict(&rule, &table()).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules").join("rules.json");
        let conjunction = Conjunction::new(vec![
            ThresholdRule::new("pressure", 5.5, Direction::Above),
            ThresholdRule::new("flow", -1.25, Direction::AtMost),
        ])
        .unwrap();

        conjunction.save_json(&path).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"gt\""));
        assert_eq!(Conjunction::load_json(&path).unwrap(), conjunction);
    }

    #[test]
    fn test_load_rejects_conflicting_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        fs::write(
            &path,
            r#"{"rules":[{"field":"a","cutoff":1.0,"direction":"le"},{"field":"a","cutoff":2.0,"direction":"gt"}]}"#,
        )
        .unwrap();
        assert!(matches!(
            Conjunction::load_json(&path),
            Err(ThresholdError::ConflictingDirection { .. })
        ));
        assert!(matches!(
            Conjunction::load_json(dir.path().join("missing.json")),
            Err(ThresholdError::Io { .. })
        ));
    }
}
