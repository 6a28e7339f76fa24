//! Binary outcome resolution and coercion
//!
//! The outcome column is looked up once, by name then aliases, and coerced to
//! `Option<bool>` per row. Numeric values are positive when greater than zero;
//! text is matched against fixed truthy and falsy vocabularies and anything
//! else is missing.

use etm_features::table::{Column, ColumnData, FeatureTable};

use crate::{config::AnalysisConfig, error::AnalysisError};

const TRUTHY: [&str; 9] = [
    "1",
    "y",
    "yes",
    "true",
    "t",
    "graduate",
    "graduated",
    "degree awarded",
    "awarded",
];
const FALSY: [&str; 9] = ["0", "n", "no", "false", "f", "not", "did not", "none", "missing"];

/// Coerces an outcome cell given as text.
///
/// ```
/// use etm_insights::outcome::coerce_text;
///
/// assert_eq!(coerce_text(" Degree Awarded "), Some(true));
/// assert_eq!(coerce_text("N"), Some(false));
/// assert_eq!(coerce_text("pending"), None);
/// ```
#[must_use]
pub fn coerce_text(text: &str) -> Option<bool> {
    let lower = text.trim().to_lowercase();
    if TRUTHY.contains(&lower.as_str()) {
        Some(true)
    } else if FALSY.contains(&lower.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Coerces a numeric outcome cell.
#[must_use]
pub fn coerce_number(value: f64) -> Option<bool> {
    (!value.is_nan()).then_some(value > 0.0)
}

/// The resolved binary outcome, one entry per table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeColumn {
    name: String,
    values: Vec<Option<bool>>,
}

impl OutcomeColumn {
    /// Finds the outcome column by name or alias and coerces it.
    pub fn resolve(table: &FeatureTable, config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let column = config
            .outcome_candidates()
            .find_map(|name| table.column(name))
            .ok_or_else(|| AnalysisError::MissingColumn {
                field: config.outcome.clone(),
                tried: config.outcome_candidates().collect::<Vec<_>>().join(", "),
            })?;
        if column.name != config.outcome {
            tracing::info!(alias = %column.name, outcome = %config.outcome, "outcome resolved through alias");
        }
        Ok(Self::from_column(column))
    }

    #[must_use]
    pub fn from_column(column: &Column) -> Self {
        let values = match &column.data {
            ColumnData::Numeric(v) => v.iter().map(|x| x.and_then(coerce_number)).collect(),
            ColumnData::Categorical(v) => v
                .iter()
                .map(|x| x.as_deref().and_then(coerce_text))
                .collect(),
        };
        Self {
            name: column.name.clone(),
            values,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn values(&self) -> &[Option<bool>] {
        &self.values
    }

    #[must_use]
    pub fn get(&self, row: usize) -> Option<bool> {
        self.values.get(row).copied().flatten()
    }

    /// Splits a numeric feature into outcome-positive and outcome-negative
    /// values over `rows`, dropping rows where either side is missing.
    pub fn split_numeric<I>(&self, values: &[Option<f64>], rows: I) -> (Vec<f64>, Vec<f64>)
    where
        I: IntoIterator<Item = usize>,
    {
        let mut positive = vec![];
        let mut negative = vec![];
        for row in rows {
            let (Some(x), Some(y)) = (values[row], self.get(row)) else {
                continue;
            };
            if y {
                positive.push(x);
            } else {
                negative.push(x);
            }
        }
        (positive, negative)
    }

    /// Outcome-positive count and total over the rows with a known outcome.
    pub fn tally<I>(&self, rows: I) -> OutcomeTally
    where
        I: IntoIterator<Item = usize>,
    {
        rows.into_iter()
            .filter_map(|row| self.get(row))
            .fold(OutcomeTally::default(), |mut tally, y| {
                tally.record(y);
                tally
            })
    }
}

/// Running outcome-positive and total counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeTally {
    pub positive: u64,
    pub total: u64,
}

impl OutcomeTally {
    pub fn record(&mut self, outcome: bool) {
        self.total += 1;
        if outcome {
            self.positive += 1;
        }
    }

    #[must_use]
    pub fn negative(&self) -> u64 {
        self.total - self.positive
    }

    /// Outcome-positive share, or `None` for an empty tally.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.positive as f64 / self.total as f64)
    }
}

#[cfg(test)]
mod tests {
    use etm_features::table::{ColumnSpec, Value};

    use super::*;

    fn table(outcome: &str, values: Vec<Value>) -> FeatureTable {
        let spec = match values[0] {
            Value::Numeric(_) => ColumnSpec::numeric(outcome),
            Value::Categorical(_) => ColumnSpec::categorical(outcome),
        };
        let rows = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (format!("s{i}"), vec![v]))
            .collect();
        FeatureTable::from_rows(&[spec], rows)
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(coerce_number(2.0), Some(true));
        assert_eq!(coerce_number(0.0), Some(false));
        assert_eq!(coerce_number(-1.0), Some(false));
        assert_eq!(coerce_number(f64::NAN), None);
    }

    #[test]
    fn test_resolve_by_name() {
        let t = table(
            "graduated_me",
            vec![Value::Numeric(Some(1.0)), Value::Numeric(None), Value::Numeric(Some(0.0))],
        );
        let outcome = OutcomeColumn::resolve(&t, &AnalysisConfig::default()).unwrap();
        assert_eq!(outcome.name(), "graduated_me");
        assert_eq!(outcome.values(), [Some(true), None, Some(false)]);
    }

    #[test]
    fn test_resolve_through_alias() {
        let t = table(
            "me_bs_degree_status",
            vec![
                Value::Categorical(Some("Degree Awarded".to_owned())),
                Value::Categorical(Some("no".to_owned())),
                Value::Categorical(Some("Seeking".to_owned())),
            ],
        );
        let outcome = OutcomeColumn::resolve(&t, &AnalysisConfig::default()).unwrap();
        assert_eq!(outcome.name(), "me_bs_degree_status");
        assert_eq!(outcome.values(), [Some(true), Some(false), None]);
    }

    #[test]
    fn test_missing_outcome_is_fatal() {
        let t = table("gpa", vec![Value::Numeric(Some(3.0))]);
        let err = OutcomeColumn::resolve(&t, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingColumn { ref field, .. } if field == "graduated_me"));
    }

    #[test]
    fn test_split_and_tally() {
        let t = table(
            "graduated_me",
            vec![
                Value::Numeric(Some(1.0)),
                Value::Numeric(Some(0.0)),
                Value::Numeric(Some(1.0)),
                Value::Numeric(None),
            ],
        );
        let outcome = OutcomeColumn::resolve(&t, &AnalysisConfig::default()).unwrap();
        let feature = [Some(3.5), Some(2.0), None, Some(1.0)];
        let (pos, neg) = outcome.split_numeric(&feature, 0..4);
        assert_eq!(pos, [3.5]);
        assert_eq!(neg, [2.0]);

        let tally = outcome.tally(0..4);
        assert_eq!(tally, OutcomeTally { positive: 2, total: 3 });
        assert_eq!(tally.negative(), 1);
        assert!((tally.rate().unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(OutcomeTally::default().rate(), None);
    }
}
