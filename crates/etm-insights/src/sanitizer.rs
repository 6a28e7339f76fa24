//! Leakage guard run before any engine sees the feature table
//!
//! Columns are quarantined when their name matches a deny pattern, when too
//! many of their cells are missing, or when they reproduce the outcome (or
//! its complement) on nearly every row. Warn-pattern columns stay in the
//! table and are only reported.

use std::collections::{BTreeMap, BTreeSet};

use etm_features::table::FeatureTable;
use regex::{Regex, RegexBuilder};

use crate::{config::SanitizerConfig, outcome::OutcomeColumn};

/// Equality tolerance when comparing a column with the outcome.
const EQUIVALENCE_TOLERANCE: f64 = 1e-8;

/// An invalid pattern in the sanitizer configuration.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("invalid sanitizer pattern `{pattern}`: {message}")]
pub struct PatternError {
    pub pattern: String,
    pub message: String,
}

/// What the sanitizer dropped and flagged.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct SanitizerReport {
    pub enabled: bool,
    /// Union of every quarantined column, sorted.
    pub dropped: Vec<String>,
    pub name_denied: Vec<String>,
    pub na_heavy: Vec<String>,
    pub outcome_equivalent: Vec<String>,
    pub warn_columns: Vec<String>,
    /// Missing-cell fraction of every input column.
    pub missing_fraction: BTreeMap<String, f64>,
}

/// Compiled sanitizer rules.
#[derive(Debug, Clone)]
pub struct LeakageSanitizer {
    config: SanitizerConfig,
    deny: Vec<Regex>,
    warn: Vec<Regex>,
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, PatternError> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| PatternError {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })
        })
        .collect()
}

impl LeakageSanitizer {
    pub fn new(config: &SanitizerConfig) -> Result<Self, PatternError> {
        Ok(Self {
            config: config.clone(),
            deny: compile(&config.deny_patterns)?,
            warn: compile(&config.warn_patterns)?,
        })
    }

    fn is_denied(&self, name: &str) -> bool {
        self.deny.iter().any(|re| re.is_match(name))
    }

    fn is_warned(&self, name: &str) -> bool {
        self.warn.iter().any(|re| re.is_match(name))
    }

    /// Whether `values` equals the outcome, or its complement, on at least
    /// the configured share of paired rows.
    #[expect(clippy::cast_precision_loss)]
    fn is_outcome_equivalent(&self, values: &[Option<f64>], outcome: &OutcomeColumn) -> bool {
        let pairs = values
            .iter()
            .zip(outcome.values())
            .filter_map(|(x, y)| Some(((*x)?, f64::from(u8::from((*y)?)))))
            .collect::<Vec<_>>();
        if pairs.is_empty() || pairs.len() < self.config.equivalence_min_rows {
            return false;
        }
        let close = |a: f64, b: f64| (a - b).abs() <= EQUIVALENCE_TOLERANCE;
        let same = pairs.iter().filter(|(x, y)| close(*x, *y)).count();
        let inverse = pairs.iter().filter(|(x, y)| close(*x, 1.0 - *y)).count();
        let share = same.max(inverse) as f64 / pairs.len() as f64;
        share >= self.config.outcome_equivalence_threshold
    }

    /// Returns the table without quarantined columns plus the report.
    ///
    /// The outcome column is never quarantined. A disabled sanitizer returns
    /// the table unchanged and only fills in missing fractions.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn sanitize(
        &self,
        table: &FeatureTable,
        outcome: &OutcomeColumn,
    ) -> (FeatureTable, SanitizerReport) {
        let mut report = SanitizerReport {
            enabled: self.config.enabled,
            ..SanitizerReport::default()
        };
        for column in table.columns() {
            let fraction = if column.is_empty() {
                0.0
            } else {
                column.missing_count() as f64 / column.len() as f64
            };
            report.missing_fraction.insert(column.name.clone(), fraction);
        }
        if !self.config.enabled {
            return (table.clone(), report);
        }

        for column in table.columns() {
            let name = &column.name;
            if name == outcome.name() {
                continue;
            }
            if self.is_denied(name) {
                report.name_denied.push(name.clone());
                continue;
            }
            if self.is_warned(name) {
                report.warn_columns.push(name.clone());
            }
            if report.missing_fraction[name] > self.config.max_missing_fraction {
                report.na_heavy.push(name.clone());
                continue;
            }
            if column
                .as_numeric()
                .is_some_and(|values| self.is_outcome_equivalent(values, outcome))
            {
                report.outcome_equivalent.push(name.clone());
            }
        }

        let dropped = report
            .name_denied
            .iter()
            .chain(&report.na_heavy)
            .chain(&report.outcome_equivalent)
            .cloned()
            .collect::<BTreeSet<_>>();
        report.dropped = dropped.iter().cloned().collect();
        tracing::info!(
            dropped = report.dropped.len(),
            name_denied = report.name_denied.len(),
            na_heavy = report.na_heavy.len(),
            outcome_equivalent = report.outcome_equivalent.len(),
            warn = report.warn_columns.len(),
            "sanitized feature table"
        );
        (table.without_columns(&dropped), report)
    }
}

#[cfg(test)]
mod tests {
    use etm_features::table::{ColumnSpec, Value};

    use super::*;

    fn build(rows: usize) -> FeatureTable {
        let schema = [
            ColumnSpec::numeric("graduated_me"),
            ColumnSpec::numeric("graduating_cgpa"),
            ColumnSpec::numeric("highest_cgpa"),
            ColumnSpec::numeric("sparse"),
            ColumnSpec::numeric("copy_of_result"),
            ColumnSpec::numeric("flipped"),
            ColumnSpec::categorical("campus"),
        ];
        let data = (0..rows)
            .map(|i| {
                let y = if i % 2 == 0 { 1.0 } else { 0.0 };
                let values = vec![
                    Value::Numeric(Some(y)),
                    Value::Numeric(Some(3.0)),
                    Value::Numeric(Some(2.5)),
                    Value::Numeric((i % 4 == 0).then_some(1.0)),
                    Value::Numeric(Some(y)),
                    Value::Numeric(Some(1.0 - y)),
                    Value::Categorical(Some("UP".to_owned())),
                ];
                (format!("s{i}"), values)
            })
            .collect();
        FeatureTable::from_rows(&schema, data)
    }

    fn run(table: &FeatureTable, config: &SanitizerConfig) -> (FeatureTable, SanitizerReport) {
        let outcome = OutcomeColumn::from_column(table.column("graduated_me").unwrap());
        LeakageSanitizer::new(config).unwrap().sanitize(table, &outcome)
    }

    #[test]
    fn test_quarantine_rules() {
        let table = build(120);
        let (sanitized, report) = run(&table, &SanitizerConfig::default());
        assert_eq!(report.name_denied, ["graduating_cgpa"]);
        assert_eq!(report.na_heavy, ["sparse"]);
        assert_eq!(report.outcome_equivalent, ["copy_of_result", "flipped"]);
        assert_eq!(report.warn_columns, ["highest_cgpa"]);
        assert_eq!(
            sanitized.header(),
            ["random_id", "graduated_me", "highest_cgpa", "campus"]
        );
        assert!((report.missing_fraction["sparse"] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_equivalence_needs_enough_rows() {
        let table = build(40);
        let (_, report) = run(&table, &SanitizerConfig::default());
        assert!(report.outcome_equivalent.is_empty());
    }

    #[test]
    fn test_disabled_keeps_everything() {
        let table = build(120);
        let config = SanitizerConfig {
            enabled: false,
            ..SanitizerConfig::default()
        };
        let (sanitized, report) = run(&table, &config);
        assert_eq!(sanitized, table);
        assert!(report.dropped.is_empty());
        assert_eq!(report.missing_fraction.len(), 7);
    }

    #[test]
    fn test_invalid_pattern() {
        let config = SanitizerConfig {
            deny_patterns: vec!["(".to_owned()],
            ..SanitizerConfig::default()
        };
        assert!(LeakageSanitizer::new(&config).is_err());
    }
}
