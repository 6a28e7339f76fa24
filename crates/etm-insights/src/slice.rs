//! Direction stability of a feature's effect across confounder strata
//!
//! A feature whose association with the outcome flips sign inside most
//! levels of a confounder is a Simpson's-paradox suspect. For each
//! (feature, confounder) pair the effect is recomputed per stratum and
//! compared in sign with the whole-cohort effect:
//!
//! - numeric feature: `mean1 - mean0`, compared with zero
//! - categorical feature: risk ratio of the cohort's most frequent level
//!   against the rest, compared with one

use std::{cmp::Ordering, collections::BTreeMap};

use etm_features::table::{Column, ColumnData, FeatureTable};
use etm_stats::{descriptive, risk_ratio::RiskRatio};
use rayon::prelude::*;

use crate::{
    config::AnalysisConfig,
    error::{Engine, UnitFailure},
    outcome::{OutcomeColumn, OutcomeTally},
    risk_ratio::{counts_for, level_tallies},
};

/// Why a (feature, confounder) pair could not be checked.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum SliceError {
    #[display("feature column `{name}` not found")]
    MissingFeature { name: String },
    #[display("confounder column `{name}` not found")]
    MissingConfounder { name: String },
    #[display("no whole-cohort effect to compare against")]
    NoOverallEffect,
}

/// Effect measure used for a feature.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceMetric {
    /// Mean among outcome-positive minus mean among outcome-negative.
    MeanDiff,
    /// Risk ratio of the named level against every other level.
    RiskRatio { level: String },
}

impl SliceMetric {
    fn neutral(&self) -> f64 {
        match self {
            Self::MeanDiff => 0.0,
            Self::RiskRatio { .. } => 1.0,
        }
    }

    fn direction(&self, effect: f64) -> Option<Ordering> {
        effect.partial_cmp(&self.neutral())
    }
}

/// Effect inside one confounder level.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StratumEffect {
    pub level: String,
    pub n: usize,
    pub effect: f64,
    pub agrees: bool,
}

/// Stability of one feature across one confounder.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SliceResult {
    pub feature: String,
    pub confounder: String,
    pub metric: SliceMetric,
    pub overall_effect: f64,
    pub strata: Vec<StratumEffect>,
    /// Share of evaluated strata agreeing in sign; `None` when no stratum was
    /// large enough.
    pub agreement: Option<f64>,
    pub unstable: bool,
}

/// Confounder level per row, with numeric confounders rendered as text.
fn confounder_levels(column: &Column) -> Vec<Option<String>> {
    match &column.data {
        ColumnData::Categorical(values) => values.clone(),
        ColumnData::Numeric(_) => (0..column.len())
            .map(|row| (!column.is_missing(row)).then(|| column.render(row)))
            .collect(),
    }
}

/// Rows grouped by non-missing level, most frequent level first; ties go to
/// the smaller level.
fn grouped_by_level(
    values: &[Option<String>],
    rows: impl IntoIterator<Item = usize>,
) -> Vec<(String, Vec<usize>)> {
    let mut groups = BTreeMap::<&str, Vec<usize>>::new();
    for row in rows {
        if let Some(level) = values[row].as_deref() {
            groups.entry(level).or_default().push(row);
        }
    }
    let mut groups = groups
        .into_iter()
        .map(|(level, rows)| (level.to_owned(), rows))
        .collect::<Vec<_>>();
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));
    groups
}

/// The feature side of a slice check.
enum Contrast<'t> {
    Numeric(&'t [Option<f64>]),
    Categorical {
        values: &'t [Option<String>],
        level: String,
    },
}

impl Contrast<'_> {
    fn metric(&self) -> SliceMetric {
        match self {
            Self::Numeric(_) => SliceMetric::MeanDiff,
            Self::Categorical { level, .. } => SliceMetric::RiskRatio {
                level: level.clone(),
            },
        }
    }

    /// Effect over `rows`; numeric features need `min_group` rows per
    /// outcome group.
    fn effect(&self, outcome: &OutcomeColumn, rows: &[usize], min_group: usize) -> Option<f64> {
        match self {
            Self::Numeric(values) => {
                let (positive, negative) = outcome.split_numeric(values, rows.iter().copied());
                if positive.len() < min_group || negative.len() < min_group {
                    return None;
                }
                Some(descriptive::mean(&positive)? - descriptive::mean(&negative)?)
            }
            Self::Categorical { values, level } => {
                let tallies = level_tallies(values, outcome, rows.iter().copied());
                let overall = tallies.values().fold(OutcomeTally::default(), |acc, t| OutcomeTally {
                    positive: acc.positive + t.positive,
                    total: acc.total + t.total,
                });
                let counts = counts_for(*tallies.get(level.as_str())?, overall);
                if counts.n_level() == 0 || counts.n_rest() == 0 {
                    return None;
                }
                Some(RiskRatio::from_counts(counts).rr)
            }
        }
    }
}

/// Recomputes a feature's effect inside confounder strata.
#[derive(Debug, Clone, Copy)]
pub struct SliceStabilityEngine<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> SliceStabilityEngine<'a> {
    #[must_use]
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Checks one feature against one confounder.
    pub fn evaluate(
        &self,
        table: &FeatureTable,
        outcome: &OutcomeColumn,
        feature: &str,
        confounder: &str,
    ) -> Result<SliceResult, SliceError> {
        let feature_column = table.column(feature).ok_or_else(|| SliceError::MissingFeature {
            name: feature.to_owned(),
        })?;
        let confounder_column =
            table
                .column(confounder)
                .ok_or_else(|| SliceError::MissingConfounder {
                    name: confounder.to_owned(),
                })?;
        let all_rows = (0..table.len()).collect::<Vec<_>>();

        let contrast = match &feature_column.data {
            ColumnData::Numeric(values) => Contrast::Numeric(values),
            ColumnData::Categorical(values) => {
                let (level, _) = grouped_by_level(values, all_rows.iter().copied())
                    .into_iter()
                    .next()
                    .ok_or(SliceError::NoOverallEffect)?;
                Contrast::Categorical { values, level }
            }
        };
        let metric = contrast.metric();
        let overall_effect = contrast
            .effect(outcome, &all_rows, 1)
            .ok_or(SliceError::NoOverallEffect)?;
        let overall_direction = metric.direction(overall_effect);

        let min_group = self.config.slice_min_group_n.max(1);
        let levels = confounder_levels(confounder_column);
        let strata = grouped_by_level(&levels, all_rows.iter().copied())
            .into_iter()
            .take(self.config.slice_max_levels)
            .filter(|(_, rows)| rows.len() >= self.config.slice_min_stratum_n)
            .filter_map(|(level, rows)| {
                let effect = contrast.effect(outcome, &rows, min_group)?;
                Some(StratumEffect {
                    level,
                    n: rows.len(),
                    effect,
                    agrees: metric.direction(effect) == overall_direction,
                })
            })
            .collect::<Vec<_>>();

        #[expect(clippy::cast_precision_loss)]
        let agreement = (!strata.is_empty())
            .then(|| strata.iter().filter(|s| s.agrees).count() as f64 / strata.len() as f64);
        let unstable = agreement.is_some_and(|a| a < self.config.stability_threshold);
        if unstable {
            tracing::info!(feature, confounder, ?agreement, "effect direction unstable across strata");
        }
        Ok(SliceResult {
            feature: feature.to_owned(),
            confounder: confounder.to_owned(),
            metric,
            overall_effect,
            strata,
            agreement,
            unstable,
        })
    }

    /// Checks every feature against every configured confounder.
    #[must_use]
    pub fn run(
        &self,
        table: &FeatureTable,
        outcome: &OutcomeColumn,
        features: &[String],
    ) -> (Vec<SliceResult>, Vec<UnitFailure>) {
        let pairs = features
            .iter()
            .flat_map(|feature| {
                self.config
                    .confounders
                    .iter()
                    .filter(move |confounder| *confounder != feature)
                    .map(move |confounder| (feature.as_str(), confounder.as_str()))
            })
            .collect::<Vec<_>>();
        let checked = pairs
            .par_iter()
            .map(|&(feature, confounder)| {
                self.evaluate(table, outcome, feature, confounder).map_err(|e| {
                    UnitFailure::new(Engine::Slice, format!("{feature} by {confounder}"), e)
                })
            })
            .collect::<Vec<_>>();

        let mut results = vec![];
        let mut failures = vec![];
        for pair in checked {
            match pair {
                Ok(result) => results.push(result),
                Err(failure) => failures.push(failure),
            }
        }
        tracing::info!(
            results = results.len(),
            unstable = results.iter().filter(|r| r.unstable).count(),
            skipped = failures.len(),
            "checked slice stability"
        );
        (results, failures)
    }
}

#[cfg(test)]
mod tests {
    use etm_features::table::{ColumnSpec, Value};

    use super::*;

    fn cat(text: &str) -> Value {
        Value::Categorical(Some(text.to_owned()))
    }

    /// 200 students in two campuses of 100.
    ///
    /// `gpa` is higher among graduates in both campuses. `credits` is higher
    /// among graduates overall but lower inside each campus.
    fn table() -> FeatureTable {
        let schema = [
            ColumnSpec::numeric("graduated_me"),
            ColumnSpec::categorical("campus"),
            ColumnSpec::numeric("gpa"),
            ColumnSpec::numeric("credits"),
            ColumnSpec::categorical("ap"),
        ];
        let rows = (0..200)
            .map(|i| {
                let up = i < 100;
                let local = i % 100;
                // UP graduates 80%, WB graduates 20%
                let y = if up { local < 80 } else { local < 20 };
                let gpa = (if y { 3.2 } else { 2.6 }) + f64::from(local % 7) * 0.01;
                let base = if up { 100.0 } else { 10.0 };
                let credits = base + (if y { -1.0 } else { 1.0 }) + f64::from(local % 3);
                let ap = if y { "Y" } else { "N" };
                let values = vec![
                    Value::flag(Some(y)),
                    cat(if up { "UP" } else { "WB" }),
                    Value::Numeric(Some(gpa)),
                    Value::Numeric(Some(credits)),
                    cat(ap),
                ];
                (format!("s{i}"), values)
            })
            .collect();
        FeatureTable::from_rows(&schema, rows)
    }

    fn config() -> AnalysisConfig {
        AnalysisConfig {
            confounders: vec!["campus".to_owned(), "missing_column".to_owned()],
            ..AnalysisConfig::default()
        }
    }

    fn check(feature: &str) -> SliceResult {
        let table = table();
        let config = config();
        let outcome = OutcomeColumn::resolve(&table, &config).unwrap();
        SliceStabilityEngine::new(&config)
            .evaluate(&table, &outcome, feature, "campus")
            .unwrap()
    }

    #[test]
    fn test_consistent_numeric_effect_is_stable() {
        let result = check("gpa");
        assert_eq!(result.metric, SliceMetric::MeanDiff);
        assert!(result.overall_effect > 0.0);
        assert_eq!(result.strata.len(), 2);
        assert_eq!(result.agreement, Some(1.0));
        assert!(!result.unstable);
    }

    #[test]
    fn test_simpsons_reversal_is_unstable() {
        let result = check("credits");
        assert!(result.overall_effect > 0.0);
        assert!(result.strata.iter().all(|s| s.effect < 0.0));
        assert_eq!(result.agreement, Some(0.0));
        assert!(result.unstable);
    }

    #[test]
    fn test_categorical_uses_top_level_risk_ratio() {
        let result = check("ap");
        // 100 Y and 100 N; the tie goes to the smaller level name
        assert_eq!(result.metric, SliceMetric::RiskRatio { level: "N".to_owned() });
        assert!(result.overall_effect < 1.0);
        assert_eq!(result.agreement, Some(1.0));
    }

    #[test]
    fn test_small_strata_are_skipped() {
        let table = table();
        let config = AnalysisConfig {
            slice_min_stratum_n: 101,
            ..config()
        };
        let outcome = OutcomeColumn::resolve(&table, &config).unwrap();
        let result = SliceStabilityEngine::new(&config)
            .evaluate(&table, &outcome, "gpa", "campus")
            .unwrap();
        assert!(result.strata.is_empty());
        assert_eq!(result.agreement, None);
        assert!(!result.unstable);
    }

    #[test]
    fn test_missing_confounder_is_a_unit_failure() {
        let table = table();
        let config = config();
        let outcome = OutcomeColumn::resolve(&table, &config).unwrap();
        let (results, failures) =
            SliceStabilityEngine::new(&config).run(&table, &outcome, &["gpa".to_owned()]);
        assert_eq!(results.len(), 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].unit, "gpa by missing_column");
    }
}
