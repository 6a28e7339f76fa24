//! Cohen's d for every numeric feature against the outcome

use std::cmp::Ordering;

use etm_features::table::FeatureTable;
use etm_stats::effect_size::{self, EffectSizeError};
use rayon::prelude::*;

use crate::{
    config::AnalysisConfig,
    error::{Engine, UnitFailure},
    outcome::OutcomeColumn,
};

/// Standardized mean difference of one numeric feature.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EffectResult {
    pub feature: String,
    pub d: f64,
    /// `|d| · sqrt(n1 + n0)`.
    pub score: f64,
    pub n1: usize,
    pub n0: usize,
    pub mean1: f64,
    pub mean0: f64,
    /// Smaller group below the minimum cohort size.
    pub low_confidence: bool,
}

impl EffectResult {
    /// Descending score, then ascending feature name.
    #[must_use]
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.feature.cmp(&other.feature))
    }
}

/// Computes an [`EffectResult`] for each numeric column except the outcome.
#[derive(Debug, Clone, Copy)]
pub struct EffectSizeEngine<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> EffectSizeEngine<'a> {
    #[must_use]
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Effect of `values` over `rows`, with `feature` as the result's name.
    pub fn evaluate<I>(
        &self,
        feature: &str,
        values: &[Option<f64>],
        outcome: &OutcomeColumn,
        rows: I,
    ) -> Result<EffectResult, EffectSizeError>
    where
        I: IntoIterator<Item = usize>,
    {
        let (positive, negative) = outcome.split_numeric(values, rows);
        let effect = effect_size::cohens_d(&positive, &negative)?;
        Ok(EffectResult {
            feature: feature.to_owned(),
            d: effect.d,
            score: effect.score(),
            n1: effect.n1,
            n0: effect.n0,
            mean1: effect.mean1,
            mean0: effect.mean0,
            low_confidence: effect.n1.min(effect.n0) < self.config.min_cohort,
        })
    }

    /// Ranked results plus the features that could not be evaluated.
    #[must_use]
    pub fn run(
        &self,
        table: &FeatureTable,
        outcome: &OutcomeColumn,
    ) -> (Vec<EffectResult>, Vec<UnitFailure>) {
        let evaluated = table
            .columns()
            .par_iter()
            .filter(|column| column.name != outcome.name())
            .filter_map(|column| Some((column.name.as_str(), column.as_numeric()?)))
            .map(|(name, values)| {
                self.evaluate(name, values, outcome, 0..table.len())
                    .map_err(|e| UnitFailure::new(Engine::EffectSize, name, e))
            })
            .collect::<Vec<_>>();

        let mut results = vec![];
        let mut failures = vec![];
        for result in evaluated {
            match result {
                Ok(result) => results.push(result),
                Err(failure) => failures.push(failure),
            }
        }
        results.sort_by(EffectResult::rank_cmp);
        tracing::info!(
            results = results.len(),
            skipped = failures.len(),
            "computed numeric effect sizes"
        );
        (results, failures)
    }
}

#[cfg(test)]
mod tests {
    use etm_features::table::{ColumnSpec, Value};

    use super::*;

    /// Ten students, even rows graduated.
    fn table() -> FeatureTable {
        let schema = [
            ColumnSpec::numeric("graduated_me"),
            ColumnSpec::numeric("strong"),
            ColumnSpec::numeric("weak"),
            ColumnSpec::numeric("constant"),
            ColumnSpec::categorical("campus"),
        ];
        let rows = (0..10)
            .map(|i| {
                let y = i % 2 == 0;
                let jitter = f64::from(i) * 0.01;
                let values = vec![
                    Value::flag(Some(y)),
                    Value::Numeric(Some((if y { 3.5 } else { 2.5 }) + jitter)),
                    Value::Numeric(Some((if y { 2.1 } else { 2.0 }) + jitter * 10.0)),
                    Value::Numeric(Some(1.0)),
                    Value::Categorical(Some("UP".to_owned())),
                ];
                (format!("s{i}"), values)
            })
            .collect();
        FeatureTable::from_rows(&schema, rows)
    }

    fn run(config: &AnalysisConfig) -> (Vec<EffectResult>, Vec<UnitFailure>) {
        let table = table();
        let outcome = OutcomeColumn::resolve(&table, config).unwrap();
        EffectSizeEngine::new(config).run(&table, &outcome)
    }

    #[test]
    fn test_ranked_by_score() {
        let (results, _) = run(&AnalysisConfig::default());
        let names = results.iter().map(|r| r.feature.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["strong", "weak"]);
        assert!(results[0].score > results[1].score);
        assert!(results[0].d > 0.0);
        assert_eq!((results[0].n1, results[0].n0), (5, 5));
        assert!(results[0].mean1 > results[0].mean0);
    }

    #[test]
    fn test_degenerate_feature_is_a_failure() {
        let (_, failures) = run(&AnalysisConfig::default());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].engine, Engine::EffectSize);
        assert_eq!(failures[0].unit, "constant");
    }

    #[test]
    fn test_low_confidence_flag() {
        let (results, _) = run(&AnalysisConfig::default());
        assert!(results.iter().all(|r| r.low_confidence));

        let config = AnalysisConfig {
            min_cohort: 5,
            ..AnalysisConfig::default()
        };
        let (results, _) = run(&config);
        assert!(results.iter().all(|r| !r.low_confidence));
    }

    #[test]
    fn test_tie_breaks_by_name() {
        let a = EffectResult {
            feature: "b".to_owned(),
            d: 1.0,
            score: 2.0,
            n1: 2,
            n0: 2,
            mean1: 1.0,
            mean0: 0.0,
            low_confidence: true,
        };
        let b = EffectResult {
            feature: "a".to_owned(),
            d: -1.0,
            ..a.clone()
        };
        let mut results = vec![a, b];
        results.sort_by(EffectResult::rank_cmp);
        assert_eq!(results[0].feature, "a");
    }
}
