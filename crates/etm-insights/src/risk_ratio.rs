//! Per-level risk ratios for categorical features
//!
//! Every level of every scanned categorical column gets a result, even when
//! it is small; small levels are flagged `low_confidence` rather than
//! dropped. Columns that look like identifiers, or have more levels than the
//! configured cap, are not scanned.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
};

use etm_features::table::{Column, FeatureTable};
use etm_stats::risk_ratio::{ContingencyCounts, RiskRatio};
use rayon::prelude::*;

use crate::{
    config::AnalysisConfig,
    error::{Engine, UnitFailure},
    outcome::{OutcomeColumn, OutcomeTally},
};

/// Absolute distinct-level floor for the identifier heuristic.
const ID_LIKE_MIN_LEVELS: usize = 200;

/// Risk ratio of one level of a categorical feature.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RiskRatioResult {
    pub feature: String,
    pub level: String,
    pub rr: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    /// `|ln(rr)| · sqrt(n_level)`.
    pub score: f64,
    pub n_level: u64,
    pub rate_level: f64,
    pub rate_rest: f64,
    /// Whether the Haldane–Anscombe correction was applied.
    pub corrected: bool,
    pub low_confidence: bool,
}

impl RiskRatioResult {
    /// Descending score, then feature, then level.
    #[must_use]
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.feature.cmp(&other.feature))
            .then_with(|| self.level.cmp(&other.level))
    }
}

/// Whether a column name has an `id` token, e.g. `random_id` or `id_code`.
#[must_use]
pub fn has_id_token(name: &str) -> bool {
    name.split('_').any(|token| token.eq_ignore_ascii_case("id"))
}

/// Outcome tallies per level, over rows where both sides are known.
#[must_use]
pub fn level_tallies<'c>(
    values: &'c [Option<String>],
    outcome: &OutcomeColumn,
    rows: impl IntoIterator<Item = usize>,
) -> BTreeMap<&'c str, OutcomeTally> {
    let mut tallies = BTreeMap::<&str, OutcomeTally>::new();
    for row in rows {
        let (Some(level), Some(y)) = (values[row].as_deref(), outcome.get(row)) else {
            continue;
        };
        tallies.entry(level).or_default().record(y);
    }
    tallies
}

/// Two-by-two counts for `level` against every other level.
#[must_use]
pub fn counts_for(level: OutcomeTally, overall: OutcomeTally) -> ContingencyCounts {
    ContingencyCounts {
        a: level.positive,
        b: level.negative(),
        c: overall.positive - level.positive,
        d: overall.negative() - level.negative(),
    }
}

/// Scans categorical columns and computes per-level risk ratios.
#[derive(Debug, Clone, Copy)]
pub struct RiskRatioEngine<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> RiskRatioEngine<'a> {
    #[must_use]
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Reason a column is not scanned, if any.
    #[must_use]
    pub fn exclusion(&self, column: &Column, rows: usize) -> Option<String> {
        let values = column.as_categorical()?;
        if has_id_token(&column.name) {
            return Some("identifier-like column name".to_owned());
        }
        let levels = values
            .iter()
            .flatten()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .len();
        if levels > ID_LIKE_MIN_LEVELS.max(rows / 2) {
            return Some(format!("identifier-like cardinality ({levels} levels)"));
        }
        if levels > self.config.max_categorical_levels {
            return Some(format!(
                "{levels} levels exceed the cap of {}",
                self.config.max_categorical_levels
            ));
        }
        None
    }

    /// Results for every level of one column.
    #[expect(clippy::cast_precision_loss)]
    pub fn evaluate(
        &self,
        feature: &str,
        values: &[Option<String>],
        outcome: &OutcomeColumn,
    ) -> Result<Vec<RiskRatioResult>, String> {
        let tallies = level_tallies(values, outcome, 0..values.len());
        if tallies.len() < 2 {
            return Err(format!("{} level(s) with a known outcome", tallies.len()));
        }
        let overall = tallies.values().fold(OutcomeTally::default(), |acc, t| OutcomeTally {
            positive: acc.positive + t.positive,
            total: acc.total + t.total,
        });
        let min_cohort = self.config.min_cohort as u64;
        Ok(tallies
            .into_iter()
            .map(|(level, tally)| {
                let counts = counts_for(tally, overall);
                let rr = RiskRatio::from_counts(counts);
                let n_level = counts.n_level();
                RiskRatioResult {
                    feature: feature.to_owned(),
                    level: level.to_owned(),
                    score: rr.abs_log_rr() * (n_level as f64).sqrt(),
                    rr: rr.rr,
                    ci_low: rr.ci_low,
                    ci_high: rr.ci_high,
                    n_level,
                    rate_level: rr.rate_level,
                    rate_rest: rr.rate_rest,
                    corrected: rr.corrected,
                    low_confidence: n_level < min_cohort,
                }
            })
            .collect())
    }

    /// Ranked results plus skipped or excluded columns.
    #[must_use]
    pub fn run(
        &self,
        table: &FeatureTable,
        outcome: &OutcomeColumn,
    ) -> (Vec<RiskRatioResult>, Vec<UnitFailure>) {
        let scanned = table
            .columns()
            .par_iter()
            .filter(|column| column.name != outcome.name())
            .filter_map(|column| Some((column, column.as_categorical()?)))
            .map(|(column, values)| {
                let unit = column.name.as_str();
                if let Some(reason) = self.exclusion(column, table.len()) {
                    return Err(UnitFailure::new(Engine::RiskRatio, unit, reason));
                }
                self.evaluate(unit, values, outcome)
                    .map_err(|reason| UnitFailure::new(Engine::RiskRatio, unit, reason))
            })
            .collect::<Vec<_>>();

        let mut results = vec![];
        let mut failures = vec![];
        for column in scanned {
            match column {
                Ok(levels) => results.extend(levels),
                Err(failure) => failures.push(failure),
            }
        }
        results.sort_by(RiskRatioResult::rank_cmp);
        tracing::info!(
            results = results.len(),
            skipped = failures.len(),
            "computed categorical risk ratios"
        );
        (results, failures)
    }
}
