//! Outcome rate per quantile bucket of each numeric feature

use std::collections::BTreeMap;

use etm_features::table::FeatureTable;
use etm_stats::binning::QuantileBuckets;
use rayon::prelude::*;

use crate::{
    config::AnalysisConfig,
    error::{Engine, UnitFailure},
    outcome::{OutcomeColumn, OutcomeTally},
};

/// One bucket of one feature.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BucketResult {
    pub feature: String,
    /// Zero-based bucket index, ascending by value.
    pub bucket: usize,
    /// Interval label, e.g. `(2.50, 3.10]`.
    pub label: String,
    pub n: u64,
    pub rate: f64,
    /// Every edge of the feature's bucketing.
    pub edges: Vec<f64>,
}

/// Outcome-rate range across one feature's buckets.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BucketSpread {
    pub feature: String,
    pub buckets: usize,
    pub n_total: u64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub spread: f64,
}

impl BucketSpread {
    /// Spreads for every feature with at least two buckets, widest first.
    #[must_use]
    pub fn from_results(results: &[BucketResult]) -> Vec<Self> {
        let mut by_feature = BTreeMap::<&str, Vec<&BucketResult>>::new();
        for result in results {
            by_feature.entry(&result.feature).or_default().push(result);
        }
        let mut spreads = by_feature
            .into_iter()
            .filter(|(_, buckets)| buckets.len() >= 2)
            .map(|(feature, buckets)| {
                let min_rate = buckets.iter().map(|b| b.rate).fold(f64::INFINITY, f64::min);
                let max_rate = buckets.iter().map(|b| b.rate).fold(f64::NEG_INFINITY, f64::max);
                Self {
                    feature: feature.to_owned(),
                    buckets: buckets.len(),
                    n_total: buckets.iter().map(|b| b.n).sum(),
                    min_rate,
                    max_rate,
                    spread: max_rate - min_rate,
                }
            })
            .collect::<Vec<_>>();
        spreads.sort_by(|a, b| {
            b.spread
                .total_cmp(&a.spread)
                .then_with(|| b.n_total.cmp(&a.n_total))
                .then_with(|| a.feature.cmp(&b.feature))
        });
        spreads
    }
}

/// Buckets numeric features by their own quantiles.
#[derive(Debug, Clone, Copy)]
pub struct BucketEngine<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> BucketEngine<'a> {
    #[must_use]
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Buckets of one feature, over rows with both a value and an outcome.
    pub fn evaluate(
        &self,
        feature: &str,
        values: &[Option<f64>],
        outcome: &OutcomeColumn,
    ) -> Option<Vec<BucketResult>> {
        let pairs = values
            .iter()
            .enumerate()
            .filter_map(|(row, x)| Some(((*x)?, outcome.get(row)?)))
            .collect::<Vec<_>>();
        let buckets = QuantileBuckets::new(pairs.iter().map(|(x, _)| *x), self.config.bucket_count)?;

        let mut tallies = vec![OutcomeTally::default(); buckets.len()];
        for (x, y) in pairs {
            if let Some(index) = buckets.bucket_of(x) {
                tallies[index].record(y);
            }
        }
        Some(
            tallies
                .iter()
                .enumerate()
                .filter_map(|(index, tally)| {
                    Some(BucketResult {
                        feature: feature.to_owned(),
                        bucket: index,
                        label: buckets.label(index)?,
                        n: tally.total,
                        rate: tally.rate()?,
                        edges: buckets.edges().to_vec(),
                    })
                })
                .collect(),
        )
    }

    /// Results ordered by feature then bucket, plus features with no values.
    #[must_use]
    pub fn run(
        &self,
        table: &FeatureTable,
        outcome: &OutcomeColumn,
    ) -> (Vec<BucketResult>, Vec<UnitFailure>) {
        let bucketed = table
            .columns()
            .par_iter()
            .filter(|column| column.name != outcome.name())
            .filter_map(|column| Some((column.name.as_str(), column.as_numeric()?)))
            .map(|(name, values)| {
                self.evaluate(name, values, outcome).ok_or_else(|| {
                    UnitFailure::new(Engine::Bucket, name, "no values with a known outcome")
                })
            })
            .collect::<Vec<_>>();

        let mut results = vec![];
        let mut failures = vec![];
        for feature in bucketed {
            match feature {
                Ok(buckets) => results.extend(buckets),
                Err(failure) => failures.push(failure),
            }
        }
        results.sort_by(|a, b| {
            a.feature
                .cmp(&b.feature)
                .then_with(|| a.bucket.cmp(&b.bucket))
        });
        tracing::info!(
            results = results.len(),
            skipped = failures.len(),
            "computed bucketed outcome rates"
        );
        (results, failures)
    }
}

/// Count-weighted mean of bucket rates.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn weighted_rate(buckets: &[BucketResult]) -> Option<f64> {
    let total = buckets.iter().map(|b| b.n).sum::<u64>();
    (total > 0).then(|| {
        buckets.iter().map(|b| b.rate * b.n as f64).sum::<f64>() / total as f64
    })
}
