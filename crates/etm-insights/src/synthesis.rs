//! Merging engine outputs into one ranked candidate list
//!
//! Each engine's strongest findings are scored on a common footing and
//! interleaved:
//!
//! | Kind | Source | Score |
//! |------|--------|-------|
//! | numeric effect | top `top_numeric` effect sizes | `|d| · sqrt(n1 + n0)` |
//! | categorical RR | top `top_categorical` levels | `|ln RR| · sqrt(n_level)` |
//! | bucket spread | top `top_buckets` spreads | `spread · sqrt(n_total)` |
//! | GPA slope | effect size of the slope feature | `|d| · sqrt(n1 + n0)` |
//!
//! The list is ordered by score, then feature, kind and level, and truncated
//! to `max_candidates`.

use std::cmp::Ordering;

use crate::{
    bucket::BucketSpread,
    config::AnalysisConfig,
    effect_size::EffectResult,
    risk_ratio::RiskRatioResult,
    trajectory_trend::{SLOPE_COLUMN, TrajectoryTrends},
};

/// Where a candidate came from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::Display,
    serde::Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    #[display("numeric_effect")]
    NumericEffect,
    #[display("categorical_rr")]
    CategoricalRr,
    #[display("bucket_spread")]
    BucketSpread,
    #[display("gpa_slope")]
    GpaSlope,
}

/// One ranked finding.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TrendCandidate {
    pub kind: CandidateKind,
    pub feature: String,
    /// Level of a categorical candidate.
    pub level: Option<String>,
    pub score: f64,
    /// Cohen's d, risk ratio, or rate spread, depending on `kind`.
    pub effect: f64,
    pub n: u64,
    pub low_confidence: bool,
    /// One-line plain-text description.
    pub summary: String,
}

impl TrendCandidate {
    /// Descending score, then feature, kind and level.
    #[must_use]
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.feature.cmp(&other.feature))
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.level.cmp(&other.level))
    }
}

fn direction(higher: bool) -> &'static str {
    if higher { "higher" } else { "lower" }
}

fn as_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

fn numeric_candidate(effect: &EffectResult) -> TrendCandidate {
    TrendCandidate {
        kind: CandidateKind::NumericEffect,
        feature: effect.feature.clone(),
        level: None,
        score: effect.score,
        effect: effect.d,
        n: as_u64(effect.n1 + effect.n0),
        low_confidence: effect.low_confidence,
        summary: format!(
            "{} {} among outcome-positive students (d = {:.2}, n1 = {}, n0 = {})",
            direction(effect.d > 0.0),
            effect.feature,
            effect.d,
            effect.n1,
            effect.n0
        ),
    }
}

fn categorical_candidate(rr: &RiskRatioResult) -> TrendCandidate {
    TrendCandidate {
        kind: CandidateKind::CategoricalRr,
        feature: rr.feature.clone(),
        level: Some(rr.level.clone()),
        score: rr.score,
        effect: rr.rr,
        n: rr.n_level,
        low_confidence: rr.low_confidence,
        summary: format!(
            "{} = {}: {} outcome rate (RR = {:.2}, 95% CI [{:.2}, {:.2}], n = {})",
            rr.feature,
            rr.level,
            direction(rr.rr > 1.0),
            rr.rr,
            rr.ci_low,
            rr.ci_high,
            rr.n_level
        ),
    }
}

#[expect(clippy::cast_precision_loss)]
fn bucket_candidate(spread: &BucketSpread) -> TrendCandidate {
    TrendCandidate {
        kind: CandidateKind::BucketSpread,
        feature: spread.feature.clone(),
        level: None,
        score: spread.spread * (spread.n_total as f64).sqrt(),
        effect: spread.spread,
        n: spread.n_total,
        low_confidence: false,
        summary: format!(
            "{}: outcome rate ranges {:.1}% to {:.1}% across {} buckets (n = {})",
            spread.feature,
            spread.min_rate * 100.0,
            spread.max_rate * 100.0,
            spread.buckets,
            spread.n_total
        ),
    }
}

fn slope_candidate(effect: &EffectResult, trends: Option<&TrajectoryTrends>) -> TrendCandidate {
    let rates = trends.and_then(|t| Some((t.positive.rate?, t.non_positive.rate?)));
    let summary = match rates {
        Some((positive, non_positive)) => format!(
            "positive GPA slope: {:.1}% vs {:.1}% outcome rate (d = {:.2})",
            positive * 100.0,
            non_positive * 100.0,
            effect.d
        ),
        None => format!(
            "{} GPA slope among outcome-positive students (d = {:.2})",
            direction(effect.d > 0.0),
            effect.d
        ),
    };
    TrendCandidate {
        kind: CandidateKind::GpaSlope,
        summary,
        ..numeric_candidate(effect)
    }
}

/// Builds the ranked candidate list.
#[derive(Debug, Clone, Copy)]
pub struct TrendSynthesizer<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> TrendSynthesizer<'a> {
    #[must_use]
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Merges ranked engine outputs. `effects`, `risk_ratios` and `spreads`
    /// must already be in rank order.
    #[must_use]
    pub fn synthesize(
        &self,
        effects: &[EffectResult],
        risk_ratios: &[RiskRatioResult],
        spreads: &[BucketSpread],
        trends: Option<&TrajectoryTrends>,
    ) -> Vec<TrendCandidate> {
        let numeric = effects
            .iter()
            .filter(|e| e.feature != SLOPE_COLUMN)
            .take(self.config.top_numeric)
            .map(numeric_candidate);
        let categorical = risk_ratios
            .iter()
            .take(self.config.top_categorical)
            .map(categorical_candidate);
        let buckets = spreads
            .iter()
            .filter(|s| s.spread >= self.config.min_bucket_spread)
            .take(self.config.top_buckets)
            .map(bucket_candidate);
        let slope = effects
            .iter()
            .find(|e| e.feature == SLOPE_COLUMN)
            .map(|e| slope_candidate(e, trends));

        let mut candidates = numeric
            .chain(categorical)
            .chain(buckets)
            .chain(slope)
            .collect::<Vec<_>>();
        candidates.sort_by(TrendCandidate::rank_cmp);
        candidates.truncate(self.config.max_candidates);
        tracing::info!(candidates = candidates.len(), "synthesized trend candidates");
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory_trend::SlopeGroup;

    fn effect(feature: &str, d: f64, n: usize) -> EffectResult {
        #[expect(clippy::cast_precision_loss)]
        let score = d.abs() * ((2 * n) as f64).sqrt();
        EffectResult {
            feature: feature.to_owned(),
            d,
            score,
            n1: n,
            n0: n,
            mean1: 1.0,
            mean0: 0.0,
            low_confidence: false,
        }
    }

    fn rr(feature: &str, level: &str, score: f64) -> RiskRatioResult {
        RiskRatioResult {
            feature: feature.to_owned(),
            level: level.to_owned(),
            rr: 2.0,
            ci_low: 1.5,
            ci_high: 2.5,
            score,
            n_level: 50,
            rate_level: 0.8,
            rate_rest: 0.4,
            corrected: false,
            low_confidence: false,
        }
    }

    fn spread(feature: &str, spread: f64, n_total: u64) -> BucketSpread {
        BucketSpread {
            feature: feature.to_owned(),
            buckets: 4,
            n_total,
            min_rate: 0.2,
            max_rate: 0.2 + spread,
            spread,
        }
    }

    #[test]
    fn test_merge_and_rank() {
        let config = AnalysisConfig::default();
        let effects = [effect("cgpa", 1.0, 50), effect("warnings", -0.5, 50)];
        let rrs = [rr("campus", "UP", 4.0)];
        let spreads = [spread("cgpa", 0.6, 100), spread("flat", 0.01, 100)];
        let candidates =
            TrendSynthesizer::new(&config).synthesize(&effects, &rrs, &spreads, None);

        let order = candidates
            .iter()
            .map(|c| (c.kind, c.feature.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            [
                (CandidateKind::NumericEffect, "cgpa"),
                (CandidateKind::BucketSpread, "cgpa"),
                (CandidateKind::NumericEffect, "warnings"),
                (CandidateKind::CategoricalRr, "campus"),
            ]
        );
        assert!(candidates[0].summary.starts_with("higher cgpa"));
        assert!(candidates[2].summary.starts_with("lower warnings"));
        assert_eq!(candidates[3].level.as_deref(), Some("UP"));
    }

    #[test]
    fn test_top_k_and_cap() {
        let config = AnalysisConfig {
            top_numeric: 1,
            max_candidates: 2,
            ..AnalysisConfig::default()
        };
        let effects = [effect("a", 1.0, 50), effect("b", 0.9, 50), effect("c", 0.8, 50)];
        let rrs = [rr("x", "1", 0.5), rr("y", "1", 0.4)];
        let candidates = TrendSynthesizer::new(&config).synthesize(&effects, &rrs, &[], None);
        let features = candidates.iter().map(|c| c.feature.as_str()).collect::<Vec<_>>();
        assert_eq!(features, ["a", "x"]);
    }

    #[test]
    fn test_slope_candidate() {
        let config = AnalysisConfig::default();
        let effects = [effect(SLOPE_COLUMN, 0.4, 30)];
        let trends = TrajectoryTrends {
            n_students: 60,
            median_slope: Some(0.05),
            pct_positive_slope: Some(0.5),
            positive: SlopeGroup { n: 30, rate: Some(0.75) },
            non_positive: SlopeGroup { n: 30, rate: Some(0.4) },
        };
        let candidates =
            TrendSynthesizer::new(&config).synthesize(&effects, &[], &[], Some(&trends));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].kind, CandidateKind::GpaSlope);
        assert_eq!(
            candidates[0].summary,
            "positive GPA slope: 75.0% vs 40.0% outcome rate (d = 0.40)"
        );
    }

    #[test]
    fn test_ties_break_by_feature_then_kind() {
        let config = AnalysisConfig::default();
        let effects = [effect("b", 1.0, 8)];
        let rrs = [rr("a", "L", 4.0), rr("b", "L", 4.0)];
        let candidates = TrendSynthesizer::new(&config).synthesize(&effects, &rrs, &[], None);
        let order = candidates
            .iter()
            .map(|c| (c.feature.as_str(), c.kind))
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            [
                ("a", CandidateKind::CategoricalRr),
                ("b", CandidateKind::NumericEffect),
                ("b", CandidateKind::CategoricalRr),
            ]
        );
    }
}
