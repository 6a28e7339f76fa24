//! One full analysis pass over a feature table

use std::collections::BTreeSet;

use etm_features::table::FeatureTable;

use crate::{
    bucket::{BucketEngine, BucketResult, BucketSpread},
    config::AnalysisConfig,
    effect_size::{EffectResult, EffectSizeEngine},
    error::{AnalysisError, Engine, UnitFailure},
    normalize::{NormalizationReport, TableNormalizer},
    outcome::OutcomeColumn,
    risk_ratio::{RiskRatioEngine, RiskRatioResult},
    sanitizer::{LeakageSanitizer, SanitizerReport},
    slice::{SliceResult, SliceStabilityEngine},
    synthesis::{TrendCandidate, TrendSynthesizer},
    trajectory_trend::{SLOPE_COLUMN, TrajectoryTrends},
};

/// Everything one analysis run produces.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AnalysisReport {
    pub outcome: String,
    pub rows: usize,
    /// Overall outcome-positive share among rows with a known outcome.
    pub outcome_rate: Option<f64>,
    pub normalization: NormalizationReport,
    pub sanitizer: SanitizerReport,
    pub effects: Vec<EffectResult>,
    pub risk_ratios: Vec<RiskRatioResult>,
    pub buckets: Vec<BucketResult>,
    pub bucket_spreads: Vec<BucketSpread>,
    pub trajectory: Option<TrajectoryTrends>,
    pub slices: Vec<SliceResult>,
    pub candidates: Vec<TrendCandidate>,
    pub failures: Vec<UnitFailure>,
}

/// Runs normalizer, sanitizer, engines, synthesis and slice checks in order.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRunner<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> AnalysisRunner<'a> {
    #[must_use]
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Runs every engine over `table`.
    ///
    /// Only an empty table, a missing outcome column or an invalid sanitizer
    /// pattern is fatal; everything else is recorded in
    /// [`AnalysisReport::failures`].
    pub fn run(&self, table: &FeatureTable) -> Result<AnalysisReport, AnalysisError> {
        if table.is_empty() {
            return Err(AnalysisError::EmptyTable);
        }
        let normalizer = TableNormalizer::new(&self.config.sanitizer)?;
        let (table, normalization) = normalizer.normalize(table);
        let outcome = OutcomeColumn::resolve(&table, self.config)?;
        let sanitizer = LeakageSanitizer::new(&self.config.sanitizer)?;
        let (table, sanitizer_report) = sanitizer.sanitize(&table, &outcome);
        let outcome_rate = outcome.tally(0..table.len()).rate();
        tracing::info!(
            outcome = outcome.name(),
            rows = table.len(),
            columns = table.columns().len(),
            ?outcome_rate,
            "starting analysis"
        );

        let ((effects, effect_failures), ((risk_ratios, rr_failures), (buckets, bucket_failures))) =
            rayon::join(
                || EffectSizeEngine::new(self.config).run(&table, &outcome),
                || {
                    rayon::join(
                        || RiskRatioEngine::new(self.config).run(&table, &outcome),
                        || BucketEngine::new(self.config).run(&table, &outcome),
                    )
                },
            );
        let bucket_spreads = BucketSpread::from_results(&buckets);

        let mut failures = [effect_failures, rr_failures, bucket_failures].concat();
        let trajectory = TrajectoryTrends::from_table(&table, &outcome);
        if trajectory.is_none() {
            failures.push(UnitFailure::new(
                Engine::Trajectory,
                SLOPE_COLUMN,
                "no numeric slope column in the feature table",
            ));
        }

        let candidates = TrendSynthesizer::new(self.config).synthesize(
            &effects,
            &risk_ratios,
            &bucket_spreads,
            trajectory.as_ref(),
        );

        let slice_features = self.slice_features(&candidates);
        let (slices, slice_failures) =
            SliceStabilityEngine::new(self.config).run(&table, &outcome, &slice_features);
        failures.extend(slice_failures);
        failures.sort();

        Ok(AnalysisReport {
            outcome: outcome.name().to_owned(),
            rows: table.len(),
            outcome_rate,
            normalization,
            sanitizer: sanitizer_report,
            effects,
            risk_ratios,
            buckets,
            bucket_spreads,
            trajectory,
            slices,
            candidates,
            failures,
        })
    }

    /// Configured slice features, or each distinct candidate feature in rank
    /// order.
    fn slice_features(&self, candidates: &[TrendCandidate]) -> Vec<String> {
        if !self.config.slice_features.is_empty() {
            return self.config.slice_features.clone();
        }
        let mut seen = BTreeSet::new();
        candidates
            .iter()
            .filter(|c| seen.insert(c.feature.as_str()))
            .map(|c| c.feature.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use etm_features::table::{ColumnSpec, Value};

    use super::*;
    use crate::synthesis::CandidateKind;

    fn cat(text: &str) -> Value {
        Value::Categorical(Some(text.to_owned()))
    }

    /// 120 students; `gpa` and `with_math_ap` both track graduation.
    fn table() -> FeatureTable {
        let schema = [
            ColumnSpec::numeric("graduated_me"),
            ColumnSpec::numeric("gpa"),
            ColumnSpec::numeric("graduating_cgpa"),
            ColumnSpec::categorical("with_math_ap"),
            ColumnSpec::numeric(SLOPE_COLUMN),
        ];
        let rows = (0..120)
            .map(|i| {
                let y = i % 3 != 0;
                let values = vec![
                    Value::flag(Some(y)),
                    Value::Numeric(Some((if y { 3.0 } else { 2.4 }) + f64::from(i % 10) * 0.03)),
                    Value::Numeric(Some(3.0)),
                    cat(if (i % 4 == 0) == y { "N" } else { "Y" }),
                    Value::Numeric(Some((if y { 0.1 } else { -0.1 }) + f64::from(i % 5) * 0.01)),
                ];
                (format!("s{i}"), values)
            })
            .collect();
        FeatureTable::from_rows(&schema, rows)
    }

    #[test]
    fn test_full_run() {
        let config = AnalysisConfig::default();
        let report = AnalysisRunner::new(&config).run(&table()).unwrap();

        assert_eq!(report.outcome, "graduated_me");
        assert_eq!(report.rows, 120);
        assert_eq!(report.sanitizer.name_denied, ["graduating_cgpa"]);
        assert!(report.effects.iter().all(|e| e.feature != "graduating_cgpa"));
        let gpa = report.effects.iter().find(|e| e.feature == "gpa").unwrap();
        assert!(gpa.d > 0.0);
        assert!(!report.risk_ratios.is_empty());
        assert!(report.buckets.iter().any(|b| b.feature == "gpa"));
        assert_eq!(report.trajectory.as_ref().unwrap().n_students, 120);
        assert!(report.candidates.iter().any(|c| c.kind == CandidateKind::GpaSlope));
        assert!(report.slices.iter().any(|s| s.feature == "gpa" && s.confounder == "with_math_ap"));
        // sat_verb_grouping and first_math_course_campus are absent
        assert!(report.failures.iter().any(|f| f.engine == Engine::Slice));
    }

    #[test]
    fn test_run_is_deterministic() {
        let config = AnalysisConfig::default();
        let runner = AnalysisRunner::new(&config);
        let table = table();
        assert_eq!(runner.run(&table).unwrap(), runner.run(&table).unwrap());
    }

    #[test]
    fn test_run_normalizes_before_engines() {
        let schema = [
            ColumnSpec::numeric("graduated_me"),
            ColumnSpec::categorical("attempted_credits"),
            ColumnSpec::categorical("campus"),
        ];
        let rows = (0..60)
            .map(|i| {
                let credits = if i % 10 == 0 { "NA".to_owned() } else { (15 + i).to_string() };
                let campus = if i % 4 == 0 { "N/A (101)" } else if i % 2 == 0 { "UP" } else { "WB" };
                let values = vec![Value::flag(Some(i % 3 != 0)), cat(&credits), cat(campus)];
                (format!("s{i}"), values)
            })
            .collect();
        let table = FeatureTable::from_rows(&schema, rows);

        let config = AnalysisConfig::default();
        let report = AnalysisRunner::new(&config).run(&table).unwrap();
        assert_eq!(report.normalization.sentinel_cells, 21);
        assert_eq!(report.normalization.retyped_numeric, ["attempted_credits"]);
        assert_eq!(
            report.normalization.credit_window_source.as_deref(),
            Some("attempted_credits")
        );
        assert!(report.effects.iter().any(|e| e.feature == "attempted_credits"));
        assert!(report.risk_ratios.iter().all(|r| !r.level.starts_with("N/A")));
        let bands = report
            .risk_ratios
            .iter()
            .filter(|r| r.feature == "credit_window_canon")
            .map(|r| r.level.as_str())
            .collect::<BTreeSet<_>>();
        assert_eq!(bands, BTreeSet::from(["0-19", "20-39", "40-59", "60-79"]));
    }

    #[test]
    fn test_empty_table() {
        let config = AnalysisConfig::default();
        let err = AnalysisRunner::new(&config)
            .run(&FeatureTable::default())
            .unwrap_err();
        assert_eq!(err, AnalysisError::EmptyTable);
    }

    #[test]
    fn test_explicit_slice_features() {
        let config = AnalysisConfig {
            slice_features: vec!["gpa".to_owned()],
            confounders: vec!["with_math_ap".to_owned()],
            ..AnalysisConfig::default()
        };
        let report = AnalysisRunner::new(&config).run(&table()).unwrap();
        assert_eq!(report.slices.len(), 1);
        assert_eq!(report.slices[0].feature, "gpa");
    }
}
