//! Cohort-level GPA slope summary

use etm_features::table::FeatureTable;
use etm_stats::descriptive::DescriptiveStats;

use crate::outcome::{OutcomeColumn, OutcomeTally};

/// Per-student slope column produced by feature assembly.
pub const SLOPE_COLUMN: &str = "gpa_trend_slope";

/// Outcome among students on one side of a zero slope.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SlopeGroup {
    pub n: u64,
    pub rate: Option<f64>,
}

impl From<OutcomeTally> for SlopeGroup {
    fn from(tally: OutcomeTally) -> Self {
        Self {
            n: tally.total,
            rate: tally.rate(),
        }
    }
}

/// Slope aggregates and slope-sign outcome rates.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TrajectoryTrends {
    /// Students with a defined slope.
    pub n_students: usize,
    pub median_slope: Option<f64>,
    pub pct_positive_slope: Option<f64>,
    /// Slope above zero.
    pub positive: SlopeGroup,
    /// Slope at or below zero.
    pub non_positive: SlopeGroup,
}

impl TrajectoryTrends {
    /// Summarizes the slope column, or `None` when the table has none.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_table(table: &FeatureTable, outcome: &OutcomeColumn) -> Option<Self> {
        let slopes = table.column(SLOPE_COLUMN)?.as_numeric()?;
        let defined = slopes
            .iter()
            .enumerate()
            .filter_map(|(row, slope)| Some((row, (*slope)?)))
            .collect::<Vec<_>>();
        let stats = DescriptiveStats::new(defined.iter().map(|(_, s)| *s));
        let n_positive = defined.iter().filter(|(_, s)| *s > 0.0).count();

        let mut positive = OutcomeTally::default();
        let mut non_positive = OutcomeTally::default();
        for &(row, slope) in &defined {
            let Some(y) = outcome.get(row) else {
                continue;
            };
            if slope > 0.0 {
                positive.record(y);
            } else {
                non_positive.record(y);
            }
        }

        let trends = Self {
            n_students: defined.len(),
            median_slope: stats.map(|s| s.median),
            pct_positive_slope: (!defined.is_empty())
                .then(|| n_positive as f64 / defined.len() as f64),
            positive: positive.into(),
            non_positive: non_positive.into(),
        };
        tracing::info!(
            students = trends.n_students,
            median_slope = ?trends.median_slope,
            "summarized gpa trajectories"
        );
        Some(trends)
    }
}
