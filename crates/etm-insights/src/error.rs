//! Fatal analysis errors and isolated per-unit failures

use crate::sanitizer::PatternError;

/// Structural problems that stop an analysis run.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum AnalysisError {
    #[display("required column `{field}` not found (tried: {tried})")]
    MissingColumn { field: String, tried: String },
    #[display("feature table has no rows")]
    EmptyTable,
    #[display("{_0}")]
    InvalidPattern(PatternError),
}

impl From<PatternError> for AnalysisError {
    fn from(err: PatternError) -> Self {
        Self::InvalidPattern(err)
    }
}

/// Engine that produced a [`UnitFailure`].
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
pub enum Engine {
    #[display("effect_size")]
    EffectSize,
    #[display("risk_ratio")]
    RiskRatio,
    #[display("bucket")]
    Bucket,
    #[display("slice")]
    Slice,
    #[display("trajectory")]
    Trajectory,
}

/// A feature (or feature/confounder pair) an engine could not evaluate.
///
/// Recorded in the run report instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub struct UnitFailure {
    pub engine: Engine,
    pub unit: String,
    pub reason: String,
}

impl UnitFailure {
    #[must_use]
    pub fn new(engine: Engine, unit: impl Into<String>, reason: impl ToString) -> Self {
        let failure = Self {
            engine,
            unit: unit.into(),
            reason: reason.to_string(),
        };
        tracing::warn!(
            engine = %failure.engine,
            unit = %failure.unit,
            reason = %failure.reason,
            "analysis unit skipped"
        );
        failure
    }
}
