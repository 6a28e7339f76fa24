//! Statistical insight mining over the ETM feature table
//!
//! Given a [`FeatureTable`](etm_features::table::FeatureTable) and a binary
//! outcome, this crate finds features associated with the outcome and ranks
//! them.
//!
//! # Overview
//!
//! 1. **Normalize** ([`normalize::TableNormalizer`]): missing sentinels such
//!    as `N/A (101)` become blanks, and credit windows are banded
//! 2. **Resolve the outcome** ([`outcome::OutcomeColumn`]): name or alias,
//!    coerced to yes/no per row
//! 3. **Sanitize** ([`sanitizer::LeakageSanitizer`]): quarantine columns that
//!    leak the outcome or are mostly missing
//! 4. **Engines**, each fanned out per feature:
//!    - [`effect_size::EffectSizeEngine`]: Cohen's d for numeric features
//!    - [`risk_ratio::RiskRatioEngine`]: per-level risk ratios for
//!      categorical features
//!    - [`bucket::BucketEngine`]: outcome rate per quantile bucket
//!    - [`trajectory_trend::TrajectoryTrends`]: cohort GPA-slope summary
//! 5. **Synthesize** ([`synthesis::TrendSynthesizer`]): one ranked, capped
//!    candidate list
//! 6. **Stress-test** ([`slice::SliceStabilityEngine`]): does each
//!    candidate's direction hold inside confounder strata?
//!
//! [`runner::AnalysisRunner`] performs all of the above and returns an
//! [`runner::AnalysisReport`]. Failures of individual features are collected
//! as [`error::UnitFailure`] records rather than aborting the run.
//!
//! # Example
//!
//! ```
//! use etm_features::table::{ColumnSpec, FeatureTable, Value};
//! use etm_insights::{config::AnalysisConfig, runner::AnalysisRunner};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let rows = (0..40)
//!     .map(|i| {
//!         let graduated = i % 2 == 0;
//!         let gpa = (if graduated { 3.2 } else { 2.5 }) + f64::from(i % 5) * 0.05;
//!         (format!("s{i}"), vec![Value::flag(Some(graduated)), Value::Numeric(Some(gpa))])
//!     })
//!     .collect();
//! let table = FeatureTable::from_rows(
//!     &[ColumnSpec::numeric("graduated_me"), ColumnSpec::numeric("first_term_gpa")],
//!     rows,
//! );
//!
//! let config = AnalysisConfig::default();
//! let report = AnalysisRunner::new(&config).run(&table)?;
//! assert_eq!(report.effects[0].feature, "first_term_gpa");
//! assert!(report.effects[0].d > 0.0);
//! # Ok(())
//! # }
//! ```

pub mod bucket;
pub mod config;
pub mod effect_size;
pub mod error;
pub mod normalize;
pub mod outcome;
pub mod risk_ratio;
pub mod runner;
pub mod sanitizer;
pub mod slice;
pub mod synthesis;
pub mod trajectory_trend;
