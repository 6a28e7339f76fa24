//! Feature engineering for ETM (entrance-to-major) student records
//!
//! This crate turns raw per-student exports into the analysis-ready
//! [`table::FeatureTable`] consumed by the insight engines.
//!
//! # Overview
//!
//! ## Course Outcome Workflow
//!
//! 1. **Classify** ([`policy::PolicyEngine`]): grade codes and outcome phrases
//!    become PASS, FAIL, WITHDRAW or UNKNOWN under one injectable
//!    [`policy::PolicyConfig`]
//! 2. **Resolve** ([`resolver::CourseAttemptResolver`]): four cumulative
//!    snapshots per course become attempts-to-pass, total attempts and flags
//! 3. **Roll up** ([`course::CourseRollup`]): cross-course counts
//!
//! ## Student Feature Workflow
//!
//! 1. **Ingest** ([`schema::RawTable`], [`record::StudentRecord`]): standardize
//!    headers, resolve aliases, fail fast on missing `random_id`
//! 2. **Trajectories** ([`trajectory::TermGpaGrid`],
//!    [`trajectory::TrajectoryFeatures`]): term-GPA statistics and OLS slope
//! 3. **Assemble** ([`assembler::FeatureAssembler`]): derived gaps, rates,
//!    flags, missingness indicators, course mastery and trajectory columns
//! 4. **Check** ([`validation::SanityReport`]): row-level data-quality flags
//!
//! [`schema::MissingSentinels`] and [`credit::CreditWindow`] are shared with
//! the analysis side, which blanks `N/A`-style cells and bands credit windows
//! before any engine runs.
//!
//! # Example
//!
//! ```
//! use etm_features::{
//!     assembler::FeatureAssembler,
//!     policy::{PolicyConfig, PolicyEngine},
//!     record::StudentRecord,
//!     schema::RawTable,
//! };
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let raw = RawTable::new(
//!     ["Random ID", "MATH 140 Grade Code 1st FA or SP"],
//!     vec![vec!["s1".to_owned(), "B".to_owned()]],
//! );
//! let records = StudentRecord::from_table(&raw)?;
//!
//! let policy = PolicyEngine::new(&PolicyConfig::default());
//! let table = FeatureAssembler::new(&policy).assemble(&records, &[]);
//!
//! let passed = table.column("math_140_pass_by_first_attempt").unwrap();
//! assert_eq!(passed.as_numeric().unwrap()[0], Some(1.0));
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod course;
pub mod credit;
pub mod policy;
pub mod record;
pub mod resolver;
pub mod schema;
pub mod table;
pub mod trajectory;
pub mod validation;
