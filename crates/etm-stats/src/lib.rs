//! Statistical kernels for the ETM insight pipeline.
//!
//! This crate provides the small, dependency-light numeric building blocks the
//! feature and insight crates are assembled from:
//!
//! - **Descriptive statistics**: mean, median, sample variance, extremes
//! - **Quantiles**: linear-interpolated quantiles over sorted data
//! - **Quantile bucketing**: tie-aware bucket edges with per-value lookup
//! - **Regression**: closed-form ordinary least squares slope
//! - **Effect size**: Cohen's d with pooled standard deviation
//! - **Risk ratio**: two-by-two risk ratio with a log-scale confidence interval
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`quantile`]: Quantile computation over sorted values
//! - [`binning`]: Quantile-based bucket edges
//! - [`regression`]: Least-squares trend slope
//! - [`effect_size`]: Standardized mean difference between two groups
//! - [`risk_ratio`]: Risk ratio with Haldane–Anscombe correction
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use etm_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! assert_eq!(stats.median, 3.0);
//! ```
//!
//! ## Bucketing a feature by quantiles
//!
//! ```
//! use etm_stats::binning::QuantileBuckets;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
//! let buckets = QuantileBuckets::new(values, 4).unwrap();
//! assert_eq!(buckets.len(), 4);
//! assert_eq!(buckets.bucket_of(1.0), Some(0));
//! assert_eq!(buckets.bucket_of(8.0), Some(3));
//! ```
//!
//! ## Estimating a trend
//!
//! ```
//! use etm_stats::regression::ols_slope;
//!
//! let slope = ols_slope(&[(1.0, 2.0), (2.0, 2.5), (3.0, 3.0)]).unwrap();
//! assert!((slope - 0.5).abs() < 1e-12);
//! ```

pub mod binning;
pub mod descriptive;
pub mod effect_size;
pub mod quantile;
pub mod regression;
pub mod risk_ratio;
