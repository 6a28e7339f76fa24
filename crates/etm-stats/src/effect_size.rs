//! Standardized mean difference between two groups
//!
//! Cohen's d compares the mean of a feature among outcome-positive
//! observations (group 1) with its mean among outcome-negative observations
//! (group 0), scaled by the pooled standard deviation:
//!
//! ```text
//! sp = sqrt(((n1 - 1)·s1² + (n0 - 1)·s0²) / (n1 + n0 - 2))
//! d  = (mean1 - mean0) / sp
//! ```
//!
//! # Examples
//!
//! ```
//! use etm_stats::effect_size::cohens_d;
//!
//! let graduated = [3.4, 3.6, 3.8];
//! let not_graduated = [2.4, 2.6, 2.8];
//! let effect = cohens_d(&graduated, &not_graduated).unwrap();
//! assert!(effect.d > 0.0);
//! assert_eq!(effect.n1, 3);
//! ```

use crate::descriptive;

/// Reasons a standardized mean difference cannot be computed.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum EffectSizeError {
    #[display("insufficient sample: n1={n1}, n0={n0} (need at least 2 per group)")]
    InsufficientSample { n1: usize, n0: usize },
    #[display("degenerate variance: pooled standard deviation is zero")]
    DegenerateVariance,
}

/// Cohen's d with the group summaries it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct CohensD {
    /// Standardized mean difference, `(mean1 - mean0) / pooled_sd`.
    pub d: f64,
    pub mean1: f64,
    pub mean0: f64,
    pub pooled_sd: f64,
    pub n1: usize,
    pub n0: usize,
}

impl CohensD {
    /// Power-weighted score, `|d| · sqrt(n1 + n0)`.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn score(&self) -> f64 {
        self.d.abs() * ((self.n1 + self.n0) as f64).sqrt()
    }
}

/// Computes Cohen's d for `group1` against `group0`.
///
/// # Errors
///
/// * [`EffectSizeError::InsufficientSample`] when either group has fewer than
///   two observations
/// * [`EffectSizeError::DegenerateVariance`] when the pooled standard deviation
///   is zero
#[expect(clippy::cast_precision_loss)]
pub fn cohens_d(group1: &[f64], group0: &[f64]) -> Result<CohensD, EffectSizeError> {
    let (n1, n0) = (group1.len(), group0.len());
    let insufficient = EffectSizeError::InsufficientSample { n1, n0 };
    if n1 < 2 || n0 < 2 {
        return Err(insufficient);
    }

    let (Some(mean1), Some(mean0)) = (descriptive::mean(group1), descriptive::mean(group0))
    else {
        return Err(insufficient);
    };
    let (Some(var1), Some(var0)) = (
        descriptive::sample_variance(group1),
        descriptive::sample_variance(group0),
    ) else {
        return Err(insufficient);
    };

    let dof = (n1 + n0 - 2) as f64;
    let pooled_sd = (((n1 - 1) as f64 * var1 + (n0 - 1) as f64 * var0) / dof).sqrt();
    if !pooled_sd.is_normal() {
        return Err(EffectSizeError::DegenerateVariance);
    }

    Ok(CohensD {
        d: (mean1 - mean0) / pooled_sd,
        mean1,
        mean0,
        pooled_sd,
        n1,
        n0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_value() {
        // means 3 and 2, both sample variances 1 -> d = 1
        let effect = cohens_d(&[2.0, 3.0, 4.0], &[1.0, 2.0, 3.0]).unwrap();
        assert!((effect.d - 1.0).abs() < 1e-12);
        assert!((effect.pooled_sd - 1.0).abs() < 1e-12);
        assert!((effect.score() - 6.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_sign_follows_mean_difference() {
        let effect = cohens_d(&[1.0, 1.5, 2.0], &[3.0, 3.5, 4.5]).unwrap();
        assert!(effect.d < 0.0);
        assert!(effect.mean1 < effect.mean0);
    }

    #[test]
    fn test_small_group_is_rejected() {
        assert_eq!(
            cohens_d(&[1.0], &[1.0, 2.0]),
            Err(EffectSizeError::InsufficientSample { n1: 1, n0: 2 })
        );
    }

    #[test]
    fn test_zero_variance_is_rejected() {
        assert_eq!(
            cohens_d(&[2.0, 2.0, 2.0], &[2.0, 2.0]),
            Err(EffectSizeError::DegenerateVariance)
        );
    }
}
