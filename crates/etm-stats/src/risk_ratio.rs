//! Risk ratio with a log-scale confidence interval
//!
//! For a level `L` of a categorical feature, the two-by-two table is:
//!
//! ```text
//!               outcome=1   outcome=0
//! in L              a           b
//! outside L         c           d
//! ```
//!
//! The risk ratio is `(a / (a + b)) / (c / (c + d))`. When any cell is zero,
//! the Haldane–Anscombe correction adds 0.5 to every cell first, keeping the
//! ratio and its interval finite.

/// Two-sided 95% normal quantile.
pub const Z_95: f64 = 1.96;

const HALDANE_ANSCOMBE: f64 = 0.5;

/// Cell counts of a two-by-two outcome table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContingencyCounts {
    /// Outcome-positive count inside the level.
    pub a: u64,
    /// Outcome-negative count inside the level.
    pub b: u64,
    /// Outcome-positive count outside the level.
    pub c: u64,
    /// Outcome-negative count outside the level.
    pub d: u64,
}

impl ContingencyCounts {
    #[must_use]
    pub fn n_level(&self) -> u64 {
        self.a + self.b
    }

    #[must_use]
    pub fn n_rest(&self) -> u64 {
        self.c + self.d
    }

    fn has_zero_cell(&self) -> bool {
        self.a == 0 || self.b == 0 || self.c == 0 || self.d == 0
    }
}

/// Risk ratio, its 95% confidence interval, and the rates behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskRatio {
    pub rr: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    /// Standard error of `ln(rr)`.
    pub se_log: f64,
    /// Outcome rate inside the level (after any correction).
    pub rate_level: f64,
    /// Outcome rate outside the level (after any correction).
    pub rate_rest: f64,
    /// Whether the Haldane–Anscombe correction was applied.
    pub corrected: bool,
}

impl RiskRatio {
    /// Computes the risk ratio from cell counts.
    ///
    /// `SE = sqrt(1/a + 1/b + 1/c + 1/d)` and `CI = exp(ln(rr) ± 1.96·SE)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use etm_stats::risk_ratio::{ContingencyCounts, RiskRatio};
    ///
    /// let counts = ContingencyCounts { a: 0, b: 5, c: 20, d: 30 };
    /// let rr = RiskRatio::from_counts(counts);
    /// assert!(rr.corrected);
    /// assert!(rr.rr.is_finite() && rr.rr > 0.0);
    /// assert!(rr.ci_low < rr.rr && rr.rr < rr.ci_high);
    /// ```
    #[expect(clippy::cast_precision_loss, clippy::many_single_char_names)]
    #[must_use]
    pub fn from_counts(counts: ContingencyCounts) -> Self {
        let corrected = counts.has_zero_cell();
        let shift = if corrected { HALDANE_ANSCOMBE } else { 0.0 };
        let a = counts.a as f64 + shift;
        let b = counts.b as f64 + shift;
        let c = counts.c as f64 + shift;
        let d = counts.d as f64 + shift;

        let rate_level = a / (a + b);
        let rate_rest = c / (c + d);
        let rr = rate_level / rate_rest;
        let se_log = (1.0 / a + 1.0 / b + 1.0 / c + 1.0 / d).sqrt();
        let log_rr = rr.ln();

        Self {
            rr,
            ci_low: (log_rr - Z_95 * se_log).exp(),
            ci_high: (log_rr + Z_95 * se_log).exp(),
            se_log,
            rate_level,
            rate_rest,
            corrected,
        }
    }

    /// `|ln(rr)|`, the magnitude of the association on the log scale.
    #[must_use]
    pub fn abs_log_rr(&self) -> f64 {
        self.rr.ln().abs()
    }

    /// Whether the interval contains 1 (no detectable association).
    #[must_use]
    pub fn ci_contains_one(&self) -> bool {
        self.ci_low <= 1.0 && 1.0 <= self.ci_high
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_rates_give_unit_ratio() {
        let rr = RiskRatio::from_counts(ContingencyCounts { a: 10, b: 10, c: 20, d: 20 });
        assert!(!rr.corrected);
        assert!((rr.rr - 1.0).abs() < 1e-12);
        assert!(rr.abs_log_rr() < 1e-12);
        assert!(rr.ci_contains_one());
    }

    #[test]
    fn test_known_ratio() {
        // 30/40 inside vs 20/40 outside
        let rr = RiskRatio::from_counts(ContingencyCounts { a: 30, b: 10, c: 20, d: 20 });
        assert!((rr.rr - 1.5).abs() < 1e-12);
        let se = (1.0_f64 / 30.0 + 1.0 / 10.0 + 1.0 / 20.0 + 1.0 / 20.0).sqrt();
        assert!((rr.se_log - se).abs() < 1e-12);
        assert!((rr.ci_low - (1.5_f64.ln() - Z_95 * se).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_zero_cell_applies_correction() {
        let rr = RiskRatio::from_counts(ContingencyCounts { a: 0, b: 5, c: 20, d: 30 });
        assert!(rr.corrected);
        let expected = (0.5 / 6.0) / (20.5 / 51.0);
        assert!((rr.rr - expected).abs() < 1e-12);
        assert!(rr.ci_low.is_finite() && rr.ci_high.is_finite());
    }

    #[test]
    fn test_counts_helpers() {
        let counts = ContingencyCounts { a: 3, b: 4, c: 5, d: 6 };
        assert_eq!(counts.n_level(), 7);
        assert_eq!(counts.n_rest(), 11);
    }
}
