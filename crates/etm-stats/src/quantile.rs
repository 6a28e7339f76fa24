/// Computes a single quantile from sorted data.
///
/// Uses linear interpolation between the two nearest order statistics: for `n`
/// values the quantile `q` sits at fractional position `(n - 1) * q`.
///
/// # Arguments
///
/// * `sorted_values` - Values sorted in ascending order
/// * `q` - The quantile to compute, clamped to `0.0..=1.0`
///
/// # Returns
///
/// The interpolated value. Returns `f64::NAN` if the input is empty.
///
/// # Examples
///
/// ```
/// use etm_stats::quantile::quantile_sorted;
///
/// let values = [1.0, 2.0, 3.0, 4.0];
/// assert_eq!(quantile_sorted(&values, 0.0), 1.0);
/// assert_eq!(quantile_sorted(&values, 0.5), 2.5);
/// assert_eq!(quantile_sorted(&values, 1.0), 4.0);
/// ```
#[expect(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
#[must_use]
pub fn quantile_sorted(sorted_values: &[f64], q: f64) -> f64 {
    if sorted_values.is_empty() {
        return f64::NAN;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = (sorted_values.len() - 1) as f64 * q;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return sorted_values[lower];
    }
    let frac = pos - lower as f64;
    sorted_values[lower] + (sorted_values[upper] - sorted_values[lower]) * frac
}

/// Computes several quantiles from sorted data.
///
/// # Panics
///
/// Panics if `sorted_values` is not sorted in ascending order.
///
/// ```
/// use etm_stats::quantile::quantiles_sorted;
///
/// let values = [0.0, 10.0];
/// assert_eq!(quantiles_sorted(&values, &[0.25, 0.75]), vec![2.5, 7.5]);
/// ```
#[must_use]
pub fn quantiles_sorted(sorted_values: &[f64], points: &[f64]) -> Vec<f64> {
    assert!(
        sorted_values.is_sorted_by(|a, b| a <= b),
        "values must be sorted in ascending order"
    );
    points
        .iter()
        .map(|&q| quantile_sorted(sorted_values, q))
        .collect()
}
