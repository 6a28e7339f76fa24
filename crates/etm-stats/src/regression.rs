/// Ordinary least-squares slope of `y` on `x`.
///
/// Uses the closed form `Σ(x − x̄)(y − ȳ) / Σ(x − x̄)²` with no regularization.
///
/// # Returns
///
/// * `Some(slope)` - when at least two points with distinct `x` are given
/// * `None` - when fewer than two points are given or every `x` is equal
///
/// # Examples
///
/// ```
/// use etm_stats::regression::ols_slope;
///
/// assert_eq!(ols_slope(&[(1.0, 3.0), (2.0, 3.0)]), Some(0.0));
/// assert_eq!(ols_slope(&[(1.0, 3.0), (1.0, 2.0)]), None);
/// assert_eq!(ols_slope(&[(1.0, 3.0)]), None);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn ols_slope(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let x_mean = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (num, den) = points.iter().fold((0.0, 0.0), |(num, den), (x, y)| {
        let dx = x - x_mean;
        (num + dx * (y - y_mean), den + dx * dx)
    });
    if den <= 0.0 {
        return None;
    }
    Some(num / den)
}
