//! Quantile bucketing for data analysis
//!
//! This module places a numeric feature into buckets whose edges are taken from
//! the feature's own quantiles, so each bucket holds roughly the same share of
//! observations regardless of skew.
//!
//! # Tied Values
//!
//! Heavily tied data (for example a count that is zero for most students) makes
//! several quantiles coincide. Duplicate edges are collapsed, producing fewer,
//! wider buckets instead of empty ones:
//!
//! ```
//! use etm_stats::binning::QuantileBuckets;
//!
//! let mut values = vec![0.0; 12];
//! values.extend([1.0, 2.0, 3.0, 4.0]);
//!
//! // 0.0 sits at the minimum, first quartile and median, so only two buckets survive
//! let buckets = QuantileBuckets::new(values, 4).unwrap();
//! assert_eq!(buckets.len(), 2);
//! assert_eq!(buckets.edges(), &[0.0, 0.25, 4.0]);
//! ```
//!
//! # Bucket Boundaries
//!
//! Buckets are right-closed, `(lo, hi]`, except the first, which also contains
//! its lower edge. When every value is identical a single bucket
//! `[value - 1e-6, value + 1e-6]` is produced.

use crate::quantile;

const DEGENERATE_PADDING: f64 = 1e-6;

/// Quantile-derived bucket edges for one numeric feature.
///
/// `edges` is strictly increasing; bucket `i` covers `edges[i]..=edges[i + 1]`
/// with the lower bound exclusive for every bucket but the first.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileBuckets {
    edges: Vec<f64>,
}

impl QuantileBuckets {
    /// Computes bucket edges from unsorted values.
    ///
    /// Non-finite values are ignored.
    ///
    /// # Returns
    ///
    /// * `Some(QuantileBuckets)` - if at least one finite value is present and
    ///   `num_buckets > 0`
    /// * `None` - otherwise
    #[must_use]
    pub fn new<I>(values: I, num_buckets: usize) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut sorted = values
            .into_iter()
            .filter(|v| v.is_finite())
            .collect::<Vec<_>>();
        sorted.sort_by(f64::total_cmp);
        Self::from_sorted(&sorted, num_buckets)
    }

    /// Computes bucket edges from pre-sorted finite values.
    ///
    /// # Algorithm
    ///
    /// 1. Take the quantiles at `0, 1/k, 2/k, ..., 1`
    /// 2. Drop duplicate edges caused by tied values
    /// 3. Merge any bucket left empty into its successor
    ///
    /// # Panics
    ///
    /// Panics if `sorted_values` is not sorted in ascending order.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_sorted(sorted_values: &[f64], num_buckets: usize) -> Option<Self> {
        assert!(
            sorted_values.is_sorted_by(|a, b| a <= b),
            "values must be sorted in ascending order"
        );
        if sorted_values.is_empty() || num_buckets == 0 {
            return None;
        }

        let points = (0..=num_buckets)
            .map(|i| i as f64 / num_buckets as f64)
            .collect::<Vec<_>>();
        let mut edges = quantile::quantiles_sorted(sorted_values, &points);
        edges.dedup();

        if edges.len() < 2 {
            let value = edges[0];
            return Some(Self {
                edges: vec![value - DEGENERATE_PADDING, value + DEGENERATE_PADDING],
            });
        }

        let mut buckets = Self { edges };
        buckets.merge_empty_buckets(sorted_values);
        Some(buckets)
    }

    fn merge_empty_buckets(&mut self, sorted_values: &[f64]) {
        loop {
            let counts = self.counts(sorted_values.iter().copied());
            // The first bucket holds the minimum and the last holds the maximum,
            // so only interior buckets can be empty.
            let Some(empty) = counts.iter().position(|&c| c == 0) else {
                return;
            };
            self.edges.remove(empty + 1);
        }
    }

    /// Number of buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len() - 1
    }

    /// Always `false`: a bucketing has at least one bucket.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The literal bucket edges, ascending.
    #[must_use]
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Lower and upper edge of bucket `index`.
    #[must_use]
    pub fn bounds(&self, index: usize) -> Option<(f64, f64)> {
        Some((*self.edges.get(index)?, *self.edges.get(index + 1)?))
    }

    /// Returns the bucket index that `value` falls in, or `None` outside the
    /// edges.
    ///
    /// ```
    /// use etm_stats::binning::QuantileBuckets;
    ///
    /// let buckets = QuantileBuckets::new([0.0, 1.0, 2.0], 2).unwrap();
    /// assert_eq!(buckets.edges(), &[0.0, 1.0, 2.0]);
    /// assert_eq!(buckets.bucket_of(0.0), Some(0));
    /// assert_eq!(buckets.bucket_of(1.0), Some(0));
    /// assert_eq!(buckets.bucket_of(1.5), Some(1));
    /// assert_eq!(buckets.bucket_of(2.5), None);
    /// ```
    #[must_use]
    pub fn bucket_of(&self, value: f64) -> Option<usize> {
        let first = *self.edges.first()?;
        let last = *self.edges.last()?;
        if !(first..=last).contains(&value) {
            return None;
        }
        let idx = self.edges.partition_point(|edge| *edge < value);
        Some(idx.saturating_sub(1))
    }

    /// Counts how many values fall in each bucket.
    #[must_use]
    pub fn counts<I>(&self, values: I) -> Vec<usize>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut counts = vec![0; self.len()];
        for value in values {
            if let Some(idx) = self.bucket_of(value) {
                counts[idx] += 1;
            }
        }
        counts
    }

    /// Human-readable interval label for bucket `index`.
    ///
    /// ```
    /// use etm_stats::binning::QuantileBuckets;
    ///
    /// let buckets = QuantileBuckets::new([0.0, 1.0, 2.0], 2).unwrap();
    /// assert_eq!(buckets.label(0).as_deref(), Some("[0.00, 1.00]"));
    /// assert_eq!(buckets.label(1).as_deref(), Some("(1.00, 2.00]"));
    /// ```
    #[must_use]
    pub fn label(&self, index: usize) -> Option<String> {
        let (lo, hi) = self.bounds(index)?;
        let open = if index == 0 { '[' } else { '(' };
        Some(format!("{open}{lo:.2}, {hi:.2}]"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values() {
        assert!(QuantileBuckets::new(std::iter::empty(), 4).is_none());
    }

    #[test]
    fn test_zero_buckets() {
        assert!(QuantileBuckets::new([1.0, 2.0], 0).is_none());
    }

    #[test]
    fn test_all_same_value() {
        let buckets = QuantileBuckets::new(vec![3.0; 20], 4).unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets.bucket_of(3.0), Some(0));
        let (lo, hi) = buckets.bounds(0).unwrap();
        assert!(lo < 3.0 && 3.0 < hi);
    }

    #[test]
    fn test_distinct_values_give_requested_bucket_count() {
        let values = (1..=20).map(f64::from).collect::<Vec<_>>();
        let buckets = QuantileBuckets::new(values.clone(), 4).unwrap();
        assert_eq!(buckets.len(), 4);
        let counts = buckets.counts(values);
        assert_eq!(counts.iter().sum::<usize>(), 20);
        assert!(counts.iter().all(|&c| c > 0));
    }

    #[test]
    fn test_coinciding_quantile_edges_collapse() {
        // five distinct values, but only two distinct quartile edges
        let mut values = vec![1.0; 90];
        values.extend([2.0, 3.0, 4.0, 5.0]);
        let buckets = QuantileBuckets::new(values.clone(), 4).unwrap();
        assert_eq!(buckets.edges(), &[1.0, 5.0]);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets.counts(values), [94]);
    }

    #[test]
    fn test_every_value_is_assigned() {
        let values = vec![0.5, 0.5, 1.0, 2.0, 2.0, 2.0, 3.5, 9.0, 9.0];
        let buckets = QuantileBuckets::new(values.clone(), 5).unwrap();
        for value in &values {
            assert!(buckets.bucket_of(*value).is_some(), "value {value} unassigned");
        }
        assert!(buckets.counts(values).iter().all(|&c| c > 0));
    }

    #[test]
    fn test_edges_strictly_increasing() {
        let values = vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 3.0, 10.0];
        let buckets = QuantileBuckets::new(values, 5).unwrap();
        assert!(buckets.edges().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_non_finite_values_are_ignored() {
        let buckets = QuantileBuckets::new([1.0, f64::NAN, 2.0, f64::INFINITY], 1).unwrap();
        assert_eq!(buckets.edges(), &[1.0, 2.0]);
    }
}
