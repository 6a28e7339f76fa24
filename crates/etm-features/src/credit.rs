//! Canonical credit-window bands
//!
//! Exports describe a student's credit window either as a credit count or as
//! an overlapping range string such as `"29-55"`. [`CreditWindow::derive`]
//! maps both onto one set of non-overlapping bands so the risk-ratio engine
//! sees comparable levels.

use std::sync::LazyLock;

use regex::Regex;

use crate::{
    schema::parse_number,
    table::{Column, ColumnData, FeatureTable},
};

/// Name of the derived band column.
pub const CREDIT_WINDOW_CANON: &str = "credit_window_canon";

/// Range-string column used when no numeric credit column exists.
pub const CREDIT_WINDOW: &str = "credit_window";

/// Numeric credit columns, in preference order.
pub const CREDIT_SOURCES: [&str; 4] = [
    "attempted_credits",
    "earned_credits",
    "credits_at_checkpoint",
    "credits_by_etm",
];

/// Lower bound (inclusive) and label of each band, ascending.
const BANDS: [(f64, &str); 6] = [
    (0.0, "0-19"),
    (20.0, "20-39"),
    (40.0, "40-59"),
    (60.0, "60-79"),
    (80.0, "80-99"),
    (100.0, "100+"),
];

/// Credits above this are treated as data errors.
const MAX_CREDITS: f64 = 10_000.0;

static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*-\s*(\d+)").expect("valid credit range regex"));

/// Band label for a credit count.
///
/// ```
/// use etm_features::credit::credit_band;
///
/// assert_eq!(credit_band(19.5), Some("0-19"));
/// assert_eq!(credit_band(20.0), Some("20-39"));
/// assert_eq!(credit_band(250.0), Some("100+"));
/// assert_eq!(credit_band(-1.0), None);
/// ```
#[must_use]
pub fn credit_band(credits: f64) -> Option<&'static str> {
    if !credits.is_finite() || !(0.0..=MAX_CREDITS).contains(&credits) {
        return None;
    }
    BANDS
        .iter()
        .rev()
        .find(|(lower, _)| credits >= *lower)
        .map(|(_, label)| *label)
}

/// Midpoint of the first `a-b` range in `text`.
#[must_use]
pub fn range_midpoint(text: &str) -> Option<f64> {
    let caps = RANGE_RE.captures(text)?;
    let low = caps[1].parse::<f64>().ok()?;
    let high = caps[2].parse::<f64>().ok()?;
    Some((low + high) / 2.0)
}

/// A derived band column and the column it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditWindow {
    pub source: String,
    pub column: Column,
}

impl CreditWindow {
    /// Bands the first numeric [`CREDIT_SOURCES`] column, else the midpoints
    /// of [`CREDIT_WINDOW`].
    ///
    /// Returns `None` when the table already has [`CREDIT_WINDOW_CANON`] or
    /// has no usable source.
    #[must_use]
    pub fn derive(table: &FeatureTable) -> Option<Self> {
        if table.column(CREDIT_WINDOW_CANON).is_some() {
            return None;
        }
        let numeric_source = CREDIT_SOURCES
            .iter()
            .filter_map(|name| table.column(name))
            .find_map(|column| column.as_numeric().map(|values| (column, values.to_vec())));
        let (source, credits) = match numeric_source {
            Some(found) => found,
            None => {
                let column = table.column(CREDIT_WINDOW)?;
                let credits = match &column.data {
                    ColumnData::Numeric(values) => values.clone(),
                    ColumnData::Categorical(values) => values
                        .iter()
                        .map(|text| {
                            let text = text.as_deref()?;
                            range_midpoint(text).or_else(|| parse_number(text))
                        })
                        .collect(),
                };
                (column, credits)
            }
        };
        let bands = credits
            .iter()
            .map(|credits| credits.and_then(credit_band).map(str::to_owned))
            .collect();
        Some(Self {
            source: source.name.clone(),
            column: Column {
                name: CREDIT_WINDOW_CANON.to_owned(),
                data: ColumnData::Categorical(bands),
            },
        })
    }
}
