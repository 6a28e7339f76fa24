//! Term-GPA trajectories
//!
//! A student's term GPAs arrive as a sparse grid keyed by slot labels such as
//! `1st_fall` or `3rd Summer`. [`TermSlot`] gives every label a deterministic
//! position, and [`TrajectoryFeatures`] summarizes the populated slots.
//!
//! # Term Order
//!
//! Within one ordinal year-slot the season order is fixed: Spring, Summer,
//! Fall. The derived index is
//!
//! ```text
//! term_index = (ordinal - 1) * 3 + season_rank + 1
//! ```
//!
//! so `1st_spring` is 1, `1st_fall` is 3 and `2nd_spring` is 4.
//!
//! ```
//! use etm_features::trajectory::{Season, TermSlot};
//!
//! let slot: TermSlot = "2nd Spring".parse().unwrap();
//! assert_eq!(slot.season, Season::Spring);
//! assert_eq!(slot.term_index(), 4);
//! assert_eq!(slot.to_string(), "2nd_spring");
//! ```
//!
//! # Input Shapes
//!
//! - **Long**: `random_id`, `term_slot`, `term_gpa`, optional `term_index`
//! - **Wide**: `random_id` plus one column per slot label; other columns are
//!   ignored
//!
//! Either shape may carry a `first_term` (or `1st_term`) column holding the
//! student's entry term as a registrar code, see [`TermCode`].

use std::{collections::BTreeMap, fmt, str::FromStr, sync::LazyLock};

use etm_stats::{descriptive::DescriptiveStats, regression};
use regex::Regex;

use crate::{
    record::RANDOM_ID,
    schema::{FieldSpec, IngestError, RawTable, SchemaResolver, parse_number},
};

/// Season of a term slot, ordered within an ordinal year-slot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display,
)]
pub enum Season {
    #[display("spring")]
    Spring,
    #[display("summer")]
    Summer,
    #[display("fall")]
    Fall,
}

impl Season {
    #[must_use]
    pub const fn rank(self) -> u32 {
        match self {
            Self::Spring => 0,
            Self::Summer => 1,
            Self::Fall => 2,
        }
    }

    #[must_use]
    pub const fn is_summer(self) -> bool {
        matches!(self, Self::Summer)
    }
}

/// Slot label parse failure.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("invalid term slot label `{label}`")]
pub struct ParseTermSlotError {
    label: String,
}

static SLOT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([1-9])\s*(?:st|nd|rd|th)[\s_\-]*(fall|spring|summer)$")
        .expect("valid term slot regex")
});

/// Ordinal year-slot plus season.
///
/// Ordering follows `(ordinal, season)` and agrees with [`Self::term_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermSlot {
    pub ordinal: u32,
    pub season: Season,
}

impl TermSlot {
    #[must_use]
    pub const fn term_index(self) -> u32 {
        self.ordinal.saturating_sub(1) * 3 + self.season.rank() + 1
    }
}

impl FromStr for TermSlot {
    type Err = ParseTermSlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTermSlotError {
            label: s.to_owned(),
        };
        let caps = SLOT_RE.captures(s.trim()).ok_or_else(err)?;
        let ordinal = caps[1].parse::<u32>().map_err(|_| err())?;
        let season = match caps[2].to_ascii_lowercase().as_str() {
            "spring" => Season::Spring,
            "summer" => Season::Summer,
            "fall" => Season::Fall,
            _ => return Err(err()),
        };
        Ok(Self { ordinal, season })
    }
}

impl fmt::Display for TermSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.ordinal % 100 {
            11..=13 => "th",
            n => match n % 10 {
                1 => "st",
                2 => "nd",
                3 => "rd",
                _ => "th",
            },
        };
        write!(f, "{}{}_{}", self.ordinal, suffix, self.season)
    }
}

/// Four-digit registrar term code such as `2158`.
///
/// The year is `2000 + (code / 10 - 200)`. The last digit is the season:
/// 1 for spring, 5 for summer, 8 for fall.
///
/// ```
/// use etm_features::trajectory::{Season, TermCode};
///
/// let code: TermCode = "2158".parse().unwrap();
/// assert_eq!(code.year, 2015);
/// assert_eq!(code.season(), Some(Season::Fall));
/// assert_eq!(code.to_string(), "Fall 2015");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermCode {
    pub year: i32,
    pub digit: u8,
}

/// Term code parse failure.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("invalid term code `{code}`")]
pub struct ParseTermCodeError {
    code: String,
}

impl TermCode {
    /// Decodes a four-digit code.
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        if !(1000..=9999).contains(&code) {
            return None;
        }
        let year = 2000 + i32::try_from(code / 10).ok()? - 200;
        let digit = u8::try_from(code % 10).ok()?;
        Some(Self { year, digit })
    }

    #[must_use]
    pub const fn season(self) -> Option<Season> {
        match self.digit {
            1 => Some(Season::Spring),
            5 => Some(Season::Summer),
            8 => Some(Season::Fall),
            _ => None,
        }
    }
}

impl FromStr for TermCode {
    type Err = ParseTermCodeError;

    /// Accepts integral numbers, including spreadsheet renderings like
    /// `2158.0`.
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTermCodeError { code: s.to_owned() };
        let value = parse_number(s).ok_or_else(err)?;
        if value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
            return Err(err());
        }
        Self::from_code(value as u32).ok_or_else(err)
    }
}

impl fmt::Display for TermCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.season() {
            Some(Season::Spring) => write!(f, "Spring {}", self.year),
            Some(Season::Summer) => write!(f, "Summer {}", self.year),
            Some(Season::Fall) => write!(f, "Fall {}", self.year),
            None => write!(f, "Term{} {}", self.digit, self.year),
        }
    }
}

/// One populated or empty slot of a student's grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermEntry {
    pub slot: TermSlot,
    pub term_index: u32,
    pub gpa: Option<f64>,
}

/// One student's term GPAs, ordered by term index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TermGpaGrid {
    pub random_id: String,
    /// Entry term, when the export carries a term code.
    pub first_term: Option<TermCode>,
    entries: BTreeMap<u32, TermEntry>,
}

const TERM_SLOT: FieldSpec = FieldSpec::with_aliases("term_slot", &["term", "slot"]);
const TERM_GPA: FieldSpec = FieldSpec::with_aliases("term_gpa", &["gpa"]);
const TERM_INDEX: FieldSpec = FieldSpec::exact("term_index");
const FIRST_TERM: FieldSpec = FieldSpec::with_aliases("first_term", &["1st_term", "entry_term"]);

impl TermGpaGrid {
    #[must_use]
    pub fn new(random_id: impl Into<String>) -> Self {
        Self {
            random_id: random_id.into(),
            first_term: None,
            entries: BTreeMap::new(),
        }
    }

    /// Adds a slot at its derived term index.
    pub fn insert(&mut self, slot: TermSlot, gpa: Option<f64>) {
        self.insert_at(slot, slot.term_index(), gpa);
    }

    /// Adds a slot at an explicit term index. The first entry for an index wins.
    pub fn insert_at(&mut self, slot: TermSlot, term_index: u32, gpa: Option<f64>) {
        if let Some(existing) = self.entries.get(&term_index) {
            tracing::debug!(
                random_id = %self.random_id,
                term_index,
                kept = %existing.slot,
                dropped = %slot,
                "duplicate term index"
            );
            return;
        }
        self.entries.insert(
            term_index,
            TermEntry {
                slot,
                term_index,
                gpa,
            },
        );
    }

    pub fn entries(&self) -> impl Iterator<Item = &TermEntry> {
        self.entries.values()
    }

    /// Populated entries in term-index order.
    pub fn populated(&self) -> impl Iterator<Item = (&TermEntry, f64)> {
        self.entries().filter_map(|e| Some((e, e.gpa?)))
    }

    /// Reads a long table: one row per (student, slot).
    pub fn from_long(table: &RawTable) -> Result<Vec<Self>, IngestError> {
        if table.is_empty() {
            return Err(IngestError::EmptyInput {
                table: "term GPA".to_owned(),
            });
        }
        let resolver = SchemaResolver::new(table);
        let id_col = resolver.require(&RANDOM_ID)?;
        let slot_col = resolver.require(&TERM_SLOT)?;
        let gpa_col = resolver.require(&TERM_GPA)?;
        let index_col = resolver.resolve(&TERM_INDEX);
        let first_term_col = resolver.resolve(&FIRST_TERM);

        let mut grids = BTreeMap::<String, Self>::new();
        for row in 0..table.len() {
            let Some(random_id) = table.cell(row, id_col) else {
                continue;
            };
            let first_term = first_term_col.and_then(|col| read_term_code(table, row, col));
            if first_term.is_some() {
                let grid = grids
                    .entry(random_id.to_owned())
                    .or_insert_with(|| Self::new(random_id));
                grid.first_term = grid.first_term.or(first_term);
            }
            let Some(slot) = table.cell(row, slot_col).and_then(|s| s.parse::<TermSlot>().ok())
            else {
                tracing::debug!(row = row + 1, "skipping term row with unparsable slot");
                continue;
            };
            let gpa = table.number(row, gpa_col);
            let term_index = index_col
                .and_then(|col| table.number(row, col))
                .and_then(integral_index)
                .unwrap_or_else(|| slot.term_index());
            grids
                .entry(random_id.to_owned())
                .or_insert_with(|| Self::new(random_id))
                .insert_at(slot, term_index, gpa);
        }
        Ok(grids.into_values().collect())
    }

    /// Reads a wide table: one row per student, one column per slot label.
    pub fn from_wide(table: &RawTable) -> Result<Vec<Self>, IngestError> {
        if table.is_empty() {
            return Err(IngestError::EmptyInput {
                table: "term GPA".to_owned(),
            });
        }
        let resolver = SchemaResolver::new(table);
        let id_col = resolver.require(&RANDOM_ID)?;
        let first_term_col = resolver.resolve(&FIRST_TERM);
        let slot_cols = table
            .columns()
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != id_col && Some(*index) != first_term_col)
            .filter_map(|(index, name)| match name.parse::<TermSlot>() {
                Ok(slot) => Some((index, slot)),
                Err(_) => {
                    tracing::debug!(column = %name, "ignoring non-term column");
                    None
                }
            })
            .collect::<Vec<_>>();

        let mut grids = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            let Some(random_id) = table.cell(row, id_col) else {
                continue;
            };
            let mut grid = Self::new(random_id);
            grid.first_term = first_term_col.and_then(|col| read_term_code(table, row, col));
            for (col, slot) in &slot_cols {
                grid.insert(*slot, table.cell(row, *col).and_then(parse_number));
            }
            grids.push(grid);
        }
        grids.sort_by(|a, b| a.random_id.cmp(&b.random_id));
        Ok(grids)
    }
}

fn read_term_code(table: &RawTable, row: usize, col: usize) -> Option<TermCode> {
    let text = table.cell(row, col)?;
    match text.parse() {
        Ok(code) => Some(code),
        Err(err) => {
            tracing::debug!(row = row + 1, %err, "ignoring term code");
            None
        }
    }
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn integral_index(value: f64) -> Option<u32> {
    (value >= 1.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX)).then(|| value as u32)
}

/// One row of the emitted long term table.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TermRow {
    pub random_id: String,
    pub term_index: u32,
    pub term_slot: String,
    pub term_gpa: f64,
    pub is_summer: u8,
    pub is_regular: u8,
}

/// Long table of populated terms sorted by `(random_id, term_index)`.
#[must_use]
pub fn long_term_rows(grids: &[TermGpaGrid]) -> Vec<TermRow> {
    let mut rows = grids
        .iter()
        .flat_map(|grid| {
            grid.populated().map(|(entry, gpa)| {
                let is_summer = entry.slot.season.is_summer();
                TermRow {
                    random_id: grid.random_id.clone(),
                    term_index: entry.term_index,
                    term_slot: entry.slot.to_string(),
                    term_gpa: gpa,
                    is_summer: u8::from(is_summer),
                    is_regular: u8::from(!is_summer),
                }
            })
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| {
        a.random_id
            .cmp(&b.random_id)
            .then(a.term_index.cmp(&b.term_index))
    });
    rows
}

/// Per-student summary of populated term GPAs.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryFeatures {
    pub terms_with_gpa: u32,
    pub mean_term_gpa: f64,
    pub median_term_gpa: f64,
    /// Sample standard deviation; `None` with fewer than two terms.
    pub std_term_gpa: Option<f64>,
    pub min_term_gpa: f64,
    pub max_term_gpa: f64,
    pub first_term_gpa: f64,
    pub last_term_gpa: f64,
    pub n_summer_terms: u32,
    pub n_regular_terms: u32,
    pub low_gpa_terms_2_5: u32,
    pub low_gpa_terms_3_0: u32,
    /// OLS slope of GPA on term index; `None` with fewer than two distinct indices.
    pub gpa_trend_slope: Option<f64>,
    /// Mean of the first two regular terms; `None` with fewer than two.
    pub first_two_regular_mean_gpa: Option<f64>,
    pub summer_term_ratio: Option<f64>,
}

impl TrajectoryFeatures {
    /// Summarizes a grid, or `None` when no slot holds a GPA.
    #[must_use]
    pub fn from_grid(grid: &TermGpaGrid) -> Option<Self> {
        let populated = grid.populated().collect::<Vec<_>>();
        let gpas = populated.iter().map(|(_, gpa)| *gpa).collect::<Vec<_>>();
        let stats = DescriptiveStats::new(gpas.iter().copied())?;
        let (&(_, first_term_gpa), &(_, last_term_gpa)) = (populated.first()?, populated.last()?);

        let count_where = |pred: &dyn Fn(&TermEntry, f64) -> bool| {
            let count = populated.iter().filter(|&&(e, g)| pred(e, g)).count();
            u32::try_from(count).unwrap_or(u32::MAX)
        };
        let terms_with_gpa = count_where(&|_, _| true);
        let n_summer_terms = count_where(&|e, _| e.slot.season.is_summer());
        let n_regular_terms = terms_with_gpa - n_summer_terms;

        let points = populated
            .iter()
            .map(|(e, gpa)| (f64::from(e.term_index), *gpa))
            .collect::<Vec<_>>();
        let regular = populated
            .iter()
            .filter(|(e, _)| !e.slot.season.is_summer())
            .map(|(_, gpa)| *gpa)
            .take(2)
            .collect::<Vec<_>>();

        Some(Self {
            terms_with_gpa,
            mean_term_gpa: stats.mean,
            median_term_gpa: stats.median,
            std_term_gpa: stats.std_dev,
            min_term_gpa: stats.min,
            max_term_gpa: stats.max,
            first_term_gpa,
            last_term_gpa,
            n_summer_terms,
            n_regular_terms,
            low_gpa_terms_2_5: count_where(&|_, g| g < 2.5),
            low_gpa_terms_3_0: count_where(&|_, g| g < 3.0),
            gpa_trend_slope: regression::ols_slope(&points),
            first_two_regular_mean_gpa: (regular.len() == 2)
                .then(|| (regular[0] + regular[1]) / 2.0),
            summer_term_ratio: (terms_with_gpa > 0)
                .then(|| f64::from(n_summer_terms) / f64::from(terms_with_gpa)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(label: &str) -> TermSlot {
        label.parse().unwrap()
    }

    fn grid(entries: &[(&str, Option<f64>)]) -> TermGpaGrid {
        let mut grid = TermGpaGrid::new("s1");
        for (label, gpa) in entries {
            grid.insert(slot(label), *gpa);
        }
        grid
    }

    #[test]
    fn test_slot_parsing() {
        assert_eq!(
            slot("1st_fall"),
            TermSlot {
                ordinal: 1,
                season: Season::Fall
            }
        );
        assert_eq!(slot("3RD-SUMMER").season, Season::Summer);
        assert_eq!(slot(" 9th Spring ").ordinal, 9);
        assert!("10th_fall".parse::<TermSlot>().is_err());
        assert!("first_fall".parse::<TermSlot>().is_err());
        assert!("1st_winter".parse::<TermSlot>().is_err());
    }

    #[test]
    fn test_term_index_is_strict_total_order() {
        let labels = ["1st_spring", "1st_summer", "1st_fall", "2nd_spring", "2nd_summer"];
        let indices = labels.map(|l| slot(l).term_index());
        assert_eq!(indices, [1, 2, 3, 4, 5]);
        assert!(slot("1st_fall") < slot("2nd_spring"));
    }

    #[test]
    fn test_features_of_mixed_grid() {
        let grid = grid(&[
            ("1st_fall", Some(2.0)),
            ("1st_spring", Some(3.0)),
            ("1st_summer", Some(3.5)),
            ("2nd_fall", None),
            ("2nd_spring", Some(2.4)),
        ]);
        let features = TrajectoryFeatures::from_grid(&grid).unwrap();
        assert_eq!(features.terms_with_gpa, 4);
        assert_eq!(features.n_summer_terms, 1);
        assert_eq!(features.n_regular_terms, 3);
        // index order: spring(1)=3.0, summer(2)=3.5, fall(3)=2.0, 2nd spring(4)=2.4
        assert_eq!(features.first_term_gpa, 3.0);
        assert_eq!(features.last_term_gpa, 2.4);
        assert_eq!(features.low_gpa_terms_2_5, 2);
        assert_eq!(features.low_gpa_terms_3_0, 2);
        assert_eq!(features.min_term_gpa, 2.0);
        assert_eq!(features.max_term_gpa, 3.5);
        assert!((features.first_two_regular_mean_gpa.unwrap() - 2.5).abs() < 1e-12);
        assert!((features.summer_term_ratio.unwrap() - 0.25).abs() < 1e-12);
        assert!(features.gpa_trend_slope.unwrap() < 0.0);
    }

    #[test]
    fn test_flat_trajectory_has_zero_slope() {
        let mut grid = TermGpaGrid::new("s1");
        grid.insert_at(slot("1st_fall"), 1, Some(3.0));
        grid.insert_at(slot("2nd_fall"), 2, Some(3.0));
        let features = TrajectoryFeatures::from_grid(&grid).unwrap();
        assert_eq!(features.gpa_trend_slope, Some(0.0));
    }

    #[test]
    fn test_single_term() {
        let features = TrajectoryFeatures::from_grid(&grid(&[("1st_summer", Some(3.2))])).unwrap();
        assert_eq!(features.std_term_gpa, None);
        assert_eq!(features.gpa_trend_slope, None);
        assert_eq!(features.first_two_regular_mean_gpa, None);
        assert_eq!(features.summer_term_ratio, Some(1.0));
    }

    #[test]
    fn test_empty_grid_has_no_features() {
        assert!(TrajectoryFeatures::from_grid(&grid(&[("1st_fall", None)])).is_none());
    }

    #[test]
    fn test_from_wide() {
        let table = RawTable::new(
            ["Random ID", "1st Fall", "1st Spring", "1st Term"],
            vec![
                vec!["b".into(), "3.0".into(), "".into(), "FA19".into()],
                vec!["a".into(), "x".into(), "2.5".into(), "SP20".into()],
            ],
        );
        let grids = TermGpaGrid::from_wide(&table).unwrap();
        assert_eq!(grids.len(), 2);
        assert_eq!(grids[0].random_id, "a");
        assert_eq!(grids[0].entries().count(), 2);
        assert_eq!(grids[0].populated().count(), 1);

        let rows = long_term_rows(&grids);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].random_id, "a");
        assert_eq!(rows[0].term_slot, "1st_spring");
        assert_eq!(rows[0].is_regular, 1);
        assert_eq!(rows[1].term_index, 3);
    }

    #[test]
    fn test_from_long_with_explicit_index() {
        let table = RawTable::new(
            ["random_id", "term_slot", "term_gpa", "term_index"],
            vec![
                vec!["a".into(), "1st_fall".into(), "3.0".into(), "1".into()],
                vec!["a".into(), "1st_spring".into(), "3.4".into(), "2".into()],
                vec!["a".into(), "bogus".into(), "3.9".into(), "3".into()],
            ],
        );
        let grids = TermGpaGrid::from_long(&table).unwrap();
        assert_eq!(grids.len(), 1);
        let indices = grids[0].entries().map(|e| e.term_index).collect::<Vec<_>>();
        assert_eq!(indices, [1, 2]);
        let features = TrajectoryFeatures::from_grid(&grids[0]).unwrap();
        assert_eq!(features.first_term_gpa, 3.0);
        assert!((features.gpa_trend_slope.unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_term_code_decoding() {
        let label = |code: &str| code.parse::<TermCode>().unwrap().to_string();
        assert_eq!(label("2158"), "Fall 2015");
        assert_eq!(label("2161"), "Spring 2016");
        assert_eq!(label("2165"), "Summer 2016");
        assert_eq!(label("2208.0"), "Fall 2020");
        assert_eq!(label("2193"), "Term3 2019");
        assert_eq!(label("1998"), "Fall 1999");

        for bad in ["FA19", "215.8", "-2158", "21580", ""] {
            assert!(bad.parse::<TermCode>().is_err(), "{bad}");
        }
        let fall = TermCode::from_code(2158).unwrap();
        assert!(TermCode::from_code(2161).unwrap() > fall);
    }

    #[test]
    fn test_first_term_from_wide() {
        let table = RawTable::new(
            ["Random ID", "1st Fall", "1st Term"],
            vec![
                vec!["a".into(), "3.1".into(), "2158".into()],
                vec!["b".into(), "2.9".into(), String::new()],
            ],
        );
        let grids = TermGpaGrid::from_wide(&table).unwrap();
        assert_eq!(grids[0].first_term.map(|c| c.to_string()).as_deref(), Some("Fall 2015"));
        assert_eq!(grids[0].entries().count(), 1);
        assert_eq!(grids[1].first_term, None);
    }

    #[test]
    fn test_first_term_from_long() {
        let table = RawTable::new(
            ["random_id", "term_slot", "term_gpa", "first_term"],
            vec![
                vec!["a".into(), "1st_fall".into(), "3.0".into(), String::new()],
                vec!["a".into(), "1st_spring".into(), "3.4".into(), "2161".into()],
                vec!["a".into(), "2nd_fall".into(), "3.2".into(), "2168".into()],
            ],
        );
        let grids = TermGpaGrid::from_long(&table).unwrap();
        assert_eq!(grids.len(), 1);
        assert_eq!(grids[0].first_term, TermCode::from_code(2161));
        assert_eq!(grids[0].populated().count(), 3);
    }

    #[test]
    fn test_from_long_requires_gpa_column() {
        let table = RawTable::new(["random_id", "term_slot"], vec![vec!["a".into(), "1st_fall".into()]]);
        assert!(matches!(
            TermGpaGrid::from_long(&table),
            Err(IngestError::MissingColumn { .. })
        ));
    }
}
