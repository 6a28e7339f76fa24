//! Column standardization and alias resolution at the ingestion boundary
//!
//! Raw exports arrive with spreadsheet headers (`"CGPA at ETM (to any
//! campus)"`, `"1st Fall"`). [`RawTable::new`] standardizes every header to
//! snake case once; [`SchemaResolver`] then maps each logical field to a
//! physical column through an explicit alias list, falling back to the first
//! column containing all of the field's fuzzy tokens.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

/// Fatal problems with an input table.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum IngestError {
    #[display("required column `{field}` not found (tried: {tried})")]
    MissingColumn { field: String, tried: String },
    #[display("{table} table has no rows")]
    EmptyInput { table: String },
}

static NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9a-zA-Z_ ]+").expect("valid non-word regex"));
static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s_]+").expect("valid separator regex"));

/// Normalizes a raw header to snake case.
///
/// ```
/// use etm_features::schema::standardize_column;
///
/// assert_eq!(standardize_column(" Random ID "), "random_id");
/// assert_eq!(standardize_column("CGPA at ETM (to any campus)"), "cgpa_at_etm_to_any_campus");
/// assert_eq!(standardize_column("No. of Courses Taken ≥3rd Time"), "no_of_courses_taken_ge3rd_time");
/// assert_eq!(standardize_column("% Credits / Term"), "pct_credits_term");
/// assert_eq!(standardize_column("2nd-Spring"), "2nd_spring");
/// ```
#[must_use]
pub fn standardize_column(name: &str) -> String {
    let replaced = name
        .trim()
        .replace('≥', "ge")
        .replace('(', "_")
        .replace(')', "")
        .replace('/', "_")
        .replace('%', "pct")
        .replace('-', " ");
    let cleaned = NON_WORD_RE.replace_all(&replaced, "");
    let joined = SEPARATOR_RE.replace_all(cleaned.trim(), "_");
    joined.trim_matches('_').to_lowercase()
}

/// A header row plus string cells, as read from a CSV export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Builds a table, standardizing every header.
    ///
    /// Short rows are padded with blank cells.
    #[must_use]
    pub fn new<I, S>(headers: I, rows: Vec<Vec<String>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let columns = headers
            .into_iter()
            .map(|h| standardize_column(h.as_ref()))
            .collect::<Vec<_>>();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < columns.len() {
                    row.resize(columns.len(), String::new());
                }
                row
            })
            .collect();
        Self { columns, rows }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Trimmed cell text, or `None` when blank.
    #[must_use]
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        let text = self.rows.get(row)?.get(column)?.trim();
        (!text.is_empty()).then_some(text)
    }

    /// Cell parsed as a finite number; anything unparsable is missing.
    #[must_use]
    pub fn number(&self, row: usize, column: usize) -> Option<f64> {
        parse_number(self.cell(row, column)?)
    }
}

/// Parses a numeric cell, treating non-finite and unparsable text as missing.
#[must_use]
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Default pattern of cell texts that stand for a missing value.
pub const DEFAULT_MISSING_PATTERN: &str = r"^\s*(n/?a|na|n\.a\.|not\s+available)(.*101.*)?\s*$";

static DEFAULT_SENTINELS: LazyLock<MissingSentinels> = LazyLock::new(|| {
    MissingSentinels::new(DEFAULT_MISSING_PATTERN).expect("valid missing-sentinel regex")
});

/// Cell texts that exports use in place of a blank, matched case-insensitively.
///
/// ```
/// use etm_features::schema::MissingSentinels;
///
/// let sentinels = MissingSentinels::default();
/// assert!(sentinels.is_missing("N/A (101)"));
/// assert!(sentinels.is_missing(" not available "));
/// assert!(!sentinels.is_missing("NAU"));
/// ```
#[derive(Debug, Clone)]
pub struct MissingSentinels {
    pattern: Regex,
}

impl Default for MissingSentinels {
    fn default() -> Self {
        DEFAULT_SENTINELS.clone()
    }
}

impl MissingSentinels {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self { pattern })
    }

    #[must_use]
    pub fn is_missing(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// `text` unless it is a sentinel.
    #[must_use]
    pub fn present<'t>(&self, text: &'t str) -> Option<&'t str> {
        (!self.is_missing(text)).then_some(text)
    }
}

/// How a logical field is located in a [`RawTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Canonical output name, also the first alias tried.
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    /// Tokens that must all appear in a column name for the fuzzy fallback.
    /// Empty disables the fallback.
    pub contains_all: &'static [&'static str],
}

impl FieldSpec {
    #[must_use]
    pub const fn exact(name: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            contains_all: &[],
        }
    }

    #[must_use]
    pub const fn with_aliases(name: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            name,
            aliases,
            contains_all: &[],
        }
    }

    #[must_use]
    pub const fn fuzzy(self, contains_all: &'static [&'static str]) -> Self {
        Self {
            contains_all,
            ..self
        }
    }

    fn candidates(&self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }
}

/// Resolves [`FieldSpec`]s against one table's standardized headers.
#[derive(Debug, Clone, Copy)]
pub struct SchemaResolver<'a> {
    table: &'a RawTable,
}

impl<'a> SchemaResolver<'a> {
    #[must_use]
    pub fn new(table: &'a RawTable) -> Self {
        Self { table }
    }

    /// Column index for `spec`: exact aliases first, then the fuzzy fallback.
    #[must_use]
    pub fn resolve(&self, spec: &FieldSpec) -> Option<usize> {
        if let Some(index) = spec
            .candidates()
            .find_map(|name| self.table.column_index(name))
        {
            return Some(index);
        }
        if spec.contains_all.is_empty() {
            return None;
        }
        let index = self
            .table
            .columns()
            .iter()
            .position(|column| spec.contains_all.iter().all(|tok| column.contains(tok)))?;
        tracing::debug!(
            field = spec.name,
            column = %self.table.columns()[index],
            "resolved column by fuzzy match"
        );
        Some(index)
    }

    /// Like [`Self::resolve`], but a missing column is a fatal error.
    pub fn require(&self, spec: &FieldSpec) -> Result<usize, IngestError> {
        self.resolve(spec).ok_or_else(|| IngestError::MissingColumn {
            field: spec.name.to_owned(),
            tried: spec.candidates().collect::<Vec<_>>().join(", "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str]) -> RawTable {
        RawTable::new(headers, vec![vec!["x".to_owned()]])
    }

    #[test]
    fn test_headers_are_standardized() {
        let table = table(&["Random ID", "ME BS Degree Status"]);
        assert_eq!(table.columns(), &["random_id", "me_bs_degree_status"]);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = RawTable::new(["a", "b"], vec![vec!["1".to_owned()]]);
        assert_eq!(table.cell(0, 0), Some("1"));
        assert_eq!(table.cell(0, 1), None);
    }

    #[test]
    fn test_blank_and_unparsable_cells() {
        let table = RawTable::new(
            ["a", "b", "c"],
            vec![vec!["  ".to_owned(), "abc".to_owned(), " 3.25 ".to_owned()]],
        );
        assert_eq!(table.cell(0, 0), None);
        assert_eq!(table.number(0, 1), None);
        assert_eq!(table.number(0, 2), Some(3.25));
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_missing_sentinels() {
        let sentinels = MissingSentinels::default();
        for text in ["n/a", "NA", "N/A (101)", "n.a.", "Not  Available", "na - 101 only"] {
            assert!(sentinels.is_missing(text), "{text}");
        }
        for text in ["UP", "101", "Nanticoke", "0", ""] {
            assert_eq!(sentinels.present(text), Some(text));
        }
        let custom = MissingSentinels::new("^unknown$").unwrap();
        assert!(custom.is_missing("UNKNOWN"));
        assert!(!custom.is_missing("n/a"));
        assert!(MissingSentinels::new("(").is_err());
    }

    #[test]
    fn test_alias_resolution_prefers_exact_names() {
        let table = table(&["enrolled_terms", "no_enrolled_terms_su_included"]);
        let spec = FieldSpec::with_aliases("no_enrolled_terms", &["no_enrolled_terms_su_included", "enrolled_terms"]);
        assert_eq!(SchemaResolver::new(&table).resolve(&spec), Some(1));
    }

    #[test]
    fn test_fuzzy_fallback() {
        let table = table(&["random_id", "total_warnings_issued"]);
        let spec = FieldSpec::with_aliases("no_of_warnings", &["warnings"]).fuzzy(&["warn"]);
        assert_eq!(SchemaResolver::new(&table).resolve(&spec), Some(1));
    }

    #[test]
    fn test_missing_required_column() {
        let table = table(&["student"]);
        let err = SchemaResolver::new(&table)
            .require(&FieldSpec::exact("random_id"))
            .unwrap_err();
        assert_eq!(
            err,
            IngestError::MissingColumn {
                field: "random_id".to_owned(),
                tried: "random_id".to_owned(),
            }
        );
    }
}
