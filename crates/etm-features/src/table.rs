//! Typed, column-oriented feature table
//!
//! [`FeatureTable`] is the single input of every statistical engine: one row
//! per student keyed by `random_id`, each column either numeric or
//! categorical, each cell independently nullable. Column order is part of the
//! table's identity, so two tables built from the same input serialize
//! identically.

use std::collections::BTreeSet;

use crate::{
    record::RANDOM_ID,
    schema::{IngestError, MissingSentinels, RawTable, SchemaResolver, parse_number},
};

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// One cell of a row under construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Numeric(Option<f64>),
    Categorical(Option<String>),
}

impl Value {
    #[must_use]
    pub fn flag(value: Option<bool>) -> Self {
        Self::Numeric(value.map(|b| if b { 1.0 } else { 0.0 }))
    }

    #[must_use]
    pub fn count(value: u32) -> Self {
        Self::Numeric(Some(f64::from(value)))
    }

    #[must_use]
    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Numeric(_) => ColumnKind::Numeric,
            Self::Categorical(_) => ColumnKind::Categorical,
        }
    }
}

/// Cells of one column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    #[must_use]
    pub fn kind(&self) -> ColumnKind {
        match self.data {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Categorical(_) => ColumnKind::Categorical,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_missing(&self, row: usize) -> bool {
        match &self.data {
            ColumnData::Numeric(v) => v[row].is_none(),
            ColumnData::Categorical(v) => v[row].is_none(),
        }
    }

    #[must_use]
    pub fn missing_count(&self) -> usize {
        (0..self.len()).filter(|&row| self.is_missing(row)).count()
    }

    #[must_use]
    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match &self.data {
            ColumnData::Numeric(v) => Some(v),
            ColumnData::Categorical(_) => None,
        }
    }

    #[must_use]
    pub fn as_categorical(&self) -> Option<&[Option<String>]> {
        match &self.data {
            ColumnData::Categorical(v) => Some(v),
            ColumnData::Numeric(_) => None,
        }
    }

    /// Cell rendered for CSV output; missing cells are empty.
    #[must_use]
    pub fn render(&self, row: usize) -> String {
        match &self.data {
            ColumnData::Numeric(v) => v[row].map(|x| x.to_string()).unwrap_or_default(),
            ColumnData::Categorical(v) => v[row].clone().unwrap_or_default(),
        }
    }
}

/// Name and kind of a column, used to build a table row by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    #[must_use]
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Numeric,
        }
    }

    #[must_use]
    pub fn categorical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Categorical,
        }
    }
}

/// Outcome of [`FeatureTable::blank_sentinels`].
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SentinelSummary {
    /// Cells turned into missing values.
    pub cells: usize,
    /// Columns that became numeric once their sentinels were blanked.
    pub retyped: Vec<String>,
}

fn infer_column(cells: &[Option<&str>]) -> ColumnData {
    let is_numeric = cells
        .iter()
        .flatten()
        .all(|text| text.parse::<f64>().is_ok());
    if is_numeric {
        ColumnData::Numeric(cells.iter().map(|cell| cell.and_then(parse_number)).collect())
    } else {
        ColumnData::Categorical(cells.iter().map(|cell| cell.map(str::to_owned)).collect())
    }
}

/// One row per student, typed columns in a fixed order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureTable {
    ids: Vec<String>,
    columns: Vec<Column>,
}

impl FeatureTable {
    /// Builds a table from row-major values.
    ///
    /// # Panics
    ///
    /// Panics if a row's length or a cell's kind disagrees with `schema`.
    #[must_use]
    pub fn from_rows(schema: &[ColumnSpec], rows: Vec<(String, Vec<Value>)>) -> Self {
        let mut columns = schema
            .iter()
            .map(|spec| Column {
                name: spec.name.clone(),
                data: match spec.kind {
                    ColumnKind::Numeric => ColumnData::Numeric(Vec::with_capacity(rows.len())),
                    ColumnKind::Categorical => {
                        ColumnData::Categorical(Vec::with_capacity(rows.len()))
                    }
                },
            })
            .collect::<Vec<_>>();
        let mut ids = Vec::with_capacity(rows.len());
        for (id, values) in rows {
            assert_eq!(values.len(), schema.len(), "row {id} has wrong width");
            for (column, value) in columns.iter_mut().zip(values) {
                let expected = column.kind();
                match (&mut column.data, value) {
                    (ColumnData::Numeric(v), Value::Numeric(x)) => v.push(x),
                    (ColumnData::Categorical(v), Value::Categorical(x)) => v.push(x),
                    (_, value) => panic!(
                        "column {} expects {expected:?}, got {:?}",
                        column.name,
                        value.kind()
                    ),
                }
            }
            ids.push(id);
        }
        Self { ids, columns }
    }

    /// Builds a table from a standardized CSV export, reading the default
    /// [`MissingSentinels`] as blanks.
    pub fn from_raw(table: &RawTable) -> Result<Self, IngestError> {
        Self::from_raw_with(table, &MissingSentinels::default())
    }

    /// Builds a table from a standardized CSV export.
    ///
    /// Sentinel cells are missing. A column is numeric when every remaining
    /// non-blank cell parses as a number; non-finite numbers read as missing.
    pub fn from_raw_with(
        table: &RawTable,
        sentinels: &MissingSentinels,
    ) -> Result<Self, IngestError> {
        if table.is_empty() {
            return Err(IngestError::EmptyInput {
                table: "feature".to_owned(),
            });
        }
        let id_col = SchemaResolver::new(table).require(&RANDOM_ID)?;
        let ids = (0..table.len())
            .map(|row| table.cell(row, id_col).unwrap_or_default().to_owned())
            .collect();
        let columns = table
            .columns()
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != id_col)
            .map(|(index, name)| {
                let cells = (0..table.len())
                    .map(|row| table.cell(row, index).and_then(|text| sentinels.present(text)))
                    .collect::<Vec<_>>();
                Column {
                    name: name.clone(),
                    data: infer_column(&cells),
                }
            })
            .collect();
        Ok(Self { ids, columns })
    }

    /// Blanks sentinel cells of categorical columns in place.
    ///
    /// A column that had sentinels and whose remaining cells all parse as
    /// numbers becomes numeric.
    pub fn blank_sentinels(&mut self, sentinels: &MissingSentinels) -> SentinelSummary {
        let mut summary = SentinelSummary::default();
        for column in &mut self.columns {
            let ColumnData::Categorical(values) = &mut column.data else {
                continue;
            };
            let mut blanked = 0;
            for value in values.iter_mut() {
                if value.as_deref().is_some_and(|text| sentinels.is_missing(text)) {
                    *value = None;
                    blanked += 1;
                }
            }
            if blanked == 0 {
                continue;
            }
            summary.cells += blanked;
            let data = infer_column(&values.iter().map(Option::as_deref).collect::<Vec<_>>());
            if matches!(data, ColumnData::Numeric(_)) {
                summary.retyped.push(column.name.clone());
                column.data = data;
            }
        }
        if summary.cells > 0 {
            tracing::debug!(
                cells = summary.cells,
                retyped = ?summary.retyped,
                "blanked missing sentinels"
            );
        }
        summary
    }

    /// Appends a column.
    ///
    /// # Panics
    ///
    /// Panics if the column length differs from the table's row count or the
    /// name is already taken.
    pub fn push_column(&mut self, column: Column) {
        assert_eq!(column.len(), self.len(), "column {} has wrong length", column.name);
        assert!(
            self.column(&column.name).is_none(),
            "duplicate column {}",
            column.name
        );
        self.columns.push(column);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Copy of the table without the named columns.
    #[must_use]
    pub fn without_columns(&self, dropped: &BTreeSet<String>) -> Self {
        Self {
            ids: self.ids.clone(),
            columns: self
                .columns
                .iter()
                .filter(|c| !dropped.contains(&c.name))
                .cloned()
                .collect(),
        }
    }

    /// CSV header: `random_id` then every column name.
    #[must_use]
    pub fn header(&self) -> Vec<String> {
        std::iter::once(RANDOM_ID.name.to_owned())
            .chain(self.columns.iter().map(|c| c.name.clone()))
            .collect()
    }

    /// Rendered CSV record for `row`.
    #[must_use]
    pub fn record(&self, row: usize) -> Vec<String> {
        std::iter::once(self.ids[row].clone())
            .chain(self.columns.iter().map(|c| c.render(row)))
            .collect()
    }
}
