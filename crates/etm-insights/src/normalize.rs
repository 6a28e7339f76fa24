//! Cleanup applied to a feature table before the outcome is resolved
//!
//! Exports spell missing values as `n/a`, `NA` or `N/A (101)`, and a single
//! such cell turns a numeric column into text. [`TableNormalizer`] blanks
//! those cells, restores numeric columns, and derives the canonical
//! `credit_window_canon` band column.

use etm_features::{
    credit::CreditWindow,
    schema::MissingSentinels,
    table::{FeatureTable, SentinelSummary},
};

use crate::{config::SanitizerConfig, sanitizer::PatternError};

/// What normalization changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct NormalizationReport {
    pub sentinel_cells: usize,
    /// Text columns that became numeric once their sentinels were blanked.
    pub retyped_numeric: Vec<String>,
    /// Column `credit_window_canon` was derived from.
    pub credit_window_source: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TableNormalizer {
    sentinels: MissingSentinels,
    credit_window: bool,
}

impl TableNormalizer {
    pub fn new(config: &SanitizerConfig) -> Result<Self, PatternError> {
        let sentinels =
            MissingSentinels::new(&config.missing_pattern).map_err(|e| PatternError {
                pattern: config.missing_pattern.clone(),
                message: e.to_string(),
            })?;
        Ok(Self {
            sentinels,
            credit_window: config.canonical_credit_window,
        })
    }

    #[must_use]
    pub fn sentinels(&self) -> &MissingSentinels {
        &self.sentinels
    }

    #[must_use]
    pub fn normalize(&self, table: &FeatureTable) -> (FeatureTable, NormalizationReport) {
        let mut table = table.clone();
        let SentinelSummary { cells, retyped } = table.blank_sentinels(&self.sentinels);
        let mut report = NormalizationReport {
            sentinel_cells: cells,
            retyped_numeric: retyped,
            credit_window_source: None,
        };

        let window = self
            .credit_window
            .then(|| CreditWindow::derive(&table))
            .flatten();
        if let Some(window) = window {
            report.credit_window_source = Some(window.source);
            table.push_column(window.column);
        }

        tracing::info!(
            sentinel_cells = report.sentinel_cells,
            retyped = report.retyped_numeric.len(),
            credit_window_source = ?report.credit_window_source,
            "normalized feature table"
        );
        (table, report)
    }
}
