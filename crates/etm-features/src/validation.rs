//! Row-level data-quality flags
//!
//! These checks never alter the feature table; they only count and log
//! suspicious rows so a bad export is noticed before analysis.

use crate::record::{NumericField, StudentRecord};

/// Flags for one student. `None` means the check could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SanityFlags {
    pub random_id: String,
    /// Graduating CGPA below CGPA at ETM.
    pub cgpa_negative_gap: Option<bool>,
    /// Enrolled-term count of zero or less.
    pub enrolled_terms_zero_or_neg: Option<bool>,
}

impl SanityFlags {
    #[must_use]
    pub fn check(record: &StudentRecord) -> Self {
        let graduating = record.numeric(NumericField::GraduatingCgpa);
        let etm = record.numeric(NumericField::CgpaAtEtm);
        Self {
            random_id: record.random_id.clone(),
            cgpa_negative_gap: graduating.zip(etm).map(|(g, e)| g < e),
            enrolled_terms_zero_or_neg: record.numeric(NumericField::EnrolledTerms).map(|t| t <= 0.0),
        }
    }

    #[must_use]
    pub fn any(&self) -> bool {
        self.cgpa_negative_gap == Some(true) || self.enrolled_terms_zero_or_neg == Some(true)
    }
}

/// Flags for every student plus per-check totals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SanityReport {
    pub rows: Vec<SanityFlags>,
    pub cgpa_negative_gap: usize,
    pub enrolled_terms_zero_or_neg: usize,
}

impl SanityReport {
    #[must_use]
    pub fn from_records(records: &[StudentRecord]) -> Self {
        let rows = records.iter().map(SanityFlags::check).collect::<Vec<_>>();
        let count = |pick: fn(&SanityFlags) -> Option<bool>| {
            rows.iter().filter(|r| pick(r) == Some(true)).count()
        };
        Self {
            cgpa_negative_gap: count(|r| r.cgpa_negative_gap),
            enrolled_terms_zero_or_neg: count(|r| r.enrolled_terms_zero_or_neg),
            rows,
        }
    }

    /// Rows with at least one raised flag.
    pub fn flagged(&self) -> impl Iterator<Item = &SanityFlags> {
        self.rows.iter().filter(|r| r.any())
    }

    pub fn log_summary(&self) {
        if self.cgpa_negative_gap > 0 || self.enrolled_terms_zero_or_neg > 0 {
            tracing::warn!(
                cgpa_negative_gap = self.cgpa_negative_gap,
                enrolled_terms_zero_or_neg = self.enrolled_terms_zero_or_neg,
                "sanity checks flagged rows"
            );
        } else {
            tracing::debug!(rows = self.rows.len(), "sanity checks passed");
        }
    }
}
