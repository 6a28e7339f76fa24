//! Per-student baseline records
//!
//! A [`StudentRecord`] holds the baseline fields of one row of the student
//! information export plus the raw outcome snapshots for every ETM course.
//! Records are built once by [`StudentRecord::from_table`] and never mutated.

use std::collections::BTreeMap;

use crate::{
    course::{CourseKey, CourseOutcomeSnapshot, SnapshotField},
    schema::{FieldSpec, IngestError, RawTable, SchemaResolver},
};

pub const RANDOM_ID: FieldSpec = FieldSpec::exact("random_id");

/// Baseline text fields, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoricalField {
    CreditWindow,
    AcademicSuspension,
    DegreeStatus,
    SatVerbGrouping,
    AleksMathScoreGrouping,
    WithMathAp,
    FirstMathCourse,
    FirstMathCourseCampus,
}

impl CategoricalField {
    pub const ALL: [Self; 8] = [
        Self::CreditWindow,
        Self::AcademicSuspension,
        Self::DegreeStatus,
        Self::SatVerbGrouping,
        Self::AleksMathScoreGrouping,
        Self::WithMathAp,
        Self::FirstMathCourse,
        Self::FirstMathCourseCampus,
    ];

    #[must_use]
    pub const fn spec(self) -> FieldSpec {
        match self {
            Self::CreditWindow => FieldSpec::exact("credit_window"),
            Self::AcademicSuspension => FieldSpec::with_aliases(
                "academic_suspension",
                &["academic_suspenion_itwo", "academic_suspension_itwo"],
            ),
            Self::DegreeStatus => FieldSpec::with_aliases(
                "me_bs_degree_status",
                &["me_degree_status", "degree_status"],
            ),
            Self::SatVerbGrouping => FieldSpec::exact("sat_verb_grouping"),
            Self::AleksMathScoreGrouping => FieldSpec::with_aliases(
                "first_aleks_math_score_grouping",
                &["1st_aleks_math_score_grouping"],
            ),
            Self::WithMathAp => FieldSpec::exact("with_math_ap"),
            Self::FirstMathCourse => {
                FieldSpec::with_aliases("first_math_course", &["1st_math_course"])
            }
            Self::FirstMathCourseCampus => FieldSpec::with_aliases(
                "first_math_course_campus",
                &["1st_math_course_campus"],
            ),
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        self.spec().name
    }
}

/// Baseline numeric fields, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NumericField {
    CgpaAtEtm,
    HighestCgpa,
    GraduatingCgpa,
    TermGpaRange,
    GradeForgivenessCredits,
    EnrolledTerms,
    Warnings,
    TermsBelow2_5,
    TermsBelow3_0,
    CoursesTakenThirdTime,
}

impl NumericField {
    pub const ALL: [Self; 10] = [
        Self::CgpaAtEtm,
        Self::HighestCgpa,
        Self::GraduatingCgpa,
        Self::TermGpaRange,
        Self::GradeForgivenessCredits,
        Self::EnrolledTerms,
        Self::Warnings,
        Self::TermsBelow2_5,
        Self::TermsBelow3_0,
        Self::CoursesTakenThirdTime,
    ];

    #[must_use]
    pub const fn spec(self) -> FieldSpec {
        match self {
            Self::CgpaAtEtm => FieldSpec::exact("cgpa_at_etm_to_any_campus"),
            Self::HighestCgpa => FieldSpec::exact("highest_cgpa_during_credit_window"),
            Self::GraduatingCgpa => FieldSpec::exact("graduating_cgpa"),
            Self::TermGpaRange => FieldSpec::exact("dif_btw_max_and_min_term_gpa"),
            Self::GradeForgivenessCredits => FieldSpec::exact(
                "total_grade_forgiveness_credits_approved_before_etm_to_any_campus",
            ),
            Self::EnrolledTerms => FieldSpec::with_aliases(
                "no_enrolled_terms",
                &[
                    "no_enrolled_terms_su_included",
                    "enrolled_terms_su_included",
                    "enrolled_terms",
                ],
            )
            .fuzzy(&["enroll", "term"]),
            Self::Warnings => FieldSpec::with_aliases(
                "no_of_warnings",
                &["no_of_warning", "warnings", "warning", "num_warnings", "n_warnings"],
            )
            .fuzzy(&["warn"]),
            Self::TermsBelow2_5 => {
                FieldSpec::with_aliases("no_term_gpa_2_5", &["term_gpa25", "no_term_gpa_2_50"])
                    .fuzzy(&["gpa", "2", "5"])
            }
            Self::TermsBelow3_0 => {
                FieldSpec::with_aliases("no_term_gpa_3", &["term_gpa3", "no_term_gpa_3_0"])
                    .fuzzy(&["gpa", "3"])
            }
            Self::CoursesTakenThirdTime => FieldSpec::with_aliases(
                "no_of_courses_taken_ge3rd_time",
                &["courses_taken_ge3rd_time", "courses_taken_3rd_time"],
            )
            .fuzzy(&["3rd", "time"]),
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        self.spec().name
    }
}

/// One student's baseline fields and course snapshots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StudentRecord {
    pub random_id: String,
    categorical: BTreeMap<CategoricalField, String>,
    numeric: BTreeMap<NumericField, f64>,
    courses: BTreeMap<CourseKey, CourseOutcomeSnapshot>,
}

impl StudentRecord {
    #[must_use]
    pub fn new(random_id: impl Into<String>) -> Self {
        Self {
            random_id: random_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_categorical(mut self, field: CategoricalField, value: impl Into<String>) -> Self {
        self.categorical.insert(field, value.into());
        self
    }

    #[must_use]
    pub fn with_numeric(mut self, field: NumericField, value: f64) -> Self {
        self.numeric.insert(field, value);
        self
    }

    #[must_use]
    pub fn with_course(mut self, course: CourseKey, snapshot: CourseOutcomeSnapshot) -> Self {
        self.courses.insert(course, snapshot);
        self
    }

    #[must_use]
    pub fn categorical(&self, field: CategoricalField) -> Option<&str> {
        self.categorical.get(&field).map(String::as_str)
    }

    #[must_use]
    pub fn numeric(&self, field: NumericField) -> Option<f64> {
        self.numeric.get(&field).copied()
    }

    /// Snapshot for `course`; all fields null when the course was absent.
    #[must_use]
    pub fn course(&self, course: CourseKey) -> CourseOutcomeSnapshot {
        self.courses.get(&course).cloned().unwrap_or_default()
    }

    /// Reads every student row of a standardized information table.
    ///
    /// `random_id` is required; all other fields are optional and read as
    /// missing when their column is absent. Rows with a blank `random_id` are
    /// skipped.
    pub fn from_table(table: &RawTable) -> Result<Vec<Self>, IngestError> {
        if table.is_empty() {
            return Err(IngestError::EmptyInput {
                table: "student".to_owned(),
            });
        }
        let resolver = SchemaResolver::new(table);
        let id_col = resolver.require(&RANDOM_ID)?;
        let categorical_cols = CategoricalField::ALL
            .iter()
            .filter_map(|f| Some((*f, resolver.resolve(&f.spec())?)))
            .collect::<Vec<_>>();
        let numeric_cols = NumericField::ALL
            .iter()
            .filter_map(|f| Some((*f, resolver.resolve(&f.spec())?)))
            .collect::<Vec<_>>();
        let course_cols = CourseKey::ALL
            .iter()
            .map(|course| {
                let cols = SnapshotField::ALL
                    .iter()
                    .filter_map(|field| {
                        let index = table.column_index(&course.snapshot_column(*field))?;
                        Some((*field, index))
                    })
                    .collect::<Vec<_>>();
                if cols.is_empty() {
                    tracing::warn!(%course, "no snapshot columns for course");
                }
                (*course, cols)
            })
            .collect::<Vec<_>>();

        let mut records = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            let Some(random_id) = table.cell(row, id_col) else {
                tracing::warn!(row = row + 1, "skipping student row without random_id");
                continue;
            };
            let mut record = Self::new(random_id);
            for (field, col) in &categorical_cols {
                if let Some(value) = table.cell(row, *col) {
                    record.categorical.insert(*field, value.to_owned());
                }
            }
            for (field, col) in &numeric_cols {
                if let Some(value) = table.number(row, *col) {
                    record.numeric.insert(*field, value);
                }
            }
            for (course, cols) in &course_cols {
                let mut snapshot = CourseOutcomeSnapshot::default();
                for (field, col) in cols {
                    snapshot.set(*field, table.cell(row, *col).map(str::to_owned));
                }
                record.courses.insert(*course, snapshot);
            }
            records.push(record);
        }
        tracing::info!(students = records.len(), "loaded student records");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| (*c).to_owned()).collect()
    }

    #[test]
    fn test_from_table_reads_aliases_and_snapshots() {
        let table = RawTable::new(
            [
                "Random ID",
                "CGPA at ETM (to any campus)",
                "1st Math Course Campus",
                "No. Enrolled Terms (SU included)",
                "MATH 140 Grade Code 1st FA or SP",
                "MATH 140 Outcome after 1st AY",
            ],
            vec![
                row(&["s1", "3.1", "UP", "8", "F", "2nd Attempt=ABC"]),
                row(&["s2", "", "", "n/a", "", ""]),
            ],
        );
        let records = StudentRecord::from_table(&table).unwrap();
        assert_eq!(records.len(), 2);

        let s1 = &records[0];
        assert_eq!(s1.random_id, "s1");
        assert_eq!(s1.numeric(NumericField::CgpaAtEtm), Some(3.1));
        assert_eq!(s1.numeric(NumericField::EnrolledTerms), Some(8.0));
        assert_eq!(s1.categorical(CategoricalField::FirstMathCourseCampus), Some("UP"));
        let math = s1.course(CourseKey::Math140);
        assert_eq!(math.first_grade.as_deref(), Some("F"));
        assert_eq!(math.first_year.as_deref(), Some("2nd Attempt=ABC"));
        assert_eq!(s1.course(CourseKey::Chem110), CourseOutcomeSnapshot::default());

        let s2 = &records[1];
        assert_eq!(s2.numeric(NumericField::CgpaAtEtm), None);
        assert_eq!(s2.numeric(NumericField::EnrolledTerms), None);
        assert_eq!(s2.categorical(CategoricalField::FirstMathCourseCampus), None);
    }

    #[test]
    fn test_missing_random_id_is_fatal() {
        let table = RawTable::new(["student"], vec![row(&["s1"])]);
        assert!(matches!(
            StudentRecord::from_table(&table),
            Err(IngestError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_empty_table_is_fatal() {
        let table = RawTable::new(["random_id"], vec![]);
        assert!(matches!(
            StudentRecord::from_table(&table),
            Err(IngestError::EmptyInput { .. })
        ));
    }

    #[test]
    fn test_blank_ids_are_skipped() {
        let table = RawTable::new(["random_id"], vec![row(&[" "]), row(&["s2"])]);
        let records = StudentRecord::from_table(&table).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].random_id, "s2");
    }
}
