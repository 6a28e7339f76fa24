//! Feature table assembly
//!
//! [`FeatureAssembler`] is a pure mapping from student records and term-GPA
//! grids to a [`FeatureTable`]. It derives:
//!
//! - **Gaps**: `cgpa_gap` (graduating minus ETM) and `peak_minus_etm`
//! - **Rates** over enrolled terms: `warnings_per_term`,
//!   `low_gpa_term_rate_2_5`, `low_gpa_term_rate_3_0`; undefined when the
//!   term count is missing or not positive
//! - **Flags**: `graduated_me`, `grade_forgiveness_used`, `multi_repeat_flag`
//! - **Missingness indicators** reflecting raw source nullity
//! - **Course mastery** per [`CourseKey`] plus cross-course rollups
//! - **Trajectory features** joined by `random_id`, plus `first_term_label`
//!   (e.g. `Fall 2015`) when the grid carries an entry term code
//!
//! # Column Order
//!
//! `random_id`, baseline categoricals, baseline numerics, engineered
//! features, missingness indicators, course groups in [`CourseKey::ALL`]
//! order, rollups, trajectory features, `first_term_label`.

use std::{collections::BTreeMap, sync::LazyLock};

use rayon::prelude::*;
use regex::Regex;

use crate::{
    course::{CourseKey, CourseMasteryFeature, CourseRollup},
    policy::PolicyEngine,
    record::{CategoricalField, NumericField, StudentRecord},
    resolver::CourseAttemptResolver,
    table::{ColumnSpec, FeatureTable, Value},
    trajectory::{TermCode, TermGpaGrid, TrajectoryFeatures},
    validation::SanityReport,
};

static DEGREE_POSITIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bGRAD|\bDEGREE\b").expect("valid degree regex"));
static DEGREE_NEGATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:NO|NOT|DENIED|PEND|PENDING|SEEK|SEEKING|IN\s*PROGRESS|PLANN|PLAN|INTENT|ADMIT|ENROLL)\b",
    )
    .expect("valid negative degree regex")
});

/// Whether a degree-status text reports an awarded degree.
///
/// ```
/// use etm_features::assembler::degree_awarded;
///
/// assert!(degree_awarded("Graduated"));
/// assert!(degree_awarded("ME BS degree awarded"));
/// assert!(!degree_awarded("Degree in progress"));
/// assert!(!degree_awarded("Not graduated"));
/// assert!(!degree_awarded("Changed major"));
/// ```
#[must_use]
pub fn degree_awarded(status: &str) -> bool {
    let status = status.to_uppercase();
    DEGREE_POSITIVE_RE.is_match(&status) && !DEGREE_NEGATIVE_RE.is_match(&status)
}

/// Features derived from a record's baseline fields alone.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EngineeredFeatures {
    pub cgpa_gap: Option<f64>,
    pub peak_minus_etm: Option<f64>,
    pub graduated_me: Option<bool>,
    pub warnings_per_term: Option<f64>,
    pub low_gpa_term_rate_2_5: Option<f64>,
    pub low_gpa_term_rate_3_0: Option<f64>,
    pub grade_forgiveness_used: Option<bool>,
    pub multi_repeat_flag: Option<bool>,
}

impl EngineeredFeatures {
    pub const NAMES: [&'static str; 8] = [
        "cgpa_gap",
        "peak_minus_etm",
        "graduated_me",
        "warnings_per_term",
        "low_gpa_term_rate_2_5",
        "low_gpa_term_rate_3_0",
        "grade_forgiveness_used",
        "multi_repeat_flag",
    ];

    #[must_use]
    pub fn from_record(record: &StudentRecord) -> Self {
        let num = |field| record.numeric(field);
        let etm = num(NumericField::CgpaAtEtm);
        let minus_etm = |value: Option<f64>| Some(value? - etm?);
        let terms = num(NumericField::EnrolledTerms).filter(|t| *t > 0.0);
        let per_term = |count: Option<f64>| Some(count? / terms?);

        Self {
            cgpa_gap: minus_etm(num(NumericField::GraduatingCgpa)),
            peak_minus_etm: minus_etm(num(NumericField::HighestCgpa)),
            graduated_me: record
                .categorical(CategoricalField::DegreeStatus)
                .map(degree_awarded),
            warnings_per_term: per_term(Some(num(NumericField::Warnings).unwrap_or(0.0))),
            low_gpa_term_rate_2_5: per_term(num(NumericField::TermsBelow2_5)),
            low_gpa_term_rate_3_0: per_term(num(NumericField::TermsBelow3_0)),
            grade_forgiveness_used: num(NumericField::GradeForgivenessCredits).map(|c| c > 0.0),
            multi_repeat_flag: num(NumericField::CoursesTakenThirdTime).map(|c| c > 0.0),
        }
    }

    fn values(&self) -> [Value; 8] {
        [
            Value::Numeric(self.cgpa_gap),
            Value::Numeric(self.peak_minus_etm),
            Value::flag(self.graduated_me),
            Value::Numeric(self.warnings_per_term),
            Value::Numeric(self.low_gpa_term_rate_2_5),
            Value::Numeric(self.low_gpa_term_rate_3_0),
            Value::flag(self.grade_forgiveness_used),
            Value::flag(self.multi_repeat_flag),
        ]
    }
}

/// Baseline fields whose raw nullity is reported as a 0/1 column.
const MISSINGNESS_FIELDS: [NumericField; 3] = [
    NumericField::CgpaAtEtm,
    NumericField::GraduatingCgpa,
    NumericField::EnrolledTerms,
];

const COURSE_COLUMNS: [(&str, bool); 6] = [
    ("attempts_to_abc", true),
    ("pass_by_first_attempt", true),
    ("ever_passed", true),
    ("first_grade_dfw", true),
    ("total_attempts", true),
    ("outcome_label", false),
];

const ROLLUP_COLUMNS: [&str; 4] = [
    "etm_total_attempts_to_abc",
    "etm_first_attempt_pass_count",
    "etm_never_passed_count",
    "etm_first_grade_dfw_count",
];

/// Trajectory columns joined onto each student.
pub const TRAJECTORY_COLUMNS: [&str; 15] = [
    "terms_with_gpa",
    "mean_term_gpa",
    "median_term_gpa",
    "std_term_gpa",
    "min_term_gpa",
    "max_term_gpa",
    "first_term_gpa",
    "last_term_gpa",
    "n_summer_terms",
    "n_regular_terms",
    "low_gpa_terms_2_5",
    "low_gpa_terms_3_0",
    "gpa_trend_slope",
    "first_two_regular_mean_gpa",
    "summer_term_ratio",
];

/// Decoded entry term of the student's grid.
pub const FIRST_TERM_LABEL: &str = "first_term_label";

fn course_values(feature: &CourseMasteryFeature) -> [Value; 6] {
    [
        Value::Numeric(feature.attempts_to_abc.map(f64::from)),
        Value::flag(Some(feature.pass_by_first_attempt)),
        Value::flag(Some(feature.ever_passed)),
        Value::flag(Some(feature.first_grade_dfw)),
        Value::count(feature.total_attempts),
        Value::Categorical(Some(feature.outcome_label().to_string())),
    ]
}

fn trajectory_values(features: Option<&TrajectoryFeatures>) -> [Value; 15] {
    let Some(t) = features else {
        return std::array::from_fn(|_| Value::Numeric(None));
    };
    [
        Value::count(t.terms_with_gpa),
        Value::Numeric(Some(t.mean_term_gpa)),
        Value::Numeric(Some(t.median_term_gpa)),
        Value::Numeric(t.std_term_gpa),
        Value::Numeric(Some(t.min_term_gpa)),
        Value::Numeric(Some(t.max_term_gpa)),
        Value::Numeric(Some(t.first_term_gpa)),
        Value::Numeric(Some(t.last_term_gpa)),
        Value::count(t.n_summer_terms),
        Value::count(t.n_regular_terms),
        Value::count(t.low_gpa_terms_2_5),
        Value::count(t.low_gpa_terms_3_0),
        Value::Numeric(t.gpa_trend_slope),
        Value::Numeric(t.first_two_regular_mean_gpa),
        Value::Numeric(t.summer_term_ratio),
    ]
}

/// Builds the feature table under one classification policy.
#[derive(Debug, Clone, Copy)]
pub struct FeatureAssembler<'a> {
    resolver: CourseAttemptResolver<'a>,
}

impl<'a> FeatureAssembler<'a> {
    #[must_use]
    pub fn new(policy: &'a PolicyEngine) -> Self {
        Self {
            resolver: CourseAttemptResolver::new(policy),
        }
    }

    /// Column layout of every assembled table.
    #[must_use]
    pub fn schema() -> Vec<ColumnSpec> {
        let mut schema = Vec::new();
        schema.extend(
            CategoricalField::ALL
                .iter()
                .map(|f| ColumnSpec::categorical(f.name())),
        );
        schema.extend(NumericField::ALL.iter().map(|f| ColumnSpec::numeric(f.name())));
        schema.extend(EngineeredFeatures::NAMES.map(ColumnSpec::numeric));
        schema.extend(
            MISSINGNESS_FIELDS
                .iter()
                .map(|f| ColumnSpec::numeric(format!("{}_is_missing", f.name()))),
        );
        for course in CourseKey::ALL {
            for (suffix, numeric) in COURSE_COLUMNS {
                let name = format!("{}_{suffix}", course.prefix());
                schema.push(if numeric {
                    ColumnSpec::numeric(name)
                } else {
                    ColumnSpec::categorical(name)
                });
            }
        }
        schema.extend(ROLLUP_COLUMNS.map(ColumnSpec::numeric));
        schema.extend(TRAJECTORY_COLUMNS.map(ColumnSpec::numeric));
        schema.push(ColumnSpec::categorical(FIRST_TERM_LABEL));
        schema
    }

    /// Resolves every course of one record, in [`CourseKey::ALL`] order.
    #[must_use]
    pub fn course_features(&self, record: &StudentRecord) -> [CourseMasteryFeature; 5] {
        CourseKey::ALL.map(|course| self.resolver.resolve(&record.course(course)))
    }

    /// One row of values matching [`Self::schema`].
    #[must_use]
    pub fn assemble_row(
        &self,
        record: &StudentRecord,
        trajectory: Option<&TrajectoryFeatures>,
        first_term: Option<TermCode>,
    ) -> Vec<Value> {
        let mut row = Vec::new();
        row.extend(CategoricalField::ALL.iter().map(|f| {
            Value::Categorical(record.categorical(*f).map(str::to_owned))
        }));
        row.extend(NumericField::ALL.iter().map(|f| Value::Numeric(record.numeric(*f))));
        row.extend(EngineeredFeatures::from_record(record).values());
        row.extend(
            MISSINGNESS_FIELDS
                .iter()
                .map(|f| Value::flag(Some(record.numeric(*f).is_none()))),
        );

        let courses = self.course_features(record);
        for feature in &courses {
            row.extend(course_values(feature));
        }
        let rollup = CourseRollup::from_features(&courses);
        row.extend([
            Value::count(rollup.total_attempts_to_abc),
            Value::count(rollup.first_attempt_pass_count),
            Value::count(rollup.never_passed_count),
            Value::count(rollup.first_grade_dfw_count),
        ]);
        row.extend(trajectory_values(trajectory));
        row.push(Value::Categorical(first_term.map(|code| code.to_string())));
        row
    }

    /// Assembles the full table. Students without a term grid get undefined
    /// trajectory features; grids without a student are ignored. The first
    /// grid seen for an id wins.
    #[must_use]
    pub fn assemble(&self, records: &[StudentRecord], grids: &[TermGpaGrid]) -> FeatureTable {
        let trajectories = grids
            .par_iter()
            .filter_map(|grid| {
                TrajectoryFeatures::from_grid(grid).map(|t| (grid.random_id.as_str(), t))
            })
            .collect::<Vec<_>>();
        let mut by_id = BTreeMap::new();
        for (id, features) in trajectories {
            by_id.entry(id).or_insert(features);
        }
        let mut first_terms = BTreeMap::new();
        for grid in grids {
            first_terms.entry(grid.random_id.as_str()).or_insert(grid.first_term);
        }

        let rows = records
            .par_iter()
            .map(|record| {
                let id = record.random_id.as_str();
                let trajectory = by_id.get(id);
                let first_term = first_terms.get(id).copied().flatten();
                (record.random_id.clone(), self.assemble_row(record, trajectory, first_term))
            })
            .collect::<Vec<_>>();

        let sanity = SanityReport::from_records(records);
        sanity.log_summary();

        let table = FeatureTable::from_rows(&Self::schema(), rows);
        tracing::info!(
            students = table.len(),
            columns = table.columns().len(),
            with_trajectory = by_id.len(),
            "assembled feature table"
        );
        table
    }
}
