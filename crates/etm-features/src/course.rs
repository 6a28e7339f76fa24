//! Course keys, outcome snapshots, and derived mastery features

use std::fmt;

/// One of the fixed ETM gateway courses.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    derive_more::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CourseKey {
    #[display("CHEM 110")]
    Chem110,
    #[display("EDSGN 100")]
    Edsgn100,
    #[display("MATH 140")]
    Math140,
    #[display("MATH 141")]
    Math141,
    #[display("PHYS 211")]
    Phys211,
}

impl CourseKey {
    pub const ALL: [Self; 5] = [
        Self::Chem110,
        Self::Edsgn100,
        Self::Math140,
        Self::Math141,
        Self::Phys211,
    ];

    /// Column prefix shared by every input and output column of this course.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Chem110 => "chem_110",
            Self::Edsgn100 => "edsgn_100",
            Self::Math140 => "math_140",
            Self::Math141 => "math_141",
            Self::Phys211 => "phys_211",
        }
    }

    /// Input column name holding `field` for this course.
    #[must_use]
    pub fn snapshot_column(self, field: SnapshotField) -> String {
        format!("{}_{}", self.prefix(), field.suffix())
    }
}

/// Raw per-course input fields, in coverage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotField {
    FirstGrade,
    AfterFirstFall,
    FirstYear,
    SecondYear,
    Final,
}

impl SnapshotField {
    pub const ALL: [Self; 5] = [
        Self::FirstGrade,
        Self::AfterFirstFall,
        Self::FirstYear,
        Self::SecondYear,
        Self::Final,
    ];

    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::FirstGrade => "grade_code_1st_fa_or_sp",
            Self::AfterFirstFall => "outcome_after_1st_fa",
            Self::FirstYear => "outcome_after_1st_ay",
            Self::SecondYear => "outcome_after_2nd_ay",
            Self::Final => "outcome",
        }
    }
}

/// The four cumulative coverage windows the resolver walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, derive_more::Display)]
pub enum SnapshotWindow {
    #[display("first term")]
    FirstTerm,
    #[display("first year")]
    FirstYear,
    #[display("second year")]
    SecondYear,
    #[display("final")]
    Final,
}

/// Raw outcome text for one (student, course) pair.
///
/// Each field is independently nullable and covers a window at least as wide
/// as the one before it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseOutcomeSnapshot {
    pub first_grade: Option<String>,
    pub after_first_fall: Option<String>,
    pub first_year: Option<String>,
    pub second_year: Option<String>,
    pub final_outcome: Option<String>,
}

impl CourseOutcomeSnapshot {
    /// Sets the field named by `field`.
    pub fn set(&mut self, field: SnapshotField, value: Option<String>) {
        let slot = match field {
            SnapshotField::FirstGrade => &mut self.first_grade,
            SnapshotField::AfterFirstFall => &mut self.after_first_fall,
            SnapshotField::FirstYear => &mut self.first_year,
            SnapshotField::SecondYear => &mut self.second_year,
            SnapshotField::Final => &mut self.final_outcome,
        };
        *slot = value;
    }

    /// The four ordered windows.
    ///
    /// The first-year window already covers the first fall, so the
    /// after-first-fall field only stands in when the first-year field is
    /// absent.
    #[must_use]
    pub fn windows(&self) -> [(SnapshotWindow, Option<&str>); 4] {
        let first_year = self
            .first_year
            .as_deref()
            .or(self.after_first_fall.as_deref());
        [
            (SnapshotWindow::FirstTerm, self.first_grade.as_deref()),
            (SnapshotWindow::FirstYear, first_year),
            (SnapshotWindow::SecondYear, self.second_year.as_deref()),
            (SnapshotWindow::Final, self.final_outcome.as_deref()),
        ]
    }
}

/// Highest attempt ordinal reported by `attempts_to_abc`.
pub const MAX_REPORTED_ATTEMPT: u32 = 4;

/// Attempt-level mastery of one course by one student.
///
/// Built through [`CourseMasteryFeature::new`], which keeps the derived flags
/// consistent: `ever_passed` holds exactly when `attempts_to_abc` is defined,
/// and `pass_by_first_attempt` exactly when it is 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CourseMasteryFeature {
    /// Attempt on which the course was first passed, capped at 4.
    pub attempts_to_abc: Option<u32>,
    pub pass_by_first_attempt: bool,
    pub ever_passed: bool,
    pub first_grade_dfw: bool,
    /// Highest attempt number evidenced by any window; 0 means never enrolled.
    pub total_attempts: u32,
}

impl CourseMasteryFeature {
    #[must_use]
    pub fn new(pass_ordinal: Option<u32>, total_attempts: u32, first_grade_dfw: bool) -> Self {
        let attempts_to_abc = pass_ordinal.map(|n| n.clamp(1, MAX_REPORTED_ATTEMPT));
        Self {
            attempts_to_abc,
            pass_by_first_attempt: attempts_to_abc == Some(1),
            ever_passed: attempts_to_abc.is_some(),
            first_grade_dfw,
            total_attempts,
        }
    }

    #[must_use]
    pub fn outcome_label(&self) -> OutcomeLabel {
        match self.attempts_to_abc {
            Some(n) => OutcomeLabel::PassOn(n),
            None if self.total_attempts > 0 => OutcomeLabel::NoPassAfter(self.total_attempts),
            None => OutcomeLabel::NeverEnrolled,
        }
    }
}

/// Human-readable summary of a [`CourseMasteryFeature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeLabel {
    PassOn(u32),
    NoPassAfter(u32),
    NeverEnrolled,
}

impl fmt::Display for OutcomeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::PassOn(1) => f.write_str("Pass on 1st attempt"),
            Self::PassOn(2) => f.write_str("Pass on 2nd attempt"),
            Self::PassOn(3) => f.write_str("Pass on 3rd attempt"),
            Self::PassOn(_) => f.write_str("Requires more than three attempts"),
            Self::NoPassAfter(1) => f.write_str("No pass after 1 attempt"),
            Self::NoPassAfter(n) => write!(f, "No pass after {n} attempts"),
            Self::NeverEnrolled => f.write_str("Never enrolled"),
        }
    }
}

/// Cross-course aggregates over the fixed course set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CourseRollup {
    /// Sum of defined `attempts_to_abc` values.
    pub total_attempts_to_abc: u32,
    pub first_attempt_pass_count: u32,
    /// Courses never passed, including courses never taken.
    pub never_passed_count: u32,
    pub first_grade_dfw_count: u32,
}

impl CourseRollup {
    pub fn from_features<'a, I>(features: I) -> Self
    where
        I: IntoIterator<Item = &'a CourseMasteryFeature>,
    {
        features
            .into_iter()
            .fold(Self::default(), |mut rollup, feature| {
                rollup.total_attempts_to_abc += feature.attempts_to_abc.unwrap_or(0);
                rollup.first_attempt_pass_count += u32::from(feature.pass_by_first_attempt);
                rollup.never_passed_count += u32::from(!feature.ever_passed);
                rollup.first_grade_dfw_count += u32::from(feature.first_grade_dfw);
                rollup
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_column_names() {
        assert_eq!(
            CourseKey::Math140.snapshot_column(SnapshotField::FirstGrade),
            "math_140_grade_code_1st_fa_or_sp"
        );
        assert_eq!(
            CourseKey::Phys211.snapshot_column(SnapshotField::Final),
            "phys_211_outcome"
        );
    }

    #[test]
    fn test_after_first_fall_only_fills_missing_first_year() {
        let mut snapshot = CourseOutcomeSnapshot {
            after_first_fall: Some("DFW".to_owned()),
            ..Default::default()
        };
        assert_eq!(snapshot.windows()[1].1, Some("DFW"));

        snapshot.set(SnapshotField::FirstYear, Some("ABC".to_owned()));
        assert_eq!(snapshot.windows()[1].1, Some("ABC"));
    }

    #[test]
    fn test_mastery_flags_follow_pass_ordinal() {
        let first = CourseMasteryFeature::new(Some(1), 1, false);
        assert!(first.ever_passed && first.pass_by_first_attempt);

        let capped = CourseMasteryFeature::new(Some(6), 6, true);
        assert_eq!(capped.attempts_to_abc, Some(4));
        assert_eq!(capped.total_attempts, 6);
        assert!(!capped.pass_by_first_attempt);

        let never = CourseMasteryFeature::new(None, 0, false);
        assert!(!never.ever_passed);
    }

    #[test]
    fn test_outcome_labels() {
        let label = |ordinal, total| CourseMasteryFeature::new(ordinal, total, false)
            .outcome_label()
            .to_string();
        assert_eq!(label(Some(1), 1), "Pass on 1st attempt");
        assert_eq!(label(Some(2), 2), "Pass on 2nd attempt");
        assert_eq!(label(Some(3), 3), "Pass on 3rd attempt");
        assert_eq!(label(Some(5), 5), "Requires more than three attempts");
        assert_eq!(label(None, 1), "No pass after 1 attempt");
        assert_eq!(label(None, 2), "No pass after 2 attempts");
        assert_eq!(label(None, 0), "Never enrolled");
    }

    #[test]
    fn test_rollup_ignores_undefined_attempts() {
        let features = [
            CourseMasteryFeature::new(Some(1), 1, false),
            CourseMasteryFeature::new(Some(2), 2, true),
            CourseMasteryFeature::new(None, 2, true),
            CourseMasteryFeature::new(None, 0, false),
        ];
        let rollup = CourseRollup::from_features(&features);
        assert_eq!(
            rollup,
            CourseRollup {
                total_attempts_to_abc: 3,
                first_attempt_pass_count: 1,
                never_passed_count: 2,
                first_grade_dfw_count: 2,
            }
        );
    }
}
