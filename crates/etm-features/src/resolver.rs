//! Attempt inference over cumulative course outcome snapshots
//!
//! [`CourseAttemptResolver`] turns the four ordered windows of a
//! [`CourseOutcomeSnapshot`] into a [`CourseMasteryFeature`]. Each window is
//! cumulative, so attempt evidence combines by maximum, never by sum.
//!
//! # Per-Window Evidence
//!
//! Each non-blank window yields:
//!
//! - a classification from the [`PolicyEngine`]
//! - an explicit pass ordinal, from text such as `2nd=ABC` or `2nd Attempt=ABC`
//! - attempt numbers, from text such as `2 Attempts`, `Only 1 Attempt` or
//!   `3rd attempt`
//!
//! # Pass Ordinal
//!
//! For a window classified as a pass, the ordinal is 1 for the first-term
//! window, otherwise the explicit ordinal, otherwise the attempt number in the
//! same window, otherwise a default: the best pass ordinal already seen, or one
//! past the most attempts evidenced by earlier windows. A final outcome showing
//! a pass after two failed attempts therefore resolves to a pass on attempt 3.
//!
//! The minimum pass ordinal over all windows wins, so a later window can
//! correct an earlier one but never the reverse.
//!
//! ```
//! use etm_features::{
//!     course::CourseOutcomeSnapshot,
//!     policy::{PolicyConfig, PolicyEngine},
//!     resolver::CourseAttemptResolver,
//! };
//!
//! let policy = PolicyEngine::new(&PolicyConfig::default());
//! let resolver = CourseAttemptResolver::new(&policy);
//! let snapshot = CourseOutcomeSnapshot {
//!     first_grade: Some("F".to_owned()),
//!     first_year: Some("2nd Attempt=ABC".to_owned()),
//!     ..Default::default()
//! };
//! let feature = resolver.resolve(&snapshot);
//! assert_eq!(feature.attempts_to_abc, Some(2));
//! assert!(feature.first_grade_dfw);
//! assert!(!feature.pass_by_first_attempt);
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::{
    course::{CourseMasteryFeature, CourseOutcomeSnapshot, SnapshotWindow},
    policy::{Outcome, PolicyEngine},
};

static PASS_ORDINAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*(?:ST|ND|RD|TH)\s*(?:ATTEMPT)?\s*=\s*(?:ABC|PASS)")
        .expect("valid pass ordinal regex")
});
static ATTEMPT_ORDINAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*(?:ST|ND|RD|TH)\s+ATTEMPT").expect("valid attempt ordinal regex")
});
static ATTEMPT_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*ATTEMPTS?").expect("valid attempt count regex"));

fn captured_numbers<'t>(re: &'t Regex, text: &'t str) -> impl Iterator<Item = u32> + 't {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .filter(|n| *n > 0)
}

/// Evidence extracted from one window's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowEvidence {
    outcome: Outcome,
    pass_ordinal: Option<u32>,
    /// Largest attempt number mentioned, ordinal or count.
    attempts: Option<u32>,
}

impl WindowEvidence {
    fn parse(policy: &PolicyEngine, raw: &str) -> Option<Self> {
        let text = policy.normalize(raw)?;
        if policy.is_never_enrolled(&text) {
            return None;
        }
        let pass_ordinal = captured_numbers(&PASS_ORDINAL_RE, &text).min();
        let attempts = captured_numbers(&ATTEMPT_ORDINAL_RE, &text)
            .chain(captured_numbers(&ATTEMPT_COUNT_RE, &text))
            .chain(pass_ordinal)
            .max();
        Some(Self {
            outcome: policy.classify(&text),
            pass_ordinal,
            attempts,
        })
    }

    fn is_enrolled(&self) -> bool {
        self.outcome != Outcome::Unknown || self.attempts.is_some()
    }
}

/// Resolves snapshots to mastery features under one policy.
#[derive(Debug, Clone, Copy)]
pub struct CourseAttemptResolver<'a> {
    policy: &'a PolicyEngine,
}

impl<'a> CourseAttemptResolver<'a> {
    #[must_use]
    pub fn new(policy: &'a PolicyEngine) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> &'a PolicyEngine {
        self.policy
    }

    /// Resolves one (student, course) snapshot.
    #[must_use]
    pub fn resolve(&self, snapshot: &CourseOutcomeSnapshot) -> CourseMasteryFeature {
        let mut best_pass: Option<u32> = None;
        let mut max_attempts: u32 = 0;
        let mut first_grade_dfw = false;

        for (window, raw) in snapshot.windows() {
            let Some(raw) = raw else {
                continue;
            };
            let Some(evidence) = WindowEvidence::parse(self.policy, raw) else {
                continue;
            };
            if !evidence.is_enrolled() {
                tracing::warn!(%window, text = raw, "unparsable course snapshot, ignoring");
                continue;
            }
            if window == SnapshotWindow::FirstTerm {
                first_grade_dfw = evidence.outcome.is_dfw();
            }

            let pass_ordinal = (evidence.outcome == Outcome::Pass).then(|| {
                if window == SnapshotWindow::FirstTerm {
                    1
                } else {
                    evidence
                        .pass_ordinal
                        .or(evidence.attempts)
                        .unwrap_or_else(|| best_pass.unwrap_or(max_attempts + 1))
                }
            });

            if let Some(ordinal) = pass_ordinal {
                match best_pass {
                    Some(best) if ordinal < best => {
                        tracing::debug!(
                            %window,
                            previous = best,
                            ordinal,
                            "later window reports an earlier pass"
                        );
                        best_pass = Some(ordinal);
                    }
                    Some(_) => {}
                    None => best_pass = Some(ordinal),
                }
            }

            let attempts = evidence.attempts.unwrap_or(1).max(pass_ordinal.unwrap_or(1));
            if attempts < max_attempts {
                tracing::debug!(
                    %window,
                    previous = max_attempts,
                    attempts,
                    "later window evidences fewer attempts"
                );
            }
            max_attempts = max_attempts.max(attempts);
        }

        CourseMasteryFeature::new(best_pass, max_attempts, first_grade_dfw)
    }
}
