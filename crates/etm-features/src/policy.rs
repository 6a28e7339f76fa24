//! Grade and outcome classification policy
//!
//! Every component that needs to decide whether a grade code or an outcome
//! phrase counts as passing goes through [`PolicyEngine`], built from a single
//! [`PolicyConfig`]. Swapping the config (for example to admit `C-` as a pass)
//! regenerates every downstream feature without touching any other code.
//!
//! # Classification Order
//!
//! 1. Blank text and configured missing markers (`N/A`, `NA`) are [`Outcome::Unknown`]
//! 2. A whole-token grade code is looked up in the pass, fail and withdraw sets
//! 3. Free text is tokenized; a pass token wins over fail and withdraw tokens,
//!    since a cumulative outcome such as `2 Attempts (1st=DFW, 2nd=ABC)` ended
//!    in a pass
//! 4. Anything else is [`Outcome::Unknown`], never silently a failure
//!
//! ```
//! use etm_features::policy::{Outcome, PolicyConfig, PolicyEngine};
//!
//! let engine = PolicyEngine::new(&PolicyConfig::default());
//! assert_eq!(engine.classify("B+"), Outcome::Pass);
//! assert_eq!(engine.classify("c-"), Outcome::Fail);
//! assert_eq!(engine.classify("WF"), Outcome::Withdraw);
//! assert_eq!(engine.classify("2 Attempts (1st=DFW, 2nd=ABC)"), Outcome::Pass);
//! assert_eq!(engine.classify("Only 1 Attempt=DFW"), Outcome::Fail);
//! assert_eq!(engine.classify("Transfer credit"), Outcome::Unknown);
//! ```

use std::{collections::BTreeSet, sync::LazyLock};

use regex::Regex;

/// Classified result of one grade code or outcome phrase.
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
pub enum Outcome {
    #[display("PASS")]
    Pass,
    #[display("FAIL")]
    Fail,
    #[display("WITHDRAW")]
    Withdraw,
    #[display("UNKNOWN")]
    Unknown,
}

impl Outcome {
    /// `true` for the D/F/W family that counts against a first attempt.
    #[must_use]
    pub fn is_dfw(self) -> bool {
        matches!(self, Self::Fail | Self::Withdraw)
    }
}

/// Grade sets and keyword rules defining what passing means.
///
/// All entries are compared case-insensitively. Deserializes from the
/// `[policy]` table of the configuration file; omitted keys keep their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub pass_grades: BTreeSet<String>,
    pub fail_grades: BTreeSet<String>,
    pub withdraw_codes: BTreeSet<String>,
    pub pass_keywords: BTreeSet<String>,
    pub fail_keywords: BTreeSet<String>,
    pub withdraw_keywords: BTreeSet<String>,
    /// Grade variants never treated as passing, even if listed in `pass_grades`.
    pub excluded_pass_variants: BTreeSet<String>,
    /// Phrases meaning the student never took the course.
    pub never_enrolled_phrases: Vec<String>,
    /// Cell values treated as blank.
    pub missing_markers: BTreeSet<String>,
}

fn string_set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            pass_grades: string_set(&["A", "A-", "B+", "B", "B-", "C+", "C"]),
            fail_grades: string_set(&["C-", "D+", "D", "D-", "F"]),
            withdraw_codes: string_set(&["W", "WF", "WN", "LD"]),
            pass_keywords: string_set(&["PASS", "ABC"]),
            fail_keywords: string_set(&["DFW", "FAIL"]),
            withdraw_keywords: string_set(&["WITHDRAW", "WITHDRAWN"]),
            excluded_pass_variants: string_set(&["C-"]),
            never_enrolled_phrases: vec!["NEVER ENROLLED".to_owned()],
            missing_markers: string_set(&["N/A", "NA"]),
        }
    }
}

/// Grade-like or word-like tokens inside free text, e.g. `C-`, `2ND`, `ABC`.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z0-9]+[+\-]?").expect("valid token regex"));

/// Classifier compiled from a [`PolicyConfig`].
///
/// Holds upper-cased copies of every set so classification is a handful of
/// lookups.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    pass: BTreeSet<String>,
    fail: BTreeSet<String>,
    withdraw: BTreeSet<String>,
    pass_keywords: BTreeSet<String>,
    fail_keywords: BTreeSet<String>,
    withdraw_keywords: BTreeSet<String>,
    never_enrolled: Vec<String>,
    missing_markers: BTreeSet<String>,
}

fn upper_set(set: &BTreeSet<String>) -> BTreeSet<String> {
    set.iter().map(|s| s.trim().to_uppercase()).collect()
}

impl PolicyEngine {
    #[must_use]
    pub fn new(config: &PolicyConfig) -> Self {
        let excluded = upper_set(&config.excluded_pass_variants);
        let pass = upper_set(&config.pass_grades)
            .into_iter()
            .filter(|g| !excluded.contains(g))
            .collect();
        Self {
            pass,
            fail: upper_set(&config.fail_grades),
            withdraw: upper_set(&config.withdraw_codes),
            pass_keywords: upper_set(&config.pass_keywords),
            fail_keywords: upper_set(&config.fail_keywords),
            withdraw_keywords: upper_set(&config.withdraw_keywords),
            never_enrolled: config
                .never_enrolled_phrases
                .iter()
                .map(|p| p.trim().to_uppercase())
                .collect(),
            missing_markers: upper_set(&config.missing_markers),
        }
    }

    /// Trims and upper-cases `raw`, returning `None` for blanks and missing
    /// markers.
    #[must_use]
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let text = raw.trim().to_uppercase();
        if text.is_empty() || self.missing_markers.contains(&text) {
            return None;
        }
        Some(text)
    }

    /// Whether `raw` states the student never enrolled in the course.
    #[must_use]
    pub fn is_never_enrolled(&self, raw: &str) -> bool {
        let Some(text) = self.normalize(raw) else {
            return false;
        };
        self.never_enrolled
            .iter()
            .any(|phrase| text.contains(phrase.as_str()))
    }

    /// Classifies a grade code or free-text outcome.
    #[must_use]
    pub fn classify(&self, raw: &str) -> Outcome {
        let Some(text) = self.normalize(raw) else {
            return Outcome::Unknown;
        };
        if let Some(outcome) = self.classify_grade(&text) {
            return outcome;
        }

        let mut seen_fail = false;
        let mut seen_withdraw = false;
        for token in tokens(&text) {
            if self.pass.contains(token) || self.pass_keywords.contains(token) {
                return Outcome::Pass;
            }
            seen_fail |= self.fail.contains(token) || self.fail_keywords.contains(token);
            seen_withdraw |=
                self.withdraw.contains(token) || self.withdraw_keywords.contains(token);
        }
        if seen_fail {
            Outcome::Fail
        } else if seen_withdraw {
            Outcome::Withdraw
        } else {
            Outcome::Unknown
        }
    }

    fn classify_grade(&self, code: &str) -> Option<Outcome> {
        if self.pass.contains(code) {
            Some(Outcome::Pass)
        } else if self.fail.contains(code) {
            Some(Outcome::Fail)
        } else if self.withdraw.contains(code) {
            Some(Outcome::Withdraw)
        } else {
            None
        }
    }
}

/// Splits upper-cased text into tokens.
///
/// A trailing `+` or `-` is kept only on single-letter grade tokens, so `C-`
/// survives while `RE-TAKE` yields `RE` and `TAKE`.
fn tokens(text: &str) -> impl Iterator<Item = &str> {
    TOKEN_RE.find_iter(text).map(|m| {
        let token = m.as_str();
        let body = token.trim_end_matches(['+', '-']);
        if body.len() == 1 && body.chars().all(|c| c.is_ascii_alphabetic()) {
            token
        } else {
            body
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PolicyEngine {
        PolicyEngine::new(&PolicyConfig::default())
    }

    #[test]
    fn test_grade_codes() {
        let engine = engine();
        for grade in ["A", "a-", " B+ ", "B", "B-", "C+", "C"] {
            assert_eq!(engine.classify(grade), Outcome::Pass, "{grade}");
        }
        for grade in ["C-", "D+", "D", "D-", "F"] {
            assert_eq!(engine.classify(grade), Outcome::Fail, "{grade}");
        }
        for code in ["W", "WF", "WN", "LD"] {
            assert_eq!(engine.classify(code), Outcome::Withdraw, "{code}");
        }
    }

    #[test]
    fn test_blank_and_missing_markers_are_unknown() {
        let engine = engine();
        assert_eq!(engine.classify(""), Outcome::Unknown);
        assert_eq!(engine.classify("   "), Outcome::Unknown);
        assert_eq!(engine.classify("n/a"), Outcome::Unknown);
        assert_eq!(engine.normalize("NA"), None);
        assert_eq!(engine.normalize(" abc "), Some("ABC".to_owned()));
    }

    #[test]
    fn test_unrecognized_is_unknown_not_fail() {
        let engine = engine();
        assert_eq!(engine.classify("XYZ"), Outcome::Unknown);
        assert_eq!(engine.classify("Transfer credit"), Outcome::Unknown);
    }

    #[test]
    fn test_free_text_outcomes() {
        let engine = engine();
        assert_eq!(engine.classify("1st Attempt=ABC"), Outcome::Pass);
        assert_eq!(engine.classify("2nd Attempt=ABC"), Outcome::Pass);
        assert_eq!(engine.classify("2 Attempts (Both=DFW)"), Outcome::Fail);
        assert_eq!(engine.classify("Withdrawn"), Outcome::Withdraw);
        assert_eq!(engine.classify("Never Enrolled"), Outcome::Unknown);
    }

    #[test]
    fn test_c_minus_in_free_text_is_not_a_pass() {
        let engine = engine();
        assert_eq!(engine.classify("Grade C- on retake"), Outcome::Fail);
    }

    #[test]
    fn test_hyphenated_words_do_not_look_like_grades() {
        let engine = engine();
        assert_eq!(engine.classify("Re-take pending"), Outcome::Unknown);
    }

    #[test]
    fn test_never_enrolled() {
        let engine = engine();
        assert!(engine.is_never_enrolled("Never Enrolled"));
        assert!(engine.is_never_enrolled("  never enrolled "));
        assert!(!engine.is_never_enrolled("1st Attempt=ABC"));
        assert!(!engine.is_never_enrolled(""));
    }

    #[test]
    fn test_policy_swap_changes_classification() {
        let mut config = PolicyConfig::default();
        config.excluded_pass_variants.clear();
        config.pass_grades.insert("C-".to_owned());
        config.fail_grades.remove("C-");
        let engine = PolicyEngine::new(&config);
        assert_eq!(engine.classify("C-"), Outcome::Pass);
        assert_eq!(engine.classify("Grade C- on retake"), Outcome::Pass);
    }

    #[test]
    fn test_excluded_variant_overrides_pass_set() {
        let mut config = PolicyConfig::default();
        config.pass_grades.insert("C-".to_owned());
        let engine = PolicyEngine::new(&config);
        assert_eq!(engine.classify("C-"), Outcome::Fail);
    }

    #[test]
    fn test_outcome_is_dfw() {
        assert!(Outcome::Fail.is_dfw());
        assert!(Outcome::Withdraw.is_dfw());
        assert!(!Outcome::Pass.is_dfw());
        assert!(!Outcome::Unknown.is_dfw());
    }
}
