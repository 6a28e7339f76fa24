//! Analysis thresholds and sanitizer rules
//!
//! Every field has a default, and both structs deserialize with
//! `#[serde(default)]`, so a configuration file only needs to name the values
//! it changes.

use etm_features::schema::DEFAULT_MISSING_PATTERN;

/// Thresholds and sizes used by the analysis engines.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Outcome column name, tried before `outcome_aliases`.
    pub outcome: String,
    pub outcome_aliases: Vec<String>,
    /// Group or level size below which a result is flagged low-confidence.
    pub min_cohort: usize,
    /// Categorical columns with more distinct levels are not scanned.
    pub max_categorical_levels: usize,
    pub bucket_count: usize,
    pub confounders: Vec<String>,
    /// Features checked for slice stability. Empty means the synthesized
    /// candidates.
    pub slice_features: Vec<String>,
    /// Minimum share of strata agreeing with the overall direction.
    pub stability_threshold: f64,
    pub slice_min_stratum_n: usize,
    pub slice_min_group_n: usize,
    pub slice_max_levels: usize,
    pub top_numeric: usize,
    pub top_categorical: usize,
    pub top_buckets: usize,
    pub max_candidates: usize,
    /// Bucket rate spreads below this are not reported as candidates.
    pub min_bucket_spread: f64,
    pub sanitizer: SanitizerConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            outcome: "graduated_me".to_owned(),
            outcome_aliases: vec![
                "me_bs_degree_status".to_owned(),
                "me_degree_awarded".to_owned(),
            ],
            min_cohort: 25,
            max_categorical_levels: 60,
            bucket_count: 4,
            confounders: vec![
                "with_math_ap".to_owned(),
                "sat_verb_grouping".to_owned(),
                "first_math_course_campus".to_owned(),
            ],
            slice_features: vec![],
            stability_threshold: 0.75,
            slice_min_stratum_n: 50,
            slice_min_group_n: 20,
            slice_max_levels: 12,
            top_numeric: 12,
            top_categorical: 12,
            top_buckets: 5,
            max_candidates: 40,
            min_bucket_spread: 0.05,
            sanitizer: SanitizerConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Outcome name followed by its aliases, in lookup order.
    pub fn outcome_candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.outcome.as_str()).chain(self.outcome_aliases.iter().map(String::as_str))
    }
}

/// Rules for quarantining columns that leak the outcome.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SanitizerConfig {
    pub enabled: bool,
    /// Regexes (case-insensitive) of column names dropped before analysis.
    pub deny_patterns: Vec<String>,
    /// Regexes of column names kept but reported for review.
    pub warn_patterns: Vec<String>,
    pub max_missing_fraction: f64,
    /// Agreement with the outcome at or above which a binary-like column is
    /// treated as a copy of it.
    pub outcome_equivalence_threshold: f64,
    /// Paired rows required before the equivalence test applies.
    pub equivalence_min_rows: usize,
    /// Regex (case-insensitive) of cell texts read as missing values.
    pub missing_pattern: String,
    /// Derive `credit_window_canon` from credit counts or range strings.
    pub canonical_credit_window: bool,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        let patterns = |items: &[&str]| items.iter().map(|s| (*s).to_owned()).collect();
        Self {
            enabled: true,
            deny_patterns: patterns(&["graduating", "degree", "me_bs", "outcome", "_is_missing$"]),
            warn_patterns: patterns(&["cgpa$", "gpa$", "gpa_.*(final|last)", "status", "etm_window"]),
            max_missing_fraction: 0.60,
            outcome_equivalence_threshold: 0.985,
            equivalence_min_rows: 100,
            missing_pattern: DEFAULT_MISSING_PATTERN.to_owned(),
            canonical_credit_window: true,
        }
    }
}
