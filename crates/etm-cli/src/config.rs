//! `etm.toml` loading and command-line overrides

use std::{fs, path::PathBuf};

use anyhow::Context;
use clap::Args;
use etm_features::policy::PolicyConfig;
use etm_insights::config::AnalysisConfig;

/// Whole configuration file. Missing tables and keys keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub(crate) struct EtmConfig {
    pub policy: PolicyConfig,
    pub analysis: AnalysisConfig,
}

impl EtmConfig {
    pub(crate) fn from_toml(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("Failed to parse configuration")
    }

    pub(crate) fn load(path: Option<&PathBuf>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }
}

#[derive(Debug, Clone, Default, Args)]
pub(crate) struct ConfigArg {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Outcome column (overrides `analysis.outcome`)
    #[arg(long)]
    pub outcome: Option<String>,
    /// Number of quantile buckets
    #[arg(long)]
    pub buckets: Option<usize>,
    /// Group size below which results are flagged low-confidence
    #[arg(long)]
    pub min_cohort: Option<usize>,
    /// Confounder columns for slice checks (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub confounders: Option<Vec<String>>,
}

impl ConfigArg {
    /// Loads the file and applies the flags on top of it.
    pub(crate) fn resolve(&self) -> anyhow::Result<EtmConfig> {
        let mut config = EtmConfig::load(self.config.as_ref())?;
        self.apply(&mut config.analysis);
        Ok(config)
    }

    fn apply(&self, analysis: &mut AnalysisConfig) {
        if let Some(outcome) = &self.outcome {
            analysis.outcome.clone_from(outcome);
        }
        if let Some(buckets) = self.buckets {
            analysis.bucket_count = buckets;
        }
        if let Some(min_cohort) = self.min_cohort {
            analysis.min_cohort = min_cohort;
        }
        if let Some(confounders) = &self.confounders {
            analysis.confounders.clone_from(confounders);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = EtmConfig::from_toml(
            r#"
            [policy]
            pass_grades = ["A", "B"]

            [analysis]
            bucket_count = 5

            [analysis.sanitizer]
            enabled = false
            missing_pattern = '^(unknown|-)$'
            "#,
        )
        .unwrap();

        assert_eq!(config.policy.pass_grades.len(), 2);
        assert_eq!(config.policy.fail_grades, PolicyConfig::default().fail_grades);
        assert_eq!(config.analysis.bucket_count, 5);
        assert!(!config.analysis.sanitizer.enabled);
        assert_eq!(config.analysis.sanitizer.missing_pattern, "^(unknown|-)$");
        assert!(config.analysis.sanitizer.canonical_credit_window);
        assert_eq!(config.analysis.outcome, "graduated_me");
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(EtmConfig::from_toml("").unwrap(), EtmConfig::default());
    }

    #[test]
    fn test_flags_override_file() {
        let mut config = EtmConfig::from_toml("[analysis]\noutcome = \"retained\"\nbucket_count = 5\n")
            .unwrap();
        let arg = ConfigArg {
            buckets: Some(3),
            confounders: Some(vec!["campus".to_owned()]),
            ..ConfigArg::default()
        };
        arg.apply(&mut config.analysis);

        assert_eq!(config.analysis.outcome, "retained");
        assert_eq!(config.analysis.bucket_count, 3);
        assert_eq!(config.analysis.confounders, ["campus"]);
        assert_eq!(config.analysis.min_cohort, 25);
    }

    #[test]
    fn test_unknown_key_type_is_error() {
        assert!(EtmConfig::from_toml("[analysis]\nbucket_count = \"four\"\n").is_err());
    }
}
