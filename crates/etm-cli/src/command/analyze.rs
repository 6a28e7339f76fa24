use std::path::{Path, PathBuf};

use clap::Args;
use etm_features::table::FeatureTable;
use etm_insights::{config::AnalysisConfig, normalize::TableNormalizer, runner::AnalysisRunner};

use crate::{
    config::ConfigArg,
    report,
    util::{self, Output},
};

const REPORT_FILE: &str = "analysis.json";
const CANDIDATES_FILE: &str = "top_trends.csv";
const EFFECTS_FILE: &str = "numeric_cohens_d.csv";
const RISK_RATIOS_FILE: &str = "categorical_rr.csv";

#[derive(Debug, Clone, Args)]
pub(crate) struct AnalyzeArg {
    /// Feature table CSV written by `build-features`
    pub features: PathBuf,
    #[clap(flatten)]
    pub config: ConfigArg,
    /// Directory for the JSON report and result tables
    #[arg(long, default_value = "etm_out/insights")]
    pub out_dir: PathBuf,
}

pub(crate) fn run(arg: &AnalyzeArg) -> anyhow::Result<()> {
    let config = arg.config.resolve()?;
    let normalizer = TableNormalizer::new(&config.analysis.sanitizer)?;
    let table = util::read_feature_table(&arg.features, normalizer.sentinels())?;
    analyze(&table, &config.analysis, &arg.out_dir)
}

/// Runs the analysis, writes its outputs to `out_dir` and prints the console
/// tables.
pub(crate) fn analyze(
    table: &FeatureTable,
    config: &AnalysisConfig,
    out_dir: &Path,
) -> anyhow::Result<()> {
    let report = AnalysisRunner::new(config).run(table)?;

    Output::open(out_dir.join(REPORT_FILE))?.write_json(&report)?;
    Output::open(out_dir.join(CANDIDATES_FILE))?.write_csv_rows(&report.candidates)?;
    Output::open(out_dir.join(EFFECTS_FILE))?.write_csv_rows(&report.effects)?;
    Output::open(out_dir.join(RISK_RATIOS_FILE))?.write_csv_rows(&report.risk_ratios)?;

    report::print_report(&report);
    println!("Report saved to: {}", out_dir.join(REPORT_FILE).display());
    Ok(())
}
