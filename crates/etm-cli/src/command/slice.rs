use std::path::PathBuf;

use clap::Args;
use etm_insights::{
    normalize::TableNormalizer, outcome::OutcomeColumn, sanitizer::LeakageSanitizer,
    slice::SliceStabilityEngine,
};

use crate::{config::ConfigArg, report, util};

#[derive(Debug, Clone, Args)]
pub(crate) struct SliceArg {
    /// Feature table CSV written by `build-features`
    pub features: PathBuf,
    /// Features to check (comma-separated)
    #[arg(long = "feature", value_delimiter = ',', required = true)]
    pub slice_features: Vec<String>,
    #[clap(flatten)]
    pub config: ConfigArg,
    /// Output JSON path (stdout when omitted)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub(crate) fn run(arg: &SliceArg) -> anyhow::Result<()> {
    let config = arg.config.resolve()?.analysis;
    let normalizer = TableNormalizer::new(&config.sanitizer)?;
    let table = util::read_feature_table(&arg.features, normalizer.sentinels())?;
    let (table, _) = normalizer.normalize(&table);

    let outcome = OutcomeColumn::resolve(&table, &config)?;
    let sanitizer = LeakageSanitizer::new(&config.sanitizer)?;
    let (table, sanitizer_report) = sanitizer.sanitize(&table, &outcome);
    for feature in &arg.slice_features {
        if sanitizer_report.dropped.contains(feature) {
            tracing::warn!(feature = %feature, "feature was quarantined by the sanitizer");
        }
    }

    let (slices, failures) =
        SliceStabilityEngine::new(&config).run(&table, &outcome, &arg.slice_features);
    for failure in &failures {
        eprintln!("skipped {}: {}", failure.unit, failure.reason);
    }

    match &arg.output {
        Some(path) => {
            report::print_slices(&slices);
            util::Output::save_json(&slices, Some(path.clone()))?;
            println!("Slice results saved to: {}", path.display());
        }
        None => util::Output::save_json(&slices, None)?,
    }
    Ok(())
}
