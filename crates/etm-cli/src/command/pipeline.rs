use std::path::PathBuf;

use clap::Args;

use super::{
    analyze,
    build_features::{self, FeatureInputArg},
};
use crate::config::ConfigArg;

#[derive(Debug, Clone, Args)]
pub(crate) struct RunArg {
    #[clap(flatten)]
    pub input: FeatureInputArg,
    #[clap(flatten)]
    pub config: ConfigArg,
    /// Output directory; insights go to its `insights` subdirectory
    #[arg(long, default_value = "etm_out")]
    pub out_dir: PathBuf,
}

pub(crate) fn run(arg: &RunArg) -> anyhow::Result<()> {
    let config = arg.config.resolve()?;
    let table = build_features::build(&arg.input, &config.policy, &arg.out_dir)?;
    println!(
        "Feature table: {} students x {} columns -> {}\n",
        table.len(),
        table.columns().len(),
        arg.out_dir.join(build_features::FEATURES_FILE).display()
    );
    analyze::analyze(&table, &config.analysis, &arg.out_dir.join("insights"))
}
