use clap::{Parser, Subcommand};

use self::{
    analyze::AnalyzeArg, build_features::BuildFeaturesArg, pipeline::RunArg, slice::SliceArg,
};

mod analyze;
mod build_features;
mod pipeline;
mod slice;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Build the student feature table from CSV exports
    BuildFeatures(#[clap(flatten)] BuildFeaturesArg),
    /// Run every analysis engine over a feature table
    Analyze(#[clap(flatten)] AnalyzeArg),
    /// Check effect stability of selected features across confounders
    Slice(#[clap(flatten)] SliceArg),
    /// Build features, then analyze them
    Run(#[clap(flatten)] RunArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::BuildFeatures(arg) => build_features::run(&arg)?,
        Mode::Analyze(arg) => analyze::run(&arg)?,
        Mode::Slice(arg) => slice::run(&arg)?,
        Mode::Run(arg) => pipeline::run(&arg)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn test_cli_definition() {
        CommandArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_analyze_overrides() {
        let args = CommandArgs::try_parse_from([
            "etm",
            "analyze",
            "features.csv",
            "--buckets",
            "5",
            "--confounders",
            "with_math_ap,first_math_course",
        ])
        .unwrap();
        let Mode::Analyze(arg) = args.mode else {
            panic!("expected analyze");
        };
        assert_eq!(arg.config.buckets, Some(5));
        assert_eq!(
            arg.config.confounders.as_deref(),
            Some(&["with_math_ap".to_owned(), "first_math_course".to_owned()][..])
        );
    }
}
