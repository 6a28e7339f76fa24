use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use etm_features::{
    assembler::FeatureAssembler,
    policy::{PolicyConfig, PolicyEngine},
    record::StudentRecord,
    schema::RawTable,
    table::FeatureTable,
    trajectory::{self, TermGpaGrid},
    validation::SanityReport,
};

use crate::{config::EtmConfig, util};

pub(crate) const FEATURES_FILE: &str = "features.csv";
const TERMS_LONG_FILE: &str = "terms_long.csv";
const SANITY_FLAGS_FILE: &str = "sanity_flags.csv";

/// Shape of the term GPA export.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, derive_more::FromStr)]
pub(crate) enum TermLayout {
    /// `term_slot` column present means long, otherwise wide
    #[default]
    Auto,
    /// One row per (student, term slot)
    Long,
    /// One row per student, one column per term slot
    Wide,
}

impl TermLayout {
    fn read(self, raw: &RawTable) -> anyhow::Result<Vec<TermGpaGrid>> {
        let is_long = match self {
            Self::Auto => raw.column_index("term_slot").is_some(),
            Self::Long => true,
            Self::Wide => false,
        };
        let grids = if is_long {
            TermGpaGrid::from_long(raw)?
        } else {
            TermGpaGrid::from_wide(raw)?
        };
        Ok(grids)
    }
}

#[derive(Debug, Clone, Args)]
pub(crate) struct FeatureInputArg {
    /// Student-level CSV export
    pub students: PathBuf,
    /// Term GPA CSV export
    #[arg(long)]
    pub terms: Option<PathBuf>,
    /// Layout of the term GPA export (auto, long, wide)
    #[arg(long, default_value = "auto")]
    pub terms_layout: TermLayout,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct BuildFeaturesArg {
    #[clap(flatten)]
    pub input: FeatureInputArg,
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Directory for the feature, term and sanity tables
    #[arg(long, default_value = "etm_out")]
    pub out_dir: PathBuf,
}

pub(crate) fn run(arg: &BuildFeaturesArg) -> anyhow::Result<()> {
    let config = EtmConfig::load(arg.config.as_ref())?;
    let table = build(&arg.input, &config.policy, &arg.out_dir)?;
    println!(
        "Feature table: {} students x {} columns -> {}",
        table.len(),
        table.columns().len(),
        arg.out_dir.join(FEATURES_FILE).display()
    );
    Ok(())
}

/// Reads the exports, assembles the feature table and writes every table to
/// `out_dir`.
pub(crate) fn build(
    input: &FeatureInputArg,
    policy: &PolicyConfig,
    out_dir: &Path,
) -> anyhow::Result<FeatureTable> {
    let students = util::read_csv_file("students", &input.students)?;
    let records = StudentRecord::from_table(&students)
        .with_context(|| format!("Invalid students file: {}", input.students.display()))?;

    let grids = match &input.terms {
        Some(path) => {
            let raw = util::read_csv_file("term GPA", path)?;
            input
                .terms_layout
                .read(&raw)
                .with_context(|| format!("Invalid term GPA file: {}", path.display()))?
        }
        None => {
            tracing::info!("no term GPA file given; trajectory features will be empty");
            vec![]
        }
    };

    let policy = PolicyEngine::new(policy);
    let table = FeatureAssembler::new(&policy).assemble(&records, &grids);

    util::Output::open(out_dir.join(FEATURES_FILE))?.write_feature_table(&table)?;
    if !grids.is_empty() {
        let rows = trajectory::long_term_rows(&grids);
        util::Output::open(out_dir.join(TERMS_LONG_FILE))?.write_csv_rows(&rows)?;
    }
    let sanity = SanityReport::from_records(&records);
    let flagged = sanity.flagged().collect::<Vec<_>>();
    if !flagged.is_empty() {
        util::Output::open(out_dir.join(SANITY_FLAGS_FILE))?.write_csv_rows(&flagged)?;
        println!(
            "Sanity flags: {} rows ({} CGPA gap, {} enrolled terms) -> {}",
            flagged.len(),
            sanity.cgpa_negative_gap,
            sanity.enrolled_terms_zero_or_neg,
            out_dir.join(SANITY_FLAGS_FILE).display()
        );
    }
    Ok(table)
}
