use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::aggregator::ImputeTechnique;
use crate::cli::core::{check_required_filename, prefix_directory, AFTER_HELP, FULL_VERSION};
use crate::errors::ConfigurationError;
use crate::parsing::schema::DEFAULT_SAMPLE_SUFFIX;
use crate::parsing::table_io::is_spreadsheet;

#[derive(Args, Clone, Debug, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct AggregateSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    pub pairtree_prep_version: String,

    /// Curated primary variant table (TSV/CSV/XLSX)
    #[clap(required = true)]
    #[clap(short = 'p')]
    #[clap(long = "primary")]
    #[clap(value_name = "TABLE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub primary_filename: PathBuf,

    /// Sheet to read from the primary table [default: first sheet]
    #[clap(long = "primary-sheet")]
    #[clap(value_name = "SHEET")]
    #[clap(help_heading = Some("Input/Output"))]
    pub primary_sheet: Option<String>,

    /// Raw variant caller output table (TSV/CSV/XLSX)
    #[clap(required = true)]
    #[clap(short = 'c')]
    #[clap(long = "calls")]
    #[clap(value_name = "TABLE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub calls_filename: PathBuf,

    /// Sheet to read from the calls table [default: first sheet]
    #[clap(long = "calls-sheet")]
    #[clap(value_name = "SHEET")]
    #[clap(help_heading = Some("Input/Output"))]
    pub calls_sheet: Option<String>,

    /// Population manifest, one sample name per row in the first column
    #[clap(required = true)]
    #[clap(short = 'm')]
    #[clap(long = "populations")]
    #[clap(value_name = "TABLE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub populations_filename: PathBuf,

    /// Sheet to read from the population manifest [default: first sheet]
    #[clap(long = "populations-sheet")]
    #[clap(value_name = "SHEET")]
    #[clap(help_heading = Some("Input/Output"))]
    pub populations_sheet: Option<String>,

    /// The population manifest has a header row
    #[clap(long = "populations-header")]
    #[clap(help_heading = Some("Input/Output"))]
    pub populations_header: bool,

    /// Output aggregated table (TSV/CSV)
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_filename: PathBuf,

    /// Optional aggregation report (JSON)
    #[clap(long = "output-report")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub report_filename: Option<PathBuf>,

    /// Optional prefix for a mutation file and params file built from the aggregated table
    #[clap(long = "output-ssm")]
    #[clap(value_name = "PREFIX")]
    #[clap(help_heading = Some("Input/Output"))]
    pub ssm_prefix: Option<PathBuf>,

    /// Directory prefix applied to relative input paths
    #[clap(long = "input-dir")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub input_dir: Option<PathBuf>,

    /// Directory prefix applied to relative output paths
    #[clap(long = "output-dir")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_dir: Option<PathBuf>,

    /// Optional output debug folder, saves the resolved settings
    #[clap(long = "output-debug")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub debug_folder: Option<PathBuf>,

    /// Reference depth imputation for (locus, sample) pairs with no source data
    #[clap(long = "impute")]
    #[clap(value_name = "METHOD")]
    #[clap(help_heading = Some("Aggregation parameters"))]
    #[clap(default_value = "ZERO")]
    pub impute_technique: ImputeTechnique,

    /// Suffix removed from sample names in both source tables; an empty string disables stripping
    #[clap(long = "sample-suffix")]
    #[clap(value_name = "SUFFIX")]
    #[clap(help_heading = Some("Aggregation parameters"))]
    #[clap(default_value = DEFAULT_SAMPLE_SUFFIX)]
    pub sample_suffix: String,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

pub fn check_aggregate_settings(mut settings: AggregateSettings) -> anyhow::Result<AggregateSettings> {
    // hard code the version in
    settings.pairtree_prep_version = FULL_VERSION.clone();
    info!("pairtree-prep version: {:?}", &settings.pairtree_prep_version);
    info!("Sub-command: aggregate");

    // apply the directory prefixes before any checks
    let input_dir = settings.input_dir.as_deref();
    settings.primary_filename = prefix_directory(input_dir, &settings.primary_filename);
    settings.calls_filename = prefix_directory(input_dir, &settings.calls_filename);
    settings.populations_filename = prefix_directory(input_dir, &settings.populations_filename);

    let output_dir = settings.output_dir.as_deref();
    settings.output_filename = prefix_directory(output_dir, &settings.output_filename);
    settings.report_filename = settings.report_filename.as_deref().map(|f| prefix_directory(output_dir, f));
    settings.ssm_prefix = settings.ssm_prefix.as_deref().map(|f| prefix_directory(output_dir, f));

    info!("Inputs:");
    check_required_filename(&settings.primary_filename, "Primary table")?;
    info!("\tPrimary: {:?} (sheet: {:?})", &settings.primary_filename, &settings.primary_sheet);
    check_required_filename(&settings.calls_filename, "Calls table")?;
    info!("\tCalls: {:?} (sheet: {:?})", &settings.calls_filename, &settings.calls_sheet);
    check_required_filename(&settings.populations_filename, "Population manifest")?;
    info!("\tPopulations: {:?} (sheet: {:?}, header: {})", &settings.populations_filename, &settings.populations_sheet, settings.populations_header);

    // outputs
    info!("Outputs:");
    if is_spreadsheet(&settings.output_filename) {
        return Err(ConfigurationError::UnsupportedOutput { path: settings.output_filename.display().to_string() }.into());
    }
    info!("\tAggregated table: {:?}", &settings.output_filename);
    info!("\tReport: {:?}", &settings.report_filename);
    info!("\tMutation file prefix: {:?}", &settings.ssm_prefix);
    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        info!("\tDebug folder: {debug_folder:?}");
    }

    info!("Aggregation parameters:");
    info!("\tImputation: {}", settings.impute_technique);
    info!("\tSample suffix: {:?}", &settings.sample_suffix);

    Ok(settings)
}
