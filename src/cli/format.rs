use clap::Args;
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cli::core::{check_required_filename, prefix_directory, AFTER_HELP, FULL_VERSION};
use crate::formatter::{IngestionVariant, NameConvention};

/// Extension of the mutation file written by `format`
pub const SSM_EXTENSION: &str = "ssm";
/// Extension of the params file written next to the mutation file
pub const PARAMS_EXTENSION: &str = "params.json";

/// Appends an extension to an output prefix, keeping any dots already in the prefix
pub fn prefixed_filename(prefix: &Path, extension: &str) -> PathBuf {
    let mut filename = prefix.as_os_str().to_owned();
    filename.push(".");
    filename.push(extension);
    PathBuf::from(filename)
}

#[derive(Args, Clone, Debug, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct FormatSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    pub pairtree_prep_version: String,

    /// Input table: an aggregated table or a sample-level variant table (TSV/CSV/XLSX)
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(value_name = "TABLE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub input_filename: PathBuf,

    /// Sheet to read from the input table [default: first sheet]
    #[clap(long = "input-sheet")]
    #[clap(value_name = "SHEET")]
    #[clap(help_heading = Some("Input/Output"))]
    pub input_sheet: Option<String>,

    /// Output prefix, writes <PREFIX>.ssm and <PREFIX>.params.json
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-prefix")]
    #[clap(value_name = "PREFIX")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_prefix: PathBuf,

    /// Directory prefix applied to the relative input path
    #[clap(long = "input-dir")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub input_dir: Option<PathBuf>,

    /// Directory prefix applied to the relative output prefix
    #[clap(long = "output-dir")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_dir: Option<PathBuf>,

    /// Optional output debug folder, saves the resolved settings
    #[clap(long = "output-debug")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub debug_folder: Option<PathBuf>,

    /// The shape of the input table
    #[clap(long = "input-type")]
    #[clap(value_name = "TYPE")]
    #[clap(help_heading = Some("Format parameters"))]
    #[clap(default_value = "aggregated")]
    pub ingestion_variant: IngestionVariant,

    /// How each mutation is named
    #[clap(long = "names")]
    #[clap(value_name = "CONVENTION")]
    #[clap(help_heading = Some("Format parameters"))]
    #[clap(default_value = "locus")]
    pub name_convention: NameConvention,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

impl FormatSettings {
    pub fn ssm_filename(&self) -> PathBuf {
        prefixed_filename(&self.output_prefix, SSM_EXTENSION)
    }

    pub fn params_filename(&self) -> PathBuf {
        prefixed_filename(&self.output_prefix, PARAMS_EXTENSION)
    }
}

pub fn check_format_settings(mut settings: FormatSettings) -> anyhow::Result<FormatSettings> {
    // hard code the version in
    settings.pairtree_prep_version = FULL_VERSION.clone();
    info!("pairtree-prep version: {:?}", &settings.pairtree_prep_version);
    info!("Sub-command: format");

    settings.input_filename = prefix_directory(settings.input_dir.as_deref(), &settings.input_filename);
    settings.output_prefix = prefix_directory(settings.output_dir.as_deref(), &settings.output_prefix);

    info!("Inputs:");
    check_required_filename(&settings.input_filename, "Input table")?;
    info!("\tInput: {:?} (sheet: {:?})", &settings.input_filename, &settings.input_sheet);

    info!("Outputs:");
    info!("\tMutation file: {:?}", settings.ssm_filename());
    info!("\tParams file: {:?}", settings.params_filename());
    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        info!("\tDebug folder: {debug_folder:?}");
    }

    info!("Format parameters:");
    info!("\tInput type: {}", settings.ingestion_variant);
    info!("\tName convention: {}", settings.name_convention);

    Ok(settings)
}
