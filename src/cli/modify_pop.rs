use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_required_filename, prefix_directory, AFTER_HELP, FULL_VERSION};
use crate::editors::population::PopulationMethod;
use crate::errors::ConfigurationError;

#[derive(Args, Clone, Debug, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct ModifyPopSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    pub pairtree_prep_version: String,

    /// Population manifest to edit, one sample per row, no header
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(value_name = "TABLE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub manifest_filename: PathBuf,

    /// Samples to add or remove, read from the first column (CSV/TSV, no header)
    #[clap(required = true)]
    #[clap(short = 'p')]
    #[clap(long = "pops")]
    #[clap(value_name = "CSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub pops_filename: PathBuf,

    /// Output manifest
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(value_name = "TABLE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_filename: PathBuf,

    /// Directory prefix applied to every relative path
    #[clap(short = 'd')]
    #[clap(long = "directory")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub directory: Option<PathBuf>,

    /// The edit to apply
    #[clap(required = true)]
    #[clap(short = 'm')]
    #[clap(long = "method")]
    #[clap(value_name = "METHOD")]
    #[clap(help_heading = Some("Edit parameters"))]
    pub method: Option<PopulationMethod>,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

pub fn check_modify_pop_settings(mut settings: ModifyPopSettings) -> anyhow::Result<ModifyPopSettings> {
    // hard code the version in
    settings.pairtree_prep_version = FULL_VERSION.clone();
    info!("pairtree-prep version: {:?}", &settings.pairtree_prep_version);
    info!("Sub-command: modify-pop");

    let directory = settings.directory.as_deref();
    settings.manifest_filename = prefix_directory(directory, &settings.manifest_filename);
    settings.pops_filename = prefix_directory(directory, &settings.pops_filename);
    settings.output_filename = prefix_directory(directory, &settings.output_filename);

    let Some(method) = settings.method else {
        return Err(ConfigurationError::MissingArgument {
            method: "modify-pop".to_string(), argument: "--method".to_string()
        }.into());
    };

    info!("Inputs:");
    check_required_filename(&settings.manifest_filename, "Population manifest")?;
    info!("\tManifest: {:?}", &settings.manifest_filename);
    check_required_filename(&settings.pops_filename, "Population list")?;
    info!("\tPopulations: {:?}", &settings.pops_filename);
    info!("Outputs:");
    info!("\tManifest: {:?}", &settings.output_filename);
    info!("Edit parameters:");
    info!("\tMethod: {method}");

    Ok(settings)
}
