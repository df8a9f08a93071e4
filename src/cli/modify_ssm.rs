use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_optional_filename, check_required_filename, prefix_directory, AFTER_HELP, FULL_VERSION};
use crate::editors::ssm::ModifyMethod;
use crate::errors::ConfigurationError;

#[derive(Args, Clone, Debug, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct ModifySsmSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    pub pairtree_prep_version: String,

    /// Input mutation file
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(value_name = "SSM")]
    #[clap(help_heading = Some("Input/Output"))]
    pub input_filename: PathBuf,

    /// Output mutation file
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(value_name = "SSM")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_filename: PathBuf,

    /// Params file, required for SEPARATE_GARBAGE
    #[clap(long = "params")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub params_filename: Option<PathBuf>,

    /// Output params file for SEPARATE_GARBAGE [default: overwrite --params]
    #[clap(long = "output-params")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_params_filename: Option<PathBuf>,

    /// File of mutation names to keep, one per line, required for KEEP_VARS_BY_NAME
    #[clap(long = "names")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub names_filename: Option<PathBuf>,

    /// Directory prefix applied to every relative path
    #[clap(short = 'd')]
    #[clap(long = "directory")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub directory: Option<PathBuf>,

    /// Optional output debug folder, saves the resolved settings
    #[clap(long = "output-debug")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub debug_folder: Option<PathBuf>,

    /// The edit to apply
    #[clap(required = true)]
    #[clap(short = 'm')]
    #[clap(long = "method")]
    #[clap(value_name = "METHOD")]
    #[clap(help_heading = Some("Edit parameters"))]
    pub method: Option<ModifyMethod>,

    /// Method arguments, e.g. "> 0.5" for the VAF filters or the cell counts for SCALE_COUNTS
    #[clap(short = 'a')]
    #[clap(long = "args")]
    #[clap(value_name = "ARG")]
    #[clap(num_args = 1..)]
    #[clap(allow_hyphen_values = true)]
    #[clap(help_heading = Some("Edit parameters"))]
    pub method_args: Vec<String>,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

pub fn check_modify_ssm_settings(mut settings: ModifySsmSettings) -> anyhow::Result<ModifySsmSettings> {
    // hard code the version in
    settings.pairtree_prep_version = FULL_VERSION.clone();
    info!("pairtree-prep version: {:?}", &settings.pairtree_prep_version);
    info!("Sub-command: modify-ssm");

    let directory = settings.directory.as_deref();
    settings.input_filename = prefix_directory(directory, &settings.input_filename);
    settings.output_filename = prefix_directory(directory, &settings.output_filename);
    settings.params_filename = settings.params_filename.as_deref().map(|f| prefix_directory(directory, f));
    settings.names_filename = settings.names_filename.as_deref().map(|f| prefix_directory(directory, f));
    settings.output_params_filename = settings.output_params_filename.as_deref()
        .map(|f| prefix_directory(directory, f))
        .or_else(|| settings.params_filename.clone());

    let Some(method) = settings.method else {
        return Err(ConfigurationError::MissingArgument {
            method: "modify-ssm".to_string(), argument: "--method".to_string()
        }.into());
    };

    info!("Inputs:");
    check_required_filename(&settings.input_filename, "Input mutation file")?;
    info!("\tMutation file: {:?}", &settings.input_filename);
    check_optional_filename(settings.params_filename.as_deref(), "Params file")?;
    info!("\tParams file: {:?}", &settings.params_filename);
    check_optional_filename(settings.names_filename.as_deref(), "Names file")?;
    info!("\tNames file: {:?}", &settings.names_filename);

    info!("Outputs:");
    info!("\tMutation file: {:?}", &settings.output_filename);
    if method == ModifyMethod::SeparateGarbage {
        info!("\tParams file: {:?}", &settings.output_params_filename);
    }
    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        info!("\tDebug folder: {debug_folder:?}");
    }

    info!("Edit parameters:");
    info!("\tMethod: {method}");
    info!("\tArguments: {:?}", &settings.method_args);

    Ok(settings)
}
