use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_required_filename, prefix_directory, AFTER_HELP, FULL_VERSION};

#[derive(Args, Clone, Debug, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct ImportClustersSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    pub pairtree_prep_version: String,

    /// Clustering result with cluster_id and mutation_id columns (TSV)
    #[clap(required = true)]
    #[clap(short = 'c')]
    #[clap(long = "clusters")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub clusters_filename: PathBuf,

    /// Mutation file the clustering was run on
    #[clap(required = true)]
    #[clap(short = 's')]
    #[clap(long = "ssm")]
    #[clap(value_name = "SSM")]
    #[clap(help_heading = Some("Input/Output"))]
    pub ssm_filename: PathBuf,

    /// Params file to update
    #[clap(required = true)]
    #[clap(short = 'p')]
    #[clap(long = "params")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub params_filename: PathBuf,

    /// Output params file [default: overwrite --params]
    #[clap(short = 'o')]
    #[clap(long = "output-params")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_params_filename: Option<PathBuf>,

    /// Directory prefix applied to every relative path
    #[clap(short = 'd')]
    #[clap(long = "directory")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub directory: Option<PathBuf>,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

impl ImportClustersSettings {
    /// The resolved output path; only meaningful after the settings are checked
    pub fn output_params(&self) -> PathBuf {
        self.output_params_filename.clone().unwrap_or_else(|| self.params_filename.clone())
    }
}

pub fn check_import_clusters_settings(mut settings: ImportClustersSettings) -> anyhow::Result<ImportClustersSettings> {
    // hard code the version in
    settings.pairtree_prep_version = FULL_VERSION.clone();
    info!("pairtree-prep version: {:?}", &settings.pairtree_prep_version);
    info!("Sub-command: import-clusters");

    let directory = settings.directory.as_deref();
    settings.clusters_filename = prefix_directory(directory, &settings.clusters_filename);
    settings.ssm_filename = prefix_directory(directory, &settings.ssm_filename);
    settings.params_filename = prefix_directory(directory, &settings.params_filename);
    settings.output_params_filename = settings.output_params_filename.as_deref().map(|f| prefix_directory(directory, f));

    info!("Inputs:");
    check_required_filename(&settings.clusters_filename, "Clusters file")?;
    info!("\tClusters: {:?}", &settings.clusters_filename);
    check_required_filename(&settings.ssm_filename, "Mutation file")?;
    info!("\tMutation file: {:?}", &settings.ssm_filename);
    check_required_filename(&settings.params_filename, "Params file")?;
    info!("\tParams file: {:?}", &settings.params_filename);
    info!("Outputs:");
    info!("\tParams file: {:?}", settings.output_params());

    Ok(settings)
}
