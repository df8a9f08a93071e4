use clap::Args;
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cli::core::{check_parallel_count, check_required_filename, prefix_directory, AFTER_HELP, FULL_VERSION};
use crate::editors::split::{pair_directories, split_output_dir, SplitColumns};
use crate::formatter::NameConvention;

#[derive(Args, Clone, Debug, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct SplitDataSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    pub pairtree_prep_version: String,

    /// Mutation files, one per input
    #[clap(required = true)]
    #[clap(short = 's')]
    #[clap(long = "ssm")]
    #[clap(value_name = "SSM")]
    #[clap(num_args = 1..)]
    #[clap(help_heading = Some("Input/Output"))]
    pub ssm_filenames: Vec<PathBuf>,

    /// Params files with the cluster assignments, one per input
    #[clap(required = true)]
    #[clap(short = 'p')]
    #[clap(long = "params")]
    #[clap(value_name = "JSON")]
    #[clap(num_args = 1..)]
    #[clap(help_heading = Some("Input/Output"))]
    pub params_filenames: Vec<PathBuf>,

    /// Source data tables the mutation files were built from, one per input
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "data")]
    #[clap(value_name = "TABLE")]
    #[clap(num_args = 1..)]
    #[clap(help_heading = Some("Input/Output"))]
    pub data_filenames: Vec<PathBuf>,

    /// Directory prefix: one shared by every input, or one per input; outputs are written to <DIR>/<data file stem>/
    #[clap(short = 'd')]
    #[clap(long = "directory")]
    #[clap(value_name = "DIR")]
    #[clap(num_args = 1..)]
    #[clap(help_heading = Some("Input/Output"))]
    pub directories: Vec<PathBuf>,

    /// How the mutations were named when the mutation files were built
    #[clap(long = "names")]
    #[clap(value_name = "CONVENTION")]
    #[clap(help_heading = Some("Split parameters"))]
    #[clap(default_value = "locus")]
    pub name_convention: NameConvention,

    /// Chromosome column in the data tables
    #[clap(long = "chrom-column")]
    #[clap(value_name = "COLUMN")]
    #[clap(help_heading = Some("Split parameters"))]
    #[clap(default_value = "chr")]
    pub chrom_column: String,

    /// Position column in the data tables
    #[clap(long = "position-column")]
    #[clap(value_name = "COLUMN")]
    #[clap(help_heading = Some("Split parameters"))]
    #[clap(default_value = "start")]
    pub position_column: String,

    /// Gene column in the data tables
    #[clap(long = "gene-column")]
    #[clap(value_name = "COLUMN")]
    #[clap(help_heading = Some("Split parameters"))]
    #[clap(default_value = "gene")]
    pub gene_column: String,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

/// One fully resolved split job
#[derive(Clone, Debug, PartialEq)]
pub struct SplitJob {
    pub ssm_filename: PathBuf,
    pub params_filename: PathBuf,
    pub data_filename: PathBuf,
    pub output_folder: PathBuf
}

impl SplitDataSettings {
    pub fn columns(&self) -> SplitColumns {
        SplitColumns {
            chrom: self.chrom_column.clone(),
            position: self.position_column.clone(),
            gene: self.gene_column.clone()
        }
    }

    /// Pairs up the parallel input lists with their directories
    /// # Errors
    /// * `ConfigurationError::CountMismatch` if the lists or directories do not line up
    pub fn jobs(&self) -> anyhow::Result<Vec<SplitJob>> {
        let count = self.ssm_filenames.len();
        check_parallel_count("params file", self.params_filenames.len(), "mutation file", count)?;
        check_parallel_count("data file", self.data_filenames.len(), "mutation file", count)?;
        let directories = pair_directories("mutation file", count, &self.directories)?;

        let jobs = directories.iter().enumerate()
            .map(|(i, dir)| {
                let dir = (!dir.as_os_str().is_empty()).then_some(dir.as_path());
                SplitJob {
                    ssm_filename: prefix_directory(dir, &self.ssm_filenames[i]),
                    params_filename: prefix_directory(dir, &self.params_filenames[i]),
                    data_filename: prefix_directory(dir, &self.data_filenames[i]),
                    output_folder: split_output_dir(dir.unwrap_or(Path::new("")), &self.data_filenames[i])
                }
            })
            .collect();
        Ok(jobs)
    }
}

pub fn check_split_data_settings(mut settings: SplitDataSettings) -> anyhow::Result<SplitDataSettings> {
    // hard code the version in
    settings.pairtree_prep_version = FULL_VERSION.clone();
    info!("pairtree-prep version: {:?}", &settings.pairtree_prep_version);
    info!("Sub-command: split-data");

    let jobs = settings.jobs()?;
    info!("Inputs:");
    for (i, job) in jobs.iter().enumerate() {
        check_required_filename(&job.ssm_filename, format!("Mutation file #{i}").as_str())?;
        check_required_filename(&job.params_filename, format!("Params file #{i}").as_str())?;
        check_required_filename(&job.data_filename, format!("Data file #{i}").as_str())?;
        info!("\tInput #{i}: {:?}, {:?}, {:?}", job.ssm_filename, job.params_filename, job.data_filename);
        info!("\t\tOutput folder: {:?}", job.output_folder);
    }

    info!("Split parameters:");
    info!("\tName convention: {}", settings.name_convention);
    info!("\tColumns: {:?}, {:?}, {:?}", settings.chrom_column, settings.position_column, settings.gene_column);

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConfigurationError;

    fn settings(directories: &[&str]) -> SplitDataSettings {
        SplitDataSettings {
            ssm_filenames: vec![PathBuf::from("a.ssm"), PathBuf::from("b.ssm")],
            params_filenames: vec![PathBuf::from("a.params.json"), PathBuf::from("b.params.json")],
            data_filenames: vec![PathBuf::from("a.tsv"), PathBuf::from("b.tsv")],
            directories: directories.iter().map(PathBuf::from).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_jobs_shared_directory() {
        let jobs = settings(&["run"]).jobs().unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].ssm_filename, PathBuf::from("run/b.ssm"));
        assert_eq!(jobs[1].data_filename, PathBuf::from("run/b.tsv"));
        assert_eq!(jobs[1].output_folder, PathBuf::from("run/b"));
    }

    #[test]
    fn test_jobs_per_input_directory() {
        let jobs = settings(&["x", "y"]).jobs().unwrap();
        assert_eq!(jobs[0].params_filename, PathBuf::from("x/a.params.json"));
        assert_eq!(jobs[1].output_folder, PathBuf::from("y/b"));

        let jobs = settings(&[]).jobs().unwrap();
        assert_eq!(jobs[0].ssm_filename, PathBuf::from("a.ssm"));
        assert_eq!(jobs[0].output_folder, PathBuf::from("a"));
    }

    #[test]
    fn test_jobs_mismatch() {
        let err = settings(&["x", "y", "z"]).jobs().unwrap_err();
        assert!(matches!(err.downcast_ref::<ConfigurationError>(), Some(ConfigurationError::CountMismatch { .. })));

        let mut bad = settings(&[]);
        bad.params_filenames.pop();
        let err = bad.jobs().unwrap_err();
        assert!(matches!(err.downcast_ref::<ConfigurationError>(), Some(ConfigurationError::CountMismatch { found: 1, expected: 2, .. })));
    }
}
