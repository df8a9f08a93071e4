
use clap::{Parser, Subcommand};
use chrono::Datelike;
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};

use crate::cli::aggregate::AggregateSettings;
use crate::cli::format::FormatSettings;
use crate::cli::import_clusters::ImportClustersSettings;
use crate::cli::modify_pop::ModifyPopSettings;
use crate::cli::modify_ssm::ModifySsmSettings;
use crate::cli::split_data::SplitDataSettings;
use crate::errors::ConfigurationError;

lazy_static! {
    /// Stores the full version string we plan to use, which is generated in build.rs
    /// # Examples
    /// * `0.3.0-6bb9635-dirty` - while on a dirty branch
    /// * `0.3.0-6bb9635` - with a fresh commit
    pub static ref FULL_VERSION: String = format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("VERGEN_GIT_DESCRIBE"));

    /// Shared after help string
    pub static ref AFTER_HELP: String = format!("Copyright (C) 2023-{}
This program comes with ABSOLUTELY NO WARRANTY; it is intended for
Research Use Only and not for use in diagnostic procedures.", chrono::Utc::now().year());
}

#[derive(Parser)]
#[clap(author,
    version = &**FULL_VERSION,
    about,
    after_help = &**AFTER_HELP)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands
}

/// pairtree-prep, prepares variant calls for subclonal reconstruction.
/// Select a subcommand to see more usage information:
#[derive(Subcommand)]
pub enum Commands {
    /// Aggregates primary variants and raw calls into a dense locus-by-sample table
    Aggregate(Box<AggregateSettings>),
    /// Formats an aggregated or sample-level table into a mutation file and params file
    Format(Box<FormatSettings>),
    /// Filters, reorders, or rescales an existing mutation file
    ModifySsm(Box<ModifySsmSettings>),
    /// Adds or removes samples from a population manifest
    ModifyPop(Box<ModifyPopSettings>),
    /// Imports clustering results into a params file
    ImportClusters(Box<ImportClustersSettings>),
    /// Splits source data rows into per-cluster files
    SplitData(Box<SplitDataSettings>)
}

pub fn get_cli() -> Cli {
    Cli::parse()
}

/// Checks if a file exists
/// # Arguments
/// * `filename` - the file path to check for
/// * `label` - the label to use for error messages
/// # Errors
/// * `ConfigurationError::MissingFile` if the path does not exist
pub fn check_required_filename(filename: &Path, label: &str) -> anyhow::Result<()> {
    if !filename.exists() {
        return Err(ConfigurationError::MissingFile {
            label: label.to_string(),
            path: filename.display().to_string()
        }.into());
    }

    // file exists
    Ok(())
}

/// Checks if an optional file exists
/// # Arguments
/// * `opt_filename` - the file path to check for, if provided
/// * `label` - the label to use for error messages
/// # Errors
/// * `ConfigurationError::MissingFile` if the path was provided but does not exist
pub fn check_optional_filename(opt_filename: Option<&Path>, label: &str) -> anyhow::Result<()> {
    if let Some(filename) = opt_filename {
        check_required_filename(filename, label)?;
    }

    // file either was not specified OR it exists
    Ok(())
}

/// Prefixes a path with a directory; absolute paths and an unset directory leave it unchanged
pub fn prefix_directory(directory: Option<&Path>, filename: &Path) -> PathBuf {
    match directory {
        Some(dir) if filename.is_relative() => dir.join(filename),
        _ => filename.to_path_buf()
    }
}

/// Checks that a parallel list has the same length as the primary list
/// # Errors
/// * `ConfigurationError::CountMismatch` on a length mismatch
pub fn check_parallel_count(label: &str, found: usize, expected_label: &str, expected: usize) -> Result<(), ConfigurationError> {
    if found != expected {
        return Err(ConfigurationError::CountMismatch {
            label: label.to_string(),
            found,
            expected_label: expected_label.to_string(),
            expected
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_directory() {
        let dir = PathBuf::from("data");
        assert_eq!(prefix_directory(Some(&dir), Path::new("a.tsv")), PathBuf::from("data/a.tsv"));
        assert_eq!(prefix_directory(Some(&dir), Path::new("/abs/a.tsv")), PathBuf::from("/abs/a.tsv"));
        assert_eq!(prefix_directory(None, Path::new("a.tsv")), PathBuf::from("a.tsv"));
    }

    #[test]
    fn test_required_filename() {
        let err = check_required_filename(Path::new("/nonexistent/file.tsv"), "Primary table").unwrap_err();
        assert!(matches!(err.downcast_ref::<ConfigurationError>(), Some(ConfigurationError::MissingFile { .. })));
        assert!(check_optional_filename(None, "Calls table").is_ok());
    }

    #[test]
    fn test_parallel_count() {
        assert!(check_parallel_count("params file", 2, "mutation file", 2).is_ok());
        assert_eq!(
            check_parallel_count("params file", 1, "mutation file", 2),
            Err(ConfigurationError::CountMismatch {
                label: "params file".to_string(), found: 1,
                expected_label: "mutation file".to_string(), expected: 2
            })
        );
    }
}
