/*!
# CLI module
Command line interface functionality, one file per subcommand.
*/

/// The main CLI module that contains the top-level CLI parser and help text
pub mod core;
/// The aggregate CLI subcommand
pub mod aggregate;
/// The format CLI subcommand
pub mod format;
/// The import-clusters CLI subcommand
pub mod import_clusters;
/// The modify-pop CLI subcommand
pub mod modify_pop;
/// The modify-ssm CLI subcommand
pub mod modify_ssm;
/// The split-data CLI subcommand
pub mod split_data;
