
/// Reconciles primary variants, raw calls, and the population manifest into one dense table
pub mod aggregator;
/// Command line interface functionality
pub mod cli;
/// Contains various shared data types
pub mod data_types;
/// Post-hoc edits on mutation files, params files, and manifests
pub mod editors;
/// Typed error categories
pub mod errors;
/// Converts per-(locus, sample) observations into mutation-file records
pub mod formatter;
/// Tooling for parsing input files into meaningful structs / data
pub mod parsing;
/// Various utility functions that tend to be very generic
pub mod util;
/// Consistency checks on an aggregation and the report built from them
pub mod verifier;
/// All output writers
pub mod writers;
