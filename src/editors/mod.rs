/*!
# Editors module
Independent utilities that operate on files this tool has already produced: mutation files, params files, and population manifests.
*/
/// Imports clustering results into a params file
pub mod clusters;
/// Union / difference edits on a population manifest
pub mod population;
/// Splits source data by cluster assignment
pub mod split;
/// Filters, reorders, and rescales mutation files
pub mod ssm;
