/*!
# Writers module
Contains the logic for writing the aggregated table, the mutation file, and the aggregation report.
*/
/// Writes the canonical aggregated table
pub mod aggregated;
/// Writes the tab-delimited mutation file
pub mod mutation_file;
/// Report pages and the sinks that render them
pub mod report;
