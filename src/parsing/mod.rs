/*!
# Parsing module
Contains the logic for loading input tables and normalizing them into meaningful structs / data.
*/
/// Loads the ordered sample list from a population table
pub mod manifest;
/// Loads persisted mutation files
pub mod mutation_file;
/// Column alias mapping from source tables into the shared vocabulary
pub mod schema;
/// Reading and writing of spreadsheet and delimited tables
pub mod table_io;
