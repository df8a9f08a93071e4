
use anyhow::Context;
use log::debug;
use std::path::Path;

use crate::data_types::mutation::MutationRecord;
use crate::errors::DataIntegrityError;
use crate::writers::mutation_file::MutationFileRow;

/// Loads a tab-separated mutation file into records, keeping the stored ids.
/// # Arguments
/// * `filename` - the mutation file to load
/// # Errors
/// * if the file cannot be opened or a row is missing columns
/// * `DataIntegrityError::InvalidMutationValue` if a vector entry is not numeric
/// * `DataIntegrityError::VectorLength` if the vectors of a row differ in length
pub fn load_mutation_file(filename: &Path) -> anyhow::Result<Vec<MutationRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(filename)
        .with_context(|| format!("Error while opening {filename:?}:"))?;

    let mut records = vec![];
    for (row_index, result) in csv_reader.deserialize().enumerate() {
        let row: MutationFileRow = result
            .with_context(|| format!("Error while reading {filename:?}:"))?;
        records.push(parse_row(row, row_index)?);
    }
    debug!("Loaded {} mutations from {filename:?}", records.len());
    Ok(records)
}

/// Converts a raw row into a record
fn parse_row(row: MutationFileRow, row_index: usize) -> Result<MutationRecord, DataIntegrityError> {
    let var_reads = parse_counts(&row.var_reads, row_index, "var_reads")?;
    let total_reads = parse_counts(&row.total_reads, row_index, "total_reads")?;
    let var_read_prob = parse_values(&row.var_read_prob, row_index, "var_read_prob")?;
    MutationRecord::with_id(row.id, row.name, var_reads, total_reads, var_read_prob)
}

/// Splits a ", " joined vector into floats; an empty string is an empty vector
fn parse_values(raw: &str, row: usize, column: &str) -> Result<Vec<f64>, DataIntegrityError> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<f64>()
                .map_err(|_| DataIntegrityError::InvalidMutationValue { row, column: column.to_string(), value: v.to_string() })
        })
        .collect()
}

/// Same as `parse_values`, but each entry must be a non-negative whole number (e.g. "5" or "5.0")
fn parse_counts(raw: &str, row: usize, column: &str) -> Result<Vec<u64>, DataIntegrityError> {
    parse_values(raw, row, column)?
        .into_iter()
        .map(|v| {
            if v >= 0.0 && v.fract() == 0.0 {
                Ok(v as u64)
            } else {
                Err(DataIntegrityError::InvalidMutationValue { row, column: column.to_string(), value: v.to_string() })
            }
        })
        .collect()
}
