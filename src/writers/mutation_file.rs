
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

use crate::data_types::mutation::MutationRecord;

/// Separator between the per-sample values of one vector column
pub const VECTOR_SEPARATOR: &str = ", ";

/// Contains all the data written to each row of a mutation file; column order is fixed by field order
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MutationFileRow {
    /// Generated id, `s<index>`
    pub id: String,
    /// Locus key or gene/position name
    pub name: String,
    /// Variant read counts, joined by ", "
    pub var_reads: String,
    /// Total read counts, joined by ", "
    pub total_reads: String,
    /// Variant read probabilities, joined by ", "
    pub var_read_prob: String
}

impl MutationFileRow {
    /// Creates a new row from a formatted mutation
    pub fn new(record: &MutationRecord) -> Self {
        Self {
            id: record.id().to_string(),
            name: record.name().to_string(),
            var_reads: join_values(record.var_reads().iter().map(|v| v.to_string())),
            total_reads: join_values(record.total_reads().iter().map(|v| v.to_string())),
            var_read_prob: join_values(record.var_read_prob().iter().map(|&p| format_float(p)))
        }
    }
}

/// Joins already formatted values with the vector separator, no brackets
fn join_values(values: impl Iterator<Item = String>) -> String {
    values.collect::<Vec<String>>().join(VECTOR_SEPARATOR)
}

/// Formats a float so that whole numbers keep a trailing ".0" (e.g. "1.0", "0.5", "0.333")
pub fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Writes the records as a tab-separated mutation file with a header.
/// The delimiter is always a tab, regardless of extension.
/// # Arguments
/// * `records` - the final, id-assigned records in output order
/// * `filename` - the output path
/// # Errors
/// * if opening or writing to the file throw errors
pub fn write_mutation_file(records: &[MutationRecord], filename: &Path) -> anyhow::Result<()> {
    let mut csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(filename)
        .with_context(|| format!("Error while creating {filename:?}:"))?;

    if records.is_empty() {
        // csv only emits the header on the first serialize, so write it explicitly
        csv_writer.write_record(["id", "name", "var_reads", "total_reads", "var_read_prob"])
            .with_context(|| format!("Error while writing header to {filename:?}:"))?;
    }
    for record in records.iter() {
        csv_writer.serialize(MutationFileRow::new(record))
            .with_context(|| format!("Error while writing to {filename:?}:"))?;
    }
    csv_writer.flush()
        .with_context(|| format!("Error while flushing output to {filename:?}:"))?;
    Ok(())
}
