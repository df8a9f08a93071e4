/*!
# Errors
The error categories raised by the pipeline.
Library functions return `anyhow::Result`, so callers recover the category with `downcast_ref`.
Verification findings are not errors and never show up here.
*/

/// A required column is missing from a source table, or one of its values cannot be interpreted.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SchemaError {
    #[error("{table} table is missing required column \"{column}\"")]
    MissingColumn { table: String, column: String },
    #[error("{table} table has an invalid value {value:?} in column \"{column}\" at row {row}")]
    InvalidValue { table: String, column: String, row: usize, value: String },
}

/// An invariant that aggregation or formatting depends on does not hold for the provided data.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DataIntegrityError {
    #[error("{table} table has more than one row for locus {locus} in sample {sample:?}")]
    DuplicateJoinKey { table: String, locus: String, sample: String },
    #[error("locus {locus} has no gene value in any sample")]
    MissingGene { locus: String },
    #[error("locus {locus} has no single most frequent name, candidates: {candidates:?}")]
    AmbiguousName { locus: String, candidates: Vec<String> },
    #[error("locus {locus} in sample {sample:?} has an invalid copy number: {copy_number}")]
    InvalidCopyNumber { locus: String, sample: String, copy_number: f64 },
    #[error("mutation {name:?} has mismatched vector lengths: {var_reads} var_reads, {total_reads} total_reads, {var_read_prob} var_read_prob")]
    VectorLength { name: String, var_reads: usize, total_reads: usize, var_read_prob: usize },
    #[error("mutation {name:?} is not present in the mutation file")]
    UnknownMutation { name: String },
    #[error("mutation id {id:?} is not present in the mutation file")]
    UnknownMutationId { id: String },
    #[error("mutation name {name:?} cannot be split into a label and a position")]
    MalformedName { name: String },
    #[error("mutation file row {row} has an invalid value {value:?} in column \"{column}\"")]
    InvalidMutationValue { row: usize, column: String, value: String },
}

/// Caller-supplied settings that are structurally invalid.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigurationError {
    #[error("population manifest contains no samples")]
    EmptyManifest,
    #[error("population manifest lists sample {sample:?} more than once")]
    DuplicateSample { sample: String },
    #[error("{label} does not exist: \"{path}\"")]
    MissingFile { label: String, path: String },
    #[error("{label} count ({found}) does not match {expected_label} count ({expected})")]
    CountMismatch { label: String, found: usize, expected_label: String, expected: usize },
    #[error("{method} requires argument: {argument}")]
    MissingArgument { method: String, argument: String },
    #[error("{method} received an invalid {argument}: {value:?}")]
    InvalidArgument { method: String, argument: String, value: String },
    #[error("unsupported output format for \"{path}\", expected .tsv, .csv, or .txt")]
    UnsupportedOutput { path: String },
    #[error("sheet {sheet:?} does not exist in \"{path}\"")]
    MissingSheet { path: String, sheet: String },
}
