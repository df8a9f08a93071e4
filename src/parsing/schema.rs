/*!
# Schema normalization
Maps the source-specific column names of a loaded table onto the shared vocabulary and converts each row into a typed `VariantRecord`.
The mapping is an immutable `SourceSchema` passed into each call; nothing here keeps state between tables.
*/
use log::debug;
use serde::Serialize;

use crate::data_types::locus::LocusKey;
use crate::data_types::observation::Observation;
use crate::data_types::records::VariantRecord;
use crate::data_types::table::{Cell, Table};
use crate::errors::SchemaError;

// canonical column names shared by every normalized table
pub const COL_CHR: &str = "Chr";
pub const COL_POSITION: &str = "Position";
pub const COL_REF_DEPTH: &str = "refDepth";
pub const COL_ALT_DEPTH: &str = "altDepth";
pub const COL_SAMPLE_NAMES: &str = "sampleNames";
pub const COL_VAF: &str = "VAF";
pub const COL_GENE: &str = "gene";
pub const COL_CHR_POS: &str = "chr_pos";

// calls-only aliases
pub const COL_SEQNAMES: &str = "seqnames";
pub const COL_START: &str = "start";

// sample-level aliases
pub const COL_SAMPLE_CHR: &str = "chr";
pub const COL_SAMPLE: &str = "sample";
pub const COL_TOTAL_DEPTH: &str = "totalDepth";
pub const COL_COPY_NUMBER: &str = "copyNumber";

/// File-naming suffix that the variant caller appends to sample names
pub const DEFAULT_SAMPLE_SUFFIX: &str = ".RAW.VarScan.txt";

/// Column aliases for one source table, mapping each canonical field to the name used in that source.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SourceSchema {
    /// Label used in error messages, e.g. "primary"
    label: String,
    chrom: String,
    position: String,
    ref_depth: String,
    alt_depth: String,
    sample: String,
    vaf: String,
    /// Gene column, None if this source does not carry one
    gene: Option<String>,
    /// Suffix removed from every sample name (exact, case-sensitive); empty disables stripping
    sample_suffix: String
}

impl SourceSchema {
    /// Aliases for the curated primary variant table
    pub fn primary() -> Self {
        Self {
            label: "primary".to_string(),
            chrom: COL_CHR.to_string(),
            position: COL_POSITION.to_string(),
            ref_depth: COL_REF_DEPTH.to_string(),
            alt_depth: COL_ALT_DEPTH.to_string(),
            sample: COL_SAMPLE_NAMES.to_string(),
            vaf: COL_VAF.to_string(),
            gene: Some(COL_GENE.to_string()),
            sample_suffix: DEFAULT_SAMPLE_SUFFIX.to_string()
        }
    }

    /// Aliases for the raw caller output, which names chromosome/position differently and has no gene
    pub fn calls() -> Self {
        Self {
            label: "calls".to_string(),
            chrom: COL_SEQNAMES.to_string(),
            position: COL_START.to_string(),
            gene: None,
            ..Self::primary()
        }
    }

    /// Aliases for an aggregated table written by this tool; names are already canonical
    pub fn aggregated() -> Self {
        Self {
            label: "aggregated".to_string(),
            sample_suffix: String::new(),
            ..Self::primary()
        }
    }

    /// Returns a copy with a different sample suffix
    pub fn with_sample_suffix(mut self, suffix: &str) -> Self {
        self.sample_suffix = suffix.to_string();
        self
    }

    /// Returns the (alias, canonical) pairs this schema requires
    pub fn required_aliases(&self) -> Vec<(&str, &'static str)> {
        let mut aliases = vec![
            (self.chrom.as_str(), COL_CHR),
            (self.position.as_str(), COL_POSITION),
            (self.ref_depth.as_str(), COL_REF_DEPTH),
            (self.alt_depth.as_str(), COL_ALT_DEPTH),
            (self.sample.as_str(), COL_SAMPLE_NAMES),
            (self.vaf.as_str(), COL_VAF),
        ];
        if let Some(gene) = self.gene.as_deref() {
            aliases.push((gene, COL_GENE));
        }
        aliases
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn sample_suffix(&self) -> &str {
        &self.sample_suffix
    }
}

/// Removes every exact (case-sensitive) occurrence of the file suffix from a sample name.
pub fn strip_sample_suffix(sample: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        return sample.to_string();
    }
    sample.replace(suffix, "")
}

/// Column positions resolved for one table
struct ColumnIndices {
    chrom: usize,
    position: usize,
    ref_depth: usize,
    alt_depth: usize,
    sample: usize,
    vaf: usize,
    gene: Option<usize>
}

/// Normalizes a loaded table into typed records using the provided schema.
/// Rows with an entirely empty chromosome/position/sample are skipped (trailing blank spreadsheet rows).
/// # Arguments
/// * `table` - the raw table
/// * `schema` - the aliases for this source
/// # Errors
/// * `SchemaError::MissingColumn` if a required alias is absent
/// * `SchemaError::InvalidValue` if a position/depth/VAF value cannot be interpreted
pub fn normalize_table(table: &Table, schema: &SourceSchema) -> anyhow::Result<Vec<VariantRecord>> {
    let label = schema.label();
    let find = |alias: &str| -> Result<usize, SchemaError> {
        table.column_index(alias)
            .ok_or_else(|| SchemaError::MissingColumn { table: label.to_string(), column: alias.to_string() })
    };

    // verify everything up front so the error names the first missing alias
    for (alias, _canonical) in schema.required_aliases() {
        find(alias)?;
    }
    let indices = ColumnIndices {
        chrom: find(&schema.chrom)?,
        position: find(&schema.position)?,
        ref_depth: find(&schema.ref_depth)?,
        alt_depth: find(&schema.alt_depth)?,
        sample: find(&schema.sample)?,
        vaf: find(&schema.vaf)?,
        gene: schema.gene.as_deref().map(find).transpose()?
    };

    let mut records = Vec::with_capacity(table.len());
    for (row_index, row) in table.rows().iter().enumerate() {
        if row[indices.chrom].is_empty() && row[indices.position].is_empty() && row[indices.sample].is_empty() {
            continue;
        }

        let invalid = |column: &str, cell: &Cell| SchemaError::InvalidValue {
            table: label.to_string(),
            column: column.to_string(),
            row: row_index,
            value: cell.to_string()
        };

        let chrom = row[indices.chrom].as_text()
            .ok_or_else(|| invalid(&schema.chrom, &row[indices.chrom]))?;
        let position = required_count(&row[indices.position])
            .ok_or_else(|| invalid(&schema.position, &row[indices.position]))?;
        let sample = row[indices.sample].as_text()
            .ok_or_else(|| invalid(&schema.sample, &row[indices.sample]))?;
        let ref_depth = optional_count(&row[indices.ref_depth])
            .map_err(|_| invalid(&schema.ref_depth, &row[indices.ref_depth]))?;
        let alt_depth = optional_count(&row[indices.alt_depth])
            .map_err(|_| invalid(&schema.alt_depth, &row[indices.alt_depth]))?;
        let vaf = optional_float(&row[indices.vaf])
            .map_err(|_| invalid(&schema.vaf, &row[indices.vaf]))?;
        let gene = indices.gene.and_then(|gi| row[gi].as_text());

        records.push(VariantRecord::new(
            LocusKey::new(chrom, position),
            strip_sample_suffix(&sample, schema.sample_suffix()),
            ref_depth, alt_depth, vaf, gene
        ));
    }

    debug!("Normalized {} {label} records", records.len());
    Ok(records)
}

/// Parses a required non-negative integer
fn required_count(cell: &Cell) -> Option<u64> {
    cell.as_i64().and_then(|v| u64::try_from(v).ok())
}

/// Parses an optional non-negative integer, Err(()) if the cell has an unusable value
fn optional_count(cell: &Cell) -> Result<Option<u64>, ()> {
    if cell.is_empty() {
        Ok(None)
    } else {
        required_count(cell).map(Some).ok_or(())
    }
}

/// Parses an optional float, Err(()) if the cell has a non-numeric value
fn optional_float(cell: &Cell) -> Result<Option<f64>, ()> {
    if cell.is_empty() {
        Ok(None)
    } else {
        cell.as_f64().map(Some).ok_or(())
    }
}

/// Column aliases for per-sample variant tables that carry total depth and copy number directly.
/// Gene and copy number are optional; all other columns are required.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SampleLevelSchema {
    pub chrom: String,
    pub position: String,
    pub sample: String,
    pub alt_depth: String,
    pub total_depth: String,
    pub copy_number: String,
    pub gene: String
}

impl Default for SampleLevelSchema {
    fn default() -> Self {
        Self {
            chrom: COL_SAMPLE_CHR.to_string(),
            position: COL_START.to_string(),
            sample: COL_SAMPLE.to_string(),
            alt_depth: COL_ALT_DEPTH.to_string(),
            total_depth: COL_TOTAL_DEPTH.to_string(),
            copy_number: COL_COPY_NUMBER.to_string(),
            gene: COL_GENE.to_string()
        }
    }
}

/// Normalizes a per-sample variant table into formatter observations.
/// # Arguments
/// * `table` - the raw table
/// * `schema` - the aliases for this table
/// # Errors
/// * `SchemaError::MissingColumn` if a required alias is absent
/// * `SchemaError::InvalidValue` if a position/depth/copy number value cannot be interpreted
pub fn normalize_sample_level(table: &Table, schema: &SampleLevelSchema) -> anyhow::Result<Vec<Observation>> {
    let label = "sample-level";
    let find = |alias: &str| -> Result<usize, SchemaError> {
        table.column_index(alias)
            .ok_or_else(|| SchemaError::MissingColumn { table: label.to_string(), column: alias.to_string() })
    };
    let chrom_index = find(&schema.chrom)?;
    let position_index = find(&schema.position)?;
    let sample_index = find(&schema.sample)?;
    let alt_index = find(&schema.alt_depth)?;
    let total_index = find(&schema.total_depth)?;
    let copy_number_index = table.column_index(&schema.copy_number);
    let gene_index = table.column_index(&schema.gene);
    if copy_number_index.is_none() {
        debug!("No {:?} column, assuming diploid", schema.copy_number);
    }

    let mut observations = Vec::with_capacity(table.len());
    for (row_index, row) in table.rows().iter().enumerate() {
        if row[chrom_index].is_empty() && row[position_index].is_empty() && row[sample_index].is_empty() {
            continue;
        }

        let invalid = |column: &str, cell: &Cell| SchemaError::InvalidValue {
            table: label.to_string(),
            column: column.to_string(),
            row: row_index,
            value: cell.to_string()
        };

        let chrom = row[chrom_index].as_text()
            .ok_or_else(|| invalid(&schema.chrom, &row[chrom_index]))?;
        let position = required_count(&row[position_index])
            .ok_or_else(|| invalid(&schema.position, &row[position_index]))?;
        let sample = row[sample_index].as_text()
            .ok_or_else(|| invalid(&schema.sample, &row[sample_index]))?;
        let alt_depth = optional_count(&row[alt_index])
            .map_err(|_| invalid(&schema.alt_depth, &row[alt_index]))?;
        // totals below 1 are clamped by the formatter, so only reject non-integers here
        let total_depth = match row[total_index].as_i64() {
            Some(v) => Some(u64::try_from(v).unwrap_or(0)),
            None if row[total_index].is_empty() => None,
            None => return Err(invalid(&schema.total_depth, &row[total_index]).into())
        };
        let copy_number = match copy_number_index {
            Some(ci) => optional_float(&row[ci])
                .map_err(|_| invalid(&schema.copy_number, &row[ci]))?,
            None => None
        };
        let gene = gene_index.and_then(|gi| row[gi].as_text());

        observations.push(Observation::new(
            LocusKey::new(chrom, position), sample,
            alt_depth, total_depth, copy_number, gene
        ));
    }

    debug!("Normalized {} {label} observations", observations.len());
    Ok(observations)
}
