
use log::info;
use std::path::Path;

use crate::data_types::records::AggregatedTable;
use crate::data_types::table::{Cell, Table};
use crate::parsing::schema::{COL_ALT_DEPTH, COL_CHR, COL_CHR_POS, COL_GENE, COL_POSITION, COL_REF_DEPTH, COL_SAMPLE_NAMES, COL_VAF};
use crate::parsing::table_io::write_table;

/// Column order of a persisted aggregated table
pub const AGGREGATED_COLUMNS: [&str; 8] = [COL_CHR, COL_POSITION, COL_REF_DEPTH, COL_ALT_DEPTH, COL_SAMPLE_NAMES, COL_VAF, COL_CHR_POS, COL_GENE];

/// Converts the aggregated records into a table with canonical column names, preserving record order
pub fn aggregated_to_table(aggregated: &AggregatedTable) -> Table {
    let columns = AGGREGATED_COLUMNS.iter().map(|c| c.to_string()).collect();
    let rows = aggregated.records().iter()
        .map(|r| vec![
            Cell::from(r.locus().chrom()),
            Cell::from(r.locus().position()),
            Cell::from(r.ref_depth()),
            Cell::from(r.alt_depth()),
            Cell::from(r.sample()),
            Cell::from(r.vaf()),
            Cell::from(r.locus().to_string()),
            Cell::from(r.gene()),
        ])
        .collect();
    Table::new(columns, rows)
}

/// Writes the full aggregated table; only called once the aggregation has completed.
/// # Arguments
/// * `aggregated` - the completed aggregation
/// * `filename` - output path (.tsv/.csv)
/// * `sheet` - optional sheet name, passed through to the table writer
/// # Errors
/// * if the output format is unsupported or writing fails
pub fn write_aggregated_table(aggregated: &AggregatedTable, filename: &Path, sheet: Option<&str>) -> anyhow::Result<()> {
    info!("Saving aggregated table to {filename:?}...");
    write_table(&aggregated_to_table(aggregated), filename, sheet, true)
}
