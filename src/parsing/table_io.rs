
use anyhow::Context;
use calamine::{open_workbook_auto, Data, Reader};
use log::{debug, warn};
use std::fs::File;
use std::path::Path;

use crate::data_types::table::{Cell, Table};
use crate::errors::ConfigurationError;

/// File extensions that are loaded through the spreadsheet reader
const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Returns true if the path looks like a spreadsheet workbook
pub fn is_spreadsheet(filename: &Path) -> bool {
    let ext = filename.extension().unwrap_or_default().to_string_lossy().to_ascii_lowercase();
    SPREADSHEET_EXTENSIONS.contains(&ext.as_str())
}

/// Delimiter for a delimited text file, "," for .csv and tab otherwise
fn delimiter_for(filename: &Path) -> u8 {
    let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
    if is_csv { b',' } else { b'\t' }
}

/// Loads a table from a spreadsheet or delimited text file.
/// # Arguments
/// * `filename` - path to the file; spreadsheets are detected by extension
/// * `sheet` - sheet name for spreadsheets, the first sheet is used if None; ignored for text files
/// * `header_row` - 0-based row holding the column names, rows above it are skipped; None means no header
/// # Errors
/// * if the file cannot be opened or parsed
/// * if the requested sheet does not exist
pub fn read_table(filename: &Path, sheet: Option<&str>, header_row: Option<usize>) -> anyhow::Result<Table> {
    let raw_rows = if is_spreadsheet(filename) {
        read_spreadsheet_rows(filename, sheet)?
    } else {
        read_delimited_rows(filename)?
    };
    debug!("Loaded {} raw rows from {filename:?}", raw_rows.len());
    Ok(rows_to_table(raw_rows, header_row))
}

/// Splits raw rows into a header and data, following the header row convention in `read_table`
fn rows_to_table(raw_rows: Vec<Vec<Cell>>, header_row: Option<usize>) -> Table {
    match header_row {
        Some(header_index) => {
            let mut row_iter = raw_rows.into_iter().skip(header_index);
            let columns: Vec<String> = row_iter.next()
                .unwrap_or_default()
                .iter()
                .map(|c| c.to_string())
                .collect();
            Table::new(columns, row_iter.collect())
        },
        None => Table::without_header(raw_rows)
    }
}

/// Loads all rows of one worksheet
fn read_spreadsheet_rows(filename: &Path, sheet: Option<&str>) -> anyhow::Result<Vec<Vec<Cell>>> {
    let mut workbook = open_workbook_auto(filename)
        .with_context(|| format!("Error while opening {filename:?}:"))?;

    let range = match sheet {
        Some(sheet_name) => {
            if !workbook.sheet_names().iter().any(|s| s == sheet_name) {
                return Err(ConfigurationError::MissingSheet {
                    path: filename.display().to_string(),
                    sheet: sheet_name.to_string()
                }.into());
            }
            workbook.worksheet_range(sheet_name)
                .with_context(|| format!("Error while reading sheet {sheet_name:?} from {filename:?}:"))?
        },
        None => {
            workbook.worksheet_range_at(0)
                .ok_or_else(|| ConfigurationError::MissingSheet {
                    path: filename.display().to_string(),
                    sheet: "<first>".to_string()
                })?
                .with_context(|| format!("Error while reading first sheet from {filename:?}:"))?
        }
    };

    let rows = range.rows()
        .map(|row| row.iter().map(data_to_cell).collect())
        .collect();
    Ok(rows)
}

/// Converts a workbook cell into our cell type
fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => {
            if f.is_nan() {
                Cell::Empty
            } else {
                Cell::Float(*f)
            }
        },
        Data::String(s) => Cell::parse(s),
        Data::Bool(b) => Cell::Text(b.to_string()),
        other => Cell::Text(other.to_string())
    }
}

/// Loads all rows of a delimited text file, without interpreting any header
fn read_delimited_rows(filename: &Path) -> anyhow::Result<Vec<Vec<Cell>>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_for(filename))
        .has_headers(false) // header handling is done by the caller
        .flexible(true)
        .from_path(filename)
        .with_context(|| format!("Error while opening {filename:?}:"))?;

    let mut rows = vec![];
    for result in csv_reader.records() {
        let record = result.with_context(|| format!("Error while reading {filename:?}:"))?;
        rows.push(record.iter().map(Cell::parse).collect());
    }
    Ok(rows)
}

/// Writes a table as TSV/CSV; the delimiter is "," for .csv and tab otherwise.
/// Empty tables are skipped with a warning so that no partial file is left behind.
/// # Arguments
/// * `table` - the data to write
/// * `filename` - output path, must be .tsv/.csv/.txt (optionally with a sheet name, which is ignored)
/// * `sheet` - accepted for interface parity with spreadsheet sources, logged if provided
/// * `write_header` - if false, only the data rows are written
/// # Errors
/// * if the output is a spreadsheet format
/// * if opening or writing the file fails
pub fn write_table(table: &Table, filename: &Path, sheet: Option<&str>, write_header: bool) -> anyhow::Result<()> {
    if is_spreadsheet(filename) {
        return Err(ConfigurationError::UnsupportedOutput { path: filename.display().to_string() }.into());
    }
    if let Some(sheet_name) = sheet {
        debug!("Sheet name {sheet_name:?} is not used for delimited output {filename:?}");
    }
    if table.is_empty() {
        warn!("Table for {filename:?} is empty, skipping write");
        return Ok(());
    }
    write_delimited(table, filename, write_header)
}

/// Writes a table as TSV/CSV with its header, even when it has no rows.
/// Used for outputs whose presence is meaningful on its own, such as an empty cluster.
/// # Errors
/// * if the output is a spreadsheet format
/// * if opening or writing the file fails
pub fn write_table_allow_empty(table: &Table, filename: &Path) -> anyhow::Result<()> {
    if is_spreadsheet(filename) {
        return Err(ConfigurationError::UnsupportedOutput { path: filename.display().to_string() }.into());
    }
    write_delimited(table, filename, true)
}

fn write_delimited(table: &Table, filename: &Path, write_header: bool) -> anyhow::Result<()> {
    let mut csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
        .delimiter(delimiter_for(filename))
        .from_path(filename)
        .with_context(|| format!("Error while creating {filename:?}:"))?;

    if write_header {
        csv_writer.write_record(table.columns())
            .with_context(|| format!("Error while writing header to {filename:?}:"))?;
    }
    for row in table.rows() {
        csv_writer.write_record(row.iter().map(|c| c.to_string()))
            .with_context(|| format!("Error while writing to {filename:?}:"))?;
    }
    csv_writer.flush()
        .with_context(|| format!("Error while flushing output to {filename:?}:"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use crate::parsing::manifest::manifest_from_table;
    use crate::parsing::schema::{normalize_table, SourceSchema};

    #[test]
    fn test_delimited_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let filename = dir.path().join("table.tsv");
        let table = Table::new(
            vec!["Chr".to_string(), "Position".to_string(), "VAF".to_string()],
            vec![
                vec![Cell::from("chr1"), Cell::Int(100), Cell::Float(0.25)],
                vec![Cell::from("chr2"), Cell::Int(7), Cell::Empty],
            ]
        );
        write_table(&table, &filename, None, true).unwrap();
        let loaded = read_table(&filename, None, Some(0)).unwrap();
        assert_eq!(loaded.columns(), table.columns());
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.rows()[0][0].as_text(), Some("chr1".to_string()));
        assert_eq!(loaded.rows()[0][1].as_i64(), Some(100));
        assert_eq!(loaded.rows()[0][2].as_f64(), Some(0.25));
        assert_eq!(loaded.rows()[1][2], Cell::Empty);
    }

    #[test]
    fn test_numeric_sample_names_kept() {
        let dir = tempfile::tempdir().unwrap();
        let primary_filename = dir.path().join("primary.tsv");
        let mut fp = File::create(&primary_filename).unwrap();
        writeln!(fp, "Chr\tPosition\trefDepth\taltDepth\tsampleNames\tVAF\tgene").unwrap();
        writeln!(fp, "chr1\t100\t10\t5\t007\t0.33\tG1").unwrap();
        writeln!(fp, "chr1\t100\t8\t2\t7\t0.2\tG1").unwrap();
        drop(fp);

        let manifest_filename = dir.path().join("samples.tsv");
        let mut fp = File::create(&manifest_filename).unwrap();
        writeln!(fp, "007").unwrap();
        writeln!(fp, "7").unwrap();
        writeln!(fp, "1.10").unwrap();
        drop(fp);

        let primary = read_table(&primary_filename, None, Some(0)).unwrap();
        let records = normalize_table(&primary, &SourceSchema::primary()).unwrap();
        assert_eq!(records[0].sample(), "007");
        assert_eq!(records[1].sample(), "7");
        assert_eq!(records[0].ref_depth(), Some(10));

        let manifest = read_table(&manifest_filename, None, None).unwrap();
        assert_eq!(manifest_from_table(&manifest).unwrap(), vec!["007", "7", "1.10"]);
    }

    #[test]
    fn test_header_offset_and_headerless() {
        let dir = tempfile::tempdir().unwrap();
        let filename = dir.path().join("table.csv");
        let mut fp = File::create(&filename).unwrap();
        writeln!(fp, "junk line").unwrap();
        writeln!(fp, "a,b").unwrap();
        writeln!(fp, "1,x").unwrap();
        drop(fp);

        let with_offset = read_table(&filename, None, Some(1)).unwrap();
        assert_eq!(with_offset.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(with_offset.rows(), &[vec![Cell::from("1"), Cell::from("x")]]);

        let headerless = read_table(&filename, None, None).unwrap();
        assert_eq!(headerless.len(), 3);
        assert_eq!(headerless.columns()[0], "0");
    }

    #[test]
    fn test_spreadsheet_output_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let table = Table::new(vec!["a".to_string()], vec![vec![Cell::Int(1)]]);
        let err = write_table(&table, &dir.path().join("out.xlsx"), Some("Sheet1"), true).unwrap_err();
        assert!(err.downcast_ref::<ConfigurationError>().is_some());
    }

    #[test]
    fn test_empty_table_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let filename = dir.path().join("empty.tsv");
        let table = Table::new(vec!["a".to_string()], vec![]);
        write_table(&table, &filename, None, true).unwrap();
        assert!(!filename.exists());
    }
}
