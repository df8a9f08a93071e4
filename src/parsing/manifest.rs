
use log::debug;
use rustc_hash::FxHashSet as HashSet;

use crate::data_types::table::Table;
use crate::errors::ConfigurationError;

/// Extracts the ordered sample list from a population table.
/// Only the first column is used; empty cells are skipped.
/// # Arguments
/// * `table` - the loaded population table
/// # Errors
/// * `ConfigurationError::EmptyManifest` if no sample names are present
/// * `ConfigurationError::DuplicateSample` if a sample is listed more than once
pub fn manifest_from_table(table: &Table) -> Result<Vec<String>, ConfigurationError> {
    if table.columns().is_empty() {
        return Err(ConfigurationError::EmptyManifest);
    }

    let mut seen: HashSet<String> = Default::default();
    let mut samples = vec![];
    for cell in table.column_cells(0) {
        let Some(sample) = cell.as_text() else {
            continue;
        };
        if !seen.insert(sample.clone()) {
            return Err(ConfigurationError::DuplicateSample { sample });
        }
        samples.push(sample);
    }

    if samples.is_empty() {
        return Err(ConfigurationError::EmptyManifest);
    }
    debug!("Loaded {} samples from manifest", samples.len());
    Ok(samples)
}

/// Builds a headerless single-column table from a sample list
pub fn manifest_to_table(samples: &[String]) -> Table {
    Table::without_header(samples.iter().map(|s| vec![s.as_str().into()]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::table::Cell;

    #[test]
    fn test_manifest() {
        let table = Table::without_header(vec![
            vec![Cell::from("S2"), Cell::from("ignored")],
            vec![Cell::Empty],
            vec![Cell::from("S1")],
            vec![Cell::Int(7)],
        ]);
        assert_eq!(manifest_from_table(&table).unwrap(), vec!["S2", "S1", "7"]);
    }

    #[test]
    fn test_manifest_errors() {
        let empty = Table::without_header(vec![vec![Cell::Empty]]);
        assert_eq!(manifest_from_table(&empty), Err(ConfigurationError::EmptyManifest));

        let dup = Table::without_header(vec![vec![Cell::from("S1")], vec![Cell::from("S1")]]);
        assert_eq!(manifest_from_table(&dup), Err(ConfigurationError::DuplicateSample { sample: "S1".to_string() }));
    }

    #[test]
    fn test_manifest_round_trip() {
        let samples = vec!["a".to_string(), "b".to_string()];
        let table = manifest_to_table(&samples);
        assert_eq!(manifest_from_table(&table).unwrap(), samples);
    }
}
