use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{debug, info};
use rustc_hash::FxHashMap as HashMap;

use crate::data_types::mutation::MutationRecord;
use crate::data_types::parameters::Parameters;
use crate::data_types::table::{Cell, Table};
use crate::errors::{ConfigurationError, DataIntegrityError, SchemaError};
use crate::formatter::NameConvention;
use crate::parsing::table_io::write_table_allow_empty;

/// Output name for the garbage group
pub const GARBAGE_FILENAME: &str = "garbage.txt";

/// Columns used to match source data rows against mutation names
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SplitColumns {
    pub chrom: String,
    pub position: String,
    pub gene: String
}

impl Default for SplitColumns {
    fn default() -> Self {
        Self {
            chrom: "chr".to_string(),
            position: "start".to_string(),
            gene: "gene".to_string()
        }
    }
}

/// One output group of source rows
#[derive(Clone, Debug, PartialEq)]
pub struct SplitGroup {
    /// e.g. "cluster1.txt" or "garbage.txt"
    pub filename: String,
    pub table: Table
}

/// Output name for a cluster, 1-based
pub fn cluster_filename(cluster_index: usize) -> String {
    format!("cluster{}.txt", cluster_index + 1)
}

/// Splits a mutation name into its label (chromosome or gene) and position
fn split_name(name: &str) -> Result<(&str, u64), DataIntegrityError> {
    name.rsplit_once('_')
        .and_then(|(label, pos)| pos.parse::<u64>().ok().map(|p| (label, p)))
        .ok_or_else(|| DataIntegrityError::MalformedName { name: name.to_string() })
}

/// Gathers the source data rows behind every cluster and the garbage list.
/// Rows are emitted in cluster member order, and a mutation can pull in multiple rows (one per sample).
/// # Arguments
/// * `records` - the mutation file the params refer to
/// * `parameters` - clusters and garbage ids
/// * `data` - the source data table the mutation file was built from
/// * `convention` - whether names are `<chrom>_<pos>` or `<gene>_<pos>`
/// * `columns` - data columns used for matching
/// # Errors
/// * `SchemaError::MissingColumn` if a matching column is absent
/// * `DataIntegrityError::UnknownMutationId` if a params id is not in the mutation file
/// * `DataIntegrityError::MalformedName` if a mutation name has no trailing position
pub fn split_by_clusters(
    records: &[MutationRecord], parameters: &Parameters, data: &Table,
    convention: NameConvention, columns: &SplitColumns
) -> anyhow::Result<Vec<SplitGroup>> {
    let label_column = match convention {
        NameConvention::LocusKey => &columns.chrom,
        NameConvention::GenePosition => &columns.gene
    };
    let find = |column: &str| {
        data.column_index(column)
            .ok_or_else(|| SchemaError::MissingColumn { table: "data".to_string(), column: column.to_string() })
    };
    let label_index = find(label_column.as_str())?;
    let position_index = find(columns.position.as_str())?;

    // (label, position) -> row indices in the data table
    let mut data_lookup: HashMap<(String, u64), Vec<usize>> = Default::default();
    for (row_index, row) in data.rows().iter().enumerate() {
        let label = row[label_index].as_text();
        let position = row[position_index].as_i64().and_then(|p| u64::try_from(p).ok());
        if let (Some(label), Some(position)) = (label, position) {
            data_lookup.entry((label, position)).or_default().push(row_index);
        }
    }

    let names_by_id: HashMap<&str, &str> = records.iter()
        .map(|r| (r.id(), r.name()))
        .collect();

    let gather = |ids: &[String]| -> anyhow::Result<Table> {
        let mut rows: Vec<Vec<Cell>> = vec![];
        for id in ids.iter() {
            let name = names_by_id.get(id.as_str())
                .ok_or_else(|| DataIntegrityError::UnknownMutationId { id: id.clone() })?;
            let (label, position) = split_name(name)?;
            match data_lookup.get(&(label.to_string(), position)) {
                Some(indices) => rows.extend(indices.iter().map(|&i| data.rows()[i].clone())),
                None => debug!("No data rows for mutation {id} ({name})")
            }
        }
        Ok(Table::new(data.columns().to_vec(), rows))
    };

    let mut groups = Vec::with_capacity(parameters.clusters.len() + 1);
    for (cluster_index, cluster) in parameters.clusters.iter().enumerate() {
        groups.push(SplitGroup {
            filename: cluster_filename(cluster_index),
            table: gather(cluster)?
        });
    }
    groups.push(SplitGroup {
        filename: GARBAGE_FILENAME.to_string(),
        table: gather(&parameters.garbage)?
    });

    info!("Split {} data rows into {} clusters and garbage", data.len(), parameters.clusters.len());
    Ok(groups)
}

/// Pairs each input with its directory prefix; a single directory is shared by every input.
/// # Arguments
/// * `label` - name of the input list, used in errors
/// * `count` - the number of inputs
/// * `directories` - one shared directory or one per input; empty means the working directory
/// # Errors
/// * `ConfigurationError::CountMismatch` if there is more than one directory but not one per input
pub fn pair_directories(label: &str, count: usize, directories: &[PathBuf]) -> Result<Vec<PathBuf>, ConfigurationError> {
    match directories.len() {
        0 => Ok(vec![PathBuf::new(); count]),
        1 => Ok(vec![directories[0].clone(); count]),
        n if n == count => Ok(directories.to_vec()),
        n => Err(ConfigurationError::CountMismatch {
            label: format!("{label} directory"),
            found: n,
            expected_label: label.to_string(),
            expected: count
        })
    }
}

/// Writes every group into `output_folder` as a tab-separated file.
/// Empty groups are still written with just the header, so each cluster always has a file.
/// # Errors
/// * if the folder cannot be created or a file cannot be written
pub fn write_split_groups(groups: &[SplitGroup], output_folder: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(output_folder)
        .with_context(|| format!("Error while creating {output_folder:?}:"))?;
    for group in groups.iter() {
        let filename = output_folder.join(&group.filename);
        info!("\tSaving {} rows to {filename:?}...", group.table.len());
        write_table_allow_empty(&group.table, &filename)?;
    }
    Ok(())
}

/// Output folder for a data file: the file stem, placed under `output_dir`
pub fn split_output_dir(output_dir: &Path, data_filename: &Path) -> PathBuf {
    let stem = data_filename.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "split".to_string());
    output_dir.join(stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::mutation::assign_ids;

    fn records(names: &[&str]) -> Vec<MutationRecord> {
        let mut records: Vec<MutationRecord> = names.iter()
            .map(|n| MutationRecord::new(n.to_string(), vec![1], vec![2], vec![0.5]).unwrap())
            .collect();
        assign_ids(&mut records);
        records
    }

    fn data() -> Table {
        Table::new(
            vec!["chr".to_string(), "start".to_string(), "sample".to_string(), "gene".to_string()],
            vec![
                vec![Cell::from("chr1"), Cell::Int(10), Cell::from("a"), Cell::from("G1")],
                vec![Cell::from("chr1"), Cell::Int(10), Cell::from("b"), Cell::from("G1")],
                vec![Cell::from("chr2"), Cell::Int(5), Cell::from("a"), Cell::from("G2")],
                vec![Cell::from("chr3"), Cell::Int(1), Cell::from("a"), Cell::from("G3")],
            ]
        )
    }

    #[test]
    fn test_split_locus_names() {
        let records = records(&["chr1_10", "chr2_5", "chr3_1"]);
        let parameters = Parameters {
            samples: vec![vec!["a".to_string(), "b".to_string()]],
            clusters: vec![vec!["s1".to_string()], vec!["s0".to_string()]],
            garbage: vec!["s2".to_string()]
        };
        let groups = split_by_clusters(&records, &parameters, &data(), NameConvention::LocusKey, &SplitColumns::default()).unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].filename, "cluster1.txt");
        assert_eq!(groups[0].table.len(), 1);
        assert_eq!(groups[1].table.len(), 2);
        assert_eq!(groups[2].filename, GARBAGE_FILENAME);
        assert_eq!(groups[2].table.rows()[0][0], Cell::from("chr3"));
    }

    #[test]
    fn test_split_gene_names() {
        let records = records(&["G1_10", "G2_5"]);
        let parameters = Parameters {
            samples: vec![],
            clusters: vec![vec!["s0".to_string(), "s1".to_string()]],
            garbage: vec![]
        };
        let groups = split_by_clusters(&records, &parameters, &data(), NameConvention::GenePosition, &SplitColumns::default()).unwrap();
        assert_eq!(groups[0].table.len(), 3);
        assert!(groups[1].table.is_empty());
    }

    #[test]
    fn test_split_errors() {
        let parameters = Parameters { clusters: vec![vec!["s7".to_string()]], ..Default::default() };
        let err = split_by_clusters(&records(&["chr1_10"]), &parameters, &data(), NameConvention::LocusKey, &SplitColumns::default()).unwrap_err();
        assert_eq!(err.downcast_ref::<DataIntegrityError>(), Some(&DataIntegrityError::UnknownMutationId { id: "s7".to_string() }));

        let parameters = Parameters { clusters: vec![vec!["s0".to_string()]], ..Default::default() };
        let err = split_by_clusters(&records(&["nonsense"]), &parameters, &data(), NameConvention::LocusKey, &SplitColumns::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<DataIntegrityError>(), Some(DataIntegrityError::MalformedName { .. })));
    }

    #[test]
    fn test_pair_directories() {
        let shared = vec![PathBuf::from("d")];
        assert_eq!(pair_directories("mutation file", 2, &shared).unwrap(), vec![PathBuf::from("d"), PathBuf::from("d")]);
        let each = vec![PathBuf::from("a"), PathBuf::from("b")];
        assert_eq!(pair_directories("mutation file", 2, &each).unwrap(), each);
        assert_eq!(pair_directories("mutation file", 2, &[]).unwrap(), vec![PathBuf::new(), PathBuf::new()]);
        assert!(matches!(
            pair_directories("mutation file", 3, &each),
            Err(ConfigurationError::CountMismatch { found: 2, expected: 3, .. })
        ));
    }

    #[test]
    fn test_write_split_groups() {
        let records = records(&["chr1_10", "chr2_5"]);
        let parameters = Parameters {
            samples: vec![],
            clusters: vec![vec!["s0".to_string()], vec![]],
            garbage: vec![]
        };
        let groups = split_by_clusters(&records, &parameters, &data(), NameConvention::LocusKey, &SplitColumns::default()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("patient1");
        write_split_groups(&groups, &folder).unwrap();

        let cluster1 = std::fs::read_to_string(folder.join("cluster1.txt")).unwrap();
        assert_eq!(cluster1.lines().count(), 3);
        // empty cluster and garbage still get a header-only file
        let cluster2 = std::fs::read_to_string(folder.join("cluster2.txt")).unwrap();
        assert_eq!(cluster2.trim_end(), "chr\tstart\tsample\tgene");
        let garbage = std::fs::read_to_string(folder.join(GARBAGE_FILENAME)).unwrap();
        assert_eq!(garbage.lines().count(), 1);
    }

    #[test]
    fn test_split_output_dir() {
        assert_eq!(split_output_dir(Path::new("out"), Path::new("inputs/patient1.tsv")), PathBuf::from("out/patient1"));
    }
}
