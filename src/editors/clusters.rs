
use indexmap::IndexMap;
use log::{debug, info};
use rustc_hash::FxHashMap as HashMap;

use crate::aggregator::most_frequent;
use crate::data_types::mutation::MutationRecord;
use crate::data_types::table::Table;
use crate::errors::{DataIntegrityError, SchemaError};

/// Column holding the cluster label in a clustering result
pub const COL_CLUSTER_ID: &str = "cluster_id";
/// Column holding the mutation name in a clustering result
pub const COL_MUTATION_ID: &str = "mutation_id";

/// Converts a clustering result into lists of mutation-file ids, one list per cluster.
/// Clusters keep their first-seen order, as do the mutations within each cluster.
/// # Arguments
/// * `table` - the clustering result with `cluster_id` and `mutation_id` columns, where `mutation_id` holds mutation names
/// * `records` - the mutation file the clustering was run on
/// # Errors
/// * `SchemaError::MissingColumn` if either column is absent
/// * `DataIntegrityError::UnknownMutation` if a name is not in the mutation file
pub fn import_clusters(table: &Table, records: &[MutationRecord]) -> anyhow::Result<Vec<Vec<String>>> {
    let find = |column: &str| {
        table.column_index(column)
            .ok_or_else(|| SchemaError::MissingColumn { table: "clusters".to_string(), column: column.to_string() })
    };
    let cluster_index = find(COL_CLUSTER_ID)?;
    let mutation_index = find(COL_MUTATION_ID)?;

    // a name can map to more than one id if the file has repeats, the most frequent id wins
    let mut ids_by_name: HashMap<&str, Vec<&str>> = Default::default();
    for record in records.iter() {
        ids_by_name.entry(record.name()).or_default().push(record.id());
    }

    let mut clusters: IndexMap<String, IndexMap<String, String>> = IndexMap::default();
    for row in table.rows() {
        let (Some(cluster), Some(name)) = (row[cluster_index].as_text(), row[mutation_index].as_text()) else {
            continue;
        };
        let members = clusters.entry(cluster).or_default();
        if members.contains_key(&name) {
            continue;
        }
        let id = ids_by_name.get(name.as_str())
            .and_then(|ids| most_frequent(ids.iter().copied()))
            .ok_or_else(|| DataIntegrityError::UnknownMutation { name: name.clone() })?;
        members.insert(name, id.to_string());
    }

    for (cluster, members) in clusters.iter() {
        debug!("Cluster {cluster}: {} mutations", members.len());
    }
    info!("Imported {} clusters", clusters.len());
    Ok(clusters.into_values()
        .map(|members| members.into_values().collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::mutation::assign_ids;
    use crate::data_types::table::Cell;

    fn records() -> Vec<MutationRecord> {
        let mut records: Vec<MutationRecord> = ["chr1_1", "chr1_2", "chr2_9"].iter()
            .map(|n| MutationRecord::new(n.to_string(), vec![1], vec![2], vec![0.5]).unwrap())
            .collect();
        assign_ids(&mut records);
        records
    }

    #[test]
    fn test_import_clusters() {
        let table = Table::new(
            vec!["cluster_id".to_string(), "mutation_id".to_string(), "sample".to_string()],
            vec![
                vec![Cell::Int(2), Cell::from("chr2_9"), Cell::from("a")],
                vec![Cell::Int(0), Cell::from("chr1_1"), Cell::from("a")],
                // repeated per sample in the clustering output
                vec![Cell::Int(2), Cell::from("chr2_9"), Cell::from("b")],
                vec![Cell::Int(0), Cell::from("chr1_2"), Cell::from("a")],
            ]
        );
        let clusters = import_clusters(&table, &records()).unwrap();
        assert_eq!(clusters, vec![
            vec!["s2".to_string()],
            vec!["s0".to_string(), "s1".to_string()],
        ]);
    }

    #[test]
    fn test_unknown_mutation() {
        let table = Table::new(
            vec!["cluster_id".to_string(), "mutation_id".to_string()],
            vec![vec![Cell::Int(0), Cell::from("chrX_1")]]
        );
        let err = import_clusters(&table, &records()).unwrap_err();
        assert_eq!(err.downcast_ref::<DataIntegrityError>(), Some(&DataIntegrityError::UnknownMutation { name: "chrX_1".to_string() }));

        let missing = Table::new(vec!["cluster_id".to_string()], vec![]);
        assert!(import_clusters(&missing, &records()).unwrap_err().downcast_ref::<SchemaError>().is_some());
    }
}
