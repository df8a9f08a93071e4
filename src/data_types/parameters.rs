
use rustc_hash::FxHashMap as HashMap;
use serde::{Deserialize, Serialize};

use crate::data_types::mutation::MutationRecord;
use crate::errors::DataIntegrityError;

/// Metadata that accompanies a mutation file.
/// `samples` holds a single list of sample names matching the vector order of the mutation file.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Parameters {
    pub samples: Vec<Vec<String>>,
    /// Groups of mutation ids; a placeholder until downstream clustering replaces it
    pub clusters: Vec<Vec<String>>,
    /// Mutation ids flagged as not biologically meaningful
    #[serde(default)]
    pub garbage: Vec<String>
}

impl Parameters {
    /// Builds the placeholder parameters for a freshly formatted mutation table.
    /// Each sample gets one cluster holding the ids of mutations with variant reads in that sample.
    /// # Arguments
    /// * `samples` - sample names, in the same order as the mutation vectors
    /// * `records` - the final, id-assigned mutation records
    pub fn placeholder(samples: Vec<String>, records: &[MutationRecord]) -> Self {
        let clusters = (0..samples.len())
            .map(|sample_index| {
                records.iter()
                    .filter(|r| r.var_reads().get(sample_index).copied().unwrap_or(0) > 0)
                    .map(|r| r.id().to_string())
                    .collect()
            })
            .collect();

        Self {
            samples: vec![samples],
            clusters,
            garbage: vec![]
        }
    }

    /// Rewrites every id in clusters and garbage using the provided old -> new lookup.
    /// # Errors
    /// * if an id is not in the lookup
    pub fn remap_ids(&mut self, lookup: &HashMap<String, String>) -> Result<(), DataIntegrityError> {
        let remap = |id: &String| -> Result<String, DataIntegrityError> {
            lookup.get(id)
                .cloned()
                .ok_or_else(|| DataIntegrityError::UnknownMutationId { id: id.clone() })
        };

        self.clusters = self.clusters.iter()
            .map(|cluster| cluster.iter().map(remap).collect::<Result<Vec<_>, _>>())
            .collect::<Result<_, _>>()?;
        self.garbage = self.garbage.iter()
            .map(remap)
            .collect::<Result<_, _>>()?;
        Ok(())
    }
}
