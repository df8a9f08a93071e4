
use crate::errors::DataIntegrityError;

/// Prefix for all generated mutation identifiers
pub const MUTATION_ID_PREFIX: &str = "s";

/// One row of a mutation file: a single locus with one value per sample in each vector
#[derive(Clone, Debug, PartialEq)]
pub struct MutationRecord {
    /// Generated identifier, `s<index>` in final row order
    id: String,
    /// Locus key or gene/position name
    name: String,
    /// Reads supporting the variant, per sample
    var_reads: Vec<u64>,
    /// Total reads (variant + reference), per sample
    total_reads: Vec<u64>,
    /// Probability of observing a variant read, per sample
    var_read_prob: Vec<f64>
}

impl MutationRecord {
    /// Constructor, ids are left blank until `assign_ids` is called
    /// # Errors
    /// * if the three vectors are not the same length
    pub fn new(name: String, var_reads: Vec<u64>, total_reads: Vec<u64>, var_read_prob: Vec<f64>) -> Result<Self, DataIntegrityError> {
        Self::with_id(String::new(), name, var_reads, total_reads, var_read_prob)
    }

    /// Constructor for a record that already has an identifier (e.g., loaded from file)
    /// # Errors
    /// * if the three vectors are not the same length
    pub fn with_id(id: String, name: String, var_reads: Vec<u64>, total_reads: Vec<u64>, var_read_prob: Vec<f64>) -> Result<Self, DataIntegrityError> {
        if var_reads.len() != total_reads.len() || var_reads.len() != var_read_prob.len() {
            return Err(DataIntegrityError::VectorLength {
                name,
                var_reads: var_reads.len(),
                total_reads: total_reads.len(),
                var_read_prob: var_read_prob.len()
            });
        }
        Ok(Self {
            id, name, var_reads, total_reads, var_read_prob
        })
    }

    /// Number of samples represented in this record
    pub fn num_samples(&self) -> usize {
        self.var_reads.len()
    }

    /// Iterates over var_reads / total_reads for each sample; zero totals yield 0.0
    pub fn vafs(&self) -> impl Iterator<Item = f64> + '_ {
        self.var_reads.iter().zip(self.total_reads.iter())
            .map(|(&v, &t)| if t == 0 { 0.0 } else { v as f64 / t as f64 })
    }

    // setters
    pub fn set_id(&mut self, id: String) {
        self.id = id;
    }

    /// Replaces the read counts, keeping the existing probabilities
    /// # Errors
    /// * if the new vectors do not match the current sample count
    pub fn set_counts(&mut self, var_reads: Vec<u64>, total_reads: Vec<u64>) -> Result<(), DataIntegrityError> {
        if var_reads.len() != self.num_samples() || total_reads.len() != self.num_samples() {
            return Err(DataIntegrityError::VectorLength {
                name: self.name.clone(),
                var_reads: var_reads.len(),
                total_reads: total_reads.len(),
                var_read_prob: self.var_read_prob.len()
            });
        }
        self.var_reads = var_reads;
        self.total_reads = total_reads;
        Ok(())
    }

    /// Overwrites every sample probability with the same value
    pub fn fill_var_read_prob(&mut self, prob: f64) {
        self.var_read_prob = vec![prob; self.var_reads.len()];
    }

    // getters
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn var_reads(&self) -> &[u64] {
        &self.var_reads
    }

    pub fn total_reads(&self) -> &[u64] {
        &self.total_reads
    }

    pub fn var_read_prob(&self) -> &[f64] {
        &self.var_read_prob
    }
}

/// Builds the identifier for the mutation at `index` in the final order
pub fn mutation_id(index: usize) -> String {
    format!("{MUTATION_ID_PREFIX}{index}")
}

/// Overwrites all ids with `s0, s1, ...` following the current row order.
/// Must be called after any step that changes the order of records.
pub fn assign_ids(records: &mut [MutationRecord]) {
    for (index, record) in records.iter_mut().enumerate() {
        record.set_id(mutation_id(index));
    }
}
