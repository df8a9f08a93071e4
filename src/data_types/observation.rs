
use crate::data_types::locus::LocusKey;
use crate::data_types::records::{AggregatedRecord, VariantRecord};

/// One (locus, sample) input row for the mutation-file formatter.
/// Counts are left optional so the formatter can apply its own defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    locus: LocusKey,
    sample: String,
    /// Reads supporting the variant
    alt_depth: Option<u64>,
    /// Variant + reference reads
    total_depth: Option<u64>,
    /// Local copy number, diploid is assumed when absent
    copy_number: Option<f64>,
    gene: Option<String>
}

impl Observation {
    /// Constructor
    pub fn new(
        locus: LocusKey, sample: String,
        alt_depth: Option<u64>, total_depth: Option<u64>,
        copy_number: Option<f64>, gene: Option<String>
    ) -> Self {
        Self {
            locus, sample, alt_depth, total_depth, copy_number, gene
        }
    }

    // getters
    pub fn locus(&self) -> &LocusKey {
        &self.locus
    }

    pub fn sample(&self) -> &str {
        &self.sample
    }

    pub fn alt_depth(&self) -> Option<u64> {
        self.alt_depth
    }

    pub fn total_depth(&self) -> Option<u64> {
        self.total_depth
    }

    pub fn copy_number(&self) -> Option<f64> {
        self.copy_number
    }

    pub fn gene(&self) -> Option<&str> {
        self.gene.as_deref()
    }
}

impl From<&AggregatedRecord> for Observation {
    fn from(record: &AggregatedRecord) -> Self {
        Self::new(
            record.locus().clone(),
            record.sample().to_string(),
            Some(record.alt_depth()),
            Some(record.total_depth()),
            None,
            Some(record.gene().to_string())
        )
    }
}

impl From<&VariantRecord> for Observation {
    /// Used when an aggregated table is loaded back from disk; total is only known if reference depth is
    fn from(record: &VariantRecord) -> Self {
        let total_depth = record.ref_depth()
            .map(|r| r + record.alt_depth().unwrap_or(0));
        Self::new(
            record.locus().clone(),
            record.sample().to_string(),
            record.alt_depth(),
            total_depth,
            None,
            record.gene().map(String::from)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::records::DepthSource;

    #[test]
    fn test_conversions() {
        let aggregated = AggregatedRecord::new(LocusKey::new("chr1", 5), "s1".to_string(), 7, 3, 0.3, "G".to_string(), DepthSource::Primary);
        let obs = Observation::from(&aggregated);
        assert_eq!(obs.alt_depth(), Some(3));
        assert_eq!(obs.total_depth(), Some(10));
        assert_eq!(obs.copy_number(), None);

        let variant = VariantRecord::new(LocusKey::new("chr1", 5), "s1".to_string(), None, Some(3), None, None);
        let obs = Observation::from(&variant);
        assert_eq!(obs.total_depth(), None);
        assert_eq!(obs.gene(), None);
    }
}
