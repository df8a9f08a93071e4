
use crate::data_types::locus::LocusKey;

/// One normalized row from a primary or calls source
#[derive(Clone, Debug, PartialEq)]
pub struct VariantRecord {
    /// The site this observation is for
    locus: LocusKey,
    /// Sample name, with any file suffix already stripped
    sample: String,
    /// Reads supporting the reference allele
    ref_depth: Option<u64>,
    /// Reads supporting the alternate allele
    alt_depth: Option<u64>,
    /// Variant allele frequency as reported by the source, range: [0, 1]
    vaf: Option<f64>,
    /// Gene annotation, only available in the primary source
    gene: Option<String>
}

impl VariantRecord {
    /// Constructor
    pub fn new(
        locus: LocusKey, sample: String,
        ref_depth: Option<u64>, alt_depth: Option<u64>,
        vaf: Option<f64>, gene: Option<String>
    ) -> Self {
        Self {
            locus, sample, ref_depth, alt_depth, vaf, gene
        }
    }

    /// The (locus, sample) pair that joins are performed on
    pub fn join_key(&self) -> (&LocusKey, &str) {
        (&self.locus, &self.sample)
    }

    // getters
    pub fn locus(&self) -> &LocusKey {
        &self.locus
    }

    pub fn sample(&self) -> &str {
        &self.sample
    }

    pub fn ref_depth(&self) -> Option<u64> {
        self.ref_depth
    }

    pub fn alt_depth(&self) -> Option<u64> {
        self.alt_depth
    }

    pub fn vaf(&self) -> Option<f64> {
        self.vaf
    }

    pub fn gene(&self) -> Option<&str> {
        self.gene.as_deref()
    }
}

/// Tracks where the reference depth of an aggregated row came from
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, strum_macros::AsRefStr)]
pub enum DepthSource {
    #[strum(serialize = "primary")]
    Primary,
    #[strum(serialize = "calls")]
    Calls,
    #[strum(serialize = "imputed")]
    Imputed,
}

/// One (locus, sample) row of the dense aggregated table
#[derive(Clone, Debug, PartialEq)]
pub struct AggregatedRecord {
    locus: LocusKey,
    sample: String,
    ref_depth: u64,
    alt_depth: u64,
    vaf: f64,
    /// Gene resolved for the whole locus
    gene: String,
    /// Provenance of `ref_depth`
    depth_source: DepthSource
}

impl AggregatedRecord {
    /// Constructor
    pub fn new(
        locus: LocusKey, sample: String,
        ref_depth: u64, alt_depth: u64, vaf: f64,
        gene: String, depth_source: DepthSource
    ) -> Self {
        Self {
            locus, sample, ref_depth, alt_depth, vaf, gene, depth_source
        }
    }

    /// Total observed reads, alt + ref
    pub fn total_depth(&self) -> u64 {
        self.ref_depth + self.alt_depth
    }

    // getters
    pub fn locus(&self) -> &LocusKey {
        &self.locus
    }

    pub fn sample(&self) -> &str {
        &self.sample
    }

    pub fn ref_depth(&self) -> u64 {
        self.ref_depth
    }

    pub fn alt_depth(&self) -> u64 {
        self.alt_depth
    }

    pub fn vaf(&self) -> f64 {
        self.vaf
    }

    pub fn gene(&self) -> &str {
        &self.gene
    }

    pub fn depth_source(&self) -> DepthSource {
        self.depth_source
    }
}

/// The dense (locus x sample) result of an aggregation run.
/// Records are stored in sample blocks following manifest order; loci within a block follow `loci`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregatedTable {
    /// Manifest order
    samples: Vec<String>,
    /// Unique loci from the primary source, in first-seen order
    loci: Vec<LocusKey>,
    records: Vec<AggregatedRecord>
}

impl AggregatedTable {
    /// Constructor
    pub fn new(samples: Vec<String>, loci: Vec<LocusKey>, records: Vec<AggregatedRecord>) -> Self {
        Self {
            samples, loci, records
        }
    }

    /// Iterates over all records for a single sample
    pub fn sample_records<'a>(&'a self, sample: &'a str) -> impl Iterator<Item = &'a AggregatedRecord> + 'a {
        self.records.iter().filter(move |r| r.sample() == sample)
    }

    /// Number of records whose reference depth has the given provenance
    pub fn count_source(&self, source: DepthSource) -> usize {
        self.records.iter().filter(|r| r.depth_source() == source).count()
    }

    // getters
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn loci(&self) -> &[LocusKey] {
        &self.loci
    }

    pub fn records(&self) -> &[AggregatedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
