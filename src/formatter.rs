/*!
# Formatter
Collapses per-sample observations into one mutation record per locus, with one vector entry per sample.

Each ingestion variant is an explicit, ordered list of `ProcessingStep`s.
Rows with a copy number of 0 have no variant-read probability and are dropped before grouping.
Ids are assigned last, after any sorting, so they always reflect the final row order.
*/
use derive_builder::Builder;
use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, info};
use serde::Serialize;
use strum_macros::EnumString;

use crate::data_types::locus::{classify_chromosome, ChromosomeClass, LocusKey};
use crate::data_types::mutation::{assign_ids, MutationRecord};
use crate::data_types::observation::Observation;
use crate::data_types::parameters::Parameters;
use crate::errors::DataIntegrityError;

/// Probability assumed for a non-sex chromosome when no copy number is provided
pub const DIPLOID_VAR_READ_PROB: f64 = 0.5;
/// Probability used for sex chromosomes and single-copy loci
pub const SINGLE_COPY_VAR_READ_PROB: f64 = 1.0;
/// Default for a missing total read count, also the floor for any total
pub const MIN_TOTAL_READS: u64 = 1;

/// Transformations applied to each input row, in the order listed by an `IngestionVariant`
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::Display)]
pub enum ProcessingStep {
    /// Stable sort of the input rows by sample name
    SortBySample,
    /// Per-row name from the naming convention
    Names,
    /// Variant read count, missing becomes 0
    VarReads,
    /// Total read count, missing becomes 1 and anything below 1 is raised to 1
    TotalReads,
    /// Copy-number aware probability, rows without one are dropped
    VarReadProb,
}

/// The shape of the formatter input
#[derive(Clone, Copy, Default, Debug, Eq, PartialEq, strum_macros::Display, EnumString, Serialize, clap::ValueEnum)]
pub enum IngestionVariant {
    /// The dense aggregated table; rows are already in manifest order
    #[default]
    #[strum(ascii_case_insensitive, serialize = "aggregated")]
    #[clap(name = "aggregated")]
    Aggregated,
    /// A per-sample variant table with total depth and copy number; output is sorted by chromosome and position
    #[strum(ascii_case_insensitive, serialize = "sample_level")]
    #[clap(name = "sample_level")]
    SampleLevel,
}

impl IngestionVariant {
    /// The ordered steps applied to each row
    pub fn steps(&self) -> &'static [ProcessingStep] {
        match self {
            IngestionVariant::Aggregated => &[
                ProcessingStep::Names, ProcessingStep::VarReads,
                ProcessingStep::TotalReads, ProcessingStep::VarReadProb
            ],
            IngestionVariant::SampleLevel => &[
                ProcessingStep::SortBySample, ProcessingStep::Names, ProcessingStep::VarReads,
                ProcessingStep::TotalReads, ProcessingStep::VarReadProb
            ]
        }
    }

    /// If true, output loci are sorted by (chromosome number, position)
    pub fn sorts_loci(&self) -> bool {
        matches!(self, IngestionVariant::SampleLevel)
    }
}

/// How each mutation is named
#[derive(Clone, Copy, Default, Debug, Eq, PartialEq, strum_macros::Display, EnumString, Serialize, clap::ValueEnum)]
pub enum NameConvention {
    /// `<chrom>_<position>`
    #[default]
    #[strum(ascii_case_insensitive, serialize = "locus")]
    #[clap(name = "locus")]
    LocusKey,
    /// `<gene>_<position>`, resolved per locus as the most frequent row name
    #[strum(ascii_case_insensitive, serialize = "gene")]
    #[clap(name = "gene")]
    GenePosition,
}

/// Controls the formatter
#[derive(Builder, Clone, Copy, Debug, Default)]
#[builder(default)]
pub struct FormatterConfig {
    ingestion_variant: IngestionVariant,
    name_convention: NameConvention
}

impl FormatterConfig {
    pub fn ingestion_variant(&self) -> IngestionVariant {
        self.ingestion_variant
    }

    pub fn name_convention(&self) -> NameConvention {
        self.name_convention
    }
}

/// A row while the steps are applied
#[derive(Clone, Debug)]
struct ProcessedRow<'a> {
    observation: &'a Observation,
    name: String,
    var_reads: u64,
    total_reads: u64,
    /// None means the row is dropped
    var_read_prob: Option<f64>
}

/// Computes the variant-read probability for a locus.
/// Returns Ok(None) if the row should be dropped.
/// # Arguments
/// * `locus` - the site, used for the chromosome class
/// * `sample` - used for error reporting
/// * `copy_number` - local copy number if known
/// # Errors
/// * `DataIntegrityError::InvalidCopyNumber` if the copy number is negative or not a number
pub fn var_read_prob(locus: &LocusKey, sample: &str, copy_number: Option<f64>) -> Result<Option<f64>, DataIntegrityError> {
    if let Some(cn) = copy_number {
        if cn.is_nan() || cn < 0.0 {
            return Err(DataIntegrityError::InvalidCopyNumber {
                locus: locus.to_string(), sample: sample.to_string(), copy_number: cn
            });
        }
        if cn == 0.0 {
            // the variant is not present at all
            return Ok(None);
        }
        if cn == 1.0 {
            // loss of heterozygosity of the reference allele
            return Ok(Some(SINGLE_COPY_VAR_READ_PROB));
        }
    }

    // mitochondrial and unplaced contigs are treated like autosomes
    let prob = match classify_chromosome(locus.chrom()) {
        ChromosomeClass::Sex => SINGLE_COPY_VAR_READ_PROB,
        ChromosomeClass::Autosome(_) | ChromosomeClass::Other => match copy_number {
            Some(cn) => round_to(1.0 / cn, 3),
            None => DIPLOID_VAR_READ_PROB
        }
    };
    Ok(Some(prob))
}

/// Rounds a value to a fixed number of decimals
fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Picks the single most frequent name from a group.
/// # Errors
/// * `DataIntegrityError::AmbiguousName` if two or more names share the highest count
fn resolve_name(locus: &LocusKey, names: &[&str]) -> Result<String, DataIntegrityError> {
    let counts = names.iter().copied().counts();
    let max_count = counts.values().copied().max().unwrap_or(0);
    let candidates: Vec<&str> = counts.iter()
        .filter(|(_name, &count)| count == max_count)
        .map(|(&name, _count)| name)
        .sorted()
        .collect();

    match candidates.as_slice() {
        [single] => Ok(single.to_string()),
        _ => Err(DataIntegrityError::AmbiguousName {
            locus: locus.to_string(),
            candidates: candidates.iter().map(|c| c.to_string()).collect()
        })
    }
}

/// Builds the mutation records and parameters for a set of observations.
/// # Arguments
/// * `observations` - per-sample input rows; for aggregated input these are in manifest order
/// * `config` - ingestion variant and naming convention
/// # Errors
/// * `DataIntegrityError::InvalidCopyNumber` for a negative copy number
/// * `DataIntegrityError::MissingGene` if gene naming is requested for a row without a gene
/// * `DataIntegrityError::AmbiguousName` if a locus has no single most frequent name
pub fn format_mutations(observations: &[Observation], config: FormatterConfig) -> anyhow::Result<(Vec<MutationRecord>, Parameters)> {
    let mut rows: Vec<ProcessedRow> = observations.iter()
        .map(|observation| ProcessedRow {
            observation,
            name: String::new(),
            var_reads: 0,
            total_reads: MIN_TOTAL_READS,
            var_read_prob: None
        })
        .collect();

    for step in config.ingestion_variant().steps() {
        debug!("Running {step}...");
        apply_step(*step, &mut rows, config.name_convention())?;
    }

    let before = rows.len();
    rows.retain(|r| r.var_read_prob.is_some());
    info!("Rows before / after dropping rows without a variant-read probability: {before} / {}", rows.len());

    // sample order follows the processed rows, which keeps it aligned with the vectors
    let samples: Vec<String> = rows.iter()
        .map(|r| r.observation.sample().to_string())
        .unique()
        .collect();

    let mut groups: IndexMap<&LocusKey, Vec<&ProcessedRow>> = IndexMap::default();
    for row in rows.iter() {
        groups.entry(row.observation.locus()).or_default().push(row);
    }

    let mut records: Vec<(&LocusKey, MutationRecord)> = Vec::with_capacity(groups.len());
    for (locus, group) in groups.iter() {
        let name = match config.name_convention() {
            NameConvention::LocusKey => locus.to_string(),
            NameConvention::GenePosition => {
                let names: Vec<&str> = group.iter().map(|r| r.name.as_str()).collect();
                resolve_name(locus, &names)?
            }
        };
        let record = MutationRecord::new(
            name,
            group.iter().map(|r| r.var_reads).collect(),
            group.iter().map(|r| r.total_reads).collect(),
            group.iter().map(|r| r.var_read_prob.unwrap_or(DIPLOID_VAR_READ_PROB)).collect()
        )?;
        records.push((*locus, record));
    }

    if config.ingestion_variant().sorts_loci() {
        records.sort_by(|(l1, _), (l2, _)| l1.cmp(l2));
    }

    let mut records: Vec<MutationRecord> = records.into_iter().map(|(_, r)| r).collect();
    assign_ids(&mut records);
    let parameters = Parameters::placeholder(samples, &records);
    info!("Formatted {} mutations across {} samples", records.len(), parameters.samples.first().map(|s| s.len()).unwrap_or(0));
    Ok((records, parameters))
}

/// Applies one step to all rows
fn apply_step(step: ProcessingStep, rows: &mut [ProcessedRow], name_convention: NameConvention) -> Result<(), DataIntegrityError> {
    match step {
        ProcessingStep::SortBySample => {
            rows.sort_by(|r1, r2| r1.observation.sample().cmp(r2.observation.sample()));
        },
        ProcessingStep::Names => {
            for row in rows.iter_mut() {
                let locus = row.observation.locus();
                row.name = match name_convention {
                    NameConvention::LocusKey => locus.to_string(),
                    NameConvention::GenePosition => {
                        let gene = row.observation.gene()
                            .ok_or_else(|| DataIntegrityError::MissingGene { locus: locus.to_string() })?;
                        format!("{gene}_{}", locus.position())
                    }
                };
            }
        },
        ProcessingStep::VarReads => {
            for row in rows.iter_mut() {
                row.var_reads = row.observation.alt_depth().unwrap_or(0);
            }
        },
        ProcessingStep::TotalReads => {
            for row in rows.iter_mut() {
                row.total_reads = row.observation.total_depth()
                    .unwrap_or(MIN_TOTAL_READS)
                    .max(MIN_TOTAL_READS);
            }
        },
        ProcessingStep::VarReadProb => {
            for row in rows.iter_mut() {
                let observation = row.observation;
                row.var_read_prob = var_read_prob(observation.locus(), observation.sample(), observation.copy_number())?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(chrom: &str, pos: u64, sample: &str, alt: Option<u64>, total: Option<u64>, cn: Option<f64>, gene: Option<&str>) -> Observation {
        Observation::new(LocusKey::new(chrom, pos), sample.to_string(), alt, total, cn, gene.map(String::from))
    }

    fn sample_level_gene() -> FormatterConfig {
        FormatterConfigBuilder::default()
            .ingestion_variant(IngestionVariant::SampleLevel)
            .name_convention(NameConvention::GenePosition)
            .build().unwrap()
    }

    #[test]
    fn test_var_read_prob() {
        let auto = LocusKey::new("chr3", 1);
        assert_eq!(var_read_prob(&auto, "s", None).unwrap(), Some(0.5));
        assert_eq!(var_read_prob(&auto, "s", Some(2.0)).unwrap(), Some(0.5));
        assert_eq!(var_read_prob(&auto, "s", Some(3.0)).unwrap(), Some(0.333));
        assert_eq!(var_read_prob(&auto, "s", Some(1.0)).unwrap(), Some(1.0));
        assert_eq!(var_read_prob(&auto, "s", Some(0.0)).unwrap(), None);
        assert!(matches!(var_read_prob(&auto, "s", Some(-1.0)), Err(DataIntegrityError::InvalidCopyNumber { .. })));

        let sex = LocusKey::new("chrX", 1);
        assert_eq!(var_read_prob(&sex, "s", Some(3.0)).unwrap(), Some(1.0));
        assert_eq!(var_read_prob(&sex, "s", Some(0.0)).unwrap(), None);

        let mito = LocusKey::new("chrM", 1);
        assert_eq!(var_read_prob(&mito, "s", None).unwrap(), Some(0.5));
        assert_eq!(var_read_prob(&mito, "s", Some(4.0)).unwrap(), Some(0.25));
        assert_eq!(var_read_prob(&LocusKey::new("chrUn_gl000220", 1), "s", None).unwrap(), Some(0.5));
    }

    #[test]
    fn test_aggregated_format() {
        let observations = vec![
            obs("chr2", 5, "a", Some(3), Some(10), None, Some("G2")),
            obs("chr1", 9, "a", Some(0), Some(0), None, Some("G1")),
            obs("chr2", 5, "b", None, None, None, Some("G2")),
            obs("chr1", 9, "b", Some(4), Some(8), None, Some("G1")),
        ];
        let (records, params) = format_mutations(&observations, FormatterConfig::default()).unwrap();
        assert_eq!(records.len(), 2);

        // first-seen order, no sorting
        assert_eq!(records[0].id(), "s0");
        assert_eq!(records[0].name(), "chr2_5");
        assert_eq!(records[0].var_reads(), &[3, 0]);
        assert_eq!(records[0].total_reads(), &[10, 1]);
        assert_eq!(records[0].var_read_prob(), &[0.5, 0.5]);
        assert_eq!(records[1].name(), "chr1_9");
        assert_eq!(records[1].total_reads(), &[1, 8]);

        assert_eq!(params.samples, vec![vec!["a".to_string(), "b".to_string()]]);
        assert_eq!(params.clusters, vec![vec!["s0".to_string()], vec!["s1".to_string()]]);
    }

    #[test]
    fn test_aggregated_keeps_every_locus() {
        use crate::aggregator::{aggregate, AggregationConfig};
        use crate::data_types::records::VariantRecord;

        let primary = vec![
            VariantRecord::new(LocusKey::new("chr1", 100), "a".to_string(), Some(10), Some(5), Some(0.33), Some("G1".to_string())),
            VariantRecord::new(LocusKey::new("chrM", 3243), "b".to_string(), Some(20), Some(2), Some(0.09), Some("MT-TL1".to_string())),
        ];
        let samples = vec!["a".to_string(), "b".to_string()];
        let aggregated = aggregate(&primary, &[], &samples, AggregationConfig::default()).unwrap();
        assert_eq!(aggregated.loci().len(), 2);

        let observations: Vec<Observation> = aggregated.records().iter().map(Observation::from).collect();
        let (records, _params) = format_mutations(&observations, FormatterConfig::default()).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["chr1_100", "chrM_3243"]);
        assert_eq!(records[1].var_read_prob(), &[0.5, 0.5]);
    }

    #[test]
    fn test_copy_number_zero_dropped() {
        let observations = vec![
            obs("chr1", 100, "a", Some(2), Some(10), Some(2.0), Some("TP53")),
            // dropped row, must not affect the name of this locus
            obs("chr1", 100, "b", Some(2), Some(10), Some(0.0), Some("OTHER")),
            obs("chr1", 100, "c", Some(2), Some(10), Some(0.0), Some("OTHER")),
            obs("chr1", 100, "d", Some(2), Some(10), Some(2.0), Some("TP53")),
            obs("chr1", 200, "a", Some(5), Some(10), Some(0.0), Some("GONE")),
        ];
        let (records, params) = format_mutations(&observations, sample_level_gene()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name(), "TP53_100");
        assert_eq!(records[0].num_samples(), 2);
        assert_eq!(params.samples, vec![vec!["a".to_string(), "d".to_string()]]);
    }

    #[test]
    fn test_sample_level_sorting() {
        let observations = vec![
            obs("chrX", 5, "b", Some(1), Some(2), Some(2.0), Some("GX")),
            obs("chr10", 5, "b", Some(1), Some(2), Some(2.0), Some("G10")),
            obs("chr2", 7, "b", Some(1), Some(2), Some(3.0), Some("G2")),
            obs("chrX", 5, "a", Some(1), Some(2), Some(2.0), Some("GX")),
            obs("chr10", 5, "a", Some(1), Some(2), Some(2.0), Some("G10")),
            obs("chr2", 7, "a", Some(2), Some(2), Some(3.0), Some("G2")),
        ];
        let (records, params) = format_mutations(&observations, sample_level_gene()).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["G2_7", "G10_5", "GX_5"]);
        // sorted by sample first, so "a" is the first vector entry
        assert_eq!(records[0].var_reads(), &[2, 1]);
        assert_eq!(records[0].var_read_prob(), &[0.333, 0.333]);
        assert_eq!(records[2].var_read_prob(), &[1.0, 1.0]);
        assert_eq!(params.samples, vec![vec!["a".to_string(), "b".to_string()]]);
    }

    #[test]
    fn test_sort_changes_ids_not_vectors() {
        // already grouped by sample so both variants see the same row order
        let observations = vec![
            obs("chr5", 1, "a", Some(1), Some(9), None, Some("G5")),
            obs("chr1", 1, "a", Some(2), Some(8), None, Some("G1")),
            obs("chr5", 1, "b", Some(3), Some(7), None, Some("G5")),
            obs("chr1", 1, "b", Some(4), Some(6), None, Some("G1")),
        ];
        let (unsorted, _) = format_mutations(&observations, FormatterConfig::default()).unwrap();
        let sorted_config = FormatterConfigBuilder::default()
            .ingestion_variant(IngestionVariant::SampleLevel)
            .build().unwrap();
        let (sorted, _) = format_mutations(&observations, sorted_config).unwrap();

        let id_of = |records: &[MutationRecord], name: &str| records.iter().find(|r| r.name() == name).unwrap().id().to_string();
        assert_ne!(id_of(&unsorted, "chr1_1"), id_of(&sorted, "chr1_1"));
        for record in unsorted.iter() {
            let other = sorted.iter().find(|r| r.name() == record.name()).unwrap();
            assert_eq!(record.var_reads(), other.var_reads());
            assert_eq!(record.total_reads(), other.total_reads());
            assert_eq!(record.var_read_prob(), other.var_read_prob());
        }
    }

    #[test]
    fn test_errors() {
        let negative = vec![obs("chr1", 1, "a", Some(1), Some(2), Some(-2.0), Some("G"))];
        let err = format_mutations(&negative, sample_level_gene()).unwrap_err();
        assert!(matches!(err.downcast_ref::<DataIntegrityError>(), Some(DataIntegrityError::InvalidCopyNumber { .. })));

        let tie = vec![
            obs("chr1", 1, "a", Some(1), Some(2), None, Some("G1")),
            obs("chr1", 1, "b", Some(1), Some(2), None, Some("G2")),
        ];
        let err = format_mutations(&tie, sample_level_gene()).unwrap_err();
        assert_eq!(err.downcast_ref::<DataIntegrityError>(), Some(&DataIntegrityError::AmbiguousName {
            locus: "chr1_1".to_string(),
            candidates: vec!["G1_1".to_string(), "G2_1".to_string()]
        }));
    }
}
