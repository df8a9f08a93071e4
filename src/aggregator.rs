/*!
# Aggregator
Reconciles the primary variant table, the raw calls table, and the population manifest into one dense (locus x sample) table.

The primary table is authoritative for which loci exist.
Every locus is crossed with every manifest sample, primary values are joined in first, the calls table back-fills reference depth, and anything still missing is imputed.

## Example usage
```rust
use pairtree_prep::aggregator::{aggregate, AggregationConfigBuilder, ImputeTechnique};
use pairtree_prep::data_types::locus::LocusKey;
use pairtree_prep::data_types::records::{DepthSource, VariantRecord};

let primary = vec![
    VariantRecord::new(LocusKey::new("chr1", 100), "s1".to_string(), Some(10), Some(5), Some(0.33), Some("G1".to_string())),
];
let samples = vec!["s1".to_string(), "s2".to_string()];
let config = AggregationConfigBuilder::default()
    .impute_technique(ImputeTechnique::Zero)
    .build().unwrap();

let aggregated = aggregate(&primary, &[], &samples, config).unwrap();
assert_eq!(aggregated.len(), 2);
let missing = &aggregated.records()[1];
assert_eq!(missing.alt_depth(), 0);
assert_eq!(missing.ref_depth(), 1);
assert_eq!(missing.depth_source(), DepthSource::Imputed);
```
*/
use derive_builder::Builder;
use indexmap::IndexSet;
use itertools::Itertools;
use log::{debug, info, warn};
use rustc_hash::FxHashMap as HashMap;
use serde::Serialize;
use strum_macros::EnumString;

use crate::data_types::locus::LocusKey;
use crate::data_types::records::{AggregatedRecord, AggregatedTable, DepthSource, VariantRecord};
use crate::errors::{ConfigurationError, DataIntegrityError};

/// Reference depth assigned by zero-fill imputation; a floor of 1 keeps downstream read ratios defined
pub const ZERO_FILL_REF_DEPTH: u64 = 1;

/// How to fill reference depth for (locus, sample) pairs that no source covers
#[derive(Clone, Copy, Default, Debug, Eq, PartialEq, strum_macros::Display, EnumString, Serialize, clap::ValueEnum)]
pub enum ImputeTechnique {
    /// Fixed floor value
    #[default]
    #[strum(ascii_case_insensitive, serialize = "ZERO")]
    #[clap(name = "ZERO", alias = "zero")]
    Zero,
    /// Floor of the mean total depth of the samples with a recorded value at that locus
    #[strum(ascii_case_insensitive, serialize = "AVG")]
    #[clap(name = "AVG", alias = "avg")]
    Average,
}

/// Controls how the aggregation fills gaps
#[derive(Builder, Clone, Copy, Debug)]
#[builder(default)]
pub struct AggregationConfig {
    /// Imputation policy for reference depth
    impute_technique: ImputeTechnique,
    /// Reference depth used by zero-fill, and as the fallback when an average has no data
    zero_fill_depth: u64
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            impute_technique: ImputeTechnique::Zero,
            zero_fill_depth: ZERO_FILL_REF_DEPTH
        }
    }
}

impl AggregationConfig {
    pub fn impute_technique(&self) -> ImputeTechnique {
        self.impute_technique
    }

    pub fn zero_fill_depth(&self) -> u64 {
        self.zero_fill_depth
    }
}

/// Mutable row state while the skeleton is being filled
#[derive(Clone, Debug)]
struct WorkingRow {
    locus_index: usize,
    sample_index: usize,
    ref_depth: Option<u64>,
    alt_depth: Option<u64>,
    vaf: Option<f64>,
    gene: Option<String>,
    depth_source: Option<DepthSource>
}

/// Indexes records by (locus, sample), failing on duplicate keys.
/// # Arguments
/// * `records` - the normalized source rows
/// * `label` - table label for error messages
pub fn index_by_join_key<'a>(records: &'a [VariantRecord], label: &str) -> Result<HashMap<(&'a LocusKey, &'a str), &'a VariantRecord>, DataIntegrityError> {
    let mut lookup: HashMap<(&LocusKey, &str), &VariantRecord> = Default::default();
    lookup.reserve(records.len());
    for record in records.iter() {
        if lookup.insert(record.join_key(), record).is_some() {
            return Err(DataIntegrityError::DuplicateJoinKey {
                table: label.to_string(),
                locus: record.locus().to_string(),
                sample: record.sample().to_string()
            });
        }
    }
    Ok(lookup)
}

/// Returns the unique loci of the primary table in first-seen order
pub fn unique_loci(primary: &[VariantRecord]) -> IndexSet<LocusKey> {
    primary.iter()
        .map(|r| r.locus().clone())
        .collect()
}

/// Picks the most frequent value; ties go to the value that sorts first.
/// Returns None if there are no values.
pub fn most_frequent<'a>(values: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    values.counts()
        .into_iter()
        .max_by(|(v1, c1), (v2, c2)| {
            // higher count wins, then the lexicographically smaller value
            c1.cmp(c2).then_with(|| v2.cmp(v1))
        })
        .map(|(v, _c)| v)
}

/// Entry point for building the dense aggregated table.
/// # Arguments
/// * `primary` - normalized primary records, authoritative for the locus universe
/// * `calls` - normalized raw caller records, only used to back-fill reference depth
/// * `samples` - manifest order of samples to cover
/// * `config` - imputation controls
/// # Errors
/// * `ConfigurationError::EmptyManifest` if there are no samples
/// * `DataIntegrityError::DuplicateJoinKey` if either source has more than one row for a (locus, sample)
/// * `DataIntegrityError::MissingGene` if a locus has no gene anywhere in the primary table
pub fn aggregate(primary: &[VariantRecord], calls: &[VariantRecord], samples: &[String], config: AggregationConfig) -> anyhow::Result<AggregatedTable> {
    if samples.is_empty() {
        return Err(ConfigurationError::EmptyManifest.into());
    }

    let loci = unique_loci(primary);
    let primary_lookup = index_by_join_key(primary, "primary")?;
    let calls_lookup = index_by_join_key(calls, "calls")?;
    info!("Aggregating {} unique loci across {} samples ({} primary rows, {} calls rows)...",
        loci.len(), samples.len(), primary.len(), calls.len());

    // build the full skeleton in one pass, sample blocks in manifest order
    let mut rows: Vec<WorkingRow> = samples.iter().enumerate()
        .flat_map(|(sample_index, _sample)| {
            (0..loci.len()).map(move |locus_index| WorkingRow {
                locus_index, sample_index,
                ref_depth: None,
                alt_depth: None,
                vaf: None,
                gene: None,
                depth_source: None
            })
        })
        .collect();

    join_primary(&mut rows, &loci, samples, &primary_lookup);
    join_calls(&mut rows, &loci, samples, &calls_lookup);

    // rows with no source data are "no variant observed"
    for row in rows.iter_mut() {
        row.alt_depth.get_or_insert(0);
        row.vaf.get_or_insert(0.0);
    }

    let genes = resolve_genes(&rows, &loci)?;
    impute_ref_depth(&mut rows, &loci, config);

    let records: Vec<AggregatedRecord> = rows.into_iter()
        .map(|row| {
            AggregatedRecord::new(
                loci[row.locus_index].clone(),
                samples[row.sample_index].clone(),
                // both of these are guaranteed filled by the steps above
                row.ref_depth.unwrap_or(config.zero_fill_depth()),
                row.alt_depth.unwrap_or(0),
                row.vaf.unwrap_or(0.0),
                genes[row.locus_index].clone(),
                row.depth_source.unwrap_or(DepthSource::Imputed)
            )
        })
        .collect();

    let table = AggregatedTable::new(samples.to_vec(), loci.into_iter().collect(), records);
    info!("Aggregated rows: {} (primary: {}, calls: {}, imputed: {})",
        table.len(),
        table.count_source(DepthSource::Primary),
        table.count_source(DepthSource::Calls),
        table.count_source(DepthSource::Imputed)
    );
    Ok(table)
}

/// Left-joins primary values onto the skeleton; everything the primary row has is copied over
fn join_primary(
    rows: &mut [WorkingRow], loci: &IndexSet<LocusKey>, samples: &[String],
    lookup: &HashMap<(&LocusKey, &str), &VariantRecord>
) {
    let mut matched = 0;
    for row in rows.iter_mut() {
        let key = (&loci[row.locus_index], samples[row.sample_index].as_str());
        if let Some(record) = lookup.get(&key) {
            row.ref_depth = record.ref_depth();
            row.alt_depth = record.alt_depth();
            row.vaf = record.vaf();
            row.gene = record.gene().map(String::from);
            if row.ref_depth.is_some() {
                row.depth_source = Some(DepthSource::Primary);
            }
            matched += 1;
        }
    }

    if matched != lookup.len() {
        // primary rows for samples outside the manifest are dropped by the join
        warn!("{} primary rows belong to samples that are not in the manifest", lookup.len() - matched);
    }
    debug!("Primary join matched {matched} rows");
}

/// Left-joins calls onto the skeleton, only filling reference depth that is still unset.
/// Alternate depth and VAF from calls are never used.
fn join_calls(
    rows: &mut [WorkingRow], loci: &IndexSet<LocusKey>, samples: &[String],
    lookup: &HashMap<(&LocusKey, &str), &VariantRecord>
) {
    let mut filled = 0;
    for row in rows.iter_mut().filter(|r| r.ref_depth.is_none()) {
        let key = (&loci[row.locus_index], samples[row.sample_index].as_str());
        if let Some(ref_depth) = lookup.get(&key).and_then(|r| r.ref_depth()) {
            row.ref_depth = Some(ref_depth);
            row.depth_source = Some(DepthSource::Calls);
            filled += 1;
        }
    }
    debug!("Calls join filled reference depth for {filled} rows");
}

/// Resolves one gene per locus as the most frequent non-empty gene across samples.
/// Returns the gene for each locus index.
fn resolve_genes(rows: &[WorkingRow], loci: &IndexSet<LocusKey>) -> Result<Vec<String>, DataIntegrityError> {
    let mut observed: Vec<Vec<&str>> = vec![vec![]; loci.len()];
    for row in rows.iter() {
        if let Some(gene) = row.gene.as_deref() {
            observed[row.locus_index].push(gene);
        }
    }

    observed.iter().enumerate()
        .map(|(locus_index, genes)| {
            let resolved = most_frequent(genes.iter().copied())
                .ok_or_else(|| DataIntegrityError::MissingGene { locus: loci[locus_index].to_string() })?;
            if genes.iter().any(|g| *g != resolved) {
                warn!("Locus {} has conflicting genes {:?}, using {resolved:?}",
                    loci[locus_index], genes.iter().unique().collect::<Vec<_>>());
            }
            Ok(resolved.to_string())
        })
        .collect()
}

/// Fills any reference depth still unset after both joins.
/// Averages are computed from the rows that had a recorded value before any imputation in this step.
fn impute_ref_depth(rows: &mut [WorkingRow], loci: &IndexSet<LocusKey>, config: AggregationConfig) {
    let fill_values: Vec<u64> = match config.impute_technique() {
        ImputeTechnique::Zero => vec![config.zero_fill_depth(); loci.len()],
        ImputeTechnique::Average => {
            // (sum of ref + alt, number of recorded rows) per locus
            let mut totals: Vec<(u64, u64)> = vec![(0, 0); loci.len()];
            for row in rows.iter() {
                if let Some(ref_depth) = row.ref_depth {
                    let entry = &mut totals[row.locus_index];
                    entry.0 += ref_depth + row.alt_depth.unwrap_or(0);
                    entry.1 += 1;
                }
            }
            totals.iter().enumerate()
                .map(|(locus_index, &(total, count))| {
                    if count == 0 {
                        warn!("Locus {} has no recorded reference depth, using {} for imputation",
                            loci[locus_index], config.zero_fill_depth());
                        config.zero_fill_depth()
                    } else {
                        // integer division is the floor for non-negative values
                        total / count
                    }
                })
                .collect()
        }
    };

    let mut imputed = 0;
    for row in rows.iter_mut().filter(|r| r.ref_depth.is_none()) {
        row.ref_depth = Some(fill_values[row.locus_index]);
        row.depth_source = Some(DepthSource::Imputed);
        imputed += 1;
    }
    debug!("Imputed reference depth ({}) for {imputed} rows", config.impute_technique());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(chrom: &str, pos: u64, sample: &str, ref_depth: Option<u64>, alt_depth: Option<u64>, vaf: Option<f64>, gene: Option<&str>) -> VariantRecord {
        VariantRecord::new(LocusKey::new(chrom, pos), sample.to_string(), ref_depth, alt_depth, vaf, gene.map(String::from))
    }

    fn samples(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn avg_config() -> AggregationConfig {
        AggregationConfigBuilder::default()
            .impute_technique(ImputeTechnique::Average)
            .build().unwrap()
    }

    #[test]
    fn test_single_primary_row() {
        let primary = vec![record("chr1", 100, "sample1", Some(10), Some(5), Some(0.333), Some("G1"))];
        let aggregated = aggregate(&primary, &[], &samples(&["sample1"]), AggregationConfig::default()).unwrap();
        assert_eq!(aggregated.len(), 1);
        let row = &aggregated.records()[0];
        assert_eq!(row.ref_depth(), 10);
        assert_eq!(row.alt_depth(), 5);
        assert_eq!(row.vaf(), 0.333);
        assert_eq!(row.gene(), "G1");
        assert_eq!(row.depth_source(), DepthSource::Primary);
    }

    #[test]
    fn test_missing_sample_zero_fill() {
        let primary = vec![record("chr1", 100, "sample1", Some(10), Some(5), Some(0.333), Some("G1"))];
        let aggregated = aggregate(&primary, &[], &samples(&["sample1", "sample2"]), AggregationConfig::default()).unwrap();
        assert_eq!(aggregated.len(), 2);
        let row = &aggregated.records()[1];
        assert_eq!(row.sample(), "sample2");
        assert_eq!(row.alt_depth(), 0);
        assert_eq!(row.vaf(), 0.0);
        assert_eq!(row.ref_depth(), ZERO_FILL_REF_DEPTH);
        assert_eq!(row.gene(), "G1");
        assert_eq!(row.depth_source(), DepthSource::Imputed);
    }

    #[test]
    fn test_zero_vs_average() {
        let primary = vec![
            record("chr1", 100, "s1", Some(10), Some(5), Some(0.333), Some("G1")),
            record("chr1", 100, "s2", Some(20), Some(0), Some(0.0), Some("G1")),
        ];
        let manifest = samples(&["s1", "s2", "s3"]);
        let zero = aggregate(&primary, &[], &manifest, AggregationConfig::default()).unwrap();
        let avg = aggregate(&primary, &[], &manifest, avg_config()).unwrap();

        // floor((10 + 5 + 20 + 0) / 2) = 17
        assert_eq!(zero.records()[2].ref_depth(), 1);
        assert_eq!(avg.records()[2].ref_depth(), 17);

        // imputation only ever touches reference depth
        for (z, a) in zero.records().iter().zip(avg.records().iter()) {
            assert_eq!(z.alt_depth(), a.alt_depth());
            assert_eq!(z.vaf(), a.vaf());
            assert_eq!(z.gene(), a.gene());
        }
    }

    #[test]
    fn test_calls_backfill() {
        let primary = vec![
            record("chr1", 100, "s1", Some(10), Some(5), Some(0.333), Some("G1")),
            record("chr2", 50, "s2", Some(8), Some(8), Some(0.5), Some("G2")),
        ];
        let calls = vec![
            // overlaps primary, primary must win
            record("chr1", 100, "s1", Some(99), Some(99), Some(0.5), None),
            // fills s2 at chr1_100, alt depth must stay 0
            record("chr1", 100, "s2", Some(30), Some(3), Some(0.09), None),
            // locus that is not in primary is ignored
            record("chr9", 1, "s1", Some(30), Some(3), Some(0.09), None),
        ];
        let aggregated = aggregate(&primary, &calls, &samples(&["s1", "s2"]), avg_config()).unwrap();
        assert_eq!(aggregated.len(), 4);

        let find = |locus: &str, sample: &str| {
            aggregated.records().iter()
                .find(|r| r.locus().to_string() == locus && r.sample() == sample)
                .unwrap()
        };
        assert_eq!(find("chr1_100", "s1").ref_depth(), 10);
        assert_eq!(find("chr1_100", "s1").depth_source(), DepthSource::Primary);

        let from_calls = find("chr1_100", "s2");
        assert_eq!(from_calls.ref_depth(), 30);
        assert_eq!(from_calls.alt_depth(), 0);
        assert_eq!(from_calls.vaf(), 0.0);
        assert_eq!(from_calls.depth_source(), DepthSource::Calls);

        // only s2 has data at chr2_50: floor((8 + 8) / 1)
        let imputed = find("chr2_50", "s1");
        assert_eq!(imputed.ref_depth(), 16);
        assert_eq!(imputed.depth_source(), DepthSource::Imputed);
    }

    #[test]
    fn test_density_and_order() {
        let primary = vec![
            record("chr2", 5, "s2", Some(1), Some(1), Some(0.5), Some("B")),
            record("chr1", 9, "s1", Some(1), Some(1), Some(0.5), Some("A")),
            record("chr1", 9, "s3", Some(1), Some(1), Some(0.5), Some("A")),
        ];
        let manifest = samples(&["s3", "s1", "s2", "s4"]);
        let aggregated = aggregate(&primary, &[], &manifest, AggregationConfig::default()).unwrap();
        assert_eq!(aggregated.len(), 2 * 4);
        assert_eq!(aggregated.loci(), &[LocusKey::new("chr2", 5), LocusKey::new("chr1", 9)]);

        // sample blocks follow the manifest
        let sample_order: Vec<&str> = aggregated.records().iter().map(|r| r.sample()).collect();
        assert_eq!(sample_order, vec!["s3", "s3", "s1", "s1", "s2", "s2", "s4", "s4"]);

        // no duplicate (locus, sample)
        let unique = aggregated.records().iter().map(|r| (r.locus().clone(), r.sample().to_string())).unique().count();
        assert_eq!(unique, aggregated.len());
    }

    #[test]
    fn test_gene_resolution() {
        let primary = vec![
            record("chr1", 1, "s1", Some(1), Some(1), Some(0.5), Some("ZED")),
            record("chr1", 1, "s2", Some(1), Some(1), Some(0.5), Some("ABC")),
            record("chr1", 1, "s3", Some(1), Some(1), Some(0.5), None),
            record("chr1", 2, "s1", Some(1), Some(1), Some(0.5), Some("X")),
            record("chr1", 2, "s2", Some(1), Some(1), Some(0.5), Some("Y")),
            record("chr1", 2, "s3", Some(1), Some(1), Some(0.5), Some("Y")),
        ];
        let aggregated = aggregate(&primary, &[], &samples(&["s1", "s2", "s3"]), AggregationConfig::default()).unwrap();
        for row in aggregated.records() {
            match row.locus().position() {
                // tie, first in sort order wins
                1 => assert_eq!(row.gene(), "ABC"),
                2 => assert_eq!(row.gene(), "Y"),
                _ => unreachable!()
            }
        }
    }

    #[test]
    fn test_most_frequent() {
        assert_eq!(most_frequent(["b", "a", "b"].into_iter()), Some("b"));
        assert_eq!(most_frequent(["b", "a"].into_iter()), Some("a"));
        assert_eq!(most_frequent(std::iter::empty()), None);
    }

    #[test]
    fn test_errors() {
        let primary = vec![record("chr1", 1, "s1", Some(1), Some(1), Some(0.5), Some("A"))];
        let err = aggregate(&primary, &[], &[], AggregationConfig::default()).unwrap_err();
        assert_eq!(err.downcast_ref::<ConfigurationError>(), Some(&ConfigurationError::EmptyManifest));

        let duplicated = vec![primary[0].clone(), primary[0].clone()];
        let err = aggregate(&duplicated, &[], &samples(&["s1"]), AggregationConfig::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<DataIntegrityError>(), Some(DataIntegrityError::DuplicateJoinKey { .. })));

        let no_gene = vec![record("chr1", 1, "s1", Some(1), Some(1), Some(0.5), None)];
        let err = aggregate(&no_gene, &[], &samples(&["s1"]), AggregationConfig::default()).unwrap_err();
        assert_eq!(err.downcast_ref::<DataIntegrityError>(), Some(&DataIntegrityError::MissingGene { locus: "chr1_1".to_string() }));
    }
}
