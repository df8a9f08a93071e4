/*!
# Verifier
Re-derives the counts an aggregation should produce, directly from the source records, and compares them to the aggregated table.
Findings are advisory: nothing in here returns an error for a failed check, and the aggregated table is never modified.
*/
use indexmap::{IndexMap, IndexSet};
use indicatif::ProgressIterator;
use itertools::Itertools;
use log::{debug, info, warn};
use rustc_hash::FxHashMap as HashMap;
use serde::Serialize;

use crate::aggregator::most_frequent;
use crate::data_types::locus::LocusKey;
use crate::data_types::records::{AggregatedRecord, AggregatedTable, VariantRecord};
use crate::data_types::table::{Cell, Table};
use crate::parsing::schema::{COL_ALT_DEPTH, COL_CHR, COL_CHR_POS, COL_GENE, COL_POSITION, COL_REF_DEPTH, COL_SAMPLE_NAMES, COL_VAF};
use crate::util::progress_bar::get_progress_style;
use crate::writers::report::{BarChart, ChecklistItem, ReportSink};

/// Primary variants above this VAF are listed in the report
pub const PRIMARY_VAF_THRESHOLD: f64 = 0.5;
/// Calls-sourced variants above this VAF are listed in the report
pub const CALLS_VAF_THRESHOLD: f64 = 0.1;
/// Title of the checklist page
pub const AUDIT_TITLE: &str = "Aggregation Details";

/// A single verification finding
pub type AuditEntry = ChecklistItem;

type JoinKey<'a> = (&'a LocusKey, &'a str);

/// The raw numbers behind the audit entries
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AggregationCounts {
    pub samples: usize,
    pub unique_loci: usize,
    /// unique loci x samples
    pub expected_rows: usize,
    pub aggregated_rows: usize,
    pub primary_rows: usize,
    /// Primary rows with exactly one matching aggregated row
    pub primary_matched: usize,
    /// Skeleton keys with a primary reference depth
    pub primary_covered: usize,
    /// Aggregated rows with altDepth = 0 that match neither a primary nor a calls row
    pub zero_alt_unmatched: usize,
    /// expected rows - primary rows
    pub unmatched_rows: usize,
    pub calls_rows: usize,
    /// Aggregated rows whose reference depth matches the calls row for the same key
    pub calls_matched: usize,
    /// total - keys covered by either source
    pub expected_imputed: usize,
    pub imputed: usize,
    pub expected_calls_sourced: usize,
    pub calls_sourced: usize,
    /// Unique loci with at least one imputed row
    pub imputed_loci: usize
}

/// An aggregated row whose reference depth came from calls, along with the alternate depth calls reported
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CallsSourcedRow {
    /// Index into the aggregated records
    pub index: usize,
    pub calls_alt_depth: u64
}

/// Outcome of verifying one aggregation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregationAudit {
    entries: Vec<AuditEntry>,
    counts: AggregationCounts,
    /// Indices into the aggregated records with imputed reference depth
    imputed_rows: Vec<usize>,
    calls_sourced_rows: Vec<CallsSourcedRow>
}

impl AggregationAudit {
    /// True if every entry passed
    pub fn passed(&self) -> bool {
        self.entries.iter().all(|e| e.passed)
    }

    // getters
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn counts(&self) -> &AggregationCounts {
        &self.counts
    }

    pub fn imputed_rows(&self) -> &[usize] {
        &self.imputed_rows
    }

    pub fn calls_sourced_rows(&self) -> &[CallsSourcedRow] {
        &self.calls_sourced_rows
    }
}

/// True if the aggregated row carries exactly what the primary row provided
fn matches_primary(aggregated: &AggregatedRecord, primary: &VariantRecord) -> bool {
    aggregated.alt_depth() == primary.alt_depth().unwrap_or(0) &&
        aggregated.vaf() == primary.vaf().unwrap_or(0.0) &&
        primary.ref_depth().map_or(true, |r| r == aggregated.ref_depth())
}

/// Runs all aggregation checks.
/// # Arguments
/// * `aggregated` - the output of the aggregation
/// * `primary` - the normalized primary records the aggregation was built from
/// * `calls` - the normalized calls records the aggregation was built from
/// * `samples` - the manifest
pub fn verify_aggregation(aggregated: &AggregatedTable, primary: &[VariantRecord], calls: &[VariantRecord], samples: &[String]) -> AggregationAudit {
    let records = aggregated.records();
    let unique_loci: IndexSet<&LocusKey> = primary.iter().map(|r| r.locus()).collect();
    let expected_rows = unique_loci.len() * samples.len();

    let mut aggregated_lookup: HashMap<JoinKey, Vec<usize>> = Default::default();
    for (index, record) in records.iter().enumerate() {
        aggregated_lookup.entry((record.locus(), record.sample())).or_default().push(index);
    }

    // every primary row should land in exactly one aggregated row
    let primary_matched = primary.iter()
        .filter(|p| {
            let matches = aggregated_lookup.get(&p.join_key())
                .map(|indices| indices.iter().filter(|&&i| matches_primary(&records[i], p)).count())
                .unwrap_or(0);
            matches == 1
        })
        .count();

    let genes_consistent = check_genes(records, primary);

    // the first row with a reference depth wins for each key, same as a join would see it
    let mut primary_ref: HashMap<JoinKey, u64> = Default::default();
    for record in primary.iter() {
        if let Some(ref_depth) = record.ref_depth() {
            primary_ref.entry(record.join_key()).or_insert(ref_depth);
        }
    }
    let mut calls_ref: HashMap<JoinKey, &VariantRecord> = Default::default();
    for record in calls.iter().filter(|r| r.ref_depth().is_some()) {
        calls_ref.entry(record.join_key()).or_insert(record);
    }

    // expected coverage straight from the inputs
    let mut primary_covered = 0;
    let mut covered = 0;
    for sample in samples.iter() {
        for &locus in unique_loci.iter() {
            let key = (locus, sample.as_str());
            let in_primary = primary_ref.contains_key(&key);
            if in_primary {
                primary_covered += 1;
            }
            if in_primary || calls_ref.contains_key(&key) {
                covered += 1;
            }
        }
    }
    let expected_imputed = expected_rows.saturating_sub(covered);

    // observed provenance from the aggregated values
    let mut imputed_rows = vec![];
    let mut calls_sourced_rows = vec![];
    let mut calls_matched = 0;
    let mut zero_alt_unmatched = 0;
    for (index, record) in records.iter().enumerate() {
        let key = (record.locus(), record.sample());
        let from_primary = primary_ref.get(&key) == Some(&record.ref_depth());
        let calls_match = calls_ref.get(&key)
            .filter(|c| c.ref_depth() == Some(record.ref_depth()));
        if calls_match.is_some() {
            calls_matched += 1;
        } else if record.alt_depth() == 0 && !from_primary {
            zero_alt_unmatched += 1;
        }

        match calls_match {
            _ if from_primary => {},
            Some(calls_record) if !primary_ref.contains_key(&key) => {
                calls_sourced_rows.push(CallsSourcedRow {
                    index,
                    calls_alt_depth: calls_record.alt_depth().unwrap_or(0)
                });
            },
            Some(_) => {},
            None => imputed_rows.push(index)
        }
    }
    let expected_calls_sourced = expected_rows
        .saturating_sub(imputed_rows.len())
        .saturating_sub(primary_covered);
    let imputed_loci = imputed_rows.iter()
        .map(|&i| records[i].locus())
        .unique()
        .count();

    let counts = AggregationCounts {
        samples: samples.len(),
        unique_loci: unique_loci.len(),
        expected_rows,
        aggregated_rows: records.len(),
        primary_rows: primary.len(),
        primary_matched,
        primary_covered,
        zero_alt_unmatched,
        unmatched_rows: expected_rows.saturating_sub(primary.len()),
        calls_rows: calls.len(),
        calls_matched,
        expected_imputed,
        imputed: imputed_rows.len(),
        expected_calls_sourced,
        calls_sourced: calls_sourced_rows.len(),
        imputed_loci
    };

    let entries = vec![
        AuditEntry {
            passed: genes_consistent,
            statement: "all unique <chromosome><position> pairs have the same gene in both the aggregated and primary tables".to_string()
        },
        AuditEntry {
            passed: counts.aggregated_rows == counts.expected_rows,
            statement: format!("number of rows in aggregate / ((# of samples) * (# of unique <chromosome><position> pairs)) = {}/{}",
                counts.aggregated_rows, counts.expected_rows)
        },
        AuditEntry {
            passed: counts.primary_matched == counts.primary_rows,
            statement: format!("number of matching rows between aggregate and primary / number of rows in primary = {}/{}",
                counts.primary_matched, counts.primary_rows)
        },
        AuditEntry {
            passed: true,
            statement: format!("number of <chromosome><position> pairs with altDepth = 0 / remaining unmatched rows (from either calls or primary) = {}/{}",
                counts.zero_alt_unmatched, counts.unmatched_rows)
        },
        AuditEntry {
            passed: true,
            statement: format!("number of matching rows between aggregate and calls / number of rows in calls = {}/{}",
                counts.calls_matched, counts.calls_rows)
        },
        AuditEntry {
            passed: counts.imputed == counts.expected_imputed,
            statement: format!("number of rows not found in either calls or primary (imputed refDepth) / rows left uncovered by the sources = {}/{}",
                counts.imputed, counts.expected_imputed)
        },
        AuditEntry {
            passed: counts.calls_sourced == counts.expected_calls_sourced,
            statement: format!("number of rows pulled from calls / (total - imputed - primary) = {}/{}",
                counts.calls_sourced, counts.expected_calls_sourced)
        },
        AuditEntry {
            passed: true,
            statement: format!("number of unique <chromosome><position> pairs where a refDepth imputation had to be done / number of unique pairs = {}/{}",
                counts.imputed_loci, counts.unique_loci)
        },
    ];

    for entry in entries.iter().filter(|e| !e.passed) {
        warn!("Aggregation check failed: {}", entry.statement);
    }
    debug!("Aggregation counts: {counts:?}");

    AggregationAudit {
        entries,
        counts,
        imputed_rows,
        calls_sourced_rows
    }
}

/// Checks that every locus has a single gene, and that it is the most frequent primary gene at that locus
fn check_genes(records: &[AggregatedRecord], primary: &[VariantRecord]) -> bool {
    let mut aggregated_genes: IndexMap<&LocusKey, Vec<&str>> = Default::default();
    for record in records.iter() {
        aggregated_genes.entry(record.locus()).or_default().push(record.gene());
    }
    let mut primary_genes: HashMap<&LocusKey, Vec<&str>> = Default::default();
    for record in primary.iter() {
        if let Some(gene) = record.gene() {
            primary_genes.entry(record.locus()).or_default().push(gene);
        }
    }

    aggregated_genes.iter().all(|(locus, genes)| {
        let expected = primary_genes.get(locus)
            .and_then(|g| most_frequent(g.iter().copied()));
        genes.iter().all_equal() && expected == genes.first().copied()
    })
}

/// Builds the table used for per-sample row listings
fn row_table<'a>(rows: impl Iterator<Item = (&'a AggregatedRecord, u64)>) -> Table {
    let columns = [COL_SAMPLE_NAMES, COL_CHR_POS, COL_POSITION, COL_ALT_DEPTH, COL_REF_DEPTH]
        .iter().map(|c| c.to_string()).collect();
    let rows = rows
        .map(|(record, alt_depth)| vec![
            Cell::from(record.sample()),
            Cell::from(record.locus().to_string()),
            Cell::from(record.locus().position()),
            Cell::from(alt_depth),
            Cell::from(record.ref_depth()),
        ])
        .collect();
    Table::new(columns, rows)
}

/// Builds the table used for VAF listings
fn vaf_table(rows: impl Iterator<Item = (String, LocusKey, String, f64, u64, u64)>) -> Table {
    let columns = [COL_SAMPLE_NAMES, COL_CHR, COL_POSITION, COL_GENE, COL_VAF, COL_ALT_DEPTH, COL_REF_DEPTH]
        .iter().map(|c| c.to_string()).collect();
    let rows = rows
        .map(|(sample, locus, gene, vaf, alt_depth, ref_depth)| vec![
            Cell::from(sample),
            Cell::from(locus.chrom()),
            Cell::from(locus.position()),
            Cell::from(gene),
            Cell::from(vaf),
            Cell::from(alt_depth),
            Cell::from(ref_depth),
        ])
        .collect();
    Table::new(columns, rows)
}

/// VAF from raw counts, 0.0 if there is no coverage
fn depth_vaf(alt_depth: u64, ref_depth: u64) -> f64 {
    let total = alt_depth + ref_depth;
    if total == 0 { 0.0 } else { alt_depth as f64 / total as f64 }
}

/// Sends the full verification report to a sink and renders it.
/// # Arguments
/// * `audit` - result of `verify_aggregation` for these inputs
/// * `aggregated` - the verified aggregation
/// * `primary` - the normalized primary records
/// * `details` - free-form text for the title page, typically the input/output paths
/// * `sink` - the renderer
/// # Errors
/// * if the sink fails to render
pub fn emit_report(
    audit: &AggregationAudit, aggregated: &AggregatedTable, primary: &[VariantRecord],
    details: &str, sink: &mut dyn ReportSink
) -> anyhow::Result<()> {
    let records = aggregated.records();
    sink.set_title("Aggregation Metrics", details);
    sink.add_checklist(AUDIT_TITLE, audit.entries().to_vec());

    if !audit.imputed_rows().is_empty() {
        // one bar per locus, the imputed value is shared by every sample at a locus
        let per_locus: IndexMap<&LocusKey, u64> = audit.imputed_rows().iter()
            .map(|&i| (records[i].locus(), records[i].ref_depth()))
            .fold(IndexMap::default(), |mut acc, (locus, ref_depth)| {
                acc.entry(locus).or_insert(ref_depth);
                acc
            });
        sink.add_bar_chart(BarChart {
            title: "Rows Missing From Primary".to_string(),
            subtitle: "Imputed Ref Depth Per Chromosome-Position".to_string(),
            x_label: "Chromosome_Position".to_string(),
            y_label: "Imputed Ref Depth".to_string(),
            labels: per_locus.keys().map(|l| l.to_string()).collect(),
            values: per_locus.values().map(|&v| v as f64).collect(),
            ..Default::default()
        });
    }

    let high_primary = vaf_table(
        primary.iter()
            .filter(|r| r.vaf().unwrap_or(0.0) > PRIMARY_VAF_THRESHOLD)
            .map(|r| (
                r.sample().to_string(), r.locus().clone(), r.gene().unwrap_or_default().to_string(),
                r.vaf().unwrap_or(0.0), r.alt_depth().unwrap_or(0), r.ref_depth().unwrap_or(0)
            ))
    );
    sink.add_table(&format!("Variants from primary with a VAF > {PRIMARY_VAF_THRESHOLD:.2}"), &high_primary);

    let high_calls = vaf_table(
        audit.calls_sourced_rows().iter()
            .map(|c| (&records[c.index], c.calls_alt_depth))
            .filter(|(r, alt)| depth_vaf(*alt, r.ref_depth()) > CALLS_VAF_THRESHOLD)
            .map(|(r, alt)| (
                r.sample().to_string(), r.locus().clone(), r.gene().to_string(),
                depth_vaf(alt, r.ref_depth()), alt, r.ref_depth()
            ))
    );
    sink.add_table(&format!("Variants from calls with a VAF > {CALLS_VAF_THRESHOLD:.2}"), &high_calls);

    let mut overview = Table::new(
        ["sampleNames", "Total Variants in Sample", "Variants From Primary", "Variants From Calls", "Variants Imputed"]
            .iter().map(|c| c.to_string()).collect(),
        vec![]
    );

    info!("Generating per-sample metrics...");
    for sample in aggregated.samples().iter().progress_with_style(get_progress_style()) {
        let sample_rows: Vec<&AggregatedRecord> = aggregated.sample_records(sample).collect();
        let primary_count = primary.iter().filter(|r| r.sample() == sample.as_str()).count();
        let sample_calls: Vec<(&AggregatedRecord, u64)> = audit.calls_sourced_rows().iter()
            .map(|c| (&records[c.index], c.calls_alt_depth))
            .filter(|(r, _)| r.sample() == sample.as_str())
            .collect();
        let sample_imputed: Vec<(&AggregatedRecord, u64)> = audit.imputed_rows().iter()
            .map(|&i| (&records[i], records[i].alt_depth()))
            .filter(|(r, _)| r.sample() == sample.as_str())
            .collect();

        sink.add_bar_chart(BarChart {
            title: format!("Sample {sample}"),
            subtitle: "VAF per Chromosome-Position (aggregate of primary, calls, imputed)".to_string(),
            x_label: "Chromosome_Position".to_string(),
            y_label: "Variant Allele Frequency (VAF)".to_string(),
            labels: sample_rows.iter().map(|r| r.locus().to_string()).collect(),
            values: sample_rows.iter().map(|r| r.vaf()).collect(),
            y_limits: Some((0.0, 1.0)),
            caption: Some(format!("# of aggregated Chromosome_Position: {}\n# from primary: {}\n# from calls: {}\n# imputed: {}",
                sample_rows.len(), primary_count, sample_calls.len(), sample_imputed.len()))
        });

        if !sample_calls.is_empty() {
            sink.add_bar_chart(BarChart {
                title: format!("Sample {sample}"),
                subtitle: "VAF per Chromosome-Position (from calls)".to_string(),
                x_label: "Chromosome_Position".to_string(),
                y_label: "Variant Allele Frequency (VAF)".to_string(),
                labels: sample_calls.iter().map(|(r, _)| r.locus().to_string()).collect(),
                values: sample_calls.iter().map(|(r, alt)| depth_vaf(*alt, r.ref_depth())).collect(),
                y_limits: Some((0.0, 1.0)),
                caption: Some(format!("# from calls: {}", sample_calls.len()))
            });
            sink.add_table(&format!("Entries from calls for sample {sample}"), &row_table(sample_calls.iter().copied()));
        }

        if !sample_imputed.is_empty() {
            sink.add_table(&format!("Imputed rows for sample {sample}"), &row_table(sample_imputed.iter().copied()));
        }

        overview.push_row(vec![
            Cell::from(sample.as_str()),
            Cell::from(sample_rows.len() as u64),
            Cell::from(primary_count as u64),
            Cell::from(sample_calls.len() as u64),
            Cell::from(sample_imputed.len() as u64),
        ]);
    }

    if !overview.is_empty() {
        sink.add_table("Source of variant data for each sample", &overview);
    }
    sink.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{aggregate, AggregationConfig};
    use crate::data_types::records::DepthSource;
    use crate::writers::report::{JsonReportSink, ReportPage};

    fn record(chrom: &str, pos: u64, sample: &str, ref_depth: Option<u64>, alt_depth: Option<u64>, vaf: Option<f64>, gene: Option<&str>) -> VariantRecord {
        VariantRecord::new(LocusKey::new(chrom, pos), sample.to_string(), ref_depth, alt_depth, vaf, gene.map(String::from))
    }

    fn fixture() -> (Vec<VariantRecord>, Vec<VariantRecord>, Vec<String>) {
        let primary = vec![
            record("chr1", 100, "s1", Some(10), Some(15), Some(0.6), Some("G1")),
            record("chr2", 50, "s2", Some(8), Some(2), Some(0.2), Some("G2")),
        ];
        let calls = vec![
            record("chr1", 100, "s2", Some(30), Some(6), Some(0.17), None),
            record("chr7", 1, "s1", Some(30), Some(6), Some(0.17), None),
        ];
        let samples = vec!["s1".to_string(), "s2".to_string(), "s3".to_string()];
        (primary, calls, samples)
    }

    #[test]
    fn test_clean_aggregation_passes() {
        let (primary, calls, samples) = fixture();
        let aggregated = aggregate(&primary, &calls, &samples, AggregationConfig::default()).unwrap();
        let audit = verify_aggregation(&aggregated, &primary, &calls, &samples);
        assert!(audit.passed(), "{:?}", audit.entries());

        let counts = audit.counts();
        assert_eq!(counts.expected_rows, 6);
        assert_eq!(counts.primary_matched, 2);
        assert_eq!(counts.primary_covered, 2);
        assert_eq!(counts.calls_sourced, 1);
        assert_eq!(counts.imputed, 3);
        assert_eq!(counts.expected_imputed, 3);
        assert_eq!(counts.calls_matched, 1);
        assert_eq!(counts.imputed_loci, 2);
        // the calls-sourced row is zeroed but matched, so only the imputed rows count
        assert_eq!(counts.zero_alt_unmatched, 3);
        assert_eq!(counts.unmatched_rows, 4);
        assert_eq!(audit.entries().len(), 8);
        assert!(audit.entries()[3].statement.ends_with("= 3/4"));

        // provenance agrees with what the aggregator recorded
        for &i in audit.imputed_rows() {
            assert_eq!(aggregated.records()[i].depth_source(), DepthSource::Imputed);
        }
        let calls_row = audit.calls_sourced_rows()[0];
        assert_eq!(aggregated.records()[calls_row.index].depth_source(), DepthSource::Calls);
        assert_eq!(calls_row.calls_alt_depth, 6);
    }

    #[test]
    fn test_detects_tampering() {
        let (primary, calls, samples) = fixture();
        let aggregated = aggregate(&primary, &calls, &samples, AggregationConfig::default()).unwrap();

        // drop a row and change a gene
        let mut records = aggregated.records().to_vec();
        records.remove(0);
        let altered = records[0].clone();
        records[0] = AggregatedRecord::new(
            altered.locus().clone(), altered.sample().to_string(), altered.ref_depth(), altered.alt_depth(),
            altered.vaf(), "OTHER".to_string(), altered.depth_source()
        );
        let tampered = AggregatedTable::new(aggregated.samples().to_vec(), aggregated.loci().to_vec(), records);

        let audit = verify_aggregation(&tampered, &primary, &calls, &samples);
        assert!(!audit.passed());
        let failed: Vec<usize> = audit.entries().iter().enumerate()
            .filter(|(_, e)| !e.passed)
            .map(|(i, _)| i)
            .collect();
        // gene, density, and primary match checks
        assert!(failed.contains(&0));
        assert!(failed.contains(&1));
        assert!(failed.contains(&2));
    }

    #[test]
    fn test_report_pages() {
        let (primary, calls, samples) = fixture();
        let aggregated = aggregate(&primary, &calls, &samples, AggregationConfig::default()).unwrap();
        let audit = verify_aggregation(&aggregated, &primary, &calls, &samples);

        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonReportSink::new(&dir.path().join("metrics.json"));
        emit_report(&audit, &aggregated, &primary, "Primary: p.tsv", &mut sink).unwrap();

        let titles: Vec<String> = sink.pages().iter().map(|p| p.title()).collect();
        assert_eq!(titles[0], AUDIT_TITLE);
        assert!(titles[1].contains("Imputed Ref Depth"));
        assert!(titles.iter().any(|t| t == "Entries from calls for sample s2"));
        assert!(titles.iter().any(|t| t == "Imputed rows for sample s3"));
        assert_eq!(titles.last().unwrap(), "Source of variant data for each sample");

        // primary VAF > 0.5 table has only the chr1 row
        match &sink.pages()[2] {
            ReportPage::Table { rows, .. } => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0][1], "chr1");
            },
            other => panic!("unexpected page {other:?}")
        }
        // calls VAF = 6 / 36 > 0.1
        match &sink.pages()[3] {
            ReportPage::Table { rows, .. } => assert_eq!(rows.len(), 1),
            other => panic!("unexpected page {other:?}")
        }
        assert!(dir.path().join("metrics.json").exists());
    }
}
