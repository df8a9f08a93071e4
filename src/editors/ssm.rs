
use log::{debug, info};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use serde::Serialize;
use strum_macros::EnumString;

use crate::data_types::mutation::{assign_ids, MutationRecord};
use crate::data_types::parameters::Parameters;
use crate::errors::ConfigurationError;

/// Comparison applied between a sample VAF and a threshold
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::Display, EnumString, Serialize)]
pub enum CompareOp {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = "!=")]
    Ne,
}

impl CompareOp {
    /// Evaluates `lhs <op> rhs`
    pub fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Ne => lhs != rhs
        }
    }
}

/// The supported mutation-file edits
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::Display, EnumString, Serialize, clap::ValueEnum)]
pub enum ModifyMethod {
    /// Drop mutations where any sample VAF matches the comparison
    #[strum(ascii_case_insensitive, serialize = "RM_VARS_BY_VAF")]
    #[clap(name = "RM_VARS_BY_VAF")]
    RemoveVarsByVaf,
    /// Move mutations where any sample VAF matches the comparison to the end
    #[strum(ascii_case_insensitive, serialize = "ORG_VARS_BY_VAF")]
    #[clap(name = "ORG_VARS_BY_VAF")]
    OrganizeVarsByVaf,
    /// Cap per-sample coverage at twice the cell count
    #[strum(ascii_case_insensitive, serialize = "SCALE_COUNTS")]
    #[clap(name = "SCALE_COUNTS")]
    ScaleCounts,
    /// Keep only the listed mutation names
    #[strum(ascii_case_insensitive, serialize = "KEEP_VARS_BY_NAME")]
    #[clap(name = "KEEP_VARS_BY_NAME")]
    KeepVarsByName,
    /// Move mutations flagged as garbage in the params file to the end
    #[strum(ascii_case_insensitive, serialize = "SEPARATE_GARBAGE")]
    #[clap(name = "SEPARATE_GARBAGE")]
    SeparateGarbage,
}

/// A fully parsed edit, ready to apply
#[derive(Clone, Debug, PartialEq)]
pub enum SsmEdit {
    RemoveVarsByVaf { op: CompareOp, vaf: f64 },
    OrganizeVarsByVaf { op: CompareOp, vaf: f64, var_read_prob: Option<f64> },
    /// One count for all samples, or one per sample
    ScaleCounts { cell_counts: Vec<u64> },
    KeepVarsByName { names: Vec<String> },
    SeparateGarbage { parameters: Parameters },
}

impl SsmEdit {
    /// Builds an edit from the raw method arguments.
    /// # Arguments
    /// * `method` - the selected edit
    /// * `args` - positional arguments, e.g. `[">", "0.5"]` for a VAF filter
    /// * `names` - mutation names, required for KEEP_VARS_BY_NAME
    /// * `parameters` - params file contents, required for SEPARATE_GARBAGE
    /// # Errors
    /// * `ConfigurationError::MissingArgument` if a required argument is absent
    /// * `ConfigurationError::InvalidArgument` if an argument cannot be parsed
    pub fn from_args(method: ModifyMethod, args: &[String], names: Option<Vec<String>>, parameters: Option<Parameters>) -> Result<Self, ConfigurationError> {
        let method_label = method.to_string();
        let missing = |argument: &str| ConfigurationError::MissingArgument {
            method: method_label.clone(), argument: argument.to_string()
        };
        let invalid = |argument: &str, value: &str| ConfigurationError::InvalidArgument {
            method: method_label.clone(), argument: argument.to_string(), value: value.to_string()
        };
        let parse_op = |value: &str| value.parse::<CompareOp>().map_err(|_| invalid("operator", value));
        let parse_float = |argument: &str, value: &str| value.parse::<f64>().map_err(|_| invalid(argument, value));

        let edit = match method {
            ModifyMethod::RemoveVarsByVaf | ModifyMethod::OrganizeVarsByVaf => {
                let op = parse_op(args.first().ok_or_else(|| missing("operator"))?)?;
                let vaf = parse_float("VAF", args.get(1).ok_or_else(|| missing("VAF"))?)?;
                if method == ModifyMethod::RemoveVarsByVaf {
                    SsmEdit::RemoveVarsByVaf { op, vaf }
                } else {
                    let var_read_prob = args.get(2)
                        .map(|p| parse_float("var_read_prob", p))
                        .transpose()?;
                    SsmEdit::OrganizeVarsByVaf { op, vaf, var_read_prob }
                }
            },
            ModifyMethod::ScaleCounts => {
                if args.is_empty() {
                    return Err(missing("cell count"));
                }
                let cell_counts = args.iter()
                    .map(|a| a.parse::<u64>().map_err(|_| invalid("cell count", a)))
                    .collect::<Result<Vec<u64>, _>>()?;
                SsmEdit::ScaleCounts { cell_counts }
            },
            ModifyMethod::KeepVarsByName => SsmEdit::KeepVarsByName {
                names: names.ok_or_else(|| missing("names file"))?
            },
            ModifyMethod::SeparateGarbage => SsmEdit::SeparateGarbage {
                parameters: parameters.ok_or_else(|| missing("params file"))?
            }
        };
        Ok(edit)
    }
}

/// True if any sample VAF of the record satisfies the comparison
fn any_vaf_matches(record: &MutationRecord, op: CompareOp, vaf: f64) -> bool {
    record.vafs().any(|v| op.apply(v, vaf))
}

/// Applies an edit and re-assigns ids in the final order.
/// Returns the edited records, plus updated parameters for edits that change them.
/// # Errors
/// * `ConfigurationError::CountMismatch` if per-sample cell counts do not match the sample count
/// * `DataIntegrityError::UnknownMutationId` if the garbage list names an id that is not in the file
pub fn apply_edit(records: Vec<MutationRecord>, edit: SsmEdit) -> anyhow::Result<(Vec<MutationRecord>, Option<Parameters>)> {
    let before = records.len();
    let (mut records, parameters) = match edit {
        SsmEdit::RemoveVarsByVaf { op, vaf } => (remove_vars_by_vaf(records, op, vaf), None),
        SsmEdit::OrganizeVarsByVaf { op, vaf, var_read_prob } => (organize_vars_by_vaf(records, op, vaf, var_read_prob), None),
        SsmEdit::ScaleCounts { cell_counts } => (scale_counts(records, &cell_counts)?, None),
        SsmEdit::KeepVarsByName { names } => (keep_vars_by_name(records, &names), None),
        SsmEdit::SeparateGarbage { mut parameters } => {
            let records = separate_garbage(records, &mut parameters)?;
            (records, Some(parameters))
        }
    };
    assign_ids(&mut records);
    info!("Mutations before / after edit: {before} / {}", records.len());
    Ok((records, parameters))
}

/// Drops every record where any sample VAF satisfies `vaf_s <op> vaf`
pub fn remove_vars_by_vaf(records: Vec<MutationRecord>, op: CompareOp, vaf: f64) -> Vec<MutationRecord> {
    records.into_iter()
        .filter(|r| !any_vaf_matches(r, op, vaf))
        .collect()
}

/// Moves matching records to the end, keeping relative order in both groups.
/// If `var_read_prob` is provided, it overwrites the probabilities of the moved records.
pub fn organize_vars_by_vaf(records: Vec<MutationRecord>, op: CompareOp, vaf: f64, var_read_prob: Option<f64>) -> Vec<MutationRecord> {
    let (mut matched, unmatched): (Vec<MutationRecord>, Vec<MutationRecord>) = records.into_iter()
        .partition(|r| any_vaf_matches(r, op, vaf));
    debug!("{} records matched VAF {op} {vaf}", matched.len());
    if let Some(prob) = var_read_prob {
        for record in matched.iter_mut() {
            record.fill_var_read_prob(prob);
        }
    }
    unmatched.into_iter().chain(matched).collect()
}

/// Caps per-sample coverage at `2 * cell_count`.
/// When a total exceeds its cap, both counts are divided by `total / cap` and rounded half to even.
/// # Arguments
/// * `records` - the mutations to scale
/// * `cell_counts` - a single count used for every sample, or one count per sample
/// # Errors
/// * if there are multiple counts and their number differs from a record's sample count
pub fn scale_counts(records: Vec<MutationRecord>, cell_counts: &[u64]) -> anyhow::Result<Vec<MutationRecord>> {
    let mut scaled = Vec::with_capacity(records.len());
    for mut record in records.into_iter() {
        let caps: Vec<u64> = if cell_counts.len() == 1 {
            vec![cell_counts[0] * 2; record.num_samples()]
        } else if cell_counts.len() == record.num_samples() {
            cell_counts.iter().map(|c| c * 2).collect()
        } else {
            return Err(ConfigurationError::CountMismatch {
                label: "cell counts".to_string(),
                found: cell_counts.len(),
                expected_label: "samples".to_string(),
                expected: record.num_samples()
            }.into());
        };

        let (var_reads, total_reads): (Vec<u64>, Vec<u64>) = record.var_reads().iter()
            .zip(record.total_reads().iter())
            .zip(caps.iter())
            .map(|((&var, &total), &cap)| {
                if cap > 0 && total > cap {
                    let factor = total as f64 / cap as f64;
                    (
                        (var as f64 / factor).round_ties_even() as u64,
                        (total as f64 / factor).round_ties_even() as u64
                    )
                } else {
                    (var, total)
                }
            })
            .unzip();
        record.set_counts(var_reads, total_reads)?;
        scaled.push(record);
    }
    Ok(scaled)
}

/// Keeps only records whose name is in the provided list
pub fn keep_vars_by_name(records: Vec<MutationRecord>, names: &[String]) -> Vec<MutationRecord> {
    let keep: HashSet<&str> = names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()).collect();
    records.into_iter()
        .filter(|r| keep.contains(r.name()))
        .collect()
}

/// Moves the records listed as garbage to the end, then rewrites the params ids to match the new order.
/// # Errors
/// * if a garbage or cluster id is not present in the records
pub fn separate_garbage(records: Vec<MutationRecord>, parameters: &mut Parameters) -> anyhow::Result<Vec<MutationRecord>> {
    let garbage: HashSet<&str> = parameters.garbage.iter().map(|g| g.as_str()).collect();
    let (garbage_records, kept): (Vec<MutationRecord>, Vec<MutationRecord>) = records.into_iter()
        .partition(|r| garbage.contains(r.id()));
    debug!("Moving {} garbage records to the end", garbage_records.len());

    let mut reordered: Vec<MutationRecord> = kept.into_iter().chain(garbage_records).collect();
    let old_ids: Vec<String> = reordered.iter().map(|r| r.id().to_string()).collect();
    assign_ids(&mut reordered);
    let lookup: HashMap<String, String> = old_ids.into_iter()
        .zip(reordered.iter().map(|r| r.id().to_string()))
        .collect();
    parameters.remap_ids(&lookup)?;
    Ok(reordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DataIntegrityError;

    fn records() -> Vec<MutationRecord> {
        let mut records = vec![
            MutationRecord::new("chr1_1".to_string(), vec![9, 1], vec![10, 10], vec![0.5, 0.5]).unwrap(),
            MutationRecord::new("chr1_2".to_string(), vec![1, 1], vec![10, 10], vec![0.5, 0.5]).unwrap(),
            MutationRecord::new("chr1_3".to_string(), vec![2, 6], vec![10, 10], vec![0.5, 0.5]).unwrap(),
        ];
        assign_ids(&mut records);
        records
    }

    fn names(records: &[MutationRecord]) -> Vec<&str> {
        records.iter().map(|r| r.name()).collect()
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_compare_op() {
        assert_eq!(">=".parse::<CompareOp>().unwrap(), CompareOp::Ge);
        assert!(CompareOp::Ne.apply(0.1, 0.2));
        assert!(!CompareOp::Lt.apply(0.2, 0.2));
        assert!("=>".parse::<CompareOp>().is_err());
    }

    #[test]
    fn test_remove_by_vaf() {
        let edit = SsmEdit::from_args(ModifyMethod::RemoveVarsByVaf, &args(&[">", "0.5"]), None, None).unwrap();
        let (edited, params) = apply_edit(records(), edit).unwrap();
        assert_eq!(names(&edited), vec!["chr1_2"]);
        assert_eq!(edited[0].id(), "s0");
        assert!(params.is_none());
    }

    #[test]
    fn test_organize_by_vaf() {
        let edit = SsmEdit::from_args(ModifyMethod::OrganizeVarsByVaf, &args(&[">", "0.5", "1.0"]), None, None).unwrap();
        let (edited, _) = apply_edit(records(), edit).unwrap();
        assert_eq!(names(&edited), vec!["chr1_2", "chr1_1", "chr1_3"]);
        assert_eq!(edited[0].var_read_prob(), &[0.5, 0.5]);
        assert_eq!(edited[1].var_read_prob(), &[1.0, 1.0]);
        assert_eq!(edited[2].id(), "s2");
    }

    #[test]
    fn test_scale_counts() {
        let input = vec![
            MutationRecord::new("chr1_1".to_string(), vec![5, 3, 25], vec![100, 10, 50], vec![0.5; 3]).unwrap()
        ];
        // cap = 20 for every sample
        let scaled = scale_counts(input.clone(), &[10]).unwrap();
        assert_eq!(scaled[0].total_reads(), &[20, 10, 20]);
        // 5 / 5 = 1, 25 / 2.5 = 10
        assert_eq!(scaled[0].var_reads(), &[1, 3, 10]);

        // per-sample caps: 2, 100, 20
        let scaled = scale_counts(input.clone(), &[1, 50, 10]).unwrap();
        assert_eq!(scaled[0].total_reads(), &[2, 10, 20]);
        // 5 / 50 = 0.1 -> 0
        assert_eq!(scaled[0].var_reads(), &[0, 3, 10]);

        let err = scale_counts(input, &[1, 2]).unwrap_err();
        assert!(matches!(err.downcast_ref::<ConfigurationError>(), Some(ConfigurationError::CountMismatch { .. })));
    }

    #[test]
    fn test_scale_counts_ties_even() {
        // cap 4, factor 2: 5 / 2 = 2.5 -> 2, 3 / 2 = 1.5 -> 2
        let input = vec![MutationRecord::new("chr1_1".to_string(), vec![5, 3], vec![8, 8], vec![0.5; 2]).unwrap()];
        let scaled = scale_counts(input, &[2]).unwrap();
        assert_eq!(scaled[0].var_reads(), &[2, 2]);
        assert_eq!(scaled[0].total_reads(), &[4, 4]);
    }

    #[test]
    fn test_keep_by_name() {
        let edit = SsmEdit::from_args(ModifyMethod::KeepVarsByName, &[], Some(args(&["chr1_3", "chr1_1", "missing"])), None).unwrap();
        let (edited, _) = apply_edit(records(), edit).unwrap();
        assert_eq!(names(&edited), vec!["chr1_1", "chr1_3"]);
        assert_eq!(edited[1].id(), "s1");
    }

    #[test]
    fn test_separate_garbage() {
        let parameters = Parameters {
            samples: vec![vec!["a".to_string(), "b".to_string()]],
            clusters: vec![vec!["s1".to_string(), "s2".to_string()]],
            garbage: vec!["s0".to_string()]
        };
        let edit = SsmEdit::from_args(ModifyMethod::SeparateGarbage, &[], None, Some(parameters)).unwrap();
        let (edited, params) = apply_edit(records(), edit).unwrap();
        assert_eq!(names(&edited), vec!["chr1_2", "chr1_3", "chr1_1"]);
        let params = params.unwrap();
        assert_eq!(params.garbage, vec!["s2".to_string()]);
        assert_eq!(params.clusters, vec![vec!["s0".to_string(), "s1".to_string()]]);

        let bad = Parameters { garbage: vec!["s9".to_string()], ..Default::default() };
        let err = apply_edit(records(), SsmEdit::SeparateGarbage { parameters: bad }).unwrap_err();
        assert!(matches!(err.downcast_ref::<DataIntegrityError>(), Some(DataIntegrityError::UnknownMutationId { .. })));
    }

    #[test]
    fn test_argument_errors() {
        let err = SsmEdit::from_args(ModifyMethod::RemoveVarsByVaf, &args(&[">"]), None, None).unwrap_err();
        assert_eq!(err, ConfigurationError::MissingArgument { method: "RM_VARS_BY_VAF".to_string(), argument: "VAF".to_string() });

        let err = SsmEdit::from_args(ModifyMethod::RemoveVarsByVaf, &args(&["~", "0.5"]), None, None).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidArgument { .. }));

        let err = SsmEdit::from_args(ModifyMethod::SeparateGarbage, &[], None, None).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingArgument { .. }));
    }
}
