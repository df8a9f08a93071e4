
use itertools::Itertools;
use log::info;
use rustc_hash::FxHashSet as HashSet;
use serde::Serialize;
use strum_macros::EnumString;

/// The supported manifest edits
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::Display, EnumString, Serialize, clap::ValueEnum)]
pub enum PopulationMethod {
    /// Sorted union of the manifest and the provided samples
    #[strum(ascii_case_insensitive, serialize = "SELECT_POPS")]
    #[clap(name = "SELECT_POPS")]
    SelectPops,
    /// Sorted manifest samples that are not in the provided list
    #[strum(ascii_case_insensitive, serialize = "REMOVE_POPS")]
    #[clap(name = "REMOVE_POPS")]
    RemovePops,
}

/// Applies a manifest edit; the result is always sorted and unique.
/// # Arguments
/// * `method` - union or difference
/// * `manifest` - the current sample list
/// * `samples` - the samples to add or remove
pub fn modify_population(method: PopulationMethod, manifest: &[String], samples: &[String]) -> Vec<String> {
    let result: Vec<String> = match method {
        PopulationMethod::SelectPops => manifest.iter()
            .chain(samples.iter())
            .cloned()
            .sorted()
            .dedup()
            .collect(),
        PopulationMethod::RemovePops => {
            let removed: HashSet<&String> = samples.iter().collect();
            manifest.iter()
                .filter(|s| !removed.contains(s))
                .cloned()
                .sorted()
                .dedup()
                .collect()
        }
    };
    info!("{method}: {} samples -> {} samples", manifest.len(), result.len());
    result
}
