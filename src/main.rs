
use log::{LevelFilter, error, info, warn};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

use pairtree_prep::aggregator::{aggregate, AggregationConfigBuilder};
use pairtree_prep::cli::aggregate::{AggregateSettings, check_aggregate_settings};
use pairtree_prep::cli::core::{Commands, get_cli};
use pairtree_prep::cli::format::{FormatSettings, check_format_settings, prefixed_filename, PARAMS_EXTENSION, SSM_EXTENSION};
use pairtree_prep::cli::import_clusters::{ImportClustersSettings, check_import_clusters_settings};
use pairtree_prep::cli::modify_pop::{ModifyPopSettings, check_modify_pop_settings};
use pairtree_prep::cli::modify_ssm::{ModifySsmSettings, check_modify_ssm_settings};
use pairtree_prep::cli::split_data::{SplitDataSettings, check_split_data_settings};
use pairtree_prep::data_types::mutation::MutationRecord;
use pairtree_prep::data_types::observation::Observation;
use pairtree_prep::data_types::parameters::Parameters;
use pairtree_prep::data_types::table::Table;
use pairtree_prep::editors::clusters::import_clusters;
use pairtree_prep::editors::population::modify_population;
use pairtree_prep::editors::split::{split_by_clusters, write_split_groups};
use pairtree_prep::editors::ssm::{SsmEdit, apply_edit};
use pairtree_prep::errors::{ConfigurationError, DataIntegrityError, SchemaError};
use pairtree_prep::formatter::{FormatterConfigBuilder, IngestionVariant, NameConvention, format_mutations};
use pairtree_prep::parsing::manifest::{manifest_from_table, manifest_to_table};
use pairtree_prep::parsing::mutation_file::load_mutation_file;
use pairtree_prep::parsing::schema::{SampleLevelSchema, SourceSchema, normalize_sample_level, normalize_table};
use pairtree_prep::parsing::table_io::{read_table, write_table};
use pairtree_prep::util::json_io::{load_json, save_json};
use pairtree_prep::verifier::{emit_report, verify_aggregation};
use pairtree_prep::writers::aggregated::write_aggregated_table;
use pairtree_prep::writers::mutation_file::write_mutation_file;
use pairtree_prep::writers::report::JsonReportSink;

/// Sets up logging before we check the other settings
fn init_logging(verbosity: u8) {
    let filter_level: LevelFilter = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();
}

/// Maps an error category to the process exit status
fn exit_code(e: &anyhow::Error) -> i32 {
    if e.downcast_ref::<ConfigurationError>().is_some() {
        exitcode::CONFIG
    } else if e.downcast_ref::<SchemaError>().is_some() || e.downcast_ref::<DataIntegrityError>().is_some() {
        exitcode::DATAERR
    } else {
        exitcode::IOERR
    }
}

/// Logs the error and exits with the status for its category
fn exit_with_error(context: &str, e: anyhow::Error) -> ! {
    error!("{context}: {e:#}");
    std::process::exit(exit_code(&e));
}

/// Creates the parent folder of an output file if needed
fn create_parent_folder(filename: &Path) {
    if let Some(parent) = filename.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                error!("Error while creating output folder {parent:?}: {e}");
                std::process::exit(exitcode::IOERR);
            }
        }
    }
}

/// Saves the resolved CLI options into the debug folder, if one was requested
fn save_cli_settings<T: Serialize>(settings: &T, debug_folder: Option<&Path>) {
    if let Some(debug_folder) = debug_folder {
        info!("Creating debug folder at {debug_folder:?}...");
        if let Err(e) = std::fs::create_dir_all(debug_folder) {
            error!("Error while creating debug folder: {e}");
            std::process::exit(exitcode::IOERR);
        }

        let cli_json = debug_folder.join("cli_settings.json");
        info!("Saving CLI options to {cli_json:?}...");
        if let Err(e) = save_json(settings, &cli_json) {
            error!("Error while saving CLI options: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    }
}

/// Writes a mutation file and its params file next to each other
fn write_formatted(prefix: &Path, records: &[MutationRecord], parameters: &Parameters) {
    let ssm_filename = prefixed_filename(prefix, SSM_EXTENSION);
    let params_filename = prefixed_filename(prefix, PARAMS_EXTENSION);
    create_parent_folder(&ssm_filename);

    info!("Saving mutation file to {ssm_filename:?}...");
    if let Err(e) = write_mutation_file(records, &ssm_filename) {
        exit_with_error("Error while saving mutation file", e);
    }
    info!("Saving params file to {params_filename:?}...");
    if let Err(e) = save_json(parameters, &params_filename) {
        exit_with_error("Error while saving params file", e);
    }
}

fn run_aggregate(settings: AggregateSettings) {
    // start the timer
    let start_time = Instant::now();
    init_logging(settings.verbosity);

    let settings = match check_aggregate_settings(settings) {
        Ok(s) => s,
        Err(e) => exit_with_error("Error while verifying settings", e)
    };
    save_cli_settings(&settings, settings.debug_folder.as_deref());

    // load everything fully before any output is touched
    info!("Loading primary table...");
    let primary = match read_table(&settings.primary_filename, settings.primary_sheet.as_deref(), Some(0))
        .and_then(|t| normalize_table(&t, &SourceSchema::primary().with_sample_suffix(&settings.sample_suffix))) {
        Ok(p) => p,
        Err(e) => exit_with_error("Error while loading primary table", e)
    };
    info!("Loading calls table...");
    let calls = match read_table(&settings.calls_filename, settings.calls_sheet.as_deref(), Some(0))
        .and_then(|t| normalize_table(&t, &SourceSchema::calls().with_sample_suffix(&settings.sample_suffix))) {
        Ok(c) => c,
        Err(e) => exit_with_error("Error while loading calls table", e)
    };
    info!("Loading population manifest...");
    let header_row = settings.populations_header.then_some(0);
    let samples = match read_table(&settings.populations_filename, settings.populations_sheet.as_deref(), header_row)
        .and_then(|t| Ok(manifest_from_table(&t)?)) {
        Ok(s) => s,
        Err(e) => exit_with_error("Error while loading population manifest", e)
    };
    info!("Loaded {} primary rows, {} calls rows, and {} samples", primary.len(), calls.len(), samples.len());

    let config = match AggregationConfigBuilder::default()
        .impute_technique(settings.impute_technique)
        .build() {
        Ok(c) => c,
        Err(e) => {
            error!("Error while building aggregation config: {e:?}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };
    let aggregated = match aggregate(&primary, &calls, &samples, config) {
        Ok(a) => a,
        Err(e) => exit_with_error("Error while aggregating", e)
    };

    // verification never blocks the outputs
    let audit = verify_aggregation(&aggregated, &primary, &calls, &samples);
    if audit.passed() {
        info!("All aggregation checks passed.");
    } else {
        warn!("One or more aggregation checks failed, see the log or report for details.");
    }

    create_parent_folder(&settings.output_filename);
    info!("Saving aggregated table to {:?}...", settings.output_filename);
    if let Err(e) = write_aggregated_table(&aggregated, &settings.output_filename, None) {
        exit_with_error("Error while saving aggregated table", e);
    }

    if let Some(report_filename) = settings.report_filename.as_deref() {
        create_parent_folder(report_filename);
        info!("Saving aggregation report to {report_filename:?}...");
        let details = format!(
            "Primary: {}\nCalls: {}\nPopulations: {}\nAggregated: {}\nImputation: {}",
            settings.primary_filename.display(), settings.calls_filename.display(),
            settings.populations_filename.display(), settings.output_filename.display(),
            settings.impute_technique
        );
        let mut sink = JsonReportSink::new(report_filename);
        if let Err(e) = emit_report(&audit, &aggregated, &primary, &details, &mut sink) {
            exit_with_error("Error while saving aggregation report", e);
        }
    }

    if let Some(prefix) = settings.ssm_prefix.as_deref() {
        let observations: Vec<Observation> = aggregated.records().iter().map(Observation::from).collect();
        let (records, parameters) = match format_mutations(&observations, Default::default()) {
            Ok(r) => r,
            Err(e) => exit_with_error("Error while formatting mutations", e)
        };
        write_formatted(prefix, &records, &parameters);
    }

    info!("Aggregation completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn run_format(settings: FormatSettings) {
    let start_time = Instant::now();
    init_logging(settings.verbosity);

    let settings = match check_format_settings(settings) {
        Ok(s) => s,
        Err(e) => exit_with_error("Error while verifying settings", e)
    };
    save_cli_settings(&settings, settings.debug_folder.as_deref());

    info!("Loading input table...");
    let observations = match read_table(&settings.input_filename, settings.input_sheet.as_deref(), Some(0))
        .and_then(|table| match settings.ingestion_variant {
            IngestionVariant::Aggregated => normalize_table(&table, &SourceSchema::aggregated())
                .map(|records| records.iter().map(Observation::from).collect()),
            IngestionVariant::SampleLevel => normalize_sample_level(&table, &SampleLevelSchema::default())
        }) {
        Ok(o) => o,
        Err(e) => exit_with_error("Error while loading input table", e)
    };

    let config = match FormatterConfigBuilder::default()
        .ingestion_variant(settings.ingestion_variant)
        .name_convention(settings.name_convention)
        .build() {
        Ok(c) => c,
        Err(e) => {
            error!("Error while building formatter config: {e:?}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };
    let (records, parameters) = match format_mutations(&observations, config) {
        Ok(r) => r,
        Err(e) => exit_with_error("Error while formatting mutations", e)
    };
    write_formatted(&settings.output_prefix, &records, &parameters);

    info!("Formatting completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

/// Loads a list of names from the first column of a headerless table
fn load_name_list(filename: &Path) -> anyhow::Result<Vec<String>> {
    let table: Table = read_table(filename, None, None)?;
    if table.columns().is_empty() {
        return Ok(vec![]);
    }
    Ok(table.column_cells(0).filter_map(|c| c.as_text()).collect())
}

fn run_modify_ssm(settings: ModifySsmSettings) {
    let start_time = Instant::now();
    init_logging(settings.verbosity);

    let settings = match check_modify_ssm_settings(settings) {
        Ok(s) => s,
        Err(e) => exit_with_error("Error while verifying settings", e)
    };
    save_cli_settings(&settings, settings.debug_folder.as_deref());

    let records = match load_mutation_file(&settings.input_filename) {
        Ok(r) => r,
        Err(e) => exit_with_error("Error while loading mutation file", e)
    };
    let names = match settings.names_filename.as_deref().map(load_name_list).transpose() {
        Ok(n) => n,
        Err(e) => exit_with_error("Error while loading names file", e)
    };
    let parameters: Option<Parameters> = match settings.params_filename.as_deref().map(load_json::<Parameters>).transpose() {
        Ok(p) => p,
        Err(e) => exit_with_error("Error while loading params file", e)
    };

    // the method was verified during the settings check
    let Some(method) = settings.method else {
        std::process::exit(exitcode::SOFTWARE);
    };
    let edit = match SsmEdit::from_args(method, &settings.method_args, names, parameters) {
        Ok(e) => e,
        Err(e) => exit_with_error("Error while parsing method arguments", e.into())
    };
    let input_count = records.len();
    let (records, updated_parameters) = match apply_edit(records, edit) {
        Ok(r) => r,
        Err(e) => exit_with_error("Error while editing mutation file", e)
    };
    info!("{method}: {input_count} mutations -> {} mutations", records.len());

    create_parent_folder(&settings.output_filename);
    info!("Saving mutation file to {:?}...", settings.output_filename);
    if let Err(e) = write_mutation_file(&records, &settings.output_filename) {
        exit_with_error("Error while saving mutation file", e);
    }
    if let (Some(parameters), Some(params_filename)) = (updated_parameters, settings.output_params_filename.as_deref()) {
        info!("Saving params file to {params_filename:?}...");
        if let Err(e) = save_json(&parameters, params_filename) {
            exit_with_error("Error while saving params file", e);
        }
    }

    info!("Modification completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn run_modify_pop(settings: ModifyPopSettings) {
    let start_time = Instant::now();
    init_logging(settings.verbosity);

    let settings = match check_modify_pop_settings(settings) {
        Ok(s) => s,
        Err(e) => exit_with_error("Error while verifying settings", e)
    };

    let manifest = match read_table(&settings.manifest_filename, None, None)
        .and_then(|t| Ok(manifest_from_table(&t)?)) {
        Ok(m) => m,
        Err(e) => exit_with_error("Error while loading population manifest", e)
    };
    let samples = match load_name_list(&settings.pops_filename) {
        Ok(s) => s,
        Err(e) => exit_with_error("Error while loading population list", e)
    };
    let Some(method) = settings.method else {
        std::process::exit(exitcode::SOFTWARE);
    };

    let result = modify_population(method, &manifest, &samples);
    create_parent_folder(&settings.output_filename);
    info!("Saving population manifest to {:?}...", settings.output_filename);
    if let Err(e) = write_table(&manifest_to_table(&result), &settings.output_filename, None, false) {
        exit_with_error("Error while saving population manifest", e);
    }

    info!("Modification completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn run_import_clusters(settings: ImportClustersSettings) {
    let start_time = Instant::now();
    init_logging(settings.verbosity);

    let settings = match check_import_clusters_settings(settings) {
        Ok(s) => s,
        Err(e) => exit_with_error("Error while verifying settings", e)
    };

    let clusters_table = match read_table(&settings.clusters_filename, None, Some(0)) {
        Ok(t) => t,
        Err(e) => exit_with_error("Error while loading clusters file", e)
    };
    let records = match load_mutation_file(&settings.ssm_filename) {
        Ok(r) => r,
        Err(e) => exit_with_error("Error while loading mutation file", e)
    };
    let mut parameters: Parameters = match load_json(&settings.params_filename) {
        Ok(p) => p,
        Err(e) => exit_with_error("Error while loading params file", e)
    };

    parameters.clusters = match import_clusters(&clusters_table, &records) {
        Ok(c) => c,
        Err(e) => exit_with_error("Error while importing clusters", e)
    };

    let output_params = settings.output_params();
    info!("Saving params file to {output_params:?}...");
    if let Err(e) = save_json(&parameters, &output_params) {
        exit_with_error("Error while saving params file", e);
    }

    info!("Import completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn run_split_data(settings: SplitDataSettings) {
    let start_time = Instant::now();
    init_logging(settings.verbosity);

    let settings = match check_split_data_settings(settings) {
        Ok(s) => s,
        Err(e) => exit_with_error("Error while verifying settings", e)
    };
    let jobs = match settings.jobs() {
        Ok(j) => j,
        Err(e) => exit_with_error("Error while resolving inputs", e)
    };
    let columns = settings.columns();
    let convention: NameConvention = settings.name_convention;

    for job in jobs.iter() {
        info!("Splitting {:?}...", job.data_filename);
        let records = match load_mutation_file(&job.ssm_filename) {
            Ok(r) => r,
            Err(e) => exit_with_error("Error while loading mutation file", e)
        };
        let parameters: Parameters = match load_json(&job.params_filename) {
            Ok(p) => p,
            Err(e) => exit_with_error("Error while loading params file", e)
        };
        let data = match read_table(&job.data_filename, None, Some(0)) {
            Ok(t) => t,
            Err(e) => exit_with_error("Error while loading data file", e)
        };
        let groups = match split_by_clusters(&records, &parameters, &data, convention, &columns) {
            Ok(g) => g,
            Err(e) => exit_with_error("Error while splitting data", e)
        };

        if let Err(e) = write_split_groups(&groups, &job.output_folder) {
            exit_with_error("Error while saving split data", e);
        }
    }

    info!("Split completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn main() {
    let cli = get_cli();
    match cli.command {
        Commands::Aggregate(settings) => {
            run_aggregate(*settings);
        },
        Commands::Format(settings) => {
            run_format(*settings);
        },
        Commands::ModifySsm(settings) => {
            run_modify_ssm(*settings);
        },
        Commands::ModifyPop(settings) => {
            run_modify_pop(*settings);
        },
        Commands::ImportClusters(settings) => {
            run_import_clusters(*settings);
        },
        Commands::SplitData(settings) => {
            run_split_data(*settings);
        }
    }

    info!("Process finished successfully.");
}
