//! Incident Spec CLI
//!
//! Command-line interface for inspecting incident field specs and cleaning
//! query parameters and result records against them.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use incident_spec::{
    lint, load_layer, load_records, param_dict_from_pairs, standard_layer, CleanOptions,
    CleaningError, DataSpec, FileStatus, Severity, Which,
};

#[derive(Parser)]
#[command(name = "incident-spec")]
#[command(about = "Inspect incident field specs and clean parameters and records against them")]
#[command(version)]
struct Cli {
    /// Layer declaration file stacked on the standard catalog (repeatable, most derived first)
    #[arg(long = "layer", global = true, value_name = "FILE")]
    layers: Vec<PathBuf>,

    /// Log filter, e.g. "debug" or "incident_spec=trace"
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the legal keys of one side with their field descriptions
    Keys {
        /// Which side of the API to list
        #[arg(long, default_value = "params", value_parser = ["params", "results"])]
        side: String,

        /// Restrict to required or optional keys
        #[arg(long, default_value = "all", value_parser = ["all", "required", "optional"])]
        which: String,

        /// Only single-value parameters
        #[arg(long, conflicts_with = "multi_only")]
        single_only: bool,

        /// Only multi-value parameters
        #[arg(long)]
        multi_only: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Clean query parameters given as KEY=VALUE pairs (values may be comma-separated)
    CleanParams {
        /// Parameters, e.g. cc=PL,DE category=bots
        #[arg(value_name = "KEY=VALUE")]
        pairs: Vec<String>,

        #[command(flatten)]
        keys: KeyFlags,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Clean result records from a JSON file (an object or an array of objects)
    CleanResults {
        /// Records file
        file: PathBuf,

        /// Log and skip records that fail instead of stopping at the first one
        #[arg(long)]
        skip_invalid: bool,

        #[command(flatten)]
        keys: KeyFlags,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Lint layer declaration files
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

/// Adjustments of the declared key sets.
#[derive(Args)]
struct KeyFlags {
    /// Keys removed before any check
    #[arg(long, value_delimiter = ',', value_name = "KEY")]
    ignore: Vec<String>,

    /// Keys treated as illegal
    #[arg(long, value_delimiter = ',', value_name = "KEY")]
    forbid: Vec<String>,

    /// Keys treated as required
    #[arg(long, value_delimiter = ',', value_name = "KEY")]
    require: Vec<String>,

    /// Keys checked but dropped from the output
    #[arg(long, value_delimiter = ',', value_name = "KEY")]
    discard: Vec<String>,
}

impl KeyFlags {
    fn into_options(self) -> CleanOptions {
        CleanOptions::new()
            .ignored(self.ignore)
            .forbidden(self.forbid)
            .extra_required(self.require)
            .discarded(self.discard)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let result = match cli.command {
        Commands::Keys {
            side,
            which,
            single_only,
            multi_only,
            pretty,
        } => run_keys(&cli.layers, &side, &which, !single_only, !multi_only, pretty),

        Commands::CleanParams { pairs, keys, pretty } => {
            run_clean_params(&cli.layers, &pairs, keys.into_options(), pretty)
        }

        Commands::CleanResults {
            file,
            skip_invalid,
            keys,
            pretty,
        } => run_clean_results(&cli.layers, &file, skip_invalid, keys.into_options(), pretty),

        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&cli.layers, &path, &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Resolve the standard catalog with the given layers on top.
fn build_spec(layer_files: &[PathBuf]) -> Result<DataSpec, u8> {
    let mut layers = Vec::with_capacity(layer_files.len() + 1);
    for path in layer_files {
        let layer = load_layer(path).map_err(|e| {
            eprintln!("Error loading {}: {}", path.display(), e);
            e.exit_code() as u8
        })?;
        layers.push(layer);
    }
    let standard = standard_layer().map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    layers.push(standard);

    DataSpec::from_layers(layers).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), u8> {
    let output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", output);
    Ok(())
}

/// Print a cleaning failure as JSON: the client-facing message plus the
/// internal details.
fn report_cleaning_error(err: &CleaningError, record: Option<usize>, pretty: bool) -> u8 {
    let mut output = json!({
        "error": err.public_message(),
        "details": err.to_string(),
    });
    if let Some(index) = record {
        output["record"] = json!(index);
    }
    print_json(&output, pretty).err().unwrap_or(err.exit_code() as u8)
}

fn run_keys(
    layer_files: &[PathBuf],
    side: &str,
    which: &str,
    multi: bool,
    single: bool,
    pretty: bool,
) -> Result<(), u8> {
    let spec = build_spec(layer_files)?;
    let which = Which::parse(which).unwrap_or(Which::All);

    let fields = if side == "results" {
        spec.result_field_specs(which)
    } else {
        spec.param_field_specs(which, multi, single)
    };
    let output: serde_json::Map<String, serde_json::Value> = fields
        .into_iter()
        .map(|(key, field)| (key.to_string(), field.describe()))
        .collect();
    print_json(&output, pretty)
}

fn run_clean_params(
    layer_files: &[PathBuf],
    pairs: &[String],
    options: CleanOptions,
    pretty: bool,
) -> Result<(), u8> {
    let spec = build_spec(layer_files)?;
    let params = param_dict_from_pairs(pairs).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    match spec.clean_param_dict(&params, &options) {
        Ok(cleaned) => print_json(&cleaned, pretty),
        Err(e) => Err(report_cleaning_error(&e, None, pretty)),
    }
}

fn run_clean_results(
    layer_files: &[PathBuf],
    file: &Path,
    skip_invalid: bool,
    options: CleanOptions,
    pretty: bool,
) -> Result<(), u8> {
    let spec = build_spec(layer_files)?;
    let records = load_records(file).map_err(|e| {
        eprintln!("Error loading {}: {}", file.display(), e);
        e.exit_code() as u8
    })?;

    let mut cleaned = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        match spec.clean_result_dict(record, &options) {
            Ok(result) => cleaned.push(result),
            Err(e) if skip_invalid => {
                error!(record = index, error = %e, "skipping invalid result record");
            }
            Err(e) => return Err(report_cleaning_error(&e, Some(index), pretty)),
        }
    }
    debug!(
        records = records.len(),
        cleaned = cleaned.len(),
        "result records cleaned"
    );
    print_json(&cleaned, pretty)
}

fn run_lint(
    layer_files: &[PathBuf],
    path: &Path,
    format: &str,
    strict: bool,
    quiet: bool,
) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(3);
    }

    let base = build_spec(layer_files)?;
    let result = lint(path, strict, &base);

    if format == "json" {
        print_json(&result, true)?;
    } else {
        if !quiet {
            println!("Linting {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                println!("  {} {}", status_icon, file_result.file.display());
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if result.is_ok() && (!strict || result.warnings == 0) {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.is_ok() && (!strict || result.warnings == 0) {
        Ok(())
    } else {
        Err(1)
    }
}
