//! Places CLI - Command-line interface for GeoPlaces
//!
//! Commands:
//! - features: Preprocess, cluster, and dump per-cluster feature records
//! - validate: Validate raw geolocation records
//! - doctor: Diagnose engine configuration and persisted tables
//! - schema: Print schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use geoplaces::cluster::GeoDbscan;
use geoplaces::features::FeatureRecord;
use geoplaces::normalizer::NormStats;
use geoplaces::pipeline::{PlaceFinder, PlacesConfig};
use geoplaces::predict::PlaceClassifier;
use geoplaces::types::{RawGeoRecord, UserProfile};
use geoplaces::{EncodingTable, PlacesError, ENGINE_VERSION};

/// GeoPlaces - batch engine for deriving a user's significant places
#[derive(Parser)]
#[command(name = "places")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Derive significant-place features from geolocation pings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Preprocess, cluster, and dump per-cluster feature records
    Features {
        /// User profiles file (use - for stdin)
        #[arg(long)]
        profiles: PathBuf,

        /// Raw geolocation records file
        #[arg(long)]
        events: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        /// Minimum events a user must retain in the window
        #[arg(long, default_value = "50")]
        min_events: usize,

        /// Clustering neighborhood radius in kilometers
        #[arg(long, default_value = "0.25")]
        max_distance_km: f64,

        /// Minimum clustering neighborhood size
        #[arg(long, default_value = "50")]
        min_samples: usize,
    },

    /// Validate raw geolocation records
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose engine configuration and persisted tables
    Doctor {
        /// Check a persisted encoding table
        #[arg(long)]
        encodings: Option<PathBuf>,

        /// Check a persisted normalization-stats table
        #[arg(long)]
        norm_stats: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// JSON array of records
    Json,
    /// Newline-delimited JSON (one record per line)
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// JSON array
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Newline-delimited JSON (one record per line)
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input tables (profiles and raw geolocation records)
    Input,
    /// Output mapping (per-user places)
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PlacesCliError> {
    match cli.command {
        Commands::Features {
            profiles,
            events,
            output,
            input_format,
            output_format,
            min_events,
            max_distance_km,
            min_samples,
        } => cmd_features(
            &profiles,
            &events,
            &output,
            input_format,
            output_format,
            PlacesConfig {
                min_events,
                max_distance_km,
                min_samples,
            },
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor {
            encodings,
            norm_stats,
            json,
        } => cmd_doctor(encodings.as_deref(), norm_stats.as_deref(), json),

        Commands::Schema { schema_type } => cmd_schema(schema_type),
    }
}

/// Placeholder classifier for the features command; stages 1-3 never reach it.
struct NoClassifier;

impl PlaceClassifier for NoClassifier {
    fn predict(&self, _matrix: &[Vec<f64>]) -> Result<Vec<i64>, PlacesError> {
        Err(PlacesError::ClassifierFailed(
            "no classifier configured".to_string(),
        ))
    }
}

fn cmd_features(
    profiles: &Path,
    events: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: PlacesConfig,
) -> Result<(), PlacesCliError> {
    let profile_data = read_input(profiles)?;
    let event_data = read_input(events)?;

    let profiles: Vec<UserProfile> = parse_records(&profile_data, &input_format)?;
    let records: Vec<RawGeoRecord> = parse_records(&event_data, &input_format)?;

    if records.is_empty() {
        return Err(PlacesCliError::NoRecords);
    }

    let finder = PlaceFinder::new(
        GeoDbscan::new(config.max_distance_km, config.min_samples),
        NoClassifier,
    )
    .with_config(config);
    let features = finder.feature_records(&profiles, &records)?;

    let output_data = format_output(&features, &output_format)?;
    write_output(output, &output_data)
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    json: bool,
) -> Result<(), PlacesCliError> {
    let input_data = read_input(input)?;

    let mut errors: Vec<ValidationErrorDetail> = Vec::new();
    let mut total = 0;

    match input_format {
        InputFormat::Ndjson => {
            for (index, line) in input_data.lines().enumerate() {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                total += 1;
                match serde_json::from_str::<RawGeoRecord>(trimmed) {
                    Ok(record) => {
                        if let Some(error) = coordinate_error(&record) {
                            errors.push(ValidationErrorDetail { index, error });
                        }
                    }
                    Err(e) => errors.push(ValidationErrorDetail {
                        index,
                        error: e.to_string(),
                    }),
                }
            }
        }
        InputFormat::Json => {
            let records: Vec<RawGeoRecord> = serde_json::from_str(&input_data)?;
            total = records.len();
            for (index, record) in records.iter().enumerate() {
                if let Some(error) = coordinate_error(record) {
                    errors.push(ValidationErrorDetail { index, error });
                }
            }
        }
    }

    let report = ValidationReport {
        total_records: total,
        valid_records: total - errors.len(),
        invalid_records: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Record {}: {}", err.index, err.error);
            }
        }
    }

    if report.invalid_records > 0 {
        Err(PlacesCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn coordinate_error(record: &RawGeoRecord) -> Option<String> {
    if !(-90.0..=90.0).contains(&record.lat) {
        return Some(format!("latitude {} out of range", record.lat));
    }
    if !(-180.0..=180.0).contains(&record.lon) {
        return Some(format!("longitude {} out of range", record.lon));
    }
    None
}

fn cmd_doctor(
    encodings: Option<&Path>,
    norm_stats: Option<&Path>,
    json: bool,
) -> Result<(), PlacesCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("GeoPlaces version {}", ENGINE_VERSION),
    });

    if let Some(path) = encodings {
        checks.push(check_table(path, "encodings", |content| {
            let table = EncodingTable::from_json(content)?;
            Ok(format!(
                "Encoding table valid (version {}, {} source codes)",
                table.version,
                table.top_source.len()
            ))
        }));
    }

    if let Some(path) = norm_stats {
        checks.push(check_table(path, "norm_stats", |content| {
            let stats = NormStats::from_json(content)?;
            Ok(format!(
                "Normalization stats valid (version {}, {} columns)",
                stats.version,
                stats.columns.len()
            ))
        }));
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (batch mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("GeoPlaces Doctor Report");
        println!("=======================");
        println!("Version: {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PlacesCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_table(
    path: &Path,
    name: &str,
    parse: impl Fn(&str) -> Result<String, serde_json::Error>,
) -> DoctorCheck {
    if !path.exists() {
        return DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: format!("{} file does not exist", name),
        };
    }
    match fs::read_to_string(path) {
        Ok(content) => match parse(&content) {
            Ok(message) => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Ok,
                message,
            },
            Err(e) => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid {} JSON: {}", name, e),
            },
        },
        Err(e) => DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot read {} file: {}", name, e),
        },
    }
}

fn cmd_schema(schema_type: SchemaType) -> Result<(), PlacesCliError> {
    match schema_type {
        SchemaType::Input => {
            println!("Input Tables");
            println!();
            println!("1. profiles - One row per user:");
            println!("   - user_id, age_bucket, locale, device");
            println!("   - local_time_offset_minutes (UTC-to-local correction)");
            println!();
            println!("2. events - Raw geolocation pings:");
            println!("   - user_id, timestamp (naive, uncorrected), lat, lon");
            println!("   - source (connectivity, e.g. gsm/wifi/lte)");
            println!("   - reason (recording trigger)");
            println!("   - is_charge (device was charging; defaults to false)");
            println!();
            println!("Users absent from either table are dropped.");
        }
        SchemaType::Output => {
            println!("Output Mapping");
            println!();
            println!("A nested JSON object keyed by user and cluster:");
            println!();
            println!("- \"user_<id>\": one entry per retained user");
            println!("  - \"cluster<i>\": 1-based per-user cluster index");
            println!("    - lat, lon: cluster centroid");
            println!("    - radius: max member distance in meters, floor 50");
            println!("    - category: classifier label for the place");
        }
    }

    Ok(())
}

// Helper functions

fn read_input(path: &Path) -> Result<String, PlacesCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn write_output(path: &Path, data: &str) -> Result<(), PlacesCliError> {
    if path.to_string_lossy() == "-" {
        print!("{}", data);
        Ok(())
    } else {
        Ok(fs::write(path, data)?)
    }
}

fn parse_records<T: serde::de::DeserializeOwned>(
    data: &str,
    format: &InputFormat,
) -> Result<Vec<T>, PlacesCliError> {
    match format {
        InputFormat::Json => Ok(serde_json::from_str(data)?),
        InputFormat::Ndjson => {
            let mut records = Vec::new();
            for line in data.lines() {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                records.push(serde_json::from_str(trimmed)?);
            }
            Ok(records)
        }
    }
}

fn format_output(features: &[FeatureRecord], format: &OutputFormat) -> Result<String, PlacesCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(features)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(features)?),
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for record in features {
                lines.push(serde_json::to_string(record)?);
            }
            Ok(lines.join("\n") + "\n")
        }
    }
}

// Error types

#[derive(Debug)]
enum PlacesCliError {
    Io(io::Error),
    Json(serde_json::Error),
    Engine(PlacesError),
    NoRecords,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for PlacesCliError {
    fn from(e: io::Error) -> Self {
        PlacesCliError::Io(e)
    }
}

impl From<serde_json::Error> for PlacesCliError {
    fn from(e: serde_json::Error) -> Self {
        PlacesCliError::Json(e)
    }
}

impl From<PlacesError> for PlacesCliError {
    fn from(e: PlacesError) -> Self {
        PlacesCliError::Engine(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PlacesCliError> for CliError {
    fn from(e: PlacesCliError) -> Self {
        match e {
            PlacesCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PlacesCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PlacesCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'places validate' on the input".to_string()),
            },
            PlacesCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PlacesCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            PlacesCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
