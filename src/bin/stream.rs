//! Stream CLI - Command-line interface for Synheart Stream
//!
//! Commands:
//! - decode: Replay recorded notifications into events (batch mode)
//! - run: Decode notifications from stdin as they arrive (streaming mode)
//! - validate: Validate a notification recording
//! - control: Print PMD control point frames
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use synheart_stream::protocol::{settings_request, start_frame, stop_frame};
use synheart_stream::record::{
    parse_array, parse_ndjson, replay, validate_records, NotificationRecord, RecordValidationError,
    ReplayClock, RECORD_SCHEMA_VERSION,
};
use synheart_stream::{
    MeasurementType, StreamConfig, StreamError, StreamEvent, StreamSession, PRODUCER_NAME,
    STREAM_VERSION,
};

/// Stream - Real-time decoder for Polar biosensor notifications
#[derive(Parser)]
#[command(name = "stream")]
#[command(author = "Synheart AI Inc")]
#[command(version = STREAM_VERSION)]
#[command(about = "Decode Polar GATT notifications into physiological signals", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a notification recording into events (batch mode)
    Decode {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Pipeline configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Decode NDJSON notifications from stdin (streaming mode)
    Run {
        /// Pipeline configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Validate a notification recording
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the bytes to write to the PMD control point
    Control {
        /// Measurement stream
        #[arg(value_enum)]
        measurement: Measurement,

        /// Print the stop frame instead of the start frame
        #[arg(long, conflicts_with = "settings")]
        stop: bool,

        /// Print the settings request instead of the start frame
        #[arg(long)]
        settings: bool,

        /// Output as a JSON byte array
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one notification per line)
    Ndjson,
    /// JSON array of notifications
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum Measurement {
    Ecg,
    Ppg,
    Acc,
}

impl From<Measurement> for MeasurementType {
    fn from(m: Measurement) -> Self {
        match m {
            Measurement::Ecg => MeasurementType::Ecg,
            Measurement::Ppg => MeasurementType::Ppg,
            Measurement::Acc => MeasurementType::Acc,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), StreamCliError> {
    match cli.command {
        Commands::Decode {
            input,
            output,
            input_format,
            output_format,
            config,
        } => cmd_decode(&input, &output, input_format, output_format, config.as_deref()),

        Commands::Run { config, flush } => cmd_run(config.as_deref(), flush),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Control {
            measurement,
            stop,
            settings,
            json,
        } => cmd_control(measurement.into(), stop, settings, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn cmd_decode(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
) -> Result<(), StreamCliError> {
    let records = read_records(input, input_format)?;
    if records.is_empty() {
        return Err(StreamCliError::NoRecords);
    }

    let invalid = validate_records(&records);
    if let Some(first) = invalid.first() {
        return Err(StreamCliError::Validation(first.error.clone()));
    }

    let mut session = StreamSession::with_clock(load_config(config)?, ReplayClock::new());
    let events = replay(&mut session, &records);
    log::info!(
        "Decoded {} notifications into {} events",
        records.len(),
        events.len()
    );

    let output_data = format_output(&events, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(config: Option<&Path>, flush: bool) -> Result<(), StreamCliError> {
    let mut session = StreamSession::with_clock(load_config(config)?, ReplayClock::new());

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let record: NotificationRecord = serde_json::from_str(trimmed).map_err(|e| {
            StreamCliError::ParseError(format!("Failed to parse notification: {}", e))
        })?;
        record.validate()?;

        session.clock_mut().advance(&record);
        for event in session.ingest(record.frame()) {
            writeln!(stdout, "{}", serde_json::to_string(&event)?)?;
        }
        if flush {
            stdout.flush()?;
        }
    }

    stdout.flush()?;
    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), StreamCliError> {
    let records = read_records(input, input_format)?;
    let results = validate_records(&records);

    let report = ValidationReport {
        total_records: records.len(),
        valid_records: records.len() - results.len(),
        invalid_records: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                error: r.error.to_string(),
            })
            .collect(),
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
        Err(StreamCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_control(
    measurement: MeasurementType,
    stop: bool,
    settings: bool,
    json: bool,
) -> Result<(), StreamCliError> {
    let frame: Vec<u8> = if stop {
        stop_frame(measurement).to_vec()
    } else if settings {
        settings_request(measurement).to_vec()
    } else {
        start_frame(measurement).to_vec()
    };

    if json {
        println!("{}", serde_json::to_string(&frame)?);
    } else {
        let hex: Vec<String> = frame.iter().map(|b| format!("{:02X}", b)).collect();
        println!("{}", hex.join(" "));
    }
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), StreamCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "stream_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Stream version {}", STREAM_VERSION),
    });

    checks.push(DoctorCheck {
        name: "record_schema".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", RECORD_SCHEMA_VERSION),
    });

    if let Some(config_path) = config {
        let check = if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(content) => match StreamConfig::from_json(&content) {
                    Ok(config) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Config valid (ACC window {} samples, respiration FFT {} points)",
                            config.acc_capacity, config.respiration_padding
                        ),
                    },
                    Err(e) => DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: e.to_string(),
                    },
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read config file: {}", e),
                },
            }
        } else {
            DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist, defaults will be used".to_string(),
            }
        };
        checks.push(check);
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
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: STREAM_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Stream Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(StreamCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn read_input(input: &Path) -> Result<String, StreamCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_records(
    input: &Path,
    input_format: InputFormat,
) -> Result<Vec<NotificationRecord>, StreamCliError> {
    let input_data = read_input(input)?;
    let records = match input_format {
        InputFormat::Ndjson => parse_ndjson(&input_data)?,
        InputFormat::Json => parse_array(&input_data)?,
    };
    Ok(records)
}

fn load_config(path: Option<&Path>) -> Result<StreamConfig, StreamCliError> {
    match path {
        Some(path) => Ok(StreamConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(StreamConfig::default()),
    }
}

fn format_output(events: &[StreamEvent], format: &OutputFormat) -> Result<String, StreamCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for event in events {
                lines.push(serde_json::to_string(event)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(events)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(events)?),
    }
}

#[derive(Debug)]
enum StreamCliError {
    Io(io::Error),
    Stream(StreamError),
    Json(serde_json::Error),
    Validation(RecordValidationError),
    NoRecords,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for StreamCliError {
    fn from(e: io::Error) -> Self {
        StreamCliError::Io(e)
    }
}

impl From<StreamError> for StreamCliError {
    fn from(e: StreamError) -> Self {
        StreamCliError::Stream(e)
    }
}

impl From<serde_json::Error> for StreamCliError {
    fn from(e: serde_json::Error) -> Self {
        StreamCliError::Json(e)
    }
}

impl From<RecordValidationError> for StreamCliError {
    fn from(e: RecordValidationError) -> Self {
        StreamCliError::Validation(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<StreamCliError> for CliError {
    fn from(e: StreamCliError) -> Self {
        match e {
            StreamCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            StreamCliError::Stream(StreamError::Config(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'stream doctor --config <file>' for details".to_string()),
            },
            StreamCliError::Stream(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Ensure input matches {} schema", RECORD_SCHEMA_VERSION)),
            },
            StreamCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            StreamCliError::Validation(e) => CliError {
                code: "VALIDATION_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'stream validate' for details".to_string()),
            },
            StreamCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No notifications found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            StreamCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            StreamCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            StreamCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
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
    producer: String,
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
