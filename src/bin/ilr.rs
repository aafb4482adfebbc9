//! ILR CLI - Command-line interface for the residence-qualification engine
//!
//! Commands:
//! - assess: Run one assessment and print the result bundle
//! - check: Report incomplete or conflicting trips without evaluating eligibility
//! - rules: Print the active rule set

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use ilr_flux::dates::parse_date;
use ilr_flux::normalizer::TripNormalizer;
use ilr_flux::pipeline::IlrCalculator;
use ilr_flux::rules::RuleSet;
use ilr_flux::types::{IlrCalculationInput, IneligibilityReason, TravelCalculationResult};
use ilr_flux::{ComputeError, ENGINE_VERSION};

/// ILR - Continuous-residence eligibility calculator
#[derive(Parser)]
#[command(name = "ilr")]
#[command(author = "Synheart AI Inc")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Check ILR eligibility from a list of trips abroad", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one assessment
    Assess {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        format: OutputFormat,

        /// Reference date for "days until eligible" (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        today: Option<String>,

        /// Load an alternative rule set from a JSON file
        #[arg(long)]
        rules: Option<PathBuf>,
    },

    /// Report incomplete, reversed or overlapping trips
    Check {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the active rule set
    Rules {
        /// Load an alternative rule set from a JSON file
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to install log subscriber");
    }

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

fn run(cli: Cli) -> Result<(), IlrCliError> {
    match cli.command {
        Commands::Assess {
            input,
            output,
            format,
            today,
            rules,
        } => cmd_assess(&input, &output, format, today.as_deref(), rules.as_deref()),

        Commands::Check { input, json } => cmd_check(&input, json),

        Commands::Rules { rules, json } => cmd_rules(rules.as_deref(), json),
    }
}

fn cmd_assess(
    input: &Path,
    output: &Path,
    format: OutputFormat,
    today: Option<&str>,
    rules: Option<&Path>,
) -> Result<(), IlrCliError> {
    let request = read_calculation_input(input)?;

    let mut calculator = IlrCalculator::with_rules(load_rules(rules)?)?;
    if let Some(raw) = today {
        let date = parse_date(raw).ok_or_else(|| IlrCliError::InvalidDate(raw.to_string()))?;
        calculator = calculator.with_today(date);
    }

    info!(trips = request.trips.len(), "running assessment");
    let result = calculator.calculate(&request);
    debug!(eligible = result.validation.is_eligible(), "assessment complete");

    let output_data = format_output(&result, &format)?;
    if output.to_string_lossy() == "-" {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_check(input: &Path, json: bool) -> Result<(), IlrCliError> {
    let request = read_calculation_input(input)?;
    let annotated = TripNormalizer::normalize(&request.trips);

    let incomplete: Vec<TripIssue> = annotated
        .iter()
        .enumerate()
        .filter(|(_, trip)| trip.is_incomplete)
        .map(|(index, trip)| TripIssue {
            index,
            id: trip.trip.id.clone(),
            out_date: trip.trip.out_date.clone(),
            in_date: trip.trip.in_date.clone(),
        })
        .collect();

    // Incomplete trips are listed above; only other input errors are added
    let input_error = match IlrCalculator::new().check(&request) {
        Err(IneligibilityReason::IncorrectInput { message }) => Some(message),
        _ => None,
    };

    let report = CheckReport {
        total_trips: annotated.len(),
        complete_trips: annotated.len() - incomplete.len(),
        total_full_days: annotated.iter().filter_map(|t| t.full_days).sum(),
        incomplete_trips: incomplete,
        input_error,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Trip Check Report");
        println!("=================");
        println!("Total trips:     {}", report.total_trips);
        println!("Complete trips:  {}", report.complete_trips);
        println!("Full days abroad: {}", report.total_full_days);

        if !report.incomplete_trips.is_empty() {
            println!("\nIncomplete trips:");
            for issue in &report.incomplete_trips {
                println!(
                    "  - Trip {} (index {}): out '{}', in '{}'",
                    if issue.id.is_empty() { "unknown" } else { issue.id.as_str() },
                    issue.index,
                    issue.out_date,
                    issue.in_date
                );
            }
        }
        if let Some(message) = &report.input_error {
            println!("\nInput error: {}", message);
        }
    }

    let issues = report.incomplete_trips.len() + usize::from(report.input_error.is_some());
    if issues > 0 {
        Err(IlrCliError::CheckFailed(issues))
    } else {
        Ok(())
    }
}

fn cmd_rules(rules: Option<&Path>, json: bool) -> Result<(), IlrCliError> {
    let rules = load_rules(rules)?;

    if json {
        println!("{}", rules.to_json()?);
    } else {
        println!("Active Rules");
        println!("============");
        println!(
            "Rolling limit:            {} days in any {} months",
            rules.rolling_absence_limit_days, rules.rolling_window_months
        );
        println!(
            "Long residence cutover:   {}",
            rules.transitional_cutover_date
        );
        println!(
            "  single absence cap:     {} days",
            rules.transitional_single_absence_limit_days
        );
        println!(
            "  aggregate cap:          {} days",
            rules.transitional_aggregate_limit_days
        );
        println!("Application lead time:    {} days", rules.application_lead_days);
        println!("Max pre-entry delay:      {} days", rules.max_pre_entry_delay_days);
        println!("Search horizon:           {} days", rules.search_horizon_days);
    }

    Ok(())
}

// Helper functions

fn read_calculation_input(input: &Path) -> Result<IlrCalculationInput, IlrCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(IlrCliError::NoInput);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    if input_data.trim().is_empty() {
        return Err(IlrCliError::NoInput);
    }

    Ok(serde_json::from_str(&input_data)?)
}

fn load_rules(path: Option<&Path>) -> Result<RuleSet, IlrCliError> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            Ok(RuleSet::from_json(&json)?)
        }
        None => Ok(RuleSet::default()),
    }
}

fn format_output(
    result: &TravelCalculationResult,
    format: &OutputFormat,
) -> Result<String, IlrCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(result)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(result)?),
    }
}

// Error types

#[derive(Debug)]
enum IlrCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    InvalidDate(String),
    NoInput,
    CheckFailed(usize),
}

impl From<io::Error> for IlrCliError {
    fn from(e: io::Error) -> Self {
        IlrCliError::Io(e)
    }
}

impl From<ComputeError> for IlrCliError {
    fn from(e: ComputeError) -> Self {
        IlrCliError::Compute(e)
    }
}

impl From<serde_json::Error> for IlrCliError {
    fn from(e: serde_json::Error) -> Self {
        IlrCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<IlrCliError> for CliError {
    fn from(e: IlrCliError) -> Self {
        match e {
            IlrCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            IlrCliError::Compute(e) => CliError {
                code: "COMPUTE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the rule set and input values".to_string()),
            },
            IlrCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Input must be an object with trips, visaStartDate, vignetteEntryDate and ilrTrack".to_string()),
            },
            IlrCliError::InvalidDate(raw) => CliError {
                code: "INVALID_DATE".to_string(),
                message: format!("'{}' is not a valid date", raw),
                hint: Some("Use the YYYY-MM-DD format".to_string()),
            },
            IlrCliError::NoInput => CliError {
                code: "NO_INPUT".to_string(),
                message: "No input provided".to_string(),
                hint: Some("Pass a file with --input or pipe JSON into stdin".to_string()),
            },
            IlrCliError::CheckFailed(count) => CliError {
                code: "CHECK_FAILED".to_string(),
                message: format!("{} issue(s) found in the trip list", count),
                hint: Some("Fix the reported trips and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct CheckReport {
    total_trips: usize,
    complete_trips: usize,
    total_full_days: i64,
    incomplete_trips: Vec<TripIssue>,
    input_error: Option<String>,
}

#[derive(serde::Serialize)]
struct TripIssue {
    index: usize,
    id: String,
    out_date: String,
    in_date: String,
}
