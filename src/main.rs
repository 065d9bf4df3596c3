//! CLI entry point for the bike-share preprocessing pipeline.
//!
//! Provides subcommands for cleaning a directory of raw trip and GPS files,
//! printing the quality report without writing outputs, and printing the
//! cleaned-table column manifests.

use anyhow::{Context, Result};
use bikeshare_prep::output::{self, print_pretty, report_json};
use bikeshare_prep::records::DatasetKind;
use bikeshare_prep::schema::output_manifest;
use bikeshare_prep::{PipelineConfig, PipelineError, PipelineInputs};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bikeshare_prep")]
#[command(about = "Clean and validate bike-share trip and GPS data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean raw trip and GPS files and write the cleaned tables and report
    Clean {
        /// Directory containing routes_*.csv and locations_*.csv files
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Directory to write cleaned tables, manifests and the report to
        #[arg(short, long, default_value = "processed_data")]
        output_dir: PathBuf,

        /// Optional JSON file overriding bounds and formats
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Gzip compress the cleaned CSV tables
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Run the pipeline and print the quality report without writing files
    Report {
        /// Directory containing routes_*.csv and locations_*.csv files
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Optional JSON file overriding bounds and formats
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the column manifests of the cleaned tables
    Manifest,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bikeshare_prep.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"))
        .to_path_buf();
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bikeshare_prep.log"))
        .to_owned();

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(env_filter("RUST_LOG", "info"));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(env_filter("RUST_LOG_JSON", "debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let stage = e
                .downcast_ref::<PipelineError>()
                .map(PipelineError::stage)
                .unwrap_or("cli");
            let message = format!("{e:#}");
            error!(stage, error = %message, "Preprocessing failed");
            ExitCode::FAILURE
        }
    }
}

fn env_filter(var: &str, default_level: &str) -> EnvFilter {
    let filter = EnvFilter::from_env(var);
    match default_level.parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::load(path)?;
            info!(path = %path.display(), "Loaded configuration");
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Clean {
            data_dir,
            output_dir,
            config,
            gzip,
        } => {
            let config = load_config(config.as_deref())?;
            let inputs = PipelineInputs::discover(&data_dir, &config)?;
            info!(
                trip_files = inputs.trip_files.len(),
                gps_files = inputs.gps_files.len(),
                "Input files discovered"
            );

            let result = bikeshare_prep::run(&inputs, &config)?;
            print_pretty(&result.report);

            let written = output::write_outputs(&output_dir, &result, gzip)
                .with_context(|| format!("writing outputs to {}", output_dir.display()))?;
            for path in &written {
                info!(path = %path.display(), "Output saved");
            }
            info!(
                trips = result.trips.len(),
                gps_points = result.gps_points.len(),
                "Preprocessing completed"
            );
        }
        Commands::Report { data_dir, config } => {
            let config = load_config(config.as_deref())?;
            let inputs = PipelineInputs::discover(&data_dir, &config)?;
            let result = bikeshare_prep::run(&inputs, &config)?;
            println!("{}", report_json(&result.report)?);
        }
        Commands::Manifest => {
            let manifests = serde_json::json!({
                "trips": output_manifest(DatasetKind::Trips),
                "gps_points": output_manifest(DatasetKind::GpsPoints),
            });
            println!("{}", serde_json::to_string_pretty(&manifests)?);
        }
    }

    Ok(())
}
