use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use screening::{ErrorClass, ScreeningConfig, ScreeningService, ScreeningTelemetry};
use serde_json::{json, Map, Value};
use shared_event_bus::FileEventPublisher;

#[derive(Parser, Debug)]
#[command(name = "screen", version, about = "Online screening service CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs a single screening request from a JSON file (`-` reads stdin).
    Predict {
        /// Request file holding a JSON object of field values.
        input: PathBuf,
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        /// Structured JSON log sink.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Durable operational event log.
        #[arg(long)]
        event_log: Option<PathBuf>,
    },
    /// Prints dataset size and model readiness.
    Status {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Predict {
            input,
            data_dir,
            log,
            event_log,
        } => {
            let mut config = ScreeningConfig::in_dir(&data_dir);
            if let Some(path) = log {
                config = config.with_log_path(path);
            }
            if let Some(path) = event_log {
                config = config.with_event_log_path(path);
            }
            predict(&input, &config)
        }
        Commands::Status { data_dir } => {
            let service = ScreeningService::bootstrap(ScreeningConfig::in_dir(&data_dir))?;
            println!("{}", serde_json::to_string_pretty(&service.status())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn predict(input: &Path, config: &ScreeningConfig) -> Result<ExitCode> {
    let raw = read_input(input)?;
    let request: Map<String, Value> =
        serde_json::from_str(&raw).context("parsing request JSON")?;
    let service = build_service(config)?;
    match service.screen(&request) {
        Ok(prediction) => {
            println!("{}", json!({ "probability": prediction.probability }));
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("{}", json!({ "error": err.to_string() }));
            Ok(match err.class() {
                ErrorClass::Client => ExitCode::from(2),
                ErrorClass::Server => ExitCode::FAILURE,
            })
        }
    }
}

fn build_service(config: &ScreeningConfig) -> Result<ScreeningService> {
    let service = ScreeningService::bootstrap(config.clone())?;
    if config.log_path.is_none() && config.event_log_path.is_none() {
        return Ok(service);
    }
    let mut builder = ScreeningTelemetry::builder("screen.cli");
    if let Some(path) = &config.log_path {
        builder = builder.log_path(path);
    }
    if let Some(path) = &config.event_log_path {
        builder = builder.event_publisher(Arc::new(FileEventPublisher::new(path)?));
    }
    Ok(service.with_telemetry(builder.build()?))
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("reading request from stdin")?;
        Ok(buffer)
    } else {
        fs::read_to_string(path).with_context(|| format!("reading {path:?}"))
    }
}
