//! CLI Entry Point for sci-telemetry
//!
//! Provides command-line interface for:
//! - Running the telemetry core with the maintenance shell on stdin/stdout
//! - Running headless (acquisition and downlink only) until Ctrl-C
//! - Executing one shell command against a freshly started core
//! - Decoding a captured downlink file
//!
//! # Usage
//!
//! ```bash
//! sci-telemetry run --config config/sci_telemetry.toml
//! sci-telemetry run --headless
//! sci-telemetry exec self-test
//! sci-telemetry decode downlink.bin
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use sci_telemetry::config::AppConfig;
use sci_telemetry::data::{unframe_all, SampleRecord};
use sci_telemetry::shell::format::format_record;
use sci_telemetry::shell::{Shell, ShellExit};
use sci_telemetry::{logging, TelemetryApp};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::info;

#[derive(Parser)]
#[command(name = "sci-telemetry")]
#[command(about = "Science PCB telemetry core", long_about = None)]
struct Cli {
    /// Configuration file (defaults to config/sci_telemetry.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the telemetry core
    Run {
        /// No shell; run until Ctrl-C
        #[arg(long)]
        headless: bool,
    },

    /// Run one shell command and exit
    Exec {
        /// Command and arguments, e.g. `calibration-set temp-offset 0 1.5`
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Decode a captured downlink file
    Decode {
        /// File written by the file transport
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;
    logging::init_from_config(&config).map_err(|e| anyhow!(e))?;

    match cli.command {
        Commands::Run { headless: true } => run_headless(config).await,
        Commands::Run { headless: false } => run_interactive(config).await,
        Commands::Exec { command } => exec_once(config, command.join(" ")).await,
        Commands::Decode { file } => decode_capture(file).await,
    }
}

async fn run_headless(config: AppConfig) -> Result<()> {
    let app = TelemetryApp::start(&config).await?;
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    app.shutdown().await;
    Ok(())
}

async fn run_interactive(config: AppConfig) -> Result<()> {
    let mut app = TelemetryApp::start(&config).await?;
    let mut shell = Shell::new(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        app.shell_context(),
    );

    loop {
        let exit = tokio::select! {
            exit = shell.run() => exit?,
            _ = tokio::signal::ctrl_c() => ShellExit::Shutdown,
        };

        if exit != ShellExit::Reboot {
            info!(?exit, "Shell finished");
            app.shutdown().await;
            return Ok(());
        }

        info!("Rebooting telemetry core");
        app.shutdown().await;
        app = TelemetryApp::start(&config).await?;
        shell.replace_context(app.shell_context());
    }
}

async fn exec_once(config: AppConfig, line: String) -> Result<()> {
    let app = TelemetryApp::start(&config).await?;
    // Let the first acquisition cycle land in the buffer
    tokio::time::sleep(config.sample_period()).await;

    let mut shell = Shell::new(tokio::io::empty(), tokio::io::stdout(), app.shell_context());
    let result = shell.execute_line(&line).await;
    app.shutdown().await;
    result?;
    Ok(())
}

async fn decode_capture(file: PathBuf) -> Result<()> {
    let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Failed to read {:?}", file))?;
    let frames = unframe_all(&bytes)?;

    let mut index = 0;
    for (frame_index, records) in frames.iter().enumerate() {
        println!("=== Frame #{} ({} records) ===", frame_index, records.len());
        for encoded in records {
            let record: SampleRecord = encoded.decode();
            print!("{}", format_record(index, &record));
            index += 1;
        }
        println!();
    }
    println!("{} frames, {} records", frames.len(), index);
    Ok(())
}
