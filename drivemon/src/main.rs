//! Console tool for checking, monitoring and diagnosing an ACS310-class
//! drive over Modbus RTU.

mod config;
mod render;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;

use drivemon_client::client::DriveClient;
use drivemon_client::poller::DrivePoller;
use drivemon_client::registers::{SWEEP_END, SWEEP_START};
use drivemon_client::stop::stop_channel;
use drivemon_client::sweep::RegisterSweep;
use drivemon_client::transport::SerialTransport;

use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};

/// Drive diagnostics over Modbus RTU.
#[derive(Parser, Debug)]
#[command(name = "drivemon")]
#[command(about = "Connectivity checks, monitoring and fault diagnostics for an ACS310 drive")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the serial port (e.g. /dev/ttyUSB0)
    #[arg(long)]
    port: Option<String>,

    /// Override the Modbus unit/slave ID (1-247)
    #[arg(long)]
    unit_id: Option<u8>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One-shot connectivity test and fault diagnosis
    Check {
        /// Print the sample as JSON instead of a text report
        #[arg(long)]
        json: bool,
    },

    /// Poll the drive continuously, one status line per cycle
    Monitor,

    /// Walk the operating-data registers one address at a time
    Registers {
        /// First address of the walk
        #[arg(long, default_value_t = SWEEP_START)]
        from: u16,

        /// Last address of the walk (inclusive)
        #[arg(long, default_value_t = SWEEP_END)]
        to: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.connection.port = port;
    }
    if let Some(unit_id) = args.unit_id {
        config.connection.unit_id = unit_id;
    }
    config.validate().context("Invalid configuration")?;

    let level = args
        .log_level
        .unwrap_or_else(|| config.logging.level.clone());
    init_tracing(&level)?;

    match args.command {
        Command::Check { json } => run_check(&config, json).await,
        Command::Monitor => run_monitor(&config).await,
        Command::Registers { from, to } => run_registers(&config, from, to).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_PATH);
            if fallback.exists() {
                AppConfig::load_from_file(fallback)
                    .with_context(|| format!("Failed to load config from {}", fallback.display()))
            } else {
                Ok(AppConfig::default())
            }
        }
    }
}

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so `check --json` leaves clean JSON on stdout.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    Ok(())
}

async fn run_check(config: &AppConfig, json: bool) -> Result<()> {
    info!(
        port = %config.connection.port,
        unit_id = config.connection.unit_id,
        "Checking drive"
    );

    let transport = SerialTransport::new(config.connection.clone());
    let mut client = DriveClient::new(transport);
    let sample = client.check().await.context("Drive check failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sample)?);
    } else {
        println!("{}", render::check_report(&sample));
    }

    Ok(())
}

async fn run_monitor(config: &AppConfig) -> Result<()> {
    let transport = SerialTransport::new(config.connection.clone());
    let client = DriveClient::new(transport);
    let mut poller = DrivePoller::new(client, config.poll.interval());

    let (stop_handle, stop_token) = stop_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop_handle.stop();
        }
    });

    println!(
        "Monitoring drive on {} every {} ms (Ctrl+C to stop)",
        config.connection.port, config.poll.interval_ms
    );

    let (tx, mut rx) = mpsc::channel(16);
    let worker = tokio::spawn(async move { poller.run(tx, stop_token).await });

    let mut printed = false;
    while let Some(update) = rx.recv().await {
        let line = match update {
            Ok(sample) => render::monitor_line(&sample),
            Err(e) => format!("read failed: {}", e),
        };
        print!("\r{:<70}", line);
        io::stdout().flush()?;
        printed = true;
    }
    if printed {
        println!();
    }

    worker
        .await
        .context("Poller task panicked")?
        .context("Monitoring failed")?;

    println!("Stopped.");
    Ok(())
}

async fn run_registers(config: &AppConfig, from: u16, to: u16) -> Result<()> {
    if from > to {
        anyhow::bail!("--from ({}) must not exceed --to ({})", from, to);
    }

    let transport = SerialTransport::new(config.connection.clone());
    let client = DriveClient::new(transport);
    let mut sweep = RegisterSweep::new(client, from..=to, config.poll.interval());

    let (stop_handle, stop_token) = stop_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop_handle.stop();
        }
    });

    println!(
        "Reading registers {}..={} on {} (Ctrl+C to stop)",
        from, to, config.connection.port
    );

    let (tx, mut rx) = mpsc::channel(16);
    let worker = tokio::spawn(async move { sweep.run(tx, stop_token).await });

    let mut read = 0u32;
    while let Some(entry) = rx.recv().await {
        match entry {
            Ok(entry) => {
                println!("{}", render::sweep_line(&entry));
                read += 1;
            }
            Err(e) => eprintln!("{}", e),
        }
    }

    worker
        .await
        .context("Sweep task panicked")?
        .context("Register sweep failed")?;

    println!("{} register(s) read", read);
    Ok(())
}
