//! telemetry-pipeline - Main Entry Point
//!
//! `run` starts the sampling/transform/transmit pipeline and the statistics
//! monitor; `listen` decodes the datagram stream on the receiving side.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use telemetry_pipeline::{
    config::{AppConfig, LoggingSettings},
    wire::{ListenEvent, TelemetryListener, SENSOR_DATA_PORT},
    Runtime,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How often `run` logs channel counters.
const DIAGNOSTIC_INTERVAL: Duration = Duration::from_secs(10);

/// Periodic telemetry pipeline
#[derive(Parser, Debug)]
#[command(name = "telemetry-pipeline")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "TELEMETRY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the pipeline and the statistics monitor
    Run,

    /// Receive and decode telemetry datagrams
    Listen {
        /// Address to bind
        #[arg(short, long, default_value_t = SocketAddr::from(([0, 0, 0, 0], SENSOR_DATA_PORT)))]
        bind: SocketAddr,

        /// Print one JSON object per datagram
        #[arg(long)]
        json: bool,

        /// Stop after this many valid messages
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },

    /// Print the effective configuration as TOML
    DumpConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Run => {
            let _guard = init_logging(&config.logging)?;
            run(&config, cli.config.as_deref())
        }
        Commands::Listen { bind, json, count } => {
            let _guard = init_logging(&LoggingSettings::default())?;
            listen(bind, json, count)
        }
        Commands::DumpConfig => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

/// Console logging plus an optional daily-rolling file.
fn init_logging(settings: &LoggingSettings) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,telemetry_pipeline=debug"));

    let (file_layer, guard) = match &settings.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let prefix = path
                .file_name()
                .context("logging.file has no file name")?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            let appender = tracing_appender::rolling::daily(dir, prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .with(file_layer)
        .init();

    Ok(guard)
}

fn run(config: &AppConfig, path: Option<&Path>) -> Result<()> {
    tracing::info!(
        "Starting telemetry pipeline ({})",
        path.map(|p| p.display().to_string())
            .unwrap_or_else(|| "default config".to_string())
    );

    let runtime = Runtime::start(config).context("Failed to start runtime")?;

    loop {
        std::thread::sleep(DIAGNOSTIC_INTERVAL);
        for probe in runtime.channel_probes() {
            let counters = probe.counters();
            tracing::debug!(
                channel = probe.name(),
                sent = counters.sent,
                dropped = counters.dropped,
                "Channel counters"
            );
        }
        // Drain so the monitor's backlog never fills
        while runtime.records().try_recv().is_ok() {}

        if runtime.handles().iter().all(|h| h.is_finished()) {
            break;
        }
    }

    if !runtime.join() {
        anyhow::bail!("A pipeline task panicked");
    }
    Ok(())
}

fn listen(bind: SocketAddr, json: bool, count: Option<u64>) -> Result<()> {
    let mut listener = TelemetryListener::bind(bind, Duration::from_millis(500))?;
    let mut received = 0u64;

    while count.map_or(true, |n| received < n) {
        let Some(event) = listener.recv()? else {
            continue;
        };
        match event {
            ListenEvent::Message(datagram) => {
                received += 1;
                if json {
                    println!("{}", serde_json::to_string(&datagram)?);
                } else {
                    let m = &datagram.message;
                    println!(
                        "{} {} seq={} sample={} command={}{}",
                        datagram.received_at.format("%H:%M:%S%.3f"),
                        datagram.from,
                        m.seqnum,
                        m.sample,
                        m.command,
                        if datagram.gap > 0 {
                            format!(" (gap {})", datagram.gap)
                        } else {
                            String::new()
                        }
                    );
                }
            }
            ListenEvent::Malformed { from, reason } => {
                if json {
                    println!(
                        "{}",
                        serde_json::json!({ "from": from, "malformed": reason })
                    );
                }
            }
        }
    }

    tracing::info!(
        "Received {} message(s), {} missing",
        received,
        listener.tracker().missing
    );
    Ok(())
}
