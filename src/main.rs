//! Sensorstate server
//!
//! Run with: cargo run -- serve
//!
//! # Configuration
//!
//! Loaded from `--config <path>` or the default locations, with environment
//! overrides (see `sensorstate config`). `RUST_LOG` takes precedence over the
//! configured log level.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sensorstate::api::dto::DataParams;
use sensorstate::api::routes::data::parse_window;
use sensorstate::api::{serve, AppState};
use sensorstate::archiver::HttpArchiver;
use sensorstate::config::{generate_default_config, Config, LoggingConfig};
use sensorstate::snapshot::QueryEngine;
use sensorstate::watchdog::{HttpWatchdogSink, Watchdog, WatchdogSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sensorstate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Windowed sensor snapshots joined from archiver metadata and statistics")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Fetch one snapshot and print it as JSON
    Snapshot {
        /// Window start, seconds since the Unix epoch (default: 10 minutes ago)
        #[arg(long)]
        from: Option<String>,
        /// Window length in seconds (default: 300)
        #[arg(long)]
        window: Option<String>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Config { output }) = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => std::fs::write(path, content)
                .with_context(|| format!("writing config to {:?}", path))?,
            None => print!("{}", content),
        }
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;

    let watchdog = Arc::new(build_watchdog(&config)?);
    let archiver = Arc::new(HttpArchiver::new(config.archiver_config())?);
    let engine = Arc::new(
        QueryEngine::new(archiver.clone(), archiver, config.engine_config()?)
            .with_watchdog(Arc::clone(&watchdog)),
    );

    match cli.command {
        Some(Commands::Snapshot { from, window }) => {
            let params = DataParams { from, window };
            let (start, length) = parse_window(&params, chrono::Utc::now())?;
            let snapshot = engine.get_snapshot(start, length).await?;
            println!("{}", String::from_utf8(snapshot.to_json_pretty()?)?);
        }
        Some(Commands::Serve) | None => {
            tracing::info!("Starting Sensorstate server v{}", env!("CARGO_PKG_VERSION"));
            tracing::info!(
                archiver = %config.archiver.url,
                max_entries = config.cache.max_entries,
                settle_guard_secs = config.cache.settle_guard_secs,
                "Snapshot engine configured"
            );

            let heartbeat = config
                .watchdog
                .enabled
                .then(|| Arc::clone(&watchdog).start_heartbeat());

            serve(AppState::new(engine, config.api.clone()), &config.api).await?;

            if let Some(handle) = heartbeat {
                handle.abort();
            }
            tracing::info!("Sensorstate server stopped");
        }
        Some(Commands::Config { .. }) => {}
    }

    Ok(())
}

/// Load the config and install the configured subscriber
///
/// Load diagnostics are reported once the subscriber is installed.
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            let config = Config::load_with_env(path)?;
            init_logging(&config.logging);
            tracing::info!("Loaded config from {:?}", path);
            Ok(config)
        }
        None => {
            let outcome = Config::load_default();
            init_logging(&outcome.config.logging);
            outcome.report();
            Ok(outcome.config)
        }
    }
}

/// Initialize tracing from the logging config
fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("sensorstate={},tower_http=info", logging.level).into()
    });
    let json = logging.format.eq_ignore_ascii_case("json");

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

/// Watchdog posting to the configured service, or logging only
fn build_watchdog(config: &Config) -> anyhow::Result<Watchdog> {
    let watchdog_config = config.watchdog_config();

    match (config.watchdog.enabled, &config.watchdog.url) {
        (true, Some(url)) => {
            let sink: Arc<dyn WatchdogSink> = Arc::new(
                HttpWatchdogSink::new(url.clone(), config.watchdog.request_timeout_ms)
                    .context("creating watchdog client")?,
            );
            Ok(Watchdog::new(sink, watchdog_config))
        }
        (true, None) => {
            tracing::warn!("Watchdog enabled without a url, signals will only be logged");
            Ok(Watchdog::log_only(watchdog_config))
        }
        _ => Ok(Watchdog::log_only(watchdog_config)),
    }
}
