//! Paddock - OpenF1 season results and championship standings.
//!
//! Fetches race sessions and results through the paddock-core pipeline,
//! caching them on disk, and prints session tables, standings or chart JSON.

mod cli;
mod output;

use std::io;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Command};
use paddock_core::{
    transform, ApiClient, CacheManager, Config, FileStore, KeyValueStore, MemoryStore, SessionPipeline,
};

type Pipeline = SessionPipeline<paddock_core::api::ReqwestTransport, Box<dyn KeyValueStore + Send + Sync>>;

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG to control the level (e.g. RUST_LOG=paddock_core=debug).
/// With a log file, the returned guard must be held until exit so buffered
/// lines are flushed.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            Ok(None)
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load()?;
    config.apply_env_overrides()?;
    cli.apply_to(&mut config);
    Ok(config)
}

fn build_pipeline(cli: &Cli, config: &Config) -> Result<Pipeline> {
    let store: Box<dyn KeyValueStore + Send + Sync> = if cli.memory {
        Box::new(MemoryStore::with_capacity(config.cache_capacity_bytes))
    } else {
        let dir = match &cli.cache_dir {
            Some(dir) => dir.clone(),
            None => config.cache_dir()?,
        };
        info!(dir = %dir.display(), "Using file cache");
        let store = FileStore::with_capacity(dir.clone(), config.cache_capacity_bytes)
            .with_context(|| format!("Failed to open cache directory: {}", dir.display()))?;
        Box::new(store)
    };

    let keys = config.cache_keys();
    let cache = CacheManager::new(store, &keys.prefixes());
    let client = ApiClient::new(config.endpoints(), config.retry.clone(), config.request_timeout())?;

    Ok(SessionPipeline::new(client, cache, keys, config.cache_ttl()).with_strategy(config.strategy))
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    info!(season = config.season, strategy = ?config.strategy, "Paddock starting");
    let pipeline = build_pipeline(&cli, &config)?;

    match &cli.command {
        Command::Sessions => {
            let aggregate = pipeline
                .load_race_sessions()
                .await
                .context("Failed to load race sessions")?;
            print!("{}", output::render_sessions(&aggregate));
        }
        Command::Chart { json } => {
            let aggregate = pipeline
                .load_race_sessions()
                .await
                .context("Failed to load race sessions")?;
            let drivers = match pipeline.fetch_drivers().await {
                Ok(drivers) => drivers,
                Err(e) => {
                    warn!(error = %e, "Failed to fetch drivers, using names from results");
                    Vec::new()
                }
            };
            let data = transform(&aggregate.sessions, &drivers);
            if *json {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                print!("{}", output::render_standings(&data));
            }
        }
        Command::Cache { action } => {
            let outcome = pipeline.execute(action.to_admin_command()).await;
            println!("{}", output::render_admin(outcome)?);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let _guard = match init_tracing(cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
