//! Command-line interface parsing for paddock
//!
//! Global flags override the loaded `Config`; subcommands select what to
//! fetch or which cache administration command to run.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use paddock_core::{AdminCommand, AggregationStrategy, Config};

/// Paddock - OpenF1 season results, standings and cache administration
#[derive(Parser, Debug)]
#[command(name = "paddock")]
#[command(about = "OpenF1 season results and championship standings")]
#[command(version)]
pub struct Cli {
    /// Season to fetch (overrides config and PADDOCK_SEASON)
    #[arg(long, global = true, value_name = "YEAR")]
    pub season: Option<u16>,

    /// Cache directory (defaults to the per-season user cache directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Keep the cache in memory for this run only
    #[arg(long, global = true, conflicts_with = "cache_dir")]
    pub memory: bool,

    /// How session results are fetched
    #[arg(long, global = true, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the season's race sessions with winners
    Sessions,
    /// Cumulative championship points per driver
    Chart {
        /// Print the chart data as JSON instead of a standings table
        #[arg(long)]
        json: bool,
    },
    /// Cache administration
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CacheAction {
    /// Remove every cached entry for the season and refetch
    Clear,
    /// Remove only expired entries
    ClearExpired,
    /// Fetch and cache results for the given session keys
    Prime {
        #[arg(required = true, value_name = "SESSION_KEY")]
        session_keys: Vec<i64>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyArg {
    PerSession,
    Bulk,
}

impl From<StrategyArg> for AggregationStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::PerSession => AggregationStrategy::PerSession,
            StrategyArg::Bulk => AggregationStrategy::Bulk,
        }
    }
}

impl Cli {
    /// Apply command-line overrides on top of file and environment config
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(season) = self.season {
            config.season = season;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy.into();
        }
    }
}

impl CacheAction {
    pub fn to_admin_command(&self) -> AdminCommand {
        match self {
            CacheAction::Clear => AdminCommand::ClearAllCache,
            CacheAction::ClearExpired => AdminCommand::ClearExpired,
            CacheAction::Prime { session_keys } => match session_keys.as_slice() {
                [single] => AdminCommand::PrimeCache(*single),
                keys => AdminCommand::PrimeCacheMultiple(keys.to_vec()),
            },
        }
    }
}
