//! emx-mr library - module response maintenance
//!
//! Operator commands run against the response database: legacy key cleanup,
//! alias rename migration, per-question aggregation and duplicate-key audits.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

pub mod commands;

/// Module response maintenance tool
#[derive(Parser, Debug)]
#[command(name = "emx-mr")]
#[command(about = "Maintenance tool for EmotioX participant module responses")]
#[command(version)]
pub struct Cli {
    /// Config file (overrides EMX_CONFIG and the platform default)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Response database (overrides `database_path` from the config file)
    #[arg(short, long, global = true, value_name = "FILE", env = "EMX_DATABASE")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Remove responses stored under legacy question keys
    Cleanup {
        /// Legacy key to remove (repeatable); defaults to every purge-policy alias
        #[arg(long = "key", value_name = "KEY")]
        keys: Vec<String>,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Rewrite rename-policy aliases to their canonical question key
    Migrate {
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the question-major view of a research as JSON
    Aggregate {
        #[arg(long, value_name = "ID")]
        research: String,
    },

    /// Report documents holding the same question key more than once
    Audit {
        /// Limit the audit to one research
        #[arg(long, value_name = "ID")]
        research: Option<String>,
    },
}

/// Default log level from the configured name
///
/// Falls back to `info` for anything `tracing` does not recognise.
pub fn parse_log_level(level: &str) -> tracing::Level {
    level.parse().unwrap_or(tracing::Level::INFO)
}

/// Handle for swapping the log filter once the configured level is known
pub type LogFilterHandle = reload::Handle<EnvFilter, Registry>;

/// `RUST_LOG` directives on top of a default level
pub fn env_filter(level: tracing::Level) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(level.into())
}

/// Subscriber writing to `writer`, filtered at `info` until reloaded
///
/// Installed before the config file is read so that config loading can log.
pub fn log_subscriber<W>(writer: W) -> (impl Subscriber + Send + Sync + 'static, LogFilterHandle)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let (filter, handle) = reload::Layer::new(env_filter(tracing::Level::INFO));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer));
    (subscriber, handle)
}
