//! emx-mr (Module Responses) - maintenance tool for participant response documents
//!
//! Runs legacy key cleanup, alias rename migration, per-question aggregation and
//! duplicate-key audits against the configured response database.

use anyhow::{bail, Context, Result};
use clap::Parser;
use emx_common::config::load_config;
use emx_common::db::{init_database, SqliteResponseStore};
use emx_common::CleanupReport;
use emx_mr::commands::{run_aggregate, run_audit, run_cleanup, run_migrate, summarize};
use emx_mr::{env_filter, log_subscriber, parse_log_level, Cli, Command};
use tracing::{error, info, warn};
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (subscriber, log_filter) = log_subscriber(std::io::stderr);
    subscriber.init();

    info!("Starting EmotioX module response maintenance (emx-mr) v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    log_filter
        .reload(env_filter(parse_log_level(&config.logging.level)))
        .context("Failed to apply configured log level")?;

    let db_path = cli.database.clone().unwrap_or_else(|| config.database_path.clone());
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };
    let store = SqliteResponseStore::new(pool);

    let resolver = config.resolver().context("Failed to load legacy alias table")?;
    info!("Alias table v{} loaded", resolver.version());

    match cli.command {
        Command::Cleanup { keys, dry_run } => {
            let report = run_cleanup(&store, &resolver, &keys, config.cleanup.to_options(dry_run)).await?;
            finish_pass("cleanup", &report)?;
        }
        Command::Migrate { dry_run } => {
            let report = run_migrate(&store, &resolver, config.cleanup.to_options(dry_run)).await?;
            finish_pass("migrate", &report)?;
        }
        Command::Aggregate { research } => {
            let mut stdout = std::io::stdout().lock();
            let questions = run_aggregate(&store, &resolver, &research, &mut stdout).await?;
            info!("Aggregated {} questions for research {}", questions, research);
        }
        Command::Audit { research } => {
            let report = run_audit(&store, &resolver, research.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Print the pass summary; a pass with failed writes exits non-zero
fn finish_pass(pass: &str, report: &CleanupReport) -> Result<()> {
    println!("{}", summarize(pass, report));
    for conflict in &report.conflicts {
        warn!(
            "{}: {} kept in document {} ({} already present)",
            pass, conflict.alias, conflict.document_id, conflict.canonical
        );
    }
    for failure in &report.failures {
        error!("{}", failure);
    }
    if !report.failures.is_empty() {
        bail!("{} document writes failed during {}", report.failures.len(), pass);
    }
    Ok(())
}
