//! CLI command definitions for accrual-sync.
//!
//! This module wires configuration, storage, the accrual client and the
//! scheduler together for the binary.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::accrual::AccrualClient;
use crate::config::SchedulerConfig;
use crate::scheduler::{
    BackoffController, ReconciliationCycle, TickDriver, WorkerPool, WorkerPoolConfig,
};
use crate::storage::PgOrderStore;

/// Reconciles pending loyalty orders against the accrual service.
#[derive(Parser, Debug)]
#[command(name = "accrual-sync")]
#[command(about = "Reconcile pending orders against the accrual service and credit balances")]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// PostgreSQL connection string.
    #[arg(short = 'd', long, env = "DATABASE_URI", global = true, default_value = "")]
    pub database_uri: String,

    /// Accrual service address; `http://` is assumed when no scheme is given.
    #[arg(short = 'r', long, env = "ACCRUAL_SYSTEM_ADDRESS", global = true, default_value = "")]
    pub accrual_address: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduler until interrupted.
    Run(SchedulerArgs),

    /// Run a single reconciliation cycle and print its report.
    Once(SchedulerArgs),

    /// Apply the database schema and exit.
    Migrate,
}

/// Scheduler tuning shared by `run` and `once`.
#[derive(clap::Args, Debug, Clone)]
pub struct SchedulerArgs {
    /// Concurrent accrual inquiries per cycle.
    #[arg(long, env = "ACCRUAL_WORKERS", default_value = "5")]
    pub workers: usize,

    /// Seconds between cycles when the accrual service is not throttling.
    #[arg(long, env = "ACCRUAL_POLL_INTERVAL", default_value = "10")]
    pub poll_interval_secs: u64,

    /// Per-request timeout in seconds.
    #[arg(long, default_value = "30")]
    pub request_timeout_secs: u64,
}

impl SchedulerArgs {
    fn to_config(&self, accrual_address: &str) -> SchedulerConfig {
        SchedulerConfig::new(accrual_address)
            .with_workers(self.workers)
            .with_poll_interval(Duration::from_secs(self.poll_interval_secs))
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
    }
}

/// Parses command-line arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parses arguments and runs the selected command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Runs the selected command with already-parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Migrate => {
            let store = connect_store(&cli.database_uri).await?;
            let applied = store.run_migrations().await.context("failed to apply migrations")?;
            info!(applied = applied, "Schema up to date");
            Ok(())
        }
        Commands::Run(args) => {
            let (cycle, backoff) = build_cycle(&cli, args).await?;
            let driver = TickDriver::new(cycle, backoff);
            let shutdown = CancellationToken::new();

            tokio::spawn({
                let shutdown = shutdown.clone();
                async move {
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => info!("Interrupt received, shutting down"),
                        Err(e) => warn!(error = %e, "Failed to listen for interrupt"),
                    }
                    shutdown.cancel();
                }
            });

            driver.run(shutdown).await;
            Ok(())
        }
        Commands::Once(args) => {
            let (cycle, backoff) = build_cycle(&cli, args).await?;
            let report = cycle.run_once().await;
            println!("{:#?}", report);
            println!("next poll interval: {}s", backoff.current_interval().as_secs());
            Ok(())
        }
    }
}

/// Builds the reconciliation cycle. Any failure here is fatal at startup.
async fn build_cycle(
    cli: &Cli,
    args: &SchedulerArgs,
) -> anyhow::Result<(ReconciliationCycle, Arc<BackoffController>)> {
    let config = args.to_config(&cli.accrual_address);
    config.validate().context("invalid scheduler configuration")?;

    let store = connect_store(&cli.database_uri).await?;
    store.run_migrations().await.context("failed to apply migrations")?;

    let client = AccrualClient::new(&config.accrual_address, config.request_timeout)
        .context("failed to create accrual client")?;

    info!(
        accrual = %config.accrual_address,
        workers = config.workers,
        poll_interval_secs = config.poll_interval.as_secs(),
        "Scheduler created"
    );

    let backoff = Arc::new(BackoffController::new(config.poll_interval));
    let pool = WorkerPool::new(
        WorkerPoolConfig::new(config.workers),
        Arc::new(client),
        Arc::clone(&backoff),
    );

    Ok((ReconciliationCycle::new(store, pool), backoff))
}

async fn connect_store(database_uri: &str) -> anyhow::Result<Arc<PgOrderStore>> {
    if database_uri.is_empty() {
        anyhow::bail!("missing database URI (use -d or DATABASE_URI)");
    }

    let store = PgOrderStore::connect(database_uri)
        .await
        .context("failed to open database")?;
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_flags() {
        let cli = Cli::try_parse_from([
            "accrual-sync",
            "-d",
            "postgres://localhost/market",
            "-r",
            "localhost:8081",
            "run",
            "--workers",
            "8",
            "--poll-interval-secs",
            "3",
        ])
        .unwrap();

        assert_eq!(cli.database_uri, "postgres://localhost/market");
        assert_eq!(cli.accrual_address, "localhost:8081");
        match cli.command {
            Commands::Run(args) => {
                let config = args.to_config(&cli.accrual_address);
                assert_eq!(config.accrual_address, "http://localhost:8081");
                assert_eq!(config.workers, 8);
                assert_eq!(config.poll_interval, Duration::from_secs(3));
                assert_eq!(config.request_timeout, Duration::from_secs(30));
            }
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_migrate() {
        let cli = Cli::try_parse_from(["accrual-sync", "migrate", "-d", "postgres://db"]).unwrap();
        assert!(matches!(cli.command, Commands::Migrate));
        assert_eq!(cli.database_uri, "postgres://db");
    }

    #[test]
    fn test_parse_rejects_non_numeric_workers() {
        let result = Cli::try_parse_from(["accrual-sync", "once", "--workers", "many"]);
        assert!(result.is_err());
    }
}
