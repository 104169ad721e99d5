//! accrual-sync binary.

use accrual_sync::cli::{self, Cli};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `RUST_LOG` wins over `--log-level`.
fn log_filter(cli: &Cli) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::parse_cli();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(log_filter(&cli))
        .init();

    cli::run_with_cli(cli).await
}
