use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kilat::cli::{run_command, Cli, Commands};
use kilat::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration. `config check` reports load errors itself.
    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(_) if matches!(cli.command, Commands::Config(_)) => Config::default(),
        Err(e) => return Err(e),
    };
    cli.apply_overrides(&mut config);

    // Initialize logging. Logs go to stderr so command output stays clean.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Kilat v{}", env!("CARGO_PKG_VERSION"));

    run_command(&cli, config).await
}
