//! reqguard maintenance CLI entry point

use clap::Parser;
use reqguard::cli::{anonymize, cleanup, export, run, verify, Cli, Commands};
use reqguard::config::Config;
use reqguard::{logging, Ledgers};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    logging::init()?;

    let config = Config::from_env()?;
    let ledgers = Ledgers::connect(&config).await?;
    info!(database = %config.database.url, "Ledgers initialized");

    let result = match &cli.command {
        Commands::Verify(args) => verify::execute(args, &ledgers).await,
        Commands::Export(args) => export::execute(args, &ledgers).await,
        Commands::Cleanup(args) => cleanup::execute(args, &config.idempotency, &ledgers).await,
        Commands::Anonymize(args) => anonymize::execute(args, &ledgers).await,
        Commands::Run(args) => run::execute(args, &config, &ledgers).await,
    };

    ledgers.close().await;
    result
}
