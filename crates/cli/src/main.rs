mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use promptvault_engine::{PromptVault, VaultConfig};
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => VaultConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => VaultConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.store.path = db.clone();
    }

    // RUST_LOG wins over the config file. stdout is reserved for JSON.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .context("invalid logging filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(store = %config.store.path, "configuration resolved");
    let vault = PromptVault::open(&config).context("opening vault")?;
    let output = cli.command.execute(&vault)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
