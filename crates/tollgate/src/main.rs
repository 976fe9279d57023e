//! Tollgate CLI binary.
//!
//! Drives a single-host deployment: inspect accounts, start trials, request
//! and cancel paid tiers, and run simulated metered operations.

use clap::Parser;
use tollgate::{LocalDeployment, LogFormat, TollgateConfig, init_tracing};

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, handle_command};

    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_tracing(format, cli.verbose)?;

    let config = match &cli.config {
        Some(path) => TollgateConfig::from_file(path)?,
        None => TollgateConfig::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(LocalDeployment::default_data_dir);

    let local = LocalDeployment::open(&data_dir, config).await?;
    let result = handle_command(&local, cli.command, cli.json).await;
    local.close().await;
    result?;

    Ok(())
}
