//! swarm-bot entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Multi-account AMM transaction runner
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via SWARM_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    swarm_telemetry::init_logging()?;

    info!("Starting swarm-bot v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > SWARM_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("SWARM_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = swarm_bot::AppConfig::from_file(&config_path)?;
    info!(chain = %config.chain, operation = %config.plan.operation, "Configuration loaded");

    let app = swarm_bot::Application::new(config)?;
    let summary = app.run().await?;
    info!(?summary, "Run complete");

    Ok(())
}
