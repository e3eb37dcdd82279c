mod app;
mod config;
mod discovery;
mod mqtt;
mod utils;

use anyhow::Result;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr; stdout carries the operator diagnostics.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting SmartGas discovery publisher");

    let config = Config::load()?;
    info!("Configuration loaded: {:?}", config.mqtt.target.host);

    app::run(config).await
}
