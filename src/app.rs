use anyhow::{Context, Result};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::config::Config;
use crate::discovery::{publish_discovery, Catalog};
use crate::mqtt::MqttSession;
use crate::utils::Console;

/// Report the target, connect once, publish discovery, disconnect.
///
/// Exit code 1 means the connection was never established. Individual
/// publish failures are only warned about.
pub async fn run(config: Config) -> Result<ExitCode> {
    let catalog = Catalog::builtin().context("Built-in sensor catalog is invalid")?;
    let mut console = Console::stdout();
    let target = &config.mqtt.target;

    console.report_target(target);

    let (session, outcome) = MqttSession::connect(&config.mqtt).await;
    console.report_outcome(&outcome, target);

    if !outcome.is_accepted() {
        info!("Aborting before publish: {:?}", outcome);
        return Ok(ExitCode::from(1));
    }

    let report = publish_discovery(&session, &catalog, &config.discovery.prefix, &mut console).await;
    if !report.all_published() {
        warn!("Some discovery messages were not published: {:?}", report.failed);
    }

    session.close().await;
    info!("Discovery run completed");
    Ok(ExitCode::SUCCESS)
}
