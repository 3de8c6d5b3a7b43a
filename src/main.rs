//! `chat-event-bus` binary: loads settings, wires the backends and
//! listeners, then runs the ledger reaper until Ctrl+C.

use anyhow::{Context, Result};
use tracing::info;

use chat_event_bus::config::Settings;
use chat_event_bus::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    chat_event_bus::telemetry::init_tracing();

    let settings = Settings::load().context("invalid configuration")?;
    info!(
        environment = %settings.environment,
        backend = ?settings.storage.backend,
        concurrent_dispatch = settings.event_bus.dispatch.concurrent,
        failed_policy = ?settings.event_bus.idempotency.failed_policy,
        "Event bus starting"
    );

    Application::build(settings)
        .await?
        .run_until_stopped()
        .await?;

    info!("Event bus stopped");
    Ok(())
}
