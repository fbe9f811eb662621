//! # devlinkd: devlink device daemon
//!
//! Composition root that wires all adapters together and runs one device.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file) and initialize logging
//! - Construct the settings store and load the base command definitions
//! - Construct the device, injecting the event bus via the publisher port
//! - Set up the enabled integrations and restore the saved state
//! - Persist state changes, serve the stdin console and run the scheduler
//! - Handle graceful shutdown (Ctrl-C)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;
mod console;
mod persist;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use devlink_adapter_virtual::VirtualIntegration;
use devlink_app::event_bus::InProcessEventBus;
use devlink_app::ports::{Integration, SettingsStore};
use devlink_app::scheduler::TokioTaskScheduler;
use devlink_app::services::Device;

use crate::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::new(&config.logging.filter))
        .init();

    // Settings
    let settings: Arc<dyn SettingsStore> = Arc::new(
        devlink_adapter_settings_file::Config {
            dir: config.settings.dir.clone(),
            model_id: config.device.model_id.clone(),
        }
        .build(),
    );

    // Device
    let event_bus = InProcessEventBus::new(config.events.capacity);
    let mut device = Device::new(Arc::new(event_bus.clone()), config.build_options());
    if let Some(document) = persist::load_base_commands(settings.as_ref())
        .context("failed to load base command definitions")?
    {
        device = device
            .with_base_commands(&document)
            .context("invalid base command definitions")?;
        tracing::info!(
            count = device.base_commands().len(),
            "base command definitions loaded"
        );
    }
    let device = Arc::new(device);

    // Integrations
    let (scheduler, runner) = TokioTaskScheduler::channel();
    let mut integrations: Vec<Box<dyn Integration>> = Vec::new();
    if config.integrations.virtual_enabled {
        integrations.push(Box::new(VirtualIntegration::new(Arc::new(scheduler))));
    }
    for integration in &mut integrations {
        integration
            .setup(&device)
            .with_context(|| format!("failed to set up integration '{}'", integration.name()))?;
        tracing::info!(integration = integration.name(), "integration ready");
    }

    // State
    persist::restore_state(&device, settings.as_ref());
    let persister = tokio::spawn(persist::run(
        event_bus.subscribe(),
        Arc::clone(device.state_store()),
        Arc::clone(&settings),
    ));
    let console = tokio::spawn(console::run(Arc::clone(&device)));

    tracing::info!(
        model_id = %config.device.model_id,
        name = %config.device.name,
        "devlinkd running"
    );

    tokio::select! {
        () = runner.run() => tracing::info!("scheduler stopped"),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            tracing::info!("shutting down");
        }
    }

    for integration in &mut integrations {
        if let Err(err) = integration.teardown() {
            tracing::warn!(integration = integration.name(), error = %err, "teardown failed");
        }
    }
    console.abort();
    persister.abort();
    Ok(())
}
