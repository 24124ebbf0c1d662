//! # nestd: nest daemon
//!
//! Composition root that wires the device adapters to the automation
//! router.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars) and set up logging
//! - Discover the controller's devices and create virtual entities
//! - Spawn one poll loop per device and the event router
//! - Reload rules on `SIGHUP`
//! - Shut down gracefully on `SIGINT`/`SIGTERM`: stop polling, drain the
//!   bus, report router statistics
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::oneshot;

use nest_adapter_sysfs::DeviceRegistry;
use nest_adapter_virtual::VirtualEntities;
use nest_app::chain::ChainedDirectory;
use nest_app::event_bus;
use nest_app::event_router::EventRouter;
use nest_app::ports::EntityDirectory;
use nest_app::rule_store::SharedRuleTable;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("unable to load configuration")?;
    init_tracing(&config.logging.filter);

    // Devices
    let registry = Arc::new(
        DeviceRegistry::discover(&config.devices.root, config.devices.on_duplicate)
            .with_context(|| format!("unable to discover devices under {}", config.devices.root.display()))?,
    );
    if registry.is_empty() {
        tracing::warn!(root = %config.devices.root.display(), "no device found");
    }

    // Event bus
    let (events, receiver) = event_bus::channel(config.devices.event_capacity);

    // Virtual entities
    let mut entities = VirtualEntities::new(receiver.feedback());
    for button in &config.entities.push_buttons {
        entities = entities.with_push_button(button.id.clone());
    }
    for light in &config.entities.lights {
        entities = entities.with_light(light.id.clone());
    }

    // Router
    let rules = SharedRuleTable::new(config.automation.rules.clone())?;
    let directory = ChainedDirectory::new(Arc::clone(&registry), entities);
    warn_unknown_targets(&rules, &directory);
    let router = EventRouter::new(rules.clone(), directory);

    let (stop_router, router_stopped) = oneshot::channel::<()>();
    let router_task = tokio::spawn(async move {
        router
            .run_until(receiver, async {
                let _ = router_stopped.await;
            })
            .await
    });

    // Polling
    let pollers = registry.start_polling(&events, config.poll_interval());
    drop(events);

    wait_for_shutdown(&rules).await;

    registry.close();
    for poller in pollers {
        if let Err(err) = poller.await {
            tracing::warn!(error = %err, "poll task did not finish cleanly");
        }
    }
    let _ = stop_router.send(());
    let stats = router_task.await.context("event router panicked")?;

    tracing::info!(
        received = stats.received,
        written = stats.written,
        failed = stats.failed,
        faults = stats.faults,
        "nestd stopped"
    );
    Ok(())
}

fn init_tracing(filter: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("nestd=info,nest=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

fn warn_unknown_targets(rules: &SharedRuleTable, directory: &impl EntityDirectory) {
    let table = rules.snapshot();
    for (source, target) in table.iter() {
        if !directory.contains(target) {
            tracing::warn!(%source, %target, "rule targets an unknown entity");
        }
    }
}

/// Wait for `SIGINT` or `SIGTERM`, reloading rules on every `SIGHUP`.
#[cfg(unix)]
async fn wait_for_shutdown(rules: &SharedRuleTable) {
    use tokio::signal::unix::{SignalKind, signal};

    let (Ok(mut terminate), Ok(mut hangup)) = (
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    ) else {
        tracing::warn!("unable to install unix signal handlers, only Ctrl+C is handled");
        ctrl_c().await;
        return;
    };

    loop {
        tokio::select! {
            () = ctrl_c() => return,
            _ = terminate.recv() => {
                tracing::info!("received SIGTERM, shutting down");
                return;
            }
            _ = hangup.recv() => reload_rules(rules),
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_rules: &SharedRuleTable) {
    ctrl_c().await;
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C, shutting down"),
        Err(err) => {
            tracing::error!(error = %err, "unable to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(unix)]
fn reload_rules(rules: &SharedRuleTable) {
    match Config::reload_rules() {
        Ok(table) => {
            if let Err(err) = rules.replace(table) {
                tracing::warn!(error = %err, "rule reload rejected");
            }
        }
        Err(err) => tracing::warn!(error = %err, "unable to reload rules"),
    }
}
