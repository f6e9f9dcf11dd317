//! # homelinkd — homelink gateway daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars) and initialise logging
//! - Initialize the `SQLite` connection pool and run migrations
//! - Connect the MQTT transport and route inbound device messages
//! - Construct application services, injecting adapters via port traits
//! - Build the axum router, bind to a TCP port and serve
//! - Run the telemetry reaper in the background
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use homelink_adapter_http_axum::router;
use homelink_adapter_http_axum::state::AppState;
use homelink_adapter_mqtt::MqttTransport;
use homelink_adapter_storage_sqlite_sqlx::{
    Config as StorageConfig, SqliteDeviceRepository, SqliteLockSnapshotStore,
};
use homelink_app::command_broker::CommandBroker;
use homelink_app::dispatcher::CommandDispatcher;
use homelink_app::inbound::InboundRouter;
use homelink_app::services::device_lifecycle::DeviceLifecycle;
use homelink_app::services::gas_warning_service::GasWarningService;
use homelink_app::services::smartlock_service::SmartLockService;
use homelink_app::telemetry_hub::TelemetryHub;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Database
    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("failed to open database")?;
    let devices = Arc::new(SqliteDeviceRepository::new(db.pool().clone()));
    let snapshots = Arc::new(SqliteLockSnapshotStore::new(db.pool().clone()));

    // Core
    let broker = CommandBroker::new()
        .with_max_outstanding_per_device(config.commands.max_outstanding_per_device);
    let hub = TelemetryHub::new(config.telemetry.hub_config());

    // Transport
    let (transport, event_loop) = MqttTransport::connect(&config.mqtt);
    let inbound = InboundRouter::new(broker.clone(), Arc::clone(&snapshots), hub.clone());
    let mqtt_task = event_loop.spawn(inbound);
    tracing::info!(
        host = %config.mqtt.broker_host,
        port = config.mqtt.broker_port,
        "mqtt transport started"
    );

    let reaper_task = tokio::spawn(hub.clone().reaper_task(config.telemetry.reap_interval()));

    // Services
    let timeouts = config.commands.timeouts();
    let dispatcher = Arc::new(CommandDispatcher::new(broker, transport.clone()));
    let state = AppState::new(
        DeviceLifecycle::new(Arc::clone(&devices), Arc::clone(&dispatcher), timeouts),
        SmartLockService::new(Arc::clone(&devices), snapshots, Arc::clone(&dispatcher))
            .with_timeout(timeouts.lock),
        GasWarningService::new(devices, dispatcher),
        hub,
    );
    let app = router::build(state);

    // HTTP
    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(%bind_addr, "homelinkd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    tracing::info!("shutting down");
    if let Err(err) = transport.disconnect().await {
        tracing::debug!(error = %err, "mqtt disconnect failed");
    }
    mqtt_task.abort();
    reaper_task.abort();
    db.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
