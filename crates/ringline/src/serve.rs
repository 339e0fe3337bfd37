// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ringline serve` command implementation.
//!
//! Wires storage, the signaling components, and the gateway together,
//! then serves until a shutdown signal arrives.

use std::sync::Arc;

use ringline_config::RinglineConfig;
use ringline_core::RinglineError;
use ringline_gateway::{AuthConfig, GatewayState, HealthState, ServerConfig, start_server};
use ringline_signaling::{
    CallCoordinator, Notifier, PresenceTracker, PushHub, RetentionSweeper, RingSweeper,
    SignalRelay, install_signal_handler,
};
use ringline_storage::Database;
use tracing::info;

/// Run the `ringline serve` command.
///
/// Startup order: tracing, auth gate, storage, signaling components,
/// background sweepers, gateway. The gateway serves in the foreground
/// until SIGINT or SIGTERM cancels it; the sweepers stop on the same
/// token.
pub async fn run_serve(config: RinglineConfig) -> Result<(), RinglineError> {
    init_tracing(&config.server.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "starting ringline");

    // Refuse to start without a signing secret. Every authenticated
    // route would reject and the server would be useless.
    if config.auth.signing_secret.is_none() {
        return Err(RinglineError::Config(
            "auth.signing_secret is not set; set it before starting the server".to_string(),
        ));
    }

    // Open storage and apply pending migrations.
    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
    info!(
        path = %config.storage.database_path,
        wal = config.storage.wal_mode,
        "storage initialized"
    );

    // Wire the signaling components around the shared push hub.
    let hub = Arc::new(PushHub::new());
    let presence = Arc::new(PresenceTracker::new(db.clone(), &config.presence));
    let relay = Arc::new(SignalRelay::new(db.clone(), hub.clone()));
    let notifier = Notifier::new(hub.clone());
    let coordinator = Arc::new(CallCoordinator::new(
        db.clone(),
        presence.clone(),
        relay.clone(),
        notifier,
    ));

    // Install signal handler.
    let cancel = install_signal_handler();

    // Spawn the ring-timeout sweeper.
    {
        let sweeper = RingSweeper::new(config.calls.clone(), db.clone(), coordinator.clone());
        let sweep_cancel = cancel.clone();
        tokio::spawn(async move {
            sweeper.run(sweep_cancel).await;
        });
        info!(
            ring_window_secs = config.calls.ring_window_secs,
            sweep_interval_secs = config.calls.sweep_interval_secs,
            "ring sweeper started"
        );
    }

    // Spawn the retention sweeper. It exits on its own when disabled.
    {
        let retention = RetentionSweeper::new(config.retention.clone(), db.clone());
        let retention_cancel = cancel.clone();
        tokio::spawn(async move {
            retention.run(retention_cancel).await;
        });
    }

    let state = GatewayState {
        coordinator,
        presence,
        relay,
        hub,
        auth: AuthConfig {
            signing_secret: config.auth.signing_secret.clone(),
        },
        health: HealthState {
            start_time: std::time::Instant::now(),
        },
    };
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };

    start_server(&server_config, state, cancel).await?;

    info!("ringline serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    // Every workspace crate logs under a ringline* target.
    let directives = format!(
        "ringline={log_level},ringline_storage={log_level},ringline_signaling={log_level},ringline_gateway={log_level},warn"
    );
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
