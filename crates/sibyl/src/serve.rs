// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sibyl serve` command implementation.
//!
//! Builds the full service: SQLite storage with migrations, the balance and
//! earnings ledgers, the billing engine, the session coordinator, signaling
//! rooms, the notification bus, and the HTTP/WebSocket gateway. Crash
//! recovery runs before the gateway accepts traffic, and SIGINT/SIGTERM
//! drain the server gracefully.

use std::sync::Arc;

use sibyl_billing::BillingEngine;
use sibyl_config::SibylConfig;
use sibyl_core::error::SibylError;
use sibyl_core::sync::LockMap;
use sibyl_core::traits::SystemClock;
use sibyl_gateway::{AuthState, GatewayState, HealthState, ServerConfig, StaticTokenResolver};
use sibyl_ledger::{BalanceLedger, EarningsLedger};
use sibyl_notify::NotificationBus;
use sibyl_prometheus::PrometheusMetrics;
use sibyl_session::{AdvisorDirectory, SessionCoordinator};
use sibyl_signaling::RoomRegistry;
use sibyl_storage::SqliteStore;
use tracing::{info, warn};

use crate::shutdown;

/// Runs the `sibyl serve` command.
pub async fn run_serve(config: SibylConfig) -> Result<(), SibylError> {
    init_tracing(&config.log.level);

    info!("starting sibyl serve");

    // Storage first: opens the database, applies pragmas, runs migrations.
    let storage = {
        let store = SqliteStore::new(config.storage.clone());
        store.initialize().await?;
        Arc::new(store)
    };

    // Metrics recorder. The service runs fine without one; /metrics then
    // answers 404.
    let prometheus = match PrometheusMetrics::install() {
        Ok(recorder) => Some(recorder),
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            None
        }
    };
    let prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>> =
        prometheus.as_ref().map(|recorder| {
            let handle = recorder.handle().clone();
            Arc::new(move || handle.render()) as Arc<dyn Fn() -> String + Send + Sync>
        });

    // Service graph. The lock map is shared between the coordinator and the
    // billing engine so per-session operations serialize.
    let locks = Arc::new(LockMap::new());
    let balances = Arc::new(BalanceLedger::new(storage.clone()));
    let earnings = Arc::new(EarningsLedger::new(
        storage.clone(),
        config.billing.advisor_share_percent,
    ));
    let billing = Arc::new(BillingEngine::new(
        storage.clone(),
        balances.clone(),
        locks.clone(),
        config.billing.interval_secs,
    ));
    let rooms = Arc::new(RoomRegistry::new());
    let notify = Arc::new(NotificationBus::new());
    let coordinator = Arc::new(SessionCoordinator::new(
        storage.clone(),
        storage.clone(),
        balances.clone(),
        earnings.clone(),
        billing.clone(),
        rooms.clone(),
        notify.clone(),
        locks,
        Arc::new(SystemClock),
    ));
    billing.set_terminator(coordinator.clone())?;
    let directory = Arc::new(AdvisorDirectory::new(storage.clone(), notify.clone()));

    // Settle whatever a previous process left active, before any traffic.
    let recovered = coordinator.recover_interrupted().await?;
    if recovered > 0 {
        info!(count = recovered, "interrupted sessions settled");
    }

    let auth = AuthState {
        resolver: Arc::new(StaticTokenResolver::new(
            config
                .auth
                .tokens
                .iter()
                .map(|entry| (entry.token.clone(), entry.party.clone())),
        )),
    };
    let state = GatewayState {
        sessions: coordinator,
        directory,
        balances,
        earnings,
        rooms,
        notify,
        auth,
        health: HealthState {
            start_time: std::time::Instant::now(),
            prometheus_render,
        },
    };

    let cancel = shutdown::install_signal_handler();
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    sibyl_gateway::start_server(&server_config, state, cancel).await?;

    // Flush the WAL so an immediate restart reads a settled database.
    storage.close().await?;

    info!("sibyl serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sibyl={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
