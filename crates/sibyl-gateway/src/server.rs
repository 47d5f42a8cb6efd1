// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state. The lifecycle routes sit
//! behind bearer auth; health and metrics stay open for supervisors and
//! scrapers; the WebSocket authenticates during its handshake instead.

use std::sync::Arc;

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post, put},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use sibyl_core::error::SibylError;
use sibyl_ledger::{BalanceLedger, EarningsLedger};
use sibyl_notify::NotificationBus;
use sibyl_session::{AdvisorDirectory, SessionCoordinator};
use sibyl_signaling::RoomRegistry;

use crate::auth::{AuthState, auth_middleware};
use crate::handlers;
use crate::ws;

/// State for the unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime reporting.
    pub start_time: std::time::Instant,
    /// Prometheus exposition renderer, when a recorder is installed.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Session lifecycle operations.
    pub sessions: Arc<SessionCoordinator>,
    /// Advisor profiles and presence.
    pub directory: Arc<AdvisorDirectory>,
    /// Client balances.
    pub balances: Arc<BalanceLedger>,
    /// Advisor earnings.
    pub earnings: Arc<EarningsLedger>,
    /// Signaling rooms, driven from the WebSocket.
    pub rooms: Arc<RoomRegistry>,
    /// Notification bus, fed by each party's WebSocket registration.
    pub notify: Arc<NotificationBus>,
    /// Token resolution for the middleware and the WebSocket handshake.
    pub auth: AuthState,
    /// Health state for unauthenticated endpoints.
    pub health: HealthState,
}

/// Gateway listener configuration (mirrors `ServerConfig` in sibyl-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

/// Builds the full route tree over `state`.
pub fn router(state: GatewayState) -> Router {
    // Unauthenticated public routes (health + metrics for systemd and Prometheus).
    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .route("/metrics", get(handlers::get_public_metrics))
        .with_state(state.clone());

    // Routes requiring authentication.
    let api_routes = Router::new()
        .route(
            "/api/sessions",
            post(handlers::post_sessions).get(handlers::get_sessions),
        )
        .route("/api/sessions/{id}", get(handlers::get_session))
        .route("/api/sessions/{id}/accept", post(handlers::post_session_accept))
        .route("/api/sessions/{id}/reject", post(handlers::post_session_reject))
        .route("/api/sessions/{id}/cancel", post(handlers::post_session_cancel))
        .route("/api/sessions/{id}/end", post(handlers::post_session_end))
        .route("/api/advisors", get(handlers::get_advisors))
        .route("/api/advisors/me", put(handlers::put_advisor_profile))
        .route("/api/advisors/me/status", put(handlers::put_advisor_status))
        .route("/api/advisors/{id}", get(handlers::get_advisor))
        .route("/api/balance", get(handlers::get_balance))
        .route("/api/balance/topup", post(handlers::post_topup))
        .route("/api/earnings", get(handlers::get_earnings))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    // WebSocket route (auth happens during the handshake, not via middleware).
    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Start the gateway HTTP/WebSocket server.
///
/// Binds to the configured host:port and serves until `shutdown` fires, then
/// drains in-flight requests.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), SibylError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SibylError::Transport {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| SibylError::Transport {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use sibyl_test_utils::TestHarness;

    use crate::auth::StaticTokenResolver;

    fn state() -> GatewayState {
        let harness = TestHarness::builder().build();
        GatewayState {
            sessions: harness.coordinator.clone(),
            directory: harness.directory.clone(),
            balances: harness.balances.clone(),
            earnings: harness.earnings.clone(),
            rooms: harness.rooms.clone(),
            notify: harness.notify.clone(),
            auth: AuthState {
                resolver: Arc::new(StaticTokenResolver::new([])),
            },
            health: HealthState {
                start_time: std::time::Instant::now(),
                prometheus_render: None,
            },
        }
    }

    #[tokio::test]
    async fn gateway_state_is_clone() {
        let state = state();
        let _cloned = state.clone();
    }

    #[tokio::test]
    async fn router_builds_over_a_full_state() {
        let _app = router(state());
    }

    #[test]
    fn server_config_debug() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 7465,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
        assert!(debug.contains("7465"));
    }
}
