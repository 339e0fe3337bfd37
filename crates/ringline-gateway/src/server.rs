// SPDX-FileCopyrightText: 2026 Ringline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router,
    middleware as axum_middleware,
    routing::get,
};
use ringline_core::RinglineError;
use ringline_signaling::{CallCoordinator, PresenceTracker, PushHub, SignalRelay};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;
use crate::ws;

/// Health state for the unauthenticated health endpoint.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Call lifecycle orchestration.
    pub coordinator: Arc<CallCoordinator>,
    /// Presence reads and writes.
    pub presence: Arc<PresenceTracker>,
    /// Durable signal store-and-forward.
    pub relay: Arc<SignalRelay>,
    /// Push subscriptions for the WebSocket endpoint.
    pub hub: Arc<PushHub>,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Health state for the public endpoint.
    pub health: HealthState,
}

/// Gateway server configuration (mirrors `ServerConfig` from
/// ringline-config to avoid a dependency on the config crate).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

/// Start the gateway HTTP/WebSocket server and serve until `cancel`
/// fires.
///
/// Routes:
/// - GET /health (public)
/// - POST/GET /v1/signal, /v1/presence, /v1/calls + GET /v1/calls/{id}
///   (bearer auth middleware)
/// - GET /v1/ws (auth during handshake, not via middleware)
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), RinglineError> {
    let auth_state = state.auth.clone();

    // Unauthenticated public routes.
    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .with_state(state.clone());

    // Routes requiring authentication.
    let api_routes = Router::new()
        .route(
            "/v1/signal",
            get(handlers::get_signal).post(handlers::post_signal),
        )
        .route(
            "/v1/presence",
            get(handlers::get_presence).post(handlers::post_presence),
        )
        .route(
            "/v1/calls",
            get(handlers::get_calls).post(handlers::post_calls),
        )
        .route("/v1/calls/{call_id}", get(handlers::get_call))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state.clone());

    // WebSocket route (auth happens during handshake, not via middleware).
    let ws_routes = Router::new()
        .route("/v1/ws", get(ws::ws_handler))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RinglineError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| RinglineError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
