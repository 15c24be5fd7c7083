// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router,
    extract::ws::Message,
    middleware as axum_middleware,
    routing::get,
};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use lumina_core::error::LuminaError;
use lumina_core::types::ConnectionId;
use lumina_engine::dispatch::Dispatcher;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// The support engine behind every socket.
    pub dispatcher: Arc<Dispatcher>,
    /// Per-connection outbound frame senders, keyed by connection handle.
    pub senders: Arc<DashMap<ConnectionId, mpsc::Sender<Message>>>,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
}

impl GatewayState {
    pub fn new(dispatcher: Arc<Dispatcher>, auth: AuthConfig) -> Self {
        Self {
            dispatcher,
            senders: Arc::new(DashMap::new()),
            auth,
            start_time: std::time::Instant::now(),
        }
    }
}

/// Gateway server configuration (mirrors `ServerConfig` from lumina-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

/// Build the gateway router:
/// - GET /health (unauthenticated, for process supervisors)
/// - GET /v1/sessions (bearer auth)
/// - GET /ws/customer (unauthenticated socket)
/// - GET /ws/agent (token checked at the upgrade handshake)
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/sessions", get(handlers::get_sessions))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/ws/customer", get(ws::ws_customer_handler))
        .route("/ws/agent", get(ws::ws_agent_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the gateway server; runs until the shutdown token is cancelled.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), LuminaError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| LuminaError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| LuminaError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(())
}
