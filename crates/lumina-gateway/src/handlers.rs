// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Handles GET /health and GET /v1/sessions.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::server::GatewayState;

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status string.
    pub status: String,
    /// Binary version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_secs: u64,
}

/// Response body for GET /v1/sessions.
#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    /// List of open sessions.
    pub sessions: Vec<SessionInfo>,
}

/// Observation record for one open session.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    /// Session identifier.
    pub id: String,
    /// Current lifecycle status.
    pub status: String,
    /// Transcript length so far.
    pub message_count: usize,
}

/// GET /health
///
/// Unauthenticated liveness probe for process supervisors.
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /v1/sessions
///
/// Lists every open session with its status, for supervisor dashboards.
pub async fn get_sessions(State(state): State<GatewayState>) -> Json<SessionListResponse> {
    let sessions = state
        .dispatcher
        .store()
        .open_sessions()
        .await
        .into_iter()
        .map(|(id, status, message_count)| SessionInfo {
            id: id.0,
            status: status.to_string(),
            message_count,
        })
        .collect();
    Json(SessionListResponse { sessions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use lumina_core::events::ClientEvent;
    use lumina_core::traits::{KeywordResponder, NullTranscriptStore};
    use lumina_core::types::{ConnectionId, Role, SessionId};
    use lumina_engine::dispatch::{Dispatcher, EngineConfig};

    use crate::auth::AuthConfig;

    fn state() -> GatewayState {
        let dispatcher = Arc::new(Dispatcher::new(
            EngineConfig::default(),
            Arc::new(KeywordResponder::default()),
            Arc::new(NullTranscriptStore),
        ));
        GatewayState::new(dispatcher, AuthConfig { bearer_token: None })
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let Json(body) = get_health(State(state())).await;
        assert_eq!(body.status, "ok");
        assert!(!body.version.is_empty());
    }

    #[tokio::test]
    async fn sessions_lists_open_sessions() {
        let state = state();
        state
            .dispatcher
            .handle(
                ConnectionId::new(),
                Role::Customer,
                ClientEvent::NewChat {
                    session_id: SessionId("s1".into()),
                    message: "hi".into(),
                },
            )
            .await
            .unwrap();

        let Json(body) = get_sessions(State(state)).await;
        assert_eq!(body.sessions.len(), 1);
        assert_eq!(body.sessions[0].id, "s1");
        assert_eq!(body.sessions[0].status, "ai_active");
        // Greeting plus the customer message.
        assert_eq!(body.sessions[0].message_count, 2);
    }
}
