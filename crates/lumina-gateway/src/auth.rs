// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication middleware for the gateway.
//!
//! REST endpoints require a bearer token (`Authorization: Bearer <token>`).
//! When no token is configured, all API requests are rejected (fail-closed).
//! Agent sockets authenticate at the upgrade handshake instead, via a
//! `token` query parameter; customer sockets are unauthenticated.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

/// Authentication configuration for the gateway.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected bearer token. If `Some`, bearer auth is enabled.
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl AuthConfig {
    /// True when `candidate` matches the configured token. An unconfigured
    /// token never matches.
    pub fn accepts(&self, candidate: Option<&str>) -> bool {
        match (&self.bearer_token, candidate) {
            (Some(expected), Some(given)) => expected == given,
            _ => false,
        }
    }
}

/// Middleware that validates the bearer token on API routes.
///
/// If no token is configured, all requests are rejected (fail-closed).
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth.bearer_token.is_none() {
        tracing::error!("gateway has no auth configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let given = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if auth.accepts(given) {
        return Ok(next.run(request).await);
    }
    Err(StatusCode::UNAUTHORIZED)
}
