// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Lumina support engine.

use thiserror::Error;

use crate::types::{SessionStatus, SessionId};

/// The primary error type used across the Lumina workspace.
///
/// `no_agent_available` is deliberately absent: an escalation with nobody to
/// take it is a valid routing outcome, surfaced to the customer as a status
/// event, never as an error.
#[derive(Debug, Error)]
pub enum LuminaError {
    /// The referenced chat session does not exist in the live registry.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// A session status transition that the transition table forbids.
    #[error("invalid transition: session {session_id} is {status}, cannot {attempted}")]
    InvalidTransition {
        session_id: SessionId,
        status: SessionStatus,
        attempted: &'static str,
    },

    /// An event that is illegal for its sender or for the current call/session
    /// state. The offending event is dropped; the sender is a hostile or
    /// out-of-sync client, never a reason to fail the process.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// An operation arrived on a connection handle that is no longer
    /// registered.
    #[error("stale connection")]
    StaleConnection,

    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Transcript store errors (archival failure in the external persistence
    /// collaborator).
    #[error("transcript store error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// AI responder errors (the external response generator failed).
    #[error("responder error: {message}")]
    Responder {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Transport errors (bind failure, socket write failure).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LuminaError {
    /// True for the error classes that are local to one event: the event is
    /// dropped, logged, and nothing else in the process is affected.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            LuminaError::SessionNotFound(_)
                | LuminaError::InvalidTransition { .. }
                | LuminaError::ProtocolViolation(_)
                | LuminaError::StaleConnection
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_errors_are_local() {
        assert!(LuminaError::SessionNotFound(SessionId("s".into())).is_local());
        assert!(LuminaError::ProtocolViolation("bad".into()).is_local());
        assert!(LuminaError::StaleConnection.is_local());
        assert!(
            LuminaError::InvalidTransition {
                session_id: SessionId("s".into()),
                status: SessionStatus::Closed,
                attempted: "assign",
            }
            .is_local()
        );
    }

    #[test]
    fn process_errors_are_not_local() {
        assert!(!LuminaError::Config("bad".into()).is_local());
        assert!(!LuminaError::Internal("bad".into()).is_local());
        assert!(
            !LuminaError::Channel {
                message: "bind failed".into(),
                source: None,
            }
            .is_local()
        );
    }

    #[test]
    fn invalid_transition_display_names_the_attempt() {
        let err = LuminaError::InvalidTransition {
            session_id: SessionId("s1".into()),
            status: SessionStatus::AiActive,
            attempted: "assign",
        };
        let msg = err.to_string();
        assert!(msg.contains("s1"));
        assert!(msg.contains("ai_active"));
        assert!(msg.contains("assign"));
    }
}
