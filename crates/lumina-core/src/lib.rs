// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Lumina support engine.
//!
//! This crate provides the error taxonomy, identity and session types, the
//! wire event taxonomy spoken over support sockets, and the trait seams for
//! the two external collaborators (AI responder, transcript persistence).

pub mod error;
pub mod events;
pub mod traits;
pub mod types;

pub use error::LuminaError;
pub use events::{ClientEvent, EscalationStatus, ServerEvent};
pub use types::{
    AgentId, AgentRole, ConnectionId, Identity, Permission, Role, SessionId,
    SessionStatus,
};

pub use traits::{Reply, Responder, TranscriptStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reexports_are_usable() {
        let _id = SessionId("s".into());
        let _role = Role::Agent(AgentRole::Manager);
        let _err = LuminaError::StaleConnection;
    }

    #[test]
    fn trait_objects_are_object_safe() {
        fn _assert_responder(_: &dyn Responder) {}
        fn _assert_store(_: &dyn TranscriptStore) {}
    }
}
