// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Lumina support engine.
//!
//! Holds all live state of the support floor: which connections map to which
//! identities ([`registry`]), every open chat session and its transcript
//! ([`store`]), agent availability ([`presence`]), the escalation queue
//! ([`escalation`]), and per-session call handshakes ([`signaling`]).
//! [`dispatch`] ties them together behind a single event entry point that the
//! transport layer drives.

pub mod dispatch;
pub mod escalation;
pub mod presence;
pub mod registry;
pub mod signaling;
pub mod store;

pub use dispatch::{
    Delivery, DispatchOutput, Dispatcher, EngineConfig, TimerExpiry, TimerRequest,
};
pub use escalation::{EscalationRouter, RouteOutcome};
pub use presence::{Presence, PresenceTracker};
pub use registry::ConnectionRegistry;
pub use signaling::{CallRelay, CallState};
pub use store::{ChatSession, Escalation, SessionStore};
