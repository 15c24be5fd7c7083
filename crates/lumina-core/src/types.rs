// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the Lumina workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a chat session. Created client-side on first
/// contact and stable for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a human support agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle for one live connection (one browser tab, one socket).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub uuid::Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The logical party behind one or more connections.
///
/// One identity may own several simultaneous handles (multiple tabs);
/// deliveries always fan out to the full set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    Customer(SessionId),
    Agent(AgentId),
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identity::Customer(id) => write!(f, "customer:{id}"),
            Identity::Agent(id) => write!(f, "agent:{id}"),
        }
    }
}

/// Role attached to a connection at the transport handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Agent(AgentRole),
}

/// Privilege tier of a human agent, issued by the identity provider.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentRole {
    Agent,
    Manager,
    SuperAdmin,
}

/// Capability tags carried by an agent credential.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Chat,
    Voice,
    Video,
    Transfer,
}

/// Who authored a transcript message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Customer,
    Agent,
    Ai,
    System,
}

/// One append-only transcript entry. Insertion order is the transcript
/// order and is never reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn now(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            sender,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Lifecycle status of a chat session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    AiActive,
    EscalationPending,
    AgentActive,
    Closed,
}

/// Media class of a call. Only the negotiation is relayed here; media never
/// touches this engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Voice,
    Video,
}

/// Kind of a relayed signaling message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Offer,
    Answer,
    Candidate,
}

/// A closed session as handed to the transcript store for archival.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedSession {
    pub session_id: SessionId,
    pub messages: Vec<ChatMessage>,
    pub assigned_agent: Option<AgentId>,
    pub closed_by: Sender,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub message_count: usize,
    pub rating: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_display_round_trips() {
        for status in [
            SessionStatus::AiActive,
            SessionStatus::EscalationPending,
            SessionStatus::AgentActive,
            SessionStatus::Closed,
        ] {
            let s = status.to_string();
            assert_eq!(SessionStatus::from_str(&s).unwrap(), status);
        }
        assert_eq!(SessionStatus::AiActive.to_string(), "ai_active");
    }

    #[test]
    fn agent_role_uses_screaming_snake_case() {
        assert_eq!(AgentRole::SuperAdmin.to_string(), "SUPER_ADMIN");
        let json = serde_json::to_string(&AgentRole::Manager).unwrap();
        assert_eq!(json, "\"MANAGER\"");
    }

    #[test]
    fn identity_display_is_prefixed() {
        let c = Identity::Customer(SessionId("s1".into()));
        let a = Identity::Agent(AgentId("a1".into()));
        assert_eq!(c.to_string(), "customer:s1");
        assert_eq!(a.to_string(), "agent:a1");
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn chat_message_serializes_sender_lowercase() {
        let msg = ChatMessage::now(Sender::Ai, "hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["sender"], "ai");
        assert_eq!(json["content"], "hello");
    }
}
