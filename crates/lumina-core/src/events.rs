// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire event taxonomy for the dispatch gateway.
//!
//! Every frame on a support socket is one JSON object tagged by `type`:
//!
//! ```json
//! {"type": "new_chat", "session_id": "abc", "message": "help"}
//! {"type": "ai_response", "session_id": "abc", "content": "Hi!"}
//! ```
//!
//! Signal payloads (`webrtc_offer` / `webrtc_answer` / `ice_candidate`) are
//! carried as raw JSON values and relayed opaquely — the engine validates
//! sender identity and call state, never the payload structure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{
    AgentId, CallType, ChatMessage, Identity, SessionId, SessionStatus,
};

/// Inbound events: everything a customer or agent socket may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Customer message; opens the session on first contact.
    NewChat { session_id: SessionId, message: String },
    /// Customer asks for a human.
    EscalateToHuman { session_id: SessionId },
    /// Close the session (agent in practice, symmetric by design). A closing
    /// customer may attach a satisfaction rating.
    CloseChat {
        session_id: SessionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rating: Option<u8>,
    },
    /// Request the session's current transcript and status: agent takeover,
    /// or a reconnecting customer resyncing.
    JoinChat { session_id: SessionId },
    /// Agent declares itself available for new work.
    AgentOnline { agent_id: AgentId },
    /// Agent withdraws from new work without disconnecting.
    AgentOffline { agent_id: AgentId },
    /// Agent reply into an assigned session.
    AgentMessage { session_id: SessionId, message: String },
    /// Start the request/accept call handshake.
    CallRequest { session_id: SessionId, call_type: CallType },
    /// Callee accepts a ringing call.
    CallAccepted { session_id: SessionId },
    /// Callee declines a ringing call.
    CallDeclined { session_id: SessionId },
    /// Either participant ends the call.
    Hangup { session_id: SessionId },
    /// Opaque SDP offer from the call initiator.
    WebrtcOffer { session_id: SessionId, payload: Value },
    /// Opaque SDP answer from the callee.
    WebrtcAnswer { session_id: SessionId, payload: Value },
    /// Opaque ICE candidate from either participant.
    IceCandidate { session_id: SessionId, payload: Value },
}

impl ClientEvent {
    /// The session this event operates on, when it names one.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            ClientEvent::NewChat { session_id, .. }
            | ClientEvent::EscalateToHuman { session_id }
            | ClientEvent::CloseChat { session_id, .. }
            | ClientEvent::JoinChat { session_id }
            | ClientEvent::AgentMessage { session_id, .. }
            | ClientEvent::CallRequest { session_id, .. }
            | ClientEvent::CallAccepted { session_id }
            | ClientEvent::CallDeclined { session_id }
            | ClientEvent::Hangup { session_id }
            | ClientEvent::WebrtcOffer { session_id, .. }
            | ClientEvent::WebrtcAnswer { session_id, .. }
            | ClientEvent::IceCandidate { session_id, .. } => Some(session_id),
            ClientEvent::AgentOnline { .. } | ClientEvent::AgentOffline { .. } => None,
        }
    }

    /// Stable name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::NewChat { .. } => "new_chat",
            ClientEvent::EscalateToHuman { .. } => "escalate_to_human",
            ClientEvent::CloseChat { .. } => "close_chat",
            ClientEvent::JoinChat { .. } => "join_chat",
            ClientEvent::AgentOnline { .. } => "agent_online",
            ClientEvent::AgentOffline { .. } => "agent_offline",
            ClientEvent::AgentMessage { .. } => "agent_message",
            ClientEvent::CallRequest { .. } => "call_request",
            ClientEvent::CallAccepted { .. } => "call_accepted",
            ClientEvent::CallDeclined { .. } => "call_declined",
            ClientEvent::Hangup { .. } => "hangup",
            ClientEvent::WebrtcOffer { .. } => "webrtc_offer",
            ClientEvent::WebrtcAnswer { .. } => "webrtc_answer",
            ClientEvent::IceCandidate { .. } => "ice_candidate",
        }
    }
}

/// Escalation outcome surfaced to the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    Connected,
    NoAgentsAvailable,
}

/// Outbound events: everything the engine may deliver to a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// AI reply to the customer.
    AiResponse { session_id: SessionId, content: String },
    /// Agent reply forwarded to the customer.
    AgentMessage { session_id: SessionId, content: String },
    /// Customer message forwarded to the assigned agent.
    NewCustomerMessage { session_id: SessionId, message: String },
    /// Result of an escalation attempt.
    EscalationStatus {
        session_id: SessionId,
        status: EscalationStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        agent: Option<AgentId>,
    },
    /// A session was assigned to this agent.
    NewEscalation { session_id: SessionId },
    /// The session was closed.
    ChatClosed { session_id: SessionId },
    /// Resync snapshot: full transcript plus current status.
    ChatState {
        session_id: SessionId,
        status: SessionStatus,
        messages: Vec<ChatMessage>,
    },
    /// A call request is ringing at this connection.
    IncomingCall {
        session_id: SessionId,
        from: Identity,
        call_type: CallType,
    },
    /// The callee accepted; the initiator should start negotiation.
    CallAccepted { session_id: SessionId, from: Identity },
    /// The callee declined (or the ring timed out).
    CallDeclined { session_id: SessionId },
    /// The call ended (hangup, disconnect, or session close).
    CallEnded { session_id: SessionId },
    /// Relayed SDP offer.
    WebrtcOffer { session_id: SessionId, from: Identity, payload: Value },
    /// Relayed SDP answer.
    WebrtcAnswer { session_id: SessionId, from: Identity, payload: Value },
    /// Relayed ICE candidate.
    IceCandidate { session_id: SessionId, from: Identity, payload: Value },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_deserializes_new_chat() {
        let json = r#"{"type": "new_chat", "session_id": "s1", "message": "help"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            ClientEvent::NewChat {
                session_id: SessionId("s1".into()),
                message: "help".into(),
            }
        );
        assert_eq!(event.kind(), "new_chat");
    }

    #[test]
    fn client_event_tag_is_snake_case() {
        let event = ClientEvent::EscalateToHuman {
            session_id: SessionId("s1".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "escalate_to_human");
    }

    #[test]
    fn signal_payload_survives_round_trip_untouched() {
        let json = r#"{"type": "webrtc_offer", "session_id": "s1",
            "payload": {"sdp": "v=0...", "type": "offer", "nested": {"a": [1, 2]}}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        let ClientEvent::WebrtcOffer { payload, .. } = &event else {
            panic!("wrong variant");
        };
        assert_eq!(payload["nested"]["a"][1], 2);
        // Re-serialized payload is byte-for-byte the same JSON value.
        let back = serde_json::to_value(&event).unwrap();
        assert_eq!(back["payload"], *payload);
    }

    #[test]
    fn session_id_accessor_covers_session_events() {
        let event = ClientEvent::Hangup {
            session_id: SessionId("s9".into()),
        };
        assert_eq!(event.session_id(), Some(&SessionId("s9".into())));
        let event = ClientEvent::AgentOnline {
            agent_id: AgentId("a1".into()),
        };
        assert_eq!(event.session_id(), None);
    }

    #[test]
    fn close_chat_rating_is_optional_on_the_wire() {
        let json = r#"{"type": "close_chat", "session_id": "s1"}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            ClientEvent::CloseChat {
                session_id: SessionId("s1".into()),
                rating: None,
            }
        );

        let json = r#"{"type": "close_chat", "session_id": "s1", "rating": 4}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        let ClientEvent::CloseChat { rating, .. } = event else {
            panic!("wrong variant");
        };
        assert_eq!(rating, Some(4));
    }

    #[test]
    fn escalation_status_omits_absent_agent() {
        let event = ServerEvent::EscalationStatus {
            session_id: SessionId("s1".into()),
            status: EscalationStatus::NoAgentsAvailable,
            agent: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "no_agents_available");
        assert!(json.get("agent").is_none());
    }

    #[test]
    fn incoming_call_names_the_caller() {
        let event = ServerEvent::IncomingCall {
            session_id: SessionId("s1".into()),
            from: Identity::Agent(AgentId("a1".into())),
            call_type: CallType::Video,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "incoming_call");
        assert_eq!(json["call_type"], "video");
    }
}
