// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call signaling relay: per-session WebRTC handshake state.
//!
//! Call lifecycle:
//!
//! ```text
//! requested --accept--> negotiating --answer--> active --hangup--> ended
//! requested --decline/ring_timeout--> ended
//! ```
//!
//! At most one non-ended call exists per session. The relay validates sender
//! identity and ordering and hands back the peer to deliver to; the SDP and
//! ICE payloads themselves are never inspected. All methods are synchronous
//! and never block — entries are guarded by plain mutexes with no await
//! points inside.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use lumina_core::error::LuminaError;
use lumina_core::types::{CallType, Identity, SessionId, SignalKind};

/// Handshake progress of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Ringing at the callee; no media signaling allowed yet.
    Requested,
    /// Callee accepted; offer/answer exchange in flight.
    Negotiating,
    /// Answer relayed; candidates may keep trickling.
    Active,
    Ended,
}

/// Live call attached to a chat session.
#[derive(Debug, Clone)]
pub struct CallSession {
    pub session_id: SessionId,
    pub initiator: Identity,
    pub callee: Identity,
    pub call_type: CallType,
    pub state: CallState,
    pub requested_at: DateTime<Utc>,
}

impl CallSession {
    fn peer_of(&self, identity: &Identity) -> Option<Identity> {
        if identity == &self.initiator {
            Some(self.callee.clone())
        } else if identity == &self.callee {
            Some(self.initiator.clone())
        } else {
            None
        }
    }
}

/// Keyed call state, one slot per session.
#[derive(Default)]
pub struct CallRelay {
    calls: DashMap<SessionId, Mutex<CallSession>>,
}

impl CallRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a call: occupies the session's call slot in `requested`. A
    /// second request while any non-ended call exists is a protocol
    /// violation.
    pub fn request(
        &self,
        session_id: &SessionId,
        initiator: Identity,
        callee: Identity,
        call_type: CallType,
    ) -> Result<(), LuminaError> {
        match self.calls.entry(session_id.clone()) {
            Entry::Occupied(_) => Err(LuminaError::ProtocolViolation(format!(
                "call already in progress for session {session_id}"
            ))),
            Entry::Vacant(slot) => {
                slot.insert(Mutex::new(CallSession {
                    session_id: session_id.clone(),
                    initiator,
                    callee,
                    call_type,
                    state: CallState::Requested,
                    requested_at: Utc::now(),
                }));
                tracing::info!(session_id = %session_id, call_type = %call_type, "call requested");
                Ok(())
            }
        }
    }

    /// Callee accepts the ring: `requested -> negotiating`. Returns the
    /// initiator to notify.
    pub fn accept(&self, session_id: &SessionId, sender: &Identity) -> Result<Identity, LuminaError> {
        self.with_call(session_id, |call| {
            if call.state != CallState::Requested {
                return Err(call_order_violation(session_id, "call_accepted", call.state));
            }
            if sender != &call.callee {
                return Err(LuminaError::ProtocolViolation(format!(
                    "call_accepted for session {session_id} from non-callee"
                )));
            }
            call.state = CallState::Negotiating;
            Ok(call.initiator.clone())
        })?
    }

    /// Callee declines the ring. The slot frees immediately; returns the
    /// initiator to notify.
    pub fn decline(&self, session_id: &SessionId, sender: &Identity) -> Result<Identity, LuminaError> {
        let initiator = self.with_call(session_id, |call| {
            if call.state != CallState::Requested {
                return Err(call_order_violation(session_id, "call_declined", call.state));
            }
            if sender != &call.callee {
                return Err(LuminaError::ProtocolViolation(format!(
                    "call_declined for session {session_id} from non-callee"
                )));
            }
            call.state = CallState::Ended;
            Ok(call.initiator.clone())
        })??;
        self.calls.remove(session_id);
        Ok(initiator)
    }

    /// Validate and route one signaling frame; returns the peer identity the
    /// opaque payload should be forwarded to.
    ///
    /// Offers are initiator-only and leave the state in `negotiating`;
    /// the answer is callee-only and completes the handshake (`active`);
    /// candidates flow both ways from `negotiating` on.
    pub fn relay(
        &self,
        session_id: &SessionId,
        sender: &Identity,
        kind: SignalKind,
    ) -> Result<Identity, LuminaError> {
        self.with_call(session_id, |call| {
            let Some(peer) = call.peer_of(sender) else {
                return Err(LuminaError::ProtocolViolation(format!(
                    "signal for session {session_id} from a non-participant"
                )));
            };
            match kind {
                SignalKind::Offer => {
                    if call.state != CallState::Negotiating {
                        return Err(call_order_violation(session_id, "webrtc_offer", call.state));
                    }
                    if sender != &call.initiator {
                        return Err(LuminaError::ProtocolViolation(format!(
                            "webrtc_offer for session {session_id} from non-initiator"
                        )));
                    }
                }
                SignalKind::Answer => {
                    if call.state != CallState::Negotiating {
                        return Err(call_order_violation(session_id, "webrtc_answer", call.state));
                    }
                    if sender != &call.callee {
                        return Err(LuminaError::ProtocolViolation(format!(
                            "webrtc_answer for session {session_id} from non-callee"
                        )));
                    }
                    call.state = CallState::Active;
                }
                SignalKind::Candidate => {
                    if !matches!(call.state, CallState::Negotiating | CallState::Active) {
                        return Err(call_order_violation(session_id, "ice_candidate", call.state));
                    }
                }
            }
            Ok(peer)
        })?
    }

    /// Either participant ends a non-ended call. Frees the slot and returns
    /// the peer to notify.
    pub fn hangup(&self, session_id: &SessionId, sender: &Identity) -> Result<Identity, LuminaError> {
        let peer = self.with_call(session_id, |call| {
            let Some(peer) = call.peer_of(sender) else {
                return Err(LuminaError::ProtocolViolation(format!(
                    "hangup for session {session_id} from a non-participant"
                )));
            };
            call.state = CallState::Ended;
            Ok(peer)
        })??;
        self.calls.remove(session_id);
        tracing::info!(session_id = %session_id, "call ended");
        Ok(peer)
    }

    /// Ring timeout: tears the call down only if it is still unanswered.
    /// Returns the initiator to notify, or `None` when the call moved on.
    pub fn ring_timeout(&self, session_id: &SessionId) -> Option<Identity> {
        let initiator = {
            let entry = self.calls.get(session_id)?;
            let mut call = entry.value().lock().unwrap_or_else(|e| e.into_inner());
            if call.state != CallState::Requested {
                return None;
            }
            call.state = CallState::Ended;
            call.initiator.clone()
        };
        self.calls.remove(session_id);
        tracing::info!(session_id = %session_id, "call ring timed out");
        Some(initiator)
    }

    /// Tear down the session's call unconditionally (session close). Returns
    /// both participants to notify, or `None` when no live call existed.
    pub fn end_session(&self, session_id: &SessionId) -> Option<(Identity, Identity)> {
        let (_, cell) = self.calls.remove(session_id)?;
        let call = cell.into_inner().unwrap_or_else(|e| e.into_inner());
        if call.state == CallState::Ended {
            return None;
        }
        tracing::info!(session_id = %session_id, "call torn down with session");
        Some((call.initiator, call.callee))
    }

    /// Tear down every call this identity participates in (connection loss
    /// or session close). Returns `(session, peer)` pairs to notify.
    pub fn end_for_identity(&self, identity: &Identity) -> Vec<(SessionId, Identity)> {
        let mut ended = Vec::new();
        for entry in self.calls.iter() {
            let call = entry.value().lock().unwrap_or_else(|e| e.into_inner());
            if call.state == CallState::Ended {
                continue;
            }
            if let Some(peer) = call.peer_of(identity) {
                ended.push((call.session_id.clone(), peer));
            }
        }
        for (session_id, _) in &ended {
            self.calls.remove(session_id);
        }
        ended
    }

    /// Current state of the session's call slot, if occupied.
    pub fn state(&self, session_id: &SessionId) -> Option<CallState> {
        self.calls
            .get(session_id)
            .map(|e| e.value().lock().unwrap_or_else(|err| err.into_inner()).state)
    }

    fn with_call<T>(
        &self,
        session_id: &SessionId,
        f: impl FnOnce(&mut CallSession) -> T,
    ) -> Result<T, LuminaError> {
        let entry = self.calls.get(session_id).ok_or_else(|| {
            LuminaError::ProtocolViolation(format!("no call in progress for session {session_id}"))
        })?;
        let mut call = entry.value().lock().unwrap_or_else(|e| e.into_inner());
        Ok(f(&mut call))
    }
}

fn call_order_violation(
    session_id: &SessionId,
    event: &str,
    state: CallState,
) -> LuminaError {
    LuminaError::ProtocolViolation(format!(
        "{event} for session {session_id} out of order (call state {state:?})"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_core::types::{AgentId, SessionId};

    fn sid(s: &str) -> SessionId {
        SessionId(s.into())
    }

    fn customer(s: &str) -> Identity {
        Identity::Customer(SessionId(s.into()))
    }

    fn agent(s: &str) -> Identity {
        Identity::Agent(AgentId(s.into()))
    }

    fn ringing_call(relay: &CallRelay) {
        relay
            .request(&sid("s1"), agent("a1"), customer("s1"), CallType::Voice)
            .unwrap();
    }

    #[test]
    fn full_handshake_reaches_active() {
        let relay = CallRelay::new();
        ringing_call(&relay);
        assert_eq!(relay.state(&sid("s1")), Some(CallState::Requested));

        let notify = relay.accept(&sid("s1"), &customer("s1")).unwrap();
        assert_eq!(notify, agent("a1"));
        assert_eq!(relay.state(&sid("s1")), Some(CallState::Negotiating));

        let to = relay.relay(&sid("s1"), &agent("a1"), SignalKind::Offer).unwrap();
        assert_eq!(to, customer("s1"));
        let to = relay.relay(&sid("s1"), &customer("s1"), SignalKind::Answer).unwrap();
        assert_eq!(to, agent("a1"));
        assert_eq!(relay.state(&sid("s1")), Some(CallState::Active));

        // Candidates keep flowing after the answer.
        relay.relay(&sid("s1"), &customer("s1"), SignalKind::Candidate).unwrap();
        relay.relay(&sid("s1"), &agent("a1"), SignalKind::Candidate).unwrap();
    }

    #[test]
    fn offer_without_call_is_protocol_violation() {
        let relay = CallRelay::new();
        let err = relay
            .relay(&sid("s1"), &agent("a1"), SignalKind::Offer)
            .unwrap_err();
        assert!(matches!(err, LuminaError::ProtocolViolation(_)));
    }

    #[test]
    fn offer_before_accept_is_out_of_order() {
        let relay = CallRelay::new();
        ringing_call(&relay);
        let err = relay
            .relay(&sid("s1"), &agent("a1"), SignalKind::Offer)
            .unwrap_err();
        assert!(matches!(err, LuminaError::ProtocolViolation(_)));
        // The ringing call is untouched.
        assert_eq!(relay.state(&sid("s1")), Some(CallState::Requested));
    }

    #[test]
    fn second_request_while_call_live_is_rejected() {
        let relay = CallRelay::new();
        ringing_call(&relay);
        let err = relay
            .request(&sid("s1"), customer("s1"), agent("a1"), CallType::Video)
            .unwrap_err();
        assert!(matches!(err, LuminaError::ProtocolViolation(_)));
    }

    #[test]
    fn only_callee_may_accept() {
        let relay = CallRelay::new();
        ringing_call(&relay);
        let err = relay.accept(&sid("s1"), &agent("a1")).unwrap_err();
        assert!(matches!(err, LuminaError::ProtocolViolation(_)));
    }

    #[test]
    fn answer_from_initiator_is_rejected() {
        let relay = CallRelay::new();
        ringing_call(&relay);
        relay.accept(&sid("s1"), &customer("s1")).unwrap();
        let err = relay
            .relay(&sid("s1"), &agent("a1"), SignalKind::Answer)
            .unwrap_err();
        assert!(matches!(err, LuminaError::ProtocolViolation(_)));
    }

    #[test]
    fn decline_frees_the_slot() {
        let relay = CallRelay::new();
        ringing_call(&relay);
        let notify = relay.decline(&sid("s1"), &customer("s1")).unwrap();
        assert_eq!(notify, agent("a1"));
        assert_eq!(relay.state(&sid("s1")), None);

        // A fresh request may follow immediately.
        ringing_call(&relay);
    }

    #[test]
    fn hangup_from_either_side() {
        let relay = CallRelay::new();
        ringing_call(&relay);
        relay.accept(&sid("s1"), &customer("s1")).unwrap();

        let peer = relay.hangup(&sid("s1"), &customer("s1")).unwrap();
        assert_eq!(peer, agent("a1"));
        assert_eq!(relay.state(&sid("s1")), None);

        let err = relay.hangup(&sid("s1"), &agent("a1")).unwrap_err();
        assert!(matches!(err, LuminaError::ProtocolViolation(_)));
    }

    #[test]
    fn hangup_from_stranger_is_rejected() {
        let relay = CallRelay::new();
        ringing_call(&relay);
        let err = relay.hangup(&sid("s1"), &agent("a2")).unwrap_err();
        assert!(matches!(err, LuminaError::ProtocolViolation(_)));
        assert_eq!(relay.state(&sid("s1")), Some(CallState::Requested));
    }

    #[test]
    fn ring_timeout_only_hits_unanswered_calls() {
        let relay = CallRelay::new();
        ringing_call(&relay);
        relay.accept(&sid("s1"), &customer("s1")).unwrap();
        assert_eq!(relay.ring_timeout(&sid("s1")), None);
        assert_eq!(relay.state(&sid("s1")), Some(CallState::Negotiating));

        relay.hangup(&sid("s1"), &agent("a1")).unwrap();
        ringing_call(&relay);
        assert_eq!(relay.ring_timeout(&sid("s1")), Some(agent("a1")));
        assert_eq!(relay.state(&sid("s1")), None);
    }

    #[test]
    fn disconnect_tears_down_all_calls() {
        let relay = CallRelay::new();
        relay
            .request(&sid("s1"), agent("a1"), customer("s1"), CallType::Voice)
            .unwrap();
        relay
            .request(&sid("s2"), agent("a1"), customer("s2"), CallType::Video)
            .unwrap();

        let mut ended = relay.end_for_identity(&agent("a1"));
        ended.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            ended,
            vec![(sid("s1"), customer("s1")), (sid("s2"), customer("s2"))]
        );
        assert_eq!(relay.state(&sid("s1")), None);
        assert_eq!(relay.state(&sid("s2")), None);
    }
}
