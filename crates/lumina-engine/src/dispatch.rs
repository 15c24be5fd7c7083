// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event dispatcher: one entry point per inbound event, disconnect, or timer.
//!
//! Each call validates the sender's role, runs the state transitions, and
//! returns the full set of deliveries and timer requests as data. Nothing
//! here performs I/O: the transport layer fans deliveries out to sockets and
//! arms the timers. Computing deliveries before any send is what keeps the
//! engine's state transitions atomic with respect to the wire.
//!
//! External collaborators (the AI responder, transcript archival) are only
//! awaited with no entry locks held.

use std::sync::Arc;
use std::time::Duration;

use lumina_core::error::LuminaError;
use lumina_core::events::{ClientEvent, EscalationStatus, ServerEvent};
use lumina_core::traits::{Reply, Responder, TranscriptStore};
use lumina_core::types::{
    CallType, ConnectionId, Identity, Permission, Role, Sender, SessionId, SessionStatus,
    SignalKind,
};

use crate::escalation::{EscalationRouter, RouteOutcome};
use crate::presence::{PresenceTracker, all_permissions};
use crate::registry::ConnectionRegistry;
use crate::signaling::CallRelay;
use crate::store::{Escalation, SessionStore};

/// Engine tunables, filled from the config layer by the binary.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sessions one agent may hold before being marked busy.
    pub max_concurrent_sessions: usize,
    /// How long a pending escalation waits before falling back to the AI.
    pub escalation_timeout: Duration,
    /// How long an unanswered call rings before being declined.
    pub ring_timeout: Duration,
    /// First AI transcript line of every new session.
    pub greeting: String,
    /// Whether an agent coming online triggers a queued-escalation rescan.
    pub rescan_on_agent_online: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 1,
            escalation_timeout: Duration::from_secs(60),
            ring_timeout: Duration::from_secs(30),
            greeting: "Hello! I am Lumina AI. How can I help you today?".into(),
            rescan_on_agent_online: true,
        }
    }
}

/// One outbound event addressed to a logical identity. The transport fans it
/// out to every live connection of that identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: Identity,
    pub event: ServerEvent,
}

/// A timer the transport should arm; on expiry it re-enters the dispatcher
/// through [`Dispatcher::handle_timer`].
#[derive(Debug, Clone, PartialEq)]
pub struct TimerRequest {
    pub after: Duration,
    pub expiry: TimerExpiry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerExpiry {
    /// Pending escalation still unanswered: fall back to the AI.
    EscalationTimeout(SessionId),
    /// Ringing call still unanswered: decline it.
    RingTimeout(SessionId),
}

/// Everything one dispatch produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchOutput {
    pub deliveries: Vec<Delivery>,
    pub timers: Vec<TimerRequest>,
}

impl DispatchOutput {
    fn none() -> Self {
        Self::default()
    }

    fn deliver(deliveries: Vec<Delivery>) -> Self {
        Self {
            deliveries,
            timers: Vec::new(),
        }
    }
}

fn to(identity: Identity, event: ServerEvent) -> Delivery {
    Delivery {
        to: identity,
        event,
    }
}

/// The engine behind every socket: owns all session, presence, and call
/// state, and turns inbound events into outbound deliveries.
pub struct Dispatcher {
    registry: ConnectionRegistry,
    store: SessionStore,
    presence: PresenceTracker,
    router: EscalationRouter,
    calls: CallRelay,
    responder: Arc<dyn Responder>,
    transcripts: Arc<dyn TranscriptStore>,
    config: EngineConfig,
}

impl Dispatcher {
    pub fn new(
        config: EngineConfig,
        responder: Arc<dyn Responder>,
        transcripts: Arc<dyn TranscriptStore>,
    ) -> Self {
        let store = if config.greeting.is_empty() {
            SessionStore::new()
        } else {
            SessionStore::with_greeting(config.greeting.clone())
        };
        Self {
            registry: ConnectionRegistry::new(),
            store,
            presence: PresenceTracker::new(config.max_concurrent_sessions),
            router: EscalationRouter::new(),
            calls: CallRelay::new(),
            responder,
            transcripts,
            config,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Dispatch one inbound event from a connection.
    pub async fn handle(
        &self,
        conn: ConnectionId,
        role: Role,
        event: ClientEvent,
    ) -> Result<DispatchOutput, LuminaError> {
        check_role(role, &event)?;
        tracing::debug!(conn = %conn, event = event.kind(), "dispatch");

        match event {
            ClientEvent::NewChat { session_id, message } => {
                self.on_new_chat(conn, session_id, message).await
            }
            ClientEvent::EscalateToHuman { session_id } => {
                self.bind_customer(conn, &session_id);
                self.escalate(&session_id).await
            }
            ClientEvent::CloseChat { session_id, rating } => {
                let closed_by = match role {
                    Role::Customer => {
                        self.bind_customer(conn, &session_id);
                        Sender::Customer
                    }
                    Role::Agent(_) => {
                        self.agent_identity(conn)?;
                        Sender::Agent
                    }
                };
                self.on_close_chat(&session_id, closed_by, rating).await
            }
            ClientEvent::JoinChat { session_id } => {
                let identity = self.sender_identity(conn, role, &session_id)?;
                let (status, messages) = self.store.snapshot(&session_id).await?;
                Ok(DispatchOutput::deliver(vec![to(
                    identity,
                    ServerEvent::ChatState {
                        session_id,
                        status,
                        messages,
                    },
                )]))
            }
            ClientEvent::AgentOnline { agent_id } => {
                let identity = Identity::Agent(agent_id.clone());
                self.registry.register(conn, identity, role);
                self.presence.set_online(&agent_id, all_permissions()).await;
                if !self.config.rescan_on_agent_online {
                    return Ok(DispatchOutput::none());
                }
                let assigned = self.router.on_agent_online(&self.store, &self.presence).await;
                let mut deliveries = Vec::new();
                for (session_id, agent_id) in assigned {
                    deliveries.push(to(
                        Identity::Customer(session_id.clone()),
                        ServerEvent::EscalationStatus {
                            session_id: session_id.clone(),
                            status: EscalationStatus::Connected,
                            agent: Some(agent_id.clone()),
                        },
                    ));
                    deliveries.push(to(
                        Identity::Agent(agent_id),
                        ServerEvent::NewEscalation { session_id },
                    ));
                }
                Ok(DispatchOutput::deliver(deliveries))
            }
            ClientEvent::AgentOffline { agent_id } => {
                let identity = self.agent_identity(conn)?;
                if identity != Identity::Agent(agent_id.clone()) {
                    return Err(LuminaError::ProtocolViolation(format!(
                        "agent_offline for {agent_id} from a different identity"
                    )));
                }
                self.presence.set_offline(&agent_id).await;
                Ok(DispatchOutput::none())
            }
            ClientEvent::AgentMessage { session_id, message } => {
                let identity = self.agent_identity(conn)?;
                let Identity::Agent(agent_id) = &identity else {
                    return Err(LuminaError::StaleConnection);
                };
                if self.store.assigned_agent(&session_id).await?.as_ref() != Some(agent_id) {
                    return Err(LuminaError::ProtocolViolation(format!(
                        "agent_message for session {session_id} from an unassigned agent"
                    )));
                }
                self.store
                    .append_message(&session_id, Sender::Agent, message.clone())
                    .await?;
                Ok(DispatchOutput::deliver(vec![to(
                    Identity::Customer(session_id.clone()),
                    ServerEvent::AgentMessage {
                        session_id,
                        content: message,
                    },
                )]))
            }
            ClientEvent::CallRequest { session_id, call_type } => {
                let initiator = self.sender_identity(conn, role, &session_id)?;
                self.on_call_request(&session_id, initiator, call_type).await
            }
            ClientEvent::CallAccepted { session_id } => {
                let sender = self.sender_identity(conn, role, &session_id)?;
                let initiator = self.calls.accept(&session_id, &sender)?;
                if !self.registry.is_connected(&initiator) {
                    // The caller vanished mid-ring; tear the call down.
                    self.calls.end_session(&session_id);
                    return Ok(DispatchOutput::deliver(vec![to(
                        sender,
                        ServerEvent::CallEnded { session_id },
                    )]));
                }
                Ok(DispatchOutput::deliver(vec![to(
                    initiator,
                    ServerEvent::CallAccepted {
                        session_id,
                        from: sender,
                    },
                )]))
            }
            ClientEvent::CallDeclined { session_id } => {
                let sender = self.sender_identity(conn, role, &session_id)?;
                let initiator = self.calls.decline(&session_id, &sender)?;
                Ok(DispatchOutput::deliver(vec![to(
                    initiator,
                    ServerEvent::CallDeclined { session_id },
                )]))
            }
            ClientEvent::Hangup { session_id } => {
                let sender = self.sender_identity(conn, role, &session_id)?;
                let peer = self.calls.hangup(&session_id, &sender)?;
                Ok(DispatchOutput::deliver(vec![to(
                    peer,
                    ServerEvent::CallEnded { session_id },
                )]))
            }
            ClientEvent::WebrtcOffer { session_id, payload } => {
                let sender = self.sender_identity(conn, role, &session_id)?;
                let peer = self.calls.relay(&session_id, &sender, SignalKind::Offer)?;
                Ok(DispatchOutput::deliver(vec![to(
                    peer,
                    ServerEvent::WebrtcOffer {
                        session_id,
                        from: sender,
                        payload,
                    },
                )]))
            }
            ClientEvent::WebrtcAnswer { session_id, payload } => {
                let sender = self.sender_identity(conn, role, &session_id)?;
                let peer = self.calls.relay(&session_id, &sender, SignalKind::Answer)?;
                Ok(DispatchOutput::deliver(vec![to(
                    peer,
                    ServerEvent::WebrtcAnswer {
                        session_id,
                        from: sender,
                        payload,
                    },
                )]))
            }
            ClientEvent::IceCandidate { session_id, payload } => {
                let sender = self.sender_identity(conn, role, &session_id)?;
                let peer = self.calls.relay(&session_id, &sender, SignalKind::Candidate)?;
                Ok(DispatchOutput::deliver(vec![to(
                    peer,
                    ServerEvent::IceCandidate {
                        session_id,
                        from: sender,
                        payload,
                    },
                )]))
            }
        }
    }

    /// A connection closed (gracefully or not). Presence and call teardown
    /// run only when the identity's last handle went away.
    pub async fn handle_disconnect(&self, conn: ConnectionId) -> DispatchOutput {
        let Some(gone) = self.registry.unregister(conn) else {
            return DispatchOutput::none();
        };
        if !gone.last_connection {
            return DispatchOutput::none();
        }
        tracing::info!(identity = %gone.identity, "last connection lost");

        if let Identity::Agent(agent_id) = &gone.identity {
            self.presence.set_offline(agent_id).await;
        }
        // Open sessions survive a customer disconnect; calls never do.
        let mut deliveries = Vec::new();
        for (session_id, peer) in self.calls.end_for_identity(&gone.identity) {
            deliveries.push(to(peer, ServerEvent::CallEnded { session_id }));
        }
        DispatchOutput::deliver(deliveries)
    }

    /// A previously armed timer fired. Timers race the events they guard, so
    /// state that moved on in the meantime makes the expiry a no-op.
    pub async fn handle_timer(&self, expiry: TimerExpiry) -> DispatchOutput {
        match expiry {
            TimerExpiry::EscalationTimeout(session_id) => {
                match self.store.status(&session_id).await {
                    Ok(SessionStatus::EscalationPending) => {}
                    _ => return DispatchOutput::none(),
                }
                if self.store.revert_to_ai(&session_id).await.is_err() {
                    // Lost the race to an assignment.
                    return DispatchOutput::none();
                }
                self.router.forget(&session_id).await;
                let note = "No agents are available right now. \
                            The AI assistant will continue helping you.";
                if let Err(err) = self
                    .store
                    .append_message(&session_id, Sender::System, note)
                    .await
                {
                    tracing::warn!(session_id = %session_id, %err, "timeout note dropped");
                }
                tracing::info!(session_id = %session_id, "escalation timed out, back to AI");
                DispatchOutput::deliver(vec![to(
                    Identity::Customer(session_id.clone()),
                    ServerEvent::EscalationStatus {
                        session_id,
                        status: EscalationStatus::NoAgentsAvailable,
                        agent: None,
                    },
                )])
            }
            TimerExpiry::RingTimeout(session_id) => {
                match self.calls.ring_timeout(&session_id) {
                    Some(initiator) => DispatchOutput::deliver(vec![to(
                        initiator,
                        ServerEvent::CallDeclined { session_id },
                    )]),
                    None => DispatchOutput::none(),
                }
            }
        }
    }

    /// Current-state snapshot for a sender that proved out of sync (a local
    /// dispatch error on a session event). Returns the snapshot only when the
    /// connection's identity actually participates in the session: the
    /// session's own customer, or its assigned agent. Anyone else gets
    /// nothing.
    pub async fn resync_state(
        &self,
        conn: ConnectionId,
        session_id: &SessionId,
    ) -> Option<ServerEvent> {
        let (identity, _) = self.registry.resolve(conn)?;
        let participant = match &identity {
            Identity::Customer(customer_session) => customer_session == session_id,
            Identity::Agent(agent_id) => {
                self.store
                    .assigned_agent(session_id)
                    .await
                    .ok()
                    .flatten()
                    .as_ref()
                    == Some(agent_id)
            }
        };
        if !participant {
            return None;
        }
        let (status, messages) = self.store.snapshot(session_id).await.ok()?;
        Some(ServerEvent::ChatState {
            session_id: session_id.clone(),
            status,
            messages,
        })
    }

    async fn on_new_chat(
        &self,
        conn: ConnectionId,
        session_id: SessionId,
        message: String,
    ) -> Result<DispatchOutput, LuminaError> {
        self.bind_customer(conn, &session_id);
        let customer = Identity::Customer(session_id.clone());
        let (_, created) = self.store.open_or_get(&session_id).await;

        let mut deliveries = Vec::new();
        if created && !self.config.greeting.is_empty() {
            deliveries.push(to(
                customer.clone(),
                ServerEvent::AiResponse {
                    session_id: session_id.clone(),
                    content: self.config.greeting.clone(),
                },
            ));
        }
        self.store
            .append_message(&session_id, Sender::Customer, message.clone())
            .await?;

        match self.store.status(&session_id).await? {
            SessionStatus::AgentActive => {
                if let Some(agent_id) = self.store.assigned_agent(&session_id).await? {
                    deliveries.push(to(
                        Identity::Agent(agent_id),
                        ServerEvent::NewCustomerMessage {
                            session_id,
                            message,
                        },
                    ));
                }
                Ok(DispatchOutput::deliver(deliveries))
            }
            SessionStatus::EscalationPending => {
                // Waiting for an agent; the transcript carries the message.
                Ok(DispatchOutput::deliver(deliveries))
            }
            SessionStatus::AiActive => {
                // No entry lock is held across the responder await.
                match self.responder.respond(&session_id, &message).await? {
                    Reply::Content(content) => {
                        self.store
                            .append_message(&session_id, Sender::Ai, content.clone())
                            .await?;
                        deliveries.push(to(
                            customer,
                            ServerEvent::AiResponse {
                                session_id,
                                content,
                            },
                        ));
                        Ok(DispatchOutput::deliver(deliveries))
                    }
                    Reply::Escalate => {
                        let mut output = self.escalate(&session_id).await?;
                        deliveries.append(&mut output.deliveries);
                        output.deliveries = deliveries;
                        Ok(output)
                    }
                }
            }
            SessionStatus::Closed => Err(LuminaError::SessionNotFound(session_id)),
        }
    }

    /// Shared escalation path for `escalate_to_human` and an AI handoff.
    async fn escalate(&self, session_id: &SessionId) -> Result<DispatchOutput, LuminaError> {
        match self.store.request_escalation(session_id).await? {
            Escalation::Pending => {}
            // Repeats are silently absorbed; the first attempt's outcome
            // stands.
            Escalation::AlreadyEscalated => return Ok(DispatchOutput::none()),
            Escalation::SessionClosed => {
                return Err(LuminaError::SessionNotFound(session_id.clone()));
            }
        }

        match self.router.route(&self.store, &self.presence, session_id).await? {
            RouteOutcome::Assigned(agent_id) => Ok(DispatchOutput::deliver(vec![
                to(
                    Identity::Customer(session_id.clone()),
                    ServerEvent::EscalationStatus {
                        session_id: session_id.clone(),
                        status: EscalationStatus::Connected,
                        agent: Some(agent_id.clone()),
                    },
                ),
                to(
                    Identity::Agent(agent_id),
                    ServerEvent::NewEscalation {
                        session_id: session_id.clone(),
                    },
                ),
            ])),
            RouteOutcome::NoAgentAvailable => Ok(DispatchOutput {
                deliveries: vec![to(
                    Identity::Customer(session_id.clone()),
                    ServerEvent::EscalationStatus {
                        session_id: session_id.clone(),
                        status: EscalationStatus::NoAgentsAvailable,
                        agent: None,
                    },
                )],
                timers: vec![TimerRequest {
                    after: self.config.escalation_timeout,
                    expiry: TimerExpiry::EscalationTimeout(session_id.clone()),
                }],
            }),
        }
    }

    async fn on_close_chat(
        &self,
        session_id: &SessionId,
        closed_by: Sender,
        rating: Option<u8>,
    ) -> Result<DispatchOutput, LuminaError> {
        let mut deliveries = Vec::new();
        if let Some((initiator, callee)) = self.calls.end_session(session_id) {
            for participant in [initiator, callee] {
                deliveries.push(to(
                    participant,
                    ServerEvent::CallEnded {
                        session_id: session_id.clone(),
                    },
                ));
            }
        }

        let archived = self.store.close(session_id, closed_by, rating).await?;
        self.router.forget(session_id).await;
        if let Some(agent_id) = &archived.assigned_agent {
            self.presence.release(agent_id, session_id).await;
            deliveries.push(to(
                Identity::Agent(agent_id.clone()),
                ServerEvent::ChatClosed {
                    session_id: session_id.clone(),
                },
            ));
        }
        deliveries.push(to(
            Identity::Customer(session_id.clone()),
            ServerEvent::ChatClosed {
                session_id: session_id.clone(),
            },
        ));

        // Archival failure must not resurrect the session; log and move on.
        if let Err(err) = self.transcripts.archive_session(&archived).await {
            tracing::error!(session_id = %session_id, %err, "transcript archival failed");
        }
        Ok(DispatchOutput::deliver(deliveries))
    }

    async fn on_call_request(
        &self,
        session_id: &SessionId,
        initiator: Identity,
        call_type: CallType,
    ) -> Result<DispatchOutput, LuminaError> {
        if self.store.status(session_id).await? != SessionStatus::AgentActive {
            return Err(LuminaError::ProtocolViolation(format!(
                "call_request for session {session_id} without an active agent"
            )));
        }
        let assigned = self.store.assigned_agent(session_id).await?.ok_or_else(|| {
            LuminaError::ProtocolViolation(format!(
                "call_request for session {session_id} with no assigned agent"
            ))
        })?;

        let callee = match &initiator {
            Identity::Agent(agent_id) => {
                if agent_id != &assigned {
                    return Err(LuminaError::ProtocolViolation(format!(
                        "call_request for session {session_id} from an unassigned agent"
                    )));
                }
                let needed = match call_type {
                    CallType::Voice => Permission::Voice,
                    CallType::Video => Permission::Video,
                };
                let held = self.presence.permissions_of(agent_id).await.unwrap_or_default();
                if !held.contains(&needed) {
                    return Err(LuminaError::ProtocolViolation(format!(
                        "agent {agent_id} lacks the {needed} permission"
                    )));
                }
                Identity::Customer(session_id.clone())
            }
            Identity::Customer(_) => Identity::Agent(assigned),
        };

        if !self.registry.is_connected(&callee) {
            // Nobody to ring; decline immediately without occupying the slot.
            return Ok(DispatchOutput::deliver(vec![to(
                initiator,
                ServerEvent::CallDeclined {
                    session_id: session_id.clone(),
                },
            )]));
        }

        self.calls
            .request(session_id, initiator.clone(), callee.clone(), call_type)?;
        Ok(DispatchOutput {
            deliveries: vec![to(
                callee,
                ServerEvent::IncomingCall {
                    session_id: session_id.clone(),
                    from: initiator,
                    call_type,
                },
            )],
            timers: vec![TimerRequest {
                after: self.config.ring_timeout,
                expiry: TimerExpiry::RingTimeout(session_id.clone()),
            }],
        })
    }

    /// Customers are bound by the session named in each event; a reused tab
    /// rebinds cleanly.
    fn bind_customer(&self, conn: ConnectionId, session_id: &SessionId) {
        self.registry.register(
            conn,
            Identity::Customer(session_id.clone()),
            Role::Customer,
        );
    }

    /// Agents bind through `agent_online`; anything earlier is out of order.
    fn agent_identity(&self, conn: ConnectionId) -> Result<Identity, LuminaError> {
        let (identity, _) = self.registry.resolve(conn).ok_or_else(|| {
            LuminaError::ProtocolViolation("agent_online must precede other agent events".into())
        })?;
        Ok(identity)
    }

    fn sender_identity(
        &self,
        conn: ConnectionId,
        role: Role,
        session_id: &SessionId,
    ) -> Result<Identity, LuminaError> {
        match role {
            Role::Customer => {
                self.bind_customer(conn, session_id);
                Ok(Identity::Customer(session_id.clone()))
            }
            Role::Agent(_) => self.agent_identity(conn),
        }
    }
}

/// The role/event legality matrix. Illegal pairs are protocol violations
/// regardless of any session state.
fn check_role(role: Role, event: &ClientEvent) -> Result<(), LuminaError> {
    let legal = match role {
        Role::Customer => !matches!(
            event,
            ClientEvent::AgentOnline { .. }
                | ClientEvent::AgentOffline { .. }
                | ClientEvent::AgentMessage { .. }
        ),
        Role::Agent(_) => !matches!(
            event,
            ClientEvent::NewChat { .. } | ClientEvent::EscalateToHuman { .. }
        ),
    };
    if legal {
        Ok(())
    } else {
        Err(LuminaError::ProtocolViolation(format!(
            "{} is not legal for this role",
            event.kind()
        )))
    }
}
