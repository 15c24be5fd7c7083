// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket handler for the support protocol.
//!
//! Client -> Server (JSON, tagged by `type`):
//! ```json
//! {"type": "new_chat", "session_id": "abc", "message": "help"}
//! {"type": "agent_online", "agent_id": "a1"}
//! ```
//!
//! Server -> Client (JSON, tagged by `type`):
//! ```json
//! {"type": "ai_response", "session_id": "abc", "content": "Hi!"}
//! {"type": "error", "message": "protocol violation: ..."}
//! ```
//!
//! Each socket gets a connection handle and an outbound frame queue. Events
//! run through the dispatcher one at a time per socket; deliveries fan out to
//! every live connection of the addressed identity. A local dispatch error
//! becomes an error frame on the offending socket, followed by a `chat_state`
//! resync when the sender is a real participant of the named session.
//!
//! The server pings every socket on an interval; a peer that goes silent past
//! the timeout is torn down, so a half-open TCP connection cannot leave
//! presence or call state stale.

use std::time::Duration;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use lumina_core::events::ClientEvent;
use lumina_core::types::{AgentRole, ConnectionId, Role};
use lumina_engine::dispatch::{Delivery, TimerRequest};

use crate::server::GatewayState;

/// How often the server pings each socket.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);
/// A socket silent for this long (no frames, no pongs) is considered dead.
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(60);

/// Liveness bookkeeping for one socket. Any inbound frame counts as proof of
/// life; the read loop tears the socket down once the window is exceeded.
struct Heartbeat {
    last_heard: Instant,
    timeout: Duration,
}

impl Heartbeat {
    fn new(timeout: Duration) -> Self {
        Self {
            last_heard: Instant::now(),
            timeout,
        }
    }

    fn record_activity(&mut self) {
        self.last_heard = Instant::now();
    }

    fn is_stale(&self) -> bool {
        self.last_heard.elapsed() > self.timeout
    }
}

/// Query parameters of the agent socket handshake.
#[derive(Debug, Deserialize)]
pub struct AgentSocketQuery {
    /// Bearer token; required when the gateway has one configured.
    #[serde(default)]
    token: Option<String>,
    /// Privilege tier claimed by the agent console.
    #[serde(default)]
    role: Option<AgentRole>,
}

/// Customer socket upgrade handler. Unauthenticated by design: the session
/// id a customer binds to is its only credential.
pub async fn ws_customer_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state, Role::Customer))
}

/// Agent socket upgrade handler. Auth happens at the handshake, not via
/// middleware: the browser WebSocket API cannot set headers.
pub async fn ws_agent_handler(
    Query(params): Query<AgentSocketQuery>,
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
) -> Response {
    if state.auth.bearer_token.is_some() && !state.auth.accepts(params.token.as_deref()) {
        tracing::warn!("agent socket rejected: bad or missing token");
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let role = Role::Agent(params.role.unwrap_or(AgentRole::Agent));
    ws.on_upgrade(move |socket| handle_socket(socket, state, role))
}

/// Handle an individual WebSocket connection.
///
/// Spawns a sender task that drains this connection's frame queue, then
/// reads events in a loop until the socket closes or goes silent past the
/// heartbeat window. Disconnect cleanup runs unconditionally on the way out,
/// graceful close or not.
async fn handle_socket(socket: WebSocket, state: GatewayState, role: Role) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let conn = ConnectionId::new();

    let (tx, mut rx) = mpsc::channel::<Message>(64);
    state.senders.insert(conn, tx.clone());
    tracing::debug!(conn = %conn, "socket opened");

    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    let mut heartbeat = Heartbeat::new(HEARTBEAT_TIMEOUT);
    let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                let Some(Ok(msg)) = msg else { break };
                heartbeat.record_activity();
                match msg {
                    Message::Text(text) => {
                        let text_str: &str = &text;
                        let event: ClientEvent = match serde_json::from_str(text_str) {
                            Ok(v) => v,
                            Err(e) => {
                                tracing::warn!(conn = %conn, "invalid WebSocket message: {e}");
                                let frame = error_frame(&format!("invalid message: {e}"));
                                send_to_conn(&state, conn, &frame).await;
                                continue;
                            }
                        };
                        dispatch_event(&state, conn, role, event).await;
                    }
                    Message::Close(_) => break,
                    // Pong, ping, and binary frames only refresh liveness.
                    _ => {}
                }
            }
            _ = ping_interval.tick() => {
                if heartbeat.is_stale() {
                    tracing::warn!(conn = %conn, "socket unresponsive, closing");
                    break;
                }
                if tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    // Cleanup: ungraceful drops land here too.
    state.senders.remove(&conn);
    let output = state.dispatcher.handle_disconnect(conn).await;
    deliver(&state, &output.deliveries).await;
    sender_task.abort();
    tracing::debug!(conn = %conn, "socket closed");
}

/// Run one event through the dispatcher and fan the results out.
async fn dispatch_event(state: &GatewayState, conn: ConnectionId, role: Role, event: ClientEvent) {
    let kind = event.kind();
    let session_id = event.session_id().cloned();
    match state.dispatcher.handle(conn, role, event).await {
        Ok(output) => {
            deliver(state, &output.deliveries).await;
            for timer in output.timers {
                arm_timer(state.clone(), timer);
            }
        }
        Err(err) if err.is_local() => {
            // The offending event is dropped; only its sender hears about it.
            // A sender that is a real participant of the session also gets a
            // current-state snapshot to resync against.
            tracing::warn!(conn = %conn, event = kind, %err, "event rejected");
            send_to_conn(state, conn, &error_frame(&err.to_string())).await;
            if let Some(session_id) = session_id {
                if let Some(snapshot) = state.dispatcher.resync_state(conn, &session_id).await {
                    if let Ok(frame) = serde_json::to_string(&snapshot) {
                        send_to_conn(state, conn, &frame).await;
                    }
                }
            }
        }
        Err(err) => {
            tracing::error!(conn = %conn, event = kind, %err, "dispatch failed");
            send_to_conn(state, conn, &error_frame("internal error")).await;
        }
    }
}

/// Fan deliveries out to every live connection of each addressed identity.
pub(crate) async fn deliver(state: &GatewayState, deliveries: &[Delivery]) {
    for delivery in deliveries {
        let frame = match serde_json::to_string(&delivery.event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(%e, "outbound event failed to serialize");
                continue;
            }
        };
        for conn in state.dispatcher.registry().connections_for(&delivery.to) {
            send_to_conn(state, conn, &frame).await;
        }
    }
}

async fn send_to_conn(state: &GatewayState, conn: ConnectionId, frame: &str) {
    let Some(tx) = state.senders.get(&conn).map(|e| e.value().clone()) else {
        return;
    };
    if tx.send(Message::Text(frame.to_string().into())).await.is_err() {
        tracing::debug!(conn = %conn, "frame for a closing connection dropped");
    }
}

/// Arm a dispatcher timer: sleep, re-enter the dispatcher, fan out whatever
/// the expiry produced. Expiries that lost their race are no-ops.
fn arm_timer(state: GatewayState, timer: TimerRequest) {
    tokio::spawn(async move {
        tokio::time::sleep(timer.after).await;
        let output = state.dispatcher.handle_timer(timer.expiry).await;
        deliver(&state, &output.deliveries).await;
    });
}

fn error_frame(message: &str) -> String {
    serde_json::json!({
        "type": "error",
        "message": message,
    })
    .to_string()
}
