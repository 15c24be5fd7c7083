// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Harness for end-to-end engine tests.
//!
//! `EngineHarness` assembles a complete dispatcher with mock collaborators
//! and offers connection-level helpers, so tests read as conversations
//! rather than plumbing.

use std::sync::Arc;

use lumina_core::error::LuminaError;
use lumina_core::events::ClientEvent;
use lumina_core::traits::Reply;
use lumina_core::types::{AgentId, AgentRole, ConnectionId, Role, SessionId};
use lumina_engine::dispatch::{DispatchOutput, Dispatcher, EngineConfig};

use crate::memory_store::MemoryTranscriptStore;
use crate::mock_responder::MockResponder;

/// Builder for harnesses with scripted AI replies or non-default tunables.
pub struct EngineHarnessBuilder {
    replies: Vec<Reply>,
    config: EngineConfig,
}

impl EngineHarnessBuilder {
    fn new() -> Self {
        Self {
            replies: Vec::new(),
            config: EngineConfig::default(),
        }
    }

    /// Script the AI responder's reply queue.
    pub fn with_replies(mut self, replies: Vec<Reply>) -> Self {
        self.replies = replies;
        self
    }

    /// Replace the engine tunables.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> EngineHarness {
        let responder = Arc::new(MockResponder::with_replies(self.replies));
        let transcripts = Arc::new(MemoryTranscriptStore::new());
        let dispatcher = Arc::new(Dispatcher::new(
            self.config,
            responder.clone(),
            transcripts.clone(),
        ));
        EngineHarness {
            dispatcher,
            responder,
            transcripts,
        }
    }
}

/// A fully assembled dispatcher stack with mock collaborators.
pub struct EngineHarness {
    pub dispatcher: Arc<Dispatcher>,
    pub responder: Arc<MockResponder>,
    pub transcripts: Arc<MemoryTranscriptStore>,
}

impl EngineHarness {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> EngineHarnessBuilder {
        EngineHarnessBuilder::new()
    }

    /// A fresh customer connection handle. The engine binds it to a session
    /// on the first event it sends.
    pub fn customer_conn(&self) -> ConnectionId {
        ConnectionId::new()
    }

    /// Sign an agent on: fresh connection plus `agent_online`.
    pub async fn connect_agent(
        &self,
        agent_id: &str,
    ) -> Result<(ConnectionId, DispatchOutput), LuminaError> {
        let conn = ConnectionId::new();
        let output = self
            .dispatcher
            .handle(
                conn,
                Role::Agent(AgentRole::Agent),
                ClientEvent::AgentOnline {
                    agent_id: AgentId(agent_id.into()),
                },
            )
            .await?;
        Ok((conn, output))
    }

    /// Dispatch one event from a customer connection.
    pub async fn customer_send(
        &self,
        conn: ConnectionId,
        event: ClientEvent,
    ) -> Result<DispatchOutput, LuminaError> {
        self.dispatcher.handle(conn, Role::Customer, event).await
    }

    /// Dispatch one event from an agent connection.
    pub async fn agent_send(
        &self,
        conn: ConnectionId,
        event: ClientEvent,
    ) -> Result<DispatchOutput, LuminaError> {
        self.dispatcher
            .handle(conn, Role::Agent(AgentRole::Agent), event)
            .await
    }

    /// Open a session with one customer message.
    pub async fn open_session(
        &self,
        conn: ConnectionId,
        session_id: &str,
        message: &str,
    ) -> Result<DispatchOutput, LuminaError> {
        self.customer_send(
            conn,
            ClientEvent::NewChat {
                session_id: SessionId(session_id.into()),
                message: message.into(),
            },
        )
        .await
    }
}

impl Default for EngineHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_runs_a_minimal_conversation() {
        let harness = EngineHarness::builder()
            .with_replies(vec![Reply::Content("scripted".into())])
            .build();
        let conn = harness.customer_conn();

        let output = harness.open_session(conn, "s1", "hello").await.unwrap();
        assert!(!output.deliveries.is_empty());
        assert_eq!(harness.responder.seen().await.len(), 1);
    }
}
