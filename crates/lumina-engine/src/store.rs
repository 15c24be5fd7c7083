// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory session store with the session lifecycle transition table.
//!
//! Status transitions:
//!
//! ```text
//! ai_active --escalate--> escalation_pending --assign--> agent_active --close--> closed
//! escalation_pending --no_agent_timeout--> ai_active
//! ai_active --close--> closed
//! ```
//!
//! Each session is guarded by its own `Mutex`; the transcript is append-only
//! and the stored order is exactly the order appends acquired the lock. A
//! closed session leaves the live map — only the archival record survives.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use lumina_core::error::LuminaError;
use lumina_core::types::{
    AgentId, ArchivedSession, ChatMessage, Sender, SessionId, SessionStatus,
};

/// Outcome of an escalation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// The session moved to `escalation_pending`; routing should run.
    Pending,
    /// The session is already pending or already has an agent.
    AlreadyEscalated,
    /// The session is closed; nothing to escalate.
    SessionClosed,
}

/// Live state of one customer session.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub messages: Vec<ChatMessage>,
    pub assigned_agent: Option<AgentId>,
    pub rating: Option<u8>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl ChatSession {
    fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            status: SessionStatus::AiActive,
            messages: Vec::new(),
            assigned_agent: None,
            rating: None,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    /// `escalation_pending -> agent_active`. Any other source status is an
    /// invalid transition — this is what makes concurrent routing attempts
    /// resolve to exactly one assignment.
    pub fn assign(&mut self, agent_id: AgentId) -> Result<(), LuminaError> {
        if self.status != SessionStatus::EscalationPending {
            return Err(LuminaError::InvalidTransition {
                session_id: self.session_id.clone(),
                status: self.status,
                attempted: "assign",
            });
        }
        self.status = SessionStatus::AgentActive;
        self.assigned_agent = Some(agent_id);
        Ok(())
    }

    /// `escalation_pending -> ai_active` (no-agent timeout fallback).
    pub fn revert_to_ai(&mut self) -> Result<(), LuminaError> {
        if self.status != SessionStatus::EscalationPending {
            return Err(LuminaError::InvalidTransition {
                session_id: self.session_id.clone(),
                status: self.status,
                attempted: "revert_to_ai",
            });
        }
        self.status = SessionStatus::AiActive;
        Ok(())
    }
}

/// Keyed store of live sessions.
pub struct SessionStore {
    sessions: DashMap<SessionId, Arc<Mutex<ChatSession>>>,
    /// First AI transcript line appended when a session is created.
    greeting: Option<String>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            greeting: None,
        }
    }

    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self {
            sessions: DashMap::new(),
            greeting: Some(greeting.into()),
        }
    }

    /// The session entry, for callers that need the exclusive section
    /// directly (escalation routing locks session before agent).
    pub fn entry(&self, session_id: &SessionId) -> Result<Arc<Mutex<ChatSession>>, LuminaError> {
        self.sessions
            .get(session_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| LuminaError::SessionNotFound(session_id.clone()))
    }

    /// Idempotent open: returns the existing session or creates one in
    /// `ai_active` with the configured greeting. The bool is true on create.
    pub async fn open_or_get(&self, session_id: &SessionId) -> (Arc<Mutex<ChatSession>>, bool) {
        let mut created = false;
        let entry = self
            .sessions
            .entry(session_id.clone())
            .or_insert_with(|| {
                created = true;
                let mut session = ChatSession::new(session_id.clone());
                if let Some(greeting) = &self.greeting {
                    session.messages.push(ChatMessage::now(Sender::Ai, greeting.clone()));
                }
                Arc::new(Mutex::new(session))
            })
            .value()
            .clone();
        if created {
            tracing::info!(session_id = %session_id, "session opened");
        }
        (entry, created)
    }

    /// Append one transcript message. Order of lock acquisition is the
    /// stored order; a closed session cannot be appended to.
    pub async fn append_message(
        &self,
        session_id: &SessionId,
        sender: Sender,
        content: impl Into<String>,
    ) -> Result<ChatMessage, LuminaError> {
        let entry = self.entry(session_id)?;
        let mut session = entry.lock().await;
        if session.status == SessionStatus::Closed {
            return Err(LuminaError::InvalidTransition {
                session_id: session_id.clone(),
                status: session.status,
                attempted: "append_message",
            });
        }
        let message = ChatMessage::now(sender, content);
        session.messages.push(message.clone());
        Ok(message)
    }

    /// Request a human: `ai_active -> escalation_pending`, idempotent on
    /// repeats, observable as [`Escalation::AlreadyEscalated`].
    pub async fn request_escalation(
        &self,
        session_id: &SessionId,
    ) -> Result<Escalation, LuminaError> {
        let entry = self.entry(session_id)?;
        let mut session = entry.lock().await;
        Ok(match session.status {
            SessionStatus::AiActive => {
                session.status = SessionStatus::EscalationPending;
                Escalation::Pending
            }
            SessionStatus::EscalationPending | SessionStatus::AgentActive => {
                Escalation::AlreadyEscalated
            }
            SessionStatus::Closed => Escalation::SessionClosed,
        })
    }

    /// Direct assignment entry point (routing normally assigns through the
    /// locked entry it already holds).
    pub async fn assign(
        &self,
        session_id: &SessionId,
        agent_id: AgentId,
    ) -> Result<(), LuminaError> {
        let entry = self.entry(session_id)?;
        let mut session = entry.lock().await;
        session.assign(agent_id)
    }

    /// No-agent timeout fallback.
    pub async fn revert_to_ai(&self, session_id: &SessionId) -> Result<(), LuminaError> {
        let entry = self.entry(session_id)?;
        let mut session = entry.lock().await;
        session.revert_to_ai()
    }

    /// Close the session: stamps `closed_at` and the rating (both set once,
    /// only here), computes the derived stats, removes the live entry, and
    /// returns the archival record.
    pub async fn close(
        &self,
        session_id: &SessionId,
        closed_by: Sender,
        rating: Option<u8>,
    ) -> Result<ArchivedSession, LuminaError> {
        let entry = self.entry(session_id)?;
        let archived = {
            let mut session = entry.lock().await;
            if session.status == SessionStatus::Closed {
                return Err(LuminaError::InvalidTransition {
                    session_id: session_id.clone(),
                    status: session.status,
                    attempted: "close",
                });
            }
            let closed_at = Utc::now();
            session.status = SessionStatus::Closed;
            session.closed_at = Some(closed_at);
            if rating.is_some() {
                session.rating = rating;
            }
            ArchivedSession {
                session_id: session.session_id.clone(),
                messages: session.messages.clone(),
                assigned_agent: session.assigned_agent.clone(),
                closed_by,
                opened_at: session.opened_at,
                closed_at,
                duration_secs: (closed_at - session.opened_at).num_seconds(),
                message_count: session.messages.len(),
                rating: session.rating,
            }
        };
        self.sessions.remove(session_id);
        tracing::info!(
            session_id = %session_id,
            message_count = archived.message_count,
            duration_secs = archived.duration_secs,
            "session closed"
        );
        Ok(archived)
    }

    /// Transcript plus current status, for agent resync on `join_chat`.
    pub async fn snapshot(
        &self,
        session_id: &SessionId,
    ) -> Result<(SessionStatus, Vec<ChatMessage>), LuminaError> {
        let entry = self.entry(session_id)?;
        let session = entry.lock().await;
        Ok((session.status, session.messages.clone()))
    }

    pub async fn status(&self, session_id: &SessionId) -> Result<SessionStatus, LuminaError> {
        let entry = self.entry(session_id)?;
        Ok(entry.lock().await.status)
    }

    pub async fn assigned_agent(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<AgentId>, LuminaError> {
        let entry = self.entry(session_id)?;
        Ok(entry.lock().await.assigned_agent.clone())
    }

    /// Live sessions for the observation endpoint.
    pub async fn open_sessions(&self) -> Vec<(SessionId, SessionStatus, usize)> {
        let entries: Vec<_> = self
            .sessions
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let mut out = Vec::with_capacity(entries.len());
        for (id, entry) in entries {
            let session = entry.lock().await;
            out.push((id, session.status, session.messages.len()));
        }
        out
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> SessionId {
        SessionId(s.into())
    }

    #[tokio::test]
    async fn open_or_get_is_idempotent() {
        let store = SessionStore::with_greeting("hello");
        let (_, created) = store.open_or_get(&sid("s1")).await;
        assert!(created);
        let (_, created) = store.open_or_get(&sid("s1")).await;
        assert!(!created);
        assert_eq!(store.len(), 1);

        let (status, messages) = store.snapshot(&sid("s1")).await.unwrap();
        assert_eq!(status, SessionStatus::AiActive);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, Sender::Ai);
    }

    #[tokio::test]
    async fn append_preserves_call_order() {
        let store = SessionStore::new();
        store.open_or_get(&sid("s1")).await;
        for i in 0..10 {
            store
                .append_message(&sid("s1"), Sender::Customer, format!("m{i}"))
                .await
                .unwrap();
        }
        let (_, messages) = store.snapshot(&sid("s1")).await.unwrap();
        let contents: Vec<String> = messages.iter().map(|m| m.content.clone()).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("m{i}")).collect();
        assert_eq!(contents, expected);
    }

    #[tokio::test]
    async fn append_to_missing_session_fails() {
        let store = SessionStore::new();
        let err = store
            .append_message(&sid("nope"), Sender::Customer, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, LuminaError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn escalation_transitions() {
        let store = SessionStore::new();
        store.open_or_get(&sid("s1")).await;

        assert_eq!(
            store.request_escalation(&sid("s1")).await.unwrap(),
            Escalation::Pending
        );
        assert_eq!(
            store.request_escalation(&sid("s1")).await.unwrap(),
            Escalation::AlreadyEscalated
        );
        assert_eq!(
            store.status(&sid("s1")).await.unwrap(),
            SessionStatus::EscalationPending
        );
    }

    #[tokio::test]
    async fn assign_requires_pending() {
        let store = SessionStore::new();
        store.open_or_get(&sid("s1")).await;

        let err = store
            .assign(&sid("s1"), AgentId("a1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, LuminaError::InvalidTransition { .. }));

        store.request_escalation(&sid("s1")).await.unwrap();
        store.assign(&sid("s1"), AgentId("a1".into())).await.unwrap();
        assert_eq!(
            store.status(&sid("s1")).await.unwrap(),
            SessionStatus::AgentActive
        );
        assert_eq!(
            store.assigned_agent(&sid("s1")).await.unwrap(),
            Some(AgentId("a1".into()))
        );

        // Second assign on the same session is rejected.
        let err = store
            .assign(&sid("s1"), AgentId("a2".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, LuminaError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn revert_to_ai_only_from_pending() {
        let store = SessionStore::new();
        store.open_or_get(&sid("s1")).await;
        assert!(store.revert_to_ai(&sid("s1")).await.is_err());

        store.request_escalation(&sid("s1")).await.unwrap();
        store.revert_to_ai(&sid("s1")).await.unwrap();
        assert_eq!(
            store.status(&sid("s1")).await.unwrap(),
            SessionStatus::AiActive
        );
    }

    #[tokio::test]
    async fn close_computes_stats_and_removes_entry() {
        let store = SessionStore::new();
        store.open_or_get(&sid("s1")).await;
        store
            .append_message(&sid("s1"), Sender::Customer, "hi")
            .await
            .unwrap();
        store
            .append_message(&sid("s1"), Sender::Ai, "hello")
            .await
            .unwrap();

        let archived = store.close(&sid("s1"), Sender::Agent, None).await.unwrap();
        assert_eq!(archived.message_count, 2);
        assert_eq!(archived.closed_by, Sender::Agent);
        assert_eq!(archived.rating, None);
        assert!(archived.duration_secs >= 0);
        assert!(store.is_empty());

        // Direct close from ai_active was legal; a second close is not.
        let err = store.close(&sid("s1"), Sender::Agent, None).await.unwrap_err();
        assert!(matches!(err, LuminaError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn close_records_the_rating() {
        let store = SessionStore::new();
        store.open_or_get(&sid("s1")).await;
        let archived = store
            .close(&sid("s1"), Sender::Customer, Some(4))
            .await
            .unwrap();
        assert_eq!(archived.rating, Some(4));
    }

    #[tokio::test]
    async fn append_after_close_via_held_entry_is_rejected() {
        let store = SessionStore::new();
        store.open_or_get(&sid("s1")).await;
        let held = store.entry(&sid("s1")).unwrap();
        store.close(&sid("s1"), Sender::System, None).await.unwrap();

        // A task still holding the Arc sees the closed status.
        let session = held.lock().await;
        assert_eq!(session.status, SessionStatus::Closed);
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let store = Arc::new(SessionStore::new());
        store.open_or_get(&sid("s1")).await;

        let mut handles = Vec::new();
        for task in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    store
                        .append_message(&sid("s1"), Sender::Customer, format!("{task}-{i}"))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let (_, messages) = store.snapshot(&sid("s1")).await.unwrap();
        assert_eq!(messages.len(), 200);
        // Per-sender order is preserved even under interleaving.
        for task in 0..8 {
            let seq: Vec<_> = messages
                .iter()
                .filter(|m| m.content.starts_with(&format!("{task}-")))
                .map(|m| m.content.clone())
                .collect();
            let expected: Vec<_> = (0..25).map(|i| format!("{task}-{i}")).collect();
            assert_eq!(seq, expected);
        }
    }
}
