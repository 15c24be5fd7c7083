// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Escalation router: hands pending sessions to available agents.
//!
//! Routing locks the session entry first and the candidate agent second, and
//! only assigns through the held session guard. Since `assign` is legal only
//! from `escalation_pending`, two concurrent routing passes for the same
//! session resolve to exactly one assignment — the loser sees the transition
//! fail and releases its claim.

use std::collections::VecDeque;

use tokio::sync::Mutex;

use lumina_core::error::LuminaError;
use lumina_core::types::{AgentId, Permission, SessionId, SessionStatus};

use crate::presence::PresenceTracker;
use crate::store::SessionStore;

/// Result of one routing pass for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Assigned(AgentId),
    /// No agent could take the session; it was queued for the next
    /// `agent_online` rescan (and the no-agent timeout keeps ticking).
    NoAgentAvailable,
}

/// FIFO queue of sessions waiting for an agent.
#[derive(Default)]
pub struct EscalationRouter {
    pending: Mutex<VecDeque<SessionId>>,
}

impl EscalationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to place one pending session with an agent.
    pub async fn route(
        &self,
        store: &SessionStore,
        presence: &PresenceTracker,
        session_id: &SessionId,
    ) -> Result<RouteOutcome, LuminaError> {
        let entry = store.entry(session_id)?;
        let mut session = entry.lock().await;
        if session.status != SessionStatus::EscalationPending {
            return Err(LuminaError::InvalidTransition {
                session_id: session_id.clone(),
                status: session.status,
                attempted: "route",
            });
        }

        for agent_id in presence.available_agents(Permission::Chat).await {
            if !presence.try_claim(&agent_id, session_id).await {
                continue;
            }
            match session.assign(agent_id.clone()) {
                Ok(()) => {
                    self.forget(session_id).await;
                    tracing::info!(
                        session_id = %session_id,
                        agent_id = %agent_id,
                        "session escalated to agent"
                    );
                    return Ok(RouteOutcome::Assigned(agent_id));
                }
                Err(err) => {
                    presence.release(&agent_id, session_id).await;
                    return Err(err);
                }
            }
        }

        self.enqueue(session_id).await;
        tracing::warn!(session_id = %session_id, "no agent available, session queued");
        Ok(RouteOutcome::NoAgentAvailable)
    }

    /// Rescan triggered by an agent coming online: drain the queue oldest
    /// first, assigning as many sessions as the agent pool takes. Sessions
    /// that already left `escalation_pending` (timed out, closed) are simply
    /// dropped from the queue.
    pub async fn on_agent_online(
        &self,
        store: &SessionStore,
        presence: &PresenceTracker,
    ) -> Vec<(SessionId, AgentId)> {
        let waiting: Vec<SessionId> = {
            let queue = self.pending.lock().await;
            queue.iter().cloned().collect()
        };

        let mut assigned = Vec::new();
        for session_id in waiting {
            match self.route(store, presence, &session_id).await {
                Ok(RouteOutcome::Assigned(agent_id)) => {
                    assigned.push((session_id, agent_id));
                }
                Ok(RouteOutcome::NoAgentAvailable) => break,
                Err(_) => {
                    // Session moved on while queued; stop tracking it.
                    self.forget(&session_id).await;
                }
            }
        }
        assigned
    }

    /// Stop tracking a session (assigned, timed out, or closed).
    pub async fn forget(&self, session_id: &SessionId) {
        let mut queue = self.pending.lock().await;
        queue.retain(|id| id != session_id);
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }

    async fn enqueue(&self, session_id: &SessionId) {
        let mut queue = self.pending.lock().await;
        if !queue.contains(session_id) {
            queue.push_back(session_id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::all_permissions;
    use std::sync::Arc;

    fn sid(s: &str) -> SessionId {
        SessionId(s.into())
    }

    fn aid(s: &str) -> AgentId {
        AgentId(s.into())
    }

    async fn pending_session(store: &SessionStore, id: &SessionId) {
        store.open_or_get(id).await;
        store.request_escalation(id).await.unwrap();
    }

    #[tokio::test]
    async fn routes_to_available_agent() {
        let store = SessionStore::new();
        let presence = PresenceTracker::new(1);
        let router = EscalationRouter::new();

        presence.set_online(&aid("a1"), all_permissions()).await;
        pending_session(&store, &sid("s1")).await;

        let outcome = router.route(&store, &presence, &sid("s1")).await.unwrap();
        assert_eq!(outcome, RouteOutcome::Assigned(aid("a1")));
        assert_eq!(
            store.status(&sid("s1")).await.unwrap(),
            SessionStatus::AgentActive
        );
        assert_eq!(router.pending_len().await, 0);
    }

    #[tokio::test]
    async fn queues_when_no_agent() {
        let store = SessionStore::new();
        let presence = PresenceTracker::new(1);
        let router = EscalationRouter::new();
        pending_session(&store, &sid("s1")).await;

        let outcome = router.route(&store, &presence, &sid("s1")).await.unwrap();
        assert_eq!(outcome, RouteOutcome::NoAgentAvailable);
        assert_eq!(router.pending_len().await, 1);

        // Requeueing the same session does not duplicate it.
        store.revert_to_ai(&sid("s1")).await.unwrap();
        store.request_escalation(&sid("s1")).await.unwrap();
        router.route(&store, &presence, &sid("s1")).await.unwrap();
        assert_eq!(router.pending_len().await, 1);
    }

    #[tokio::test]
    async fn route_requires_pending_status() {
        let store = SessionStore::new();
        let presence = PresenceTracker::new(1);
        let router = EscalationRouter::new();
        store.open_or_get(&sid("s1")).await;

        let err = router
            .route(&store, &presence, &sid("s1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LuminaError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn rescan_drains_queue_oldest_first() {
        let store = SessionStore::new();
        let presence = PresenceTracker::new(1);
        let router = EscalationRouter::new();

        pending_session(&store, &sid("s1")).await;
        pending_session(&store, &sid("s2")).await;
        router.route(&store, &presence, &sid("s1")).await.unwrap();
        router.route(&store, &presence, &sid("s2")).await.unwrap();
        assert_eq!(router.pending_len().await, 2);

        presence.set_online(&aid("a1"), all_permissions()).await;
        let assigned = router.on_agent_online(&store, &presence).await;

        // Cap is 1, so only the oldest session lands.
        assert_eq!(assigned, vec![(sid("s1"), aid("a1"))]);
        assert_eq!(router.pending_len().await, 1);
    }

    #[tokio::test]
    async fn rescan_skips_sessions_that_moved_on() {
        let store = SessionStore::new();
        let presence = PresenceTracker::new(2);
        let router = EscalationRouter::new();

        pending_session(&store, &sid("s1")).await;
        pending_session(&store, &sid("s2")).await;
        router.route(&store, &presence, &sid("s1")).await.unwrap();
        router.route(&store, &presence, &sid("s2")).await.unwrap();

        // s1 times out back to the AI before an agent shows up.
        store.revert_to_ai(&sid("s1")).await.unwrap();

        presence.set_online(&aid("a1"), all_permissions()).await;
        let assigned = router.on_agent_online(&store, &presence).await;
        assert_eq!(assigned, vec![(sid("s2"), aid("a1"))]);
        assert_eq!(router.pending_len().await, 0);
    }

    #[tokio::test]
    async fn concurrent_routing_yields_one_assignment() {
        let store = Arc::new(SessionStore::new());
        let presence = Arc::new(PresenceTracker::new(4));
        let router = Arc::new(EscalationRouter::new());

        presence.set_online(&aid("a1"), all_permissions()).await;
        presence.set_online(&aid("a2"), all_permissions()).await;
        store.open_or_get(&sid("s1")).await;
        store.request_escalation(&sid("s1")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let (store, presence, router) = (store.clone(), presence.clone(), router.clone());
            handles.push(tokio::spawn(async move {
                router.route(&store, &presence, &sid("s1")).await
            }));
        }

        let mut assigned = 0;
        for handle in handles {
            if let Ok(RouteOutcome::Assigned(_)) = handle.await.unwrap() {
                assigned += 1;
            }
        }
        assert_eq!(assigned, 1);
        assert_eq!(
            store.status(&sid("s1")).await.unwrap(),
            SessionStatus::AgentActive
        );
    }
}
