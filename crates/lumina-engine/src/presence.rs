// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent presence tracker.
//!
//! Presence is a closed state machine per agent: `offline -> available <->
//! busy -> offline`. Availability ordering is longest-idle-first with agent
//! id as the tiebreak, so routing decisions are reproducible.
//!
//! Ungraceful connection loss is handled by the dispatcher calling
//! [`PresenceTracker::set_offline`] from the disconnect path — presence is
//! never left stale.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use lumina_core::types::{AgentId, Permission, SessionId};

/// Availability state for receiving new work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Offline,
    Available,
    Busy,
}

impl std::fmt::Display for Presence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Presence::Offline => f.write_str("offline"),
            Presence::Available => f.write_str("available"),
            Presence::Busy => f.write_str("busy"),
        }
    }
}

/// Tracked state for one agent.
#[derive(Debug, Clone)]
pub struct AgentRecord {
    pub agent_id: AgentId,
    pub permissions: HashSet<Permission>,
    pub presence: Presence,
    pub active_sessions: HashSet<SessionId>,
    /// When the agent last became free, for longest-idle-first ordering.
    pub idle_since: DateTime<Utc>,
}

impl AgentRecord {
    fn new(agent_id: AgentId, permissions: HashSet<Permission>) -> Self {
        Self {
            agent_id,
            permissions,
            presence: Presence::Available,
            active_sessions: HashSet::new(),
            idle_since: Utc::now(),
        }
    }
}

/// Keyed presence state with per-agent exclusive sections.
pub struct PresenceTracker {
    agents: DashMap<AgentId, Arc<Mutex<AgentRecord>>>,
    /// Sessions one agent may hold before being marked busy.
    max_concurrent: usize,
}

impl PresenceTracker {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            agents: DashMap::new(),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Declare an agent online and available. Reconnecting refreshes the
    /// permission set but keeps any sessions still assigned.
    pub async fn set_online(&self, agent_id: &AgentId, permissions: HashSet<Permission>) {
        let entry = self
            .agents
            .entry(agent_id.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(AgentRecord::new(
                    agent_id.clone(),
                    HashSet::new(),
                )))
            })
            .value()
            .clone();
        let mut record = entry.lock().await;
        record.permissions = permissions;
        record.presence = if record.active_sessions.len() >= self.max_concurrent {
            Presence::Busy
        } else {
            Presence::Available
        };
        record.idle_since = Utc::now();
        tracing::debug!(agent_id = %agent_id, presence = %record.presence, "agent online");
    }

    /// Graceful sign-off or implicit offline on connection loss.
    pub async fn set_offline(&self, agent_id: &AgentId) {
        if let Some(entry) = self.agent_entry(agent_id) {
            let mut record = entry.lock().await;
            record.presence = Presence::Offline;
            tracing::debug!(agent_id = %agent_id, "agent offline");
        }
    }

    /// Explicit busy toggle (e.g. an agent stepping away without signing off).
    pub async fn set_busy(&self, agent_id: &AgentId, busy: bool) {
        if let Some(entry) = self.agent_entry(agent_id) {
            let mut record = entry.lock().await;
            if record.presence == Presence::Offline {
                return;
            }
            record.presence = if busy { Presence::Busy } else { Presence::Available };
            if !busy {
                record.idle_since = Utc::now();
            }
        }
    }

    /// Agents able to take new work requiring `permission`, longest idle
    /// first, ties broken by agent id.
    pub async fn available_agents(&self, permission: Permission) -> Vec<AgentId> {
        let entries: Vec<_> = self.agents.iter().map(|e| e.value().clone()).collect();
        let mut candidates = Vec::new();
        for entry in entries {
            let record = entry.lock().await;
            if record.presence == Presence::Available
                && record.permissions.contains(&permission)
                && record.active_sessions.len() < self.max_concurrent
            {
                candidates.push((record.idle_since, record.agent_id.clone()));
            }
        }
        candidates.sort();
        candidates.into_iter().map(|(_, id)| id).collect()
    }

    /// Atomically claim a slot on an agent for a session. Returns false when
    /// the agent went offline or filled up since the availability scan.
    pub async fn try_claim(&self, agent_id: &AgentId, session_id: &SessionId) -> bool {
        let Some(entry) = self.agent_entry(agent_id) else {
            return false;
        };
        let mut record = entry.lock().await;
        if record.presence != Presence::Available
            || record.active_sessions.len() >= self.max_concurrent
        {
            return false;
        }
        record.active_sessions.insert(session_id.clone());
        if record.active_sessions.len() >= self.max_concurrent {
            record.presence = Presence::Busy;
        }
        true
    }

    /// Release a session slot (session closed or reassigned). Busy agents
    /// below the cap become available again, with a fresh idle timestamp.
    pub async fn release(&self, agent_id: &AgentId, session_id: &SessionId) {
        if let Some(entry) = self.agent_entry(agent_id) {
            let mut record = entry.lock().await;
            record.active_sessions.remove(session_id);
            if record.presence == Presence::Busy
                && record.active_sessions.len() < self.max_concurrent
            {
                record.presence = Presence::Available;
                record.idle_since = Utc::now();
            }
        }
    }

    pub async fn presence_of(&self, agent_id: &AgentId) -> Option<Presence> {
        match self.agent_entry(agent_id) {
            Some(entry) => Some(entry.lock().await.presence),
            None => None,
        }
    }

    pub async fn permissions_of(&self, agent_id: &AgentId) -> Option<HashSet<Permission>> {
        match self.agent_entry(agent_id) {
            Some(entry) => Some(entry.lock().await.permissions.clone()),
            None => None,
        }
    }

    fn agent_entry(&self, agent_id: &AgentId) -> Option<Arc<Mutex<AgentRecord>>> {
        self.agents.get(agent_id).map(|e| e.value().clone())
    }
}

/// The full permission set granted by the default agent credential.
pub fn all_permissions() -> HashSet<Permission> {
    [
        Permission::Chat,
        Permission::Voice,
        Permission::Video,
        Permission::Transfer,
    ]
    .into_iter()
    .collect()
}
