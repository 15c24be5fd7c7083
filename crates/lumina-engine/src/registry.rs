// SPDX-FileCopyrightText: 2026 Lumina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection registry: maps live connection handles to logical identities.
//!
//! One identity (a customer session, or an agent) may own any number of
//! simultaneous handles — one per open tab. Deliveries always fan out to the
//! full set, and dependent cleanup (presence, call teardown) runs only when
//! the *last* handle of an identity goes away.

use std::collections::HashSet;

use dashmap::DashMap;

use lumina_core::types::{ConnectionId, Identity, Role};

/// What `unregister` observed, so the dispatcher can run dependent cleanup.
#[derive(Debug, Clone, PartialEq)]
pub struct Unregistered {
    pub identity: Identity,
    pub role: Role,
    /// True when no other handle of this identity remains.
    pub last_connection: bool,
}

/// Bidirectional handle/identity index.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    forward: DashMap<ConnectionId, (Identity, Role)>,
    reverse: DashMap<Identity, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handle to an identity. Re-registering an existing handle
    /// replaces its binding.
    pub fn register(&self, handle: ConnectionId, identity: Identity, role: Role) {
        if let Some((previous, _)) = self.forward.insert(handle, (identity.clone(), role)) {
            if previous != identity {
                self.drop_reverse(&previous, &handle);
            }
        }
        self.reverse.entry(identity).or_default().insert(handle);
    }

    /// Remove a handle. Returns what was bound, and whether this was the
    /// identity's last live connection — the dispatcher uses that to drive
    /// presence-offline and call-teardown transitions.
    pub fn unregister(&self, handle: ConnectionId) -> Option<Unregistered> {
        let (_, (identity, role)) = self.forward.remove(&handle)?;
        let last_connection = self.drop_reverse(&identity, &handle);
        Some(Unregistered {
            identity,
            role,
            last_connection,
        })
    }

    /// Resolve a handle to its identity and role.
    pub fn resolve(&self, handle: ConnectionId) -> Option<(Identity, Role)> {
        self.forward.get(&handle).map(|e| e.value().clone())
    }

    /// All live handles for an identity.
    pub fn connections_for(&self, identity: &Identity) -> Vec<ConnectionId> {
        self.reverse
            .get(identity)
            .map(|e| e.value().iter().copied().collect())
            .unwrap_or_default()
    }

    /// True when the identity has at least one live handle.
    pub fn is_connected(&self, identity: &Identity) -> bool {
        self.reverse
            .get(identity)
            .map(|e| !e.value().is_empty())
            .unwrap_or(false)
    }

    /// Remove a handle from the reverse index; returns true when the
    /// identity's handle set became empty (and was dropped).
    fn drop_reverse(&self, identity: &Identity, handle: &ConnectionId) -> bool {
        let mut emptied = false;
        if let Some(mut entry) = self.reverse.get_mut(identity) {
            entry.value_mut().remove(handle);
            emptied = entry.value().is_empty();
        }
        if emptied {
            self.reverse.remove(identity);
        }
        emptied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_core::types::{AgentId, AgentRole, SessionId};

    fn customer(id: &str) -> Identity {
        Identity::Customer(SessionId(id.into()))
    }

    fn agent(id: &str) -> Identity {
        Identity::Agent(AgentId(id.into()))
    }

    #[test]
    fn register_and_resolve() {
        let registry = ConnectionRegistry::new();
        let handle = ConnectionId::new();
        registry.register(handle, customer("s1"), Role::Customer);

        let (identity, role) = registry.resolve(handle).unwrap();
        assert_eq!(identity, customer("s1"));
        assert_eq!(role, Role::Customer);
    }

    #[test]
    fn resolve_unknown_handle_is_none() {
        let registry = ConnectionRegistry::new();
        assert!(registry.resolve(ConnectionId::new()).is_none());
    }

    #[test]
    fn multi_tab_identity_owns_multiple_handles() {
        let registry = ConnectionRegistry::new();
        let tab1 = ConnectionId::new();
        let tab2 = ConnectionId::new();
        registry.register(tab1, customer("s1"), Role::Customer);
        registry.register(tab2, customer("s1"), Role::Customer);

        let handles = registry.connections_for(&customer("s1"));
        assert_eq!(handles.len(), 2);
        assert!(handles.contains(&tab1));
        assert!(handles.contains(&tab2));
    }

    #[test]
    fn unregister_reports_last_connection() {
        let registry = ConnectionRegistry::new();
        let tab1 = ConnectionId::new();
        let tab2 = ConnectionId::new();
        let identity = agent("a1");
        registry.register(tab1, identity.clone(), Role::Agent(AgentRole::Agent));
        registry.register(tab2, identity.clone(), Role::Agent(AgentRole::Agent));

        let first = registry.unregister(tab1).unwrap();
        assert!(!first.last_connection);
        assert!(registry.is_connected(&identity));

        let second = registry.unregister(tab2).unwrap();
        assert!(second.last_connection);
        assert!(!registry.is_connected(&identity));
    }

    #[test]
    fn unregister_unknown_handle_is_none() {
        let registry = ConnectionRegistry::new();
        assert!(registry.unregister(ConnectionId::new()).is_none());
    }

    #[test]
    fn rebinding_handle_moves_it_between_identities() {
        let registry = ConnectionRegistry::new();
        let handle = ConnectionId::new();
        registry.register(handle, customer("s1"), Role::Customer);
        registry.register(handle, customer("s2"), Role::Customer);

        assert!(!registry.is_connected(&customer("s1")));
        assert_eq!(registry.connections_for(&customer("s2")), vec![handle]);
    }
}
