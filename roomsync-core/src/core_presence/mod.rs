//! Presence Registry
//!
//! Maps connection↔identity with multiplicity awareness: an identity is
//! online while it has at least one live connection, and may hold several
//! at once (multi-device). All state here is process-local and mutated
//! synchronously; there is no durable counterpart.

use crate::core_model::{ConnectionId, Identity, UserId};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Result of registering a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// First connection for this identity: offline → online
    WentOnline,
    /// Identity already had at least one live connection
    StillOnline,
}

/// Result of unregistering a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnregisterOutcome {
    /// Last connection for this identity: online → offline
    WentOffline(Identity),
    /// Identity keeps other live connections
    StillOnline(Identity),
    /// Connection id was not registered; nothing changed
    NotRegistered,
}

/// Tracks connection→identity and identity→connection-set.
///
/// Idempotent under duplicate register/unregister so reconnect storms
/// cannot produce inconsistent state.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    connections: HashMap<ConnectionId, Identity>,
    users: HashMap<UserId, HashSet<ConnectionId>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live connection for an identity.
    ///
    /// Re-registering a known connection id rebinds it (last write wins,
    /// covering auth refresh over the same socket) without duplicating
    /// bookkeeping.
    pub fn register(&mut self, connection_id: ConnectionId, identity: Identity) -> RegisterOutcome {
        let previous_user = self
            .connections
            .get(&connection_id)
            .map(|identity| identity.user_id.clone());
        if let Some(previous_user) = previous_user {
            if previous_user == identity.user_id {
                self.connections.insert(connection_id, identity);
                return RegisterOutcome::StillOnline;
            }
            // Rebind: detach from the old identity first
            self.detach(&connection_id, &previous_user);
        }

        let user_id = identity.user_id.clone();
        self.connections.insert(connection_id.clone(), identity);
        let conns = self.users.entry(user_id.clone()).or_default();
        let was_offline = conns.is_empty();
        conns.insert(connection_id);

        if was_offline {
            debug!(user = %user_id, "identity went online");
            RegisterOutcome::WentOnline
        } else {
            RegisterOutcome::StillOnline
        }
    }

    /// Unregister a connection. Unknown ids are a no-op.
    pub fn unregister(&mut self, connection_id: &ConnectionId) -> UnregisterOutcome {
        let identity = match self.connections.remove(connection_id) {
            Some(identity) => identity,
            None => return UnregisterOutcome::NotRegistered,
        };

        let went_offline = self.detach(connection_id, &identity.user_id);
        if went_offline {
            debug!(user = %identity.user_id, "identity went offline");
            UnregisterOutcome::WentOffline(identity)
        } else {
            UnregisterOutcome::StillOnline(identity)
        }
    }

    /// Whether an identity currently has at least one live connection
    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.users.get(user_id).is_some_and(|c| !c.is_empty())
    }

    /// All identities currently online
    pub fn list_online(&self) -> Vec<UserId> {
        self.users
            .iter()
            .filter(|(_, conns)| !conns.is_empty())
            .map(|(user, _)| user.clone())
            .collect()
    }

    /// The identity bound to a connection, if registered
    pub fn identity_of(&self, connection_id: &ConnectionId) -> Option<&Identity> {
        self.connections.get(connection_id)
    }

    /// Live connections of an identity
    pub fn connections_of(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.users
            .get(user_id)
            .map(|conns| conns.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Drop the connection from the user's set; true if the set became empty.
    fn detach(&mut self, connection_id: &ConnectionId, user_id: &UserId) -> bool {
        match self.users.get_mut(user_id) {
            Some(conns) => {
                conns.remove(connection_id);
                if conns.is_empty() {
                    self.users.remove(user_id);
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }
}
