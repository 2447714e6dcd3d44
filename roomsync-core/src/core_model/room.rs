//! Room mirror entry data structures and operations

use super::types::{ConnectionId, GroupId, Identity, RoomId, RoomKind, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// One live connection occupying a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub connection_id: ConnectionId,
    pub identity: Identity,
}

/// A Room is a named sub-scope of a group, typed text or voice, with its
/// own occupancy list. Occupancy is process-local presence data with no
/// durable counterpart; it is keyed by connection id so one identity can
/// occupy a room from several devices at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomEntry {
    /// Unique identifier
    pub id: RoomId,

    /// Parent group (arena index, not an ownership pointer)
    pub group_id: GroupId,

    /// Human-readable name, unique within the parent group
    pub name: String,

    /// Room type
    pub kind: RoomKind,

    /// Live occupants in join order
    pub occupants: Vec<Occupant>,

    /// When the room was created
    pub created_at: Timestamp,
}

impl RoomEntry {
    /// Create a new empty room
    pub fn new(group_id: GroupId, name: String, kind: RoomKind) -> Self {
        RoomEntry {
            id: RoomId::generate(),
            group_id,
            name,
            kind,
            occupants: Vec::new(),
            created_at: Timestamp::now(),
        }
    }

    /// Add an occupant. Returns false if the connection is already present.
    pub fn join(&mut self, connection_id: ConnectionId, identity: Identity) -> bool {
        if self.occupies(&connection_id) {
            return false;
        }
        self.occupants.push(Occupant {
            connection_id,
            identity,
        });
        true
    }

    /// Remove an occupant. Returns false if the connection was not present.
    pub fn leave(&mut self, connection_id: &ConnectionId) -> bool {
        let before = self.occupants.len();
        self.occupants.retain(|o| &o.connection_id != connection_id);
        self.occupants.len() != before
    }

    /// Remove every occupant belonging to an identity, regardless of
    /// connection. Returns true if anything was removed.
    pub fn evict_user(&mut self, user_id: &UserId) -> bool {
        let before = self.occupants.len();
        self.occupants.retain(|o| &o.identity.user_id != user_id);
        self.occupants.len() != before
    }

    pub fn occupies(&self, connection_id: &ConnectionId) -> bool {
        self.occupants
            .iter()
            .any(|o| &o.connection_id == connection_id)
    }

    pub fn occupied(&self) -> bool {
        !self.occupants.is_empty()
    }
}
