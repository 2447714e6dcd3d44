//! Room Mirror
//!
//! The per-process cache projecting persistent groups/rooms for low-latency
//! presence and membership queries. Groups and rooms live in flat maps keyed
//! by id; cross-references are id lookups, never embedded ownership
//! pointers, so the structure has no reference cycles.
//!
//! Mutation flows exclusively through the coordinators (the mutators are
//! `pub(crate)`): the mirror is a write-through projection of the store and
//! is only touched after the corresponding durable write succeeds.
//! Occupancy edits are the exception — they are process-local presence data
//! with no durable counterpart.

use crate::core_model::{
    ConnectionId, GroupEntry, GroupId, Identity, RoomEntry, RoomId, UserId,
};
use crate::core_store::{GroupRecord, RoomRecord};
use tracing::warn;

/// Flat arena of group and room entries
#[derive(Debug, Default)]
pub struct RoomMirror {
    groups: std::collections::HashMap<GroupId, GroupEntry>,
    rooms: std::collections::HashMap<RoomId, RoomEntry>,
}

impl RoomMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the mirror from the records the store loaded at bootstrap.
    /// Room records whose parent group is missing are dropped with a
    /// warning; they cannot satisfy the containment invariant.
    pub fn from_records(groups: Vec<GroupRecord>, rooms: Vec<RoomRecord>) -> Self {
        let mut mirror = Self::new();

        for record in groups {
            let entry = GroupEntry {
                id: record.id.clone(),
                name: record.name,
                owner: record.owner_id,
                members: record.member_ids.into_iter().collect(),
                rooms: Vec::new(),
                created_at: record.created_at,
            };
            mirror.groups.insert(record.id, entry);
        }

        for record in rooms {
            match mirror.groups.get_mut(&record.group_id) {
                Some(group) => {
                    group.add_room(record.id.clone());
                    let entry = RoomEntry {
                        id: record.id.clone(),
                        group_id: record.group_id,
                        name: record.name,
                        kind: record.kind,
                        occupants: Vec::new(),
                        created_at: record.created_at,
                    };
                    mirror.rooms.insert(record.id, entry);
                }
                None => {
                    warn!(room = %record.id, group = %record.group_id,
                        "dropping orphan room record at bootstrap");
                }
            }
        }

        mirror
    }

    // ===== Read accessors =====

    pub fn group(&self, id: &GroupId) -> Option<&GroupEntry> {
        self.groups.get(id)
    }

    pub fn room(&self, id: &RoomId) -> Option<&RoomEntry> {
        self.rooms.get(id)
    }

    /// Rooms of a group in creation order
    pub fn rooms_of(&self, group_id: &GroupId) -> Vec<&RoomEntry> {
        self.groups
            .get(group_id)
            .map(|group| {
                group
                    .rooms
                    .iter()
                    .filter_map(|id| self.rooms.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Groups an identity is a member of
    pub fn groups_of(&self, user_id: &UserId) -> Vec<&GroupEntry> {
        self.groups
            .values()
            .filter(|group| group.is_member(user_id))
            .collect()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    // ===== Coordinator-only mutation =====

    pub(crate) fn insert_group(&mut self, entry: GroupEntry) {
        self.groups.insert(entry.id.clone(), entry);
    }

    /// Remove a group and every room under it. Returns the removed room
    /// ids so the caller can cascade broadcasts.
    pub(crate) fn remove_group(&mut self, id: &GroupId) -> Vec<RoomId> {
        match self.groups.remove(id) {
            Some(group) => {
                for room_id in &group.rooms {
                    self.rooms.remove(room_id);
                }
                group.rooms
            }
            None => Vec::new(),
        }
    }

    pub(crate) fn rename_group(&mut self, id: &GroupId, name: &str) {
        if let Some(group) = self.groups.get_mut(id) {
            group.name = name.to_string();
        }
    }

    pub(crate) fn add_member(&mut self, id: &GroupId, user_id: UserId) {
        if let Some(group) = self.groups.get_mut(id) {
            group.add_member(user_id);
        }
    }

    /// Drop a member from a group and evict its occupancy from every room
    /// in that group. Returns the rooms whose occupancy changed.
    pub(crate) fn remove_member(&mut self, id: &GroupId, user_id: &UserId) -> Vec<RoomId> {
        let room_ids = match self.groups.get_mut(id) {
            // The coordinators reject owner removal before getting here
            Some(group) => match group.remove_member(user_id) {
                Ok(true) => group.rooms.clone(),
                Ok(false) | Err(_) => return Vec::new(),
            },
            None => return Vec::new(),
        };

        room_ids
            .into_iter()
            .filter(|room_id| {
                self.rooms
                    .get_mut(room_id)
                    .is_some_and(|room| room.evict_user(user_id))
            })
            .collect()
    }

    pub(crate) fn insert_room(&mut self, entry: RoomEntry) {
        if let Some(group) = self.groups.get_mut(&entry.group_id) {
            group.add_room(entry.id.clone());
        }
        self.rooms.insert(entry.id.clone(), entry);
    }

    pub(crate) fn remove_room(&mut self, id: &RoomId) {
        if let Some(room) = self.rooms.remove(id) {
            if let Some(group) = self.groups.get_mut(&room.group_id) {
                group.remove_room(id);
            }
        }
    }

    pub(crate) fn rename_room(&mut self, id: &RoomId, name: &str) {
        if let Some(room) = self.rooms.get_mut(id) {
            room.name = name.to_string();
        }
    }

    /// Occupancy edit: add a connection to a room. Returns true if the
    /// occupant list changed.
    pub(crate) fn join_room(
        &mut self,
        id: &RoomId,
        connection_id: ConnectionId,
        identity: Identity,
    ) -> bool {
        self.rooms
            .get_mut(id)
            .is_some_and(|room| room.join(connection_id, identity))
    }

    /// Occupancy edit: drop a connection from a room. Returns true if the
    /// occupant list changed.
    pub(crate) fn leave_room(&mut self, id: &RoomId, connection_id: &ConnectionId) -> bool {
        self.rooms
            .get_mut(id)
            .is_some_and(|room| room.leave(connection_id))
    }

    /// Every room a connection currently occupies
    pub fn rooms_occupied_by(&self, connection_id: &ConnectionId) -> Vec<RoomId> {
        self.rooms
            .values()
            .filter(|room| room.occupies(connection_id))
            .map(|room| room.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_model::{RoomKind, Timestamp};

    fn group_record(name: &str, owner: &str) -> GroupRecord {
        GroupRecord {
            id: GroupId::generate(),
            name: name.to_string(),
            owner_id: UserId::new(owner.to_string()),
            member_ids: vec![UserId::new(owner.to_string())],
            created_at: Timestamp::now(),
        }
    }

    fn room_record(group_id: &GroupId, name: &str) -> RoomRecord {
        RoomRecord {
            id: RoomId::generate(),
            group_id: group_id.clone(),
            name: name.to_string(),
            kind: RoomKind::Text,
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn test_bootstrap_from_records() {
        let group = group_record("Team", "alice");
        let room = room_record(&group.id, "general");
        let mirror = RoomMirror::from_records(vec![group.clone()], vec![room.clone()]);

        assert_eq!(mirror.group_count(), 1);
        assert_eq!(mirror.room_count(), 1);

        let entry = mirror.group(&group.id).unwrap();
        assert_eq!(entry.rooms, vec![room.id.clone()]);
        assert_eq!(mirror.rooms_of(&group.id).len(), 1);
        assert!(mirror.room(&room.id).unwrap().occupants.is_empty());
    }

    #[test]
    fn test_bootstrap_drops_orphan_rooms() {
        let room = room_record(&GroupId::generate(), "limbo");
        let mirror = RoomMirror::from_records(vec![], vec![room.clone()]);

        assert_eq!(mirror.group_count(), 0);
        assert_eq!(mirror.room_count(), 0);
        assert!(mirror.room(&room.id).is_none());
    }

    #[test]
    fn test_empty_mirror_queries() {
        let mirror = RoomMirror::new();
        let gid = GroupId::generate();
        assert!(mirror.group(&gid).is_none());
        assert!(mirror.rooms_of(&gid).is_empty());
        assert!(mirror
            .groups_of(&UserId::new("alice".to_string()))
            .is_empty());
    }

    #[test]
    fn test_remove_group_cascades_rooms() {
        let group = group_record("Team", "alice");
        let room_a = room_record(&group.id, "general");
        let room_b = room_record(&group.id, "voice");
        let mut mirror =
            RoomMirror::from_records(vec![group.clone()], vec![room_a.clone(), room_b.clone()]);

        let removed = mirror.remove_group(&group.id);
        assert_eq!(removed.len(), 2);
        assert_eq!(mirror.room_count(), 0);
        assert!(mirror.group(&group.id).is_none());
    }

    #[test]
    fn test_remove_member_evicts_occupancy() {
        let group = group_record("Team", "alice");
        let room = room_record(&group.id, "general");
        let mut mirror = RoomMirror::from_records(vec![group.clone()], vec![room.clone()]);

        let bob = UserId::new("bob".to_string());
        mirror.add_member(&group.id, bob.clone());
        mirror.join_room(
            &room.id,
            ConnectionId::new("c1".to_string()),
            Identity::new(bob.clone(), "bob"),
        );

        let affected = mirror.remove_member(&group.id, &bob);
        assert_eq!(affected, vec![room.id.clone()]);
        assert!(!mirror.group(&group.id).unwrap().is_member(&bob));
        assert!(!mirror.room(&room.id).unwrap().occupied());
    }

    #[test]
    fn test_rooms_occupied_by() {
        let group = group_record("Team", "alice");
        let room = room_record(&group.id, "general");
        let mut mirror = RoomMirror::from_records(vec![group.clone()], vec![room.clone()]);

        let conn = ConnectionId::new("c1".to_string());
        let alice = Identity::new(UserId::new("alice".to_string()), "alice");
        mirror.join_room(&room.id, conn.clone(), alice);

        assert_eq!(mirror.rooms_occupied_by(&conn), vec![room.id.clone()]);
        mirror.leave_room(&room.id, &conn);
        assert!(mirror.rooms_occupied_by(&conn).is_empty());
    }
}
