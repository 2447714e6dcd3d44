//! Group mirror entry data structures and operations

use super::types::{GroupId, RoomId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A Group is a persistent container of member identities and rooms
/// (analogous to a server/community). This is the mirror-side projection;
/// the durable counterpart lives in the persistent store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupEntry {
    /// Unique identifier
    pub id: GroupId,

    /// Human-readable name
    pub name: String,

    /// Owner of the group (always present in `members`)
    pub owner: UserId,

    /// Group members
    pub members: HashSet<UserId>,

    /// Rooms in this group, in creation order
    pub rooms: Vec<RoomId>,

    /// When the group was created
    pub created_at: Timestamp,
}

impl GroupEntry {
    /// Create a new group with the owner as sole member
    pub fn new(name: String, owner: UserId) -> Self {
        let mut members = HashSet::new();
        members.insert(owner.clone());

        GroupEntry {
            id: GroupId::generate(),
            name,
            owner,
            members,
            rooms: Vec::new(),
            created_at: Timestamp::now(),
        }
    }

    /// Check if a user is a member
    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.members.contains(user_id)
    }

    /// Check if a user is the owner
    pub fn is_owner(&self, user_id: &UserId) -> bool {
        &self.owner == user_id
    }

    /// Add a member. Returns false if already present.
    pub fn add_member(&mut self, user_id: UserId) -> bool {
        self.members.insert(user_id)
    }

    /// Remove a member. The owner can only leave by deleting the group.
    pub fn remove_member(&mut self, user_id: &UserId) -> Result<bool, OwnerRemoval> {
        if self.is_owner(user_id) {
            return Err(OwnerRemoval);
        }
        Ok(self.members.remove(user_id))
    }

    /// Record a room under this group
    pub fn add_room(&mut self, room_id: RoomId) {
        if !self.rooms.contains(&room_id) {
            self.rooms.push(room_id);
        }
    }

    /// Drop a room from this group's index
    pub fn remove_room(&mut self, room_id: &RoomId) {
        self.rooms.retain(|id| id != room_id);
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Marker error: the owner may not be removed from the member set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerRemoval;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_group_has_owner_as_sole_member() {
        let owner = UserId::new("alice".to_string());
        let group = GroupEntry::new("Team".to_string(), owner.clone());

        assert_eq!(group.name, "Team");
        assert!(group.is_owner(&owner));
        assert!(group.is_member(&owner));
        assert_eq!(group.member_count(), 1);
        assert!(group.rooms.is_empty());
    }

    #[test]
    fn test_add_member_idempotent() {
        let owner = UserId::new("alice".to_string());
        let mut group = GroupEntry::new("Team".to_string(), owner);

        let bob = UserId::new("bob".to_string());
        assert!(group.add_member(bob.clone()));
        assert!(!group.add_member(bob.clone()));
        assert_eq!(group.member_count(), 2);
    }

    #[test]
    fn test_remove_member() {
        let owner = UserId::new("alice".to_string());
        let mut group = GroupEntry::new("Team".to_string(), owner);

        let bob = UserId::new("bob".to_string());
        group.add_member(bob.clone());

        assert_eq!(group.remove_member(&bob), Ok(true));
        assert!(!group.is_member(&bob));
        // Absent member removal is a no-op, not an error
        assert_eq!(group.remove_member(&bob), Ok(false));
    }

    #[test]
    fn test_cannot_remove_owner() {
        let owner = UserId::new("alice".to_string());
        let mut group = GroupEntry::new("Team".to_string(), owner.clone());

        assert_eq!(group.remove_member(&owner), Err(OwnerRemoval));
        assert!(group.is_member(&owner));
    }

    #[test]
    fn test_room_index() {
        let owner = UserId::new("alice".to_string());
        let mut group = GroupEntry::new("Team".to_string(), owner);

        let room = RoomId::generate();
        group.add_room(room.clone());
        group.add_room(room.clone());
        assert_eq!(group.rooms.len(), 1);

        group.remove_room(&room);
        assert!(group.rooms.is_empty());
    }
}
