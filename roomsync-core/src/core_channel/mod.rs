//! Channel Coordinator
//!
//! Creates/renames/deletes rooms within a group and manages room occupancy.
//! Structural mutations follow the same write-through discipline as the
//! Group Coordinator; occupancy (join/leave) is process-local presence data
//! and mutates the mirror directly with no durable write.

use crate::core_mirror::RoomMirror;
use crate::core_model::{
    ConnectionId, GroupId, Identity, RoomEntry, RoomId, RoomKind, UserId,
};
use crate::core_store::{DataStore, MessageStore, RoomRecord};
use crate::error::EngineError;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Result of a successful room creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRoom {
    pub room_id: RoomId,
    pub name: String,
    pub kind: RoomKind,
}

pub struct ChannelCoordinator {
    store: Arc<dyn DataStore>,
    message_store: Arc<dyn MessageStore>,
    mirror: Arc<RwLock<RoomMirror>>,
}

impl ChannelCoordinator {
    pub fn new(
        store: Arc<dyn DataStore>,
        message_store: Arc<dyn MessageStore>,
        mirror: Arc<RwLock<RoomMirror>>,
    ) -> Self {
        Self {
            store,
            message_store,
            mirror,
        }
    }

    /// Create a room in a group (owner-only). The room type must be a
    /// known kind and the name must not collide with a sibling room.
    pub async fn create_room(
        &self,
        group_id: &GroupId,
        name: &str,
        kind: &str,
        requester: &UserId,
    ) -> Result<CreatedRoom, EngineError> {
        let name = validate_name(name)?;
        let kind = RoomKind::parse(kind)
            .ok_or_else(|| EngineError::validation(format!("unknown room type {:?}", kind)))?;

        {
            let mirror = self.mirror.read().await;
            let group = require_group(&mirror, group_id)?;
            require_owner_of(group_id, group.is_owner(requester))?;
            require_unique_name(&mirror, group_id, &name, None)?;
        }

        let entry = RoomEntry::new(group_id.clone(), name, kind);
        let record = RoomRecord {
            id: entry.id.clone(),
            group_id: entry.group_id.clone(),
            name: entry.name.clone(),
            kind: entry.kind,
            created_at: entry.created_at,
        };

        self.store.create_room(&record).await?;

        let created = CreatedRoom {
            room_id: entry.id.clone(),
            name: entry.name.clone(),
            kind: entry.kind,
        };
        self.mirror.write().await.insert_room(entry);
        info!(group = %group_id, room = %created.room_id, kind = %created.kind, "room created");
        Ok(created)
    }

    /// Rename a room (owner-only). The duplicate-name check excludes the
    /// room being renamed, and is scoped to the parent group only.
    pub async fn rename_room(
        &self,
        group_id: &GroupId,
        room_id: &RoomId,
        new_name: &str,
        requester: &UserId,
    ) -> Result<(), EngineError> {
        let new_name = validate_name(new_name)?;

        {
            let mirror = self.mirror.read().await;
            let group = require_group(&mirror, group_id)?;
            require_owner_of(group_id, group.is_owner(requester))?;
            require_room_in_group(&mirror, group_id, room_id)?;
            require_unique_name(&mirror, group_id, &new_name, Some(room_id))?;
        }

        self.store.rename_room(room_id, &new_name).await?;

        self.mirror.write().await.rename_room(room_id, &new_name);
        Ok(())
    }

    /// Delete a room (owner-only): purge its messages via the message-store
    /// collaborator, then remove it from store and mirror.
    pub async fn delete_room(
        &self,
        group_id: &GroupId,
        room_id: &RoomId,
        requester: &UserId,
    ) -> Result<(), EngineError> {
        {
            let mirror = self.mirror.read().await;
            let group = require_group(&mirror, group_id)?;
            require_owner_of(group_id, group.is_owner(requester))?;
            require_room_in_group(&mirror, group_id, room_id)?;
        }

        self.message_store.delete_all_for_room(room_id).await?;
        self.store.delete_room(room_id).await?;

        self.mirror.write().await.remove_room(room_id);
        info!(group = %group_id, room = %room_id, "room deleted");
        Ok(())
    }

    /// Join a room. Group membership is a precondition, checked against the
    /// mirror (not the durable store) for latency. Idempotent per
    /// connection; returns true if the occupant list changed.
    pub async fn join_room(
        &self,
        group_id: &GroupId,
        room_id: &RoomId,
        connection_id: ConnectionId,
        identity: Identity,
    ) -> Result<bool, EngineError> {
        let mut mirror = self.mirror.write().await;

        let group = require_group(&mirror, group_id)?;
        if !group.is_member(&identity.user_id) {
            return Err(EngineError::forbidden(format!(
                "{} is not a member of group {}",
                identity.user_id, group_id
            )));
        }
        require_room_in_group(&mirror, group_id, room_id)?;

        Ok(mirror.join_room(room_id, connection_id, identity))
    }

    /// Leave a room. An absent connection is a no-op, not an error;
    /// returns true if the occupant list changed.
    pub async fn leave_room(
        &self,
        group_id: &GroupId,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Result<bool, EngineError> {
        let mut mirror = self.mirror.write().await;
        require_group(&mirror, group_id)?;
        require_room_in_group(&mirror, group_id, room_id)?;
        Ok(mirror.leave_room(room_id, connection_id))
    }

    /// Drop a connection from every room it occupies. Disconnect support;
    /// returns the affected room ids with their parent groups.
    pub async fn leave_all_for_connection(
        &self,
        connection_id: &ConnectionId,
    ) -> Vec<(GroupId, RoomId)> {
        let mut mirror = self.mirror.write().await;
        let occupied = mirror.rooms_occupied_by(connection_id);

        occupied
            .into_iter()
            .filter_map(|room_id| {
                let group_id = mirror.room(&room_id)?.group_id.clone();
                mirror.leave_room(&room_id, connection_id);
                Some((group_id, room_id))
            })
            .collect()
    }
}

fn validate_name(name: &str) -> Result<String, EngineError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(EngineError::validation("name must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn require_group<'a>(
    mirror: &'a RoomMirror,
    group_id: &GroupId,
) -> Result<&'a crate::core_model::GroupEntry, EngineError> {
    mirror
        .group(group_id)
        .ok_or_else(|| EngineError::not_found(format!("group {}", group_id)))
}

fn require_owner_of(group_id: &GroupId, is_owner: bool) -> Result<(), EngineError> {
    if !is_owner {
        return Err(EngineError::forbidden(format!(
            "only the owner of group {} may do this",
            group_id
        )));
    }
    Ok(())
}

fn require_room_in_group(
    mirror: &RoomMirror,
    group_id: &GroupId,
    room_id: &RoomId,
) -> Result<(), EngineError> {
    match mirror.room(room_id) {
        Some(room) if &room.group_id == group_id => Ok(()),
        _ => Err(EngineError::not_found(format!(
            "room {} in group {}",
            room_id, group_id
        ))),
    }
}

/// Exact-match duplicate check scoped to one group, optionally excluding
/// the room being renamed.
fn require_unique_name(
    mirror: &RoomMirror,
    group_id: &GroupId,
    name: &str,
    exclude: Option<&RoomId>,
) -> Result<(), EngineError> {
    let duplicate = mirror
        .rooms_of(group_id)
        .iter()
        .any(|room| room.name == name && Some(&room.id) != exclude);
    if duplicate {
        return Err(EngineError::validation(format!(
            "a room named {:?} already exists in this group",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_group::GroupCoordinator;
    use crate::core_store::MemoryStore;

    fn user(name: &str) -> UserId {
        UserId::new(name.to_string())
    }

    fn identity(name: &str) -> Identity {
        Identity::new(user(name), name)
    }

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::new(id.to_string())
    }

    struct Fixture {
        groups: GroupCoordinator,
        channels: ChannelCoordinator,
        store: Arc<MemoryStore>,
        mirror: Arc<RwLock<RoomMirror>>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let mirror = Arc::new(RwLock::new(RoomMirror::new()));
        Fixture {
            groups: GroupCoordinator::new(store.clone(), store.clone(), mirror.clone()),
            channels: ChannelCoordinator::new(store.clone(), store.clone(), mirror.clone()),
            store,
            mirror,
        }
    }

    async fn team(fx: &Fixture) -> GroupId {
        fx.groups
            .create_group("Team", user("alice"))
            .await
            .unwrap()
            .group_id
    }

    #[tokio::test]
    async fn test_create_room_validates_kind() {
        let fx = fixture();
        let group_id = team(&fx).await;

        let result = fx
            .channels
            .create_room(&group_id, "general", "video", &user("alice"))
            .await;
        assert!(matches!(result, Err(EngineError::Validation(_))));

        let created = fx
            .channels
            .create_room(&group_id, "general", "text", &user("alice"))
            .await
            .unwrap();
        assert_eq!(created.kind, RoomKind::Text);
    }

    #[tokio::test]
    async fn test_create_room_is_owner_only() {
        let fx = fixture();
        let group_id = team(&fx).await;
        fx.groups.add_member(&group_id, user("bob")).await.unwrap();

        let result = fx
            .channels
            .create_room(&group_id, "general", "text", &user("bob"))
            .await;
        assert!(matches!(result, Err(EngineError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_duplicate_name_scoped_to_group() {
        let fx = fixture();
        let group_a = team(&fx).await;
        let group_b = fx
            .groups
            .create_group("Other", user("alice"))
            .await
            .unwrap()
            .group_id;

        fx.channels
            .create_room(&group_a, "general", "text", &user("alice"))
            .await
            .unwrap();

        // Same name in the same group fails
        let result = fx
            .channels
            .create_room(&group_a, "general", "voice", &user("alice"))
            .await;
        assert!(matches!(result, Err(EngineError::Validation(_))));

        // Same name in a different group succeeds
        fx.channels
            .create_room(&group_b, "general", "text", &user("alice"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rename_excludes_self_from_duplicate_check() {
        let fx = fixture();
        let group_id = team(&fx).await;
        let general = fx
            .channels
            .create_room(&group_id, "general", "text", &user("alice"))
            .await
            .unwrap();
        fx.channels
            .create_room(&group_id, "random", "text", &user("alice"))
            .await
            .unwrap();

        // Renaming to its own name is allowed
        fx.channels
            .rename_room(&group_id, &general.room_id, "general", &user("alice"))
            .await
            .unwrap();

        // Renaming onto a sibling's name fails
        let result = fx
            .channels
            .rename_room(&group_id, &general.room_id, "random", &user("alice"))
            .await;
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_rename_to_name_used_in_another_group() {
        let fx = fixture();
        let group_a = team(&fx).await;
        let group_b = fx
            .groups
            .create_group("Other", user("alice"))
            .await
            .unwrap()
            .group_id;

        fx.channels
            .create_room(&group_a, "general", "text", &user("alice"))
            .await
            .unwrap();
        let lobby = fx
            .channels
            .create_room(&group_b, "lobby", "text", &user("alice"))
            .await
            .unwrap();

        // The duplicate check only looks at siblings in the same group
        fx.channels
            .rename_room(&group_b, &lobby.room_id, "general", &user("alice"))
            .await
            .unwrap();

        let mirror = fx.mirror.read().await;
        assert_eq!(mirror.room(&lobby.room_id).unwrap().name, "general");
    }

    #[tokio::test]
    async fn test_join_requires_group_membership() {
        let fx = fixture();
        let group_id = team(&fx).await;
        let room = fx
            .channels
            .create_room(&group_id, "general", "text", &user("alice"))
            .await
            .unwrap();

        let result = fx
            .channels
            .join_room(&group_id, &room.room_id, conn("c1"), identity("bob"))
            .await;
        assert!(matches!(result, Err(EngineError::Forbidden(_))));

        fx.groups.add_member(&group_id, user("bob")).await.unwrap();
        let changed = fx
            .channels
            .join_room(&group_id, &room.room_id, conn("c1"), identity("bob"))
            .await
            .unwrap();
        assert!(changed);
    }

    #[tokio::test]
    async fn test_join_leave_idempotence() {
        let fx = fixture();
        let group_id = team(&fx).await;
        let room = fx
            .channels
            .create_room(&group_id, "general", "text", &user("alice"))
            .await
            .unwrap();

        assert!(fx
            .channels
            .join_room(&group_id, &room.room_id, conn("c1"), identity("alice"))
            .await
            .unwrap());
        assert!(!fx
            .channels
            .join_room(&group_id, &room.room_id, conn("c1"), identity("alice"))
            .await
            .unwrap());

        assert!(fx
            .channels
            .leave_room(&group_id, &room.room_id, &conn("c1"))
            .await
            .unwrap());
        assert!(!fx
            .channels
            .leave_room(&group_id, &room.room_id, &conn("c1"))
            .await
            .unwrap());

        let mirror = fx.mirror.read().await;
        assert!(!mirror.room(&room.room_id).unwrap().occupied());
    }

    #[tokio::test]
    async fn test_delete_room_purges_messages_first() {
        let fx = fixture();
        let group_id = team(&fx).await;
        let room = fx
            .channels
            .create_room(&group_id, "general", "text", &user("alice"))
            .await
            .unwrap();

        fx.channels
            .delete_room(&group_id, &room.room_id, &user("alice"))
            .await
            .unwrap();

        assert_eq!(fx.store.purged_rooms().await, vec![room.room_id.clone()]);
        assert!(fx.store.find_room(&room.room_id).await.unwrap().is_none());
        assert!(fx.mirror.read().await.room(&room.room_id).is_none());
    }

    #[tokio::test]
    async fn test_leave_all_for_connection() {
        let fx = fixture();
        let group_id = team(&fx).await;
        let general = fx
            .channels
            .create_room(&group_id, "general", "text", &user("alice"))
            .await
            .unwrap();
        let lounge = fx
            .channels
            .create_room(&group_id, "lounge", "voice", &user("alice"))
            .await
            .unwrap();

        fx.channels
            .join_room(&group_id, &general.room_id, conn("c1"), identity("alice"))
            .await
            .unwrap();
        fx.channels
            .join_room(&group_id, &lounge.room_id, conn("c1"), identity("alice"))
            .await
            .unwrap();

        let affected = fx.channels.leave_all_for_connection(&conn("c1")).await;
        assert_eq!(affected.len(), 2);

        let mirror = fx.mirror.read().await;
        assert!(!mirror.room(&general.room_id).unwrap().occupied());
        assert!(!mirror.room(&lounge.room_id).unwrap().occupied());
    }
}
