//! Group Coordinator
//!
//! Creates/renames/deletes groups and manages group membership. Every
//! mutation writes through to the persistent store first and updates the
//! mirror only after the durable write succeeds; on store failure the
//! mirror is left untouched and the error propagates unmodified.

use crate::core_mirror::RoomMirror;
use crate::core_model::{GroupEntry, GroupId, RoomId, UserId};
use crate::core_store::{DataStore, GroupRecord, MessageStore};
use crate::error::EngineError;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Result of a successful group creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedGroup {
    pub group_id: GroupId,
    pub name: String,
}

pub struct GroupCoordinator {
    store: Arc<dyn DataStore>,
    message_store: Arc<dyn MessageStore>,
    mirror: Arc<RwLock<RoomMirror>>,
}

impl GroupCoordinator {
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

    /// Create a group with the owner as sole member
    pub async fn create_group(
        &self,
        name: &str,
        owner: UserId,
    ) -> Result<CreatedGroup, EngineError> {
        let name = validate_name(name)?;

        let entry = GroupEntry::new(name.clone(), owner);
        let record = GroupRecord {
            id: entry.id.clone(),
            name: entry.name.clone(),
            owner_id: entry.owner.clone(),
            member_ids: entry.members.iter().cloned().collect(),
            created_at: entry.created_at,
        };

        self.store.create_group(&record).await?;

        let created = CreatedGroup {
            group_id: entry.id.clone(),
            name: entry.name.clone(),
        };
        self.mirror.write().await.insert_group(entry);
        info!(group = %created.group_id, "group created");
        Ok(created)
    }

    /// Add a member to a group. Idempotent: returns false if the identity
    /// was already a member.
    pub async fn add_member(
        &self,
        group_id: &GroupId,
        user_id: UserId,
    ) -> Result<bool, EngineError> {
        // Read-modify-write: the full member list is rebuilt from the mirror
        // and written whole, so the store keeps the last writer's list.
        // Membership mutations for one group must not run concurrently.
        let members = {
            let mirror = self.mirror.read().await;
            let group = require_group(&mirror, group_id)?;
            if group.is_member(&user_id) {
                return Ok(false);
            }
            let mut members: Vec<UserId> = group.members.iter().cloned().collect();
            members.push(user_id.clone());
            members
        };

        self.store.update_group_members(group_id, &members).await?;

        self.mirror.write().await.add_member(group_id, user_id);
        Ok(true)
    }

    /// Rename a group (owner-only)
    pub async fn rename_group(
        &self,
        group_id: &GroupId,
        new_name: &str,
        requester: &UserId,
    ) -> Result<(), EngineError> {
        let new_name = validate_name(new_name)?;

        {
            let mirror = self.mirror.read().await;
            let group = require_group(&mirror, group_id)?;
            require_owner(group, requester)?;
        }

        self.store.rename_group(group_id, &new_name).await?;

        self.mirror.write().await.rename_group(group_id, &new_name);
        Ok(())
    }

    /// Delete a group (owner-only), cascading deletion of every room —
    /// message purge and durable room delete per room, then the group
    /// record — before the mirror drops the whole subtree at once.
    /// Returns the ids of the rooms that were removed.
    pub async fn delete_group(
        &self,
        group_id: &GroupId,
        requester: &UserId,
    ) -> Result<Vec<RoomId>, EngineError> {
        let room_ids = {
            let mirror = self.mirror.read().await;
            let group = require_group(&mirror, group_id)?;
            require_owner(group, requester)?;
            group.rooms.clone()
        };

        for room_id in &room_ids {
            self.message_store.delete_all_for_room(room_id).await?;
            self.store.delete_room(room_id).await?;
        }
        self.store.delete_group(group_id).await?;

        let removed = self.mirror.write().await.remove_group(group_id);
        info!(group = %group_id, rooms = removed.len(), "group deleted");
        Ok(removed)
    }

    /// Remove a member (owner-only). The owner cannot be removed via this
    /// path — the group must be deleted instead. Returns the rooms whose
    /// occupancy changed by evicting the member's connections.
    pub async fn remove_member(
        &self,
        group_id: &GroupId,
        target: &UserId,
        requester: &UserId,
    ) -> Result<Vec<RoomId>, EngineError> {
        {
            let mirror = self.mirror.read().await;
            let group = require_group(&mirror, group_id)?;
            require_owner(group, requester)?;
        }
        self.remove_membership(group_id, target).await
    }

    /// Leave a group voluntarily. The owner cannot leave — the group must
    /// be deleted instead.
    pub async fn leave_group(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<Vec<RoomId>, EngineError> {
        self.remove_membership(group_id, user_id).await
    }

    async fn remove_membership(
        &self,
        group_id: &GroupId,
        target: &UserId,
    ) -> Result<Vec<RoomId>, EngineError> {
        let members = {
            let mirror = self.mirror.read().await;
            let group = require_group(&mirror, group_id)?;
            if group.is_owner(target) {
                return Err(EngineError::validation(
                    "the owner cannot be removed; delete the group instead",
                ));
            }
            if !group.is_member(target) {
                return Ok(Vec::new());
            }
            group
                .members
                .iter()
                .filter(|m| *m != target)
                .cloned()
                .collect::<Vec<_>>()
        };

        self.store.update_group_members(group_id, &members).await?;

        Ok(self.mirror.write().await.remove_member(group_id, target))
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
) -> Result<&'a GroupEntry, EngineError> {
    mirror
        .group(group_id)
        .ok_or_else(|| EngineError::not_found(format!("group {}", group_id)))
}

fn require_owner(group: &GroupEntry, requester: &UserId) -> Result<(), EngineError> {
    if !group.is_owner(requester) {
        return Err(EngineError::forbidden(format!(
            "only the owner of group {} may do this",
            group.id
        )));
    }
    Ok(())
}
