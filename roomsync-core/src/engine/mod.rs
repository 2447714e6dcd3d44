//! Engine composition root
//!
//! `SyncEngine` wires the registry, mirror, store, coordinators and router
//! together and owns the shared state explicitly. Callers construct one
//! engine per process (usually from [`Config`]) and drive it with the
//! inbound event set: `bootstrap`, `connect`/`disconnect`, and the group
//! and room operations. Every mutating entry point follows the state
//! change with the matching broadcast, so transport subscribers stay
//! consistent without the caller doing any fan-out of its own.

use crate::config::{Config, StoreBackend};
use crate::core_broadcast::BroadcastRouter;
use crate::core_channel::{ChannelCoordinator, CreatedRoom};
use crate::core_group::{CreatedGroup, GroupCoordinator};
use crate::core_mirror::RoomMirror;
use crate::core_model::{ConnectionId, GroupId, Identity, RoomId, UserId};
use crate::core_presence::PresenceRegistry;
use crate::core_store::{DataStore, MemoryStore, MessageStore, SqliteStore};
use crate::error::EngineError;
use crate::transport::Transport;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub struct SyncEngine {
    mirror: Arc<RwLock<RoomMirror>>,
    presence: Arc<RwLock<PresenceRegistry>>,
    store: Arc<dyn DataStore>,
    groups: GroupCoordinator,
    channels: Arc<ChannelCoordinator>,
    router: BroadcastRouter,
}

impl SyncEngine {
    /// Wire an engine from its collaborators. The store backend and the
    /// transport are the only injection points; everything else is owned.
    pub fn new(
        store: Arc<dyn DataStore>,
        message_store: Arc<dyn MessageStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let mirror = Arc::new(RwLock::new(RoomMirror::new()));
        let presence = Arc::new(RwLock::new(PresenceRegistry::new()));

        let groups = GroupCoordinator::new(store.clone(), message_store.clone(), mirror.clone());
        let channels = Arc::new(ChannelCoordinator::new(
            store.clone(),
            message_store,
            mirror.clone(),
        ));
        let router = BroadcastRouter::new(
            transport,
            mirror.clone(),
            presence.clone(),
            channels.clone(),
        );

        Self {
            mirror,
            presence,
            store,
            groups,
            channels,
            router,
        }
    }

    /// Build an engine with the durable backend the configuration names.
    /// The choice happens here exactly once; no call site ever re-decides
    /// between the real store and the fixture store.
    pub fn from_config(config: &Config, transport: Arc<dyn Transport>) -> Result<Self, EngineError> {
        match &config.store.backend {
            StoreBackend::Sqlite { path } => {
                let store = Arc::new(SqliteStore::open(path)?);
                Ok(Self::new(store.clone(), store, transport))
            }
            StoreBackend::Memory => {
                let store = Arc::new(MemoryStore::new());
                Ok(Self::new(store.clone(), store, transport))
            }
        }
    }

    /// Load every group and room record and rebuild the mirror. A store
    /// failure leaves the engine running against an empty mirror (degraded
    /// mode) rather than aborting startup; queries then answer from the
    /// empty state and mutations surface store errors as usual.
    pub async fn bootstrap(&self) {
        match self.store.load_all().await {
            Ok((groups, rooms)) => {
                let mirror = RoomMirror::from_records(groups, rooms);
                info!(
                    groups = mirror.group_count(),
                    rooms = mirror.room_count(),
                    "mirror bootstrapped"
                );
                *self.mirror.write().await = mirror;
            }
            Err(e) => {
                warn!(error = %e, "bootstrap load failed; starting with an empty mirror");
                *self.mirror.write().await = RoomMirror::new();
            }
        }
    }

    // ---- session lifecycle ----

    /// A connection came up for an authenticated identity. Registers
    /// presence, subscribes the connection to its groups' channels and, on
    /// an offline→online transition, re-broadcasts member status for those
    /// groups. Returns the groups the connection was subscribed to.
    pub async fn connect(&self, connection_id: ConnectionId, identity: Identity) -> Vec<GroupId> {
        self.router.handle_connect(connection_id, identity).await
    }

    /// A connection dropped. Runs the full disconnect cascade: occupancy
    /// eviction, room re-broadcasts, and the presence transition.
    pub async fn disconnect(&self, connection_id: &ConnectionId) {
        self.router.handle_disconnect(connection_id).await;
    }

    // ---- group operations ----

    /// Create a group owned by `owner`. The owner's live connections are
    /// subscribed to the new group's channel immediately.
    pub async fn create_group(
        &self,
        name: &str,
        owner: UserId,
    ) -> Result<CreatedGroup, EngineError> {
        let created = self.groups.create_group(name, owner.clone()).await?;

        for connection_id in self.connections_of(&owner).await {
            self.router
                .subscribe_to_group(&connection_id, &created.group_id)
                .await;
        }
        self.router.broadcast_group_members(&created.group_id).await?;
        Ok(created)
    }

    /// Rename a group (owner-only) and push the new name to subscribers
    pub async fn rename_group(
        &self,
        group_id: &GroupId,
        new_name: &str,
        requester: &UserId,
    ) -> Result<(), EngineError> {
        self.groups.rename_group(group_id, new_name, requester).await?;
        self.router.broadcast_group_info(group_id).await
    }

    /// Delete a group (owner-only) with its full room cascade, then tell
    /// the group's subscribers it is gone
    pub async fn delete_group(
        &self,
        group_id: &GroupId,
        requester: &UserId,
    ) -> Result<Vec<RoomId>, EngineError> {
        let removed = self.groups.delete_group(group_id, requester).await?;
        self.router.broadcast_group_deleted(group_id).await;
        Ok(removed)
    }

    /// Add a member to a group. On an actual change the member's live
    /// connections are subscribed to the group channel and sent the room
    /// list, and member status is re-broadcast. Idempotent.
    pub async fn add_member(
        &self,
        group_id: &GroupId,
        user_id: UserId,
    ) -> Result<bool, EngineError> {
        let added = self.groups.add_member(group_id, user_id.clone()).await?;
        if !added {
            return Ok(false);
        }

        for connection_id in self.connections_of(&user_id).await {
            self.router.subscribe_to_group(&connection_id, group_id).await;
            self.router.send_room_list(&connection_id, group_id).await?;
        }
        self.router.broadcast_group_members(group_id).await?;
        Ok(true)
    }

    /// Remove a member (owner-only); the owner itself cannot be removed
    pub async fn remove_member(
        &self,
        group_id: &GroupId,
        target: &UserId,
        requester: &UserId,
    ) -> Result<(), EngineError> {
        let affected = self.groups.remove_member(group_id, target, requester).await?;
        self.after_membership_removed(group_id, target, affected)
            .await
    }

    /// Leave a group voluntarily; the owner cannot leave
    pub async fn leave_group(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), EngineError> {
        let affected = self.groups.leave_group(group_id, user_id).await?;
        self.after_membership_removed(group_id, user_id, affected)
            .await
    }

    // ---- room operations ----

    /// Create a room in a group (owner-only) and push the updated room
    /// list to the group's subscribers
    pub async fn create_room(
        &self,
        group_id: &GroupId,
        name: &str,
        kind: &str,
        requester: &UserId,
    ) -> Result<CreatedRoom, EngineError> {
        let created = self
            .channels
            .create_room(group_id, name, kind, requester)
            .await?;
        self.router.broadcast_room_list(group_id).await?;
        Ok(created)
    }

    /// Rename a room (owner-only) and push the updated room list
    pub async fn rename_room(
        &self,
        group_id: &GroupId,
        room_id: &RoomId,
        new_name: &str,
        requester: &UserId,
    ) -> Result<(), EngineError> {
        self.channels
            .rename_room(group_id, room_id, new_name, requester)
            .await?;
        self.router.broadcast_room_list(group_id).await
    }

    /// Delete a room (owner-only). Occupant connections are unsubscribed
    /// from the room's channel and the group gets the updated room list.
    pub async fn delete_room(
        &self,
        group_id: &GroupId,
        room_id: &RoomId,
        requester: &UserId,
    ) -> Result<(), EngineError> {
        let occupants: Vec<ConnectionId> = {
            let mirror = self.mirror.read().await;
            mirror
                .room(room_id)
                .map(|room| {
                    room.occupants
                        .iter()
                        .map(|o| o.connection_id.clone())
                        .collect()
                })
                .unwrap_or_default()
        };

        self.channels
            .delete_room(group_id, room_id, requester)
            .await?;

        for connection_id in &occupants {
            self.router
                .unsubscribe_from_room(connection_id, group_id, room_id)
                .await;
        }
        self.router.broadcast_room_list(group_id).await
    }

    /// Join a room. Group membership is required; the occupant add is
    /// idempotent and purely process-local. On an actual change the
    /// connection is subscribed to the room channel and the room's member
    /// list is re-broadcast.
    pub async fn join_room(
        &self,
        group_id: &GroupId,
        room_id: &RoomId,
        connection_id: ConnectionId,
        identity: Identity,
    ) -> Result<bool, EngineError> {
        let joined = self
            .channels
            .join_room(group_id, room_id, connection_id.clone(), identity)
            .await?;
        if joined {
            self.router
                .subscribe_to_room(&connection_id, group_id, room_id)
                .await;
            self.router.broadcast_room_members(group_id, room_id).await?;
        }
        Ok(joined)
    }

    /// Leave a room. A connection that was not inside is a no-op.
    pub async fn leave_room(
        &self,
        group_id: &GroupId,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Result<bool, EngineError> {
        let left = self
            .channels
            .leave_room(group_id, room_id, connection_id)
            .await?;
        if left {
            self.router
                .unsubscribe_from_room(connection_id, group_id, room_id)
                .await;
            self.router.broadcast_room_members(group_id, room_id).await?;
        }
        Ok(left)
    }

    /// Push a group's room list to a single connection
    pub async fn send_room_list(
        &self,
        connection_id: &ConnectionId,
        group_id: &GroupId,
    ) -> Result<(), EngineError> {
        self.router.send_room_list(connection_id, group_id).await
    }

    // ---- queries ----

    pub async fn is_online(&self, user_id: &UserId) -> bool {
        self.presence.read().await.is_online(user_id)
    }

    /// Shared mirror handle, for read-side consumers (snapshots, queries)
    pub fn mirror(&self) -> Arc<RwLock<RoomMirror>> {
        self.mirror.clone()
    }

    /// Shared presence handle
    pub fn presence(&self) -> Arc<RwLock<PresenceRegistry>> {
        self.presence.clone()
    }

    // ---- internals ----

    async fn connections_of(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.presence.read().await.connections_of(user_id)
    }

    /// Post-removal fan-out shared by `remove_member` and `leave_group`:
    /// unsubscribe the identity's connections, re-broadcast every room its
    /// eviction changed, then re-broadcast group member status.
    async fn after_membership_removed(
        &self,
        group_id: &GroupId,
        target: &UserId,
        affected: Vec<RoomId>,
    ) -> Result<(), EngineError> {
        let connections = self.connections_of(target).await;
        for connection_id in &connections {
            self.router
                .unsubscribe_from_group(connection_id, group_id)
                .await;
        }

        for room_id in &affected {
            for connection_id in &connections {
                self.router
                    .unsubscribe_from_room(connection_id, group_id, room_id)
                    .await;
            }
            self.router.broadcast_room_members(group_id, room_id).await?;
        }

        self.router.broadcast_group_members(group_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{identity, RecordingTransport};

    fn engine() -> (SyncEngine, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let engine = SyncEngine::from_config(&Config::default(), transport.clone()).unwrap();
        (engine, transport)
    }

    #[tokio::test]
    async fn test_bootstrap_on_empty_store_yields_empty_mirror() {
        let (engine, _) = engine();
        engine.bootstrap().await;

        let mirror = engine.mirror();
        let mirror = mirror.read().await;
        assert_eq!(mirror.group_count(), 0);
        assert_eq!(mirror.room_count(), 0);
    }

    #[tokio::test]
    async fn test_create_group_then_mutate_without_rebootstrap() {
        let (engine, _) = engine();
        engine.bootstrap().await;

        let alice = identity("alice");
        let created = engine
            .create_group("Team", alice.user_id.clone())
            .await
            .unwrap();

        let mirror = engine.mirror();
        let mirror = mirror.read().await;
        assert!(mirror.group(&created.group_id).is_some());
    }
}
