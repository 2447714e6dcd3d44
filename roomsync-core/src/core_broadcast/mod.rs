//! Broadcast Router
//!
//! Computes the target connection set for a logical group/room and pushes
//! payloads through the transport collaborator; also drives the disconnect
//! cascade. Transport failures are logged and swallowed: a failed push
//! never rolls back an already-successful state mutation.

use crate::core_channel::ChannelCoordinator;
use crate::core_mirror::RoomMirror;
use crate::core_model::{ConnectionId, GroupId, Identity, RoomId, UserId};
use crate::core_presence::{PresenceRegistry, UnregisterOutcome};
use crate::error::EngineError;
use crate::transport::{
    group_channel, room_channel, GroupMemberStatus, OccupantInfo, RoomSummary, ServerEvent,
    Transport, TransportError,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

pub struct BroadcastRouter {
    transport: Arc<dyn Transport>,
    mirror: Arc<RwLock<RoomMirror>>,
    presence: Arc<RwLock<PresenceRegistry>>,
    channels: Arc<ChannelCoordinator>,
}

impl BroadcastRouter {
    pub fn new(
        transport: Arc<dyn Transport>,
        mirror: Arc<RwLock<RoomMirror>>,
        presence: Arc<RwLock<PresenceRegistry>>,
        channels: Arc<ChannelCoordinator>,
    ) -> Self {
        Self {
            transport,
            mirror,
            presence,
            channels,
        }
    }

    /// Subscribe a connection to a group's logical channel
    pub async fn subscribe_to_group(&self, connection_id: &ConnectionId, group_id: &GroupId) {
        let channel = group_channel(group_id);
        swallow(
            self.transport.subscribe(connection_id, &channel).await,
            &channel,
        );
    }

    /// Subscribe a connection to a room's logical channel
    pub async fn subscribe_to_room(
        &self,
        connection_id: &ConnectionId,
        group_id: &GroupId,
        room_id: &RoomId,
    ) {
        let channel = room_channel(group_id, room_id);
        swallow(
            self.transport.subscribe(connection_id, &channel).await,
            &channel,
        );
    }

    /// Unsubscribe a connection from a room's logical channel
    pub async fn unsubscribe_from_room(
        &self,
        connection_id: &ConnectionId,
        group_id: &GroupId,
        room_id: &RoomId,
    ) {
        let channel = room_channel(group_id, room_id);
        swallow(
            self.transport.unsubscribe(connection_id, &channel).await,
            &channel,
        );
    }

    /// Push a group's room list to one connection only
    pub async fn send_room_list(
        &self,
        connection_id: &ConnectionId,
        group_id: &GroupId,
    ) -> Result<(), EngineError> {
        let event = self.room_list_event(group_id).await?;
        swallow(
            self.transport.emit_to(connection_id, &event).await,
            &format!("connection {}", connection_id),
        );
        Ok(())
    }

    /// Push a group's room list to every connection subscribed to the group
    pub async fn broadcast_room_list(&self, group_id: &GroupId) -> Result<(), EngineError> {
        let event = self.room_list_event(group_id).await?;
        let channel = group_channel(group_id);
        swallow(self.transport.emit(&channel, &event).await, &channel);
        Ok(())
    }

    /// Push a room's live member list to the room's subscribers
    pub async fn broadcast_room_members(
        &self,
        group_id: &GroupId,
        room_id: &RoomId,
    ) -> Result<(), EngineError> {
        let members = {
            let mirror = self.mirror.read().await;
            let room = mirror
                .room(room_id)
                .filter(|room| &room.group_id == group_id)
                .ok_or_else(|| {
                    EngineError::not_found(format!("room {} in group {}", room_id, group_id))
                })?;
            room.occupants
                .iter()
                .map(|o| OccupantInfo {
                    user_id: o.identity.user_id.clone(),
                    display_name: o.identity.display_name.clone(),
                })
                .collect()
        };

        let event = ServerEvent::RoomMembers {
            group_id: group_id.clone(),
            room_id: room_id.clone(),
            members,
        };
        let channel = room_channel(group_id, room_id);
        swallow(self.transport.emit(&channel, &event).await, &channel);
        Ok(())
    }

    /// Push the group's member identities partitioned into online/offline
    pub async fn broadcast_group_members(&self, group_id: &GroupId) -> Result<(), EngineError> {
        let member_ids: Vec<UserId> = {
            let mirror = self.mirror.read().await;
            let group = mirror
                .group(group_id)
                .ok_or_else(|| EngineError::not_found(format!("group {}", group_id)))?;
            let mut members: Vec<_> = group.members.iter().cloned().collect();
            members.sort();
            members
        };

        let members = {
            let presence = self.presence.read().await;
            member_ids
                .into_iter()
                .map(|user_id| {
                    let online = presence.is_online(&user_id);
                    GroupMemberStatus { user_id, online }
                })
                .collect()
        };

        let event = ServerEvent::GroupMembers {
            group_id: group_id.clone(),
            members,
        };
        let channel = group_channel(group_id);
        swallow(self.transport.emit(&channel, &event).await, &channel);
        Ok(())
    }

    /// Push the group's current name to its subscribers after a rename
    pub async fn broadcast_group_info(&self, group_id: &GroupId) -> Result<(), EngineError> {
        let name = {
            let mirror = self.mirror.read().await;
            mirror
                .group(group_id)
                .map(|group| group.name.clone())
                .ok_or_else(|| EngineError::not_found(format!("group {}", group_id)))?
        };

        let event = ServerEvent::GroupInfo {
            group_id: group_id.clone(),
            name,
        };
        let channel = group_channel(group_id);
        swallow(self.transport.emit(&channel, &event).await, &channel);
        Ok(())
    }

    /// Tell the group's subscribers the group is gone. Emitted after the
    /// state mutation, so it deliberately skips the mirror lookup.
    pub async fn broadcast_group_deleted(&self, group_id: &GroupId) {
        let event = ServerEvent::GroupDeleted {
            group_id: group_id.clone(),
        };
        let channel = group_channel(group_id);
        swallow(self.transport.emit(&channel, &event).await, &channel);
    }

    /// Unsubscribe a connection from a group's logical channel
    pub async fn unsubscribe_from_group(&self, connection_id: &ConnectionId, group_id: &GroupId) {
        let channel = group_channel(group_id);
        swallow(
            self.transport.unsubscribe(connection_id, &channel).await,
            &channel,
        );
    }

    /// Disconnect cascade: unregister the connection, pull it out of every
    /// room it occupied, re-broadcast each affected room's member list, and
    /// if this was the identity's last connection re-broadcast group member
    /// status for every group it belongs to. Guarantees no stale occupant
    /// survives a dropped connection.
    pub async fn handle_disconnect(&self, connection_id: &ConnectionId) {
        let outcome = self.presence.write().await.unregister(connection_id);

        let affected = self.channels.leave_all_for_connection(connection_id).await;
        for (group_id, room_id) in &affected {
            self.unsubscribe_from_room(connection_id, group_id, room_id)
                .await;
            if let Err(e) = self.broadcast_room_members(group_id, room_id).await {
                warn!(room = %room_id, error = %e, "post-disconnect room broadcast failed");
            }
        }

        let identity = match outcome {
            UnregisterOutcome::WentOffline(identity) => identity,
            UnregisterOutcome::StillOnline(_) | UnregisterOutcome::NotRegistered => return,
        };

        let group_ids: Vec<GroupId> = {
            let mirror = self.mirror.read().await;
            mirror
                .groups_of(&identity.user_id)
                .into_iter()
                .map(|group| group.id.clone())
                .collect()
        };

        for group_id in group_ids {
            if let Err(e) = self.broadcast_group_members(&group_id).await {
                warn!(group = %group_id, error = %e, "post-disconnect presence broadcast failed");
            }
        }
    }

    /// Presence bookkeeping for a fresh connection: registers it and, on
    /// an offline→online transition, re-broadcasts group member status for
    /// the identity's groups. Returns the groups the caller should
    /// subscribe the connection to.
    pub async fn handle_connect(
        &self,
        connection_id: ConnectionId,
        identity: Identity,
    ) -> Vec<GroupId> {
        let outcome = self
            .presence
            .write()
            .await
            .register(connection_id.clone(), identity.clone());

        let group_ids: Vec<GroupId> = {
            let mirror = self.mirror.read().await;
            mirror
                .groups_of(&identity.user_id)
                .into_iter()
                .map(|group| group.id.clone())
                .collect()
        };

        for group_id in &group_ids {
            self.subscribe_to_group(&connection_id, group_id).await;
        }

        if outcome == crate::core_presence::RegisterOutcome::WentOnline {
            for group_id in &group_ids {
                if let Err(e) = self.broadcast_group_members(group_id).await {
                    warn!(group = %group_id, error = %e, "post-connect presence broadcast failed");
                }
            }
        }

        group_ids
    }

    async fn room_list_event(&self, group_id: &GroupId) -> Result<ServerEvent, EngineError> {
        let mirror = self.mirror.read().await;
        if mirror.group(group_id).is_none() {
            return Err(EngineError::not_found(format!("group {}", group_id)));
        }
        let rooms = mirror
            .rooms_of(group_id)
            .into_iter()
            .map(|room| RoomSummary {
                room_id: room.id.clone(),
                name: room.name.clone(),
                kind: room.kind,
            })
            .collect();
        Ok(ServerEvent::RoomList {
            group_id: group_id.clone(),
            rooms,
        })
    }
}

fn swallow(result: Result<(), TransportError>, target: &str) {
    if let Err(e) = result {
        warn!(target = %target, error = %e, "transport push failed");
    }
}
