//! Transport collaborator
//!
//! The real-time push channel abstraction. The engine only ever touches
//! this interface; socket lifecycle, framing and delivery live outside the
//! crate. Emit failures are the caller's to log and swallow — a failed push
//! never rolls back an already-successful state mutation.

use crate::core_model::{ConnectionId, GroupId, RoomId, RoomKind, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Logical channel name for group-level broadcasts
pub fn group_channel(group_id: &GroupId) -> String {
    format!("group:{}", group_id)
}

/// Logical channel name for room-level broadcasts
pub fn room_channel(group_id: &GroupId, room_id: &RoomId) -> String {
    format!("room:{}:{}", group_id, room_id)
}

/// A room in a group's room-list payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub name: String,
    pub kind: RoomKind,
}

/// One occupant in a room-members payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupantInfo {
    pub user_id: UserId,
    pub display_name: String,
}

/// A group member with its presence status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMemberStatus {
    pub user_id: UserId,
    pub online: bool,
}

/// Payloads the Broadcast Router pushes to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The rooms of a group, pushed to one connection or the group channel
    RoomList {
        group_id: GroupId,
        rooms: Vec<RoomSummary>,
    },
    /// The live occupants of a room
    RoomMembers {
        group_id: GroupId,
        room_id: RoomId,
        members: Vec<OccupantInfo>,
    },
    /// The group's member identities partitioned by presence
    GroupMembers {
        group_id: GroupId,
        members: Vec<GroupMemberStatus>,
    },
    /// Structural change: the group was renamed
    GroupInfo { group_id: GroupId, name: String },
    /// Structural change: the group and all its rooms are gone
    GroupDeleted { group_id: GroupId },
}

/// Transport failure; logged and swallowed by the router
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection gone: {0}")]
    ConnectionGone(String),

    #[error("channel send failed: {0}")]
    SendFailed(String),
}

/// Real-time push channel abstraction
#[async_trait]
pub trait Transport: Send + Sync {
    async fn subscribe(
        &self,
        connection_id: &ConnectionId,
        channel: &str,
    ) -> Result<(), TransportError>;

    async fn unsubscribe(
        &self,
        connection_id: &ConnectionId,
        channel: &str,
    ) -> Result<(), TransportError>;

    /// Push an event to every connection subscribed to a logical channel
    async fn emit(&self, channel: &str, event: &ServerEvent) -> Result<(), TransportError>;

    /// Push an event to a single connection
    async fn emit_to(
        &self,
        connection_id: &ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), TransportError>;
}
