//! Durable record shapes exchanged with the persistent store

use crate::core_model::{GroupId, RoomId, RoomKind, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Durable group record. `member_ids` is the authoritative membership;
/// the mirror is a projection of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: GroupId,
    pub name: String,
    pub owner_id: UserId,
    pub member_ids: Vec<UserId>,
    pub created_at: Timestamp,
}

/// Durable room record. Room occupancy is process-local presence data and
/// deliberately has no durable field here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub id: RoomId,
    pub group_id: GroupId,
    pub name: String,
    pub kind: RoomKind,
    pub created_at: Timestamp,
}
