//! Common identifier and value types for the sync engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix timestamp in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Create a timestamp representing the current time
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_millis() as u64)
    }

    /// Create a timestamp from milliseconds since epoch
    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    /// Get milliseconds since epoch
    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a group (server/community)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn new(id: String) -> Self {
        GroupId(id)
    }

    pub fn generate() -> Self {
        GroupId(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a room within a group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new(id: String) -> Self {
        RoomId(id)
    }

    pub fn generate() -> Self {
        RoomId(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: String) -> Self {
        UserId(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one live transport session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    pub fn new(id: String) -> Self {
        ConnectionId(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An authenticated user reference supplied by the identity collaborator.
///
/// The engine stores these as opaque references and never re-validates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: String,
}

impl Identity {
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Identity {
            user_id,
            display_name: display_name.into(),
        }
    }
}

/// Room type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    Text,
    Voice,
}

impl RoomKind {
    /// Parse a wire-level room type string. Anything other than the two
    /// known kinds is rejected by the caller as a validation failure.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(RoomKind::Text),
            "voice" => Some(RoomKind::Voice),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomKind::Text => "text",
            RoomKind::Voice => "voice",
        }
    }
}

impl fmt::Display for RoomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_id_generation() {
        let id1 = GroupId::generate();
        let id2 = GroupId::generate();
        assert_ne!(id1, id2, "Generated IDs should be unique");
    }

    #[test]
    fn test_room_kind_parse() {
        assert_eq!(RoomKind::parse("text"), Some(RoomKind::Text));
        assert_eq!(RoomKind::parse("voice"), Some(RoomKind::Voice));
        assert_eq!(RoomKind::parse("video"), None);
        assert_eq!(RoomKind::parse("Text"), None);
    }

    #[test]
    fn test_room_kind_round_trip() {
        for kind in [RoomKind::Text, RoomKind::Voice] {
            assert_eq!(RoomKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_timestamp_millis() {
        let ts = Timestamp::from_millis(1234);
        assert_eq!(ts.as_millis(), 1234);
    }
}
