//! Data model for the presence & room-membership engine
//!
//! Mirror-side entities only; durable records live in `core_store`.

pub mod group;
pub mod room;
pub mod types;

pub use group::{GroupEntry, OwnerRemoval};
pub use room::{Occupant, RoomEntry};
pub use types::{ConnectionId, GroupId, Identity, RoomId, RoomKind, Timestamp, UserId};
