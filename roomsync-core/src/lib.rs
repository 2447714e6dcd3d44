//! roomsync-core
//!
//! Presence and room-membership synchronization engine for a real-time
//! chat/voice backend. The crate keeps a per-process mirror of the durable
//! group/room structure, tracks which identities are online over which
//! connections, writes every structural mutation through to the persistent
//! store before touching the mirror, and fans state changes out to
//! subscribers over a pluggable transport.
//!
//! `SyncEngine` is the composition root; embedders construct one per
//! process, call `bootstrap`, and drive it with connection lifecycle and
//! group/room operations.

pub mod config;
pub mod core_broadcast;
pub mod core_channel;
pub mod core_group;
pub mod core_mirror;
pub mod core_model;
pub mod core_presence;
pub mod core_store;
pub mod engine;
pub mod error;
pub mod logging;
pub mod test_utils;
pub mod transport;

pub use config::{Config, StoreBackend};
pub use core_model::{ConnectionId, GroupId, Identity, RoomId, RoomKind, Timestamp, UserId};
pub use engine::SyncEngine;
pub use error::EngineError;
pub use logging::LogLevel;
