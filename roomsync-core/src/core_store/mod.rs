//! Persistent store collaborator
//!
//! The engine treats the store as ground truth: every mutating coordinator
//! method performs the durable write first and touches the mirror only on
//! success. The backend is selected once at startup via configuration
//! (`StoreBackend`), never re-decided at a call site.

use crate::core_model::{GroupId, RoomId, UserId};
use async_trait::async_trait;

mod error;
pub mod memory;
mod records;
pub mod sqlite;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use records::{GroupRecord, RoomRecord};
pub use sqlite::SqliteStore;

/// Durable group/room storage.
///
/// Retry/backoff is the implementation's responsibility; a call either
/// eventually resolves or fails with a `StoreError` that aborts the
/// triggering operation.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Load every group and room record. Called once at bootstrap.
    async fn load_all(&self) -> Result<(Vec<GroupRecord>, Vec<RoomRecord>), StoreError>;

    async fn find_group(&self, id: &GroupId) -> Result<Option<GroupRecord>, StoreError>;

    async fn create_group(&self, record: &GroupRecord) -> Result<(), StoreError>;

    async fn update_group_members(
        &self,
        id: &GroupId,
        members: &[UserId],
    ) -> Result<(), StoreError>;

    async fn rename_group(&self, id: &GroupId, name: &str) -> Result<(), StoreError>;

    /// Delete the group record. Rooms under it must already be gone; the
    /// coordinator cascades room deletion before calling this.
    async fn delete_group(&self, id: &GroupId) -> Result<(), StoreError>;

    async fn find_room(&self, id: &RoomId) -> Result<Option<RoomRecord>, StoreError>;

    async fn create_room(&self, record: &RoomRecord) -> Result<(), StoreError>;

    async fn rename_room(&self, id: &RoomId, name: &str) -> Result<(), StoreError>;

    async fn delete_room(&self, id: &RoomId) -> Result<(), StoreError>;
}

/// Message-store collaborator, invoked during cascading room deletion.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn delete_all_for_room(&self, room_id: &RoomId) -> Result<(), StoreError>;
}
