//! In-memory store backend
//!
//! The fixture data source: selected explicitly via `StoreBackend::Memory`
//! at startup for development and tests, never silently substituted at a
//! call site.

use super::{DataStore, GroupRecord, MessageStore, RoomRecord, StoreError};
use crate::core_model::{GroupId, RoomId, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    groups: HashMap<GroupId, GroupRecord>,
    rooms: HashMap<RoomId, RoomRecord>,
    messages_purged: Vec<RoomId>,
}

/// In-memory implementation of both store collaborators
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, for exercising the engine's
    /// store-failure path.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent read fail, for exercising degraded-mode
    /// bootstrap.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Rooms whose messages have been purged, in purge order
    pub async fn purged_rooms(&self) -> Vec<RoomId> {
        self.tables.read().await.messages_purged.clone()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Pool("simulated write failure".to_string()));
        }
        Ok(())
    }

    fn check_readable(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Pool("simulated read failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn load_all(&self) -> Result<(Vec<GroupRecord>, Vec<RoomRecord>), StoreError> {
        self.check_readable()?;
        let tables = self.tables.read().await;
        let mut groups: Vec<_> = tables.groups.values().cloned().collect();
        let mut rooms: Vec<_> = tables.rooms.values().cloned().collect();
        groups.sort_by_key(|g| g.created_at);
        rooms.sort_by_key(|r| r.created_at);
        Ok((groups, rooms))
    }

    async fn find_group(&self, id: &GroupId) -> Result<Option<GroupRecord>, StoreError> {
        Ok(self.tables.read().await.groups.get(id).cloned())
    }

    async fn create_group(&self, record: &GroupRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        self.tables
            .write()
            .await
            .groups
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update_group_members(
        &self,
        id: &GroupId,
        members: &[UserId],
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        let group = tables
            .groups
            .get_mut(id)
            .ok_or_else(|| StoreError::RecordNotFound(format!("group {}", id)))?;
        group.member_ids = members.to_vec();
        Ok(())
    }

    async fn rename_group(&self, id: &GroupId, name: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        let group = tables
            .groups
            .get_mut(id)
            .ok_or_else(|| StoreError::RecordNotFound(format!("group {}", id)))?;
        group.name = name.to_string();
        Ok(())
    }

    async fn delete_group(&self, id: &GroupId) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        if tables.groups.remove(id).is_none() {
            return Err(StoreError::RecordNotFound(format!("group {}", id)));
        }
        tables.rooms.retain(|_, room| &room.group_id != id);
        Ok(())
    }

    async fn find_room(&self, id: &RoomId) -> Result<Option<RoomRecord>, StoreError> {
        Ok(self.tables.read().await.rooms.get(id).cloned())
    }

    async fn create_room(&self, record: &RoomRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        self.tables
            .write()
            .await
            .rooms
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn rename_room(&self, id: &RoomId, name: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        let room = tables
            .rooms
            .get_mut(id)
            .ok_or_else(|| StoreError::RecordNotFound(format!("room {}", id)))?;
        room.name = name.to_string();
        Ok(())
    }

    async fn delete_room(&self, id: &RoomId) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        if tables.rooms.remove(id).is_none() {
            return Err(StoreError::RecordNotFound(format!("room {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn delete_all_for_room(&self, room_id: &RoomId) -> Result<(), StoreError> {
        self.check_writable()?;
        self.tables
            .write()
            .await
            .messages_purged
            .push(room_id.clone());
        Ok(())
    }
}
