//! SQLite-backed storage for group and room records

use super::{DataStore, GroupRecord, MessageStore, RoomRecord, StoreError};
use crate::core_model::{GroupId, RoomId, RoomKind, Timestamp, UserId};
use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

const MIGRATION_V1: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY,
        applied_at INTEGER NOT NULL
    );

    -- Groups (servers/communities)
    CREATE TABLE IF NOT EXISTS groups (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        owner_id TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_groups_owner ON groups(owner_id);

    -- Group members (join table)
    CREATE TABLE IF NOT EXISTS group_members (
        group_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        PRIMARY KEY (group_id, user_id),
        FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_group_members_user ON group_members(user_id);

    -- Rooms (channels within a group)
    CREATE TABLE IF NOT EXISTS rooms (
        id TEXT PRIMARY KEY,
        group_id TEXT NOT NULL,
        name TEXT NOT NULL,
        kind TEXT NOT NULL CHECK(kind IN ('text', 'voice')),
        created_at INTEGER NOT NULL,
        FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_rooms_group ON rooms(group_id);

    -- Messages are owned by the message-store collaborator; only the
    -- room-scoped purge lives here.
    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        room_id TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_messages_room ON messages(room_id);
"#;

/// SQLite store on an r2d2 connection pool
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path and run migrations
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::new(manager).map_err(|e| StoreError::Pool(e.to_string()))?;
        Self::with_pool(pool)
    }

    /// Create an in-memory store (for testing)
    pub fn memory() -> Result<Self, StoreError> {
        // A single connection keeps the in-memory database alive and shared
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        Self::with_pool(pool)
    }

    fn with_pool(pool: Pool<SqliteConnectionManager>) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute_batch(MIGRATION_V1)?;

        let current: Option<i32> = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .optional()?
            .flatten();

        if current.unwrap_or(0) < SCHEMA_VERSION {
            conn.execute(
                "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?, ?)",
                params![SCHEMA_VERSION, Timestamp::now().as_millis() as i64],
            )?;
        }

        Ok(())
    }

    fn conn(
        &self,
    ) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, StoreError> {
        self.pool.get().map_err(|e| StoreError::Pool(e.to_string()))
    }

    fn row_to_group(
        conn: &rusqlite::Connection,
        id: GroupId,
        name: String,
        owner_id: UserId,
        created_at: i64,
    ) -> Result<GroupRecord, rusqlite::Error> {
        let mut stmt =
            conn.prepare("SELECT user_id FROM group_members WHERE group_id = ? ORDER BY user_id")?;
        let member_ids = stmt
            .query_map(params![id.0], |row| Ok(UserId::new(row.get(0)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GroupRecord {
            id,
            name,
            owner_id,
            member_ids,
            created_at: Timestamp::from_millis(created_at.max(0) as u64),
        })
    }
}

#[async_trait]
impl DataStore for SqliteStore {
    async fn load_all(&self) -> Result<(Vec<GroupRecord>, Vec<RoomRecord>), StoreError> {
        let conn = self.conn()?;

        let mut stmt =
            conn.prepare("SELECT id, name, owner_id, created_at FROM groups ORDER BY created_at")?;
        let headers = stmt
            .query_map([], |row| {
                Ok((
                    GroupId::new(row.get(0)?),
                    row.get::<_, String>(1)?,
                    UserId::new(row.get(2)?),
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut groups = Vec::with_capacity(headers.len());
        for (id, name, owner_id, created_at) in headers {
            groups.push(Self::row_to_group(&conn, id, name, owner_id, created_at)?);
        }

        let mut stmt = conn
            .prepare("SELECT id, group_id, name, kind, created_at FROM rooms ORDER BY created_at")?;
        let rooms = stmt
            .query_map([], |row| {
                let kind_str: String = row.get(3)?;
                Ok((
                    RoomId::new(row.get(0)?),
                    GroupId::new(row.get(1)?),
                    row.get::<_, String>(2)?,
                    kind_str,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let rooms = rooms
            .into_iter()
            .map(|(id, group_id, name, kind, created_at)| {
                let kind = RoomKind::parse(&kind)
                    .ok_or_else(|| StoreError::Corrupt(format!("room {} kind {:?}", id, kind)))?;
                Ok(RoomRecord {
                    id,
                    group_id,
                    name,
                    kind,
                    created_at: Timestamp::from_millis(created_at.max(0) as u64),
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok((groups, rooms))
    }

    async fn find_group(&self, id: &GroupId) -> Result<Option<GroupRecord>, StoreError> {
        let conn = self.conn()?;

        let header = conn
            .query_row(
                "SELECT name, owner_id, created_at FROM groups WHERE id = ?",
                params![id.0],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        UserId::new(row.get(1)?),
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        match header {
            Some((name, owner_id, created_at)) => Ok(Some(Self::row_to_group(
                &conn,
                id.clone(),
                name,
                owner_id,
                created_at,
            )?)),
            None => Ok(None),
        }
    }

    async fn create_group(&self, record: &GroupRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO groups (id, name, owner_id, created_at) VALUES (?, ?, ?, ?)",
            params![
                record.id.0,
                record.name,
                record.owner_id.0,
                record.created_at.as_millis() as i64,
            ],
        )?;

        for member in &record.member_ids {
            tx.execute(
                "INSERT INTO group_members (group_id, user_id) VALUES (?, ?)",
                params![record.id.0, member.0],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    async fn update_group_members(
        &self,
        id: &GroupId,
        members: &[UserId],
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        let exists: Option<i64> = tx
            .query_row("SELECT 1 FROM groups WHERE id = ?", params![id.0], |row| {
                row.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::RecordNotFound(format!("group {}", id)));
        }

        tx.execute("DELETE FROM group_members WHERE group_id = ?", params![id.0])?;
        for member in members {
            tx.execute(
                "INSERT INTO group_members (group_id, user_id) VALUES (?, ?)",
                params![id.0, member.0],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    async fn rename_group(&self, id: &GroupId, name: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE groups SET name = ? WHERE id = ?",
            params![name, id.0],
        )?;
        if changed == 0 {
            return Err(StoreError::RecordNotFound(format!("group {}", id)));
        }
        Ok(())
    }

    async fn delete_group(&self, id: &GroupId) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute("DELETE FROM group_members WHERE group_id = ?", params![id.0])?;
        tx.execute("DELETE FROM rooms WHERE group_id = ?", params![id.0])?;
        let changed = tx.execute("DELETE FROM groups WHERE id = ?", params![id.0])?;
        if changed == 0 {
            return Err(StoreError::RecordNotFound(format!("group {}", id)));
        }

        tx.commit()?;
        Ok(())
    }

    async fn find_room(&self, id: &RoomId) -> Result<Option<RoomRecord>, StoreError> {
        let conn = self.conn()?;

        let row = conn
            .query_row(
                "SELECT group_id, name, kind, created_at FROM rooms WHERE id = ?",
                params![id.0],
                |row| {
                    Ok((
                        GroupId::new(row.get(0)?),
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((group_id, name, kind, created_at)) => {
                let kind = RoomKind::parse(&kind)
                    .ok_or_else(|| StoreError::Corrupt(format!("room {} kind {:?}", id, kind)))?;
                Ok(Some(RoomRecord {
                    id: id.clone(),
                    group_id,
                    name,
                    kind,
                    created_at: Timestamp::from_millis(created_at.max(0) as u64),
                }))
            }
            None => Ok(None),
        }
    }

    async fn create_room(&self, record: &RoomRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO rooms (id, group_id, name, kind, created_at) VALUES (?, ?, ?, ?, ?)",
            params![
                record.id.0,
                record.group_id.0,
                record.name,
                record.kind.as_str(),
                record.created_at.as_millis() as i64,
            ],
        )?;
        Ok(())
    }

    async fn rename_room(&self, id: &RoomId, name: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE rooms SET name = ? WHERE id = ?",
            params![name, id.0],
        )?;
        if changed == 0 {
            return Err(StoreError::RecordNotFound(format!("room {}", id)));
        }
        Ok(())
    }

    async fn delete_room(&self, id: &RoomId) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM rooms WHERE id = ?", params![id.0])?;
        if changed == 0 {
            return Err(StoreError::RecordNotFound(format!("room {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn delete_all_for_room(&self, room_id: &RoomId) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM messages WHERE room_id = ?", params![room_id.0])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, owner: &str) -> GroupRecord {
        GroupRecord {
            id: GroupId::generate(),
            name: name.to_string(),
            owner_id: UserId::new(owner.to_string()),
            member_ids: vec![UserId::new(owner.to_string())],
            created_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_group() {
        let store = SqliteStore::memory().unwrap();
        let group = record("Team", "alice");

        store.create_group(&group).await.unwrap();
        let found = store.find_group(&group.id).await.unwrap().unwrap();
        assert_eq!(found, group);
    }

    #[tokio::test]
    async fn test_find_missing_group_is_none() {
        let store = SqliteStore::memory().unwrap();
        let found = store.find_group(&GroupId::generate()).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_update_group_members() {
        let store = SqliteStore::memory().unwrap();
        let group = record("Team", "alice");
        store.create_group(&group).await.unwrap();

        let members = vec![
            UserId::new("alice".to_string()),
            UserId::new("bob".to_string()),
        ];
        store
            .update_group_members(&group.id, &members)
            .await
            .unwrap();

        let found = store.find_group(&group.id).await.unwrap().unwrap();
        assert_eq!(found.member_ids, members);
    }

    #[tokio::test]
    async fn test_delete_group_removes_rooms() {
        let store = SqliteStore::memory().unwrap();
        let group = record("Team", "alice");
        store.create_group(&group).await.unwrap();

        let room = RoomRecord {
            id: RoomId::generate(),
            group_id: group.id.clone(),
            name: "general".to_string(),
            kind: RoomKind::Text,
            created_at: Timestamp::now(),
        };
        store.create_room(&room).await.unwrap();

        store.delete_group(&group.id).await.unwrap();

        assert!(store.find_group(&group.id).await.unwrap().is_none());
        assert!(store.find_room(&room.id).await.unwrap().is_none());
        let (groups, rooms) = store.load_all().await.unwrap();
        assert!(groups.is_empty());
        assert!(rooms.is_empty());
    }

    #[tokio::test]
    async fn test_rename_missing_room_fails() {
        let store = SqliteStore::memory().unwrap();
        let result = store.rename_room(&RoomId::generate(), "lobby").await;
        assert!(matches!(result, Err(StoreError::RecordNotFound(_))));
    }

    #[tokio::test]
    async fn test_on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roomsync.db");
        let group = record("Team", "alice");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.create_group(&group).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.find_group(&group.id).await.unwrap(), Some(group));
    }

    #[tokio::test]
    async fn test_load_all_round_trip() {
        let store = SqliteStore::memory().unwrap();
        let group = record("Team", "alice");
        store.create_group(&group).await.unwrap();

        let room = RoomRecord {
            id: RoomId::generate(),
            group_id: group.id.clone(),
            name: "voice-lounge".to_string(),
            kind: RoomKind::Voice,
            created_at: Timestamp::now(),
        };
        store.create_room(&room).await.unwrap();

        let (groups, rooms) = store.load_all().await.unwrap();
        assert_eq!(groups, vec![group]);
        assert_eq!(rooms, vec![room]);
    }
}
