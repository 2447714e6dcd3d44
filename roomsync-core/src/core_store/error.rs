//! Store error types

/// Durable-store failure. A `StoreError` during a mutating coordinator
/// call aborts the whole operation with the mirror left untouched.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("sql error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}
