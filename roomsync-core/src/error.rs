//! Engine-level error taxonomy
//!
//! Every coordinator method fails with one of these. Transport-event
//! handlers above this crate convert them into protocol-level failure
//! acknowledgements; a failed operation never terminates a connection.

use crate::core_store::StoreError;

/// Errors surfaced by coordinator operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Empty/duplicate names, invalid room type, owner self-removal
    #[error("validation failed: {0}")]
    Validation(String),

    /// Missing group or room
    #[error("not found: {0}")]
    NotFound(String),

    /// Non-owner attempting an owner-only mutation, or a non-member
    /// attempting room access
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Durable-store call failed; the mirror was left untouched
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        EngineError::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        EngineError::Forbidden(msg.into())
    }
}
