//! Storage error types

use thiserror::Error;

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage-specific error types
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Node {id} is a {found}, expected {expected}")]
    KindMismatch {
        id: String,
        expected: String,
        found: String,
    },

    #[error("Lock error: {0}")]
    Lock(String),

    #[error(transparent)]
    Core(#[from] trellis_core::Error),
}
