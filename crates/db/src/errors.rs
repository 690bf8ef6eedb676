//! Errors surfaced by every storage backend.

use thiserror::Error;

use crate::persistent::errors::StorageError;

/// Errors that can occur when reading or writing entities.
#[derive(Debug, Error)]
pub enum DbError {
    /// The SQLite backend failed.
    #[error("sqlite: {0}")]
    Storage(#[from] StorageError),

    /// An entity with the same id is already stored.
    #[error("{kind} {id} already exists")]
    AlreadyExists {
        /// The entity kind.
        kind: &'static str,
        /// The entity id.
        id: String,
    },

    /// No entity with the id is stored.
    #[error("{kind} {id} not found")]
    NotFound {
        /// The entity kind.
        kind: &'static str,
        /// The entity id.
        id: String,
    },

    /// The stored entity moved past the status the write was based on.
    #[error("{kind} {id} is no longer {expected}")]
    StatusChanged {
        /// The entity kind.
        kind: &'static str,
        /// The entity id.
        id: String,
        /// The status the writer read before acting.
        expected: &'static str,
    },
}

/// Result of a storage operation.
pub type DbResult<T> = Result<T, DbError>;
