//! Persistent database errors.

use thiserror::Error;

/// Errors that can occur when interacting with the database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An error occurred when interacting with the SQLite database.
    #[error("sqlite: {0}")]
    Driver(#[from] sqlx::Error),

    /// An error occurred when applying the embedded migrations.
    #[error("migration: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The data directory could not be prepared.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A stored entity could not be encoded or decoded.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An error occurred when converting between types.
    #[error("conversion: {0}")]
    MismatchedTypes(String),
}
