//! This module contains all the configuration types used in the persistence layer.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use super::constants::{DEFAULT_BUSY_TIMEOUT, DEFAULT_DB_FILE_NAME, DEFAULT_MAX_CONNECTIONS};

/// The configuration for the SQLite database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    file_name: String,
    max_connections: u32,
    busy_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_DB_FILE_NAME.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl DbConfig {
    /// Sets the file name of the database inside the data directory.
    pub fn with_file_name(self, file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..self
        }
    }

    /// Sets the maximum number of pooled connections.
    pub fn with_max_connections(self, count: u32) -> Self {
        Self {
            max_connections: count,
            ..self
        }
    }

    /// Sets how long a connection waits on a locked database.
    pub fn with_busy_timeout(self, timeout: Duration) -> Self {
        Self {
            busy_timeout: timeout,
            ..self
        }
    }

    /// Returns the path of the database file inside `datadir`.
    pub fn db_path(&self, datadir: impl Into<PathBuf>) -> PathBuf {
        datadir.into().join(&self.file_name)
    }

    /// Returns the maximum number of pooled connections.
    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    /// Returns the busy timeout.
    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }
}
