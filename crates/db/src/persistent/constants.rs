//! This module contains all the constants used in the persistence layer.

use std::time::Duration;

/// The file name of the database inside the data directory.
pub const DEFAULT_DB_FILE_NAME: &str = "relayer.db";

/// The maximum number of pooled connections.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;

/// How long a connection waits on a locked database before erroring out.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
