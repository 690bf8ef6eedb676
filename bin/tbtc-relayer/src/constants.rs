use std::time::Duration;

pub(crate) const DEFAULT_THREAD_COUNT: u8 = 4;

/// How long running passes get to finish after a shutdown signal.
pub(crate) const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

pub(crate) const DEFAULT_MAX_CONCURRENCY: usize = 8;
