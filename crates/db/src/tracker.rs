//! Storage interface for event-stream cursors.

use async_trait::async_trait;
use tbtc_relayer_primitives::types::BlockHeight;

use crate::errors::DbResult;

/// Remembers the last block scanned by each named event stream so that a restarted relayer
/// resumes its live tail instead of starting from the chain head.
#[async_trait]
pub trait BlockCursorDb {
    async fn get_last_scanned_block(&self, stream: &str) -> DbResult<Option<BlockHeight>>;

    async fn set_last_scanned_block(&self, stream: &str, height: BlockHeight) -> DbResult<()>;
}
