//! In-memory block cursors.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tbtc_relayer_primitives::types::BlockHeight;
use tokio::sync::RwLock;

use crate::{errors::DbResult, tracker::BlockCursorDb};

/// In-memory implementation of the block cursor database.
#[derive(Debug, Clone, Default)]
pub struct BlockCursorInMemory {
    /// stream name -> last scanned block
    cursors: Arc<RwLock<HashMap<String, BlockHeight>>>,
}

#[async_trait]
impl BlockCursorDb for BlockCursorInMemory {
    async fn get_last_scanned_block(&self, stream: &str) -> DbResult<Option<BlockHeight>> {
        Ok(self.cursors.read().await.get(stream).copied())
    }

    async fn set_last_scanned_block(&self, stream: &str, height: BlockHeight) -> DbResult<()> {
        let mut cursors = self.cursors.write().await;

        cursors.insert(stream.to_string(), height);

        Ok(())
    }
}
