//! In-memory redemption storage.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tbtc_relayer_primitives::prelude::{
    ChainName, Redemption, RedemptionId, RedemptionStatus, Timestamp,
};
use tokio::sync::RwLock;
use tracing::trace;

use crate::{
    errors::{DbError, DbResult},
    redemptions::RedemptionDb,
};

/// In-memory database for redemptions.
#[derive(Debug, Default, Clone)]
pub struct RedemptionDbInMemory {
    /// l2_tx_hash -> redemption
    redemptions: Arc<RwLock<HashMap<RedemptionId, Redemption>>>,
}

#[async_trait]
impl RedemptionDb for RedemptionDbInMemory {
    async fn get_redemption(&self, id: &RedemptionId) -> DbResult<Option<Redemption>> {
        Ok(self.redemptions.read().await.get(id).cloned())
    }

    async fn create_redemption(&self, redemption: &Redemption) -> DbResult<()> {
        trace!(action = "trying to acquire wlock on redemptions", redemption_id = %redemption.id);
        let mut redemptions = self.redemptions.write().await;
        trace!(event = "wlock acquired on redemptions", redemption_id = %redemption.id);

        if redemptions.contains_key(&redemption.id) {
            return Err(DbError::AlreadyExists {
                kind: "redemption",
                id: redemption.id.to_string(),
            });
        }

        redemptions.insert(redemption.id, redemption.clone());

        Ok(())
    }

    async fn update_redemption(&self, redemption: &Redemption) -> DbResult<()> {
        let mut redemptions = self.redemptions.write().await;

        match redemptions.get_mut(&redemption.id) {
            Some(stored) => {
                *stored = redemption.clone();
                Ok(())
            }
            None => Err(DbError::NotFound {
                kind: "redemption",
                id: redemption.id.to_string(),
            }),
        }
    }

    async fn get_redemptions_by_status(
        &self,
        chain: &ChainName,
        status: RedemptionStatus,
    ) -> DbResult<Vec<Redemption>> {
        Ok(self
            .redemptions
            .read()
            .await
            .values()
            .filter(|redemption| &redemption.chain == chain && redemption.status == status)
            .cloned()
            .collect())
    }

    async fn delete_settled_redemptions_before(&self, cutoff: Timestamp) -> DbResult<u64> {
        let mut redemptions = self.redemptions.write().await;
        let before = redemptions.len();

        redemptions.retain(|_, redemption| {
            !(redemption.status.is_terminal() && redemption.dates.last_activity_at < cutoff)
        });

        Ok((before - redemptions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::test_utils::test_redemption;

    #[tokio::test]
    async fn retention_only_removes_old_settled_redemptions() {
        let db = RedemptionDbInMemory::default();
        let old = Utc::now() - Duration::days(30);

        let mut completed = test_redemption("arbitrum", 1, old);
        completed
            .record_vaa(vec![1u8].into(), old)
            .unwrap();
        completed
            .record_completed(alloy_primitives::B256::repeat_byte(9), old)
            .unwrap();
        let stale_pending = test_redemption("arbitrum", 2, old);
        let mut fresh_failed = test_redemption("arbitrum", 3, Utc::now());
        fresh_failed.record_vaa(vec![2u8].into(), Utc::now()).unwrap();
        fresh_failed
            .record_failed("reverted", None, Utc::now())
            .unwrap();

        for redemption in [&completed, &stale_pending, &fresh_failed] {
            db.create_redemption(redemption).await.unwrap();
        }

        let deleted = db
            .delete_settled_redemptions_before(Utc::now() - Duration::days(7))
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert!(db.get_redemption(&completed.id).await.unwrap().is_none());
        assert!(db.get_redemption(&stale_pending.id).await.unwrap().is_some());
        assert!(db.get_redemption(&fresh_failed.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn create_rejects_duplicates() {
        let db = RedemptionDbInMemory::default();
        let redemption = test_redemption("base", 4, Utc::now());

        db.create_redemption(&redemption).await.unwrap();
        assert!(matches!(
            db.create_redemption(&redemption).await,
            Err(DbError::AlreadyExists { .. })
        ));
    }
}
