//! In-memory deposit storage.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tbtc_relayer_primitives::prelude::{ChainName, Deposit, DepositId, DepositStatus};
use tokio::sync::RwLock;
use tracing::trace;

use crate::{
    deposits::DepositDb,
    errors::{DbError, DbResult},
};

/// In-memory database for deposits.
#[derive(Debug, Default, Clone)]
pub struct DepositDbInMemory {
    /// deposit_id -> deposit
    deposits: Arc<RwLock<HashMap<DepositId, Deposit>>>,
}

#[async_trait]
impl DepositDb for DepositDbInMemory {
    async fn get_deposit(&self, id: &DepositId) -> DbResult<Option<Deposit>> {
        Ok(self.deposits.read().await.get(id).cloned())
    }

    async fn create_deposit(&self, deposit: &Deposit) -> DbResult<()> {
        trace!(action = "trying to acquire wlock on deposits", deposit_id = %deposit.id);
        let mut deposits = self.deposits.write().await;
        trace!(event = "wlock acquired on deposits", deposit_id = %deposit.id);

        if deposits.contains_key(&deposit.id) {
            return Err(DbError::AlreadyExists {
                kind: "deposit",
                id: deposit.id.to_string(),
            });
        }

        deposits.insert(deposit.id, deposit.clone());

        Ok(())
    }

    async fn update_deposit(&self, deposit: &Deposit, expected: DepositStatus) -> DbResult<()> {
        trace!(action = "trying to acquire wlock on deposits", deposit_id = %deposit.id);
        let mut deposits = self.deposits.write().await;
        trace!(event = "wlock acquired on deposits", deposit_id = %deposit.id);

        match deposits.get_mut(&deposit.id) {
            Some(stored) if stored.status != expected => Err(DbError::StatusChanged {
                kind: "deposit",
                id: deposit.id.to_string(),
                expected: expected.as_str(),
            }),
            Some(stored) => {
                *stored = deposit.clone();
                Ok(())
            }
            None => Err(DbError::NotFound {
                kind: "deposit",
                id: deposit.id.to_string(),
            }),
        }
    }

    async fn get_deposits_by_status(
        &self,
        chain: &ChainName,
        status: DepositStatus,
    ) -> DbResult<Vec<Deposit>> {
        Ok(self
            .deposits
            .read()
            .await
            .values()
            .filter(|deposit| &deposit.chain == chain && deposit.status == status)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tbtc_relayer_primitives::prelude::*;

    use super::*;
    use crate::test_utils::test_deposit;

    #[tokio::test]
    async fn create_rejects_duplicates() {
        let db = DepositDbInMemory::default();
        let deposit = test_deposit("arbitrum", 0);

        db.create_deposit(&deposit).await.unwrap();
        let err = db.create_deposit(&deposit).await.unwrap_err();

        assert!(matches!(err, DbError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn update_and_query_by_status() {
        let db = DepositDbInMemory::default();
        let mut first = test_deposit("arbitrum", 0);
        let second = test_deposit("arbitrum", 1);
        let other_chain = test_deposit("starknet", 2);

        for deposit in [&first, &second, &other_chain] {
            db.create_deposit(deposit).await.unwrap();
        }

        first
            .record_initialized(alloy_primitives::B256::repeat_byte(1), Utc::now())
            .unwrap();
        db.update_deposit(&first, DepositStatus::Queued)
            .await
            .unwrap();

        let chain = ChainName::from("arbitrum");
        let queued = db
            .get_deposits_by_status(&chain, DepositStatus::Queued)
            .await
            .unwrap();
        let initialized = db
            .get_deposits_by_status(&chain, DepositStatus::Initialized)
            .await
            .unwrap();

        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].id, second.id);
        assert_eq!(initialized, vec![first.clone()]);
        assert_eq!(db.get_deposit(&first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn update_requires_existing_record() {
        let db = DepositDbInMemory::default();
        let err = db
            .update_deposit(&test_deposit("arbitrum", 3), DepositStatus::Queued)
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_from_a_stale_status_is_rejected() {
        let db = DepositDbInMemory::default();
        let mut deposit = test_deposit("arbitrum", 4);
        db.create_deposit(&deposit).await.unwrap();

        let stale = deposit.clone();
        deposit
            .record_initialized(alloy_primitives::B256::repeat_byte(1), Utc::now())
            .unwrap();
        db.update_deposit(&deposit, DepositStatus::Queued)
            .await
            .unwrap();

        let err = db
            .update_deposit(&stale, DepositStatus::Queued)
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::StatusChanged { expected: "QUEUED", .. }));
        assert_eq!(db.get_deposit(&deposit.id).await.unwrap(), Some(deposit));
    }
}
