//! Storage interface for deposits.

use async_trait::async_trait;
use tbtc_relayer_primitives::prelude::{ChainName, Deposit, DepositId, DepositStatus};

use crate::errors::DbResult;

/// Keyed storage for [`Deposit`] records.
///
/// Implementations must make [`create_deposit`](Self::create_deposit) atomic so that two
/// concurrent observers of the same reveal cannot both create the record.
#[async_trait]
pub trait DepositDb {
    /// Gets, if present, the deposit with the given id.
    async fn get_deposit(&self, id: &DepositId) -> DbResult<Option<Deposit>>;

    /// Inserts a new deposit, failing with [`DbError::AlreadyExists`](crate::errors::DbError) if
    /// one with the same id is already stored.
    async fn create_deposit(&self, deposit: &Deposit) -> DbResult<()>;

    /// Replaces a stored deposit whose status is still `expected`.
    ///
    /// Fails with [`DbError::StatusChanged`](crate::errors::DbError) when another writer moved
    /// the record in the meantime, and with [`DbError::NotFound`](crate::errors::DbError) if it
    /// was never created. The check and the write are a single atomic step.
    async fn update_deposit(&self, deposit: &Deposit, expected: DepositStatus) -> DbResult<()>;

    /// Gets every deposit for `chain` currently in `status`.
    async fn get_deposits_by_status(
        &self,
        chain: &ChainName,
        status: DepositStatus,
    ) -> DbResult<Vec<Deposit>>;
}
