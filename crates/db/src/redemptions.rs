//! Storage interface for redemptions.

use async_trait::async_trait;
use tbtc_relayer_primitives::prelude::{
    ChainName, Redemption, RedemptionId, RedemptionStatus, Timestamp,
};

use crate::errors::DbResult;

/// Keyed storage for [`Redemption`] records.
#[async_trait]
pub trait RedemptionDb {
    /// Gets, if present, the redemption requested in the given L2 transaction.
    async fn get_redemption(&self, id: &RedemptionId) -> DbResult<Option<Redemption>>;

    /// Inserts a new redemption, failing if one with the same id is already stored.
    async fn create_redemption(&self, redemption: &Redemption) -> DbResult<()>;

    /// Replaces a stored redemption.
    async fn update_redemption(&self, redemption: &Redemption) -> DbResult<()>;

    /// Gets every redemption for `chain` currently in `status`.
    async fn get_redemptions_by_status(
        &self,
        chain: &ChainName,
        status: RedemptionStatus,
    ) -> DbResult<Vec<Redemption>>;

    /// Deletes `COMPLETED` and `FAILED` redemptions whose last activity precedes `cutoff`.
    ///
    /// Returns the number of deleted records.
    async fn delete_settled_redemptions_before(&self, cutoff: Timestamp) -> DbResult<u64>;
}
