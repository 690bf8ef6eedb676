//! The vault's optimistic minting log.

use std::fmt;

use alloy::{
    primitives::Address,
    providers::Provider,
    rpc::types::Filter,
    sol_types::SolEvent,
};
use async_trait::async_trait;
use tbtc_relayer_primitives::{deposit::DepositId, types::BlockHeight};
use tracing::debug;

use super::{contracts::ITBTCVault::OptimisticMintingFinalized, timed, EvmTimeouts};
use crate::{errors::ClientResult, traits::TbtcVault};

/// Reads `OptimisticMintingFinalized` logs of the vault.
#[derive(Clone)]
pub struct EvmTbtcVault<P> {
    provider: P,
    address: Address,
    timeouts: EvmTimeouts,
}

impl<P> EvmTbtcVault<P> {
    /// Creates a client for the vault at `address`.
    pub const fn new(provider: P, address: Address, timeouts: EvmTimeouts) -> Self {
        Self {
            provider,
            address,
            timeouts,
        }
    }
}

impl<P> fmt::Debug for EvmTbtcVault<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmTbtcVault")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<P> TbtcVault for EvmTbtcVault<P>
where
    P: Provider + Send + Sync,
{
    async fn optimistic_minting_finalized(
        &self,
        id: DepositId,
        from_block: BlockHeight,
    ) -> ClientResult<bool> {
        let filter = Filter::new()
            .address(self.address)
            .event_signature(OptimisticMintingFinalized::SIGNATURE_HASH)
            .topic2(id.key())
            .from_block(from_block);

        let logs = timed(
            "OptimisticMintingFinalized logs",
            self.timeouts.call,
            self.provider.get_logs(&filter),
        )
        .await?;

        debug!(deposit_id = %id, %from_block, matches = logs.len(), "queried optimistic mint logs");

        Ok(!logs.is_empty())
    }
}
