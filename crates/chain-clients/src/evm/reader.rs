//! Read-only access to an EVM chain.

use std::fmt;

use alloy::{primitives::B256, providers::Provider};
use async_trait::async_trait;
use tbtc_relayer_primitives::types::BlockHeight;

use super::{timed, to_tx_receipt, EvmTimeouts};
use crate::{errors::ClientResult, traits::ChainReader, types::TxReceipt};

/// Reads blocks and receipts through a provider.
#[derive(Clone)]
pub struct EvmReader<P> {
    provider: P,
    timeouts: EvmTimeouts,
}

impl<P> EvmReader<P> {
    /// Creates a reader over `provider`.
    pub const fn new(provider: P, timeouts: EvmTimeouts) -> Self {
        Self { provider, timeouts }
    }
}

impl<P> fmt::Debug for EvmReader<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmReader")
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

pub(super) async fn block_number<P: Provider>(
    provider: &P,
    timeouts: &EvmTimeouts,
) -> ClientResult<BlockHeight> {
    timed("eth_blockNumber", timeouts.call, provider.get_block_number()).await
}

pub(super) async fn transaction_receipt<P: Provider>(
    provider: &P,
    timeouts: &EvmTimeouts,
    tx_hash: B256,
) -> ClientResult<Option<TxReceipt>> {
    let receipt = timed(
        "eth_getTransactionReceipt",
        timeouts.call,
        provider.get_transaction_receipt(tx_hash),
    )
    .await?;

    Ok(receipt.as_ref().map(to_tx_receipt))
}

#[async_trait]
impl<P> ChainReader for EvmReader<P>
where
    P: Provider + Send + Sync,
{
    async fn block_number(&self) -> ClientResult<BlockHeight> {
        block_number(&self.provider, &self.timeouts).await
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> ClientResult<Option<TxReceipt>> {
        transaction_receipt(&self.provider, &self.timeouts, tx_hash).await
    }
}
