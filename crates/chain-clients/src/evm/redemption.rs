//! Contracts on both ends of the redemption flow.

use std::fmt;

use alloy::{
    primitives::{Address, Bytes, B256},
    providers::Provider,
};
use async_trait::async_trait;
use tbtc_relayer_primitives::types::BlockHeight;
use tracing::{info, warn};

use super::{
    contracts::{IL1BTCRedeemer, IL2BTCRedeemer},
    reader, timed, to_tx_receipt, EvmTimeouts,
};
use crate::{
    errors::ClientResult,
    traits::{ChainReader, L1RedemptionHandler, L2RedemptionSource},
    types::{RedemptionRequestedEvent, TxReceipt},
};

/// Reads redemption requests from an L2 redeemer contract.
#[derive(Clone)]
pub struct EvmL2RedemptionSource<P> {
    provider: P,
    redeemer: Address,
    timeouts: EvmTimeouts,
}

impl<P> EvmL2RedemptionSource<P> {
    /// Creates a client for the L2 redeemer at `redeemer`.
    pub const fn new(provider: P, redeemer: Address, timeouts: EvmTimeouts) -> Self {
        Self {
            provider,
            redeemer,
            timeouts,
        }
    }
}

impl<P> fmt::Debug for EvmL2RedemptionSource<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmL2RedemptionSource")
            .field("redeemer", &self.redeemer)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<P> ChainReader for EvmL2RedemptionSource<P>
where
    P: Provider + Send + Sync,
{
    async fn block_number(&self) -> ClientResult<BlockHeight> {
        reader::block_number(&self.provider, &self.timeouts).await
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> ClientResult<Option<TxReceipt>> {
        reader::transaction_receipt(&self.provider, &self.timeouts, tx_hash).await
    }
}

#[async_trait]
impl<P> L2RedemptionSource for EvmL2RedemptionSource<P>
where
    P: Provider + Send + Sync,
{
    async fn redemption_requests(
        &self,
        from_block: BlockHeight,
        to_block: BlockHeight,
    ) -> ClientResult<Vec<RedemptionRequestedEvent>> {
        let redeemer = IL2BTCRedeemer::new(self.redeemer, &self.provider);

        let logs = timed(
            "RedemptionRequestedOnL2 logs",
            self.timeouts.call,
            redeemer
                .RedemptionRequestedOnL2_filter()
                .from_block(from_block)
                .to_block(to_block)
                .query(),
        )
        .await?;

        Ok(logs
            .into_iter()
            .filter_map(|(event, log)| {
                let (Some(l2_tx_hash), Some(block_number)) = (log.transaction_hash, log.block_number)
                else {
                    warn!(?log, "skipping redemption log without inclusion data");
                    return None;
                };

                Some(RedemptionRequestedEvent {
                    l2_tx_hash,
                    block_number,
                    wallet_pub_key_hash: event.walletPubKeyHash,
                    main_utxo_tx_hash: event.mainUtxoTxHash,
                    main_utxo_output_index: event.mainUtxoOutputIndex,
                    main_utxo_value: event.mainUtxoValue,
                    redeemer_output_script: event.redeemerOutputScript,
                    amount: event.amount,
                })
            })
            .collect())
    }
}

/// Signer-backed client for the L1 contract that settles L2 redemptions.
#[derive(Clone)]
pub struct EvmL1RedemptionHandler<P> {
    provider: P,
    handler: Address,
    timeouts: EvmTimeouts,
}

impl<P> EvmL1RedemptionHandler<P> {
    /// Creates a client for the redemption handler at `handler`.
    pub const fn new(provider: P, handler: Address, timeouts: EvmTimeouts) -> Self {
        Self {
            provider,
            handler,
            timeouts,
        }
    }
}

impl<P> fmt::Debug for EvmL1RedemptionHandler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmL1RedemptionHandler")
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<P> L1RedemptionHandler for EvmL1RedemptionHandler<P>
where
    P: Provider + Send + Sync,
{
    async fn submit_redemption_vaa(&self, vaa_bytes: &Bytes) -> ClientResult<TxReceipt> {
        let handler = IL1BTCRedeemer::new(self.handler, &self.provider);

        let call = handler.finalizeL2Redemption(vaa_bytes.clone());
        let pending = timed("finalizeL2Redemption", self.timeouts.call, call.send()).await?;
        info!(tx_hash = %pending.tx_hash(), "finalizeL2Redemption sent, waiting for receipt");

        let receipt = timed(
            "finalizeL2Redemption receipt",
            self.timeouts.transaction,
            pending.get_receipt(),
        )
        .await?;

        Ok(to_tx_receipt(&receipt))
    }
}
