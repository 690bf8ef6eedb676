//! The L1 depositor contract of one destination chain.

use std::fmt;

use alloy::{
    primitives::{Address, B256, U256},
    providers::Provider,
    rpc::types::Log,
};
use async_trait::async_trait;
use tbtc_relayer_primitives::{
    deposit::{DepositId, FundingTx, RevealInfo},
    types::BlockHeight,
};
use tracing::{info, warn};

use super::{
    contracts::{IL1BitcoinDepositor, IStarkNetBitcoinDepositor},
    reader, timed, to_tx_receipt, EvmTimeouts,
};
use crate::{
    errors::{ChainClientError, ClientResult},
    traits::{ChainReader, L1BitcoinDepositor},
    types::{BridgeEvent, OnChainDepositState, TxReceipt},
};

/// Which bridging event the depositor emits once tokens leave L1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeEventAbi {
    /// `DepositBridged(uint256 indexed depositKey, bytes32 indexed l2Recipient, uint256, uint256)`.
    Evm,
    /// `TBTCBridgedToStarkNet(bytes32 indexed, uint256 indexed, uint256, uint256)`.
    Starknet,
    /// No bridging event; bridging is confirmed by attestation instead.
    Attested,
}

/// Signer-backed client for an L1 depositor.
#[derive(Clone)]
pub struct EvmDepositorClient<P> {
    provider: P,
    depositor: Address,
    signer: Address,
    bridge_event_abi: BridgeEventAbi,
    timeouts: EvmTimeouts,
}

impl<P> EvmDepositorClient<P> {
    /// Creates a client for the depositor at `depositor`.
    ///
    /// `provider` must carry a wallet whose default signer is `signer`.
    pub const fn new(
        provider: P,
        depositor: Address,
        signer: Address,
        bridge_event_abi: BridgeEventAbi,
        timeouts: EvmTimeouts,
    ) -> Self {
        Self {
            provider,
            depositor,
            signer,
            bridge_event_abi,
            timeouts,
        }
    }
}

impl<P> fmt::Debug for EvmDepositorClient<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmDepositorClient")
            .field("depositor", &self.depositor)
            .field("signer", &self.signer)
            .field("bridge_event_abi", &self.bridge_event_abi)
            .finish_non_exhaustive()
    }
}

/// Extracts the inclusion data of a log, skipping logs of pending blocks.
fn inclusion(log: &Log) -> Option<(B256, BlockHeight)> {
    match (log.transaction_hash, log.block_number) {
        (Some(tx_hash), Some(block_number)) => Some((tx_hash, block_number)),
        _ => {
            warn!(?log, "skipping depositor log without inclusion data");
            None
        }
    }
}

#[async_trait]
impl<P> ChainReader for EvmDepositorClient<P>
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
impl<P> L1BitcoinDepositor for EvmDepositorClient<P>
where
    P: Provider + Send + Sync,
{
    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn deposit_state(&self, id: DepositId) -> ClientResult<OnChainDepositState> {
        let depositor = IL1BitcoinDepositor::new(self.depositor, &self.provider);

        let state = timed(
            "deposits",
            self.timeouts.call,
            depositor.deposits(id.key()).call(),
        )
        .await?
        .state;

        OnChainDepositState::try_from(state).map_err(|state| ChainClientError::UnexpectedResponse {
            call: "deposits",
            detail: format!("unknown deposit state {state}"),
        })
    }

    async fn initialize_deposit(
        &self,
        funding_tx: &FundingTx,
        reveal: &RevealInfo,
        owner: B256,
    ) -> ClientResult<TxReceipt> {
        let depositor = IL1BitcoinDepositor::new(self.depositor, &self.provider);

        let funding_tx = IL1BitcoinDepositor::BitcoinTxInfo {
            version: funding_tx.version,
            inputVector: funding_tx.input_vector.clone(),
            outputVector: funding_tx.output_vector.clone(),
            locktime: funding_tx.locktime,
        };
        let reveal = IL1BitcoinDepositor::DepositRevealInfo {
            fundingOutputIndex: reveal.funding_output_index,
            blindingFactor: reveal.blinding_factor,
            walletPubKeyHash: reveal.wallet_pub_key_hash,
            refundPubKeyHash: reveal.refund_pub_key_hash,
            refundLocktime: reveal.refund_locktime,
            vault: reveal.vault,
        };

        let call = depositor.initializeDeposit(funding_tx, reveal, owner);
        let pending = timed("initializeDeposit", self.timeouts.call, call.send()).await?;
        info!(tx_hash = %pending.tx_hash(), "initializeDeposit sent, waiting for receipt");

        let receipt = timed(
            "initializeDeposit receipt",
            self.timeouts.transaction,
            pending.get_receipt(),
        )
        .await?;

        Ok(to_tx_receipt(&receipt))
    }

    async fn quote_finalize_deposit(&self) -> ClientResult<U256> {
        let depositor = IL1BitcoinDepositor::new(self.depositor, &self.provider);

        let cost = timed(
            "quoteFinalizeDeposit",
            self.timeouts.call,
            depositor.quoteFinalizeDeposit().call(),
        )
        .await?
        .cost;

        Ok(cost)
    }

    async fn estimate_finalize_deposit_cost(
        &self,
        id: DepositId,
        value: U256,
    ) -> ClientResult<U256> {
        let depositor = IL1BitcoinDepositor::new(self.depositor, &self.provider);

        let gas = timed(
            "estimateGas(finalizeDeposit)",
            self.timeouts.call,
            depositor
                .finalizeDeposit(id.key())
                .value(value)
                .from(self.signer)
                .estimate_gas(),
        )
        .await?;
        let gas_price = timed("eth_gasPrice", self.timeouts.call, self.provider.get_gas_price()).await?;

        Ok(U256::from(gas) * U256::from(gas_price))
    }

    async fn signer_balance(&self) -> ClientResult<U256> {
        timed(
            "eth_getBalance",
            self.timeouts.call,
            self.provider.get_balance(self.signer),
        )
        .await
    }

    async fn finalize_deposit(&self, id: DepositId, value: U256) -> ClientResult<TxReceipt> {
        let depositor = IL1BitcoinDepositor::new(self.depositor, &self.provider);

        let call = depositor.finalizeDeposit(id.key()).value(value);
        let pending = timed("finalizeDeposit", self.timeouts.call, call.send()).await?;
        info!(tx_hash = %pending.tx_hash(), deposit_id = %id, "finalizeDeposit sent, waiting for receipt");

        let receipt = timed(
            "finalizeDeposit receipt",
            self.timeouts.transaction,
            pending.get_receipt(),
        )
        .await?;

        Ok(to_tx_receipt(&receipt))
    }

    async fn deposit_transaction(
        &self,
        id: DepositId,
        state: OnChainDepositState,
        from_block: BlockHeight,
        to_block: BlockHeight,
    ) -> ClientResult<Option<B256>> {
        let depositor = IL1BitcoinDepositor::new(self.depositor, &self.provider);

        let logs = match state {
            OnChainDepositState::Unknown => return Ok(None),
            OnChainDepositState::Initialized => timed(
                "DepositInitialized logs",
                self.timeouts.call,
                depositor
                    .DepositInitialized_filter()
                    .topic1(id.to_b256())
                    .from_block(from_block)
                    .to_block(to_block)
                    .query(),
            )
            .await?
            .into_iter()
            .map(|(_, log)| log)
            .collect::<Vec<_>>(),
            OnChainDepositState::Finalized => timed(
                "DepositFinalized logs",
                self.timeouts.call,
                depositor
                    .DepositFinalized_filter()
                    .topic1(id.to_b256())
                    .from_block(from_block)
                    .to_block(to_block)
                    .query(),
            )
            .await?
            .into_iter()
            .map(|(_, log)| log)
            .collect::<Vec<_>>(),
        };

        // the contract emits each event once per deposit
        Ok(logs
            .iter()
            .rev()
            .find_map(inclusion)
            .map(|(tx_hash, _)| tx_hash))
    }

    async fn bridge_events(
        &self,
        from_block: BlockHeight,
        to_block: BlockHeight,
    ) -> ClientResult<Vec<BridgeEvent>> {
        match self.bridge_event_abi {
            BridgeEventAbi::Evm => {
                let depositor = IL1BitcoinDepositor::new(self.depositor, &self.provider);
                let logs = timed(
                    "DepositBridged logs",
                    self.timeouts.call,
                    depositor
                        .DepositBridged_filter()
                        .from_block(from_block)
                        .to_block(to_block)
                        .query(),
                )
                .await?;

                Ok(logs
                    .into_iter()
                    .filter_map(|(event, log)| {
                        let (l1_tx_hash, block_number) = inclusion(&log)?;
                        Some(BridgeEvent {
                            deposit_key: event.depositKey,
                            amount: event.amount,
                            l2_recipient: event.l2Recipient,
                            nonce: event.nonce,
                            l1_tx_hash,
                            block_number,
                        })
                    })
                    .collect())
            }
            BridgeEventAbi::Starknet => {
                let depositor = IStarkNetBitcoinDepositor::new(self.depositor, &self.provider);
                let logs = timed(
                    "TBTCBridgedToStarkNet logs",
                    self.timeouts.call,
                    depositor
                        .TBTCBridgedToStarkNet_filter()
                        .from_block(from_block)
                        .to_block(to_block)
                        .query(),
                )
                .await?;

                Ok(logs
                    .into_iter()
                    .filter_map(|(event, log)| {
                        let (l1_tx_hash, block_number) = inclusion(&log)?;
                        Some(BridgeEvent {
                            deposit_key: U256::from_be_bytes(event.depositKey.0),
                            amount: event.amount,
                            l2_recipient: B256::from(event.starkNetRecipient),
                            nonce: event.messageNonce,
                            l1_tx_hash,
                            block_number,
                        })
                    })
                    .collect())
            }
            BridgeEventAbi::Attested => Ok(Vec::new()),
        }
    }
}
