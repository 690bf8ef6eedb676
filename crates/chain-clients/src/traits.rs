//! The capabilities the relay state machines need from each chain.

use std::fmt::Debug;

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use tbtc_relayer_primitives::{
    deposit::{DepositId, FundingTx, RevealInfo},
    types::BlockHeight,
};

use crate::{
    errors::ClientResult,
    types::{BridgeEvent, OnChainDepositState, RedemptionRequestedEvent, TxReceipt},
};

/// Read access to a chain's blocks and receipts.
#[async_trait]
pub trait ChainReader: Debug + Send + Sync {
    /// Current head height.
    async fn block_number(&self) -> ClientResult<BlockHeight>;

    /// Gets, if mined, the receipt of `tx_hash`.
    async fn transaction_receipt(&self, tx_hash: B256) -> ClientResult<Option<TxReceipt>>;
}

/// The L1 depositor contract of one destination chain, with a signer attached.
#[async_trait]
pub trait L1BitcoinDepositor: ChainReader {
    /// Address of the signer that pays for submissions.
    fn signer_address(&self) -> Address;

    /// Reads the contract's record of the deposit.
    async fn deposit_state(&self, id: DepositId) -> ClientResult<OnChainDepositState>;

    /// Submits `initializeDeposit` and waits for the receipt.
    ///
    /// A mined-but-reverted transaction is returned as a receipt with `success == false`.
    async fn initialize_deposit(
        &self,
        funding_tx: &FundingTx,
        reveal: &RevealInfo,
        owner: B256,
    ) -> ClientResult<TxReceipt>;

    /// The fee, in wei, that must accompany `finalizeDeposit`.
    async fn quote_finalize_deposit(&self) -> ClientResult<U256>;

    /// Estimated gas cost, in wei, of `finalizeDeposit(id)` sent with `value`.
    async fn estimate_finalize_deposit_cost(&self, id: DepositId, value: U256)
        -> ClientResult<U256>;

    /// The signer's balance in wei.
    async fn signer_balance(&self) -> ClientResult<U256>;

    /// Submits `finalizeDeposit` with `value` attached and waits for the receipt.
    async fn finalize_deposit(&self, id: DepositId, value: U256) -> ClientResult<TxReceipt>;

    /// The transaction, mined in `[from_block, to_block]`, that moved the deposit into `state`.
    ///
    /// Looks up the `DepositInitialized` or `DepositFinalized` event by its indexed deposit key.
    /// [`OnChainDepositState::Unknown`] has no such transaction.
    async fn deposit_transaction(
        &self,
        id: DepositId,
        state: OnChainDepositState,
        from_block: BlockHeight,
        to_block: BlockHeight,
    ) -> ClientResult<Option<B256>>;

    /// Bridging events emitted in `[from_block, to_block]`.
    async fn bridge_events(
        &self,
        from_block: BlockHeight,
        to_block: BlockHeight,
    ) -> ClientResult<Vec<BridgeEvent>>;
}

/// The vault that finalizes optimistic mints.
#[async_trait]
pub trait TbtcVault: Debug + Send + Sync {
    /// Whether an optimistic mint for `id` was finalized in `[from_block, head]`.
    async fn optimistic_minting_finalized(
        &self,
        id: DepositId,
        from_block: BlockHeight,
    ) -> ClientResult<bool>;
}

/// The L2 contract that emits redemption requests.
#[async_trait]
pub trait L2RedemptionSource: ChainReader {
    /// Redemption requests emitted in `[from_block, to_block]`.
    async fn redemption_requests(
        &self,
        from_block: BlockHeight,
        to_block: BlockHeight,
    ) -> ClientResult<Vec<RedemptionRequestedEvent>>;
}

/// The L1 contract that settles L2 redemptions.
#[async_trait]
pub trait L1RedemptionHandler: Debug + Send + Sync {
    /// Submits a verified attestation and waits for the receipt.
    async fn submit_redemption_vaa(&self, vaa_bytes: &Bytes) -> ClientResult<TxReceipt>;
}

/// A token bridge that records completed cross-chain transfers.
#[async_trait]
pub trait TokenBridge: Debug + Send + Sync {
    /// Whether the transfer attested by the VAA with digest `vaa_hash` has been redeemed.
    async fn is_transfer_completed(&self, vaa_hash: B256) -> ClientResult<bool>;
}
