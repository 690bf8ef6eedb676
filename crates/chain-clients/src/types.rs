//! Chain-agnostic views of on-chain data.

use alloy::primitives::{Address, Bytes, FixedBytes, B256, U256};
use tbtc_relayer_primitives::types::BlockHeight;

/// A log emitted by a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// The emitting contract.
    pub address: Address,
    /// Indexed topics, the first being the event signature.
    pub topics: Vec<B256>,
    /// Non-indexed data.
    pub data: Bytes,
}

/// The outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    /// Hash of the transaction.
    pub tx_hash: B256,
    /// Block the transaction was included in.
    pub block_number: Option<BlockHeight>,
    /// Whether execution succeeded.
    pub success: bool,
    /// Logs emitted during execution.
    pub logs: Vec<LogEntry>,
}

/// The state of a deposit as recorded by the L1 depositor contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OnChainDepositState {
    /// The contract has never seen the deposit.
    Unknown,
    /// `initializeDeposit` succeeded.
    Initialized,
    /// `finalizeDeposit` succeeded.
    Finalized,
}

impl TryFrom<u8> for OnChainDepositState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OnChainDepositState::Unknown),
            1 => Ok(OnChainDepositState::Initialized),
            2 => Ok(OnChainDepositState::Finalized),
            other => Err(other),
        }
    }
}

/// Tokens forwarded from L1 to the destination chain for a deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeEvent {
    /// The deposit key.
    pub deposit_key: U256,
    /// Amount bridged.
    pub amount: U256,
    /// Recipient on the destination chain, left-padded to 32 bytes.
    pub l2_recipient: B256,
    /// Bridge-assigned nonce.
    pub nonce: U256,
    /// The L1 transaction that emitted the event.
    pub l1_tx_hash: B256,
    /// Block of that transaction.
    pub block_number: BlockHeight,
}

/// A redemption request emitted on an L2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionRequestedEvent {
    /// The L2 transaction that emitted the request.
    pub l2_tx_hash: B256,
    /// Block of that transaction.
    pub block_number: BlockHeight,
    /// HASH160 of the custody wallet.
    pub wallet_pub_key_hash: FixedBytes<20>,
    /// Main UTXO transaction hash.
    pub main_utxo_tx_hash: B256,
    /// Main UTXO output index.
    pub main_utxo_output_index: u32,
    /// Main UTXO value in satoshis.
    pub main_utxo_value: u64,
    /// Output script the redeemed coins go to.
    pub redeemer_output_script: Bytes,
    /// Amount burned.
    pub amount: U256,
}
