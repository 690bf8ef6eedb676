//! Types for the RPC server.

use alloy_primitives::{Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use tbtc_relayer_primitives::prelude::{
    BridgeLeg, ChainName, Deposit, DepositId, DepositStatus, Redemption, RedemptionId,
    RedemptionStatus, Timestamp, VaaStatus,
};

/// Status of a tracked deposit as exposed over RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcDepositInfo {
    /// The deposit key.
    pub deposit_id: DepositId,

    /// Destination chain.
    pub chain: ChainName,

    /// Current lifecycle status.
    pub status: DepositStatus,

    /// Bitcoin funding transaction, in display byte order.
    pub funding_txid: String,

    /// Output of the funding transaction holding the deposit.
    pub funding_output_index: u32,

    /// `initializeDeposit` transaction on the L1.
    pub initialize_tx_hash: Option<B256>,

    /// `finalizeDeposit` transaction on the L1.
    pub finalize_tx_hash: Option<B256>,

    /// How the minted tokens reached the destination chain, once they did.
    pub bridge: Option<BridgeLeg>,

    /// When the deposit was first revealed.
    pub created_at: Timestamp,

    /// Most recent change of any kind.
    pub last_activity_at: Timestamp,

    /// The most recent failure, if any.
    pub error: Option<String>,
}

impl From<Deposit> for RpcDepositInfo {
    fn from(deposit: Deposit) -> Self {
        Self {
            deposit_id: deposit.id,
            chain: deposit.chain,
            status: deposit.status,
            funding_txid: deposit.hashes.btc.funding_txid.to_string(),
            funding_output_index: deposit.reveal.funding_output_index,
            initialize_tx_hash: deposit.hashes.eth.initialize_tx_hash,
            finalize_tx_hash: deposit.hashes.eth.finalize_tx_hash,
            bridge: deposit.hashes.bridge,
            created_at: deposit.dates.created_at,
            last_activity_at: deposit.dates.last_activity_at,
            error: deposit.error,
        }
    }
}

/// Status of a tracked redemption as exposed over RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcRedemptionInfo {
    /// Hash of the L2 request transaction.
    pub l2_tx_hash: RedemptionId,

    /// The L2 the request originated on.
    pub chain: ChainName,

    /// Current lifecycle status.
    pub status: RedemptionStatus,

    /// Attestation status.
    pub vaa_status: VaaStatus,

    /// Redeemed amount.
    pub amount: U256,

    /// Bitcoin output script the redeemer is paid to.
    pub redeemer_output_script: Bytes,

    /// The L1 settlement transaction.
    pub l1_submission_tx_hash: Option<B256>,

    /// When the request was first observed.
    pub created_at: Timestamp,

    /// When the redemption reached a terminal status.
    pub completed_at: Option<Timestamp>,

    /// The most recent failure, if any.
    pub error: Option<String>,

    /// Human-readable history, newest last.
    pub logs: Vec<String>,
}

impl From<Redemption> for RpcRedemptionInfo {
    fn from(redemption: Redemption) -> Self {
        Self {
            l2_tx_hash: redemption.id,
            chain: redemption.chain,
            status: redemption.status,
            vaa_status: redemption.vaa_status,
            amount: redemption.request.amount,
            redeemer_output_script: redemption.request.redeemer_output_script,
            l1_submission_tx_hash: redemption.l1_submission_tx_hash,
            created_at: redemption.dates.created_at,
            completed_at: redemption.dates.completed_at,
            error: redemption.error,
            logs: redemption.logs,
        }
    }
}
