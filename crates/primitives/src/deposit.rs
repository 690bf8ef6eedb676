//! The deposit record and the pure logic that governs how it may change.
//!
//! A deposit is identified by a [`DepositId`] that is derived from the funding outpoint, so any
//! relayer instance (or any re-implementation) computes the same id for the same Bitcoin deposit.
//! The record only moves forward through [`DepositStatus`]; the write-once transaction hashes in
//! [`DepositHashes`] are the idempotency anchor for every phase.

use std::{fmt, str::FromStr};

use alloy_primitives::{keccak256, Address, Bytes, FixedBytes, B256, U256};
use bitcoin::{
    hashes::{sha256d, Hash, HashEngine},
    Txid,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    chain::ChainName,
    errors::{DepositIdError, RecordError},
    types::{set_once, Timestamp},
};

/// Deterministic identifier of a deposit.
///
/// Computed as `uint256(keccak256(fundingTxHash ‖ uint32_be(outputIndex)))` where `fundingTxHash`
/// is the funding transaction's hash in internal byte order. This is the same key the on-chain
/// depositor contracts use, so it doubles as the `depositKey` argument of every L1 call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepositId(U256);

impl DepositId {
    /// Derives the id of the deposit locked in output `output_index` of `funding_txid`.
    pub fn derive(funding_txid: &Txid, output_index: u32) -> Self {
        let mut preimage = [0u8; 36];
        preimage[..32].copy_from_slice(&funding_txid.to_byte_array());
        preimage[32..].copy_from_slice(&output_index.to_be_bytes());

        Self(U256::from_be_bytes(keccak256(preimage).0))
    }

    /// Wraps an already-computed deposit key, e.g. one read from a contract event.
    pub const fn from_key(key: U256) -> Self {
        Self(key)
    }

    /// Returns the id as the `uint256` deposit key.
    pub const fn key(&self) -> U256 {
        self.0
    }

    /// Returns the id as a 32-byte word, the form it takes in indexed event topics.
    pub fn to_b256(&self) -> B256 {
        B256::from(self.0.to_be_bytes::<32>())
    }
}

impl fmt::Display for DepositId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DepositId {
    type Err = DepositIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_str_radix(s, 10)
            .map(Self)
            .map_err(|_| DepositIdError::Malformed(s.to_string()))
    }
}

impl Serialize for DepositId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DepositId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The funding transaction, split into the pieces the L1 depositor contract expects.
///
/// Decoding a raw Bitcoin transaction into these parts is the job of the custody-ledger decoder
/// upstream of the relayer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingTx {
    /// Transaction version, little-endian as serialized.
    pub version: FixedBytes<4>,
    /// Serialized input vector including the compact-size count.
    pub input_vector: Bytes,
    /// Serialized output vector including the compact-size count.
    pub output_vector: Bytes,
    /// Transaction locktime, little-endian as serialized.
    pub locktime: FixedBytes<4>,
}

impl FundingTx {
    /// Computes the funding transaction's id from its legacy (witness-stripped) serialization.
    pub fn txid(&self) -> Txid {
        let mut engine = sha256d::Hash::engine();
        engine.input(self.version.as_slice());
        engine.input(&self.input_vector);
        engine.input(&self.output_vector);
        engine.input(self.locktime.as_slice());

        Txid::from_raw_hash(sha256d::Hash::from_engine(engine))
    }
}

/// The parameters a depositor reveals to prove knowledge of the deposit script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealInfo {
    /// Index of the deposit output in the funding transaction.
    pub funding_output_index: u32,
    /// 8-byte blinding factor of the deposit script.
    pub blinding_factor: FixedBytes<8>,
    /// HASH160 of the custody wallet's public key.
    pub wallet_pub_key_hash: FixedBytes<20>,
    /// HASH160 of the refund public key.
    pub refund_pub_key_hash: FixedBytes<20>,
    /// Refund locktime, little-endian as in the deposit script.
    pub refund_locktime: FixedBytes<4>,
    /// The vault the minted tokens are routed through.
    pub vault: Address,
}

/// Everything needed to start tracking a new deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositReveal {
    /// Destination chain the wrapped tokens should reach.
    pub chain: ChainName,
    /// The funding transaction.
    pub funding_tx: FundingTx,
    /// The revealed script parameters.
    pub reveal: RevealInfo,
    /// Recipient on the destination chain, in that chain's textual address format.
    pub owner: String,
}

impl DepositReveal {
    /// Returns the id the resulting deposit will have.
    pub fn deposit_id(&self) -> DepositId {
        DepositId::derive(&self.funding_tx.txid(), self.reveal.funding_output_index)
    }
}

/// Lifecycle status of a deposit.
///
/// The numeric [`code`](Self::code) and the serialized names are persisted and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositStatus {
    /// Revealed to the relayer, not yet initialized on L1.
    Queued,
    /// Initialized on the L1 depositor contract.
    Initialized,
    /// Finalized on the L1 depositor contract.
    Finalized,
    /// Minted tokens have reached the destination chain.
    Bridged,
    /// Finalized, waiting for a cross-chain attestation to confirm the bridge leg.
    AwaitingAttestation,
    /// Failed unrecoverably.
    Error,
}

impl DepositStatus {
    /// Every status, in code order.
    pub const ALL: [DepositStatus; 6] = [
        DepositStatus::Queued,
        DepositStatus::Initialized,
        DepositStatus::Finalized,
        DepositStatus::Bridged,
        DepositStatus::AwaitingAttestation,
        DepositStatus::Error,
    ];

    /// The stable numeric code of this status.
    pub const fn code(self) -> u8 {
        match self {
            DepositStatus::Queued => 0,
            DepositStatus::Initialized => 1,
            DepositStatus::Finalized => 2,
            DepositStatus::Bridged => 3,
            DepositStatus::AwaitingAttestation => 4,
            DepositStatus::Error => 5,
        }
    }

    /// Position in the lifecycle. [`DepositStatus::Error`] sits outside the ordering.
    pub const fn rank(self) -> Option<u8> {
        match self {
            DepositStatus::Queued => Some(0),
            DepositStatus::Initialized => Some(1),
            DepositStatus::Finalized => Some(2),
            DepositStatus::AwaitingAttestation => Some(3),
            DepositStatus::Bridged => Some(4),
            DepositStatus::Error => None,
        }
    }

    /// Whether no further transition is possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, DepositStatus::Bridged | DepositStatus::Error)
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    pub const fn can_advance_to(self, next: DepositStatus) -> bool {
        if self.is_terminal() {
            return false;
        }

        match (self.rank(), next.rank()) {
            (Some(current), Some(next)) => next > current,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// The persisted name of the status.
    pub const fn as_str(self) -> &'static str {
        match self {
            DepositStatus::Queued => "QUEUED",
            DepositStatus::Initialized => "INITIALIZED",
            DepositStatus::Finalized => "FINALIZED",
            DepositStatus::Bridged => "BRIDGED",
            DepositStatus::AwaitingAttestation => "AWAITING_ATTESTATION",
            DepositStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DepositStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DepositStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown deposit status: {s}"))
    }
}

/// Hashes on the custody ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtcHashes {
    /// The funding transaction that carries the revealed deposit.
    pub funding_txid: Txid,
}

/// Hashes of the transactions this relayer sent to the L1 depositor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthHashes {
    /// The `initializeDeposit` transaction.
    pub initialize_tx_hash: Option<B256>,
    /// The `finalizeDeposit` transaction.
    pub finalize_tx_hash: Option<B256>,
}

/// The bridge leg of a deposit, which differs per destination chain family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum BridgeLeg {
    /// Tokens forwarded to an EVM L2 by the depositor contract.
    Evm {
        /// The L1 transaction that emitted the bridging event.
        l1_bridge_tx_hash: B256,
        /// Recipient on the L2.
        l2_recipient: B256,
        /// Transfer amount in the token's smallest unit.
        amount: U256,
        /// Bridge-assigned transfer nonce.
        nonce: U256,
    },
    /// Tokens forwarded through the StarkNet messaging bridge.
    Starknet {
        /// The L1 transaction that emitted the bridging event.
        l1_bridge_tx_hash: B256,
        /// Recipient account on StarkNet.
        recipient: B256,
        /// Transfer amount in the token's smallest unit.
        amount: U256,
        /// L1→L2 message nonce.
        message_nonce: U256,
    },
    /// Tokens forwarded through the attestation protocol.
    Wormhole {
        /// The L1 transaction that published the transfer message.
        l1_bridge_tx_hash: B256,
        /// Sequence of the published message.
        sequence: u64,
        /// Digest of the attestation that proved the transfer.
        vaa_hash: B256,
    },
}

impl BridgeLeg {
    /// The L1 transaction that moved the tokens toward the destination chain.
    pub const fn l1_bridge_tx_hash(&self) -> B256 {
        match self {
            BridgeLeg::Evm {
                l1_bridge_tx_hash, ..
            }
            | BridgeLeg::Starknet {
                l1_bridge_tx_hash, ..
            }
            | BridgeLeg::Wormhole {
                l1_bridge_tx_hash, ..
            } => *l1_bridge_tx_hash,
        }
    }
}

/// Per-phase transaction hashes of a deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositHashes {
    /// Custody-ledger hashes.
    pub btc: BtcHashes,
    /// L1 depositor hashes.
    pub eth: EthHashes,
    /// The chain-family-specific bridge leg, once bridged.
    pub bridge: Option<BridgeLeg>,
}

/// When each phase of a deposit happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositDates {
    /// First observation of the reveal.
    pub created_at: Timestamp,
    /// L1 initialization.
    pub initialized_at: Option<Timestamp>,
    /// L1 finalization.
    pub finalized_at: Option<Timestamp>,
    /// Entered the attestation wait.
    pub awaiting_attestation_at: Option<Timestamp>,
    /// Bridge leg observed.
    pub bridged_at: Option<Timestamp>,
    /// Most recent mutation of any kind.
    pub last_activity_at: Timestamp,
}

/// A deposit tracked by the relayer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    /// Deterministic id.
    pub id: DepositId,
    /// Destination chain.
    pub chain: ChainName,
    /// The funding transaction.
    pub funding_tx: FundingTx,
    /// The revealed script parameters.
    pub reveal: RevealInfo,
    /// Recipient on the destination chain, as revealed.
    pub owner: String,
    /// Current lifecycle status.
    pub status: DepositStatus,
    /// Per-phase hashes.
    pub hashes: DepositHashes,
    /// Per-phase timestamps.
    pub dates: DepositDates,
    /// The most recent failure, cleared on the next successful transition.
    pub error: Option<String>,
}

impl Deposit {
    /// Creates a `QUEUED` deposit from a reveal.
    pub fn from_reveal(reveal: DepositReveal, now: Timestamp) -> Self {
        let funding_txid = reveal.funding_tx.txid();
        let id = DepositId::derive(&funding_txid, reveal.reveal.funding_output_index);

        Self {
            id,
            chain: reveal.chain,
            funding_tx: reveal.funding_tx,
            reveal: reveal.reveal,
            owner: reveal.owner,
            status: DepositStatus::Queued,
            hashes: DepositHashes {
                btc: BtcHashes { funding_txid },
                eth: EthHashes::default(),
                bridge: None,
            },
            dates: DepositDates {
                created_at: now,
                initialized_at: None,
                finalized_at: None,
                awaiting_attestation_at: None,
                bridged_at: None,
                last_activity_at: now,
            },
            error: None,
        }
    }

    /// Moves the deposit to `next`, stamping the matching phase date.
    pub fn advance(&mut self, next: DepositStatus, now: Timestamp) -> Result<(), RecordError> {
        if !self.status.can_advance_to(next) {
            return Err(RecordError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        match next {
            DepositStatus::Initialized => self.dates.initialized_at = Some(now),
            DepositStatus::Finalized => self.dates.finalized_at = Some(now),
            DepositStatus::AwaitingAttestation => self.dates.awaiting_attestation_at = Some(now),
            DepositStatus::Bridged => self.dates.bridged_at = Some(now),
            DepositStatus::Queued | DepositStatus::Error => {}
        }

        self.status = next;
        self.dates.last_activity_at = now;
        if next != DepositStatus::Error {
            self.error = None;
        }

        Ok(())
    }

    /// Records a successful `initializeDeposit` transaction.
    pub fn record_initialized(&mut self, tx_hash: B256, now: Timestamp) -> Result<(), RecordError> {
        self.ensure_can_advance(DepositStatus::Initialized)?;
        set_once(
            &mut self.hashes.eth.initialize_tx_hash,
            tx_hash,
            "hashes.eth.initialize_tx_hash",
        )?;
        self.advance(DepositStatus::Initialized, now)
    }

    /// Records a successful `finalizeDeposit` transaction, moving to `next` which is either
    /// [`DepositStatus::Finalized`] or [`DepositStatus::AwaitingAttestation`].
    pub fn record_finalized(
        &mut self,
        tx_hash: B256,
        next: DepositStatus,
        now: Timestamp,
    ) -> Result<(), RecordError> {
        self.ensure_can_advance(next)?;
        set_once(
            &mut self.hashes.eth.finalize_tx_hash,
            tx_hash,
            "hashes.eth.finalize_tx_hash",
        )?;
        self.advance(next, now)
    }

    /// Records the bridge leg and marks the deposit as bridged.
    pub fn record_bridged(&mut self, leg: BridgeLeg, now: Timestamp) -> Result<(), RecordError> {
        self.ensure_can_advance(DepositStatus::Bridged)?;
        set_once(&mut self.hashes.bridge, leg, "hashes.bridge")?;
        self.advance(DepositStatus::Bridged, now)
    }

    /// Records a failure without changing the status.
    pub fn record_error(&mut self, reason: impl Into<String>, now: Timestamp) {
        self.error = Some(reason.into());
        self.dates.last_activity_at = now;
    }

    /// Records an unrecoverable failure and moves the deposit to [`DepositStatus::Error`].
    pub fn mark_errored(
        &mut self,
        reason: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), RecordError> {
        self.advance(DepositStatus::Error, now)?;
        self.record_error(reason, now);
        Ok(())
    }

    fn ensure_can_advance(&self, next: DepositStatus) -> Result<(), RecordError> {
        if self.status.can_advance_to(next) {
            Ok(())
        } else {
            Err(RecordError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;

    use super::*;

    fn test_reveal() -> DepositReveal {
        DepositReveal {
            chain: ChainName::from("arbitrum"),
            funding_tx: FundingTx {
                version: FixedBytes::from([1, 0, 0, 0]),
                input_vector: Bytes::from(vec![0x01; 42]),
                output_vector: Bytes::from(vec![0x02; 33]),
                locktime: FixedBytes::ZERO,
            },
            reveal: RevealInfo {
                funding_output_index: 1,
                blinding_factor: FixedBytes::from([7u8; 8]),
                wallet_pub_key_hash: FixedBytes::from([3u8; 20]),
                refund_pub_key_hash: FixedBytes::from([4u8; 20]),
                refund_locktime: FixedBytes::from([0, 1, 2, 3]),
                vault: Address::repeat_byte(0x11),
            },
            owner: "0x1111111111111111111111111111111111111111".to_string(),
        }
    }

    #[test]
    fn deposit_id_is_recomputable_from_the_funding_outpoint() {
        let reveal = test_reveal();
        let deposit = Deposit::from_reveal(reveal.clone(), Utc::now());

        assert_eq!(deposit.id, reveal.deposit_id());
        assert_eq!(
            deposit.id,
            DepositId::derive(&deposit.hashes.btc.funding_txid, 1)
        );
        assert_ne!(
            deposit.id,
            DepositId::derive(&deposit.hashes.btc.funding_txid, 0),
            "the output index must be part of the id"
        );
    }

    #[test]
    fn deposit_id_serializes_as_decimal_string() {
        let id = DepositId::from_key(U256::from(1234567u64));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"1234567\"");

        let parsed: DepositId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
        assert!("0xabc".parse::<DepositId>().is_err());
    }

    #[test]
    fn status_codes_are_stable() {
        let codes: Vec<u8> = DepositStatus::ALL.iter().map(|s| s.code()).collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(
            serde_json::to_string(&DepositStatus::AwaitingAttestation).unwrap(),
            "\"AWAITING_ATTESTATION\""
        );
        assert_eq!(
            "BRIDGED".parse::<DepositStatus>().unwrap(),
            DepositStatus::Bridged
        );
    }

    #[test]
    fn hashes_are_write_once() {
        let now = Utc::now();
        let mut deposit = Deposit::from_reveal(test_reveal(), now);

        let first = B256::repeat_byte(0xaa);
        deposit.record_initialized(first, now).unwrap();
        assert_eq!(deposit.status, DepositStatus::Initialized);
        assert_eq!(deposit.hashes.eth.initialize_tx_hash, Some(first));

        // a second initialization can neither regress nor overwrite
        let err = deposit
            .record_initialized(B256::repeat_byte(0xbb), now)
            .unwrap_err();
        assert!(matches!(err, RecordError::InvalidTransition { .. }));
        assert_eq!(deposit.hashes.eth.initialize_tx_hash, Some(first));
    }

    #[test]
    fn bridged_and_error_are_terminal() {
        let now = Utc::now();
        let mut deposit = Deposit::from_reveal(test_reveal(), now);
        deposit
            .record_finalized(B256::repeat_byte(1), DepositStatus::Finalized, now)
            .unwrap();
        deposit
            .record_bridged(
                BridgeLeg::Evm {
                    l1_bridge_tx_hash: B256::repeat_byte(2),
                    l2_recipient: B256::repeat_byte(3),
                    amount: U256::from(10),
                    nonce: U256::from(1),
                },
                now,
            )
            .unwrap();

        assert!(deposit.mark_errored("late failure", now).is_err());
        assert_eq!(deposit.status, DepositStatus::Bridged);
        assert!(deposit.dates.bridged_at.is_some());
    }

    proptest! {
        #[test]
        fn advancing_never_lowers_rank(path in proptest::collection::vec(0usize..6, 1..12)) {
            let now = Utc::now();
            let mut deposit = Deposit::from_reveal(test_reveal(), now);
            let mut last_rank = deposit.status.rank();

            for idx in path {
                let next = DepositStatus::ALL[idx];
                if deposit.advance(next, now).is_ok() {
                    match (last_rank, deposit.status.rank()) {
                        (Some(prev), Some(cur)) => prop_assert!(cur > prev),
                        (Some(_), None) => {}
                        (None, _) => prop_assert!(false, "left a terminal error state"),
                    }
                    last_rank = deposit.status.rank();
                }
            }
        }

        #[test]
        fn deposit_id_display_parses_back(bytes in any::<[u8; 32]>(), index in any::<u32>()) {
            let txid = Txid::from_byte_array(bytes);
            let id = DepositId::derive(&txid, index);
            prop_assert_eq!(id.to_string().parse::<DepositId>().unwrap(), id);
            prop_assert_eq!(DepositId::derive(&txid, index), id);
        }
    }
}
