//! The redemption record.
//!
//! A redemption is created when the L2 redeemer emits a redemption request. The relayer then
//! fetches the attestation for that L2 transaction and submits it to the L1 redemption handler.

use std::fmt;

use alloy_primitives::{Bytes, FixedBytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    chain::ChainName,
    errors::RecordError,
    types::{set_once, Timestamp},
};

/// A redemption is keyed by the hash of the L2 transaction that requested it.
pub type RedemptionId = B256;

/// The custody wallet's main UTXO at the time of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainUtxo {
    /// Hash of the transaction that created the UTXO.
    pub tx_hash: B256,
    /// Output index within that transaction.
    pub output_index: u32,
    /// Value in satoshis.
    pub value: u64,
}

/// The parameters of a redemption request as emitted on the L2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionRequest {
    /// HASH160 of the custody wallet that should pay out.
    pub wallet_pub_key_hash: FixedBytes<20>,
    /// The wallet's main UTXO.
    pub main_utxo: MainUtxo,
    /// Script the redeemed coins are paid to.
    pub redeemer_output_script: Bytes,
    /// Amount of wrapped tokens burned.
    pub amount: U256,
}

/// Lifecycle status of a redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedemptionStatus {
    /// Waiting for its attestation.
    Pending,
    /// Attestation fetched and verified, waiting for L1 submission.
    VaaFetched,
    /// The last attestation fetch failed; eligible for retry.
    VaaFailed,
    /// Submitted to the L1 redemption handler successfully.
    Completed,
    /// L1 submission failed or was rejected.
    Failed,
}

impl RedemptionStatus {
    /// Every status.
    pub const ALL: [RedemptionStatus; 5] = [
        RedemptionStatus::Pending,
        RedemptionStatus::VaaFetched,
        RedemptionStatus::VaaFailed,
        RedemptionStatus::Completed,
        RedemptionStatus::Failed,
    ];

    /// Whether `self → next` is an allowed edge.
    pub const fn can_transition_to(self, next: RedemptionStatus) -> bool {
        use RedemptionStatus::*;

        matches!(
            (self, next),
            (Pending, VaaFetched)
                | (Pending, VaaFailed)
                | (VaaFailed, Pending)
                | (VaaFetched, Completed)
                | (VaaFetched, Failed)
        )
    }

    /// Whether no further transition is possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, RedemptionStatus::Completed | RedemptionStatus::Failed)
    }

    /// The persisted name of the status.
    pub const fn as_str(self) -> &'static str {
        match self {
            RedemptionStatus::Pending => "PENDING",
            RedemptionStatus::VaaFetched => "VAA_FETCHED",
            RedemptionStatus::VaaFailed => "VAA_FAILED",
            RedemptionStatus::Completed => "COMPLETED",
            RedemptionStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of the attestation attached to a redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VaaStatus {
    /// Not fetched yet.
    Pending,
    /// Fetched and verified.
    Fetched,
    /// Fetching or verification failed.
    Failed,
}

/// When each phase of a redemption happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionDates {
    /// Observation of the L2 request.
    pub created_at: Timestamp,
    /// Attestation fetched.
    pub vaa_fetched_at: Option<Timestamp>,
    /// Submitted on L1.
    pub l1_submitted_at: Option<Timestamp>,
    /// Reached a terminal status.
    pub completed_at: Option<Timestamp>,
    /// Most recent mutation of any kind.
    pub last_activity_at: Timestamp,
}

/// A redemption tracked by the relayer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    /// Hash of the L2 request transaction.
    pub id: RedemptionId,
    /// The L2 the request originated on.
    pub chain: ChainName,
    /// The request parameters.
    pub request: RedemptionRequest,
    /// The verified attestation, once fetched.
    pub vaa_bytes: Option<Bytes>,
    /// Attestation status.
    pub vaa_status: VaaStatus,
    /// The L1 submission transaction.
    pub l1_submission_tx_hash: Option<B256>,
    /// Current lifecycle status.
    pub status: RedemptionStatus,
    /// Per-phase timestamps.
    pub dates: RedemptionDates,
    /// Human-readable history, newest last.
    pub logs: Vec<String>,
    /// The most recent failure.
    pub error: Option<String>,
}

impl Redemption {
    /// Creates a `PENDING` redemption.
    pub fn new(
        id: RedemptionId,
        chain: ChainName,
        request: RedemptionRequest,
        now: Timestamp,
    ) -> Self {
        let mut redemption = Self {
            id,
            chain,
            request,
            vaa_bytes: None,
            vaa_status: VaaStatus::Pending,
            l1_submission_tx_hash: None,
            status: RedemptionStatus::Pending,
            dates: RedemptionDates {
                created_at: now,
                vaa_fetched_at: None,
                l1_submitted_at: None,
                completed_at: None,
                last_activity_at: now,
            },
            logs: Vec::new(),
            error: None,
        };
        redemption.log(format!("redemption request observed in {id}"), now);
        redemption
    }

    /// Appends a line to the redemption's history.
    pub fn log(&mut self, line: impl Into<String>, now: Timestamp) {
        self.logs.push(format!("{}: {}", now.to_rfc3339(), line.into()));
        self.dates.last_activity_at = now;
    }

    /// Records a verified attestation.
    pub fn record_vaa(&mut self, vaa_bytes: Bytes, now: Timestamp) -> Result<(), RecordError> {
        self.transition(RedemptionStatus::VaaFetched)?;
        set_once(&mut self.vaa_bytes, vaa_bytes, "vaa_bytes")?;
        self.status = RedemptionStatus::VaaFetched;
        self.vaa_status = VaaStatus::Fetched;
        self.dates.vaa_fetched_at = Some(now);
        self.error = None;
        self.log("attestation fetched and verified", now);
        Ok(())
    }

    /// Records a failed attestation fetch.
    pub fn record_vaa_failure(
        &mut self,
        reason: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), RecordError> {
        self.transition(RedemptionStatus::VaaFailed)?;
        let reason = reason.into();
        self.status = RedemptionStatus::VaaFailed;
        self.vaa_status = VaaStatus::Failed;
        self.log(format!("attestation fetch failed: {reason}"), now);
        self.error = Some(reason);
        Ok(())
    }

    /// Moves a `VAA_FAILED` redemption back to `PENDING` so the next pass retries it.
    pub fn retry(&mut self, now: Timestamp) -> Result<(), RecordError> {
        self.transition(RedemptionStatus::Pending)?;
        self.status = RedemptionStatus::Pending;
        self.vaa_status = VaaStatus::Pending;
        self.log("retrying attestation fetch", now);
        Ok(())
    }

    /// Records a successful L1 submission.
    pub fn record_completed(&mut self, tx_hash: B256, now: Timestamp) -> Result<(), RecordError> {
        self.transition(RedemptionStatus::Completed)?;
        set_once(
            &mut self.l1_submission_tx_hash,
            tx_hash,
            "l1_submission_tx_hash",
        )?;
        self.status = RedemptionStatus::Completed;
        self.dates.l1_submitted_at = Some(now);
        self.dates.completed_at = Some(now);
        self.error = None;
        self.log(format!("submitted on L1 in {tx_hash}"), now);
        Ok(())
    }

    /// Records a failed L1 submission. A mined-but-reverted transaction hash is kept if known.
    pub fn record_failed(
        &mut self,
        reason: impl Into<String>,
        tx_hash: Option<B256>,
        now: Timestamp,
    ) -> Result<(), RecordError> {
        self.transition(RedemptionStatus::Failed)?;
        if let Some(tx_hash) = tx_hash {
            set_once(
                &mut self.l1_submission_tx_hash,
                tx_hash,
                "l1_submission_tx_hash",
            )?;
            self.dates.l1_submitted_at = Some(now);
        }
        let reason = reason.into();
        self.status = RedemptionStatus::Failed;
        self.dates.completed_at = Some(now);
        self.log(format!("L1 submission failed: {reason}"), now);
        self.error = Some(reason);
        Ok(())
    }

    fn transition(&self, next: RedemptionStatus) -> Result<(), RecordError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(RecordError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            })
        }
    }
}
