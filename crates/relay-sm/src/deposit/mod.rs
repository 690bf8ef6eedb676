//! The deposit state machine.
//!
//! A deposit moves `QUEUED → INITIALIZED → FINALIZED → (AWAITING_ATTESTATION) → BRIDGED`, or to
//! the terminal `ERROR`. Every transition is gated on the on-chain state of the L1 depositor
//! contract, so a deposit that was advanced by another relayer instance, or by an earlier run
//! that crashed before persisting, is synchronized forward instead of submitted twice.

use std::fmt::Debug;

use async_trait::async_trait;
use tbtc_relayer_chain_clients::types::BridgeEvent;
use tbtc_relayer_primitives::prelude::{ChainName, Deposit, DepositId, DepositReveal};

use crate::errors::RelayResult;

mod family;
mod handler;

pub use family::{
    AttestationRoute, ChainFamily, EvmFamily, RecipientError, StarkNetFamily, WormholeFamily,
    STARKNET_PRIME,
};
pub use handler::DepositHandler;

/// Drives the deposits of one destination chain.
///
/// Every operation except [`register_reveal`](Self::register_reveal) swallows its failures: they
/// are recorded on the deposit and in the audit trail, and the operation returns `None`. A
/// returned deposit is the persisted record after a successful step.
#[async_trait]
pub trait ChainDepositHandler: Debug + Send + Sync {
    /// The chain this handler is registered under.
    fn chain(&self) -> &ChainName;

    /// Starts tracking a revealed deposit as `QUEUED`. Revealing an already tracked deposit is a
    /// no-op that returns the same id.
    async fn register_reveal(&self, reveal: DepositReveal) -> RelayResult<DepositId>;

    /// Submits `initializeDeposit` for a `QUEUED` deposit.
    async fn initialize_deposit(&self, deposit: Deposit) -> Option<Deposit>;

    /// Submits `finalizeDeposit` for an `INITIALIZED` deposit.
    async fn finalize_deposit(&self, deposit: Deposit) -> Option<Deposit>;

    /// Records that the tokens of a deposit reached the destination chain.
    ///
    /// Idempotent: replaying an event for a `BRIDGED` deposit changes nothing.
    async fn process_bridge_event(&self, event: BridgeEvent, is_past_event: bool)
        -> Option<Deposit>;

    /// Whether the vault has finalized the optimistic mint of the deposit.
    async fn has_deposit_been_minted(&self, deposit: &Deposit) -> bool;

    /// Verifies the attestation of an `AWAITING_ATTESTATION` deposit's transfer.
    async fn confirm_attested_bridging(&self, deposit: Deposit) -> Option<Deposit>;

    /// Replays bridge events from the configured backfill window. Returns the number of deposits
    /// that moved to `BRIDGED`.
    async fn check_past_events(&self) -> usize;

    /// Processes bridge events emitted since the last call. Returns the number of deposits that
    /// moved to `BRIDGED`.
    async fn poll_bridge_events(&self) -> usize;
}
