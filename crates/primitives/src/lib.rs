//! This crate contains the entity types, identifiers and pure functions that are shared across the
//! relayer's crates.
//!
//! It lies at the bottom of the crate-hierarchy in this workspace i.e., it does not depend on any
//! other crate in this workspace. The encodings defined here (deposit id derivation and the status
//! enumerations) are persisted, so they must stay stable across releases.

pub mod chain;
pub mod deposit;
pub mod errors;
pub mod redemption;
pub mod types;

/// Re-exports of the types most consumers need.
pub mod prelude {
    pub use crate::{
        chain::{ChainName, WormholeChainId},
        deposit::{
            BridgeLeg, Deposit, DepositDates, DepositHashes, DepositId, DepositReveal,
            DepositStatus, FundingTx, RevealInfo,
        },
        errors::{DepositIdError, RecordError},
        redemption::{
            MainUtxo, Redemption, RedemptionId, RedemptionRequest, RedemptionStatus, VaaStatus,
        },
        types::{BlockHeight, Timestamp},
    };
}
