//! Errors raised inside the relay handlers.
//!
//! These never escape a state-machine operation: each is rendered into the entity's `error` field
//! and the audit trail. Only [`register_reveal`](crate::context::RelayerContext::register_reveal)
//! hands them back, since its caller is an RPC client.

use tbtc_relayer_chain_clients::errors::ChainClientError;
use tbtc_relayer_db::errors::DbError;
use tbtc_relayer_primitives::{chain::ChainName, errors::RecordError};
use tbtc_relayer_vaa::errors::VaaError;
use thiserror::Error;

use crate::deposit::RecipientError;

/// Errors that can occur while relaying a deposit or a redemption.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No handler is registered for the chain.
    #[error("no handler registered for chain {0}")]
    UnknownChain(ChainName),

    /// The entity store failed.
    #[error("store: {0}")]
    Db(#[from] DbError),

    /// A chain call failed or timed out.
    #[error("chain client: {0}")]
    Client(#[from] ChainClientError),

    /// The requested change would break the entity's invariants.
    #[error("record: {0}")]
    Record(#[from] RecordError),

    /// The recipient is not a valid address on the destination chain.
    #[error("recipient: {0}")]
    Recipient(#[from] RecipientError),

    /// The attestation could not be verified.
    #[error("attestation: {0}")]
    Vaa(#[from] VaaError),

    /// The operation was refused in the entity's current state.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl RelayError {
    /// Whether the failure is transient and the entity should be left in place for the next pass.
    pub fn is_transient(&self) -> bool {
        match self {
            RelayError::Client(err) => err.is_timeout() || matches!(err, ChainClientError::Rpc(_)),
            RelayError::Db(_) => true,
            _ => false,
        }
    }
}

/// The result type for operations in the relay handlers.
pub type RelayResult<T> = Result<T, RelayError>;
