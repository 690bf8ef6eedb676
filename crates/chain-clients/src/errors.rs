//! Errors raised by chain clients.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to a chain.
#[derive(Debug, Clone, Error)]
pub enum ChainClientError {
    /// The node could not be reached or returned a transport-level error.
    #[error("rpc: {0}")]
    Rpc(String),

    /// A contract call or transaction submission failed.
    #[error("{call} failed: {reason}")]
    Contract {
        /// The contract method or RPC method.
        call: &'static str,
        /// The underlying error.
        reason: String,
    },

    /// The call did not complete in time.
    #[error("{call} timed out after {timeout:?}")]
    Timeout {
        /// The contract method or RPC method.
        call: &'static str,
        /// The configured timeout.
        timeout: Duration,
    },

    /// A contract returned a value outside the known range.
    #[error("unexpected response from {call}: {detail}")]
    UnexpectedResponse {
        /// The contract method.
        call: &'static str,
        /// What was unexpected.
        detail: String,
    },
}

impl ChainClientError {
    /// Whether the error is a timeout, which callers treat as retryable on the next pass.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, ChainClientError::Timeout { .. })
    }
}

/// Result alias for chain client calls.
pub type ClientResult<T> = Result<T, ChainClientError>;
