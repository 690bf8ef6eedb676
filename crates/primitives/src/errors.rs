//! Errors raised while building or mutating entity records.

use thiserror::Error;

/// Errors that arise when mutating a [`Deposit`](crate::deposit::Deposit) or a
/// [`Redemption`](crate::redemption::Redemption) record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The requested status change would move the entity backwards or out of a terminal state.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: String,
        /// The requested status.
        to: String,
    },

    /// A write-once field already holds a different value.
    #[error("{field} is already set to {existing}")]
    AlreadySet {
        /// The name of the field.
        field: &'static str,
        /// Debug rendering of the value already present.
        existing: String,
    },
}

/// Errors that arise when parsing a [`DepositId`](crate::deposit::DepositId).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DepositIdError {
    /// The string is not a base-10 unsigned 256-bit integer.
    #[error("deposit id must be a decimal uint256: {0}")]
    Malformed(String),
}
