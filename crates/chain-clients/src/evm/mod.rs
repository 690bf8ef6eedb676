//! `alloy`-backed implementations of the chain client traits.
//!
//! Every client is generic over the provider so the binary decides how the provider is built
//! (with or without a wallet).

use std::{fmt::Display, future::IntoFuture, time::Duration};

use alloy::{
    contract::Error as ContractError,
    providers::PendingTransactionError,
    rpc::types::TransactionReceipt,
    transports::TransportError,
};

use crate::{
    errors::{ChainClientError, ClientResult},
    types::{LogEntry, TxReceipt},
};

pub mod contracts;
mod depositor;
mod reader;
mod redemption;
mod token_bridge;
mod vault;

pub use depositor::{BridgeEventAbi, EvmDepositorClient};
pub use reader::EvmReader;
pub use redemption::{EvmL1RedemptionHandler, EvmL2RedemptionSource};
pub use token_bridge::EvmTokenBridge;
pub use vault::EvmTbtcVault;

/// Upper bounds on how long a client waits for the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvmTimeouts {
    /// View calls, log queries and other reads.
    pub call: Duration,
    /// Submitting a transaction and waiting for its receipt.
    pub transaction: Duration,
}

impl Default for EvmTimeouts {
    fn default() -> Self {
        Self {
            call: Duration::from_secs(30),
            transaction: Duration::from_secs(180),
        }
    }
}

/// An error returned by an `alloy` call.
pub(crate) trait NodeError: Display {
    /// Whether the request never got an answer from the node.
    fn is_transport(&self) -> bool;
}

impl NodeError for TransportError {
    fn is_transport(&self) -> bool {
        self.is_transport_error()
    }
}

impl NodeError for ContractError {
    fn is_transport(&self) -> bool {
        matches!(self, Self::TransportError(err) if err.is_transport())
    }
}

impl NodeError for PendingTransactionError {
    fn is_transport(&self) -> bool {
        matches!(self, Self::TransportError(err) if err.is_transport())
    }
}

/// Awaits `fut`, bounding it by `timeout` and mapping its error into a [`ChainClientError`].
///
/// Transport failures become [`ChainClientError::Rpc`], anything the node answered becomes
/// [`ChainClientError::Contract`].
pub(crate) async fn timed<F, T, E>(call: &'static str, timeout: Duration, fut: F) -> ClientResult<T>
where
    F: IntoFuture<Output = Result<T, E>>,
    E: NodeError,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) if err.is_transport() => Err(ChainClientError::Rpc(format!("{call}: {err}"))),
        Ok(Err(err)) => Err(ChainClientError::Contract {
            call,
            reason: err.to_string(),
        }),
        Err(_) => Err(ChainClientError::Timeout { call, timeout }),
    }
}

/// Converts an `alloy` receipt into the chain-agnostic [`TxReceipt`].
pub(crate) fn to_tx_receipt(receipt: &TransactionReceipt) -> TxReceipt {
    TxReceipt {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        success: receipt.status(),
        logs: receipt
            .inner
            .logs()
            .iter()
            .map(|log| LogEntry {
                address: log.address(),
                topics: log.topics().to_vec(),
                data: log.data().data.clone(),
            })
            .collect(),
    }
}
