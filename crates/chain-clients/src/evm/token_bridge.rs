//! Wormhole token bridge view calls.

use std::fmt;

use alloy::{
    primitives::{Address, B256},
    providers::Provider,
};
use async_trait::async_trait;

use super::{contracts::ITokenBridge, timed, EvmTimeouts};
use crate::{errors::ClientResult, traits::TokenBridge};

/// Queries transfer completion on a token bridge deployed on an EVM chain.
#[derive(Clone)]
pub struct EvmTokenBridge<P> {
    provider: P,
    address: Address,
    timeouts: EvmTimeouts,
}

impl<P> EvmTokenBridge<P> {
    /// Creates a client for the token bridge at `address`.
    pub const fn new(provider: P, address: Address, timeouts: EvmTimeouts) -> Self {
        Self {
            provider,
            address,
            timeouts,
        }
    }
}

impl<P> fmt::Debug for EvmTokenBridge<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmTokenBridge")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<P> TokenBridge for EvmTokenBridge<P>
where
    P: Provider + Send + Sync,
{
    async fn is_transfer_completed(&self, vaa_hash: B256) -> ClientResult<bool> {
        let bridge = ITokenBridge::new(self.address, &self.provider);

        let completed = timed(
            "isTransferCompleted",
            self.timeouts.call,
            bridge.isTransferCompleted(vaa_hash).call(),
        )
        .await?
        .completed;

        Ok(completed)
    }
}
