//! The attestation service seam.

use std::{fmt::Debug, time::Duration};

use alloy_primitives::Bytes;
use async_trait::async_trait;
use tbtc_relayer_chain_clients::types::TxReceipt;
use tbtc_relayer_primitives::chain::WormholeChainId;

use crate::{
    errors::VerifierError,
    message::MessageId,
    payload::{PayloadDiscriminator, TokenBridgePayload},
    wire::Vaa,
};

/// An attestation as handed back by a verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedVaa {
    /// The raw bytes as received, if the verifier kept them.
    pub bytes: Option<Bytes>,
    /// The decoded VAA.
    pub vaa: Vaa,
    /// The decoded token-bridge payload.
    pub payload: TokenBridgePayload,
}

impl SignedVaa {
    /// The raw bytes, re-encoding the VAA when the verifier did not keep them.
    pub fn raw_bytes(&self) -> Bytes {
        self.bytes.clone().unwrap_or_else(|| self.vaa.serialize())
    }
}

/// Fetches guardian-signed attestations and locates published messages.
///
/// Implementations are responsible for signature and quorum checks.
#[async_trait]
pub trait AttestationVerifier: Debug + Send + Sync {
    /// Fetches the attestation for `id`, interpreting its payload as `discriminator`.
    ///
    /// Returns `Ok(None)` if the attestation is not available yet or its payload is of a
    /// different kind.
    async fn get_attestation(
        &self,
        id: &MessageId,
        discriminator: PayloadDiscriminator,
        timeout: Duration,
    ) -> Result<Option<SignedVaa>, VerifierError>;

    /// Lists the messages published by the transaction with the given receipt on `chain`.
    async fn parse_messages_from_transaction(
        &self,
        chain: WormholeChainId,
        receipt: &TxReceipt,
    ) -> Result<Vec<MessageId>, VerifierError>;
}
