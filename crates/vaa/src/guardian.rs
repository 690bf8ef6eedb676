//! An [`AttestationVerifier`] backed by a guardian REST endpoint.

use std::{collections::HashMap, time::Duration};

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::StatusCode;
use serde::Deserialize;
use tbtc_relayer_chain_clients::types::TxReceipt;
use tbtc_relayer_primitives::chain::WormholeChainId;
use tracing::{debug, warn};

use crate::{
    errors::VerifierError,
    message::{messages_in_receipt, MessageId},
    payload::{PayloadDiscriminator, TokenBridgePayload},
    verifier::{AttestationVerifier, SignedVaa},
    wire::Vaa,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignedVaaResponse {
    vaa_bytes: String,
}

/// Fetches signed VAAs from `GET {base}/v1/signed_vaa/{chain}/{emitter}/{sequence}`.
///
/// Signatures are checked by the guardian network that serves the endpoint; this client only
/// decodes the response and makes sure it describes the requested message.
#[derive(Debug, Clone)]
pub struct GuardianRpcVerifier {
    client: reqwest::Client,
    base_url: String,
    core_contracts: HashMap<WormholeChainId, Address>,
}

impl GuardianRpcVerifier {
    /// Creates a verifier for the guardian endpoint at `base_url`.
    ///
    /// `core_contracts` maps each chain whose receipts will be parsed to its core contract.
    pub fn new(base_url: impl Into<String>, core_contracts: HashMap<WormholeChainId, Address>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            core_contracts,
        }
    }

    fn signed_vaa_url(&self, id: &MessageId) -> String {
        format!(
            "{}/v1/signed_vaa/{}/{}/{}",
            self.base_url,
            id.chain.get(),
            hex::encode(id.emitter),
            id.sequence
        )
    }
}

/// Decodes a signed VAA and its payload, returning `None` if it is not of the requested kind.
pub(crate) fn decode_signed_vaa(
    id: &MessageId,
    bytes: Bytes,
    discriminator: PayloadDiscriminator,
) -> Result<Option<SignedVaa>, VerifierError> {
    let vaa = Vaa::parse(&bytes)?;
    if vaa.message_id() != *id {
        return Err(VerifierError::Service(format!(
            "requested {id} but received {}",
            vaa.message_id()
        )));
    }

    let payload = match TokenBridgePayload::parse(&vaa.payload) {
        Ok(payload) if payload.kind() == discriminator.kind() => payload,
        Ok(payload) => {
            debug!(%id, %discriminator, kind = ?payload.kind(), "payload kind does not match");
            return Ok(None);
        }
        Err(err) => {
            debug!(%id, %discriminator, %err, "payload does not decode");
            return Ok(None);
        }
    };

    Ok(Some(SignedVaa {
        bytes: Some(bytes),
        vaa,
        payload,
    }))
}

#[async_trait]
impl AttestationVerifier for GuardianRpcVerifier {
    async fn get_attestation(
        &self,
        id: &MessageId,
        discriminator: PayloadDiscriminator,
        timeout: Duration,
    ) -> Result<Option<SignedVaa>, VerifierError> {
        let url = self.signed_vaa_url(id);
        debug!(%url, %discriminator, "fetching signed vaa");

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    VerifierError::Timeout(timeout)
                } else {
                    VerifierError::Service(err.to_string())
                }
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(%id, "attestation not available yet");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(VerifierError::Service(format!(
                "{url} answered {}",
                response.status()
            )));
        }

        let body: SignedVaaResponse = response
            .json()
            .await
            .map_err(|err| VerifierError::Service(err.to_string()))?;
        let bytes = STANDARD.decode(body.vaa_bytes.as_bytes()).map_err(|err| {
            warn!(%id, %err, "guardian returned invalid base64");
            VerifierError::Service(format!("invalid base64: {err}"))
        })?;

        decode_signed_vaa(id, bytes.into(), discriminator)
    }

    async fn parse_messages_from_transaction(
        &self,
        chain: WormholeChainId,
        receipt: &TxReceipt,
    ) -> Result<Vec<MessageId>, VerifierError> {
        let core_contract = self
            .core_contracts
            .get(&chain)
            .ok_or(VerifierError::UnknownChain(chain))?;

        Ok(messages_in_receipt(receipt, chain, *core_contract))
    }
}
