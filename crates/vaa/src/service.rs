//! The fetch-and-verify protocol.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use alloy_primitives::{Bytes, B256};
use tbtc_relayer_chain_clients::traits::{ChainReader, TokenBridge};
use tbtc_relayer_primitives::chain::WormholeChainId;
use tracing::{debug, info, warn};

use crate::{
    errors::VaaError,
    message::MessageId,
    payload::{PayloadDiscriminator, TokenBridgePayload},
    verifier::{AttestationVerifier, SignedVaa},
    wire::Vaa,
};

/// Default bound on a single attestation request.
pub const DEFAULT_ATTESTATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Default minimum consistency level below which a warning is logged.
pub const DEFAULT_MIN_CONSISTENCY_LEVEL: u8 = 1;

/// Tunables of the verification protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaaConfig {
    /// Bound on each attestation request.
    pub attestation_timeout: Duration,
    /// Consistency level below which a warning is logged. The attestation is still accepted.
    pub min_consistency_level: u8,
}

impl Default for VaaConfig {
    fn default() -> Self {
        Self {
            attestation_timeout: DEFAULT_ATTESTATION_TIMEOUT,
            min_consistency_level: DEFAULT_MIN_CONSISTENCY_LEVEL,
        }
    }
}

/// An attestation that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedVaa {
    /// The signed VAA bytes, ready to submit on the destination chain.
    pub vaa_bytes: Bytes,
    /// The decoded VAA.
    pub vaa: Vaa,
    /// The decoded transfer payload.
    pub payload: TokenBridgePayload,
    /// `keccak256(keccak256(body))`.
    pub digest: B256,
}

/// Runs the fetch-and-verify protocol over the configured chains.
#[derive(Clone)]
pub struct VaaService {
    receipt_sources: HashMap<WormholeChainId, Arc<dyn ChainReader>>,
    token_bridges: HashMap<WormholeChainId, Arc<dyn TokenBridge>>,
    verifier: Arc<dyn AttestationVerifier>,
    config: VaaConfig,
}

impl fmt::Debug for VaaService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaaService")
            .field("receipt_sources", &self.receipt_sources.keys().collect::<Vec<_>>())
            .field("token_bridges", &self.token_bridges.keys().collect::<Vec<_>>())
            .field("verifier", &self.verifier)
            .field("config", &self.config)
            .finish()
    }
}

impl VaaService {
    /// Creates a service with no chains configured.
    pub fn new(verifier: Arc<dyn AttestationVerifier>, config: VaaConfig) -> Self {
        Self {
            receipt_sources: HashMap::new(),
            token_bridges: HashMap::new(),
            verifier,
            config,
        }
    }

    /// Registers where receipts of transactions on `chain` are read from.
    pub fn with_receipt_source(
        mut self,
        chain: WormholeChainId,
        source: Arc<dyn ChainReader>,
    ) -> Self {
        self.receipt_sources.insert(chain, source);
        self
    }

    /// Registers the token bridge deployed on `chain`.
    pub fn with_token_bridge(mut self, chain: WormholeChainId, bridge: Arc<dyn TokenBridge>) -> Self {
        self.token_bridges.insert(chain, bridge);
        self
    }

    /// The protocol configuration.
    pub const fn config(&self) -> &VaaConfig {
        &self.config
    }

    /// Verifies that `tx_hash` on `source_chain` published a transfer from `expected_emitter`
    /// that is attested and already completed on `destination_chain`.
    pub async fn fetch_and_verify(
        &self,
        tx_hash: B256,
        source_chain: WormholeChainId,
        expected_emitter: B256,
        destination_chain: WormholeChainId,
    ) -> Result<VerifiedVaa, VaaError> {
        let source = self
            .receipt_sources
            .get(&source_chain)
            .ok_or(VaaError::NoReceiptSource(source_chain))?;
        let token_bridge = self
            .token_bridges
            .get(&destination_chain)
            .ok_or(VaaError::NoTokenBridge(destination_chain))?;

        // 1. the transaction must be mined and successful
        let receipt = source
            .transaction_receipt(tx_hash)
            .await
            .map_err(|source| VaaError::ReceiptUnavailable { tx_hash, source })?
            .ok_or(VaaError::ReceiptNotFound(tx_hash))?;
        if !receipt.success {
            return Err(VaaError::TransactionReverted(tx_hash));
        }

        // 2. it must have published at least one message
        let messages = self
            .verifier
            .parse_messages_from_transaction(source_chain, &receipt)
            .await
            .map_err(|source| VaaError::MessageParse { tx_hash, source })?;
        if messages.is_empty() {
            return Err(VaaError::NoMessages(tx_hash));
        }
        debug!(%tx_hash, count = messages.len(), "found published messages");

        // 3. pick the one from the expected emitter
        let id = messages
            .into_iter()
            .find(|id| id.chain == source_chain && id.emitter == expected_emitter)
            .ok_or(VaaError::NoMatchingEmitter {
                tx_hash,
                emitter: expected_emitter,
                chain: source_chain,
            })?;

        // 4. fetch the attestation
        let signed = self.fetch_attestation(&id).await?;

        // 5. check it describes exactly that message
        let vaa = &signed.vaa;
        if vaa.emitter_chain != source_chain || vaa.emitter_address != expected_emitter {
            return Err(VaaError::EmitterMismatch {
                expected: format!("{source_chain}/{expected_emitter}"),
                actual: format!("{}/{}", vaa.emitter_chain, vaa.emitter_address),
            });
        }
        if !signed.payload.kind().is_transfer() {
            return Err(VaaError::UnsupportedPayload(signed.payload.kind()));
        }
        if vaa.consistency_level < self.config.min_consistency_level {
            warn!(
                %id,
                consistency_level = vaa.consistency_level,
                minimum = self.config.min_consistency_level,
                "attestation has a low consistency level"
            );
        }

        // 6. raw bytes in whichever form the verifier provided
        let vaa_bytes = signed.raw_bytes();
        let digest = vaa.digest();

        // 7. the transfer must already be completed on the destination, failing closed
        let completed = token_bridge
            .is_transfer_completed(digest)
            .await
            .map_err(|source| VaaError::CompletionCheckFailed { digest, source })?;
        if !completed {
            return Err(VaaError::TransferNotCompleted(digest));
        }

        info!(%tx_hash, %id, %digest, "attestation verified");

        Ok(VerifiedVaa {
            vaa_bytes,
            vaa: signed.vaa,
            payload: signed.payload,
            digest,
        })
    }

    async fn fetch_attestation(&self, id: &MessageId) -> Result<SignedVaa, VaaError> {
        let timeout = self.config.attestation_timeout;
        let mut last_error = String::from("no discriminator tried");

        for discriminator in PayloadDiscriminator::PRIORITY {
            let attempt = tokio::time::timeout(
                timeout,
                self.verifier.get_attestation(id, discriminator, timeout),
            )
            .await;

            match attempt {
                Ok(Ok(Some(signed))) => {
                    debug!(%id, %discriminator, "attestation found");
                    return Ok(signed);
                }
                Ok(Ok(None)) => {
                    debug!(%id, %discriminator, "no attestation for discriminator");
                    last_error = format!("{discriminator}: not available");
                }
                Ok(Err(err)) => {
                    warn!(%id, %discriminator, %err, "attestation request failed");
                    last_error = format!("{discriminator}: {err}");
                }
                Err(_) => {
                    warn!(%id, %discriminator, ?timeout, "attestation request timed out");
                    last_error = format!("{discriminator}: timed out after {timeout:?}");
                }
            }
        }

        Err(VaaError::AttestationUnavailable {
            id: *id,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;

    use super::*;
    use crate::{
        errors::VerifierError,
        payload::PayloadKind,
        testing::{receipt, FakeReceiptSource, FakeTokenBridge, FakeVerifier, VaaBuilder},
    };

    const TX: B256 = B256::repeat_byte(0x77);

    fn emitter() -> B256 {
        Address::with_last_byte(0xad).into_word()
    }

    fn message() -> MessageId {
        MessageId {
            chain: WormholeChainId::ETHEREUM,
            emitter: emitter(),
            sequence: 1,
        }
    }

    fn source_with(tx: TxReceiptKind) -> Arc<FakeReceiptSource> {
        let source = FakeReceiptSource::new(1_000);
        match tx {
            TxReceiptKind::Success => source.insert(receipt(TX, vec![])),
            TxReceiptKind::Reverted => {
                let mut reverted = receipt(TX, vec![]);
                reverted.success = false;
                source.insert(reverted);
            }
            TxReceiptKind::Missing => {}
        }
        Arc::new(source)
    }

    enum TxReceiptKind {
        Success,
        Reverted,
        Missing,
    }

    fn service(
        source: Arc<FakeReceiptSource>,
        verifier: Arc<FakeVerifier>,
        bridge: Arc<FakeTokenBridge>,
    ) -> VaaService {
        VaaService::new(verifier, VaaConfig::default())
            .with_receipt_source(WormholeChainId::ETHEREUM, source)
            .with_token_bridge(WormholeChainId::ARBITRUM, bridge)
    }

    async fn run(svc: &VaaService) -> Result<VerifiedVaa, VaaError> {
        svc.fetch_and_verify(
            TX,
            WormholeChainId::ETHEREUM,
            emitter(),
            WormholeChainId::ARBITRUM,
        )
        .await
    }

    #[tokio::test]
    async fn verifies_transfer_with_payload() {
        let signed = VaaBuilder::transfer_with_payload()
            .emitter(emitter())
            .build_signed();
        let expected_digest = signed.vaa.digest();
        let verifier = Arc::new(FakeVerifier::new().with_message(message()).with_attestation(
            PayloadDiscriminator::TokenBridgeTransferWithPayload,
            signed.clone(),
        ));
        let bridge = Arc::new(FakeTokenBridge::completed());
        let svc = service(source_with(TxReceiptKind::Success), verifier.clone(), bridge.clone());

        let verified = run(&svc).await.unwrap();

        assert_eq!(verified.digest, expected_digest);
        assert_eq!(verified.vaa_bytes, signed.raw_bytes());
        assert_eq!(verified.payload.kind(), PayloadKind::TransferWithPayload);
        assert_eq!(bridge.checked(), vec![expected_digest]);
        assert_eq!(verifier.attestation_calls().len(), 1);
    }

    #[tokio::test]
    async fn reverted_transaction_is_not_parsed() {
        let verifier = Arc::new(FakeVerifier::new().with_message(message()));
        let svc = service(
            source_with(TxReceiptKind::Reverted),
            verifier.clone(),
            Arc::new(FakeTokenBridge::completed()),
        );

        let err = run(&svc).await.unwrap_err();

        assert!(matches!(err, VaaError::TransactionReverted(tx) if tx == TX));
        assert!(verifier.parse_calls().is_empty());
    }

    #[tokio::test]
    async fn missing_receipt_is_rejected() {
        let verifier = Arc::new(FakeVerifier::new());
        let svc = service(
            source_with(TxReceiptKind::Missing),
            verifier.clone(),
            Arc::new(FakeTokenBridge::completed()),
        );

        let err = run(&svc).await.unwrap_err();

        assert!(matches!(err, VaaError::ReceiptNotFound(_)));
        assert!(verifier.parse_calls().is_empty());
    }

    #[tokio::test]
    async fn transaction_without_messages_is_rejected() {
        let svc = service(
            source_with(TxReceiptKind::Success),
            Arc::new(FakeVerifier::new()),
            Arc::new(FakeTokenBridge::completed()),
        );

        let err = run(&svc).await.unwrap_err();

        assert!(matches!(err, VaaError::NoMessages(_)));
    }

    #[tokio::test]
    async fn message_from_another_emitter_is_rejected() {
        let foreign = MessageId {
            emitter: B256::repeat_byte(0x99),
            ..message()
        };
        let verifier = Arc::new(FakeVerifier::new().with_message(foreign));
        let svc = service(
            source_with(TxReceiptKind::Success),
            verifier.clone(),
            Arc::new(FakeTokenBridge::completed()),
        );

        let err = run(&svc).await.unwrap_err();

        assert!(matches!(err, VaaError::NoMatchingEmitter { .. }));
        assert!(err.to_string().contains("emitter"));
        assert!(verifier.attestation_calls().is_empty());
    }

    #[tokio::test]
    async fn attestation_for_another_emitter_is_rejected() {
        let signed = VaaBuilder::transfer_with_payload()
            .emitter(B256::repeat_byte(0x99))
            .build_signed();
        let verifier = Arc::new(
            FakeVerifier::new()
                .with_message(message())
                .with_attestation(PayloadDiscriminator::TokenBridgeTransferWithPayload, signed),
        );
        let bridge = Arc::new(FakeTokenBridge::completed());
        let svc = service(source_with(TxReceiptKind::Success), verifier, bridge.clone());

        let err = run(&svc).await.unwrap_err();

        assert!(matches!(err, VaaError::EmitterMismatch { .. }));
        assert!(err.to_string().contains("emitter"));
        assert!(bridge.checked().is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_bare_transfer() {
        let signed = VaaBuilder::transfer().emitter(emitter()).build_signed();
        let verifier = Arc::new(
            FakeVerifier::new()
                .with_message(message())
                .with_failure(
                    PayloadDiscriminator::TokenBridgeTransferWithPayload,
                    VerifierError::Service("503".into()),
                )
                .with_attestation(PayloadDiscriminator::TokenBridgeTransfer, signed),
        );
        let svc = service(
            source_with(TxReceiptKind::Success),
            verifier.clone(),
            Arc::new(FakeTokenBridge::completed()),
        );

        let verified = run(&svc).await.unwrap();

        assert_eq!(verified.payload.kind(), PayloadKind::Transfer);
        let tried: Vec<_> = verifier
            .attestation_calls()
            .into_iter()
            .map(|(_, discriminator)| discriminator)
            .collect();
        assert_eq!(tried, PayloadDiscriminator::PRIORITY.to_vec());
    }

    #[tokio::test]
    async fn unavailable_attestation_reports_last_error() {
        let verifier = Arc::new(FakeVerifier::new().with_message(message()).with_failure(
            PayloadDiscriminator::TokenBridgeTransfer,
            VerifierError::Service("guardian unreachable".into()),
        ));
        let svc = service(
            source_with(TxReceiptKind::Success),
            verifier,
            Arc::new(FakeTokenBridge::completed()),
        );

        let err = run(&svc).await.unwrap_err();

        match err {
            VaaError::AttestationUnavailable { last_error, .. } => {
                assert!(last_error.contains("guardian unreachable"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test]
    async fn completion_check_fails_closed() {
        for bridge in [FakeTokenBridge::not_completed(), FakeTokenBridge::failing()] {
            let signed = VaaBuilder::transfer().emitter(emitter()).build_signed();
            let verifier = Arc::new(
                FakeVerifier::new()
                    .with_message(message())
                    .with_attestation(PayloadDiscriminator::TokenBridgeTransfer, signed),
            );
            let svc = service(source_with(TxReceiptKind::Success), verifier, Arc::new(bridge));

            let err = run(&svc).await.unwrap_err();

            assert!(matches!(
                err,
                VaaError::TransferNotCompleted(_) | VaaError::CompletionCheckFailed { .. }
            ));
        }
    }

    #[tokio::test]
    async fn metadata_attestation_is_not_a_transfer() {
        let verifier = Arc::new(FakeVerifier::new().with_message(message()).with_attestation(
            PayloadDiscriminator::TokenBridgeTransfer,
            VaaBuilder::attest_meta().emitter(emitter()).build_signed(),
        ));
        let svc = service(
            source_with(TxReceiptKind::Success),
            verifier,
            Arc::new(FakeTokenBridge::completed()),
        );

        let err = run(&svc).await.unwrap_err();

        assert!(matches!(
            err,
            VaaError::UnsupportedPayload(PayloadKind::AttestMeta)
        ));
    }

    #[tokio::test]
    async fn low_consistency_level_is_accepted() {
        let signed = VaaBuilder::transfer()
            .emitter(emitter())
            .consistency_level(0)
            .build_signed();
        let verifier = Arc::new(
            FakeVerifier::new()
                .with_message(message())
                .with_attestation(PayloadDiscriminator::TokenBridgeTransfer, signed),
        );
        let svc = service(
            source_with(TxReceiptKind::Success),
            verifier,
            Arc::new(FakeTokenBridge::completed()),
        );

        let verified = run(&svc).await.unwrap();

        assert_eq!(verified.vaa.consistency_level, 0);
    }

    #[tokio::test]
    async fn unconfigured_chains_are_rejected() {
        let svc = VaaService::new(Arc::new(FakeVerifier::new()), VaaConfig::default());

        let err = run(&svc).await.unwrap_err();

        assert!(matches!(err, VaaError::NoReceiptSource(WormholeChainId::ETHEREUM)));
    }
}
