//! Builders and fakes for exercising the attestation pipeline without a network.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};

use alloy_primitives::{Address, Bytes, FixedBytes, B256, U256};
use alloy_sol_types::SolEvent;
use async_trait::async_trait;
use tbtc_relayer_chain_clients::{
    errors::{ChainClientError, ClientResult},
    traits::{ChainReader, TokenBridge},
    types::{LogEntry, TxReceipt},
};
use tbtc_relayer_primitives::{chain::WormholeChainId, types::BlockHeight};

use crate::{
    errors::VerifierError,
    message::{LogMessagePublished, MessageId},
    payload::{PayloadDiscriminator, TokenBridgePayload, TransferCommon},
    verifier::{AttestationVerifier, SignedVaa},
    wire::{GuardianSignature, Vaa, VAA_VERSION},
};

/// Builds VAAs with sensible defaults.
#[derive(Debug, Clone)]
pub struct VaaBuilder {
    vaa: Vaa,
    payload: TokenBridgePayload,
}

impl VaaBuilder {
    fn with_payload(payload: TokenBridgePayload) -> Self {
        Self {
            vaa: Vaa {
                version: VAA_VERSION,
                guardian_set_index: 4,
                signatures: vec![GuardianSignature {
                    index: 0,
                    signature: FixedBytes::repeat_byte(0x11),
                }],
                timestamp: 1_700_000_000,
                nonce: 0,
                emitter_chain: WormholeChainId::ETHEREUM,
                emitter_address: B256::with_last_byte(0xad),
                sequence: 1,
                consistency_level: 15,
                payload: Bytes::new(),
            },
            payload,
        }
    }

    fn sample_transfer() -> TransferCommon {
        TransferCommon {
            amount: U256::from(100_000_000u64),
            token_address: B256::repeat_byte(0x18),
            token_chain: WormholeChainId::ETHEREUM,
            to: B256::repeat_byte(0x5e),
            to_chain: WormholeChainId::ARBITRUM,
        }
    }

    /// A VAA carrying a bare transfer.
    pub fn transfer() -> Self {
        Self::with_payload(TokenBridgePayload::Transfer {
            transfer: Self::sample_transfer(),
            fee: U256::ZERO,
        })
    }

    /// A VAA carrying a transfer with a recipient payload.
    pub fn transfer_with_payload() -> Self {
        Self::with_payload(TokenBridgePayload::TransferWithPayload {
            transfer: Self::sample_transfer(),
            from_address: B256::repeat_byte(0xf0),
            payload: Bytes::from_static(&[0xca, 0xfe]),
        })
    }

    /// A VAA carrying token metadata.
    pub fn attest_meta() -> Self {
        Self::with_payload(TokenBridgePayload::AttestMeta)
    }

    /// Sets the emitter chain.
    pub fn chain(mut self, chain: WormholeChainId) -> Self {
        self.vaa.emitter_chain = chain;
        self
    }

    /// Sets the emitter address.
    pub fn emitter(mut self, emitter: B256) -> Self {
        self.vaa.emitter_address = emitter;
        self
    }

    /// Sets the sequence number.
    pub fn sequence(mut self, sequence: u64) -> Self {
        self.vaa.sequence = sequence;
        self
    }

    /// Sets the consistency level.
    pub fn consistency_level(mut self, level: u8) -> Self {
        self.vaa.consistency_level = level;
        self
    }

    /// Builds the VAA.
    pub fn build(self) -> Vaa {
        Vaa {
            payload: self.payload.serialize().into(),
            ..self.vaa
        }
    }

    /// Builds the VAA as a verifier would hand it back.
    pub fn build_signed(self) -> SignedVaa {
        let payload = self.payload.clone();
        let vaa = self.build();
        SignedVaa {
            bytes: Some(vaa.serialize()),
            vaa,
            payload,
        }
    }
}

/// A `LogMessagePublished` log emitted by `core` on behalf of `emitter`.
pub fn message_log(core: Address, emitter: Address, sequence: u64) -> LogEntry {
    let event = LogMessagePublished {
        sender: emitter,
        sequence,
        nonce: 0,
        payload: Bytes::from_static(&[0x03]),
        consistencyLevel: 15,
    };

    LogEntry {
        address: core,
        topics: vec![LogMessagePublished::SIGNATURE_HASH, emitter.into_word()],
        data: event.encode_data().into(),
    }
}

/// A successful receipt for `tx_hash` with the given logs.
pub fn receipt(tx_hash: B256, logs: Vec<LogEntry>) -> TxReceipt {
    TxReceipt {
        tx_hash,
        block_number: Some(1_000),
        success: true,
        logs,
    }
}

/// Serves receipts from memory.
#[derive(Debug, Default)]
pub struct FakeReceiptSource {
    receipts: Mutex<HashMap<B256, TxReceipt>>,
    head: BlockHeight,
}

impl FakeReceiptSource {
    /// An empty source whose chain head is `head`.
    pub fn new(head: BlockHeight) -> Self {
        Self {
            receipts: Mutex::default(),
            head,
        }
    }

    /// Makes `receipt` fetchable by its hash.
    pub fn insert(&self, receipt: TxReceipt) {
        self.receipts
            .lock()
            .expect("receipts lock")
            .insert(receipt.tx_hash, receipt);
    }
}

#[async_trait]
impl ChainReader for FakeReceiptSource {
    async fn block_number(&self) -> ClientResult<BlockHeight> {
        Ok(self.head)
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> ClientResult<Option<TxReceipt>> {
        Ok(self
            .receipts
            .lock()
            .expect("receipts lock")
            .get(&tx_hash)
            .cloned())
    }
}

/// Answers completion checks with a fixed response.
#[derive(Debug)]
pub struct FakeTokenBridge {
    response: Result<bool, ChainClientError>,
    checked: Mutex<Vec<B256>>,
}

impl FakeTokenBridge {
    /// Every transfer is completed.
    pub fn completed() -> Self {
        Self::with_response(Ok(true))
    }

    /// No transfer is completed.
    pub fn not_completed() -> Self {
        Self::with_response(Ok(false))
    }

    /// Every check fails.
    pub fn failing() -> Self {
        Self::with_response(Err(ChainClientError::Rpc("connection refused".into())))
    }

    fn with_response(response: Result<bool, ChainClientError>) -> Self {
        Self {
            response,
            checked: Mutex::default(),
        }
    }

    /// Digests that were checked, in order.
    pub fn checked(&self) -> Vec<B256> {
        self.checked.lock().expect("checked lock").clone()
    }
}

#[async_trait]
impl TokenBridge for FakeTokenBridge {
    async fn is_transfer_completed(&self, vaa_hash: B256) -> ClientResult<bool> {
        self.checked.lock().expect("checked lock").push(vaa_hash);
        self.response.clone()
    }
}

/// A scripted verifier.
///
/// Messages are reported per transaction when scripted with [`Self::with_message_in`], and for
/// every other receipt otherwise. Attestations are answered per discriminator, `Ok(None)` when
/// nothing is scripted, unless a failure is scripted for the message itself.
#[derive(Debug, Default)]
pub struct FakeVerifier {
    messages: Mutex<Vec<MessageId>>,
    messages_by_tx: Mutex<HashMap<B256, Vec<MessageId>>>,
    attestations: Mutex<HashMap<PayloadDiscriminator, Result<SignedVaa, VerifierError>>>,
    message_failures: Mutex<HashMap<MessageId, VerifierError>>,
    parse_calls: Mutex<Vec<B256>>,
    attestation_calls: Mutex<Vec<(MessageId, PayloadDiscriminator)>>,
}

impl FakeVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `id` as published by every parsed transaction.
    pub fn with_message(self, id: MessageId) -> Self {
        self.messages.lock().expect("messages lock").push(id);
        self
    }

    /// Reports `id` as published by `tx_hash` only.
    pub fn with_message_in(self, tx_hash: B256, id: MessageId) -> Self {
        self.messages_by_tx
            .lock()
            .expect("messages lock")
            .entry(tx_hash)
            .or_default()
            .push(id);
        self
    }

    /// Answers requests for `discriminator` with `signed`.
    pub fn with_attestation(self, discriminator: PayloadDiscriminator, signed: SignedVaa) -> Self {
        self.attestations
            .lock()
            .expect("attestations lock")
            .insert(discriminator, Ok(signed));
        self
    }

    /// Fails requests for `discriminator` with `err`.
    pub fn with_failure(self, discriminator: PayloadDiscriminator, err: VerifierError) -> Self {
        self.attestations
            .lock()
            .expect("attestations lock")
            .insert(discriminator, Err(err));
        self
    }

    /// Fails requests for the attestation of `id` with `err`, whatever the discriminator.
    pub fn with_failure_for(self, id: MessageId, err: VerifierError) -> Self {
        self.message_failures
            .lock()
            .expect("failures lock")
            .insert(id, err);
        self
    }

    /// Transactions whose messages were parsed, in order.
    pub fn parse_calls(&self) -> Vec<B256> {
        self.parse_calls.lock().expect("parse lock").clone()
    }

    /// Attestation requests, in order.
    pub fn attestation_calls(&self) -> Vec<(MessageId, PayloadDiscriminator)> {
        self.attestation_calls
            .lock()
            .expect("attestation calls lock")
            .clone()
    }
}

#[async_trait]
impl AttestationVerifier for FakeVerifier {
    async fn get_attestation(
        &self,
        id: &MessageId,
        discriminator: PayloadDiscriminator,
        _timeout: Duration,
    ) -> Result<Option<SignedVaa>, VerifierError> {
        self.attestation_calls
            .lock()
            .expect("attestation calls lock")
            .push((*id, discriminator));

        if let Some(err) = self.message_failures.lock().expect("failures lock").get(id) {
            return Err(err.clone());
        }

        match self
            .attestations
            .lock()
            .expect("attestations lock")
            .get(&discriminator)
        {
            Some(Ok(signed)) => Ok(Some(signed.clone())),
            Some(Err(err)) => Err(err.clone()),
            None => Ok(None),
        }
    }

    async fn parse_messages_from_transaction(
        &self,
        _chain: WormholeChainId,
        receipt: &TxReceipt,
    ) -> Result<Vec<MessageId>, VerifierError> {
        self.parse_calls
            .lock()
            .expect("parse lock")
            .push(receipt.tx_hash);
        if let Some(ids) = self
            .messages_by_tx
            .lock()
            .expect("messages lock")
            .get(&receipt.tx_hash)
        {
            return Ok(ids.clone());
        }
        Ok(self.messages.lock().expect("messages lock").clone())
    }
}
