//! Errors of the attestation pipeline.

use std::time::Duration;

use alloy_primitives::B256;
use tbtc_relayer_chain_clients::errors::ChainClientError;
use tbtc_relayer_primitives::chain::WormholeChainId;
use thiserror::Error;

use crate::{message::MessageId, payload::PayloadKind};

/// Errors raised while decoding attestation bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// The input ended before a field could be read.
    #[error("unexpected end of input reading {field}: need {needed} bytes, have {remaining}")]
    UnexpectedEnd {
        /// The field being read.
        field: &'static str,
        /// Bytes required.
        needed: usize,
        /// Bytes left.
        remaining: usize,
    },

    /// The VAA version is not 1.
    #[error("unsupported vaa version {0}")]
    UnsupportedVersion(u8),

    /// The payload id is not a known token-bridge payload.
    #[error("unknown token bridge payload id {0}")]
    UnknownPayloadId(u8),

    /// A fixed-size payload carried extra bytes.
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}

/// Errors raised by an [`AttestationVerifier`](crate::verifier::AttestationVerifier).
#[derive(Debug, Clone, Error)]
pub enum VerifierError {
    /// The attestation service could not be reached or answered with an error.
    #[error("attestation service: {0}")]
    Service(String),

    /// The call did not complete in time.
    #[error("attestation request timed out after {0:?}")]
    Timeout(Duration),

    /// The returned attestation could not be decoded.
    #[error("malformed attestation: {0}")]
    Malformed(#[from] WireError),

    /// No core contract is configured for the chain.
    #[error("no core contract configured for chain {0}")]
    UnknownChain(WormholeChainId),
}

/// Reasons why [`VaaService::fetch_and_verify`](crate::service::VaaService::fetch_and_verify)
/// rejected a transaction.
#[derive(Debug, Clone, Error)]
pub enum VaaError {
    /// No chain reader is configured for the source chain.
    #[error("no receipt source configured for chain {0}")]
    NoReceiptSource(WormholeChainId),

    /// No token bridge is configured for the destination chain.
    #[error("no token bridge configured for chain {0}")]
    NoTokenBridge(WormholeChainId),

    /// The receipt could not be fetched.
    #[error("could not fetch receipt of {tx_hash}: {source}")]
    ReceiptUnavailable {
        /// The transaction.
        tx_hash: B256,
        /// The client error.
        source: ChainClientError,
    },

    /// The transaction is not mined.
    #[error("receipt of {0} not found")]
    ReceiptNotFound(B256),

    /// The transaction reverted and therefore published nothing.
    #[error("transaction {0} reverted")]
    TransactionReverted(B256),

    /// Messages could not be extracted from the receipt.
    #[error("could not parse messages of {tx_hash}: {source}")]
    MessageParse {
        /// The transaction.
        tx_hash: B256,
        /// The verifier error.
        source: VerifierError,
    },

    /// The transaction published no cross-chain messages.
    #[error("transaction {0} published no cross-chain messages")]
    NoMessages(B256),

    /// None of the published messages came from the expected emitter.
    #[error("no message from emitter {emitter} on chain {chain} in transaction {tx_hash}")]
    NoMatchingEmitter {
        /// The transaction.
        tx_hash: B256,
        /// The expected emitter.
        emitter: B256,
        /// The expected source chain.
        chain: WormholeChainId,
    },

    /// Every discriminator was tried without obtaining an attestation.
    #[error("no attestation for {id}: {last_error}")]
    AttestationUnavailable {
        /// The message.
        id: MessageId,
        /// The last underlying failure.
        last_error: String,
    },

    /// The attestation names a different emitter than the one expected.
    #[error("attested emitter {actual} does not match expected emitter {expected}")]
    EmitterMismatch {
        /// Expected `chain/address`.
        expected: String,
        /// Attested `chain/address`.
        actual: String,
    },

    /// The attested payload is not a token transfer.
    #[error("unsupported attested payload {0:?}")]
    UnsupportedPayload(PayloadKind),

    /// The destination token bridge has not completed the transfer.
    #[error("transfer {0} is not completed on the destination token bridge")]
    TransferNotCompleted(B256),

    /// The completion check itself failed.
    #[error("could not check completion of transfer {digest}: {source}")]
    CompletionCheckFailed {
        /// VAA digest.
        digest: B256,
        /// The client error.
        source: ChainClientError,
    },
}
