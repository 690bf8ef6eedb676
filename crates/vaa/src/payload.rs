//! Token-bridge payloads carried inside a VAA.

use std::fmt;

use alloy_primitives::{Bytes, B256, U256};
use tbtc_relayer_primitives::chain::WormholeChainId;

use crate::{errors::WireError, wire::Reader};

/// The kind of a token-bridge payload, keyed by its leading id byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// `1`: a bare transfer.
    Transfer,
    /// `2`: token metadata attestation.
    AttestMeta,
    /// `3`: a transfer with an arbitrary payload for the recipient contract.
    TransferWithPayload,
}

impl PayloadKind {
    /// Whether the kind describes a token transfer.
    pub const fn is_transfer(self) -> bool {
        matches!(self, PayloadKind::Transfer | PayloadKind::TransferWithPayload)
    }
}

impl TryFrom<u8> for PayloadKind {
    type Error = WireError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(PayloadKind::Transfer),
            2 => Ok(PayloadKind::AttestMeta),
            3 => Ok(PayloadKind::TransferWithPayload),
            other => Err(WireError::UnknownPayloadId(other)),
        }
    }
}

/// Fields shared by both transfer kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCommon {
    /// Amount transferred, normalized to 8 decimals.
    pub amount: U256,
    /// Token address on its native chain, left-padded to 32 bytes.
    pub token_address: B256,
    /// The token's native chain.
    pub token_chain: WormholeChainId,
    /// Recipient on the destination chain, left-padded to 32 bytes.
    pub to: B256,
    /// Destination chain.
    pub to_chain: WormholeChainId,
}

/// A decoded token-bridge payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenBridgePayload {
    /// A plain transfer (payload id 1).
    Transfer {
        /// Fields shared by both transfer kinds.
        transfer: TransferCommon,
        /// Relayer fee, normalized to 8 decimals.
        fee: U256,
    },
    /// A transfer carrying an application payload for the recipient contract (payload id 3).
    TransferWithPayload {
        /// Fields shared by both transfer kinds.
        transfer: TransferCommon,
        /// Sender on the source chain, left-padded to 32 bytes.
        from_address: B256,
        /// Opaque payload handed to the recipient.
        payload: Bytes,
    },
    /// Attestations of token metadata are recognized but their contents are not needed.
    AttestMeta,
}

impl TokenBridgePayload {
    /// Decodes a token-bridge payload.
    pub fn parse(bytes: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(bytes);

        match PayloadKind::try_from(r.u8("payload id")?)? {
            PayloadKind::Transfer => {
                let transfer = read_transfer(&mut r)?;
                let fee = U256::from_be_bytes(r.array::<32>("fee")?);
                if r.remaining() > 0 {
                    return Err(WireError::TrailingBytes(r.remaining()));
                }

                Ok(TokenBridgePayload::Transfer { transfer, fee })
            }
            PayloadKind::TransferWithPayload => {
                let transfer = read_transfer(&mut r)?;
                let from_address = B256::from(r.array::<32>("from_address")?);
                let payload = Bytes::copy_from_slice(r.rest());

                Ok(TokenBridgePayload::TransferWithPayload {
                    transfer,
                    from_address,
                    payload,
                })
            }
            PayloadKind::AttestMeta => Ok(TokenBridgePayload::AttestMeta),
        }
    }

    /// The kind of this payload.
    pub const fn kind(&self) -> PayloadKind {
        match self {
            TokenBridgePayload::Transfer { .. } => PayloadKind::Transfer,
            TokenBridgePayload::TransferWithPayload { .. } => PayloadKind::TransferWithPayload,
            TokenBridgePayload::AttestMeta => PayloadKind::AttestMeta,
        }
    }

    /// The transfer fields, if this is a transfer.
    pub const fn transfer(&self) -> Option<&TransferCommon> {
        match self {
            TokenBridgePayload::Transfer { transfer, .. }
            | TokenBridgePayload::TransferWithPayload { transfer, .. } => Some(transfer),
            TokenBridgePayload::AttestMeta => None,
        }
    }

    /// Encodes the payload.
    ///
    /// [`TokenBridgePayload::AttestMeta`] only encodes its id since its fields are not kept.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(133);
        match self {
            TokenBridgePayload::Transfer { transfer, fee } => {
                out.push(1);
                write_transfer(&mut out, transfer);
                out.extend_from_slice(&fee.to_be_bytes::<32>());
            }
            TokenBridgePayload::TransferWithPayload {
                transfer,
                from_address,
                payload,
            } => {
                out.push(3);
                write_transfer(&mut out, transfer);
                out.extend_from_slice(from_address.as_slice());
                out.extend_from_slice(payload);
            }
            TokenBridgePayload::AttestMeta => out.push(2),
        }
        out
    }
}

fn read_transfer(r: &mut Reader<'_>) -> Result<TransferCommon, WireError> {
    Ok(TransferCommon {
        amount: U256::from_be_bytes(r.array::<32>("amount")?),
        token_address: B256::from(r.array::<32>("token_address")?),
        token_chain: WormholeChainId(r.u16("token_chain")?),
        to: B256::from(r.array::<32>("to")?),
        to_chain: WormholeChainId(r.u16("to_chain")?),
    })
}

fn write_transfer(out: &mut Vec<u8>, transfer: &TransferCommon) {
    out.extend_from_slice(&transfer.amount.to_be_bytes::<32>());
    out.extend_from_slice(transfer.token_address.as_slice());
    out.extend_from_slice(&transfer.token_chain.get().to_be_bytes());
    out.extend_from_slice(transfer.to.as_slice());
    out.extend_from_slice(&transfer.to_chain.get().to_be_bytes());
}

/// Which payload interpretation to ask the attestation service for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadDiscriminator {
    /// `TokenBridge:TransferWithPayload`.
    TokenBridgeTransferWithPayload,
    /// `TokenBridge:Transfer`.
    TokenBridgeTransfer,
}

impl PayloadDiscriminator {
    /// Discriminators in the order they are tried: structured transfers before bare ones.
    pub const PRIORITY: [PayloadDiscriminator; 2] = [
        PayloadDiscriminator::TokenBridgeTransferWithPayload,
        PayloadDiscriminator::TokenBridgeTransfer,
    ];

    /// The payload kind this discriminator selects.
    pub const fn kind(self) -> PayloadKind {
        match self {
            PayloadDiscriminator::TokenBridgeTransferWithPayload => {
                PayloadKind::TransferWithPayload
            }
            PayloadDiscriminator::TokenBridgeTransfer => PayloadKind::Transfer,
        }
    }
}

impl fmt::Display for PayloadDiscriminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadDiscriminator::TokenBridgeTransferWithPayload => {
                f.write_str("TokenBridge:TransferWithPayload")
            }
            PayloadDiscriminator::TokenBridgeTransfer => f.write_str("TokenBridge:Transfer"),
        }
    }
}
