//! What differs between destination chain families: how owners are encoded and how bridging is
//! confirmed.

use std::{fmt::Debug, str::FromStr, sync::Arc};

use alloy_primitives::{Address, B256, U256};
use tbtc_relayer_chain_clients::types::BridgeEvent;
use tbtc_relayer_primitives::{chain::WormholeChainId, deposit::BridgeLeg, deposit::DepositStatus};
use tbtc_relayer_vaa::service::VaaService;
use thiserror::Error;

/// The StarkNet field prime, `2^251 + 17 * 2^192 + 1`. Felts must be strictly below it.
pub const STARKNET_PRIME: U256 = U256::from_limbs([1, 0, 0, 0x0800_0000_0000_0011]);

/// Reasons a revealed owner cannot be encoded for the destination chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecipientError {
    /// The owner is not a hex string of the expected shape.
    #[error("malformed {family} recipient {owner:?}: {reason}")]
    Malformed {
        /// The family name.
        family: &'static str,
        /// The rejected owner.
        owner: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The owner decodes to zero.
    #[error("{family} recipient must not be zero")]
    Zero {
        /// The family name.
        family: &'static str,
    },

    /// The owner is not a valid field element.
    #[error("starknet recipient {0} is not below the field prime")]
    OutOfField(String),
}

/// Where the attestation proving an L1 → destination transfer comes from.
#[derive(Debug, Clone, Copy)]
pub struct AttestationRoute<'a> {
    /// The verification service.
    pub service: &'a VaaService,
    /// Wormhole id of the L1.
    pub source_chain: WormholeChainId,
    /// The L1 token bridge, as a 32-byte emitter.
    pub emitter: B256,
    /// Wormhole id of the destination chain.
    pub destination_chain: WormholeChainId,
}

/// A destination chain family.
pub trait ChainFamily: Debug + Send + Sync + 'static {
    /// Short name used in logs and errors.
    const NAME: &'static str;

    /// Validates the revealed owner and encodes it as the depositor contract's `bytes32` owner.
    fn encode_owner(&self, owner: &str) -> Result<B256, RecipientError>;

    /// Builds the bridge leg recorded for a bridging event, or `None` if the family does not
    /// confirm bridging through depositor events.
    fn bridge_leg(&self, event: &BridgeEvent) -> Option<BridgeLeg>;

    /// How the family confirms bridging through attestations, if it does.
    fn attestation_route(&self) -> Option<AttestationRoute<'_>> {
        None
    }

    /// The status a successfully finalized deposit moves to.
    fn finalized_status(&self) -> DepositStatus {
        if self.attestation_route().is_some() {
            DepositStatus::AwaitingAttestation
        } else {
            DepositStatus::Finalized
        }
    }
}

fn malformed(family: &'static str, owner: &str, reason: impl ToString) -> RecipientError {
    RecipientError::Malformed {
        family,
        owner: owner.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_evm_address(family: &'static str, owner: &str) -> Result<Address, RecipientError> {
    let hex = owner.strip_prefix("0x").ok_or_else(|| malformed(family, owner, "missing 0x prefix"))?;
    if hex.len() != 40 {
        return Err(malformed(family, owner, "expected 20 bytes"));
    }

    let address = Address::from_str(hex).map_err(|err| malformed(family, owner, err))?;
    if address.is_zero() {
        return Err(RecipientError::Zero { family });
    }

    Ok(address)
}

/// EVM L2s bridged by the depositor contract itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvmFamily;

impl ChainFamily for EvmFamily {
    const NAME: &'static str = "evm";

    fn encode_owner(&self, owner: &str) -> Result<B256, RecipientError> {
        Ok(parse_evm_address(Self::NAME, owner)?.into_word())
    }

    fn bridge_leg(&self, event: &BridgeEvent) -> Option<BridgeLeg> {
        Some(BridgeLeg::Evm {
            l1_bridge_tx_hash: event.l1_tx_hash,
            l2_recipient: event.l2_recipient,
            amount: event.amount,
            nonce: event.nonce,
        })
    }
}

/// StarkNet, bridged through the L1 → L2 messaging contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct StarkNetFamily;

impl ChainFamily for StarkNetFamily {
    const NAME: &'static str = "starknet";

    fn encode_owner(&self, owner: &str) -> Result<B256, RecipientError> {
        let hex = owner
            .strip_prefix("0x")
            .ok_or_else(|| malformed(Self::NAME, owner, "missing 0x prefix"))?;
        if hex.is_empty() || hex.len() > 64 {
            return Err(malformed(Self::NAME, owner, "expected 1 to 64 hex digits"));
        }

        let felt =
            U256::from_str_radix(hex, 16).map_err(|err| malformed(Self::NAME, owner, err))?;
        if felt.is_zero() {
            return Err(RecipientError::Zero { family: Self::NAME });
        }
        if felt >= STARKNET_PRIME {
            return Err(RecipientError::OutOfField(owner.to_string()));
        }

        Ok(B256::from(felt))
    }

    fn bridge_leg(&self, event: &BridgeEvent) -> Option<BridgeLeg> {
        Some(BridgeLeg::Starknet {
            l1_bridge_tx_hash: event.l1_tx_hash,
            recipient: event.l2_recipient,
            amount: event.amount,
            message_nonce: event.nonce,
        })
    }
}

/// Chains reached through the attestation bridge; bridging is confirmed by verifying the
/// attestation of the finalize transaction's token transfer.
#[derive(Debug, Clone)]
pub struct WormholeFamily {
    vaa: Arc<VaaService>,
    l1_chain: WormholeChainId,
    l1_token_bridge: B256,
    destination: WormholeChainId,
}

impl WormholeFamily {
    /// Creates the family for transfers from `l1_chain`'s token bridge to `destination`.
    pub const fn new(
        vaa: Arc<VaaService>,
        l1_chain: WormholeChainId,
        l1_token_bridge: B256,
        destination: WormholeChainId,
    ) -> Self {
        Self {
            vaa,
            l1_chain,
            l1_token_bridge,
            destination,
        }
    }
}

impl ChainFamily for WormholeFamily {
    const NAME: &'static str = "wormhole";

    /// Accepts a 20-byte EVM address or a 32-byte account, both `0x`-prefixed.
    fn encode_owner(&self, owner: &str) -> Result<B256, RecipientError> {
        let hex = owner
            .strip_prefix("0x")
            .ok_or_else(|| malformed(Self::NAME, owner, "missing 0x prefix"))?;

        let encoded = match hex.len() {
            40 => parse_evm_address(Self::NAME, owner)?.into_word(),
            64 => B256::from_str(hex).map_err(|err| malformed(Self::NAME, owner, err))?,
            _ => return Err(malformed(Self::NAME, owner, "expected 20 or 32 bytes")),
        };
        if encoded.is_zero() {
            return Err(RecipientError::Zero { family: Self::NAME });
        }

        Ok(encoded)
    }

    fn bridge_leg(&self, _event: &BridgeEvent) -> Option<BridgeLeg> {
        None
    }

    fn attestation_route(&self) -> Option<AttestationRoute<'_>> {
        Some(AttestationRoute {
            service: &self.vaa,
            source_chain: self.l1_chain,
            emitter: self.l1_token_bridge,
            destination_chain: self.destination,
        })
    }
}
