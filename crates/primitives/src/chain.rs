//! Identifiers for the chains the relayer talks to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The name under which a destination chain is registered with the relayer, e.g. `"arbitrum"` or
/// `"starknet"`.
///
/// Deposits and redemptions carry this name, and the relayer context routes every entity to the
/// handler registered under the same name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainName(String);

impl ChainName {
    /// Creates a new chain name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChainName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ChainName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A chain id in the Wormhole registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WormholeChainId(pub u16);

impl WormholeChainId {
    /// Solana.
    pub const SOLANA: Self = Self(1);
    /// Ethereum mainnet.
    pub const ETHEREUM: Self = Self(2);
    /// Sui.
    pub const SUI: Self = Self(21);
    /// Arbitrum One.
    pub const ARBITRUM: Self = Self(23);
    /// Base.
    pub const BASE: Self = Self(30);
    /// Ethereum Sepolia.
    pub const SEPOLIA: Self = Self(10002);

    /// Returns the raw id.
    pub const fn get(self) -> u16 {
        self.0
    }

    const fn known_name(self) -> Option<&'static str> {
        match self.0 {
            1 => Some("Solana"),
            2 => Some("Ethereum"),
            21 => Some("Sui"),
            23 => Some("Arbitrum"),
            30 => Some("Base"),
            10002 => Some("Sepolia"),
            _ => None,
        }
    }
}

impl fmt::Display for WormholeChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.known_name() {
            Some(name) => write!(f, "{name}({})", self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

impl From<u16> for WormholeChainId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}
