//! Per-handler configuration that is static over the lifetime of the relayer.

use serde::{Deserialize, Serialize};
use tbtc_relayer_primitives::types::BlockHeight;

/// Default depth, in blocks, of a historical backfill.
pub const DEFAULT_LOOKBACK_BLOCKS: u64 = 10_000;

/// Default width of a single event query.
pub const DEFAULT_CHUNK_SIZE: u64 = 1_000;

/// Default number of blocks subtracted from the initialization block when searching for mints.
pub const DEFAULT_MINT_SAFETY_MARGIN: u64 = 100;

/// How far back and in which increments a handler scans a chain's event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCfg {
    /// Block at which the relevant contract was deployed. Scans never start earlier.
    pub start_block: Option<BlockHeight>,

    /// How many blocks below the head a backfill covers.
    #[serde(default = "default_lookback")]
    pub lookback_blocks: u64,

    /// Maximum number of blocks per event query.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
}

impl Default for ScanCfg {
    fn default() -> Self {
        Self {
            start_block: None,
            lookback_blocks: DEFAULT_LOOKBACK_BLOCKS,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ScanCfg {
    /// Returns the deployment block, if known.
    pub const fn start_block(&self) -> Option<BlockHeight> {
        self.start_block
    }

    /// Returns the backfill depth.
    pub const fn lookback_blocks(&self) -> u64 {
        self.lookback_blocks
    }

    /// Returns the query width, never zero.
    pub const fn chunk_size(&self) -> u64 {
        if self.chunk_size == 0 {
            1
        } else {
            self.chunk_size
        }
    }
}

/// Configuration of a [`DepositHandler`](crate::deposit::DepositHandler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositHandlerCfg {
    /// Scanning of the depositor's bridge events.
    #[serde(flatten)]
    pub scan: ScanCfg,

    /// Blocks subtracted from the initialization block when searching for the mint.
    #[serde(default = "default_mint_safety_margin")]
    pub mint_safety_margin: u64,
}

impl Default for DepositHandlerCfg {
    fn default() -> Self {
        Self {
            scan: ScanCfg::default(),
            mint_safety_margin: DEFAULT_MINT_SAFETY_MARGIN,
        }
    }
}

impl DepositHandlerCfg {
    /// Returns the scan configuration.
    pub const fn scan(&self) -> &ScanCfg {
        &self.scan
    }

    /// Returns the mint search safety margin.
    pub const fn mint_safety_margin(&self) -> u64 {
        self.mint_safety_margin
    }
}

const fn default_lookback() -> u64 {
    DEFAULT_LOOKBACK_BLOCKS
}

const fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

const fn default_mint_safety_margin() -> u64 {
    DEFAULT_MINT_SAFETY_MARGIN
}
