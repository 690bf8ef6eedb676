use std::{collections::BTreeSet, path::PathBuf, time::Duration};

use alloy::primitives::Address;
use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};
use tbtc_relayer_common::logging::LogFormat;
use tbtc_relayer_db::persistent::config::DbConfig;
use tbtc_relayer_primitives::chain::WormholeChainId;
use tbtc_relayer_sm::config::{DepositHandlerCfg, ScanCfg};

use crate::constants::DEFAULT_MAX_CONCURRENCY;

/// The configuration values that dictate the behavior of the relayer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Config {
    /// The directory to store all the data in.
    pub datadir: PathBuf,

    /// The RPC server addr for the relayer.
    pub rpc_addr: String,

    /// Number of tokio worker threads.
    pub num_threads: Option<u8>,

    /// Maximum number of entities processed at once across every pass.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// The configuration for the sqlite3 database.
    #[serde(default)]
    pub db: DbConfig,

    pub l1: L1Config,

    pub wormhole: WormholeConfig,

    pub scheduler: SchedulerConfig,

    /// One entry per destination chain deposits are relayed to.
    #[serde(default)]
    pub deposits: Vec<DepositChainConfig>,

    /// One entry per L2 redemptions are relayed from.
    #[serde(default)]
    pub redemptions: Vec<RedemptionChainConfig>,
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LoggingConfig {
    /// Emit one JSON object per line instead of compact text.
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    pub(crate) const fn format(&self) -> LogFormat {
        if self.json {
            LogFormat::Json
        } else {
            LogFormat::Compact
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct L1Config {
    pub rpc_url: String,

    /// Name of the envvar holding the hex-encoded signer key.
    pub signer_key_envvar: String,

    /// The tBTC vault.
    pub vault: Address,

    /// Timeout of view calls and log queries, in seconds.
    pub call_timeout_secs: u64,

    /// Timeout of transaction submission including the receipt, in seconds.
    pub tx_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct WormholeConfig {
    /// Base URL of the guardian REST endpoint.
    pub guardian_rpc_url: String,

    /// Wormhole id of the L1.
    pub l1_chain_id: WormholeChainId,

    /// The Wormhole core contract on the L1.
    pub l1_core_contract: Address,

    /// The Wormhole token bridge on the L1.
    pub l1_token_bridge: Address,

    /// How long a single attestation request may take, in seconds.
    pub attestation_timeout_secs: u64,

    /// Attestations below this consistency level are logged as a warning.
    pub min_consistency_level: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SchedulerConfig {
    /// Period of the initialize/finalize/confirm pass, in seconds.
    pub deposit_interval_secs: u64,

    /// Period of the live bridge-event tail, in seconds.
    pub event_interval_secs: u64,

    /// Period of the redemption pass, in seconds.
    pub redemption_interval_secs: u64,

    /// Period of the backfill pass, in seconds.
    pub backfill_interval_secs: u64,

    /// Period of the retention sweep, in seconds.
    pub retention_sweep_interval_secs: u64,

    /// Settled redemptions older than this are deleted, in seconds.
    pub retention_window_secs: u64,
}

impl SchedulerConfig {
    pub(crate) const fn retention_window(&self) -> Duration {
        Duration::from_secs(self.retention_window_secs)
    }

    fn periods(&self) -> [(&'static str, u64); 5] {
        [
            ("deposit_interval_secs", self.deposit_interval_secs),
            ("event_interval_secs", self.event_interval_secs),
            ("redemption_interval_secs", self.redemption_interval_secs),
            ("backfill_interval_secs", self.backfill_interval_secs),
            (
                "retention_sweep_interval_secs",
                self.retention_sweep_interval_secs,
            ),
        ]
    }
}

/// How minted tokens reach a destination chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum FamilyKind {
    Evm,
    Starknet,
    Wormhole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DepositChainConfig {
    pub name: String,

    pub family: FamilyKind,

    /// The L1 depositor contract serving this chain.
    pub depositor: Address,

    /// Wormhole settings, required for the `wormhole` family.
    pub wormhole: Option<WormholeDestinationConfig>,

    #[serde(flatten)]
    pub handler: DepositHandlerCfg,
}

/// Where completion of a Wormhole transfer into a destination chain is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct WormholeDestinationConfig {
    pub chain_id: WormholeChainId,

    pub rpc_url: String,

    /// The Wormhole token bridge on the destination chain.
    pub token_bridge: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RedemptionChainConfig {
    pub name: String,

    pub rpc_url: String,

    /// Wormhole id of the L2.
    pub wormhole_chain_id: WormholeChainId,

    /// The contract emitting `RedemptionRequested` on the L2.
    pub redeemer: Address,

    /// The Wormhole core contract on the L2.
    pub core_contract: Address,

    /// The Wormhole token bridge on the L2, the emitter of redemption transfers.
    pub token_bridge: Address,

    /// The L1 contract that settles redemptions from this L2.
    pub l1_redemption_handler: Address,

    #[serde(flatten)]
    pub scan: ScanCfg,
}

impl Config {
    /// Checks the invariants serde cannot express.
    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.max_concurrency > 0, "max_concurrency must be positive");

        for (name, period) in self.scheduler.periods() {
            ensure!(period > 0, "scheduler.{name} must be positive");
        }

        let mut names = BTreeSet::new();
        for chain in &self.deposits {
            if !names.insert(chain.name.as_str()) {
                bail!("deposit chain {} is configured twice", chain.name);
            }
            match (chain.family, &chain.wormhole) {
                (FamilyKind::Wormhole, None) => {
                    bail!("deposit chain {} needs a [wormhole] section", chain.name)
                }
                (FamilyKind::Evm | FamilyKind::Starknet, Some(_)) => {
                    bail!(
                        "deposit chain {} does not bridge through wormhole",
                        chain.name
                    )
                }
                _ => {}
            }
        }

        let mut names = BTreeSet::new();
        for chain in &self.redemptions {
            if !names.insert(chain.name.as_str()) {
                bail!("redemption chain {} is configured twice", chain.name);
            }
            ensure!(
                chain.wormhole_chain_id != self.wormhole.l1_chain_id,
                "redemption chain {} has the L1's wormhole id",
                chain.name
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        datadir = ".data"
        rpc_addr = "0.0.0.0:4781"
        max_concurrency = 4

        [logging]
        json = true

        [l1]
        rpc_url = "http://localhost:8545"
        signer_key_envvar = "RELAYER_PRIVATE_KEY"
        vault = "0x9c070027cdc9dc8f82416b2e5314e11dfb4fe3cd"
        call_timeout_secs = 30
        tx_timeout_secs = 180

        [wormhole]
        guardian_rpc_url = "https://api.wormholescan.io"
        l1_chain_id = 2
        l1_core_contract = "0x98f3c9e6e3face36baad05fe09d375ef1464288b"
        l1_token_bridge = "0x3ee18b2214aff97000d974cf647e7c347e8fa585"
        attestation_timeout_secs = 300
        min_consistency_level = 1

        [scheduler]
        deposit_interval_secs = 60
        event_interval_secs = 15
        redemption_interval_secs = 120
        backfill_interval_secs = 3600
        retention_sweep_interval_secs = 86400
        retention_window_secs = 2592000

        [[deposits]]
        name = "arbitrum"
        family = "evm"
        depositor = "0x1c8d6e8f2b5f1a4a5d3b8e7c6f9a0b1c2d3e4f50"
        start_block = 19000000
        lookback_blocks = 5000

        [[deposits]]
        name = "sui"
        family = "wormhole"
        depositor = "0x2c8d6e8f2b5f1a4a5d3b8e7c6f9a0b1c2d3e4f51"

        [deposits.wormhole]
        chain_id = 21
        rpc_url = "http://localhost:9545"
        token_bridge = "0x4c8d6e8f2b5f1a4a5d3b8e7c6f9a0b1c2d3e4f52"

        [[redemptions]]
        name = "base"
        rpc_url = "http://localhost:8546"
        wormhole_chain_id = 30
        redeemer = "0x5c8d6e8f2b5f1a4a5d3b8e7c6f9a0b1c2d3e4f53"
        core_contract = "0xbebdb6c8ddc678ffa9f8748f85c815c556dd8ac6"
        token_bridge = "0x8d2de8d2f73f1f4cab472ac9a881c9b123c79627"
        l1_redemption_handler = "0x6c8d6e8f2b5f1a4a5d3b8e7c6f9a0b1c2d3e4f54"
        chunk_size = 500
    "#;

    #[test]
    fn sample_config_parses_and_validates() {
        let config: Config = toml::from_str(SAMPLE).expect("must parse");
        config.validate().expect("must be valid");

        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.logging.format(), LogFormat::Json);
        assert_eq!(config.deposits.len(), 2);
        assert_eq!(config.deposits[0].handler.scan().start_block(), Some(19_000_000));
        assert_eq!(config.deposits[0].handler.scan().lookback_blocks(), 5_000);
        assert_eq!(
            config.deposits[1].wormhole.as_ref().map(|w| w.chain_id),
            Some(WormholeChainId::SUI)
        );
        assert_eq!(config.redemptions[0].scan.chunk_size(), 500);
        assert_eq!(config.redemptions[0].wormhole_chain_id, WormholeChainId::BASE);
        assert_eq!(config.db, DbConfig::default());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config: Config = toml::from_str(SAMPLE).expect("must parse");

        let rendered = toml::to_string(&config).expect("must serialize");
        let reparsed: Config = toml::from_str(&rendered).expect("must reparse");

        assert_eq!(config, reparsed);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let base: Config = toml::from_str(SAMPLE).expect("must parse");

        let mut duplicate = base.clone();
        duplicate.deposits.push(base.deposits[0].clone());
        assert!(duplicate.validate().unwrap_err().to_string().contains("twice"));

        let mut missing_wormhole = base.clone();
        missing_wormhole.deposits[1].wormhole = None;
        assert!(missing_wormhole.validate().is_err());

        let mut zero_period = base.clone();
        zero_period.scheduler.event_interval_secs = 0;
        assert!(zero_period
            .validate()
            .unwrap_err()
            .to_string()
            .contains("event_interval_secs"));

        let mut zero_cap = base;
        zero_cap.max_concurrency = 0;
        assert!(zero_cap.validate().is_err());
    }
}
