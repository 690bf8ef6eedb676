//! The tBTC relayer moves Bitcoin deposits from the L1 depositor contracts to their destination
//! chains and L2 redemption requests back to the L1.

use std::{fs, path::Path};

use anyhow::Context;
use clap::Parser;
use config::Config;
use constants::DEFAULT_THREAD_COUNT;
use serde::de::DeserializeOwned;
use tbtc_relayer_common::logging::{self, LoggerConfig};
use tokio::runtime;
use tracing::{debug, info, trace};

mod args;
mod bootstrap;
mod config;
mod rpc_server;
mod scheduler;

mod constants;

fn main() -> anyhow::Result<()> {
    let cli = args::Cli::parse();

    let config = parse_toml::<Config>(&cli.config)?;
    config.validate().context("invalid configuration")?;

    let runtime = runtime::Builder::new_multi_thread()
        .worker_threads(config.num_threads.unwrap_or(DEFAULT_THREAD_COUNT).into())
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    // the OTLP exporter needs a runtime to spawn its connection on
    let _guard = runtime.enter();

    let mut logger_config =
        LoggerConfig::with_base_name("tbtc-relayer").with_format(config.logging.format());
    if let Some(url) = logging::get_otlp_url_from_env() {
        logger_config.set_otlp_url(url);
    }
    logging::init(logger_config);

    info!(config = %cli.config.display(), "starting tbtc relayer");
    runtime.block_on(bootstrap::run(config))?;

    info!("tbtc relayer shutdown complete");
    Ok(())
}

/// Reads and parses a TOML file from the given path into the given type `T`.
fn parse_toml<T>(path: impl AsRef<Path>) -> anyhow::Result<T>
where
    T: std::fmt::Debug + DeserializeOwned,
{
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read TOML file {}", path.display()))?;
    trace!(?raw, "read file");

    let parsed = toml::from_str::<T>(&raw)
        .with_context(|| format!("failed to parse TOML file {}", path.display()))?;
    debug!(?parsed, "parsed TOML file");

    Ok(parsed)
}
