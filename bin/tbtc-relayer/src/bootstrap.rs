//! Wires clients, stores and handlers together and runs the relayer until ctrl-c.

use std::{collections::HashMap, env, sync::Arc, time::Duration};

use alloy::{
    network::EthereumWallet,
    primitives::Address,
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
};
use anyhow::Context;
use tbtc_relayer_chain_clients::evm::{
    BridgeEventAbi, EvmDepositorClient, EvmL1RedemptionHandler, EvmL2RedemptionSource, EvmReader,
    EvmTbtcVault, EvmTimeouts, EvmTokenBridge,
};
use tbtc_relayer_db::{audit::AuditLog, persistent::sqlite::SqliteDb};
use tbtc_relayer_primitives::prelude::ChainName;
use tbtc_relayer_sm::{
    audit::Auditor,
    batch::BatchRunner,
    context::RelayerContext,
    deposit::{
        ChainDepositHandler, ChainFamily, DepositHandler, EvmFamily, StarkNetFamily,
        WormholeFamily,
    },
    redemption::{RedemptionRoute, RedemptionService},
};
use tbtc_relayer_vaa::{
    guardian::GuardianRpcVerifier,
    service::{VaaConfig, VaaService},
};
use tokio::{signal, sync::watch, time};
use tracing::{error, info, warn};

use crate::{
    config::{Config, DepositChainConfig, FamilyKind},
    constants::SHUTDOWN_GRACE,
    rpc_server::{start_rpc, RelayerRpc},
    scheduler,
};

/// Everything a deposit handler needs besides its family.
struct DepositDeps {
    l1: DynProvider,
    signer: Address,
    timeouts: EvmTimeouts,
    vault: Arc<EvmTbtcVault<DynProvider>>,
    db: Arc<SqliteDb>,
    auditor: Auditor,
}

impl DepositDeps {
    fn handler<F>(
        &self,
        chain: &DepositChainConfig,
        family: F,
        abi: BridgeEventAbi,
    ) -> Arc<dyn ChainDepositHandler>
    where
        F: ChainFamily + 'static,
    {
        let depositor = EvmDepositorClient::new(
            self.l1.clone(),
            chain.depositor,
            self.signer,
            abi,
            self.timeouts,
        );

        Arc::new(DepositHandler::new(
            ChainName::from(chain.name.as_str()),
            family,
            chain.handler,
            Arc::new(depositor),
            self.vault.clone(),
            self.db.clone(),
            self.db.clone(),
            self.auditor.clone(),
        ))
    }
}

fn http_provider(url: &str) -> anyhow::Result<DynProvider> {
    let url = url.parse().with_context(|| format!("invalid rpc url {url}"))?;
    Ok(ProviderBuilder::new().on_http(url).erased())
}

/// Builds every component from `config` and runs until ctrl-c.
pub(crate) async fn run(config: Config) -> anyhow::Result<()> {
    let timeouts = EvmTimeouts {
        call: Duration::from_secs(config.l1.call_timeout_secs),
        transaction: Duration::from_secs(config.l1.tx_timeout_secs),
    };

    let envvar = &config.l1.signer_key_envvar;
    let signer_key =
        env::var(envvar).with_context(|| format!("envvar {envvar} must hold the signer key"))?;
    let signer: PrivateKeySigner = signer_key.trim().parse().context("invalid signer key")?;
    let signer_address = signer.address();
    info!(signer = %signer_address, "loaded L1 signer");

    let l1_url = config
        .l1
        .rpc_url
        .parse()
        .with_context(|| format!("invalid rpc url {}", config.l1.rpc_url))?;
    let l1 = ProviderBuilder::new()
        .wallet(EthereumWallet::new(signer))
        .on_http(l1_url)
        .erased();

    let db = Arc::new(
        SqliteDb::connect(&config.datadir, &config.db)
            .await
            .context("open database")?,
    );
    let audit_sink: Arc<dyn AuditLog> = db.clone();
    let (auditor, audit_worker) = Auditor::spawn(audit_sink);

    let batch = BatchRunner::new(config.max_concurrency);
    let vaa = Arc::new(build_vaa_service(&config, &l1, timeouts)?);

    let deps = DepositDeps {
        l1: l1.clone(),
        signer: signer_address,
        timeouts,
        vault: Arc::new(EvmTbtcVault::new(l1.clone(), config.l1.vault, timeouts)),
        db: db.clone(),
        auditor: auditor.clone(),
    };

    let mut ctx = RelayerContext::new(db.clone(), db.clone(), batch.clone());

    for chain in &config.deposits {
        let handler = match (chain.family, &chain.wormhole) {
            (FamilyKind::Evm, _) => deps.handler(chain, EvmFamily, BridgeEventAbi::Evm),
            (FamilyKind::Starknet, _) => {
                deps.handler(chain, StarkNetFamily, BridgeEventAbi::Starknet)
            }
            (FamilyKind::Wormhole, Some(destination)) => {
                let family = WormholeFamily::new(
                    vaa.clone(),
                    config.wormhole.l1_chain_id,
                    config.wormhole.l1_token_bridge.into_word(),
                    destination.chain_id,
                );
                deps.handler(chain, family, BridgeEventAbi::Attested)
            }
            (FamilyKind::Wormhole, None) => {
                anyhow::bail!("deposit chain {} needs a [wormhole] section", chain.name)
            }
        };

        info!(chain = %chain.name, family = ?chain.family, depositor = %chain.depositor, "deposit handler registered");
        ctx = ctx.with_deposit_handler(handler);
    }

    for chain in &config.redemptions {
        let l2 = http_provider(&chain.rpc_url)?;
        let service = RedemptionService::new(
            ChainName::from(chain.name.as_str()),
            RedemptionRoute {
                source_chain: chain.wormhole_chain_id,
                emitter: chain.token_bridge.into_word(),
                destination_chain: config.wormhole.l1_chain_id,
            },
            chain.scan,
            Arc::new(EvmL2RedemptionSource::new(l2, chain.redeemer, timeouts)),
            Arc::new(EvmL1RedemptionHandler::new(
                l1.clone(),
                chain.l1_redemption_handler,
                timeouts,
            )),
            vaa.clone(),
            db.clone(),
            db.clone(),
            auditor.clone(),
            batch.clone(),
        );

        info!(chain = %chain.name, redeemer = %chain.redeemer, "redemption service registered");
        ctx = ctx.with_redemption_service(Arc::new(service));
    }

    let ctx = Arc::new(ctx);
    let (stop_tx, stop_rx) = watch::channel(false);

    let rpc_impl = RelayerRpc::new(ctx.clone());
    let rpc_addr = config.rpc_addr.clone();
    let rpc_shutdown = stop_rx.clone();
    let rpc_task = tokio::spawn(async move {
        if let Err(err) = start_rpc(&rpc_impl, &rpc_addr, rpc_shutdown).await {
            error!(%err, "rpc server failed");
        }
    });

    let mut jobs = scheduler::spawn_jobs(ctx, &config.scheduler, stop_rx);
    jobs.push(rpc_task);

    signal::ctrl_c().await.context("listen for ctrl-c")?;
    info!("shutdown requested, waiting for running passes");
    // receivers only wait for the flag, so a send error means they are all gone already
    let _ = stop_tx.send(true);

    let drain = async {
        for job in jobs {
            if let Err(err) = job.await {
                error!(%err, "job panicked");
            }
        }
    };
    if time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        warn!(grace = ?SHUTDOWN_GRACE, "jobs did not stop in time");
    }

    // every auditor clone lives in the dropped context, so the worker drains and exits
    drop(auditor);
    drop(deps);
    if time::timeout(SHUTDOWN_GRACE, audit_worker).await.is_err() {
        warn!("audit worker did not drain in time");
    }

    Ok(())
}

fn build_vaa_service(
    config: &Config,
    l1: &DynProvider,
    timeouts: EvmTimeouts,
) -> anyhow::Result<VaaService> {
    let wormhole = &config.wormhole;

    let mut core_contracts = HashMap::from([(wormhole.l1_chain_id, wormhole.l1_core_contract)]);
    for chain in &config.redemptions {
        core_contracts.insert(chain.wormhole_chain_id, chain.core_contract);
    }
    let verifier = GuardianRpcVerifier::new(wormhole.guardian_rpc_url.clone(), core_contracts);

    let mut service = VaaService::new(
        Arc::new(verifier),
        VaaConfig {
            attestation_timeout: Duration::from_secs(wormhole.attestation_timeout_secs),
            min_consistency_level: wormhole.min_consistency_level,
        },
    )
    .with_receipt_source(
        wormhole.l1_chain_id,
        Arc::new(EvmReader::new(l1.clone(), timeouts)),
    )
    .with_token_bridge(
        wormhole.l1_chain_id,
        Arc::new(EvmTokenBridge::new(
            l1.clone(),
            wormhole.l1_token_bridge,
            timeouts,
        )),
    );

    for chain in &config.redemptions {
        let l2 = http_provider(&chain.rpc_url)?;
        service = service.with_receipt_source(
            chain.wormhole_chain_id,
            Arc::new(EvmReader::new(l2, timeouts)),
        );
    }

    for chain in &config.deposits {
        if let Some(destination) = &chain.wormhole {
            let provider = http_provider(&destination.rpc_url)?;
            service = service.with_token_bridge(
                destination.chain_id,
                Arc::new(EvmTokenBridge::new(
                    provider,
                    destination.token_bridge,
                    timeouts,
                )),
            );
        }
    }

    Ok(service)
}
