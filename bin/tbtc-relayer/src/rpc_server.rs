//! Bootstraps the RPC server of the relayer.

use std::{sync::Arc, time::Instant};

use anyhow::Context;
use async_trait::async_trait;
use jsonrpsee::{
    core::RpcResult,
    types::{ErrorCode, ErrorObjectOwned},
    RpcModule,
};
use tbtc_relayer_primitives::prelude::{DepositId, DepositReveal, RedemptionId};
use tbtc_relayer_rpc::{
    traits::{TbtcRelayerApiServer, TbtcRelayerControlApiServer},
    types::{RpcDepositInfo, RpcRedemptionInfo},
};
use tbtc_relayer_sm::{context::RelayerContext, errors::RelayError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Starts the RPC server and serves until `shutdown` flips.
pub(crate) async fn start_rpc<T>(
    rpc_impl: &T,
    rpc_addr: &str,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()>
where
    T: TbtcRelayerControlApiServer + TbtcRelayerApiServer + Clone + Sync + Send,
{
    let mut rpc_module = RpcModule::new(rpc_impl.clone());

    let control_api = TbtcRelayerControlApiServer::into_rpc(rpc_impl.clone());
    let relayer_api = TbtcRelayerApiServer::into_rpc(rpc_impl.clone());

    rpc_module.merge(control_api).context("merge control api")?;
    rpc_module.merge(relayer_api).context("merge relayer api")?;

    info!("starting relayer rpc server at {rpc_addr}");
    let rpc_server = jsonrpsee::server::ServerBuilder::new()
        .build(&rpc_addr)
        .await
        .context("build relayer rpc server")?;

    let rpc_handle = rpc_server.start(rpc_module);
    debug!("relayer rpc server started");

    // a dropped sender also means shutdown
    let _ = shutdown.wait_for(|stop| *stop).await;
    info!("stopping rpc server");

    if rpc_handle.stop().is_err() {
        warn!("rpc server already stopped");
    }
    rpc_handle.stopped().await;

    Ok(())
}

/// Serves the relayer RPCs from the shared [`RelayerContext`].
#[derive(Debug, Clone)]
pub(crate) struct RelayerRpc {
    start_time: Instant,
    ctx: Arc<RelayerContext>,
}

impl RelayerRpc {
    pub(crate) fn new(ctx: Arc<RelayerContext>) -> Self {
        Self {
            start_time: Instant::now(),
            ctx,
        }
    }
}

fn rpc_error(err: RelayError) -> ErrorObjectOwned {
    let code = match &err {
        RelayError::UnknownChain(_) | RelayError::Recipient(_) | RelayError::Rejected(_) => {
            ErrorCode::InvalidParams
        }
        _ => ErrorCode::InternalError,
    };

    ErrorObjectOwned::owned(code.code(), err.to_string(), None::<()>)
}

#[async_trait]
impl TbtcRelayerControlApiServer for RelayerRpc {
    async fn get_uptime(&self) -> RpcResult<u64> {
        Ok(self.start_time.elapsed().as_secs())
    }
}

#[async_trait]
impl TbtcRelayerApiServer for RelayerRpc {
    async fn reveal_deposit(&self, reveal: DepositReveal) -> RpcResult<DepositId> {
        let chain = reveal.chain.clone();
        let id = self.ctx.register_reveal(reveal).await.map_err(rpc_error)?;
        info!(%chain, deposit_id = %id, "deposit revealed over rpc");

        Ok(id)
    }

    async fn get_deposit(&self, deposit_id: DepositId) -> RpcResult<Option<RpcDepositInfo>> {
        let deposit = self.ctx.deposit(&deposit_id).await.map_err(rpc_error)?;

        Ok(deposit.map(RpcDepositInfo::from))
    }

    async fn get_redemption(
        &self,
        l2_tx_hash: RedemptionId,
    ) -> RpcResult<Option<RpcRedemptionInfo>> {
        let redemption = self.ctx.redemption(&l2_tx_hash).await.map_err(rpc_error)?;

        Ok(redemption.map(RpcRedemptionInfo::from))
    }
}
