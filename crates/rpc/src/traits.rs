//! Traits for the RPC server.

use jsonrpsee::{core::RpcResult, proc_macros::rpc};
use tbtc_relayer_primitives::prelude::{DepositId, DepositReveal, RedemptionId};

use crate::types::{RpcDepositInfo, RpcRedemptionInfo};

/// RPCs related to information about the relayer process itself.
#[cfg_attr(not(feature = "client"), rpc(server, namespace = "relayer"))]
#[cfg_attr(feature = "client", rpc(server, client, namespace = "relayer"))]
pub trait TbtcRelayerControlApi {
    /// Get the uptime for the relayer in seconds assuming the clock is strictly monotonically
    /// increasing.
    #[method(name = "uptime")]
    async fn get_uptime(&self) -> RpcResult<u64>;
}

/// RPCs for submitting deposits and following deposits and redemptions through the relay.
#[cfg_attr(not(feature = "client"), rpc(server, namespace = "relayer"))]
#[cfg_attr(feature = "client", rpc(server, client, namespace = "relayer"))]
pub trait TbtcRelayerApi {
    /// Start relaying a revealed deposit. Revealing an already tracked deposit returns its id.
    #[method(name = "revealDeposit")]
    async fn reveal_deposit(&self, reveal: DepositReveal) -> RpcResult<DepositId>;

    /// Get a tracked deposit by id.
    #[method(name = "getDeposit")]
    async fn get_deposit(&self, deposit_id: DepositId) -> RpcResult<Option<RpcDepositInfo>>;

    /// Get a tracked redemption by the hash of its L2 request transaction.
    #[method(name = "getRedemption")]
    async fn get_redemption(
        &self,
        l2_tx_hash: RedemptionId,
    ) -> RpcResult<Option<RpcRedemptionInfo>>;
}
