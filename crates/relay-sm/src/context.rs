//! The registry of handlers the scheduler and the RPC surface talk to.

use std::{collections::BTreeMap, fmt, sync::Arc};

use tbtc_relayer_db::{deposits::DepositDb, redemptions::RedemptionDb};
use tbtc_relayer_primitives::prelude::{
    ChainName, Deposit, DepositId, DepositReveal, DepositStatus, Redemption, RedemptionId,
};
use tracing::{debug, error, info};

use crate::{
    batch::BatchRunner,
    deposit::ChainDepositHandler,
    errors::{RelayError, RelayResult},
    redemption::RedemptionService,
};

/// Holds one deposit handler per destination chain and one redemption service per L2.
///
/// Built once at startup and shared behind an [`Arc`]. Every pass runs its per-entity work through
/// the same [`BatchRunner`], so the concurrency cap applies to the relayer as a whole.
pub struct RelayerContext {
    deposit_handlers: BTreeMap<ChainName, Arc<dyn ChainDepositHandler>>,
    redemption_services: BTreeMap<ChainName, Arc<RedemptionService>>,
    deposits: Arc<dyn DepositDb + Send + Sync>,
    redemptions: Arc<dyn RedemptionDb + Send + Sync>,
    batch: BatchRunner,
}

impl fmt::Debug for RelayerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayerContext")
            .field("deposit_handlers", &self.deposit_handlers)
            .field("redemption_services", &self.redemption_services)
            .field("batch", &self.batch)
            .finish_non_exhaustive()
    }
}

impl RelayerContext {
    /// Creates an empty context over the given stores.
    pub fn new(
        deposits: Arc<dyn DepositDb + Send + Sync>,
        redemptions: Arc<dyn RedemptionDb + Send + Sync>,
        batch: BatchRunner,
    ) -> Self {
        Self {
            deposit_handlers: BTreeMap::new(),
            redemption_services: BTreeMap::new(),
            deposits,
            redemptions,
            batch,
        }
    }

    /// Registers the deposit handler for its chain, replacing any previous one.
    pub fn with_deposit_handler(mut self, handler: Arc<dyn ChainDepositHandler>) -> Self {
        self.deposit_handlers
            .insert(handler.chain().clone(), handler);
        self
    }

    /// Registers the redemption service for its chain, replacing any previous one.
    pub fn with_redemption_service(mut self, service: Arc<RedemptionService>) -> Self {
        self.redemption_services
            .insert(service.chain().clone(), service);
        self
    }

    /// Chains with a registered deposit handler.
    pub fn deposit_chains(&self) -> impl Iterator<Item = &ChainName> {
        self.deposit_handlers.keys()
    }

    /// Chains with a registered redemption service.
    pub fn redemption_chains(&self) -> impl Iterator<Item = &ChainName> {
        self.redemption_services.keys()
    }

    /// The shared batch runner.
    pub const fn batch(&self) -> &BatchRunner {
        &self.batch
    }

    /// The redemption store, used by the retention sweep.
    pub fn redemption_store(&self) -> Arc<dyn RedemptionDb + Send + Sync> {
        self.redemptions.clone()
    }

    /// Hands a reveal to the handler of its destination chain.
    pub async fn register_reveal(&self, reveal: DepositReveal) -> RelayResult<DepositId> {
        let handler = self
            .deposit_handlers
            .get(&reveal.chain)
            .ok_or_else(|| RelayError::UnknownChain(reveal.chain.clone()))?;

        handler.register_reveal(reveal).await
    }

    /// Looks up a tracked deposit.
    pub async fn deposit(&self, id: &DepositId) -> RelayResult<Option<Deposit>> {
        Ok(self.deposits.get_deposit(id).await?)
    }

    /// Looks up a tracked redemption.
    pub async fn redemption(&self, id: &RedemptionId) -> RelayResult<Option<Redemption>> {
        Ok(self.redemptions.get_redemption(id).await?)
    }

    /// Advances every non-terminal deposit by at most one phase.
    ///
    /// Queued deposits are initialized, initialized deposits are finalized once their optimistic
    /// mint has been finalized on the vault, and deposits awaiting an attestation are confirmed.
    pub async fn run_deposit_pass(&self) {
        for (chain, handler) in &self.deposit_handlers {
            // loaded up front so a deposit never moves twice in one pass
            let queued = self.load(chain, DepositStatus::Queued).await;
            let initialized = self.load(chain, DepositStatus::Initialized).await;
            let awaiting = self.load(chain, DepositStatus::AwaitingAttestation).await;

            self.batch
                .for_each(queued, move |deposit| async move {
                    handler.initialize_deposit(deposit).await;
                })
                .await;

            self.batch
                .for_each(initialized, move |deposit| async move {
                    if handler.has_deposit_been_minted(&deposit).await {
                        handler.finalize_deposit(deposit).await;
                    } else {
                        debug!(deposit_id = %deposit.id, "optimistic mint not finalized yet");
                    }
                })
                .await;

            self.batch
                .for_each(awaiting, move |deposit| async move {
                    handler.confirm_attested_bridging(deposit).await;
                })
                .await;
        }
    }

    /// Processes bridge events emitted since the previous pass on every chain.
    pub async fn run_event_pass(&self) {
        for (chain, handler) in &self.deposit_handlers {
            let bridged = handler.poll_bridge_events().await;
            if bridged > 0 {
                info!(%chain, bridged, "live bridge events processed");
            }
        }
    }

    /// Replays the backfill window of every deposit handler and redemption service.
    pub async fn run_backfill_pass(&self) {
        for (chain, handler) in &self.deposit_handlers {
            let bridged = handler.check_past_events().await;
            debug!(%chain, bridged, "deposit backfill pass done");
        }

        for (chain, service) in &self.redemption_services {
            let created = service.check_past_redemptions().await;
            debug!(%chain, created, "redemption backfill pass done");
        }
    }

    /// Picks up new redemption requests, then fetches attestations and settles on L1.
    pub async fn run_redemption_pass(&self) {
        for (chain, service) in &self.redemption_services {
            let created = service.poll_redemption_requests().await;
            if created > 0 {
                info!(%chain, created, "new redemption requests");
            }

            service.process_pending_redemptions().await;
            service.process_vaa_fetched_redemptions().await;
        }
    }

    async fn load(&self, chain: &ChainName, status: DepositStatus) -> Vec<Deposit> {
        match self.deposits.get_deposits_by_status(chain, status).await {
            Ok(deposits) => deposits,
            Err(err) => {
                error!(%chain, %status, %err, "could not load deposits");
                Vec::new()
            }
        }
    }
}
