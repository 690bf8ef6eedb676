//! Per-chain driver of the redemption state machine.

use std::{fmt, sync::Arc};

use alloy_primitives::B256;
use chrono::Utc;
use tbtc_relayer_chain_clients::{
    traits::{L1RedemptionHandler, L2RedemptionSource},
    types::RedemptionRequestedEvent,
};
use tbtc_relayer_db::{
    audit::EntityKind, errors::DbError, redemptions::RedemptionDb, tracker::BlockCursorDb,
};
use tbtc_relayer_primitives::prelude::{
    ChainName, MainUtxo, Redemption, RedemptionRequest, RedemptionStatus, WormholeChainId,
};
use tbtc_relayer_vaa::service::VaaService;
use tracing::{debug, error, info, warn};

use crate::{
    audit::Auditor,
    batch::BatchRunner,
    config::ScanCfg,
    scan::{backfill_start, block_ranges, cursor_stream},
};

/// Where the attestation for an L2 redemption request comes from and where it is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedemptionRoute {
    /// Wormhole id of the L2.
    pub source_chain: WormholeChainId,
    /// The L2 token bridge that publishes the transfer, as a 32-byte emitter.
    pub emitter: B256,
    /// Wormhole id of the L1.
    pub destination_chain: WormholeChainId,
}

/// Drives the redemptions requested on one L2.
///
/// Like the deposit handlers, operations never return errors: failures are recorded on the
/// redemption, and a failure of one redemption never affects the others in the same batch.
pub struct RedemptionService {
    chain: ChainName,
    route: RedemptionRoute,
    scan: ScanCfg,
    source: Arc<dyn L2RedemptionSource>,
    settlement: Arc<dyn L1RedemptionHandler>,
    vaa: Arc<VaaService>,
    redemptions: Arc<dyn RedemptionDb + Send + Sync>,
    cursors: Arc<dyn BlockCursorDb + Send + Sync>,
    auditor: Auditor,
    batch: BatchRunner,
}

impl fmt::Debug for RedemptionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedemptionService")
            .field("chain", &self.chain)
            .field("route", &self.route)
            .field("scan", &self.scan)
            .field("source", &self.source)
            .field("settlement", &self.settlement)
            .finish_non_exhaustive()
    }
}

impl RedemptionService {
    /// Creates the service for redemptions requested on `chain`.
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        chain: ChainName,
        route: RedemptionRoute,
        scan: ScanCfg,
        source: Arc<dyn L2RedemptionSource>,
        settlement: Arc<dyn L1RedemptionHandler>,
        vaa: Arc<VaaService>,
        redemptions: Arc<dyn RedemptionDb + Send + Sync>,
        cursors: Arc<dyn BlockCursorDb + Send + Sync>,
        auditor: Auditor,
        batch: BatchRunner,
    ) -> Self {
        Self {
            chain,
            route,
            scan,
            source,
            settlement,
            vaa,
            redemptions,
            cursors,
            auditor,
            batch,
        }
    }

    /// The L2 this service watches.
    pub const fn chain(&self) -> &ChainName {
        &self.chain
    }

    /// Starts tracking a redemption request as `PENDING`. A request that is already tracked is
    /// left untouched and `None` is returned.
    pub async fn on_redemption_requested(
        &self,
        event: RedemptionRequestedEvent,
    ) -> Option<Redemption> {
        let id = event.l2_tx_hash;

        match self.redemptions.get_redemption(&id).await {
            Ok(Some(_)) => {
                debug!(redemption_id = %id, "redemption already tracked");
                return None;
            }
            Ok(None) => {}
            Err(err) => {
                error!(redemption_id = %id, %err, "could not look up redemption");
                return None;
            }
        }

        let request = RedemptionRequest {
            wallet_pub_key_hash: event.wallet_pub_key_hash,
            main_utxo: MainUtxo {
                tx_hash: event.main_utxo_tx_hash,
                output_index: event.main_utxo_output_index,
                value: event.main_utxo_value,
            },
            redeemer_output_script: event.redeemer_output_script,
            amount: event.amount,
        };
        let redemption = Redemption::new(id, self.chain.clone(), request, Utc::now());

        match self.redemptions.create_redemption(&redemption).await {
            Ok(()) => {
                info!(redemption_id = %id, chain = %self.chain, amount = %redemption.request.amount, "redemption requested");
                self.auditor
                    .created(EntityKind::Redemption, id, redemption.status);
                Some(redemption)
            }
            // lost a race against a concurrent observer
            Err(DbError::AlreadyExists { .. }) => None,
            Err(err) => {
                error!(redemption_id = %id, %err, "could not store redemption");
                None
            }
        }
    }

    /// Fetches and verifies the attestation of every `PENDING` and `VAA_FAILED` redemption.
    pub async fn process_pending_redemptions(&self) {
        let mut pending = self.load(RedemptionStatus::Pending).await;
        pending.extend(self.load(RedemptionStatus::VaaFailed).await);
        if pending.is_empty() {
            return;
        }

        debug!(chain = %self.chain, count = pending.len(), "fetching attestations");
        self.batch
            .for_each(pending, move |redemption| self.fetch_attestation(redemption))
            .await;
    }

    /// Submits the stored attestation of every `VAA_FETCHED` redemption to the L1.
    pub async fn process_vaa_fetched_redemptions(&self) {
        let fetched = self.load(RedemptionStatus::VaaFetched).await;
        if fetched.is_empty() {
            return;
        }

        debug!(chain = %self.chain, count = fetched.len(), "submitting attestations");
        self.batch
            .for_each(fetched, move |redemption| self.submit(redemption))
            .await;
    }

    /// Replays redemption requests from the configured backfill window. Returns the number of
    /// newly tracked redemptions.
    pub async fn check_past_redemptions(&self) -> usize {
        let head = match self.source.block_number().await {
            Ok(head) => head,
            Err(err) => {
                warn!(chain = %self.chain, %err, "could not read head for redemption backfill");
                return 0;
            }
        };

        let from = backfill_start(&self.scan, head);
        let mut created = 0;
        for (lo, hi) in block_ranges(from, head, self.scan.chunk_size()) {
            match self.source.redemption_requests(lo, hi).await {
                Ok(events) => created += self.track(events).await,
                Err(err) => {
                    warn!(chain = %self.chain, lo, hi, %err, "could not query past redemption requests")
                }
            }
        }

        info!(chain = %self.chain, from, head, created, "redemption backfill done");
        created
    }

    /// Tracks redemption requests emitted since the last call. Returns the number of newly
    /// tracked redemptions.
    pub async fn poll_redemption_requests(&self) -> usize {
        let stream = cursor_stream("redemption-requests", &self.chain);

        let head = match self.source.block_number().await {
            Ok(head) => head,
            Err(err) => {
                warn!(chain = %self.chain, %err, "could not read head for redemption tail");
                return 0;
            }
        };

        let from = match self.cursors.get_last_scanned_block(&stream).await {
            Ok(Some(last)) => last.saturating_add(1),
            Ok(None) => {
                info!(chain = %self.chain, head, "starting redemption tail at head");
                if let Err(err) = self.cursors.set_last_scanned_block(&stream, head).await {
                    warn!(%stream, %err, "could not store cursor");
                }
                return 0;
            }
            Err(err) => {
                warn!(%stream, %err, "could not read cursor");
                return 0;
            }
        };

        let mut created = 0;
        for (lo, hi) in block_ranges(from, head, self.scan.chunk_size()) {
            let events = match self.source.redemption_requests(lo, hi).await {
                Ok(events) => events,
                Err(err) => {
                    warn!(chain = %self.chain, lo, hi, %err, "could not query redemption requests");
                    break;
                }
            };
            created += self.track(events).await;

            if let Err(err) = self.cursors.set_last_scanned_block(&stream, hi).await {
                warn!(%stream, %err, "could not store cursor");
                break;
            }
        }

        created
    }

    async fn track(&self, events: Vec<RedemptionRequestedEvent>) -> usize {
        let mut created = 0;
        for event in events {
            if self.on_redemption_requested(event).await.is_some() {
                created += 1;
            }
        }
        created
    }

    async fn load(&self, status: RedemptionStatus) -> Vec<Redemption> {
        match self
            .redemptions
            .get_redemptions_by_status(&self.chain, status)
            .await
        {
            Ok(redemptions) => redemptions,
            Err(err) => {
                error!(chain = %self.chain, %status, %err, "could not load redemptions");
                Vec::new()
            }
        }
    }

    async fn persist(
        &self,
        redemption: &Redemption,
        before: RedemptionStatus,
        failure: Option<String>,
    ) {
        if let Err(err) = self.redemptions.update_redemption(redemption).await {
            error!(redemption_id = %redemption.id, %err, "could not persist redemption");
            return;
        }

        if let Some(reason) = failure {
            self.auditor
                .error(EntityKind::Redemption, redemption.id, reason);
        }
        self.auditor.transition(
            EntityKind::Redemption,
            redemption.id,
            before,
            redemption.status,
        );
    }

    async fn fetch_attestation(&self, mut redemption: Redemption) {
        let before = redemption.status;
        let now = Utc::now();

        if redemption.status == RedemptionStatus::VaaFailed {
            if let Err(err) = redemption.retry(now) {
                error!(redemption_id = %redemption.id, %err, "could not retry redemption");
                return;
            }
        }

        let outcome = self
            .vaa
            .fetch_and_verify(
                redemption.id,
                self.route.source_chain,
                self.route.emitter,
                self.route.destination_chain,
            )
            .await;

        let (recorded, failure) = match outcome {
            Ok(verified) => {
                info!(redemption_id = %redemption.id, digest = %verified.digest, "attestation fetched");
                (redemption.record_vaa(verified.vaa_bytes, Utc::now()), None)
            }
            Err(err) => {
                warn!(redemption_id = %redemption.id, %err, "attestation fetch failed");
                let reason = err.to_string();
                (
                    redemption.record_vaa_failure(reason.clone(), Utc::now()),
                    Some(reason),
                )
            }
        };
        if let Err(err) = recorded {
            error!(redemption_id = %redemption.id, %err, "could not record attestation outcome");
            return;
        }

        self.persist(&redemption, before, failure).await;
    }

    async fn submit(&self, mut redemption: Redemption) {
        let before = redemption.status;
        let now = Utc::now();

        let outcome = match redemption.vaa_bytes.clone() {
            None => Err(("no attestation stored".to_string(), None)),
            Some(vaa_bytes) => match self.settlement.submit_redemption_vaa(&vaa_bytes).await {
                Ok(receipt) if receipt.success => Ok(receipt.tx_hash),
                Ok(receipt) => Err((
                    format!("L1 submission reverted in {}", receipt.tx_hash),
                    Some(receipt.tx_hash),
                )),
                Err(err) if err.is_timeout() => {
                    warn!(redemption_id = %redemption.id, %err, "L1 submission timed out, leaving for the next pass");
                    let reason = err.to_string();
                    redemption.log(format!("L1 submission timed out: {reason}"), now);
                    redemption.error = Some(reason.clone());
                    self.persist(&redemption, before, Some(reason)).await;
                    return;
                }
                Err(err) => Err((err.to_string(), None)),
            },
        };

        let (recorded, failure) = match outcome {
            Ok(tx_hash) => {
                info!(redemption_id = %redemption.id, l1_tx = %tx_hash, "redemption settled on L1");
                (redemption.record_completed(tx_hash, now), None)
            }
            Err((reason, tx_hash)) => {
                warn!(redemption_id = %redemption.id, %reason, "redemption failed");
                (
                    redemption.record_failed(reason.clone(), tx_hash, now),
                    Some(reason),
                )
            }
        };
        if let Err(err) = recorded {
            error!(redemption_id = %redemption.id, %err, "could not record submission outcome");
            return;
        }

        self.persist(&redemption, before, failure).await;
    }
}
