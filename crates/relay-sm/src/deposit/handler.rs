//! The generic deposit handler, parameterized by chain family.

use std::{fmt, sync::Arc};

use alloy_primitives::B256;
use async_trait::async_trait;
use chrono::Utc;
use tbtc_relayer_chain_clients::{
    traits::{L1BitcoinDepositor, TbtcVault},
    types::{BridgeEvent, OnChainDepositState},
};
use tbtc_relayer_db::{
    audit::EntityKind, deposits::DepositDb, errors::DbError, tracker::BlockCursorDb,
};
use tbtc_relayer_primitives::prelude::{
    BlockHeight, BridgeLeg, ChainName, Deposit, DepositId, DepositReveal, DepositStatus,
};
use tracing::{debug, error, info, warn};

use crate::{
    audit::Auditor,
    config::DepositHandlerCfg,
    deposit::{family::ChainFamily, ChainDepositHandler},
    errors::{RelayError, RelayResult},
    scan::{backfill_start, block_ranges, cursor_stream},
};

/// Drives the deposits of one destination chain of family `F`.
pub struct DepositHandler<F: ChainFamily> {
    chain: ChainName,
    family: F,
    cfg: DepositHandlerCfg,
    depositor: Arc<dyn L1BitcoinDepositor>,
    vault: Arc<dyn TbtcVault>,
    deposits: Arc<dyn DepositDb + Send + Sync>,
    cursors: Arc<dyn BlockCursorDb + Send + Sync>,
    auditor: Auditor,
}

impl<F: ChainFamily> fmt::Debug for DepositHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepositHandler")
            .field("chain", &self.chain)
            .field("family", &self.family)
            .field("cfg", &self.cfg)
            .field("depositor", &self.depositor)
            .field("vault", &self.vault)
            .finish_non_exhaustive()
    }
}

impl<F: ChainFamily> DepositHandler<F> {
    /// Creates a handler for `chain`.
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        chain: ChainName,
        family: F,
        cfg: DepositHandlerCfg,
        depositor: Arc<dyn L1BitcoinDepositor>,
        vault: Arc<dyn TbtcVault>,
        deposits: Arc<dyn DepositDb + Send + Sync>,
        cursors: Arc<dyn BlockCursorDb + Send + Sync>,
        auditor: Auditor,
    ) -> Self {
        Self {
            chain,
            family,
            cfg,
            depositor,
            vault,
            deposits,
            cursors,
            auditor,
        }
    }

    /// Returns the chain family.
    pub const fn family(&self) -> &F {
        &self.family
    }

    /// Reloads the deposit and returns it only if it is still in `expected`.
    async fn current(&self, deposit: &Deposit, expected: DepositStatus) -> Option<Deposit> {
        match self.deposits.get_deposit(&deposit.id).await {
            Ok(Some(stored)) if stored.status == expected => Some(stored),
            Ok(Some(stored)) => {
                debug!(deposit_id = %deposit.id, status = %stored.status, %expected, "deposit moved on, skipping");
                None
            }
            Ok(None) => {
                warn!(deposit_id = %deposit.id, chain = %self.chain, "deposit is not stored");
                None
            }
            Err(err) => {
                error!(deposit_id = %deposit.id, %err, "could not reload deposit");
                None
            }
        }
    }

    /// Persists a successfully advanced deposit, unless another writer got there first.
    async fn commit(&self, deposit: Deposit, before: DepositStatus) -> Option<Deposit> {
        match self.deposits.update_deposit(&deposit, before).await {
            Ok(()) => {}
            Err(DbError::StatusChanged { .. }) => {
                info!(deposit_id = %deposit.id, chain = %self.chain, from = %before, "deposit changed concurrently, dropping update");
                return None;
            }
            Err(err) => {
                error!(deposit_id = %deposit.id, chain = %self.chain, %err, "could not persist deposit");
                return None;
            }
        }

        info!(
            deposit_id = %deposit.id,
            chain = %self.chain,
            from = %before,
            to = %deposit.status,
            "deposit advanced"
        );
        self.auditor
            .transition(EntityKind::Deposit, deposit.id, before, deposit.status);

        Some(deposit)
    }

    /// Records a failed step on the deposit. Invalid recipients are terminal, everything else
    /// leaves the status in place for the next pass.
    async fn fail(&self, mut deposit: Deposit, before: DepositStatus, err: RelayError) {
        let now = Utc::now();
        let reason = err.to_string();

        if matches!(err, RelayError::Recipient(_)) {
            if let Err(record_err) = deposit.mark_errored(&reason, now) {
                error!(deposit_id = %deposit.id, %record_err, "could not mark deposit as errored");
                deposit.record_error(&reason, now);
            }
        } else {
            deposit.record_error(&reason, now);
        }

        if err.is_transient() {
            warn!(deposit_id = %deposit.id, chain = %self.chain, %reason, "deposit step failed, will retry");
        } else {
            error!(deposit_id = %deposit.id, chain = %self.chain, %reason, "deposit step failed");
        }

        match self.deposits.update_deposit(&deposit, before).await {
            Ok(()) => {}
            Err(DbError::StatusChanged { .. }) => {
                info!(deposit_id = %deposit.id, chain = %self.chain, from = %before, "deposit changed concurrently, dropping error");
                return;
            }
            Err(db_err) => {
                error!(deposit_id = %deposit.id, %db_err, "could not persist deposit error");
            }
        }

        self.auditor.error(EntityKind::Deposit, deposit.id, &reason);
        self.auditor
            .transition(EntityKind::Deposit, deposit.id, before, deposit.status);
    }

    /// Applies a step and routes its outcome. `Ok(false)` means there was nothing to do.
    async fn settle(
        &self,
        deposit: Deposit,
        before: DepositStatus,
        outcome: RelayResult<bool>,
    ) -> Option<Deposit> {
        match outcome {
            Ok(true) => self.commit(deposit, before).await,
            Ok(false) => None,
            Err(err) => {
                self.fail(deposit, before, err).await;
                None
            }
        }
    }

    /// Searches the recent depositor logs, newest chunk first, for the transaction that moved
    /// the deposit into `state`.
    async fn find_deposit_tx(
        &self,
        id: DepositId,
        state: OnChainDepositState,
    ) -> RelayResult<Option<B256>> {
        let head = self.depositor.block_number().await?;
        let from = backfill_start(self.cfg.scan(), head);

        for (lo, hi) in block_ranges(from, head, self.cfg.scan().chunk_size())
            .into_iter()
            .rev()
        {
            if let Some(tx_hash) = self
                .depositor
                .deposit_transaction(id, state, lo, hi)
                .await?
            {
                debug!(deposit_id = %id, ?state, %tx_hash, "found depositor transaction");
                return Ok(Some(tx_hash));
            }
        }

        warn!(deposit_id = %id, chain = %self.chain, ?state, from, head, "depositor transaction not found in lookback window");
        Ok(None)
    }

    /// Moves the deposit to match the contract without submitting anything, recovering the
    /// transaction hashes another relayer produced.
    async fn sync_forward(
        &self,
        deposit: &mut Deposit,
        on_chain: OnChainDepositState,
    ) -> RelayResult<bool> {
        let target = match on_chain {
            OnChainDepositState::Unknown => return Ok(false),
            OnChainDepositState::Initialized => DepositStatus::Initialized,
            OnChainDepositState::Finalized => self.family.finalized_status(),
        };
        if deposit.status == target {
            return Ok(false);
        }

        info!(
            deposit_id = %deposit.id,
            chain = %self.chain,
            ?on_chain,
            "deposit already advanced on-chain, synchronizing"
        );

        if deposit.hashes.eth.initialize_tx_hash.is_none() {
            deposit.hashes.eth.initialize_tx_hash = self
                .find_deposit_tx(deposit.id, OnChainDepositState::Initialized)
                .await?;
        }

        let now = Utc::now();
        match on_chain {
            OnChainDepositState::Finalized if deposit.hashes.eth.finalize_tx_hash.is_none() => {
                match self
                    .find_deposit_tx(deposit.id, OnChainDepositState::Finalized)
                    .await?
                {
                    Some(tx_hash) => deposit.record_finalized(tx_hash, target, now)?,
                    None => deposit.advance(target, now)?,
                }
            }
            _ => deposit.advance(target, now)?,
        }

        Ok(true)
    }

    async fn try_initialize(&self, deposit: &mut Deposit) -> RelayResult<bool> {
        let owner = self.family.encode_owner(&deposit.owner)?;

        let on_chain = self.depositor.deposit_state(deposit.id).await?;
        if on_chain != OnChainDepositState::Unknown {
            return self.sync_forward(deposit, on_chain).await;
        }

        debug!(deposit_id = %deposit.id, chain = %self.chain, "submitting initializeDeposit");
        let receipt = self
            .depositor
            .initialize_deposit(&deposit.funding_tx, &deposit.reveal, owner)
            .await?;
        if !receipt.success {
            return Err(RelayError::Rejected(format!(
                "initializeDeposit reverted in {}",
                receipt.tx_hash
            )));
        }

        deposit.record_initialized(receipt.tx_hash, Utc::now())?;

        Ok(true)
    }

    async fn try_finalize(&self, deposit: &mut Deposit) -> RelayResult<bool> {
        match self.depositor.deposit_state(deposit.id).await? {
            OnChainDepositState::Unknown => {
                return Err(RelayError::Rejected(
                    "deposit is not initialized on-chain".to_string(),
                ))
            }
            OnChainDepositState::Finalized => {
                return self
                    .sync_forward(deposit, OnChainDepositState::Finalized)
                    .await
            }
            OnChainDepositState::Initialized => {}
        }

        let quote = self.depositor.quote_finalize_deposit().await?;
        let cost = self
            .depositor
            .estimate_finalize_deposit_cost(deposit.id, quote)
            .await?;
        let balance = self.depositor.signer_balance().await?;
        let required = quote.saturating_add(cost);
        if required > balance {
            return Err(RelayError::Rejected(format!(
                "insufficient balance on {}: need {required} wei (fee {quote} + gas {cost}), have {balance}",
                self.depositor.signer_address()
            )));
        }

        debug!(deposit_id = %deposit.id, chain = %self.chain, %quote, "submitting finalizeDeposit");
        let receipt = self.depositor.finalize_deposit(deposit.id, quote).await?;
        if !receipt.success {
            return Err(RelayError::Rejected(format!(
                "finalizeDeposit reverted in {}",
                receipt.tx_hash
            )));
        }

        deposit.record_finalized(receipt.tx_hash, self.family.finalized_status(), Utc::now())?;

        Ok(true)
    }

    /// The block from which to search for the deposit's mint.
    ///
    /// Prefers the initialization block minus the safety margin, then the configured start block.
    async fn mint_search_start(&self, deposit: &Deposit) -> Option<BlockHeight> {
        if let Some(init_tx) = deposit.hashes.eth.initialize_tx_hash {
            match self.depositor.transaction_receipt(init_tx).await {
                Ok(Some(receipt)) => {
                    if let Some(block) = receipt.block_number {
                        return Some(block.saturating_sub(self.cfg.mint_safety_margin()));
                    }
                }
                Ok(None) => {
                    debug!(deposit_id = %deposit.id, %init_tx, "initialization receipt not found")
                }
                Err(err) => {
                    warn!(deposit_id = %deposit.id, %init_tx, %err, "could not fetch initialization receipt")
                }
            }
        }

        self.cfg.scan().start_block()
    }

    async fn process_events(&self, events: Vec<BridgeEvent>, is_past_event: bool) -> usize {
        let mut bridged = 0;
        for event in events {
            if self.process_bridge_event(event, is_past_event).await.is_some() {
                bridged += 1;
            }
        }
        bridged
    }
}

#[async_trait]
impl<F: ChainFamily> ChainDepositHandler for DepositHandler<F> {
    fn chain(&self) -> &ChainName {
        &self.chain
    }

    async fn register_reveal(&self, reveal: DepositReveal) -> RelayResult<DepositId> {
        if reveal.chain != self.chain {
            return Err(RelayError::Rejected(format!(
                "reveal for {} sent to the {} handler",
                reveal.chain, self.chain
            )));
        }

        let deposit = Deposit::from_reveal(reveal, Utc::now());
        let id = deposit.id;

        match self.deposits.create_deposit(&deposit).await {
            Ok(()) => {
                info!(deposit_id = %id, chain = %self.chain, "deposit queued");
                self.auditor
                    .created(EntityKind::Deposit, id, deposit.status);
                Ok(id)
            }
            Err(DbError::AlreadyExists { .. }) => {
                debug!(deposit_id = %id, chain = %self.chain, "deposit already tracked");
                Ok(id)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn initialize_deposit(&self, deposit: Deposit) -> Option<Deposit> {
        if deposit.status != DepositStatus::Queued {
            debug!(deposit_id = %deposit.id, status = %deposit.status, "not queued, skipping initialization");
            return None;
        }
        let mut deposit = self.current(&deposit, DepositStatus::Queued).await?;

        let before = deposit.status;
        let outcome = self.try_initialize(&mut deposit).await;
        self.settle(deposit, before, outcome).await
    }

    async fn finalize_deposit(&self, deposit: Deposit) -> Option<Deposit> {
        if deposit.status != DepositStatus::Initialized {
            debug!(deposit_id = %deposit.id, status = %deposit.status, "not initialized, skipping finalization");
            return None;
        }
        let mut deposit = self.current(&deposit, DepositStatus::Initialized).await?;

        let before = deposit.status;
        let outcome = self.try_finalize(&mut deposit).await;
        self.settle(deposit, before, outcome).await
    }

    async fn process_bridge_event(
        &self,
        event: BridgeEvent,
        is_past_event: bool,
    ) -> Option<Deposit> {
        let id = DepositId::from_key(event.deposit_key);

        let mut deposit = match self.deposits.get_deposit(&id).await {
            Ok(Some(deposit)) => deposit,
            Ok(None) => {
                warn!(deposit_id = %id, chain = %self.chain, l1_tx = %event.l1_tx_hash, "bridge event for unknown deposit");
                return None;
            }
            Err(err) => {
                error!(deposit_id = %id, %err, "could not load deposit for bridge event");
                return None;
            }
        };

        if deposit.chain != self.chain {
            info!(deposit_id = %id, handler = %self.chain, deposit_chain = %deposit.chain, "bridge event for another chain, ignoring");
            return None;
        }

        if deposit.status == DepositStatus::Bridged {
            if is_past_event {
                debug!(deposit_id = %id, "deposit already bridged");
            } else {
                warn!(deposit_id = %id, l1_tx = %event.l1_tx_hash, "live bridge event for an already bridged deposit");
            }
            return None;
        }

        let Some(leg) = self.family.bridge_leg(&event) else {
            debug!(deposit_id = %id, family = F::NAME, "family does not bridge through depositor events");
            return None;
        };

        let before = deposit.status;
        let outcome = deposit
            .record_bridged(leg, Utc::now())
            .map(|()| true)
            .map_err(RelayError::from);
        self.settle(deposit, before, outcome).await
    }

    async fn has_deposit_been_minted(&self, deposit: &Deposit) -> bool {
        let Some(from_block) = self.mint_search_start(deposit).await else {
            warn!(
                deposit_id = %deposit.id,
                chain = %self.chain,
                "no initialization block or start block known, refusing an unbounded mint search"
            );
            return false;
        };

        match self
            .vault
            .optimistic_minting_finalized(deposit.id, from_block)
            .await
        {
            Ok(minted) => {
                debug!(deposit_id = %deposit.id, from_block, minted, "checked optimistic mint");
                minted
            }
            Err(err) => {
                warn!(deposit_id = %deposit.id, %err, "could not check optimistic mint");
                false
            }
        }
    }

    async fn confirm_attested_bridging(&self, deposit: Deposit) -> Option<Deposit> {
        let Some(route) = self.family.attestation_route() else {
            debug!(deposit_id = %deposit.id, family = F::NAME, "family does not bridge through attestations");
            return None;
        };
        if deposit.status != DepositStatus::AwaitingAttestation {
            debug!(deposit_id = %deposit.id, status = %deposit.status, "not awaiting attestation");
            return None;
        }
        let mut deposit = self
            .current(&deposit, DepositStatus::AwaitingAttestation)
            .await?;

        let before = deposit.status;
        if deposit.hashes.eth.finalize_tx_hash.is_none() {
            match self
                .find_deposit_tx(deposit.id, OnChainDepositState::Finalized)
                .await
            {
                Ok(found) => deposit.hashes.eth.finalize_tx_hash = found,
                Err(err) => {
                    self.fail(deposit, before, err).await;
                    return None;
                }
            }
        }
        let Some(finalize_tx) = deposit.hashes.eth.finalize_tx_hash else {
            let err = RelayError::Rejected("no finalize transaction recorded".to_string());
            self.fail(deposit, before, err).await;
            return None;
        };

        let outcome = match route
            .service
            .fetch_and_verify(
                finalize_tx,
                route.source_chain,
                route.emitter,
                route.destination_chain,
            )
            .await
        {
            Ok(verified) => {
                let leg = BridgeLeg::Wormhole {
                    l1_bridge_tx_hash: finalize_tx,
                    sequence: verified.vaa.sequence,
                    vaa_hash: verified.digest,
                };
                deposit
                    .record_bridged(leg, Utc::now())
                    .map(|()| true)
                    .map_err(RelayError::from)
            }
            Err(err) => Err(err.into()),
        };

        self.settle(deposit, before, outcome).await
    }

    async fn check_past_events(&self) -> usize {
        let head = match self.depositor.block_number().await {
            Ok(head) => head,
            Err(err) => {
                warn!(chain = %self.chain, %err, "could not read head for backfill");
                return 0;
            }
        };

        let from = backfill_start(self.cfg.scan(), head);
        let mut bridged = 0;
        for (lo, hi) in block_ranges(from, head, self.cfg.scan().chunk_size()) {
            match self.depositor.bridge_events(lo, hi).await {
                Ok(events) => bridged += self.process_events(events, true).await,
                Err(err) => warn!(chain = %self.chain, lo, hi, %err, "could not query past bridge events"),
            }
        }

        info!(chain = %self.chain, from, head, bridged, "bridge event backfill done");
        bridged
    }

    async fn poll_bridge_events(&self) -> usize {
        let stream = cursor_stream("bridge-events", &self.chain);

        let head = match self.depositor.block_number().await {
            Ok(head) => head,
            Err(err) => {
                warn!(chain = %self.chain, %err, "could not read head for live tail");
                return 0;
            }
        };

        let from = match self.cursors.get_last_scanned_block(&stream).await {
            Ok(Some(last)) => last.saturating_add(1),
            Ok(None) => {
                info!(chain = %self.chain, head, "starting bridge event tail at head");
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

        let mut bridged = 0;
        for (lo, hi) in block_ranges(from, head, self.cfg.scan().chunk_size()) {
            let events = match self.depositor.bridge_events(lo, hi).await {
                Ok(events) => events,
                Err(err) => {
                    warn!(chain = %self.chain, lo, hi, %err, "could not query bridge events");
                    break;
                }
            };
            bridged += self.process_events(events, false).await;

            if let Err(err) = self.cursors.set_last_scanned_block(&stream, hi).await {
                warn!(%stream, %err, "could not store cursor");
                break;
            }
        }

        bridged
    }
}
