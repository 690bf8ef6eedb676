use std::{sync::Arc, time::Duration};

use alloy_primitives::{Address, B256};
use tbtc_relayer_chain_clients::{errors::ChainClientError, types::RedemptionRequestedEvent};
use tbtc_relayer_db::{redemptions::RedemptionDb, tracker::BlockCursorDb};
use tbtc_relayer_primitives::prelude::*;
use tbtc_relayer_vaa::{
    message::MessageId,
    payload::PayloadDiscriminator,
    service::{VaaConfig, VaaService},
    errors::VerifierError,
    testing::{receipt, FakeReceiptSource, FakeTokenBridge, FakeVerifier, VaaBuilder},
};

use super::*;
use crate::{batch::BatchRunner, config::ScanCfg, scan::cursor_stream, testing::*};

const CHAIN: &str = "arbitrum";

fn emitter() -> B256 {
    Address::with_last_byte(0xbb).into_word()
}

fn route() -> RedemptionRoute {
    RedemptionRoute {
        source_chain: WormholeChainId::ARBITRUM,
        emitter: emitter(),
        destination_chain: WormholeChainId::ETHEREUM,
    }
}

/// A verifier that attests every parsed transaction with a transfer from the L2 token bridge.
fn attesting_verifier() -> FakeVerifier {
    FakeVerifier::new()
        .with_message(MessageId {
            chain: WormholeChainId::ARBITRUM,
            emitter: emitter(),
            sequence: 9,
        })
        .with_attestation(
            PayloadDiscriminator::TokenBridgeTransferWithPayload,
            VaaBuilder::transfer_with_payload()
                .chain(WormholeChainId::ARBITRUM)
                .emitter(emitter())
                .sequence(9)
                .build_signed(),
        )
}

struct Harness {
    stores: Stores,
    receipts: Arc<FakeReceiptSource>,
    settlement: Arc<FakeRedemptionHandler>,
    service: RedemptionService,
}

impl Harness {
    fn new(
        verifier: FakeVerifier,
        settlement: FakeRedemptionHandler,
        events: Vec<RedemptionRequestedEvent>,
        scan: ScanCfg,
    ) -> Self {
        let stores = Stores::new();
        let receipts = Arc::new(FakeReceiptSource::new(1_000));
        let settlement = Arc::new(settlement);
        let vaa = VaaService::new(Arc::new(verifier), VaaConfig::default())
            .with_receipt_source(WormholeChainId::ARBITRUM, receipts.clone())
            .with_token_bridge(
                WormholeChainId::ETHEREUM,
                Arc::new(FakeTokenBridge::completed()),
            );

        let service = RedemptionService::new(
            ChainName::from(CHAIN),
            route(),
            scan,
            Arc::new(FakeL2Source {
                head: 1_000,
                events,
            }),
            settlement.clone(),
            Arc::new(vaa),
            stores.redemptions.clone(),
            stores.cursors.clone(),
            stores.auditor.clone(),
            BatchRunner::new(4),
        );

        Self {
            stores,
            receipts,
            settlement,
            service,
        }
    }

    fn simple(verifier: FakeVerifier, settlement: FakeRedemptionHandler) -> Self {
        Self::new(verifier, settlement, vec![], ScanCfg::default())
    }

    /// Makes the L2 request transaction of `redemption` visible to the attestation pipeline.
    fn mined(&self, id: RedemptionId) {
        self.receipts.insert(receipt(id, vec![]));
    }

    async fn stored(&self, id: RedemptionId) -> Redemption {
        self.stores
            .redemptions
            .get_redemption(&id)
            .await
            .unwrap()
            .unwrap()
    }

    async fn requested(&self, l2_tx: u8) -> RedemptionId {
        self.service
            .on_redemption_requested(redemption_event(l2_tx, 900))
            .await
            .unwrap()
            .id
    }
}

#[tokio::test]
async fn request_is_tracked_once() {
    let h = Harness::simple(FakeVerifier::new(), FakeRedemptionHandler::new(Ok(true)));

    let first = h
        .service
        .on_redemption_requested(redemption_event(0x01, 900))
        .await
        .unwrap();
    assert_eq!(first.status, RedemptionStatus::Pending);
    assert_eq!(first.vaa_status, VaaStatus::Pending);
    assert_eq!(first.request.main_utxo.value, 250_000);

    assert!(h
        .service
        .on_redemption_requested(redemption_event(0x01, 900))
        .await
        .is_none());
    assert_eq!(h.stored(first.id).await, first);
}

#[tokio::test]
async fn one_failed_fetch_does_not_block_the_batch() {
    let h = Harness::simple(attesting_verifier(), FakeRedemptionHandler::new(Ok(true)));
    let attested = h.requested(0x01).await;
    let unmined = h.requested(0x02).await;
    h.mined(attested);

    h.service.process_pending_redemptions().await;

    let ok = h.stored(attested).await;
    assert_eq!(ok.status, RedemptionStatus::VaaFetched);
    assert_eq!(ok.vaa_status, VaaStatus::Fetched);
    assert!(ok.vaa_bytes.is_some());
    assert!(ok.dates.vaa_fetched_at.is_some());

    let failed = h.stored(unmined).await;
    assert_eq!(failed.status, RedemptionStatus::VaaFailed);
    assert_eq!(failed.vaa_status, VaaStatus::Failed);
    assert!(failed.vaa_bytes.is_none());
    assert!(failed.error.is_some());
}

#[tokio::test]
async fn attestation_service_error_fails_only_its_redemption() {
    let message = |sequence| MessageId {
        chain: WormholeChainId::ARBITRUM,
        emitter: emitter(),
        sequence,
    };
    let verifier = FakeVerifier::new()
        .with_message_in(B256::repeat_byte(0x01), message(1))
        .with_message_in(B256::repeat_byte(0x02), message(2))
        .with_message_in(B256::repeat_byte(0x03), message(3))
        .with_attestation(
            PayloadDiscriminator::TokenBridgeTransferWithPayload,
            VaaBuilder::transfer_with_payload()
                .chain(WormholeChainId::ARBITRUM)
                .emitter(emitter())
                .sequence(1)
                .build_signed(),
        )
        .with_failure_for(message(2), VerifierError::Service("502 bad gateway".into()));
    let h = Harness::simple(verifier, FakeRedemptionHandler::new(Ok(true)));
    let ids = [
        h.requested(0x01).await,
        h.requested(0x02).await,
        h.requested(0x03).await,
    ];
    for id in ids {
        h.mined(id);
    }

    h.service.process_pending_redemptions().await;

    for id in [ids[0], ids[2]] {
        let fetched = h.stored(id).await;
        assert_eq!(fetched.status, RedemptionStatus::VaaFetched);
        assert_eq!(fetched.vaa_status, VaaStatus::Fetched);
        assert!(fetched.vaa_bytes.is_some());
    }

    let failed = h.stored(ids[1]).await;
    assert_eq!(failed.status, RedemptionStatus::VaaFailed);
    assert_eq!(failed.vaa_status, VaaStatus::Failed);
    assert!(failed.vaa_bytes.is_none());
    assert!(failed.error.unwrap().contains("502 bad gateway"));
}

#[tokio::test]
async fn failed_fetch_is_retried_on_the_next_pass() {
    let h = Harness::simple(attesting_verifier(), FakeRedemptionHandler::new(Ok(true)));
    let id = h.requested(0x01).await;

    h.service.process_pending_redemptions().await;
    assert_eq!(h.stored(id).await.status, RedemptionStatus::VaaFailed);

    h.mined(id);
    h.service.process_pending_redemptions().await;

    let retried = h.stored(id).await;
    assert_eq!(retried.status, RedemptionStatus::VaaFetched);
    assert_eq!(retried.error, None);
    assert!(retried.logs.iter().any(|line| line.contains("retrying")));
}

#[tokio::test]
async fn attestation_from_the_wrong_emitter_fails_the_fetch() {
    let verifier = FakeVerifier::new()
        .with_message(MessageId {
            chain: WormholeChainId::ARBITRUM,
            emitter: emitter(),
            sequence: 9,
        })
        .with_attestation(
            PayloadDiscriminator::TokenBridgeTransferWithPayload,
            VaaBuilder::transfer_with_payload()
                .chain(WormholeChainId::ARBITRUM)
                .emitter(B256::repeat_byte(0x66))
                .sequence(9)
                .build_signed(),
        );
    let h = Harness::simple(verifier, FakeRedemptionHandler::new(Ok(true)));
    let id = h.requested(0x01).await;
    h.mined(id);

    h.service.process_pending_redemptions().await;

    let stored = h.stored(id).await;
    assert_eq!(stored.status, RedemptionStatus::VaaFailed);
    assert!(stored.vaa_bytes.is_none());
}

#[tokio::test]
async fn submitted_attestation_completes_the_redemption() {
    let h = Harness::simple(attesting_verifier(), FakeRedemptionHandler::new(Ok(true)));
    let id = h.requested(0x01).await;
    h.mined(id);
    h.service.process_pending_redemptions().await;
    let fetched = h.stored(id).await;

    h.service.process_vaa_fetched_redemptions().await;

    let completed = h.stored(id).await;
    assert_eq!(completed.status, RedemptionStatus::Completed);
    assert_eq!(
        completed.l1_submission_tx_hash,
        Some(B256::repeat_byte(0x1c))
    );
    assert!(completed.dates.completed_at.is_some());
    assert_eq!(h.settlement.submitted(), vec![fetched.vaa_bytes.unwrap()]);

    // terminal redemptions are not picked up again
    h.service.process_vaa_fetched_redemptions().await;
    assert_eq!(h.settlement.submitted().len(), 1);
}

#[tokio::test]
async fn reverted_submission_fails_the_redemption() {
    let h = Harness::simple(attesting_verifier(), FakeRedemptionHandler::new(Ok(false)));
    let id = h.requested(0x01).await;
    h.mined(id);
    h.service.process_pending_redemptions().await;

    h.service.process_vaa_fetched_redemptions().await;

    let failed = h.stored(id).await;
    assert_eq!(failed.status, RedemptionStatus::Failed);
    assert_eq!(failed.l1_submission_tx_hash, Some(B256::repeat_byte(0x1c)));
    assert!(failed.error.unwrap().contains("reverted"));
}

#[tokio::test]
async fn rejected_submission_fails_the_redemption() {
    let h = Harness::simple(
        attesting_verifier(),
        FakeRedemptionHandler::new(Err(ChainClientError::Contract {
            call: "finalizeL2Redemption",
            reason: "execution reverted: transfer already completed".into(),
        })),
    );
    let id = h.requested(0x01).await;
    h.mined(id);
    h.service.process_pending_redemptions().await;

    h.service.process_vaa_fetched_redemptions().await;

    let failed = h.stored(id).await;
    assert_eq!(failed.status, RedemptionStatus::Failed);
    assert_eq!(failed.l1_submission_tx_hash, None);
    assert!(failed.error.unwrap().contains("already completed"));
}

#[tokio::test]
async fn timed_out_submission_stays_fetched() {
    let h = Harness::simple(
        attesting_verifier(),
        FakeRedemptionHandler::new(Err(ChainClientError::Timeout {
            call: "finalizeL2Redemption",
            timeout: Duration::from_secs(60),
        })),
    );
    let id = h.requested(0x01).await;
    h.mined(id);
    h.service.process_pending_redemptions().await;

    h.service.process_vaa_fetched_redemptions().await;

    let stored = h.stored(id).await;
    assert_eq!(stored.status, RedemptionStatus::VaaFetched);
    assert!(stored.error.unwrap().contains("timed out"));
    assert_eq!(stored.l1_submission_tx_hash, None);
}

#[tokio::test]
async fn backfill_tracks_each_request_once() {
    let scan = ScanCfg {
        start_block: None,
        lookback_blocks: 300,
        chunk_size: 100,
    };
    let h = Harness::new(
        FakeVerifier::new(),
        FakeRedemptionHandler::new(Ok(true)),
        vec![
            redemption_event(0x01, 650),
            redemption_event(0x02, 750),
            redemption_event(0x03, 990),
        ],
        scan,
    );

    // 650 is outside the lookback window
    assert_eq!(h.service.check_past_redemptions().await, 2);
    assert_eq!(h.service.check_past_redemptions().await, 0);

    let pending = h
        .stores
        .redemptions
        .get_redemptions_by_status(&ChainName::from(CHAIN), RedemptionStatus::Pending)
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);
}

#[tokio::test]
async fn live_tail_anchors_at_head_then_advances() {
    let h = Harness::new(
        FakeVerifier::new(),
        FakeRedemptionHandler::new(Ok(true)),
        vec![redemption_event(0x01, 990)],
        ScanCfg::default(),
    );
    let stream = cursor_stream("redemption-requests", &ChainName::from(CHAIN));

    assert_eq!(h.service.poll_redemption_requests().await, 0);
    assert_eq!(
        h.stores.cursors.get_last_scanned_block(&stream).await.unwrap(),
        Some(1_000)
    );

    h.stores
        .cursors
        .set_last_scanned_block(&stream, 980)
        .await
        .unwrap();
    assert_eq!(h.service.poll_redemption_requests().await, 1);
    assert_eq!(
        h.stores.cursors.get_last_scanned_block(&stream).await.unwrap(),
        Some(1_000)
    );
}
