use std::sync::Arc;

use alloy_primitives::{Address, Bytes, FixedBytes, B256, U256};
use tbtc_relayer_chain_clients::types::{BridgeEvent, RedemptionRequestedEvent};
use tbtc_relayer_db::{
    audit::AuditLog,
    inmemory::{AuditLogInMemory, BlockCursorInMemory, DepositDbInMemory, RedemptionDbInMemory},
};
use tbtc_relayer_primitives::prelude::*;

use crate::audit::Auditor;

pub(crate) const EVM_OWNER: &str = "0x2222222222222222222222222222222222222222";

pub(crate) fn test_reveal(chain: &str, output_index: u32, owner: &str) -> DepositReveal {
    DepositReveal {
        chain: ChainName::from(chain),
        funding_tx: FundingTx {
            version: FixedBytes::from([2, 0, 0, 0]),
            input_vector: Bytes::from(vec![0x01; 41]),
            output_vector: Bytes::from(vec![0x02; 44]),
            locktime: FixedBytes::ZERO,
        },
        reveal: RevealInfo {
            funding_output_index: output_index,
            blinding_factor: FixedBytes::from([5u8; 8]),
            wallet_pub_key_hash: FixedBytes::from([6u8; 20]),
            refund_pub_key_hash: FixedBytes::from([7u8; 20]),
            refund_locktime: FixedBytes::from([1, 2, 3, 4]),
            vault: Address::repeat_byte(0x33),
        },
        owner: owner.to_string(),
    }
}

pub(crate) fn bridge_event(id: DepositId, l1_tx: u8, block_number: BlockHeight) -> BridgeEvent {
    BridgeEvent {
        deposit_key: id.key(),
        amount: U256::from(1_000_000u64),
        l2_recipient: Address::repeat_byte(0x22).into_word(),
        nonce: U256::from(7),
        l1_tx_hash: B256::repeat_byte(l1_tx),
        block_number,
    }
}

pub(crate) fn redemption_event(l2_tx: u8, block_number: BlockHeight) -> RedemptionRequestedEvent {
    RedemptionRequestedEvent {
        l2_tx_hash: B256::repeat_byte(l2_tx),
        block_number,
        wallet_pub_key_hash: FixedBytes::from([8u8; 20]),
        main_utxo_tx_hash: B256::repeat_byte(0x10),
        main_utxo_output_index: 1,
        main_utxo_value: 250_000,
        redeemer_output_script: Bytes::from(vec![0x00, 0x14, 0xab]),
        amount: U256::from(100_000u64),
    }
}

/// In-memory stores plus an auditor draining into an in-memory trail.
pub(crate) struct Stores {
    pub(crate) deposits: Arc<DepositDbInMemory>,
    pub(crate) redemptions: Arc<RedemptionDbInMemory>,
    pub(crate) cursors: Arc<BlockCursorInMemory>,
    pub(crate) audit: Arc<AuditLogInMemory>,
    pub(crate) auditor: Auditor,
}

impl Stores {
    pub(crate) fn new() -> Self {
        let audit = Arc::new(AuditLogInMemory::default());
        let sink: Arc<dyn AuditLog> = audit.clone();
        let (auditor, _worker) = Auditor::spawn(sink);

        Self {
            deposits: Arc::new(DepositDbInMemory::default()),
            redemptions: Arc::new(RedemptionDbInMemory::default()),
            cursors: Arc::new(BlockCursorInMemory::default()),
            audit,
            auditor,
        }
    }
}
