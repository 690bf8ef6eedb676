//! Fixtures shared by the storage tests.

use alloy_primitives::{Address, Bytes, FixedBytes, B256, U256};
use chrono::{DateTime, Utc};
use tbtc_relayer_primitives::prelude::*;

pub(crate) fn test_deposit(chain: &str, output_index: u32) -> Deposit {
    Deposit::from_reveal(
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
                vault: Address::repeat_byte(0x22),
            },
            owner: "0x2222222222222222222222222222222222222222".to_string(),
        },
        Utc::now(),
    )
}

pub(crate) fn test_redemption(chain: &str, id_byte: u8, now: DateTime<Utc>) -> Redemption {
    Redemption::new(
        B256::repeat_byte(id_byte),
        ChainName::from(chain),
        RedemptionRequest {
            wallet_pub_key_hash: FixedBytes::from([8u8; 20]),
            main_utxo: MainUtxo {
                tx_hash: B256::repeat_byte(0x10),
                output_index: 1,
                value: 250_000,
            },
            redeemer_output_script: Bytes::from(vec![0x00, 0x14, 0xab]),
            amount: U256::from(100_000u64),
        },
        now,
    )
}
