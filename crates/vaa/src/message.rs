//! Cross-chain messages and how they are found in transaction receipts.

use std::fmt;

use alloy_primitives::{Address, B256};
use alloy_sol_types::{sol, SolEvent};
use tbtc_relayer_chain_clients::types::TxReceipt;
use tbtc_relayer_primitives::chain::WormholeChainId;
use tracing::warn;

sol! {
    /// Emitted by the core contract for every published message.
    event LogMessagePublished(
        address indexed sender,
        uint64 sequence,
        uint32 nonce,
        bytes payload,
        uint8 consistencyLevel
    );
}

/// Identifies a published message, and therefore the attestation for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId {
    /// The chain the message was published on.
    pub chain: WormholeChainId,
    /// The publishing contract, left-padded to 32 bytes.
    pub emitter: B256,
    /// The emitter's sequence number for the message.
    pub sequence: u64,
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.chain.get(),
            hex::encode(self.emitter),
            self.sequence
        )
    }
}

/// Left-pads an EVM address into the 32-byte emitter form.
pub fn emitter_from_address(address: Address) -> B256 {
    address.into_word()
}

/// Collects the messages `core_contract` published in `receipt`.
pub fn messages_in_receipt(
    receipt: &TxReceipt,
    chain: WormholeChainId,
    core_contract: Address,
) -> Vec<MessageId> {
    receipt
        .logs
        .iter()
        .filter(|log| {
            log.address == core_contract
                && log.topics.first() == Some(&LogMessagePublished::SIGNATURE_HASH)
        })
        .filter_map(|log| {
            match LogMessagePublished::decode_raw_log(log.topics.iter().copied(), &log.data, true)
            {
                Ok(event) => Some(MessageId {
                    chain,
                    emitter: emitter_from_address(event.sender),
                    sequence: event.sequence,
                }),
                Err(err) => {
                    warn!(tx_hash = %receipt.tx_hash, %err, "skipping undecodable message log");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::message_log;

    #[test]
    fn finds_only_core_contract_messages() {
        let core = Address::repeat_byte(0xc0);
        let emitter = Address::repeat_byte(0xde);
        let mut impostor = message_log(Address::repeat_byte(0x99), emitter, 8);
        impostor.topics[1] = B256::repeat_byte(0x01);

        let receipt = TxReceipt {
            tx_hash: B256::repeat_byte(0x77),
            block_number: Some(100),
            success: true,
            logs: vec![message_log(core, emitter, 7), impostor],
        };

        let messages = messages_in_receipt(&receipt, WormholeChainId::ETHEREUM, core);

        assert_eq!(
            messages,
            vec![MessageId {
                chain: WormholeChainId::ETHEREUM,
                emitter: emitter.into_word(),
                sequence: 7,
            }]
        );
    }

    #[test]
    fn renders_as_guardian_path() {
        let id = MessageId {
            chain: WormholeChainId::ETHEREUM,
            emitter: B256::with_last_byte(0x01),
            sequence: 9,
        };

        assert_eq!(
            id.to_string(),
            format!("2/{}01/9", "0".repeat(62))
        );
    }
}
