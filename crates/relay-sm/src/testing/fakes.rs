use std::{collections::HashMap, sync::Mutex};

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use tbtc_relayer_chain_clients::{
    errors::{ChainClientError, ClientResult},
    traits::{ChainReader, L1BitcoinDepositor, L1RedemptionHandler, L2RedemptionSource, TbtcVault},
    types::{BridgeEvent, OnChainDepositState, RedemptionRequestedEvent, TxReceipt},
};
use tbtc_relayer_primitives::prelude::{BlockHeight, DepositId, FundingTx, RevealInfo};

fn receipt(tx_hash: B256, block_number: BlockHeight, success: bool) -> TxReceipt {
    TxReceipt {
        tx_hash,
        block_number: Some(block_number),
        success,
        logs: vec![],
    }
}

#[derive(Debug)]
pub(crate) struct DepositorState {
    pub(crate) head: BlockHeight,
    pub(crate) on_chain: HashMap<DepositId, OnChainDepositState>,
    pub(crate) deposit_state_error: Option<ChainClientError>,
    pub(crate) submissions_succeed: bool,
    pub(crate) quote: U256,
    pub(crate) cost: U256,
    pub(crate) balance: U256,
    pub(crate) receipts: HashMap<B256, TxReceipt>,
    pub(crate) events: Vec<BridgeEvent>,
    pub(crate) deposit_txs: HashMap<(DepositId, OnChainDepositState), (B256, BlockHeight)>,
    pub(crate) tx_lookups: Vec<(DepositId, OnChainDepositState, BlockHeight, BlockHeight)>,
    pub(crate) initialize_calls: Vec<(DepositId, B256)>,
    pub(crate) finalize_calls: Vec<(DepositId, U256)>,
    pub(crate) event_queries: Vec<(BlockHeight, BlockHeight)>,
}

/// An L1 depositor that mines every submission immediately at the head block.
#[derive(Debug)]
pub(crate) struct FakeDepositor {
    pub(crate) state: Mutex<DepositorState>,
}

impl FakeDepositor {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(DepositorState {
                head: 1_000,
                on_chain: HashMap::new(),
                deposit_state_error: None,
                submissions_succeed: true,
                quote: U256::from(1_000),
                cost: U256::from(500),
                balance: U256::from(1_000_000),
                receipts: HashMap::new(),
                events: vec![],
                deposit_txs: HashMap::new(),
                tx_lookups: vec![],
                initialize_calls: vec![],
                finalize_calls: vec![],
                event_queries: vec![],
            }),
        }
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut DepositorState) -> R) -> R {
        f(&mut self.state.lock().expect("depositor lock"))
    }

    pub(crate) fn submit_count(&self) -> usize {
        self.with(|s| s.initialize_calls.len() + s.finalize_calls.len())
    }

    /// Records that another relayer moved the deposit into `state` with `tx_hash`.
    pub(crate) fn mined_elsewhere(
        &self,
        id: DepositId,
        state: OnChainDepositState,
        tx_hash: B256,
        block_number: BlockHeight,
    ) {
        self.with(|s| {
            s.on_chain.insert(id, state);
            s.deposit_txs.insert((id, state), (tx_hash, block_number));
            s.receipts
                .insert(tx_hash, receipt(tx_hash, block_number, true));
        });
    }
}

#[async_trait]
impl ChainReader for FakeDepositor {
    async fn block_number(&self) -> ClientResult<BlockHeight> {
        Ok(self.with(|s| s.head))
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> ClientResult<Option<TxReceipt>> {
        Ok(self.with(|s| s.receipts.get(&tx_hash).cloned()))
    }
}

#[async_trait]
impl L1BitcoinDepositor for FakeDepositor {
    fn signer_address(&self) -> Address {
        Address::repeat_byte(0x51)
    }

    async fn deposit_state(&self, id: DepositId) -> ClientResult<OnChainDepositState> {
        self.with(|s| match &s.deposit_state_error {
            Some(err) => Err(err.clone()),
            None => Ok(s
                .on_chain
                .get(&id)
                .copied()
                .unwrap_or(OnChainDepositState::Unknown)),
        })
    }

    async fn initialize_deposit(
        &self,
        funding_tx: &FundingTx,
        reveal: &RevealInfo,
        owner: B256,
    ) -> ClientResult<TxReceipt> {
        let id = DepositId::derive(&funding_tx.txid(), reveal.funding_output_index);

        Ok(self.with(|s| {
            s.initialize_calls.push((id, owner));
            let tx_hash = B256::with_last_byte(0xa0 + s.initialize_calls.len() as u8);
            let receipt = receipt(tx_hash, s.head, s.submissions_succeed);
            if s.submissions_succeed {
                s.on_chain.insert(id, OnChainDepositState::Initialized);
                s.deposit_txs
                    .insert((id, OnChainDepositState::Initialized), (tx_hash, s.head));
            }
            s.receipts.insert(tx_hash, receipt.clone());
            receipt
        }))
    }

    async fn quote_finalize_deposit(&self) -> ClientResult<U256> {
        Ok(self.with(|s| s.quote))
    }

    async fn estimate_finalize_deposit_cost(
        &self,
        _id: DepositId,
        _value: U256,
    ) -> ClientResult<U256> {
        Ok(self.with(|s| s.cost))
    }

    async fn signer_balance(&self) -> ClientResult<U256> {
        Ok(self.with(|s| s.balance))
    }

    async fn finalize_deposit(&self, id: DepositId, value: U256) -> ClientResult<TxReceipt> {
        Ok(self.with(|s| {
            s.finalize_calls.push((id, value));
            let tx_hash = B256::with_last_byte(0xf0 + s.finalize_calls.len() as u8);
            let receipt = receipt(tx_hash, s.head, s.submissions_succeed);
            if s.submissions_succeed {
                s.on_chain.insert(id, OnChainDepositState::Finalized);
                s.deposit_txs
                    .insert((id, OnChainDepositState::Finalized), (tx_hash, s.head));
            }
            s.receipts.insert(tx_hash, receipt.clone());
            receipt
        }))
    }

    async fn deposit_transaction(
        &self,
        id: DepositId,
        state: OnChainDepositState,
        from_block: BlockHeight,
        to_block: BlockHeight,
    ) -> ClientResult<Option<B256>> {
        Ok(self.with(|s| {
            s.tx_lookups.push((id, state, from_block, to_block));
            s.deposit_txs
                .get(&(id, state))
                .filter(|(_, block)| (from_block..=to_block).contains(block))
                .map(|(tx_hash, _)| *tx_hash)
        }))
    }

    async fn bridge_events(
        &self,
        from_block: BlockHeight,
        to_block: BlockHeight,
    ) -> ClientResult<Vec<BridgeEvent>> {
        Ok(self.with(|s| {
            s.event_queries.push((from_block, to_block));
            s.events
                .iter()
                .filter(|event| (from_block..=to_block).contains(&event.block_number))
                .cloned()
                .collect()
        }))
    }
}

/// A vault that reports a fixed mint status and remembers the search ranges.
#[derive(Debug, Default)]
pub(crate) struct FakeVault {
    pub(crate) minted: Mutex<bool>,
    pub(crate) searches: Mutex<Vec<(DepositId, BlockHeight)>>,
}

impl FakeVault {
    pub(crate) fn minted() -> Self {
        Self {
            minted: Mutex::new(true),
            searches: Mutex::default(),
        }
    }

    pub(crate) fn searches(&self) -> Vec<(DepositId, BlockHeight)> {
        self.searches.lock().expect("vault lock").clone()
    }
}

#[async_trait]
impl TbtcVault for FakeVault {
    async fn optimistic_minting_finalized(
        &self,
        id: DepositId,
        from_block: BlockHeight,
    ) -> ClientResult<bool> {
        self.searches
            .lock()
            .expect("vault lock")
            .push((id, from_block));
        Ok(*self.minted.lock().expect("vault lock"))
    }
}

/// An L2 redeemer with a fixed list of requests.
#[derive(Debug)]
pub(crate) struct FakeL2Source {
    pub(crate) head: BlockHeight,
    pub(crate) events: Vec<RedemptionRequestedEvent>,
}

#[async_trait]
impl ChainReader for FakeL2Source {
    async fn block_number(&self) -> ClientResult<BlockHeight> {
        Ok(self.head)
    }

    async fn transaction_receipt(&self, _tx_hash: B256) -> ClientResult<Option<TxReceipt>> {
        Ok(None)
    }
}

#[async_trait]
impl L2RedemptionSource for FakeL2Source {
    async fn redemption_requests(
        &self,
        from_block: BlockHeight,
        to_block: BlockHeight,
    ) -> ClientResult<Vec<RedemptionRequestedEvent>> {
        Ok(self
            .events
            .iter()
            .filter(|event| (from_block..=to_block).contains(&event.block_number))
            .cloned()
            .collect())
    }
}

/// Settles redemptions with a scripted outcome.
#[derive(Debug)]
pub(crate) struct FakeRedemptionHandler {
    pub(crate) outcome: Result<bool, ChainClientError>,
    pub(crate) submitted: Mutex<Vec<Bytes>>,
}

impl FakeRedemptionHandler {
    pub(crate) fn new(outcome: Result<bool, ChainClientError>) -> Self {
        Self {
            outcome,
            submitted: Mutex::default(),
        }
    }

    pub(crate) fn submitted(&self) -> Vec<Bytes> {
        self.submitted.lock().expect("handler lock").clone()
    }
}

#[async_trait]
impl L1RedemptionHandler for FakeRedemptionHandler {
    async fn submit_redemption_vaa(&self, vaa_bytes: &Bytes) -> ClientResult<TxReceipt> {
        self.submitted
            .lock()
            .expect("handler lock")
            .push(vaa_bytes.clone());
        let success = self.outcome.clone()?;
        Ok(receipt(B256::repeat_byte(0x1c), 2_000, success))
    }
}
