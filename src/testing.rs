//! Test support: an in-memory mock of the [`EthRpc`] contract
//!
//! Lets component tests script node behavior (balances, pending counts,
//! fee data, receipts, logs) without a network. Compiled for unit tests and
//! behind the `testing` feature for downstream test suites.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use primitive_types::U256;

use crate::error::WalletError;
use crate::hash::keccak256;
use crate::rpc::{
    Block, BlockTag, CallRequest, EthRpc, FeeHistory, LogEntry, LogFilter, RpcTransaction,
    TransactionReceipt,
};
use crate::types::{Address, Bytes, Hash};

#[derive(Default)]
struct MockState {
    balances: HashMap<Address, U256>,
    pending_count: u64,
    nonce_fetches: u64,
    block_number: u64,
    base_fee: Option<U256>,
    priority_fee: U256,
    gas_price: U256,
    estimate_gas: u64,
    /// When set, `eth_estimateGas` and `eth_call` fail with this revert data
    revert_data: Option<String>,
    /// Scripted `eth_call` results keyed by 4-byte selector
    call_results: HashMap<[u8; 4], Vec<Bytes>>,
    logs: Vec<LogEntry>,
    receipts: HashMap<Hash, TransactionReceipt>,
    sent: Vec<Vec<u8>>,
    /// Receipts to attach to upcoming sends, oldest first
    next_send_reverts: bool,
    next_receipt_logs: Vec<LogEntry>,
    fail_next_send: Option<String>,
}

/// Scriptable in-memory node
pub struct MockRpc {
    chain: u64,
    state: Mutex<MockState>,
}

impl MockRpc {
    pub fn new(chain_id: u64) -> Self {
        MockRpc {
            chain: chain_id,
            state: Mutex::new(MockState {
                estimate_gas: 21_000,
                gas_price: U256::from(2_000_000_000u64),
                priority_fee: U256::from(1_500_000_000u64),
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.lock().balances.insert(address, balance);
    }

    pub fn set_pending_count(&self, count: u64) {
        self.lock().pending_count = count;
    }

    /// How many times `eth_getTransactionCount` has been served
    pub fn nonce_fetches(&self) -> u64 {
        self.lock().nonce_fetches
    }

    pub fn set_block_number(&self, number: u64) {
        self.lock().block_number = number;
    }

    pub fn set_base_fee(&self, base_fee: Option<U256>) {
        self.lock().base_fee = base_fee;
    }

    pub fn set_priority_fee(&self, fee: U256) {
        self.lock().priority_fee = fee;
    }

    pub fn set_gas_price(&self, price: U256) {
        self.lock().gas_price = price;
    }

    pub fn set_estimate_gas(&self, gas: u64) {
        self.lock().estimate_gas = gas;
    }

    /// Make estimation and calls revert with the given ABI-encoded data
    pub fn set_revert(&self, data_hex: &str) {
        self.lock().revert_data = Some(data_hex.to_string());
    }

    pub fn clear_revert(&self) {
        self.lock().revert_data = None;
    }

    /// Queue an `eth_call` result for the given function selector
    pub fn push_call_result(&self, selector: [u8; 4], result: Bytes) {
        self.lock()
            .call_results
            .entry(selector)
            .or_default()
            .push(result);
    }

    pub fn push_log(&self, log: LogEntry) {
        self.lock().logs.push(log);
    }

    /// Attach logs to the receipt of the next submitted transaction
    pub fn set_next_receipt_logs(&self, logs: Vec<LogEntry>) {
        self.lock().next_receipt_logs = logs;
    }

    /// Make the next submitted transaction mine with a failed status
    pub fn set_next_send_reverts(&self) {
        self.lock().next_send_reverts = true;
    }

    /// Make the next `eth_sendRawTransaction` fail at submission
    pub fn set_fail_next_send(&self, message: &str) {
        self.lock().fail_next_send = Some(message.to_string());
    }

    /// Raw transactions accepted so far, oldest first
    pub fn sent_transactions(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    fn revert_error(data: &str) -> WalletError {
        WalletError::Rpc {
            code: 3,
            message: "execution reverted".to_string(),
            data: Some(data.to_string()),
        }
    }
}

#[async_trait]
impl EthRpc for MockRpc {
    async fn get_balance(&self, address: Address) -> Result<U256, WalletError> {
        Ok(self
            .lock()
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn get_transaction_count(
        &self,
        _address: Address,
        _pending: bool,
    ) -> Result<u64, WalletError> {
        let mut state = self.lock();
        state.nonce_fetches += 1;
        Ok(state.pending_count)
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        Ok(self.chain)
    }

    async fn block_number(&self) -> Result<u64, WalletError> {
        Ok(self.lock().block_number)
    }

    async fn get_block(&self, _tag: BlockTag) -> Result<Option<Block>, WalletError> {
        let state = self.lock();
        Ok(Some(Block {
            number: Some(state.block_number),
            hash: None,
            base_fee_per_gas: state.base_fee,
            timestamp: 1_700_000_000,
        }))
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, WalletError> {
        let state = self.lock();
        let matches = |log: &LogEntry| {
            let block = log.block_number.unwrap_or(0);
            if block < filter.from_block || block > filter.to_block {
                return false;
            }
            if !filter.address.is_empty() && !filter.address.contains(&log.address) {
                return false;
            }
            for (i, wanted) in filter.topics.iter().enumerate() {
                if let Some(topic) = wanted {
                    if log.topics.get(i) != Some(topic) {
                        return false;
                    }
                }
            }
            true
        };
        Ok(state.logs.iter().filter(|l| matches(l)).cloned().collect())
    }

    async fn call(&self, request: &CallRequest) -> Result<Bytes, WalletError> {
        let mut state = self.lock();
        if let Some(data) = &state.revert_data {
            return Err(Self::revert_error(data));
        }
        let selector: Option<[u8; 4]> = request
            .data
            .as_ref()
            .and_then(|d| d.0.get(..4))
            .map(|s| [s[0], s[1], s[2], s[3]]);
        if let Some(selector) = selector {
            if let Some(queue) = state.call_results.get_mut(&selector) {
                if !queue.is_empty() {
                    return Ok(queue.remove(0));
                }
            }
        }
        // Default: one zero word, the shape of most view calls
        Ok(Bytes(vec![0u8; 32]))
    }

    async fn estimate_gas(&self, _request: &CallRequest) -> Result<u64, WalletError> {
        let state = self.lock();
        if let Some(data) = &state.revert_data {
            return Err(Self::revert_error(data));
        }
        Ok(state.estimate_gas)
    }

    async fn gas_price(&self) -> Result<U256, WalletError> {
        Ok(self.lock().gas_price)
    }

    async fn max_priority_fee_per_gas(&self) -> Result<U256, WalletError> {
        Ok(self.lock().priority_fee)
    }

    async fn fee_history(
        &self,
        _block_count: u64,
        _newest: BlockTag,
        _reward_percentiles: &[f64],
    ) -> Result<FeeHistory, WalletError> {
        let state = self.lock();
        Ok(FeeHistory {
            oldest_block: state.block_number.saturating_sub(1),
            base_fee_per_gas: vec![state.base_fee.unwrap_or_default()],
            reward: None,
        })
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<Hash, WalletError> {
        let mut state = self.lock();
        if let Some(message) = state.fail_next_send.take() {
            return Err(WalletError::Rpc {
                code: -32000,
                message,
                data: None,
            });
        }
        let hash = Hash(keccak256(raw));
        state.sent.push(raw.to_vec());
        let status = if std::mem::take(&mut state.next_send_reverts) {
            0
        } else {
            1
        };
        let logs = std::mem::take(&mut state.next_receipt_logs);
        let block_number = state.block_number;
        state.receipts.insert(
            hash,
            TransactionReceipt {
                transaction_hash: hash,
                block_number: Some(block_number),
                status: Some(status),
                gas_used: 21_000,
                effective_gas_price: None,
                logs,
                contract_address: None,
            },
        );
        Ok(hash)
    }

    async fn get_transaction_receipt(
        &self,
        hash: Hash,
    ) -> Result<Option<TransactionReceipt>, WalletError> {
        Ok(self.lock().receipts.get(&hash).cloned())
    }

    async fn get_transaction_by_hash(
        &self,
        _hash: Hash,
    ) -> Result<Option<RpcTransaction>, WalletError> {
        Ok(None)
    }
}
