//! Incoming-payment watcher
//!
//! Polls `Transfer` logs for a set of watched tokens paid *to* one account,
//! decodes them into [`IncomingPayment`]s, and dispatches to registered
//! handlers in block and log-index order. Starts at the current head (no
//! back-scan) and advances a block cursor after each poll.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use primitive_types::U256;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::codec::abi::{self, AbiType};
use crate::error::WalletError;
use crate::rpc::{EthRpc, LogEntry, LogFilter};
use crate::tokens::transfer_topic;
use crate::types::{format_units, Address, Hash};

/// Default poll cadence, roughly one mainnet block
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(12);

/// A token the watcher follows
#[derive(Debug, Clone)]
pub struct WatchedToken {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

/// Watcher configuration
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub tokens: Vec<WatchedToken>,
    /// The account receiving payments
    pub account: Address,
    pub poll_interval: Duration,
}

impl WatcherConfig {
    pub fn new(tokens: Vec<WatchedToken>, account: Address) -> Self {
        WatcherConfig {
            tokens,
            account,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// A decoded incoming ERC-20 payment
#[derive(Debug, Clone, Serialize)]
pub struct IncomingPayment {
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub amount: U256,
    /// Human-formatted amount with symbol, e.g. `"100 USDC"`
    pub formatted_amount: String,
    pub transaction_hash: Hash,
    pub block_number: u64,
    pub log_index: u64,
}

/// Per-handler match predicate
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub token: Option<Address>,
    pub from: Option<Address>,
    pub min_amount: Option<U256>,
}

impl PaymentFilter {
    fn matches(&self, payment: &IncomingPayment) -> bool {
        if let Some(token) = self.token {
            if payment.token != token {
                return false;
            }
        }
        if let Some(from) = self.from {
            if payment.from != from {
                return false;
            }
        }
        if let Some(min) = self.min_amount {
            if payment.amount < min {
                return false;
            }
        }
        true
    }
}

type Callback = Arc<dyn Fn(&IncomingPayment) + Send + Sync>;

struct RegisteredHandler {
    id: u64,
    filter: PaymentFilter,
    callback: Callback,
}

struct WatcherInner {
    rpc: Arc<dyn EthRpc>,
    config: WatcherConfig,
    handlers: Mutex<Vec<RegisteredHandler>>,
    next_id: AtomicU64,
    last_block: AtomicU64,
    running: AtomicBool,
}

/// The payment watcher; see module docs
pub struct PaymentWatcher {
    inner: Arc<WatcherInner>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PaymentWatcher {
    pub fn new(rpc: Arc<dyn EthRpc>, config: WatcherConfig) -> Self {
        PaymentWatcher {
            inner: Arc::new(WatcherInner {
                rpc,
                config,
                handlers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                last_block: AtomicU64::new(0),
                running: AtomicBool::new(false),
            }),
            task: Mutex::new(None),
        }
    }

    /// Begin polling from the current head; idempotent
    pub async fn start(&self) -> Result<(), WalletError> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let chain_id = self.inner.rpc.chain_id().await?;
        let current = self.inner.rpc.block_number().await?;
        self.inner.last_block.store(current, Ordering::SeqCst);

        tracing::info!(
            chain_id,
            from_block = current + 1,
            tokens = self.inner.config.tokens.len(),
            account = %self.inner.config.account.to_checksum(),
            "payment watcher started"
        );

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(inner.config.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !inner.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = poll_cycle(&inner).await {
                    tracing::warn!(error = %e, "payment poll cycle failed");
                }
            }
        });
        *self.task.lock().expect("task slot") = Some(handle);
        Ok(())
    }

    /// Stop polling and drop every handler
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task.lock().expect("task slot").take() {
            handle.abort();
        }
        self.inner.handlers.lock().expect("handlers").clear();
        tracing::info!("payment watcher stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn handler_count(&self) -> usize {
        self.inner.handlers.lock().expect("handlers").len()
    }

    /// Register a handler; it receives every payment its filter matches
    pub fn on_payment(
        &self,
        filter: PaymentFilter,
        callback: impl Fn(&IncomingPayment) + Send + Sync + 'static,
    ) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.handlers.lock().expect("handlers").push(RegisteredHandler {
            id,
            filter,
            callback: Arc::new(callback),
        });
        id
    }

    /// Remove a handler; the watcher stops when none remain
    pub fn remove_handler(&self, id: u64) -> bool {
        let remaining = {
            let mut handlers = self.inner.handlers.lock().expect("handlers");
            let before = handlers.len();
            handlers.retain(|h| h.id != id);
            if handlers.len() == before {
                return false;
            }
            handlers.len()
        };
        if remaining == 0 {
            self.stop();
        }
        true
    }

    /// Resolve on the first payment matching `filter`, or fail with
    /// `TIMEOUT`; the internal handler is removed on either outcome
    pub async fn wait_for_payment(
        &self,
        filter: PaymentFilter,
        timeout: Duration,
    ) -> Result<IncomingPayment, WalletError> {
        self.start().await?;

        let (tx, rx) = oneshot::channel::<IncomingPayment>();
        let slot = Arc::new(Mutex::new(Some(tx)));
        let sender = slot.clone();
        let id = self.on_payment(filter, move |payment| {
            if let Some(tx) = sender.lock().expect("sender slot").take() {
                let _ = tx.send(payment.clone());
            }
        });

        let outcome = tokio::time::timeout(timeout, rx).await;
        self.remove_handler(id);

        match outcome {
            Ok(Ok(payment)) => Ok(payment),
            Ok(Err(_)) => Err(WalletError::Timeout {
                operation: "payment".to_string(),
                waited_secs: timeout.as_secs(),
            }),
            Err(_) => Err(WalletError::Timeout {
                operation: "payment".to_string(),
                waited_secs: timeout.as_secs(),
            }),
        }
    }

    /// Run one poll cycle immediately; useful for deterministic draining
    pub async fn poll_once(&self) -> Result<(), WalletError> {
        poll_cycle(&self.inner).await
    }

    /// Override the block cursor (used before manual polling)
    pub fn set_cursor(&self, block: u64) {
        self.inner.last_block.store(block, Ordering::SeqCst);
    }
}

impl Drop for PaymentWatcher {
    fn drop(&mut self) {
        if let Some(handle) = self.task.lock().ok().and_then(|mut t| t.take()) {
            handle.abort();
        }
    }
}

async fn poll_cycle(inner: &Arc<WatcherInner>) -> Result<(), WalletError> {
    let current = inner.rpc.block_number().await?;
    let last = inner.last_block.load(Ordering::SeqCst);
    if current <= last {
        return Ok(());
    }

    let filter = LogFilter {
        from_block: last + 1,
        to_block: current,
        address: inner.config.tokens.iter().map(|t| t.address).collect(),
        topics: vec![
            Some(transfer_topic()),
            None,
            Some(Hash(inner.config.account.as_word())),
        ],
    };

    let mut logs = inner.rpc.get_logs(&filter).await?;
    logs.sort_by_key(|l| (l.block_number.unwrap_or(0), l.log_index.unwrap_or(0)));

    tracing::debug!(
        from_block = last + 1,
        to_block = current,
        logs = logs.len(),
        "payment poll cycle"
    );

    for log in logs {
        match decode_transfer(inner, &log) {
            Some(payment) => {
                tracing::info!(
                    token = %payment.token.to_checksum(),
                    from = %payment.from.to_checksum(),
                    amount = %payment.formatted_amount,
                    tx_hash = %payment.transaction_hash,
                    "incoming payment"
                );
                let handlers = inner.handlers.lock().expect("handlers");
                for handler in handlers.iter() {
                    if handler.filter.matches(&payment) {
                        (handler.callback)(&payment);
                    }
                }
            }
            None => {
                tracing::warn!(
                    tx_hash = ?log.transaction_hash,
                    log_index = ?log.log_index,
                    "skipping malformed transfer log"
                );
            }
        }
    }

    inner.last_block.store(current, Ordering::SeqCst);
    Ok(())
}

fn decode_transfer(inner: &WatcherInner, log: &LogEntry) -> Option<IncomingPayment> {
    if log.removed || log.topics.is_empty() || log.data.len() < 32 {
        return None;
    }
    let decoded = abi::decode_topics(
        &[AbiType::Address, AbiType::Address],
        &log.topics[1..],
    )
    .ok()?;
    let from = decoded[0].as_address()?;
    let to = decoded[1].as_address()?;
    let amount = U256::from_big_endian(&log.data.0[..32]);

    let token = inner
        .config
        .tokens
        .iter()
        .find(|t| t.address == log.address)?;

    Some(IncomingPayment {
        token: log.address,
        from,
        to,
        amount,
        formatted_amount: format!(
            "{} {}",
            format_units(amount, token.decimals),
            token.symbol
        ),
        transaction_hash: log.transaction_hash?,
        block_number: log.block_number?,
        log_index: log.log_index.unwrap_or(0),
    })
}
