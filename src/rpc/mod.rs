//! Typed Ethereum JSON-RPC client
//!
//! [`EthRpc`] is the method contract every component programs against;
//! [`HttpRpc`] implements it over JSON-RPC 2.0 with reqwest. The chain id is
//! fetched once and cached for the life of the client. Receipt waiting polls
//! on a bounded cadence with exponential backoff.

pub mod types;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use primitive_types::U256;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use url::Url;

use crate::error::WalletError;
use crate::types::{Address, Bytes, Hash};
pub use types::{
    parse_u256_hex, parse_u64_hex, Block, BlockTag, CallRequest, FeeHistory, LogEntry, LogFilter,
    RpcTransaction, TransactionReceipt,
};

/// Initial receipt poll interval; backs off exponentially to [`MAX_POLL`]
const INITIAL_POLL: Duration = Duration::from_millis(500);
const MAX_POLL: Duration = Duration::from_secs(8);

/// The Ethereum node method contract the wallet consumes
#[async_trait]
pub trait EthRpc: Send + Sync {
    async fn get_balance(&self, address: Address) -> Result<U256, WalletError>;

    /// Transaction count; `pending` includes mempool transactions
    async fn get_transaction_count(
        &self,
        address: Address,
        pending: bool,
    ) -> Result<u64, WalletError>;

    /// Chain id, cached after the first call
    async fn chain_id(&self) -> Result<u64, WalletError>;

    async fn block_number(&self) -> Result<u64, WalletError>;

    async fn get_block(&self, tag: BlockTag) -> Result<Option<Block>, WalletError>;

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, WalletError>;

    /// `eth_call` against pending state
    async fn call(&self, request: &CallRequest) -> Result<Bytes, WalletError>;

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, WalletError>;

    async fn gas_price(&self) -> Result<U256, WalletError>;

    async fn max_priority_fee_per_gas(&self) -> Result<U256, WalletError>;

    async fn fee_history(
        &self,
        block_count: u64,
        newest: BlockTag,
        reward_percentiles: &[f64],
    ) -> Result<FeeHistory, WalletError>;

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<Hash, WalletError>;

    async fn get_transaction_receipt(
        &self,
        hash: Hash,
    ) -> Result<Option<TransactionReceipt>, WalletError>;

    async fn get_transaction_by_hash(
        &self,
        hash: Hash,
    ) -> Result<Option<RpcTransaction>, WalletError>;

    /// Poll for a receipt until it lands with `confirmations` blocks on top,
    /// backing off exponentially, or fail with `TIMEOUT`
    async fn wait_for_transaction(
        &self,
        hash: Hash,
        confirmations: u64,
        timeout: Duration,
    ) -> Result<TransactionReceipt, WalletError> {
        let started = Instant::now();
        let mut poll = INITIAL_POLL;

        loop {
            if let Some(receipt) = self.get_transaction_receipt(hash).await? {
                if confirmations <= 1 {
                    return Ok(receipt);
                }
                if let Some(mined_at) = receipt.block_number {
                    let head = self.block_number().await?;
                    if head.saturating_sub(mined_at) + 1 >= confirmations {
                        return Ok(receipt);
                    }
                }
            }

            if started.elapsed() >= timeout {
                return Err(WalletError::Timeout {
                    operation: format!("receipt for {hash}"),
                    waited_secs: started.elapsed().as_secs(),
                });
            }

            tokio::time::sleep(poll).await;
            poll = (poll * 3 / 2).min(MAX_POLL);
        }
    }
}

// ============================================================================
// HTTP implementation
// ============================================================================

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// JSON-RPC 2.0 client over HTTP(S)
pub struct HttpRpc {
    http: reqwest::Client,
    url: Url,
    next_id: AtomicU64,
    cached_chain_id: Mutex<Option<u64>>,
}

impl HttpRpc {
    pub fn new(rpc_url: &str) -> Result<Self, WalletError> {
        let url = rpc_url.parse::<Url>().map_err(|e| WalletError::Network {
            message: format!("invalid RPC URL: {e}"),
        })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| WalletError::Network {
                message: e.to_string(),
            })?;

        tracing::debug!(rpc_url = %url, "created RPC client");

        Ok(HttpRpc {
            http,
            url,
            next_id: AtomicU64::new(1),
            cached_chain_id: Mutex::new(None),
        })
    }

    async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<R, WalletError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(WalletError::RateLimited { retry_after });
        }

        let payload: JsonRpcResponse =
            response.json().await.map_err(classify_transport_error)?;

        if let Some(error) = payload.error {
            return Err(classify_rpc_error(method, error));
        }

        let result = payload.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|e| WalletError::Network {
            message: format!("malformed `{method}` response: {e}"),
        })
    }
}

fn classify_transport_error(error: reqwest::Error) -> WalletError {
    if error.is_timeout() {
        WalletError::Timeout {
            operation: "rpc request".to_string(),
            waited_secs: 30,
        }
    } else {
        WalletError::Network {
            message: error.to_string(),
        }
    }
}

fn classify_rpc_error(method: &str, error: JsonRpcErrorObject) -> WalletError {
    let lowered = error.message.to_lowercase();

    if error.code == -32005 || lowered.contains("rate limit") || lowered.contains("too many") {
        return WalletError::RateLimited { retry_after: None };
    }
    if lowered.contains("nonce too low") {
        return WalletError::NonceTooLow {
            message: error.message,
        };
    }
    if lowered.contains("underpriced") {
        return WalletError::TransactionUnderpriced {
            message: error.message,
        };
    }

    tracing::debug!(
        method = method,
        code = error.code,
        message = %error.message,
        "rpc error"
    );

    WalletError::Rpc {
        code: error.code,
        message: error.message,
        data: error.data.and_then(|d| match d {
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }),
    }
}

#[async_trait]
impl EthRpc for HttpRpc {
    async fn get_balance(&self, address: Address) -> Result<U256, WalletError> {
        let result: String = self
            .request(
                "eth_getBalance",
                json!([address.to_lowercase_hex(), "latest"]),
            )
            .await?;
        parse_u256_hex(&result)
    }

    async fn get_transaction_count(
        &self,
        address: Address,
        pending: bool,
    ) -> Result<u64, WalletError> {
        let tag = if pending { "pending" } else { "latest" };
        let result: String = self
            .request(
                "eth_getTransactionCount",
                json!([address.to_lowercase_hex(), tag]),
            )
            .await?;
        parse_u64_hex(&result)
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        let mut cached = self.cached_chain_id.lock().await;
        if let Some(id) = *cached {
            return Ok(id);
        }
        let result: String = self.request("eth_chainId", json!([])).await?;
        let id = parse_u64_hex(&result)?;
        *cached = Some(id);
        tracing::debug!(chain_id = id, "cached chain id");
        Ok(id)
    }

    async fn block_number(&self) -> Result<u64, WalletError> {
        let result: String = self.request("eth_blockNumber", json!([])).await?;
        parse_u64_hex(&result)
    }

    async fn get_block(&self, tag: BlockTag) -> Result<Option<Block>, WalletError> {
        self.request("eth_getBlockByNumber", json!([tag.to_param(), false]))
            .await
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, WalletError> {
        self.request("eth_getLogs", json!([filter.to_param()])).await
    }

    async fn call(&self, request: &CallRequest) -> Result<Bytes, WalletError> {
        let result: String = self
            .request("eth_call", json!([request, "pending"]))
            .await?;
        Bytes::from_hex(&result)
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, WalletError> {
        let result: String = self.request("eth_estimateGas", json!([request])).await?;
        parse_u64_hex(&result)
    }

    async fn gas_price(&self) -> Result<U256, WalletError> {
        let result: String = self.request("eth_gasPrice", json!([])).await?;
        parse_u256_hex(&result)
    }

    async fn max_priority_fee_per_gas(&self) -> Result<U256, WalletError> {
        let result: String = self.request("eth_maxPriorityFeePerGas", json!([])).await?;
        parse_u256_hex(&result)
    }

    async fn fee_history(
        &self,
        block_count: u64,
        newest: BlockTag,
        reward_percentiles: &[f64],
    ) -> Result<FeeHistory, WalletError> {
        self.request(
            "eth_feeHistory",
            json!([
                types::to_hex_u64(block_count),
                newest.to_param(),
                reward_percentiles
            ]),
        )
        .await
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<Hash, WalletError> {
        let result: String = self
            .request(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw))]),
            )
            .await?;
        Hash::from_hex(&result)
    }

    async fn get_transaction_receipt(
        &self,
        hash: Hash,
    ) -> Result<Option<TransactionReceipt>, WalletError> {
        self.request("eth_getTransactionReceipt", json!([hash.to_hex()]))
            .await
    }

    async fn get_transaction_by_hash(
        &self,
        hash: Hash,
    ) -> Result<Option<RpcTransaction>, WalletError> {
        self.request("eth_getTransactionByHash", json!([hash.to_hex()]))
            .await
    }
}
