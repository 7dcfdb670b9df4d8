//! Across adapter: depositV3 → relayer fill
//!
//! Quotes come from the Across REST API (`suggested-fees`); deposits call
//! `depositV3` on the origin SpokePool with the quote's timestamp and
//! deadlines, validated hard before submit. The integer `depositId` parsed
//! from the `V3FundsDeposited` log, left-padded to 32 bytes, is the
//! tracking id. Fill status comes from the `deposit/status` endpoint.
//!
//! The `depositV3` selector and `V3FundsDeposited` topic are derived from
//! the canonical V3 ABI signatures at call time; nothing here hard-codes a
//! 4-byte constant.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use primitive_types::U256;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use crate::codec::abi::{self, AbiValue};
use crate::error::WalletError;
use crate::tx::TxDispatcher;
use crate::types::{Address, Hash};

use super::types::{
    BridgeProtocol, BridgeQuote, BridgeRequest, BridgeStatusKind, DepositOutcome, EstimatedTime,
    FeeBreakdown, RouteInfo, TrackingId, UnifiedBridgeStatus,
};

/// Across REST API (mainnet deployments)
pub const ACROSS_API: &str = "https://app.across.to/api";
/// Across REST API for testnets
pub const ACROSS_TESTNET_API: &str = "https://testnet.across.to/api";

/// Canonical V3 function and event signatures (SpokePool ABI)
const DEPOSIT_V3_SIG: &str = "depositV3(address,address,address,address,uint256,uint256,uint256,address,uint32,uint32,uint32,bytes)";
const FUNDS_DEPOSITED_SIG: &str = "V3FundsDeposited(address,address,uint256,uint256,uint256,uint32,uint32,uint32,uint32,address,address,address,bytes)";

/// `(chain_id, spoke_pool)`
const SPOKE_POOLS: &[(u64, &str)] = &[
    (1, "0x5c7BCd6E7De5423a257D81B442095A1a6ced35C5"),
    (10, "0x6f26Bf09B1C792e3228e5467807a900A503c0281"),
    (137, "0x9295ee1d8C5b022Be115A2AD3c30C72E34e7F096"),
    (8453, "0x09aea4b2242abC8bb4BB78D537A67a245A7bEC64"),
    (42161, "0xe35e9842fceaCA96570B734083f4a58e8F7C5f2A"),
];

const SUPPORTED_TOKENS: &[&str] = &["USDC", "USDT", "DAI"];

/// Allowed clock skew ahead of `now` for a quote timestamp
const QUOTE_FUTURE_TOLERANCE_SECS: i64 = 5;
/// Maximum quote age at submit
const QUOTE_MAX_AGE_SECS: i64 = 300;

fn spoke_pool(chain_id: u64) -> Option<Address> {
    SPOKE_POOLS
        .iter()
        .find(|(chain, _)| *chain == chain_id)
        .map(|(_, addr)| Address::from_hex(addr).expect("spoke pool constant"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestedFees {
    total_relay_fee: RelayFee,
    timestamp: String,
    #[serde(default)]
    fill_deadline: Option<String>,
    exclusive_relayer: String,
    exclusivity_deadline: u64,
    #[serde(default)]
    estimated_fill_time_sec: Option<u64>,
    #[serde(default)]
    limits: Option<DepositLimits>,
}

#[derive(Debug, Deserialize)]
struct RelayFee {
    total: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepositLimits {
    #[serde(default)]
    max_deposit: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepositStatus {
    status: String,
    #[serde(default)]
    fill_tx: Option<String>,
}

#[derive(Debug, Clone)]
struct TrackedDeposit {
    deposit_id: u32,
    origin_chain_id: u64,
    source_tx_hash: Hash,
}

/// The Across adapter; see module docs
pub struct AcrossAdapter {
    dispatcher: Arc<TxDispatcher>,
    http: reqwest::Client,
    api_base: String,
    tracked: Mutex<HashMap<Hash, TrackedDeposit>>,
}

impl AcrossAdapter {
    pub fn new(dispatcher: Arc<TxDispatcher>) -> Self {
        AcrossAdapter {
            dispatcher,
            http: reqwest::Client::new(),
            api_base: ACROSS_API.to_string(),
            tracked: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    async fn fetch_suggested_fees(
        &self,
        request: &BridgeRequest,
        input_token: Address,
        output_token: Address,
    ) -> Result<SuggestedFees, WalletError> {
        let url = format!(
            "{}/suggested-fees?inputToken={}&outputToken={}&originChainId={}&destinationChainId={}&amount={}",
            self.api_base,
            input_token.to_lowercase_hex(),
            output_token.to_lowercase_hex(),
            request.source_chain_id,
            request.dest_chain_id,
            request.amount,
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| WalletError::Network {
                message: format!("across api: {e}"),
            })?;
        if !response.status().is_success() {
            return Err(WalletError::BridgeProtocolUnavailable {
                protocol: "across".to_string(),
                reason: format!("suggested-fees returned {}", response.status()),
            });
        }
        response.json().await.map_err(|e| WalletError::Network {
            message: format!("across api: {e}"),
        })
    }
}

/// Validate a quote's timestamps against the submit-time clock
fn validate_deposit_window(
    now: DateTime<Utc>,
    quote_timestamp: i64,
    fill_deadline: i64,
) -> Result<(), WalletError> {
    if fill_deadline <= now.timestamp() {
        return Err(WalletError::BridgeValidationFailed {
            reason: format!("fill deadline {fill_deadline} already passed"),
        });
    }
    let age = now.timestamp() - quote_timestamp;
    if age < -QUOTE_FUTURE_TOLERANCE_SECS {
        return Err(WalletError::BridgeValidationFailed {
            reason: format!("quote timestamp {quote_timestamp} is in the future"),
        });
    }
    if age.abs() > QUOTE_MAX_AGE_SECS {
        return Err(WalletError::BridgeValidationFailed {
            reason: format!("quote timestamp drifted {age}s from the local clock"),
        });
    }
    Ok(())
}

#[async_trait]
impl super::BridgeAdapter for AcrossAdapter {
    fn protocol(&self) -> BridgeProtocol {
        BridgeProtocol::Across
    }

    fn reliability_rank(&self) -> u8 {
        1
    }

    fn supports_route(&self, source_chain_id: u64, dest_chain_id: u64, token: &str) -> bool {
        source_chain_id != dest_chain_id
            && SUPPORTED_TOKENS.iter().any(|t| t.eq_ignore_ascii_case(token))
            && spoke_pool(source_chain_id).is_some()
            && spoke_pool(dest_chain_id).is_some()
            && crate::tokens::token_address(token, source_chain_id).is_some()
            && crate::tokens::token_address(token, dest_chain_id).is_some()
    }

    fn destination_chains(&self, source_chain_id: u64, token: &str) -> Vec<u64> {
        SPOKE_POOLS
            .iter()
            .map(|(chain, _)| *chain)
            .filter(|chain| *chain != source_chain_id)
            .filter(|chain| self.supports_route(source_chain_id, *chain, token))
            .collect()
    }

    fn spender(&self, source_chain_id: u64) -> Result<Address, WalletError> {
        spoke_pool(source_chain_id).ok_or(WalletError::BridgeNoRoute {
            token: String::new(),
            src: source_chain_id,
            dst: 0,
        })
    }

    async fn quote(&self, request: &BridgeRequest) -> Result<BridgeQuote, WalletError> {
        if !self.supports_route(request.source_chain_id, request.dest_chain_id, &request.token) {
            return Err(WalletError::BridgeNoRoute {
                token: request.token.clone(),
                src: request.source_chain_id,
                dst: request.dest_chain_id,
            });
        }
        let input_token = crate::tokens::token_address(&request.token, request.source_chain_id)
            .expect("checked by supports_route");
        let output_token = crate::tokens::token_address(&request.token, request.dest_chain_id)
            .expect("checked by supports_route");

        let fees = self
            .fetch_suggested_fees(request, input_token, output_token)
            .await?;

        if let Some(max_deposit) = fees
            .limits
            .as_ref()
            .and_then(|l| l.max_deposit.as_deref())
            .and_then(|raw| U256::from_dec_str(raw).ok())
        {
            if request.amount > max_deposit {
                return Err(WalletError::BridgeInsufficientLiquidity {
                    amount: request.amount,
                });
            }
        }

        let relay_fee =
            U256::from_dec_str(&fees.total_relay_fee.total).map_err(|_| WalletError::Network {
                message: format!("across api: bad fee quantity `{}`", fees.total_relay_fee.total),
            })?;
        if relay_fee >= request.amount {
            return Err(WalletError::BridgeInsufficientLiquidity {
                amount: request.amount,
            });
        }
        let output_amount = request.amount - relay_fee;

        let quote_timestamp: i64 =
            fees.timestamp.parse().map_err(|_| WalletError::Network {
                message: format!("across api: bad timestamp `{}`", fees.timestamp),
            })?;
        let fill_deadline: i64 = match &fees.fill_deadline {
            Some(raw) => raw.parse().map_err(|_| WalletError::Network {
                message: format!("across api: bad fill deadline `{raw}`"),
            })?,
            // The API default fill window
            None => quote_timestamp + 4 * 3600,
        };

        let fill_time = fees.estimated_fill_time_sec.unwrap_or(60);
        let fee_usd = fee_to_usd(relay_fee, request.decimals);

        Ok(BridgeQuote {
            protocol: BridgeProtocol::Across,
            input_amount: request.amount,
            output_amount,
            fee: FeeBreakdown {
                protocol: relay_fee,
                gas: U256::zero(),
                total: relay_fee,
                total_usd: fee_usd,
            },
            slippage_bps: Some(0),
            estimated_time: EstimatedTime {
                min_secs: fill_time,
                max_secs: (fill_time * 4).max(300),
            },
            route: RouteInfo {
                source_chain_id: request.source_chain_id,
                dest_chain_id: request.dest_chain_id,
                steps: vec![
                    "depositV3 into origin SpokePool".to_string(),
                    "relayer fills on destination".to_string(),
                ],
                description: format!(
                    "Across relay {} → {}",
                    request.source_chain_id, request.dest_chain_id
                ),
            },
            expires_at: Utc
                .timestamp_opt(quote_timestamp + QUOTE_MAX_AGE_SECS, 0)
                .single()
                .unwrap_or_else(|| Utc::now() + ChronoDuration::seconds(QUOTE_MAX_AGE_SECS)),
            params: json!({
                "quoteTimestamp": quote_timestamp,
                "fillDeadline": fill_deadline,
                "exclusiveRelayer": fees.exclusive_relayer,
                "exclusivityDeadline": fees.exclusivity_deadline,
            }),
        })
    }

    async fn deposit(
        &self,
        request: &BridgeRequest,
        quote: &BridgeQuote,
    ) -> Result<DepositOutcome, WalletError> {
        let pool = spoke_pool(request.source_chain_id).ok_or(WalletError::BridgeNoRoute {
            token: request.token.clone(),
            src: request.source_chain_id,
            dst: request.dest_chain_id,
        })?;
        let input_token = crate::tokens::token_address(&request.token, request.source_chain_id)
            .ok_or(WalletError::UnsupportedStablecoin {
                symbol: request.token.clone(),
                chain_id: request.source_chain_id,
            })?;
        let output_token = crate::tokens::token_address(&request.token, request.dest_chain_id)
            .ok_or(WalletError::UnsupportedStablecoin {
                symbol: request.token.clone(),
                chain_id: request.dest_chain_id,
            })?;

        let params = &quote.params;
        let quote_timestamp = params["quoteTimestamp"].as_i64().ok_or_else(|| {
            WalletError::BridgeValidationFailed {
                reason: "quote carries no quoteTimestamp".to_string(),
            }
        })?;
        let fill_deadline = params["fillDeadline"].as_i64().ok_or_else(|| {
            WalletError::BridgeValidationFailed {
                reason: "quote carries no fillDeadline".to_string(),
            }
        })?;
        let exclusivity_deadline = params["exclusivityDeadline"].as_i64().unwrap_or(0);
        let exclusive_relayer = params["exclusiveRelayer"]
            .as_str()
            .map(Address::from_hex)
            .transpose()?
            .unwrap_or(Address::ZERO);

        validate_deposit_window(Utc::now(), quote_timestamp, fill_deadline)?;

        let data = abi::encode_call(
            DEPOSIT_V3_SIG,
            &[
                AbiValue::Address(request.sender),
                AbiValue::Address(request.recipient),
                AbiValue::Address(input_token),
                AbiValue::Address(output_token),
                AbiValue::Uint(quote.input_amount),
                AbiValue::Uint(quote.output_amount),
                AbiValue::Uint(U256::from(request.dest_chain_id)),
                AbiValue::Address(exclusive_relayer),
                AbiValue::Uint(U256::from(quote_timestamp as u64)),
                AbiValue::Uint(U256::from(fill_deadline as u64)),
                AbiValue::Uint(U256::from(exclusivity_deadline as u64)),
                AbiValue::Bytes(Vec::new()),
            ],
        )?;

        let (source_tx_hash, receipt) =
            self.dispatcher.send(Some(pool), U256::zero(), data).await?;

        // The indexed depositId rides in topic 2 of V3FundsDeposited;
        // the padded topic itself is the unified tracking id.
        let topic0 = abi::event_topic(FUNDS_DEPOSITED_SIG)?;
        let deposit_topic = receipt
            .logs
            .iter()
            .filter(|log| log.address == pool)
            .find(|log| log.topics.first() == Some(&topic0))
            .and_then(|log| log.topics.get(2))
            .copied()
            .ok_or_else(|| WalletError::BridgeValidationFailed {
                reason: "deposit receipt carried no V3FundsDeposited log".to_string(),
            })?;

        let deposit_id = u32::from_be_bytes([
            deposit_topic.0[28],
            deposit_topic.0[29],
            deposit_topic.0[30],
            deposit_topic.0[31],
        ]);
        let tracking_id = TrackingId(deposit_topic);

        self.tracked.lock().await.insert(
            deposit_topic,
            TrackedDeposit {
                deposit_id,
                origin_chain_id: request.source_chain_id,
                source_tx_hash,
            },
        );

        tracing::info!(
            tracking_id = %tracking_id,
            deposit_id,
            deposit_tx = %source_tx_hash,
            "across deposit confirmed"
        );

        Ok(DepositOutcome {
            tracking_id,
            source_tx_hash,
        })
    }

    async fn status(&self, tracking_id: &TrackingId) -> Result<UnifiedBridgeStatus, WalletError> {
        let tracked = self
            .tracked
            .lock()
            .await
            .get(&tracking_id.0)
            .cloned()
            .ok_or_else(|| WalletError::BridgeUnknownTracking {
                tracking_id: tracking_id.to_hex(),
            })?;

        let url = format!(
            "{}/deposit/status?originChainId={}&depositId={}",
            self.api_base, tracked.origin_chain_id, tracked.deposit_id,
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| WalletError::Network {
                message: format!("across api: {e}"),
            })?;
        if !response.status().is_success() {
            return Err(WalletError::BridgeProtocolUnavailable {
                protocol: "across".to_string(),
                reason: format!("deposit/status returned {}", response.status()),
            });
        }
        let body: DepositStatus = response.json().await.map_err(|e| WalletError::Network {
            message: format!("across api: {e}"),
        })?;

        let status = map_fill_status(&body.status);
        let mut unified = UnifiedBridgeStatus::new(
            *tracking_id,
            BridgeProtocol::Across,
            status,
            match status {
                BridgeStatusKind::Completed => "relayer fill observed",
                BridgeStatusKind::Failed => "deposit expired without a fill",
                _ => "waiting for a relayer fill",
            },
        )
        .with_source_tx(tracked.source_tx_hash);

        if let Some(fill_tx) = body.fill_tx.as_deref() {
            if let Ok(hash) = Hash::from_hex(fill_tx) {
                unified = unified.with_dest_tx(hash);
            }
        }
        if status == BridgeStatusKind::Failed {
            unified = unified.with_error("fill deadline elapsed");
        }
        Ok(unified)
    }
}

/// Across collapses the attestation phases into a single fill wait
fn map_fill_status(raw: &str) -> BridgeStatusKind {
    match raw {
        "filled" => BridgeStatusKind::Completed,
        "expired" => BridgeStatusKind::Failed,
        _ => BridgeStatusKind::AttestationPending,
    }
}

fn fee_to_usd(fee: U256, decimals: u8) -> f64 {
    let scale = crate::types::pow10(decimals);
    let whole = (fee / scale).low_u128() as f64;
    let frac = (fee % scale).low_u128() as f64 / scale.low_u128() as f64;
    whole + frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeAdapter;
    use crate::nonce::NonceManager;
    use crate::rpc::LogEntry;
    use crate::signer::Account;
    use crate::testing::MockRpc;
    use crate::types::Bytes;

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn adapter_on(rpc: Arc<MockRpc>) -> AcrossAdapter {
        let account = Arc::new(Account::from_private_key(DEV_KEY).unwrap());
        let nonce = Arc::new(NonceManager::new(rpc.clone(), account.address()));
        AcrossAdapter::new(Arc::new(TxDispatcher::new(rpc, account, nonce)))
    }

    fn request() -> BridgeRequest {
        BridgeRequest {
            token: "USDC".to_string(),
            decimals: 6,
            amount: U256::from(100_000_000u64),
            source_chain_id: 1,
            dest_chain_id: 42161,
            sender: Address([1; 20]),
            recipient: Address([2; 20]),
            max_slippage_bps: 100,
        }
    }

    fn quote_with(now: DateTime<Utc>) -> BridgeQuote {
        BridgeQuote {
            protocol: BridgeProtocol::Across,
            input_amount: U256::from(100_000_000u64),
            output_amount: U256::from(99_000_000u64),
            fee: FeeBreakdown {
                protocol: U256::from(1_000_000u64),
                gas: U256::zero(),
                total: U256::from(1_000_000u64),
                total_usd: 1.0,
            },
            slippage_bps: Some(0),
            estimated_time: EstimatedTime {
                min_secs: 60,
                max_secs: 300,
            },
            route: RouteInfo {
                source_chain_id: 1,
                dest_chain_id: 42161,
                steps: vec![],
                description: String::new(),
            },
            expires_at: now + ChronoDuration::minutes(5),
            params: json!({
                "quoteTimestamp": now.timestamp(),
                "fillDeadline": now.timestamp() + 14_400,
                "exclusiveRelayer": "0x0000000000000000000000000000000000000000",
                "exclusivityDeadline": 0,
            }),
        }
    }

    fn deposit_log(deposit_id: u32) -> LogEntry {
        let mut topic2 = [0u8; 32];
        topic2[28..].copy_from_slice(&deposit_id.to_be_bytes());
        let mut dest_chain = [0u8; 32];
        dest_chain[24..].copy_from_slice(&42161u64.to_be_bytes());
        LogEntry {
            address: spoke_pool(1).unwrap(),
            topics: vec![
                abi::event_topic(FUNDS_DEPOSITED_SIG).unwrap(),
                Hash(dest_chain),
                Hash(topic2),
                Hash([0; 32]),
            ],
            data: Bytes(Vec::new()),
            block_number: Some(1),
            transaction_hash: Some(Hash([1; 32])),
            log_index: Some(0),
            removed: false,
        }
    }

    #[test]
    fn test_route_support() {
        let rpc = Arc::new(MockRpc::new(1));
        let adapter = adapter_on(rpc);
        assert!(adapter.supports_route(1, 42161, "USDC"));
        assert!(adapter.supports_route(1, 10, "USDT"));
        // DAI has no Base deployment in the registry
        assert!(!adapter.supports_route(1, 8453, "DAI"));
        assert!(!adapter.supports_route(1, 1, "USDC"));
        assert!(!adapter.supports_route(1, 42161, "WBTC"));
    }

    #[test]
    fn test_deposit_window_validation() {
        let now = Utc::now();
        let ts = now.timestamp();

        validate_deposit_window(now, ts - 10, ts + 3600).unwrap();
        // Deadline passed
        assert!(validate_deposit_window(now, ts - 10, ts - 1).is_err());
        // Quote from the future beyond tolerance
        assert!(validate_deposit_window(now, ts + 30, ts + 3600).is_err());
        // Small clock skew tolerated
        validate_deposit_window(now, ts + 4, ts + 3600).unwrap();
        // Stale quote
        assert!(validate_deposit_window(now, ts - 301, ts + 3600).is_err());
    }

    #[test]
    fn test_fill_status_mapping() {
        assert_eq!(map_fill_status("filled"), BridgeStatusKind::Completed);
        assert_eq!(map_fill_status("expired"), BridgeStatusKind::Failed);
        assert_eq!(
            map_fill_status("pending"),
            BridgeStatusKind::AttestationPending
        );
    }

    #[test]
    fn test_fee_to_usd() {
        assert!((fee_to_usd(U256::from(1_500_000u64), 6) - 1.5).abs() < 1e-9);
        assert!((fee_to_usd(U256::from(250_000u64), 6) - 0.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_deposit_parses_deposit_id() {
        let rpc = Arc::new(MockRpc::new(1));
        rpc.set_base_fee(Some(U256::from(1_000_000_000u64)));
        rpc.set_next_receipt_logs(vec![deposit_log(77_123)]);

        let adapter = adapter_on(rpc.clone());
        let outcome = adapter
            .deposit(&request(), &quote_with(Utc::now()))
            .await
            .unwrap();

        // Tracking id is the deposit id left-padded to 32 bytes
        let mut expected = [0u8; 32];
        expected[28..].copy_from_slice(&77_123u32.to_be_bytes());
        assert_eq!(outcome.tracking_id.0 .0, expected);

        // Calldata used the canonically-derived depositV3 selector
        let sent = rpc.sent_transactions();
        let selector = abi::selector(DEPOSIT_V3_SIG).unwrap();
        assert!(sent[0].windows(4).any(|w| w == selector));
    }

    #[tokio::test]
    async fn test_deposit_rejects_stale_quote() {
        let rpc = Arc::new(MockRpc::new(1));
        rpc.set_base_fee(Some(U256::from(1_000_000_000u64)));
        let adapter = adapter_on(rpc);

        let stale = quote_with(Utc::now() - ChronoDuration::minutes(10));
        let err = adapter.deposit(&request(), &stale).await.unwrap_err();
        assert_eq!(err.code(), "BRIDGE_VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn test_deposit_without_event_fails_validation() {
        let rpc = Arc::new(MockRpc::new(1));
        rpc.set_base_fee(Some(U256::from(1_000_000_000u64)));
        let adapter = adapter_on(rpc);
        let err = adapter
            .deposit(&request(), &quote_with(Utc::now()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BRIDGE_VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn test_status_unknown_tracking() {
        let rpc = Arc::new(MockRpc::new(1));
        let adapter = adapter_on(rpc);
        let err = adapter
            .status(&TrackingId(Hash([5; 32])))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BRIDGE_UNKNOWN_TRACKING_ID");
    }
}
