//! Stargate adapter: pool swap over LayerZero
//!
//! Pool-based transfers through the chain's Stargate router. The LayerZero
//! message fee is quoted on-chain (`quoteLayerZeroFee`) and attached as the
//! swap's native value. Post-send the transfer collapses straight into
//! `attestation_pending`; delivery status comes from the LayerZero scan API
//! keyed by the source transaction hash, which is also the tracking id.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use primitive_types::U256;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use crate::codec::abi::{self, AbiType, AbiValue};
use crate::error::WalletError;
use crate::rpc::CallRequest;
use crate::tx::TxDispatcher;
use crate::types::{Address, Hash};

use super::types::{
    BridgeProtocol, BridgeQuote, BridgeRequest, BridgeStatusKind, DepositOutcome, EstimatedTime,
    FeeBreakdown, RouteInfo, TrackingId, UnifiedBridgeStatus,
};

/// LayerZero scan API for delivery status
pub const LAYERZERO_SCAN_API: &str = "https://api-mainnet.layerzero-scan.com";

/// Stargate pool fee, basis points of the transferred amount
const POOL_FEE_BPS: u64 = 6;
const QUOTE_TTL_SECS: i64 = 120;

const SWAP_SIG: &str =
    "swap(uint16,uint256,uint256,address,uint256,uint256,(uint256,uint256,bytes),bytes,bytes)";
const LZ_FEE_SIG: &str = "quoteLayerZeroFee(uint16,uint8,bytes,bytes,(uint256,uint256,bytes))";

/// `(chain_id, lz_chain_id, router)`
const ROUTERS: &[(u64, u16, &str)] = &[
    (1, 101, "0x8731d54E9D02c286767d56ac03e8037C07e01e98"),
    (10, 111, "0xB0D502E938ed5f4df2E681fE6E419ff29631d62b"),
    (137, 109, "0x45A01E4e04F14f7A4a6702c74187c5F6222033cd"),
    (42161, 110, "0x53Bf833A5d6c4ddA888F69c22C88C9f356a41614"),
    (8453, 184, "0x45f1A95A4D3f3836523F5c83673c797f4d4d263B"),
];

/// `(symbol, chain_id, pool_id)`
const POOLS: &[(&str, u64, u64)] = &[
    ("USDC", 1, 1),
    ("USDC", 10, 1),
    ("USDC", 137, 1),
    ("USDC", 42161, 1),
    ("USDC", 8453, 1),
    ("USDT", 1, 2),
    ("USDT", 137, 2),
    ("USDT", 42161, 2),
];

fn router(chain_id: u64) -> Option<(u16, Address)> {
    ROUTERS
        .iter()
        .find(|(chain, _, _)| *chain == chain_id)
        .map(|(_, lz, addr)| (*lz, Address::from_hex(addr).expect("router constant")))
}

fn pool_id(symbol: &str, chain_id: u64) -> Option<u64> {
    POOLS
        .iter()
        .find(|(s, chain, _)| s.eq_ignore_ascii_case(symbol) && *chain == chain_id)
        .map(|(_, _, id)| *id)
}

#[derive(Debug, Deserialize)]
struct ScanResponse {
    #[serde(default)]
    messages: Vec<ScanMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScanMessage {
    status: String,
    #[serde(default)]
    dst_tx_hash: Option<String>,
}

#[derive(Debug, Clone)]
struct TrackedSwap {
    dest_chain_id: u64,
}

/// The Stargate adapter; see module docs
pub struct StargateAdapter {
    dispatcher: Arc<TxDispatcher>,
    http: reqwest::Client,
    scan_base: String,
    tracked: Mutex<HashMap<Hash, TrackedSwap>>,
}

impl StargateAdapter {
    pub fn new(dispatcher: Arc<TxDispatcher>) -> Self {
        StargateAdapter {
            dispatcher,
            http: reqwest::Client::new(),
            scan_base: LAYERZERO_SCAN_API.to_string(),
            tracked: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_scan_base(mut self, base: impl Into<String>) -> Self {
        self.scan_base = base.into();
        self
    }

    /// On-chain quote for the LayerZero message fee, in source-chain wei
    async fn layerzero_fee(
        &self,
        source_router: Address,
        dest_lz_id: u16,
        recipient: Address,
    ) -> Result<U256, WalletError> {
        let data = abi::encode_call(
            LZ_FEE_SIG,
            &[
                AbiValue::Uint(U256::from(dest_lz_id)),
                AbiValue::Uint(U256::one()), // function type: swap
                AbiValue::Bytes(recipient.as_bytes().to_vec()),
                AbiValue::Bytes(Vec::new()),
                AbiValue::Tuple(vec![
                    AbiValue::Uint(U256::zero()),
                    AbiValue::Uint(U256::zero()),
                    AbiValue::Bytes(Vec::new()),
                ]),
            ],
        )?;
        let output = self
            .dispatcher
            .rpc()
            .call(&CallRequest::to_contract(source_router, data))
            .await?;
        let decoded = abi::decode(&[AbiType::Uint(256), AbiType::Uint(256)], &output.0)?;
        decoded
            .first()
            .and_then(|v| v.as_uint())
            .ok_or_else(|| WalletError::BridgeProtocolUnavailable {
                protocol: "stargate".to_string(),
                reason: "quoteLayerZeroFee returned no fee".to_string(),
            })
    }
}

#[async_trait]
impl super::BridgeAdapter for StargateAdapter {
    fn protocol(&self) -> BridgeProtocol {
        BridgeProtocol::Stargate
    }

    fn reliability_rank(&self) -> u8 {
        2
    }

    fn supports_route(&self, source_chain_id: u64, dest_chain_id: u64, token: &str) -> bool {
        source_chain_id != dest_chain_id
            && router(source_chain_id).is_some()
            && router(dest_chain_id).is_some()
            && pool_id(token, source_chain_id).is_some()
            && pool_id(token, dest_chain_id).is_some()
    }

    fn destination_chains(&self, source_chain_id: u64, token: &str) -> Vec<u64> {
        ROUTERS
            .iter()
            .map(|(chain, _, _)| *chain)
            .filter(|chain| self.supports_route(source_chain_id, *chain, token))
            .collect()
    }

    fn spender(&self, source_chain_id: u64) -> Result<Address, WalletError> {
        router(source_chain_id)
            .map(|(_, addr)| addr)
            .ok_or(WalletError::BridgeNoRoute {
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
        let (_, source_router) = router(request.source_chain_id).expect("checked");
        let (dest_lz_id, _) = router(request.dest_chain_id).expect("checked");

        let native_fee = self
            .layerzero_fee(source_router, dest_lz_id, request.recipient)
            .await?;

        let pool_fee = request.amount * U256::from(POOL_FEE_BPS) / U256::from(10_000u64);
        let output_amount = request.amount - pool_fee;
        let fee_usd = {
            let scale = crate::types::pow10(request.decimals);
            (pool_fee / scale).low_u128() as f64
                + (pool_fee % scale).low_u128() as f64 / scale.low_u128() as f64
        };

        Ok(BridgeQuote {
            protocol: BridgeProtocol::Stargate,
            input_amount: request.amount,
            output_amount,
            fee: FeeBreakdown {
                protocol: pool_fee,
                gas: native_fee,
                total: pool_fee,
                total_usd: fee_usd,
            },
            slippage_bps: Some(request.max_slippage_bps),
            estimated_time: EstimatedTime {
                min_secs: 60,
                max_secs: 600,
            },
            route: RouteInfo {
                source_chain_id: request.source_chain_id,
                dest_chain_id: request.dest_chain_id,
                steps: vec![
                    "swap into source pool".to_string(),
                    "LayerZero message relay".to_string(),
                    "destination pool credit".to_string(),
                ],
                description: format!(
                    "Stargate pool swap {} → {}",
                    request.source_chain_id, request.dest_chain_id
                ),
            },
            expires_at: Utc::now() + ChronoDuration::seconds(QUOTE_TTL_SECS),
            params: json!({ "nativeFee": native_fee.to_string() }),
        })
    }

    async fn deposit(
        &self,
        request: &BridgeRequest,
        quote: &BridgeQuote,
    ) -> Result<DepositOutcome, WalletError> {
        let (_, source_router) =
            router(request.source_chain_id).ok_or(WalletError::BridgeNoRoute {
                token: request.token.clone(),
                src: request.source_chain_id,
                dst: request.dest_chain_id,
            })?;
        let (dest_lz_id, _) = router(request.dest_chain_id).ok_or(WalletError::BridgeNoRoute {
            token: request.token.clone(),
            src: request.source_chain_id,
            dst: request.dest_chain_id,
        })?;
        let src_pool = pool_id(&request.token, request.source_chain_id).ok_or(
            WalletError::UnsupportedStablecoin {
                symbol: request.token.clone(),
                chain_id: request.source_chain_id,
            },
        )?;
        let dst_pool = pool_id(&request.token, request.dest_chain_id).ok_or(
            WalletError::UnsupportedStablecoin {
                symbol: request.token.clone(),
                chain_id: request.dest_chain_id,
            },
        )?;

        let native_fee = quote.params["nativeFee"]
            .as_str()
            .and_then(|raw| U256::from_dec_str(raw).ok())
            .ok_or_else(|| WalletError::BridgeValidationFailed {
                reason: "quote carries no LayerZero fee".to_string(),
            })?;

        let min_amount = request.amount
            * U256::from(10_000u64 - request.max_slippage_bps as u64)
            / U256::from(10_000u64);

        let data = abi::encode_call(
            SWAP_SIG,
            &[
                AbiValue::Uint(U256::from(dest_lz_id)),
                AbiValue::Uint(U256::from(src_pool)),
                AbiValue::Uint(U256::from(dst_pool)),
                AbiValue::Address(request.sender),
                AbiValue::Uint(request.amount),
                AbiValue::Uint(min_amount),
                AbiValue::Tuple(vec![
                    AbiValue::Uint(U256::zero()),
                    AbiValue::Uint(U256::zero()),
                    AbiValue::Bytes(Vec::new()),
                ]),
                AbiValue::Bytes(request.recipient.as_bytes().to_vec()),
                AbiValue::Bytes(Vec::new()),
            ],
        )?;

        let (source_tx_hash, _receipt) = self
            .dispatcher
            .send(Some(source_router), native_fee, data)
            .await?;

        self.tracked.lock().await.insert(
            source_tx_hash,
            TrackedSwap {
                dest_chain_id: request.dest_chain_id,
            },
        );

        tracing::info!(
            swap_tx = %source_tx_hash,
            dest_lz_id,
            src_pool,
            dst_pool,
            "stargate swap confirmed"
        );

        Ok(DepositOutcome {
            tracking_id: TrackingId(source_tx_hash),
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

        let url = format!("{}/tx/{}", self.scan_base, tracking_id.0.to_hex());
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| WalletError::Network {
                message: format!("layerzero scan: {e}"),
            })?;

        // Not indexed yet: the message is still in flight
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(UnifiedBridgeStatus::new(
                *tracking_id,
                BridgeProtocol::Stargate,
                BridgeStatusKind::AttestationPending,
                "swap sent; LayerZero message not yet indexed",
            )
            .with_source_tx(tracking_id.0));
        }

        let body: ScanResponse = response.json().await.map_err(|e| WalletError::Network {
            message: format!("layerzero scan: {e}"),
        })?;

        let message = body.messages.first();
        let (status, text): (BridgeStatusKind, String) =
            match message.map(|m| m.status.as_str()).unwrap_or("INFLIGHT") {
                "DELIVERED" => (
                    BridgeStatusKind::Completed,
                    format!("pool credited on chain {}", tracked.dest_chain_id),
                ),
                "FAILED" => (
                    BridgeStatusKind::Failed,
                    "LayerZero delivery failed".to_string(),
                ),
                _ => (
                    BridgeStatusKind::AttestationPending,
                    format!(
                        "LayerZero message in flight to chain {}",
                        tracked.dest_chain_id
                    ),
                ),
            };

        let mut unified =
            UnifiedBridgeStatus::new(*tracking_id, BridgeProtocol::Stargate, status, text)
                .with_source_tx(tracking_id.0);
        if let Some(dst) = message.and_then(|m| m.dst_tx_hash.as_deref()) {
            if let Ok(hash) = Hash::from_hex(dst) {
                unified = unified.with_dest_tx(hash);
            }
        }
        if status == BridgeStatusKind::Failed {
            unified = unified.with_error("message delivery failed");
        }
        Ok(unified)
    }
}
