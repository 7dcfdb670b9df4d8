//! Circle CCTP adapter: burn → attest → mint
//!
//! Deposits burn native USDC through the chain's TokenMessenger. The
//! `MessageSent(bytes)` log emitted by the MessageTransmitter carries the
//! message whose keccak-256 is both the attestation-service key and this
//! adapter's tracking id. Attestations are polled from Circle's service;
//! the mint is submitted on the destination chain when a dispatcher for it
//! has been registered, otherwise the transfer parks at
//! `attestation_ready`.

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
use crate::hash::keccak256;
use crate::tx::TxDispatcher;
use crate::types::{Address, Bytes, Hash};

use super::types::{
    BridgeProtocol, BridgeQuote, BridgeRequest, BridgeStatusKind, DepositOutcome, EstimatedTime,
    FeeBreakdown, RouteInfo, TrackingId, UnifiedBridgeStatus,
};

/// Circle's attestation service
pub const ATTESTATION_API: &str = "https://iris-api.circle.com/v1";

/// `(chain_id, cctp_domain, token_messenger, message_transmitter)`
const DEPLOYMENTS: &[(u64, u32, &str, &str)] = &[
    (
        1,
        0,
        "0xBd3fa81B58Ba92a82136038B25aDec7066af3155",
        "0x0a992d191DEeC32aFe36203Ad87D7d289a738F81",
    ),
    (
        43114,
        1,
        "0x6B25532e1060CE10cc3B0A99e5683b91BFDe6982",
        "0x8186359aF5F57FbB40c6b14A588d2A59C0C29880",
    ),
    (
        10,
        2,
        "0x2B4069517957735bE00ceE0fadAE88a26365528f",
        "0x4D41f22c5a0e5c74090899E5a8Fb597a8842b3e8",
    ),
    (
        42161,
        3,
        "0x19330d10D9Cc8751218eaf51E8885D058642E08A",
        "0xC30362313FBBA5cf9163F0bb16a0e01f01A896ca",
    ),
    (
        8453,
        6,
        "0x1682Ae6375C4E4A97e4B583BC394c861A46D8962",
        "0xAD09780d193884d503182aD4588450C416D6F9D4",
    ),
    (
        137,
        7,
        "0x9daF8c91AEFAE50b9c0E69629D3F6Ca40cA3B3FE",
        "0xF3be9355363857F3e001be68856A2f96b4C39Ba9",
    ),
];

/// Typical burn gas on the source chain, for cost previews
const BURN_GAS: u64 = 175_000;
const QUOTE_TTL_SECS: i64 = 300;

fn deployment(chain_id: u64) -> Option<(u32, Address, Address)> {
    DEPLOYMENTS
        .iter()
        .find(|(chain, _, _, _)| *chain == chain_id)
        .map(|(_, domain, messenger, transmitter)| {
            (
                *domain,
                Address::from_hex(messenger).expect("deployment constant"),
                Address::from_hex(transmitter).expect("deployment constant"),
            )
        })
}

#[derive(Debug, Clone)]
struct PendingTransfer {
    source_tx_hash: Hash,
    dest_chain_id: u64,
    message_bytes: Vec<u8>,
    attestation: Option<Vec<u8>>,
    mint_tx_hash: Option<Hash>,
}

#[derive(Debug, Deserialize)]
struct AttestationResponse {
    status: String,
    #[serde(default)]
    attestation: Option<String>,
}

/// The CCTP adapter; see module docs
pub struct CctpAdapter {
    dispatcher: Arc<TxDispatcher>,
    http: reqwest::Client,
    api_base: String,
    /// Destination-chain dispatchers for submitting mints
    destinations: Mutex<HashMap<u64, Arc<TxDispatcher>>>,
    pending: Mutex<HashMap<Hash, PendingTransfer>>,
}

impl CctpAdapter {
    pub fn new(dispatcher: Arc<TxDispatcher>) -> Self {
        CctpAdapter {
            dispatcher,
            http: reqwest::Client::new(),
            api_base: ATTESTATION_API.to_string(),
            destinations: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Register a destination-chain dispatcher so attested transfers can be
    /// minted to completion
    pub async fn add_destination(&self, chain_id: u64, dispatcher: Arc<TxDispatcher>) {
        self.destinations.lock().await.insert(chain_id, dispatcher);
    }

    async fn fetch_attestation(
        &self,
        message_hash: &Hash,
    ) -> Result<Option<Vec<u8>>, WalletError> {
        let url = format!("{}/attestations/{}", self.api_base, message_hash.to_hex());
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| WalletError::Network {
                message: format!("attestation service: {e}"),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            // The service has not indexed the burn yet
            return Ok(None);
        }

        let body: AttestationResponse =
            response.json().await.map_err(|e| WalletError::Network {
                message: format!("attestation service: {e}"),
            })?;

        if body.status == "complete" {
            let attestation = body.attestation.ok_or_else(|| WalletError::Network {
                message: "attestation marked complete but missing payload".to_string(),
            })?;
            let bytes = Bytes::from_hex(&attestation)?;
            Ok(Some(bytes.0))
        } else {
            Ok(None)
        }
    }

    /// Submit `receiveMessage` on the destination once attested
    async fn submit_mint(
        &self,
        tracking_id: &TrackingId,
        transfer: &PendingTransfer,
        attestation: &[u8],
    ) -> Result<Hash, WalletError> {
        // Clone the dispatcher out so no lock is held across the submission
        let dest_dispatcher = self
            .destinations
            .lock()
            .await
            .get(&transfer.dest_chain_id)
            .cloned()
            .ok_or_else(|| WalletError::BridgeProtocolUnavailable {
                protocol: "cctp".to_string(),
                reason: format!(
                    "no dispatcher registered for destination chain {}",
                    transfer.dest_chain_id
                ),
            })?;
        let (_, _, transmitter) = deployment(transfer.dest_chain_id).ok_or_else(|| {
            WalletError::BridgeNoRoute {
                token: "USDC".to_string(),
                src: 0,
                dst: transfer.dest_chain_id,
            }
        })?;

        let data = abi::encode_call(
            "receiveMessage(bytes,bytes)",
            &[
                AbiValue::Bytes(transfer.message_bytes.clone()),
                AbiValue::Bytes(attestation.to_vec()),
            ],
        )?;

        let (hash, _receipt) = dest_dispatcher
            .send(Some(transmitter), U256::zero(), data)
            .await?;

        tracing::info!(
            tracking_id = %tracking_id,
            mint_tx = %hash,
            dest_chain = transfer.dest_chain_id,
            "cctp mint submitted"
        );
        Ok(hash)
    }
}

#[async_trait]
impl super::BridgeAdapter for CctpAdapter {
    fn protocol(&self) -> BridgeProtocol {
        BridgeProtocol::Cctp
    }

    fn reliability_rank(&self) -> u8 {
        0
    }

    fn supports_route(&self, source_chain_id: u64, dest_chain_id: u64, token: &str) -> bool {
        token.eq_ignore_ascii_case("USDC")
            && source_chain_id != dest_chain_id
            && deployment(source_chain_id).is_some()
            && deployment(dest_chain_id).is_some()
    }

    fn destination_chains(&self, source_chain_id: u64, token: &str) -> Vec<u64> {
        if !token.eq_ignore_ascii_case("USDC") || deployment(source_chain_id).is_none() {
            return Vec::new();
        }
        DEPLOYMENTS
            .iter()
            .map(|(chain, _, _, _)| *chain)
            .filter(|chain| *chain != source_chain_id)
            .collect()
    }

    fn spender(&self, source_chain_id: u64) -> Result<Address, WalletError> {
        deployment(source_chain_id)
            .map(|(_, messenger, _)| messenger)
            .ok_or(WalletError::BridgeNoRoute {
                token: "USDC".to_string(),
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

        let gas_price = self.dispatcher.rpc().gas_price().await?;
        let gas_cost = U256::from(BURN_GAS) * gas_price;

        // CCTP burns and mints 1:1; the only cost is source-chain gas
        Ok(BridgeQuote {
            protocol: BridgeProtocol::Cctp,
            input_amount: request.amount,
            output_amount: request.amount,
            fee: FeeBreakdown {
                protocol: U256::zero(),
                gas: gas_cost,
                total: U256::zero(),
                total_usd: 0.0,
            },
            slippage_bps: Some(0),
            estimated_time: EstimatedTime {
                min_secs: 600,
                max_secs: 1_200,
            },
            route: RouteInfo {
                source_chain_id: request.source_chain_id,
                dest_chain_id: request.dest_chain_id,
                steps: vec![
                    "burn USDC via TokenMessenger".to_string(),
                    "await Circle attestation".to_string(),
                    "mint USDC on destination".to_string(),
                ],
                description: format!(
                    "CCTP native burn/mint {} → {}",
                    request.source_chain_id, request.dest_chain_id
                ),
            },
            expires_at: Utc::now() + ChronoDuration::seconds(QUOTE_TTL_SECS),
            params: json!({}),
        })
    }

    async fn deposit(
        &self,
        request: &BridgeRequest,
        _quote: &BridgeQuote,
    ) -> Result<DepositOutcome, WalletError> {
        let (_, messenger, transmitter) =
            deployment(request.source_chain_id).ok_or(WalletError::BridgeNoRoute {
                token: request.token.clone(),
                src: request.source_chain_id,
                dst: request.dest_chain_id,
            })?;
        let (dest_domain, _, _) =
            deployment(request.dest_chain_id).ok_or(WalletError::BridgeNoRoute {
                token: request.token.clone(),
                src: request.source_chain_id,
                dst: request.dest_chain_id,
            })?;
        let burn_token = crate::tokens::token_address(&request.token, request.source_chain_id)
            .ok_or(WalletError::UnsupportedStablecoin {
                symbol: request.token.clone(),
                chain_id: request.source_chain_id,
            })?;

        let data = abi::encode_call(
            "depositForBurn(uint256,uint32,bytes32,address)",
            &[
                AbiValue::Uint(request.amount),
                AbiValue::Uint(U256::from(dest_domain)),
                AbiValue::FixedBytes(request.recipient.as_word().to_vec()),
                AbiValue::Address(burn_token),
            ],
        )?;

        let (source_tx_hash, receipt) = self
            .dispatcher
            .send(Some(messenger), U256::zero(), data)
            .await?;

        // The MessageTransmitter logs MessageSent(bytes); its keccak is the
        // attestation key and our tracking id.
        let message_sent = abi::event_topic("MessageSent(bytes)")?;
        let message_bytes = receipt
            .logs
            .iter()
            .filter(|log| log.address == transmitter || deployment_transmitters(&log.address))
            .find(|log| log.topics.first() == Some(&message_sent))
            .map(|log| abi::decode(&[AbiType::Bytes], &log.data.0))
            .transpose()?
            .and_then(|mut values| values.pop())
            .and_then(|v| match v {
                AbiValue::Bytes(b) => Some(b),
                _ => None,
            })
            .ok_or_else(|| WalletError::BridgeValidationFailed {
                reason: "burn receipt carried no MessageSent log".to_string(),
            })?;

        let message_hash = Hash(keccak256(&message_bytes));
        let tracking_id = TrackingId(message_hash);

        self.pending.lock().await.insert(
            message_hash,
            PendingTransfer {
                source_tx_hash,
                dest_chain_id: request.dest_chain_id,
                message_bytes,
                attestation: None,
                mint_tx_hash: None,
            },
        );

        tracing::info!(
            tracking_id = %tracking_id,
            burn_tx = %source_tx_hash,
            dest_domain,
            "cctp burn confirmed"
        );

        Ok(DepositOutcome {
            tracking_id,
            source_tx_hash,
        })
    }

    async fn status(&self, tracking_id: &TrackingId) -> Result<UnifiedBridgeStatus, WalletError> {
        let transfer = self.pending.lock().await.get(&tracking_id.0).cloned();

        let mut transfer = match transfer {
            Some(transfer) => transfer,
            None => {
                // Not minted by this process; the attestation service can
                // still answer for the bare message hash.
                return match self.fetch_attestation(&tracking_id.0).await? {
                    Some(_) => Ok(UnifiedBridgeStatus::new(
                        *tracking_id,
                        BridgeProtocol::Cctp,
                        BridgeStatusKind::AttestationReady,
                        "attestation ready; transfer not tracked by this process",
                    )),
                    None => Ok(UnifiedBridgeStatus::new(
                        *tracking_id,
                        BridgeProtocol::Cctp,
                        BridgeStatusKind::AttestationPending,
                        "waiting for Circle attestation",
                    )),
                };
            }
        };

        if let Some(mint_tx) = transfer.mint_tx_hash {
            return Ok(UnifiedBridgeStatus::new(
                *tracking_id,
                BridgeProtocol::Cctp,
                BridgeStatusKind::Completed,
                "USDC minted on destination",
            )
            .with_source_tx(transfer.source_tx_hash)
            .with_dest_tx(mint_tx));
        }

        let attestation = match transfer.attestation.clone() {
            Some(attestation) => Some(attestation),
            None => {
                let fetched = self.fetch_attestation(&tracking_id.0).await?;
                if let Some(bytes) = &fetched {
                    transfer.attestation = Some(bytes.clone());
                    self.pending
                        .lock()
                        .await
                        .insert(tracking_id.0, transfer.clone());
                }
                fetched
            }
        };

        let attestation = match attestation {
            None => {
                return Ok(UnifiedBridgeStatus::new(
                    *tracking_id,
                    BridgeProtocol::Cctp,
                    BridgeStatusKind::AttestationPending,
                    "burn confirmed; waiting for Circle attestation",
                )
                .with_source_tx(transfer.source_tx_hash))
            }
            Some(attestation) => attestation,
        };

        // Attested. Mint if we hold a destination dispatcher; otherwise the
        // transfer is redeemable by any party holding the message.
        let has_destination = self
            .destinations
            .lock()
            .await
            .contains_key(&transfer.dest_chain_id);
        if !has_destination {
            return Ok(UnifiedBridgeStatus::new(
                *tracking_id,
                BridgeProtocol::Cctp,
                BridgeStatusKind::AttestationReady,
                "attestation ready; mint on destination to complete",
            )
            .with_source_tx(transfer.source_tx_hash));
        }

        match self.submit_mint(tracking_id, &transfer, &attestation).await {
            Ok(mint_tx) => {
                transfer.mint_tx_hash = Some(mint_tx);
                self.pending
                    .lock()
                    .await
                    .insert(tracking_id.0, transfer.clone());
                Ok(UnifiedBridgeStatus::new(
                    *tracking_id,
                    BridgeProtocol::Cctp,
                    BridgeStatusKind::Completed,
                    "USDC minted on destination",
                )
                .with_source_tx(transfer.source_tx_hash)
                .with_dest_tx(mint_tx))
            }
            Err(err) => Ok(UnifiedBridgeStatus::new(
                *tracking_id,
                BridgeProtocol::Cctp,
                BridgeStatusKind::MintPending,
                "attestation ready; mint submission pending",
            )
            .with_source_tx(transfer.source_tx_hash)
            .with_error(err.to_string())),
        }
    }
}

/// Whether the address is any known MessageTransmitter (multi-chain logs)
fn deployment_transmitters(address: &Address) -> bool {
    DEPLOYMENTS
        .iter()
        .any(|(_, _, _, transmitter)| {
            Address::from_hex(transmitter).expect("deployment constant") == *address
        })
}
