//! Shared bridge types: quotes, preferences, the unified status machine
//!
//! Quotes are immutable snapshots with an expiry; the router must refuse an
//! expired quote at submit time. Tracking ids are opaque 32-byte values
//! minted per transfer and resolvable back to their protocol only through
//! the router's registry.

use chrono::{DateTime, Utc};
use primitive_types::U256;
use serde::Serialize;

use crate::error::WalletError;
use crate::types::{Address, Hash};

/// Supported bridge protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeProtocol {
    Cctp,
    Across,
    Stargate,
}

impl BridgeProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeProtocol::Cctp => "cctp",
            BridgeProtocol::Across => "across",
            BridgeProtocol::Stargate => "stargate",
        }
    }
}

impl std::fmt::Display for BridgeProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BridgeProtocol {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cctp" => Ok(BridgeProtocol::Cctp),
            "across" => Ok(BridgeProtocol::Across),
            "stargate" => Ok(BridgeProtocol::Stargate),
            other => Err(WalletError::BridgeProtocolUnavailable {
                protocol: other.to_string(),
                reason: "unknown protocol".to_string(),
            }),
        }
    }
}

/// Opaque per-transfer identifier minted by the router/adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackingId(pub Hash);

impl TrackingId {
    pub fn from_hex(input: &str) -> Result<Self, WalletError> {
        Ok(TrackingId(Hash::from_hex(input)?))
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl std::fmt::Display for TrackingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TrackingId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Fee breakdown attached to a quote
///
/// `protocol` and `total` are in the bridged token's smallest unit; `gas` is
/// source-chain wei; `total_usd` prices the token-denominated fees with the
/// 1-token-=-1-USD stablecoin convention.
#[derive(Debug, Clone, Serialize)]
pub struct FeeBreakdown {
    pub protocol: U256,
    pub gas: U256,
    pub total: U256,
    pub total_usd: f64,
}

/// Transfer time window the protocol advertises
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EstimatedTime {
    pub min_secs: u64,
    pub max_secs: u64,
}

/// Route description for display and planning
#[derive(Debug, Clone, Serialize)]
pub struct RouteInfo {
    pub source_chain_id: u64,
    pub dest_chain_id: u64,
    pub steps: Vec<String>,
    pub description: String,
}

/// An immutable quote snapshot from one adapter
#[derive(Debug, Clone, Serialize)]
pub struct BridgeQuote {
    pub protocol: BridgeProtocol,
    pub input_amount: U256,
    pub output_amount: U256,
    pub fee: FeeBreakdown,
    pub slippage_bps: Option<u32>,
    pub estimated_time: EstimatedTime,
    pub route: RouteInfo,
    pub expires_at: DateTime<Utc>,
    /// Protocol-opaque deposit parameters the adapter needs back at submit
    pub params: serde_json::Value,
}

impl BridgeQuote {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// What to optimize when several routes serve a corridor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutePriority {
    #[default]
    Cost,
    Speed,
    Reliability,
}

/// Route selection policy: hard filters plus a scoring priority
#[derive(Debug, Clone, Default)]
pub struct RoutePreference {
    pub priority: RoutePriority,
    pub max_fee_usd: Option<f64>,
    pub max_time_minutes: Option<u64>,
    pub max_slippage_bps: Option<u32>,
    pub preferred: Vec<BridgeProtocol>,
    pub excluded: Vec<BridgeProtocol>,
}

/// A fully-resolved bridge request handed to adapters
#[derive(Debug, Clone)]
pub struct BridgeRequest {
    pub token: String,
    pub decimals: u8,
    pub amount: U256,
    pub source_chain_id: u64,
    pub dest_chain_id: u64,
    pub sender: Address,
    pub recipient: Address,
    pub max_slippage_bps: u32,
}

/// What a successful deposit hands back
#[derive(Debug, Clone)]
pub struct DepositOutcome {
    pub tracking_id: TrackingId,
    pub source_tx_hash: Hash,
}

/// Result of a completed bridge submission
#[derive(Debug, Clone, Serialize)]
pub struct BridgeResult {
    pub tracking_id: TrackingId,
    pub protocol: BridgeProtocol,
    pub source_tx_hash: Hash,
    pub input_amount: U256,
    pub output_amount: U256,
    pub estimated_time: EstimatedTime,
}

// ============================================================================
// Unified status machine
// ============================================================================

/// The unified cross-protocol transfer state
///
/// ```text
/// pending_burn → burn_confirmed → attestation_pending
///                                       ↓
///                                attestation_ready
///                                       ↓
///                                  mint_pending → completed
/// any → failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeStatusKind {
    PendingBurn,
    BurnConfirmed,
    AttestationPending,
    AttestationReady,
    MintPending,
    Completed,
    Failed,
}

impl BridgeStatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeStatusKind::PendingBurn => "pending_burn",
            BridgeStatusKind::BurnConfirmed => "burn_confirmed",
            BridgeStatusKind::AttestationPending => "attestation_pending",
            BridgeStatusKind::AttestationReady => "attestation_ready",
            BridgeStatusKind::MintPending => "mint_pending",
            BridgeStatusKind::Completed => "completed",
            BridgeStatusKind::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BridgeStatusKind::Completed | BridgeStatusKind::Failed)
    }

    /// Default progress percentage for the state
    pub fn progress(&self) -> u8 {
        match self {
            BridgeStatusKind::PendingBurn => 10,
            BridgeStatusKind::BurnConfirmed => 30,
            BridgeStatusKind::AttestationPending => 50,
            BridgeStatusKind::AttestationReady => 70,
            BridgeStatusKind::MintPending => 90,
            BridgeStatusKind::Completed => 100,
            BridgeStatusKind::Failed => 100,
        }
    }
}

impl std::fmt::Display for BridgeStatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A point-in-time view of a transfer's progress
#[derive(Debug, Clone, Serialize)]
pub struct UnifiedBridgeStatus {
    pub tracking_id: TrackingId,
    pub protocol: BridgeProtocol,
    pub status: BridgeStatusKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_tx_hash: Option<Hash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_tx_hash: Option<Hash>,
    /// 0–100
    pub progress: u8,
    pub message: String,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UnifiedBridgeStatus {
    pub fn new(
        tracking_id: TrackingId,
        protocol: BridgeProtocol,
        status: BridgeStatusKind,
        message: impl Into<String>,
    ) -> Self {
        UnifiedBridgeStatus {
            tracking_id,
            protocol,
            status,
            source_tx_hash: None,
            dest_tx_hash: None,
            progress: status.progress(),
            message: message.into(),
            updated_at: Utc::now(),
            error: None,
        }
    }

    #[must_use]
    pub fn with_source_tx(mut self, hash: Hash) -> Self {
        self.source_tx_hash = Some(hash);
        self
    }

    #[must_use]
    pub fn with_dest_tx(mut self, hash: Hash) -> Self {
        self.dest_tx_hash = Some(hash);
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_round_trip() {
        for p in [
            BridgeProtocol::Cctp,
            BridgeProtocol::Across,
            BridgeProtocol::Stargate,
        ] {
            assert_eq!(p.as_str().parse::<BridgeProtocol>().unwrap(), p);
        }
        assert!("hyperlane".parse::<BridgeProtocol>().is_err());
    }

    #[test]
    fn test_status_progress_is_monotonic() {
        let order = [
            BridgeStatusKind::PendingBurn,
            BridgeStatusKind::BurnConfirmed,
            BridgeStatusKind::AttestationPending,
            BridgeStatusKind::AttestationReady,
            BridgeStatusKind::MintPending,
            BridgeStatusKind::Completed,
        ];
        for pair in order.windows(2) {
            assert!(pair[0].progress() < pair[1].progress());
        }
        assert!(BridgeStatusKind::Completed.is_terminal());
        assert!(BridgeStatusKind::Failed.is_terminal());
        assert!(!BridgeStatusKind::MintPending.is_terminal());
    }

    #[test]
    fn test_quote_expiry() {
        let now = Utc::now();
        let quote = BridgeQuote {
            protocol: BridgeProtocol::Across,
            input_amount: U256::from(100u64),
            output_amount: U256::from(99u64),
            fee: FeeBreakdown {
                protocol: U256::one(),
                gas: U256::zero(),
                total: U256::one(),
                total_usd: 0.000001,
            },
            slippage_bps: None,
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
            expires_at: now + chrono::Duration::seconds(30),
            params: serde_json::Value::Null,
        };
        assert!(!quote.is_expired_at(now));
        assert!(quote.is_expired_at(now + chrono::Duration::seconds(31)));
    }

    #[test]
    fn test_tracking_id_hex() {
        let id = TrackingId(Hash([0x42; 32]));
        let parsed = TrackingId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(parsed, id);
    }
}
