//! Stable error taxonomy for wallet operations
//!
//! Every failure an agent can see is classified here. Each variant carries a
//! stable machine-readable `code()`, a human `suggestion()`, a `retryable()`
//! flag, and where meaningful a `retry_after()` hint. Components never
//! translate one class into another on the way up; the facade returns these
//! to the caller unchanged.

use std::time::Duration;

use chrono::{DateTime, Utc};
use primitive_types::U256;
use serde::Serialize;
use thiserror::Error;

use crate::codec::CodecError;

/// Top-level wallet error
#[derive(Debug, Error)]
pub enum WalletError {
    // ------------------------------------------------------------------
    // Transaction
    // ------------------------------------------------------------------
    #[error("insufficient funds: need {required} wei, have {available} wei")]
    InsufficientFunds { required: U256, available: U256 },

    #[error("insufficient funds to cover gas: cost {gas_cost} wei on top of {amount} wei")]
    InsufficientGas { amount: U256, gas_cost: U256 },

    #[error("nonce too low (node reported {message})")]
    NonceTooLow { message: String },

    #[error("transaction {hash} reverted{}", reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    TransactionReverted {
        hash: crate::types::Hash,
        reason: Option<String>,
    },

    #[error("transaction underpriced (node reported {message})")]
    TransactionUnderpriced { message: String },

    #[error("transaction builder missing required field `{field}`")]
    IncompleteTransaction { field: &'static str },

    #[error("invalid transaction: {reason}")]
    InvalidTransaction { reason: String },

    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    // ------------------------------------------------------------------
    // Limits
    // ------------------------------------------------------------------
    #[error("emergency stop: balance {balance} below threshold {threshold}")]
    EmergencyStop { balance: U256, threshold: U256 },

    #[error("per-transaction limit exceeded: {amount} > {limit}")]
    PerTransactionLimitExceeded { amount: U256, limit: U256 },

    #[error("hourly limit exceeded: {spent} spent + {amount} requested > {limit}")]
    HourlyLimitExceeded {
        amount: U256,
        spent: U256,
        limit: U256,
        resets_at: DateTime<Utc>,
    },

    #[error("daily limit exceeded: {spent} spent + {amount} requested > {limit}")]
    DailyLimitExceeded {
        amount: U256,
        spent: U256,
        limit: U256,
        resets_at: DateTime<Utc>,
    },

    #[error("weekly limit exceeded: {spent} spent + {amount} requested > {limit}")]
    WeeklyLimitExceeded {
        amount: U256,
        spent: U256,
        limit: U256,
        resets_at: DateTime<Utc>,
    },

    // ------------------------------------------------------------------
    // Approval
    // ------------------------------------------------------------------
    #[error("approval required but no handler is configured")]
    ApprovalRequired,

    #[error("approval denied by handler")]
    ApprovalDenied,

    #[error("approval timed out after {waited_secs}s")]
    ApprovalTimeout { waited_secs: u64 },

    // ------------------------------------------------------------------
    // Address
    // ------------------------------------------------------------------
    #[error("recipient {address} is not on the allowlist")]
    AddressNotAllowed { address: crate::types::Address },

    #[error("recipient {address} is blocklisted")]
    AddressBlocked { address: crate::types::Address },

    #[error("invalid address `{input}`: {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("ENS name `{name}` did not resolve")]
    EnsNotFound { name: String },

    // ------------------------------------------------------------------
    // Amounts / encoding
    // ------------------------------------------------------------------
    #[error("invalid amount `{input}`: {reason}")]
    InvalidAmount { input: String, reason: String },

    #[error("invalid hex payload: {reason}")]
    InvalidHex { reason: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("signing failed: {reason}")]
    Signing { reason: String },

    #[error("private key has been disposed")]
    KeyDisposed,

    // ------------------------------------------------------------------
    // Network
    // ------------------------------------------------------------------
    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        /// Raw `data` field from the node, usually ABI-encoded revert bytes
        data: Option<String>,
    },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("timed out waiting for {operation} after {waited_secs}s")]
    Timeout { operation: String, waited_secs: u64 },

    #[error("rate limited by RPC endpoint")]
    RateLimited { retry_after: Option<Duration> },

    // ------------------------------------------------------------------
    // Gas / simulation
    // ------------------------------------------------------------------
    #[error("gas estimation failed{}", reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    GasEstimationFailed { reason: Option<String> },

    #[error("simulation reverted{}", reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    SimulationReverted { reason: Option<String> },

    // ------------------------------------------------------------------
    // Tokens
    // ------------------------------------------------------------------
    #[error("stablecoin `{symbol}` is not deployed on chain {chain_id}")]
    UnsupportedStablecoin { symbol: String, chain_id: u64 },

    #[error("token call to {address} returned malformed data: {reason}")]
    TokenCallFailed { address: crate::types::Address, reason: String },

    // ------------------------------------------------------------------
    // Bridge
    // ------------------------------------------------------------------
    #[error("no bridge route for {token} from chain {src} to chain {dst}")]
    BridgeNoRoute { token: String, src: u64, dst: u64 },

    #[error("bridge quote expired at {expired_at}")]
    BridgeQuoteExpired { expired_at: DateTime<Utc> },

    #[error("bridge protocol {protocol} unavailable: {reason}")]
    BridgeProtocolUnavailable { protocol: String, reason: String },

    #[error("bridge validation failed: {reason}")]
    BridgeValidationFailed { reason: String },

    #[error("bridge has insufficient liquidity for {amount}")]
    BridgeInsufficientLiquidity { amount: U256 },

    #[error("bridge slippage {actual_bps} bps exceeds limit {max_bps} bps")]
    BridgeSlippageExceeded { actual_bps: u32, max_bps: u32 },

    #[error("bridge transfer {tracking_id} not completed within {waited_secs}s")]
    BridgeCompletionTimeout {
        tracking_id: String,
        waited_secs: u64,
    },

    #[error("unknown bridge tracking id {tracking_id}")]
    BridgeUnknownTracking { tracking_id: String },
}

impl WalletError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            WalletError::InsufficientGas { .. } => "INSUFFICIENT_GAS",
            WalletError::NonceTooLow { .. } => "NONCE_TOO_LOW",
            WalletError::TransactionReverted { .. } => "TRANSACTION_REVERTED",
            WalletError::TransactionUnderpriced { .. } => "TRANSACTION_UNDERPRICED",
            WalletError::IncompleteTransaction { .. } => "INCOMPLETE_TRANSACTION",
            WalletError::InvalidTransaction { .. } => "INVALID_TRANSACTION",
            WalletError::Config { .. } => "CONFIG_ERROR",
            WalletError::EmergencyStop { .. } => "EMERGENCY_STOP_TRIGGERED",
            WalletError::PerTransactionLimitExceeded { .. } => "PER_TRANSACTION_LIMIT_EXCEEDED",
            WalletError::HourlyLimitExceeded { .. } => "HOURLY_LIMIT_EXCEEDED",
            WalletError::DailyLimitExceeded { .. } => "DAILY_LIMIT_EXCEEDED",
            WalletError::WeeklyLimitExceeded { .. } => "WEEKLY_LIMIT_EXCEEDED",
            WalletError::ApprovalRequired => "APPROVAL_REQUIRED",
            WalletError::ApprovalDenied => "APPROVAL_DENIED",
            WalletError::ApprovalTimeout { .. } => "APPROVAL_TIMEOUT",
            WalletError::AddressNotAllowed { .. } => "ADDRESS_NOT_ALLOWED",
            WalletError::AddressBlocked { .. } => "ADDRESS_BLOCKED",
            WalletError::InvalidAddress { .. } => "INVALID_ADDRESS",
            WalletError::EnsNotFound { .. } => "ENS_NOT_FOUND",
            WalletError::InvalidAmount { .. } => "INVALID_AMOUNT",
            WalletError::InvalidHex { .. } => "INVALID_HEX",
            WalletError::Codec(_) => "ENCODING_ERROR",
            WalletError::Signing { .. } => "SIGNING_ERROR",
            WalletError::KeyDisposed => "KEY_DISPOSED",
            WalletError::Rpc { .. } => "RPC_ERROR",
            WalletError::Network { .. } => "NETWORK_ERROR",
            WalletError::Timeout { .. } => "TIMEOUT",
            WalletError::RateLimited { .. } => "RATE_LIMIT_ERROR",
            WalletError::GasEstimationFailed { .. } => "GAS_ESTIMATION_FAILED",
            WalletError::SimulationReverted { .. } => "SIMULATION_REVERTED",
            WalletError::UnsupportedStablecoin { .. } => "UNSUPPORTED_STABLECOIN",
            WalletError::TokenCallFailed { .. } => "TOKEN_CALL_FAILED",
            WalletError::BridgeNoRoute { .. } => "BRIDGE_NO_ROUTE",
            WalletError::BridgeQuoteExpired { .. } => "BRIDGE_QUOTE_EXPIRED",
            WalletError::BridgeProtocolUnavailable { .. } => "BRIDGE_PROTOCOL_UNAVAILABLE",
            WalletError::BridgeValidationFailed { .. } => "BRIDGE_VALIDATION_FAILED",
            WalletError::BridgeInsufficientLiquidity { .. } => "BRIDGE_INSUFFICIENT_LIQUIDITY",
            WalletError::BridgeSlippageExceeded { .. } => "BRIDGE_SLIPPAGE_EXCEEDED",
            WalletError::BridgeCompletionTimeout { .. } => "BRIDGE_COMPLETION_TIMEOUT",
            WalletError::BridgeUnknownTracking { .. } => "BRIDGE_UNKNOWN_TRACKING_ID",
        }
    }

    /// Whether retrying the same call can succeed without operator action
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            WalletError::HourlyLimitExceeded { .. }
                | WalletError::DailyLimitExceeded { .. }
                | WalletError::WeeklyLimitExceeded { .. }
                | WalletError::Network { .. }
                | WalletError::Timeout { .. }
                | WalletError::RateLimited { .. }
                | WalletError::NonceTooLow { .. }
                | WalletError::TransactionUnderpriced { .. }
                | WalletError::BridgeQuoteExpired { .. }
                | WalletError::BridgeCompletionTimeout { .. }
                | WalletError::BridgeProtocolUnavailable { .. }
        )
    }

    /// How long to wait before retrying, when known
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            WalletError::HourlyLimitExceeded { resets_at, .. }
            | WalletError::DailyLimitExceeded { resets_at, .. }
            | WalletError::WeeklyLimitExceeded { resets_at, .. } => {
                let delta = *resets_at - Utc::now();
                delta.to_std().ok()
            }
            WalletError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Short operator-facing guidance
    pub fn suggestion(&self) -> &'static str {
        match self {
            WalletError::InsufficientFunds { .. } | WalletError::InsufficientGas { .. } => {
                "fund the wallet or reduce the amount"
            }
            WalletError::NonceTooLow { .. } => "the nonce ledger resynced; retry the send",
            WalletError::TransactionReverted { .. } => {
                "inspect the revert reason; the call is invalid as constructed"
            }
            WalletError::TransactionUnderpriced { .. } => "retry with higher gas fees",
            WalletError::IncompleteTransaction { .. } | WalletError::InvalidTransaction { .. } => {
                "fill in the missing transaction fields before signing"
            }
            WalletError::Config { .. } => "fix the wallet configuration and reload",
            WalletError::EmergencyStop { .. } => {
                "balance fell below the emergency threshold; top up before sending"
            }
            WalletError::PerTransactionLimitExceeded { .. } => {
                "split the transfer or raise the per-transaction limit"
            }
            WalletError::HourlyLimitExceeded { .. }
            | WalletError::DailyLimitExceeded { .. }
            | WalletError::WeeklyLimitExceeded { .. } => "wait for the window to reset",
            WalletError::ApprovalRequired => "configure an approval handler",
            WalletError::ApprovalDenied => "the approval handler declined this operation",
            WalletError::ApprovalTimeout { .. } => "the approver did not respond in time",
            WalletError::AddressNotAllowed { .. } => "add the recipient to the allowlist",
            WalletError::AddressBlocked { .. } => "recipient is explicitly blocked",
            WalletError::InvalidAddress { .. } => "provide a checksummed address or an ENS name",
            WalletError::EnsNotFound { .. } => "verify the ENS name is registered",
            WalletError::InvalidAmount { .. } => "provide a decimal amount within range",
            WalletError::InvalidHex { .. } => "provide 0x-prefixed hex of the expected length",
            WalletError::Codec(_) => "check the ABI types against the supplied values",
            WalletError::Signing { .. } | WalletError::KeyDisposed => {
                "reload the wallet with a valid private key"
            }
            WalletError::Rpc { .. } => "the node rejected the request; check its message",
            WalletError::Network { .. } => "check RPC connectivity and retry",
            WalletError::Timeout { .. } => "retry; consider a longer timeout",
            WalletError::RateLimited { .. } => "back off before retrying",
            WalletError::GasEstimationFailed { .. } => {
                "the call reverts during estimation; fix the call before sending"
            }
            WalletError::SimulationReverted { .. } => {
                "the transaction would revert on-chain; do not submit it"
            }
            WalletError::UnsupportedStablecoin { .. } => {
                "use a token deployed on the current chain"
            }
            WalletError::TokenCallFailed { .. } => "the contract is not a conforming ERC-20",
            WalletError::BridgeNoRoute { .. } => "no adapter serves this corridor",
            WalletError::BridgeQuoteExpired { .. } => "fetch a fresh quote and retry",
            WalletError::BridgeProtocolUnavailable { .. } => {
                "retry later or pick a different protocol"
            }
            WalletError::BridgeValidationFailed { .. } => {
                "a pre-deposit step failed; nothing was bridged"
            }
            WalletError::BridgeInsufficientLiquidity { .. } => {
                "reduce the amount or try another protocol"
            }
            WalletError::BridgeSlippageExceeded { .. } => {
                "raise the slippage tolerance or reduce the amount"
            }
            WalletError::BridgeCompletionTimeout { .. } => {
                "the transfer is still in flight; keep polling the tracking id"
            }
            WalletError::BridgeUnknownTracking { .. } => {
                "tracking ids are process-scoped; this one was not minted here"
            }
        }
    }

    /// Build the serializable report used by the `safe_*` wallet surfaces
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code().to_string(),
            message: self.to_string(),
            suggestion: self.suggestion().to_string(),
            retryable: self.retryable(),
            retry_after_secs: self.retry_after().map(|d| d.as_secs()),
        }
    }
}

/// Serializable failure summary returned by `safe_*` methods
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
    pub suggestion: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Non-unwinding outcome for the `safe_*` wallet surfaces
#[derive(Debug)]
pub enum SafeOutcome<T> {
    Success(T),
    Failure(ErrorReport),
}

impl<T> SafeOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, SafeOutcome::Success(_))
    }

    pub fn into_result(self) -> Result<T, ErrorReport> {
        match self {
            SafeOutcome::Success(value) => Ok(value),
            SafeOutcome::Failure(report) => Err(report),
        }
    }
}

impl<T> From<Result<T, WalletError>> for SafeOutcome<T> {
    fn from(result: Result<T, WalletError>) -> Self {
        match result {
            Ok(value) => SafeOutcome::Success(value),
            Err(err) => SafeOutcome::Failure(err.report()),
        }
    }
}
