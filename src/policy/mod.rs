//! Spending policy engine
//!
//! Single owner of the spend ledgers and sole decision point for whether an
//! operation may proceed: emergency stop, per-transaction caps, rolling
//! windows, address allow/block policy, and the approval gate. Every other
//! component consults it through this typed surface; nothing else mutates
//! the ledgers.

pub mod approval;
pub mod limits;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use primitive_types::U256;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::WalletError;
use crate::types::{pow10, Address};
pub use approval::{
    request_approval, ApprovalConfig, ApprovalDetails, ApprovalHandler, ApprovalPredicates,
    ApprovalRequest, OperationKind, RiskLevel, TimeoutPolicy,
};
pub use limits::{SpendLedger, SpendingLimits, UsdLimits, WindowTotals};

/// Allow- or block-list semantics for recipients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPolicyMode {
    /// Only listed recipients may receive
    Allowlist,
    /// Listed recipients may never receive
    Blocklist,
}

/// Recipient address policy
#[derive(Debug, Clone)]
pub struct AddressPolicy {
    pub mode: AddressPolicyMode,
    pub addresses: HashSet<Address>,
}

/// A bridge limit corridor: token × destination chain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Corridor {
    pub token: String,
    pub dest_chain_id: u64,
}

/// Remaining headroom per window, for result summaries
#[derive(Debug, Clone, Serialize)]
pub struct LimitsSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_transaction: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly_remaining: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_remaining: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_remaining: Option<U256>,
}

struct LedgerState {
    native: SpendLedger,
    tokens: HashMap<String, SpendLedger>,
    corridors: HashMap<Corridor, SpendLedger>,
    /// Recipients of completed spends, for the `recipient_is_new` predicate
    seen_recipients: HashSet<Address>,
}

/// The policy engine; see module docs
pub struct PolicyEngine {
    native_limits: SpendingLimits,
    token_limits: HashMap<String, UsdLimits>,
    bridge_limits: HashMap<Corridor, UsdLimits>,
    address_policy: Option<AddressPolicy>,
    trusted: HashSet<Address>,
    approval: Option<ApprovalConfig>,
    state: Mutex<LedgerState>,
}

impl PolicyEngine {
    pub fn new(
        native_limits: SpendingLimits,
        token_limits: HashMap<String, UsdLimits>,
        bridge_limits: HashMap<Corridor, UsdLimits>,
        address_policy: Option<AddressPolicy>,
        trusted: HashSet<Address>,
        approval: Option<ApprovalConfig>,
    ) -> Self {
        PolicyEngine {
            native_limits,
            token_limits,
            bridge_limits,
            address_policy,
            trusted,
            approval,
            state: Mutex::new(LedgerState {
                native: SpendLedger::default(),
                tokens: HashMap::new(),
                corridors: HashMap::new(),
                seen_recipients: HashSet::new(),
            }),
        }
    }

    /// Engine with no limits, no policy, no approvals; everything passes
    pub fn permissive() -> Self {
        PolicyEngine::new(
            SpendingLimits::default(),
            HashMap::new(),
            HashMap::new(),
            None,
            HashSet::new(),
            None,
        )
    }

    // ------------------------------------------------------------------
    // Address policy
    // ------------------------------------------------------------------

    /// Apply the allow/block policy; violations are fatal, not retryable
    pub fn check_address(&self, recipient: Address) -> Result<(), WalletError> {
        match &self.address_policy {
            None => Ok(()),
            Some(policy) => match policy.mode {
                AddressPolicyMode::Allowlist => {
                    if policy.addresses.contains(&recipient) {
                        Ok(())
                    } else {
                        Err(WalletError::AddressNotAllowed { address: recipient })
                    }
                }
                AddressPolicyMode::Blocklist => {
                    if policy.addresses.contains(&recipient) {
                        Err(WalletError::AddressBlocked { address: recipient })
                    } else {
                        Ok(())
                    }
                }
            },
        }
    }

    pub fn is_trusted(&self, recipient: Address) -> bool {
        self.trusted.contains(&recipient)
    }

    pub async fn is_new_recipient(&self, recipient: Address) -> bool {
        !self
            .state
            .lock()
            .await
            .seen_recipients
            .contains(&recipient)
    }

    // ------------------------------------------------------------------
    // Native limits
    // ------------------------------------------------------------------

    /// Full native-asset check: emergency stop, per-transaction cap, then
    /// the rolling windows, failing on the first violation
    pub async fn check_native(&self, amount: U256, balance: U256) -> Result<(), WalletError> {
        self.check_native_at(Utc::now(), amount, balance).await
    }

    /// Clock-injected variant of [`check_native`], also used by tests
    pub async fn check_native_at(
        &self,
        now: DateTime<Utc>,
        amount: U256,
        balance: U256,
    ) -> Result<(), WalletError> {
        if let Some(threshold) = self.native_limits.emergency_stop_below {
            if balance < threshold {
                return Err(WalletError::EmergencyStop { balance, threshold });
            }
        }
        if let Some(limit) = self.native_limits.per_transaction {
            if amount > limit {
                return Err(WalletError::PerTransactionLimitExceeded { amount, limit });
            }
        }
        let mut state = self.state.lock().await;
        state.native.check_at(
            now,
            amount,
            self.native_limits.per_hour,
            self.native_limits.per_day,
            self.native_limits.per_week,
        )
    }

    /// Record a completed native spend
    pub async fn record_native(&self, amount: U256, recipient: Option<Address>) {
        self.record_native_at(Utc::now(), amount, recipient).await;
    }

    pub async fn record_native_at(
        &self,
        now: DateTime<Utc>,
        amount: U256,
        recipient: Option<Address>,
    ) {
        let mut state = self.state.lock().await;
        state.native.record_at(now, amount);
        if let Some(recipient) = recipient {
            state.seen_recipients.insert(recipient);
        }
    }

    // ------------------------------------------------------------------
    // Token limits (USD-denominated)
    // ------------------------------------------------------------------

    /// Check a token spend against its symbol's USD ledger
    pub async fn check_token(
        &self,
        symbol: &str,
        decimals: u8,
        amount: U256,
    ) -> Result<(), WalletError> {
        self.check_token_at(Utc::now(), symbol, decimals, amount)
            .await
    }

    pub async fn check_token_at(
        &self,
        now: DateTime<Utc>,
        symbol: &str,
        decimals: u8,
        amount: U256,
    ) -> Result<(), WalletError> {
        let caps = match self.token_limits.get(symbol) {
            Some(caps) => caps,
            None => return Ok(()),
        };
        let scale = pow10(decimals);
        let to_raw = |usd: Option<u64>| usd.map(|v| U256::from(v) * scale);

        if let Some(limit) = to_raw(caps.per_transaction) {
            if amount > limit {
                return Err(WalletError::PerTransactionLimitExceeded { amount, limit });
            }
        }
        let mut state = self.state.lock().await;
        state.tokens.entry(symbol.to_string()).or_default().check_at(
            now,
            amount,
            to_raw(caps.per_hour),
            to_raw(caps.per_day),
            to_raw(caps.per_week),
        )
    }

    pub async fn record_token(&self, symbol: &str, amount: U256, recipient: Option<Address>) {
        self.record_token_at(Utc::now(), symbol, amount, recipient)
            .await;
    }

    pub async fn record_token_at(
        &self,
        now: DateTime<Utc>,
        symbol: &str,
        amount: U256,
        recipient: Option<Address>,
    ) {
        let mut state = self.state.lock().await;
        state
            .tokens
            .entry(symbol.to_string())
            .or_default()
            .record_at(now, amount);
        if let Some(recipient) = recipient {
            state.seen_recipients.insert(recipient);
        }
    }

    // ------------------------------------------------------------------
    // Bridge corridor limits
    // ------------------------------------------------------------------

    pub async fn check_bridge(
        &self,
        corridor: &Corridor,
        decimals: u8,
        amount: U256,
    ) -> Result<(), WalletError> {
        self.check_bridge_at(Utc::now(), corridor, decimals, amount)
            .await
    }

    pub async fn check_bridge_at(
        &self,
        now: DateTime<Utc>,
        corridor: &Corridor,
        decimals: u8,
        amount: U256,
    ) -> Result<(), WalletError> {
        let caps = match self.bridge_limits.get(corridor) {
            Some(caps) => caps,
            None => return Ok(()),
        };
        let scale = pow10(decimals);
        let to_raw = |usd: Option<u64>| usd.map(|v| U256::from(v) * scale);

        if let Some(limit) = to_raw(caps.per_transaction) {
            if amount > limit {
                return Err(WalletError::PerTransactionLimitExceeded { amount, limit });
            }
        }
        let mut state = self.state.lock().await;
        state
            .corridors
            .entry(corridor.clone())
            .or_default()
            .check_at(
                now,
                amount,
                to_raw(caps.per_hour),
                to_raw(caps.per_day),
                to_raw(caps.per_week),
            )
    }

    pub async fn record_bridge(&self, corridor: &Corridor, amount: U256) {
        let mut state = self.state.lock().await;
        state
            .corridors
            .entry(corridor.clone())
            .or_default()
            .record_at(Utc::now(), amount);
    }

    // ------------------------------------------------------------------
    // Approval gate
    // ------------------------------------------------------------------

    /// The configured amount threshold above which approval is demanded
    pub fn approval_threshold(&self) -> Option<U256> {
        self.approval
            .as_ref()
            .and_then(|c| c.require_when.amount_exceeds)
    }

    /// Disjunction of the configured predicates for this operation
    pub async fn requires_approval(&self, amount: U256, recipient: Address) -> bool {
        let config = match &self.approval {
            Some(config) => config,
            None => return false,
        };
        let p = &config.require_when;

        if p.always {
            return true;
        }
        if let Some(threshold) = p.amount_exceeds {
            if amount > threshold {
                return true;
            }
        }
        if p.recipient_is_new && self.is_new_recipient(recipient).await {
            return true;
        }
        if p.recipient_not_in_trusted && !self.is_trusted(recipient) {
            return true;
        }
        false
    }

    /// Run the handler round-trip; call only when [`requires_approval`]
    pub async fn approve(&self, request: ApprovalRequest) -> Result<(), WalletError> {
        match &self.approval {
            Some(config) => request_approval(config, request).await,
            None => Err(WalletError::ApprovalRequired),
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Remaining native headroom per window
    pub async fn native_remaining(&self) -> LimitsSnapshot {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let totals = state.native.totals_at(now);
        let remaining = |cap: Option<U256>, spent: U256| cap.map(|c| c.saturating_sub(spent));

        LimitsSnapshot {
            per_transaction: self.native_limits.per_transaction,
            hourly_remaining: remaining(self.native_limits.per_hour, totals.hourly),
            daily_remaining: remaining(self.native_limits.per_day, totals.daily),
            weekly_remaining: remaining(self.native_limits.per_week, totals.weekly),
        }
    }

    /// Window totals for the native ledger (spend-history view)
    pub async fn native_history(&self) -> WindowTotals {
        self.state.lock().await.native.totals_at(Utc::now())
    }

    /// Window totals for a token ledger, if it has any entries
    pub async fn token_history(&self, symbol: &str) -> Option<WindowTotals> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        state.tokens.get_mut(symbol).map(|l| l.totals_at(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    fn eth(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    fn addr(n: u8) -> Address {
        Address([n; 20])
    }

    fn engine_with_native(limits: SpendingLimits) -> PolicyEngine {
        PolicyEngine::new(
            limits,
            HashMap::new(),
            HashMap::new(),
            None,
            HashSet::new(),
            None,
        )
    }

    #[tokio::test]
    async fn test_check_order_emergency_first() {
        let engine = engine_with_native(SpendingLimits {
            per_transaction: Some(eth(1)),
            emergency_stop_below: Some(eth(5)),
            ..Default::default()
        });

        // Both violated; emergency stop must win
        let err = engine.check_native(eth(10), eth(2)).await.unwrap_err();
        assert_eq!(err.code(), "EMERGENCY_STOP_TRIGGERED");

        // Healthy balance: per-transaction violation surfaces
        let err = engine.check_native(eth(10), eth(100)).await.unwrap_err();
        assert_eq!(err.code(), "PER_TRANSACTION_LIMIT_EXCEEDED");
    }

    #[tokio::test]
    async fn test_window_accounting_through_engine() {
        let engine = engine_with_native(SpendingLimits {
            per_day: Some(eth(10)),
            ..Default::default()
        });

        engine.record_native(eth(7), Some(addr(1))).await;
        let err = engine.check_native(eth(4), eth(100)).await.unwrap_err();
        assert_eq!(err.code(), "DAILY_LIMIT_EXCEEDED");
        assert!(err.retryable());
        engine.check_native(eth(3), eth(100)).await.unwrap();
    }

    #[tokio::test]
    async fn test_allowlist_and_blocklist() {
        let mut listed = HashSet::new();
        listed.insert(addr(1));

        let allow = PolicyEngine::new(
            SpendingLimits::default(),
            HashMap::new(),
            HashMap::new(),
            Some(AddressPolicy {
                mode: AddressPolicyMode::Allowlist,
                addresses: listed.clone(),
            }),
            HashSet::new(),
            None,
        );
        allow.check_address(addr(1)).unwrap();
        let err = allow.check_address(addr(2)).unwrap_err();
        assert_eq!(err.code(), "ADDRESS_NOT_ALLOWED");
        assert!(!err.retryable());

        let block = PolicyEngine::new(
            SpendingLimits::default(),
            HashMap::new(),
            HashMap::new(),
            Some(AddressPolicy {
                mode: AddressPolicyMode::Blocklist,
                addresses: listed,
            }),
            HashSet::new(),
            None,
        );
        block.check_address(addr(2)).unwrap();
        assert_eq!(
            block.check_address(addr(1)).unwrap_err().code(),
            "ADDRESS_BLOCKED"
        );
    }

    #[tokio::test]
    async fn test_token_usd_ledger() {
        let mut token_limits = HashMap::new();
        token_limits.insert(
            "USDC".to_string(),
            UsdLimits {
                per_day: Some(1_000),
                ..Default::default()
            },
        );
        let engine = PolicyEngine::new(
            SpendingLimits::default(),
            token_limits,
            HashMap::new(),
            None,
            HashSet::new(),
            None,
        );

        // 600 USDC at 6 decimals
        engine
            .record_token("USDC", U256::from(600_000_000u64), None)
            .await;
        let err = engine
            .check_token("USDC", 6, U256::from(500_000_000u64))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DAILY_LIMIT_EXCEEDED");
        engine
            .check_token("USDC", 6, U256::from(400_000_000u64))
            .await
            .unwrap();

        // Unconfigured symbols pass untouched
        engine
            .check_token("WETH", 18, U256::MAX / U256::from(2u64))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bridge_corridor_ledger() {
        let corridor = Corridor {
            token: "USDC".to_string(),
            dest_chain_id: 42161,
        };
        let mut bridge_limits = HashMap::new();
        bridge_limits.insert(
            corridor.clone(),
            UsdLimits {
                per_transaction: Some(500),
                ..Default::default()
            },
        );
        let engine = PolicyEngine::new(
            SpendingLimits::default(),
            HashMap::new(),
            bridge_limits,
            None,
            HashSet::new(),
            None,
        );

        engine
            .check_bridge(&corridor, 6, U256::from(400_000_000u64))
            .await
            .unwrap();
        let err = engine
            .check_bridge(&corridor, 6, U256::from(600_000_000u64))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PER_TRANSACTION_LIMIT_EXCEEDED");

        // Other corridors are independent
        let other = Corridor {
            token: "USDC".to_string(),
            dest_chain_id: 10,
        };
        engine
            .check_bridge(&other, 6, U256::from(600_000_000u64))
            .await
            .unwrap();
    }

    struct CountingHandler {
        approve: bool,
        calls: std::sync::atomic::AtomicU64,
    }

    #[async_trait]
    impl ApprovalHandler for CountingHandler {
        async fn handle(&self, _request: ApprovalRequest) -> bool {
            self.calls
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            self.approve
        }
    }

    #[tokio::test]
    async fn test_approval_predicates() {
        let handler = Arc::new(CountingHandler {
            approve: true,
            calls: std::sync::atomic::AtomicU64::new(0),
        });
        let mut trusted = HashSet::new();
        trusted.insert(addr(9));

        let engine = PolicyEngine::new(
            SpendingLimits::default(),
            HashMap::new(),
            HashMap::new(),
            None,
            trusted,
            Some(ApprovalConfig {
                require_when: ApprovalPredicates {
                    amount_exceeds: Some(eth(1)),
                    recipient_is_new: false,
                    recipient_not_in_trusted: true,
                    always: false,
                },
                handler: Some(handler.clone()),
                timeout: std::time::Duration::from_secs(1),
                timeout_policy: TimeoutPolicy::Reject,
            }),
        );

        // Trusted recipient under the threshold: no approval
        assert!(!engine.requires_approval(eth(1), addr(9)).await);
        // Over the threshold: approval even for trusted
        assert!(engine.requires_approval(eth(2), addr(9)).await);
        // Untrusted recipient: approval at any amount
        assert!(engine.requires_approval(U256::one(), addr(3)).await);
    }

    #[tokio::test]
    async fn test_recipient_is_new_predicate() {
        let engine = PolicyEngine::new(
            SpendingLimits::default(),
            HashMap::new(),
            HashMap::new(),
            None,
            HashSet::new(),
            Some(ApprovalConfig {
                require_when: ApprovalPredicates {
                    recipient_is_new: true,
                    ..Default::default()
                },
                handler: None,
                timeout: std::time::Duration::from_secs(1),
                timeout_policy: TimeoutPolicy::Reject,
            }),
        );

        assert!(engine.requires_approval(eth(1), addr(4)).await);
        engine.record_native(eth(1), Some(addr(4))).await;
        assert!(!engine.requires_approval(eth(1), addr(4)).await);
    }

    #[tokio::test]
    async fn test_remaining_snapshot() {
        let engine = engine_with_native(SpendingLimits {
            per_day: Some(eth(10)),
            per_hour: Some(eth(5)),
            ..Default::default()
        });
        engine.record_native(eth(2), None).await;

        let snapshot = engine.native_remaining().await;
        assert_eq!(snapshot.hourly_remaining, Some(eth(3)));
        assert_eq!(snapshot.daily_remaining, Some(eth(8)));
        assert_eq!(snapshot.weekly_remaining, None);
    }
}
