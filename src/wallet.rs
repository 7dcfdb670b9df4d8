//! Agent wallet facade
//!
//! The single entry point for agent-level operations. Every send walks the
//! same pipeline: resolve the recipient, apply address policy, check limits
//! against the live balance, price the gas, optionally simulate, clear the
//! approval gate, then hand off to the shared dispatcher and record the
//! spend. Failures classify into the stable error taxonomy unchanged, and
//! every throwing surface has a `safe_*` twin that reports instead of
//! erroring.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use primitive_types::U256;
use serde::Serialize;

use crate::bridge::{
    BridgeOptions, BridgeResult, BridgeRouter, RouteComparison, RoutePreference, TrackingId,
    UnifiedBridgeStatus,
};
use crate::config::WalletConfig;
use crate::ens::EnsResolver;
use crate::error::{SafeOutcome, WalletError};
use crate::gas::FeeEstimate;
use crate::nonce::NonceManager;
use crate::policy::{
    AddressPolicy, ApprovalDetails, ApprovalRequest, LimitsSnapshot, OperationKind, PolicyEngine,
    RiskLevel, WindowTotals,
};
use crate::rpc::{CallRequest, EthRpc, HttpRpc};
use crate::signer::Account;
use crate::simulate::Simulator;
use crate::tokens::{self, Erc20};
use crate::tx::TxDispatcher;
use crate::types::{format_units, Address, Bytes, Hash, HumanAmount};
use crate::watcher::{PaymentWatcher, WatchedToken, WatcherConfig};

/// Result of a completed send
#[derive(Debug, Clone, Serialize)]
pub struct SendResult {
    pub transaction_hash: Hash,
    pub success: bool,
    /// One-line description, e.g. `"sent 1.5 ETH to 0xd8dA…6045"`
    pub summary: String,
    pub from: Address,
    pub to: Address,
    /// Raw amount in the asset's smallest unit
    pub amount: U256,
    pub formatted_amount: String,
    pub gas_used: u64,
    /// Remaining native limit headroom after this spend
    pub limits_remaining: LimitsSnapshot,
}

/// Point-in-time wallet snapshot
#[derive(Debug, Clone, Serialize)]
pub struct WalletStatus {
    pub address: Address,
    pub agent_id: String,
    pub chain_id: u64,
    pub balance: U256,
    pub balance_formatted: String,
    pub limits_remaining: LimitsSnapshot,
    pub spend_history: WindowTotals,
}

/// The wallet facade; see module docs
pub struct AgentWallet {
    agent_id: String,
    require_simulation: bool,
    account: Arc<Account>,
    rpc: Arc<dyn EthRpc>,
    ens: EnsResolver,
    policy: Arc<PolicyEngine>,
    dispatcher: Arc<TxDispatcher>,
    erc20: Erc20,
    simulator: Simulator,
    bridge: BridgeRouter,
}

impl AgentWallet {
    /// Build a wallet from configuration, connecting over HTTP
    pub async fn new(config: WalletConfig) -> Result<Self, WalletError> {
        config.validate().map_err(|e| WalletError::Config {
            reason: e.to_string(),
        })?;

        let rpc: Arc<dyn EthRpc> = Arc::new(HttpRpc::new(&config.rpc_url)?);
        let ens_rpc: Arc<dyn EthRpc> = match &config.ens_rpc_url {
            Some(url) => Arc::new(HttpRpc::new(url)?),
            None => rpc.clone(),
        };

        let account = Account::from_private_key(&config.private_key)?;

        let policy = PolicyEngine::new(
            config.limits.clone(),
            config.token_limits.clone(),
            config.bridge_limits.clone(),
            config.address_policy.as_ref().map(|p| AddressPolicy {
                mode: p.mode,
                addresses: p.addresses.iter().copied().collect(),
            }),
            config.trusted_addresses.iter().copied().collect(),
            config.approval.clone(),
        );

        let wallet = Self::assemble(
            rpc,
            ens_rpc,
            account,
            policy,
            config.agent_id.clone(),
            config.require_simulation,
        );

        tracing::info!(
            agent_id = %wallet.agent_id,
            address = %wallet.account.address().to_checksum(),
            "agent wallet initialized"
        );
        Ok(wallet)
    }

    /// Wire a wallet from pre-built parts (tests, custom transports)
    pub fn from_parts(
        rpc: Arc<dyn EthRpc>,
        account: Account,
        policy: PolicyEngine,
        agent_id: impl Into<String>,
        require_simulation: bool,
    ) -> Self {
        Self::assemble(
            rpc.clone(),
            rpc,
            account,
            policy,
            agent_id.into(),
            require_simulation,
        )
    }

    fn assemble(
        rpc: Arc<dyn EthRpc>,
        ens_rpc: Arc<dyn EthRpc>,
        account: Account,
        policy: PolicyEngine,
        agent_id: String,
        require_simulation: bool,
    ) -> Self {
        let account = Arc::new(account);
        let policy = Arc::new(policy);
        let nonce = Arc::new(NonceManager::new(rpc.clone(), account.address()));
        let dispatcher = Arc::new(TxDispatcher::new(rpc.clone(), account.clone(), nonce));
        let bridge = BridgeRouter::with_default_adapters(dispatcher.clone(), policy.clone());

        AgentWallet {
            agent_id,
            require_simulation,
            erc20: Erc20::new(rpc.clone()),
            simulator: Simulator::new(rpc.clone()),
            ens: EnsResolver::new(ens_rpc),
            account,
            rpc,
            policy,
            dispatcher,
            bridge,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn address(&self) -> Address {
        self.account.address()
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn rpc(&self) -> &Arc<dyn EthRpc> {
        &self.rpc
    }

    pub fn policy(&self) -> &Arc<PolicyEngine> {
        &self.policy
    }

    pub fn bridge_router(&self) -> &BridgeRouter {
        &self.bridge
    }

    pub fn ens(&self) -> &EnsResolver {
        &self.ens
    }

    pub fn dispatcher(&self) -> &Arc<TxDispatcher> {
        &self.dispatcher
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn balance(&self) -> Result<U256, WalletError> {
        self.rpc.get_balance(self.account.address()).await
    }

    pub async fn token_balance(&self, token: Address) -> Result<U256, WalletError> {
        self.erc20.balance_of(token, self.account.address()).await
    }

    /// Accepts checksummed hex, lowercase hex, or an ENS name
    pub async fn resolve_recipient(&self, input: &str) -> Result<Address, WalletError> {
        let trimmed = input.trim();
        if trimmed.contains('.') {
            return self
                .ens
                .resolve(trimmed)
                .await?
                .ok_or_else(|| WalletError::EnsNotFound {
                    name: trimmed.to_string(),
                });
        }
        let address: Address = trimmed.parse()?;
        if address.is_zero() {
            return Err(WalletError::InvalidAddress {
                input: input.to_string(),
                reason: "the zero address is not a valid recipient".to_string(),
            });
        }
        Ok(address)
    }

    /// Full fee estimate for a prospective native send
    pub async fn estimate_send_cost(
        &self,
        recipient: &str,
        amount: HumanAmount,
    ) -> Result<FeeEstimate, WalletError> {
        let to = self.resolve_recipient(recipient).await?;
        let amount = amount.to_raw(18)?;
        let request = CallRequest {
            from: Some(self.account.address()),
            to: Some(to),
            value: Some(amount),
            ..Default::default()
        };
        self.dispatcher.oracle().estimate(&request).await
    }

    /// Wallet snapshot: balance, headroom, spend history
    pub async fn status(&self) -> Result<WalletStatus, WalletError> {
        let balance = self.balance().await?;
        Ok(WalletStatus {
            address: self.account.address(),
            agent_id: self.agent_id.clone(),
            chain_id: self.rpc.chain_id().await?,
            balance,
            balance_formatted: format!("{} ETH", format_units(balance, 18)),
            limits_remaining: self.policy.native_remaining().await,
            spend_history: self.policy.native_history().await,
        })
    }

    // ------------------------------------------------------------------
    // Native sends
    // ------------------------------------------------------------------

    /// Send native currency through the full policy pipeline
    pub async fn send(
        &self,
        recipient: &str,
        amount: HumanAmount,
    ) -> Result<SendResult, WalletError> {
        let to = self.resolve_recipient(recipient).await?;
        self.policy.check_address(to)?;

        let amount_wei = amount.to_raw(18)?;
        let balance = self.balance().await?;
        self.policy.check_native(amount_wei, balance).await?;

        let request = CallRequest {
            from: Some(self.account.address()),
            to: Some(to),
            value: Some(amount_wei),
            ..Default::default()
        };
        let fees = self.dispatcher.oracle().estimate(&request).await?;
        let total = amount_wei.saturating_add(fees.estimated_cost());
        if total > balance {
            return Err(WalletError::InsufficientFunds {
                required: total,
                available: balance,
            });
        }

        if self.require_simulation {
            self.run_simulation_gate(&request).await?;
        }

        let formatted = format!("{} ETH", format_units(amount_wei, 18));
        self.approval_gate(to, amount_wei, &formatted, &fees, None)
            .await?;

        let (hash, receipt) = self
            .dispatcher
            .send_with_fees(Some(to), amount_wei, Vec::new(), &fees)
            .await?;

        self.policy.record_native(amount_wei, Some(to)).await;

        Ok(SendResult {
            transaction_hash: hash,
            success: true,
            summary: format!("sent {} to {}", formatted, to.to_checksum()),
            from: self.account.address(),
            to,
            amount: amount_wei,
            formatted_amount: formatted,
            gas_used: receipt.gas_used,
            limits_remaining: self.policy.native_remaining().await,
        })
    }

    /// Non-unwinding twin of [`send`]
    pub async fn safe_send(&self, recipient: &str, amount: HumanAmount) -> SafeOutcome<SendResult> {
        self.send(recipient, amount).await.into()
    }

    // ------------------------------------------------------------------
    // Token sends
    // ------------------------------------------------------------------

    /// Send an ERC-20 token; `token` is a symbol from the registry or a
    /// contract address
    pub async fn send_token(
        &self,
        token: &str,
        recipient: &str,
        amount: HumanAmount,
    ) -> Result<SendResult, WalletError> {
        let (token_address, symbol, decimals) = self.resolve_token(token).await?;

        let to = self.resolve_recipient(recipient).await?;
        self.policy.check_address(to)?;

        let amount_raw = amount.to_raw(decimals)?;
        let token_balance = self.token_balance(token_address).await?;
        if token_balance < amount_raw {
            return Err(WalletError::InsufficientFunds {
                required: amount_raw,
                available: token_balance,
            });
        }
        self.policy.check_token(&symbol, decimals, amount_raw).await?;

        let data = tokens::transfer_calldata(to, amount_raw)?;
        let request = CallRequest {
            from: Some(self.account.address()),
            to: Some(token_address),
            data: Some(Bytes(data.clone())),
            ..Default::default()
        };
        let fees = self.dispatcher.oracle().estimate(&request).await?;

        let balance = self.balance().await?;
        if fees.estimated_cost() > balance {
            return Err(WalletError::InsufficientGas {
                amount: U256::zero(),
                gas_cost: fees.estimated_cost(),
            });
        }

        if self.require_simulation {
            self.run_simulation_gate(&request).await?;
        }

        let formatted = format!("{} {}", format_units(amount_raw, decimals), symbol);
        self.approval_gate(
            to,
            amount_raw,
            &formatted,
            &fees,
            Some("transfer(address,uint256)"),
        )
        .await?;

        let (hash, receipt) = self
            .dispatcher
            .send_with_fees(Some(token_address), U256::zero(), data, &fees)
            .await?;

        self.policy
            .record_token(&symbol, amount_raw, Some(to))
            .await;

        Ok(SendResult {
            transaction_hash: hash,
            success: true,
            summary: format!("sent {} to {}", formatted, to.to_checksum()),
            from: self.account.address(),
            to,
            amount: amount_raw,
            formatted_amount: formatted,
            gas_used: receipt.gas_used,
            limits_remaining: self.policy.native_remaining().await,
        })
    }

    /// Non-unwinding twin of [`send_token`]
    pub async fn safe_send_token(
        &self,
        token: &str,
        recipient: &str,
        amount: HumanAmount,
    ) -> SafeOutcome<SendResult> {
        self.send_token(token, recipient, amount).await.into()
    }

    /// Send USDC on the current chain
    pub async fn send_usdc(
        &self,
        recipient: &str,
        amount: HumanAmount,
    ) -> Result<SendResult, WalletError> {
        self.send_token("USDC", recipient, amount).await
    }

    /// Non-unwinding twin of [`send_usdc`]
    pub async fn safe_send_usdc(
        &self,
        recipient: &str,
        amount: HumanAmount,
    ) -> SafeOutcome<SendResult> {
        self.send_token("USDC", recipient, amount).await.into()
    }

    // ------------------------------------------------------------------
    // Bridging
    // ------------------------------------------------------------------

    pub async fn bridge(&self, options: BridgeOptions) -> Result<BridgeResult, WalletError> {
        self.bridge.bridge(options).await
    }

    /// Non-unwinding twin of [`bridge`]
    pub async fn safe_bridge(&self, options: BridgeOptions) -> SafeOutcome<BridgeResult> {
        self.bridge.bridge(options).await.into()
    }

    /// Fan out quotes for a corridor and score them
    pub async fn compare_bridge_routes(
        &self,
        token: &str,
        amount: HumanAmount,
        dest_chain_id: u64,
        preference: RoutePreference,
    ) -> Result<RouteComparison, WalletError> {
        let source_chain_id = self.rpc.chain_id().await?;
        let info = tokens::token_by_symbol(token).ok_or_else(|| {
            WalletError::UnsupportedStablecoin {
                symbol: token.to_string(),
                chain_id: source_chain_id,
            }
        })?;
        let request = crate::bridge::BridgeRequest {
            token: info.symbol.to_string(),
            decimals: info.decimals,
            amount: amount.to_raw(info.decimals)?,
            source_chain_id,
            dest_chain_id,
            sender: self.account.address(),
            recipient: self.account.address(),
            max_slippage_bps: 100,
        };
        self.bridge.compare_routes(&request, &preference).await
    }

    pub async fn bridge_status(
        &self,
        tracking_id: &TrackingId,
    ) -> Result<UnifiedBridgeStatus, WalletError> {
        self.bridge.status_by_tracking_id(tracking_id).await
    }

    /// Poll a transfer to a terminal state; timeouts are retryable and the
    /// tracking id stays valid
    pub async fn wait_for_bridge(
        &self,
        tracking_id: &TrackingId,
        timeout: Duration,
    ) -> Result<UnifiedBridgeStatus, WalletError> {
        self.bridge
            .wait_for_completion(tracking_id, timeout, Duration::from_secs(15))
            .await
    }

    // ------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------

    /// A watcher for payments into this wallet
    pub fn create_watcher(&self, tokens: Vec<WatchedToken>) -> PaymentWatcher {
        PaymentWatcher::new(
            self.rpc.clone(),
            WatcherConfig::new(tokens, self.account.address()),
        )
    }

    /// A watcher preloaded with every registry stablecoin deployed on the
    /// current chain
    pub async fn create_stablecoin_watcher(&self) -> Result<PaymentWatcher, WalletError> {
        let chain_id = self.rpc.chain_id().await?;
        let watched: Vec<WatchedToken> = tokens::KNOWN_TOKENS
            .iter()
            .filter_map(|info| {
                tokens::token_address(info.symbol, chain_id).map(|address| WatchedToken {
                    address,
                    symbol: info.symbol.to_string(),
                    decimals: info.decimals,
                })
            })
            .collect();
        Ok(self.create_watcher(watched))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn run_simulation_gate(&self, request: &CallRequest) -> Result<(), WalletError> {
        let outcome = self.simulator.simulate(request).await?;
        if !outcome.success {
            return Err(WalletError::SimulationReverted {
                reason: outcome.revert_reason,
            });
        }
        Ok(())
    }

    /// Resolve a token argument into `(address, symbol, decimals)`
    async fn resolve_token(&self, token: &str) -> Result<(Address, String, u8), WalletError> {
        if token.starts_with("0x") || token.starts_with("0X") {
            let address: Address = token.parse()?;
            let decimals = self.erc20.decimals(address).await?;
            let symbol = self
                .erc20
                .symbol(address)
                .await
                .unwrap_or_else(|_| "TOKEN".to_string());
            return Ok((address, symbol, decimals));
        }

        let chain_id = self.rpc.chain_id().await?;
        let info =
            tokens::token_by_symbol(token).ok_or_else(|| WalletError::UnsupportedStablecoin {
                symbol: token.to_string(),
                chain_id,
            })?;
        let address = tokens::token_address(info.symbol, chain_id).ok_or(
            WalletError::UnsupportedStablecoin {
                symbol: token.to_string(),
                chain_id,
            },
        )?;
        Ok((address, info.symbol.to_string(), info.decimals))
    }

    async fn approval_gate(
        &self,
        to: Address,
        amount: U256,
        formatted: &str,
        fees: &FeeEstimate,
        contract_method: Option<&str>,
    ) -> Result<(), WalletError> {
        if !self.policy.requires_approval(amount, to).await {
            return Ok(());
        }

        let mut warnings = Vec::new();
        let mut risk = RiskLevel::Low;
        if self.policy.is_new_recipient(to).await {
            warnings.push("first transfer to this recipient".to_string());
            risk = RiskLevel::Medium;
        }
        if let Some(threshold) = self.policy.approval_threshold() {
            if amount > threshold {
                warnings.push("amount exceeds the configured approval threshold".to_string());
                risk = RiskLevel::High;
            }
        }

        let gas_cost = format!("{} ETH", format_units(fees.estimated_cost(), 18));
        let request = ApprovalRequest::new(
            if contract_method.is_some() {
                OperationKind::ContractCall
            } else {
                OperationKind::Send
            },
            format!("{}: send {} to {}", self.agent_id, formatted, to.to_checksum()),
            ApprovalDetails {
                from: self.account.address(),
                to: Some(to),
                value: Some(formatted.to_string()),
                gas_cost: Some(gas_cost.clone()),
                total_cost: Some(gas_cost),
                contract_method: contract_method.map(str::to_string),
                risk,
                warnings,
            },
        );
        self.policy.approve(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::abi;
    use crate::policy::{
        AddressPolicyMode, ApprovalConfig, ApprovalHandler, ApprovalPredicates, SpendingLimits,
        TimeoutPolicy,
    };
    use crate::testing::MockRpc;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const RECIPIENT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    fn eth(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    fn wallet_on(rpc: Arc<MockRpc>, policy: PolicyEngine) -> AgentWallet {
        rpc.set_base_fee(Some(U256::from(1_000_000_000u64)));
        let account = Account::from_private_key(DEV_KEY).unwrap();
        rpc.set_balance(account.address(), eth(100));
        AgentWallet::from_parts(rpc, account, policy, "test-agent", false)
    }

    #[tokio::test]
    async fn test_send_happy_path() {
        let rpc = Arc::new(MockRpc::new(1));
        let wallet = wallet_on(rpc.clone(), PolicyEngine::permissive());

        let result = wallet.send(RECIPIENT, HumanAmount::from("1.5")).await.unwrap();
        assert!(result.success);
        assert_eq!(result.amount, U256::from(1_500_000_000_000_000_000u64));
        assert_eq!(result.formatted_amount, "1.5 ETH");
        assert_eq!(result.to.to_checksum(), RECIPIENT);
        assert!(result.summary.contains("1.5 ETH"));
        assert_eq!(rpc.sent_transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_send_rejects_invalid_recipient() {
        let rpc = Arc::new(MockRpc::new(1));
        let wallet = wallet_on(rpc.clone(), PolicyEngine::permissive());

        let err = wallet
            .send("0x1234", HumanAmount::from("1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ADDRESS");

        let err = wallet
            .send(
                "0x0000000000000000000000000000000000000000",
                HumanAmount::from("1"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ADDRESS");
        assert!(rpc.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_send_checks_gas_headroom() {
        let rpc = Arc::new(MockRpc::new(1));
        let wallet = wallet_on(rpc.clone(), PolicyEngine::permissive());

        // Amount equals the balance; gas pushes it over
        let err = wallet
            .send(RECIPIENT, HumanAmount::from(100u64))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
        assert!(rpc.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_send_respects_address_policy() {
        let rpc = Arc::new(MockRpc::new(1));
        let mut blocked = HashSet::new();
        blocked.insert(RECIPIENT.parse::<Address>().unwrap());
        let policy = PolicyEngine::new(
            SpendingLimits::default(),
            HashMap::new(),
            HashMap::new(),
            Some(AddressPolicy {
                mode: AddressPolicyMode::Blocklist,
                addresses: blocked,
            }),
            HashSet::new(),
            None,
        );
        let wallet = wallet_on(rpc.clone(), policy);

        let err = wallet
            .send(RECIPIENT, HumanAmount::from("1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ADDRESS_BLOCKED");
        assert!(rpc.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_send_records_spend_against_limits() {
        let rpc = Arc::new(MockRpc::new(1));
        let policy = PolicyEngine::new(
            SpendingLimits {
                per_day: Some(eth(10)),
                ..Default::default()
            },
            HashMap::new(),
            HashMap::new(),
            None,
            HashSet::new(),
            None,
        );
        let wallet = wallet_on(rpc.clone(), policy);

        let result = wallet.send(RECIPIENT, HumanAmount::from(7u64)).await.unwrap();
        assert_eq!(result.limits_remaining.daily_remaining, Some(eth(3)));

        let err = wallet
            .send(RECIPIENT, HumanAmount::from(4u64))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DAILY_LIMIT_EXCEEDED");
        assert_eq!(rpc.sent_transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_simulation_gate_blocks_reverting_send() {
        let rpc = Arc::new(MockRpc::new(1));
        rpc.set_base_fee(Some(U256::from(1_000_000_000u64)));
        let account = Account::from_private_key(DEV_KEY).unwrap();
        rpc.set_balance(account.address(), eth(100));
        let wallet =
            AgentWallet::from_parts(rpc.clone(), account, PolicyEngine::permissive(), "t", true);

        let revert = abi::encode_call(
            "Error(string)",
            &[abi::AbiValue::String("no thanks".to_string())],
        )
        .unwrap();
        rpc.set_revert(&format!("0x{}", hex::encode(revert)));

        let err = wallet
            .send(RECIPIENT, HumanAmount::from("1"))
            .await
            .unwrap_err();
        // Estimation sees the revert first and carries the reason
        assert_eq!(err.code(), "GAS_ESTIMATION_FAILED");
        assert!(rpc.sent_transactions().is_empty());
    }

    struct DenyAll;

    #[async_trait]
    impl ApprovalHandler for DenyAll {
        async fn handle(&self, _request: ApprovalRequest) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_approval_denied_blocks_send() {
        let rpc = Arc::new(MockRpc::new(1));
        let policy = PolicyEngine::new(
            SpendingLimits::default(),
            HashMap::new(),
            HashMap::new(),
            None,
            HashSet::new(),
            Some(ApprovalConfig {
                require_when: ApprovalPredicates {
                    always: true,
                    ..Default::default()
                },
                handler: Some(Arc::new(DenyAll)),
                timeout: Duration::from_secs(1),
                timeout_policy: TimeoutPolicy::Reject,
            }),
        );
        let wallet = wallet_on(rpc.clone(), policy);

        let err = wallet
            .send(RECIPIENT, HumanAmount::from("1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "APPROVAL_DENIED");
        assert!(rpc.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_send_to_ens_name() {
        let rpc = Arc::new(MockRpc::new(1));
        let resolved: Address = RECIPIENT.parse().unwrap();
        let resolver = Address([0x77; 20]);
        rpc.push_call_result(
            abi::selector("resolver(bytes32)").unwrap(),
            Bytes(resolver.as_word().to_vec()),
        );
        rpc.push_call_result(
            abi::selector("addr(bytes32)").unwrap(),
            Bytes(resolved.as_word().to_vec()),
        );

        let wallet = wallet_on(rpc.clone(), PolicyEngine::permissive());
        let result = wallet.send("alice.eth", HumanAmount::from("2")).await.unwrap();
        assert_eq!(result.to, resolved);
    }

    #[tokio::test]
    async fn test_send_to_unregistered_ens_name() {
        let rpc = Arc::new(MockRpc::new(1));
        let wallet = wallet_on(rpc.clone(), PolicyEngine::permissive());
        // Default mock call response is a zero word: no resolver
        let err = wallet
            .send("nobody.eth", HumanAmount::from("1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ENS_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_send_token_by_symbol() {
        let rpc = Arc::new(MockRpc::new(1));
        let wallet = wallet_on(rpc.clone(), PolicyEngine::permissive());

        // 500 USDC balance
        let mut word = [0u8; 32];
        word[24..].copy_from_slice(&500_000_000u64.to_be_bytes());
        rpc.push_call_result(abi::selector("balanceOf(address)").unwrap(), Bytes(word.to_vec()));

        let result = wallet
            .send_token("USDC", RECIPIENT, HumanAmount::from(100u64))
            .await
            .unwrap();
        assert_eq!(result.amount, U256::from(100_000_000u64));
        assert_eq!(result.formatted_amount, "100 USDC");

        // The raw transaction carries transfer() calldata
        let sent = rpc.sent_transactions();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].windows(4).any(|w| w == [0xa9, 0x05, 0x9c, 0xbb]));
    }

    #[tokio::test]
    async fn test_send_token_insufficient_balance() {
        let rpc = Arc::new(MockRpc::new(1));
        let wallet = wallet_on(rpc.clone(), PolicyEngine::permissive());

        let mut word = [0u8; 32];
        word[24..].copy_from_slice(&50_000_000u64.to_be_bytes());
        rpc.push_call_result(abi::selector("balanceOf(address)").unwrap(), Bytes(word.to_vec()));

        let err = wallet
            .send_token("USDC", RECIPIENT, HumanAmount::from(100u64))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
    }

    #[tokio::test]
    async fn test_unsupported_stablecoin() {
        // USDT has no deployment on Base in the registry
        let rpc = Arc::new(MockRpc::new(8453));
        let wallet = wallet_on(rpc, PolicyEngine::permissive());
        let err = wallet
            .send_token("USDT", RECIPIENT, HumanAmount::from(1u64))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_STABLECOIN");
    }

    #[tokio::test]
    async fn test_safe_send_reports_instead_of_erroring() {
        let rpc = Arc::new(MockRpc::new(1));
        let wallet = wallet_on(rpc, PolicyEngine::permissive());

        let outcome = wallet.safe_send("not-an-address", HumanAmount::from("1")).await;
        assert!(!outcome.is_success());
        let report = outcome.into_result().unwrap_err();
        assert_eq!(report.code, "INVALID_ADDRESS");
        assert!(!report.retryable);
        assert!(!report.suggestion.is_empty());
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let rpc = Arc::new(MockRpc::new(1));
        let wallet = wallet_on(rpc, PolicyEngine::permissive());
        let status = wallet.status().await.unwrap();
        assert_eq!(status.chain_id, 1);
        assert_eq!(status.balance, eth(100));
        assert_eq!(status.balance_formatted, "100 ETH");
        assert_eq!(status.agent_id, "test-agent");
    }

    #[tokio::test]
    async fn test_stablecoin_watcher_covers_chain_deployments() {
        let rpc = Arc::new(MockRpc::new(1));
        let wallet = wallet_on(rpc, PolicyEngine::permissive());
        let watcher = wallet.create_stablecoin_watcher().await.unwrap();
        // Mainnet carries USDC, USDT, and DAI in the registry
        assert_eq!(watcher.handler_count(), 0);
        drop(watcher);
    }
}
