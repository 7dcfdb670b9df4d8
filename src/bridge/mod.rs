//! Bridge router: discovery, quote fan-out, route selection, deposit
//!
//! Adapters register with the router and declare which corridors they serve.
//! `compare_routes` fans quote requests out to every claiming adapter,
//! tolerates per-adapter failure, applies the preference's hard filters, and
//! scores survivors. `bridge` drives the full transfer: route resolution,
//! corridor limits, ERC-20 allowance (zero-then-set for tokens holding a
//! non-zero remainder), the adapter deposit, and the tracking-id registry
//! that later resolves status queries back to their protocol.

pub mod across;
pub mod cctp;
pub mod stargate;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use primitive_types::U256;
use tokio::sync::Mutex;

use crate::error::WalletError;
use crate::policy::{Corridor, PolicyEngine};
use crate::tokens::{self, Erc20};
use crate::tx::TxDispatcher;
use crate::types::{Address, Hash, HumanAmount};
pub use types::{
    BridgeProtocol, BridgeQuote, BridgeRequest, BridgeResult, BridgeStatusKind, DepositOutcome,
    EstimatedTime, FeeBreakdown, RouteInfo, RoutePreference, RoutePriority, TrackingId,
    UnifiedBridgeStatus,
};

/// One bridge protocol's implementation surface
#[async_trait]
pub trait BridgeAdapter: Send + Sync {
    fn protocol(&self) -> BridgeProtocol;

    /// Adapter-declared reliability rank; lower is better
    fn reliability_rank(&self) -> u8;

    fn supports_route(&self, source_chain_id: u64, dest_chain_id: u64, token: &str) -> bool;

    /// Destination chains reachable from `source_chain_id` for `token`
    fn destination_chains(&self, source_chain_id: u64, token: &str) -> Vec<u64>;

    /// The contract that must hold the token allowance before deposit
    fn spender(&self, source_chain_id: u64) -> Result<Address, WalletError>;

    async fn quote(&self, request: &BridgeRequest) -> Result<BridgeQuote, WalletError>;

    /// Execute the deposit; every submitted transaction must be
    /// receipt-checked before this returns
    async fn deposit(
        &self,
        request: &BridgeRequest,
        quote: &BridgeQuote,
    ) -> Result<DepositOutcome, WalletError>;

    async fn status(&self, tracking_id: &TrackingId) -> Result<UnifiedBridgeStatus, WalletError>;
}

/// Options for a bridge transfer
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub token: String,
    pub amount: HumanAmount,
    pub dest_chain_id: u64,
    /// Defaults to the sending account
    pub recipient: Option<Address>,
    /// Pin a protocol instead of letting the router pick
    pub protocol: Option<BridgeProtocol>,
    pub preference: RoutePreference,
    pub max_slippage_bps: u32,
}

impl BridgeOptions {
    pub fn new(token: impl Into<String>, amount: impl Into<HumanAmount>, dest_chain_id: u64) -> Self {
        BridgeOptions {
            token: token.into(),
            amount: amount.into(),
            dest_chain_id,
            recipient: None,
            protocol: None,
            preference: RoutePreference::default(),
            max_slippage_bps: 100,
        }
    }
}

/// Outcome of a quote fan-out
#[derive(Debug, Clone)]
pub struct RouteComparison {
    /// Surviving quotes, best first according to the preference
    pub quotes: Vec<BridgeQuote>,
    pub recommended: Option<BridgeProtocol>,
    /// Adapters that failed or were filtered, with the reason
    pub rejected: Vec<(BridgeProtocol, String)>,
}

/// The bridge router; see module docs
pub struct BridgeRouter {
    adapters: Vec<Arc<dyn BridgeAdapter>>,
    dispatcher: Arc<TxDispatcher>,
    erc20: Erc20,
    policy: Arc<PolicyEngine>,
    tracked: Mutex<HashMap<Hash, BridgeProtocol>>,
}

impl BridgeRouter {
    pub fn new(
        dispatcher: Arc<TxDispatcher>,
        policy: Arc<PolicyEngine>,
        adapters: Vec<Arc<dyn BridgeAdapter>>,
    ) -> Self {
        BridgeRouter {
            erc20: Erc20::new(dispatcher.rpc().clone()),
            dispatcher,
            policy,
            adapters,
            tracked: Mutex::new(HashMap::new()),
        }
    }

    /// Router with the stock CCTP, Across, and Stargate adapters
    pub fn with_default_adapters(dispatcher: Arc<TxDispatcher>, policy: Arc<PolicyEngine>) -> Self {
        let adapters: Vec<Arc<dyn BridgeAdapter>> = vec![
            Arc::new(cctp::CctpAdapter::new(dispatcher.clone())),
            Arc::new(across::AcrossAdapter::new(dispatcher.clone())),
            Arc::new(stargate::StargateAdapter::new(dispatcher.clone())),
        ];
        Self::new(dispatcher, policy, adapters)
    }

    pub fn adapters(&self) -> &[Arc<dyn BridgeAdapter>] {
        &self.adapters
    }

    /// Corridors reachable for a token from the given source chain
    pub fn supported_routes(&self, token: &str, source_chain_id: u64) -> Vec<(BridgeProtocol, u64)> {
        let mut routes = Vec::new();
        for adapter in &self.adapters {
            for dest in adapter.destination_chains(source_chain_id, token) {
                routes.push((adapter.protocol(), dest));
            }
        }
        routes
    }

    /// Fan out quotes, filter, and score per the preference
    pub async fn compare_routes(
        &self,
        request: &BridgeRequest,
        preference: &RoutePreference,
    ) -> Result<RouteComparison, WalletError> {
        let candidates: Vec<&Arc<dyn BridgeAdapter>> = self
            .adapters
            .iter()
            .filter(|a| {
                a.supports_route(
                    request.source_chain_id,
                    request.dest_chain_id,
                    &request.token,
                )
            })
            .collect();

        if candidates.is_empty() {
            return Err(WalletError::BridgeNoRoute {
                token: request.token.clone(),
                src: request.source_chain_id,
                dst: request.dest_chain_id,
            });
        }

        let results = join_all(candidates.iter().map(|adapter| async move {
            (adapter.protocol(), adapter.quote(request).await)
        }))
        .await;

        let now = Utc::now();
        let mut rejected = Vec::new();
        let mut survivors: Vec<(BridgeQuote, u8)> = Vec::new();

        for (protocol, result) in results {
            match result {
                Err(err) => {
                    tracing::warn!(protocol = %protocol, error = %err, "quote failed");
                    rejected.push((protocol, err.to_string()));
                }
                Ok(quote) => match filter_quote(&quote, preference, now) {
                    Err(reason) => rejected.push((protocol, reason)),
                    Ok(()) => {
                        let rank = self
                            .adapters
                            .iter()
                            .find(|a| a.protocol() == protocol)
                            .map(|a| a.reliability_rank())
                            .unwrap_or(u8::MAX);
                        survivors.push((quote, rank));
                    }
                },
            }
        }

        sort_by_preference(&mut survivors, preference.priority);
        let recommended = survivors.first().map(|(q, _)| q.protocol);
        let quotes = survivors.into_iter().map(|(q, _)| q).collect();

        Ok(RouteComparison {
            quotes,
            recommended,
            rejected,
        })
    }

    /// Execute a bridge transfer end to end
    pub async fn bridge(&self, options: BridgeOptions) -> Result<BridgeResult, WalletError> {
        let source_chain_id = self.dispatcher.rpc().chain_id().await?;

        let token_info = tokens::token_by_symbol(&options.token).ok_or_else(|| {
            WalletError::UnsupportedStablecoin {
                symbol: options.token.clone(),
                chain_id: source_chain_id,
            }
        })?;
        let token_address = tokens::token_address(&options.token, source_chain_id).ok_or(
            WalletError::UnsupportedStablecoin {
                symbol: options.token.clone(),
                chain_id: source_chain_id,
            },
        )?;
        let amount = options.amount.to_raw(token_info.decimals)?;

        let request = BridgeRequest {
            token: token_info.symbol.to_string(),
            decimals: token_info.decimals,
            amount,
            source_chain_id,
            dest_chain_id: options.dest_chain_id,
            sender: self.dispatcher.sender(),
            recipient: options.recipient.unwrap_or_else(|| self.dispatcher.sender()),
            max_slippage_bps: options.max_slippage_bps,
        };

        // Resolve the adapter and quote
        let (adapter, quote) = match options.protocol {
            Some(protocol) => {
                let adapter = self.adapter_for(protocol)?;
                if !adapter.supports_route(
                    request.source_chain_id,
                    request.dest_chain_id,
                    &request.token,
                ) {
                    return Err(WalletError::BridgeNoRoute {
                        token: request.token.clone(),
                        src: request.source_chain_id,
                        dst: request.dest_chain_id,
                    });
                }
                let quote = adapter.quote(&request).await?;
                (adapter.clone(), quote)
            }
            None => {
                let comparison = self.compare_routes(&request, &options.preference).await?;
                let quote = comparison
                    .quotes
                    .into_iter()
                    .next()
                    .ok_or(WalletError::BridgeNoRoute {
                        token: request.token.clone(),
                        src: request.source_chain_id,
                        dst: request.dest_chain_id,
                    })?;
                (self.adapter_for(quote.protocol)?.clone(), quote)
            }
        };

        if quote.is_expired_at(Utc::now()) {
            return Err(WalletError::BridgeQuoteExpired {
                expired_at: quote.expires_at,
            });
        }

        // Corridor limits once a route exists, before any on-chain action
        let corridor = Corridor {
            token: request.token.clone(),
            dest_chain_id: request.dest_chain_id,
        };
        self.policy
            .check_bridge(&corridor, request.decimals, amount)
            .await?;

        // Allowance for the protocol's spender, receipt-checked
        let spender = adapter.spender(request.source_chain_id)?;
        self.ensure_allowance(token_address, spender, amount).await?;

        tracing::info!(
            protocol = %quote.protocol,
            token = %request.token,
            amount = %amount,
            dest_chain = request.dest_chain_id,
            "executing bridge deposit"
        );

        let outcome = adapter.deposit(&request, &quote).await?;

        self.tracked
            .lock()
            .await
            .insert(outcome.tracking_id.0, quote.protocol);
        self.policy.record_bridge(&corridor, amount).await;

        tracing::info!(
            tracking_id = %outcome.tracking_id,
            source_tx = %outcome.source_tx_hash,
            protocol = %quote.protocol,
            "bridge deposit submitted"
        );

        Ok(BridgeResult {
            tracking_id: outcome.tracking_id,
            protocol: quote.protocol,
            source_tx_hash: outcome.source_tx_hash,
            input_amount: quote.input_amount,
            output_amount: quote.output_amount,
            estimated_time: quote.estimated_time,
        })
    }

    /// Resolve a tracking id to its protocol and fetch the unified status
    pub async fn status_by_tracking_id(
        &self,
        tracking_id: &TrackingId,
    ) -> Result<UnifiedBridgeStatus, WalletError> {
        let protocol = self
            .tracked
            .lock()
            .await
            .get(&tracking_id.0)
            .copied()
            .ok_or_else(|| WalletError::BridgeUnknownTracking {
                tracking_id: tracking_id.to_hex(),
            })?;
        self.adapter_for(protocol)?.status(tracking_id).await
    }

    /// Poll a transfer until terminal; a timeout is retryable and leaves the
    /// tracking id queryable
    pub async fn wait_for_completion(
        &self,
        tracking_id: &TrackingId,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<UnifiedBridgeStatus, WalletError> {
        let started = std::time::Instant::now();
        loop {
            let status = self.status_by_tracking_id(tracking_id).await?;
            if status.status.is_terminal() {
                return Ok(status);
            }
            if started.elapsed() >= timeout {
                return Err(WalletError::BridgeCompletionTimeout {
                    tracking_id: tracking_id.to_hex(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    fn adapter_for(&self, protocol: BridgeProtocol) -> Result<&Arc<dyn BridgeAdapter>, WalletError> {
        self.adapters
            .iter()
            .find(|a| a.protocol() == protocol)
            .ok_or_else(|| WalletError::BridgeProtocolUnavailable {
                protocol: protocol.to_string(),
                reason: "no adapter registered".to_string(),
            })
    }

    /// Bring the spender's allowance up to `amount`
    ///
    /// Tokens in the USDT family revert on approve when the current
    /// allowance is non-zero, so a shrinking or stale allowance is zeroed
    /// first. Both approvals run through the shared dispatcher and abort as
    /// `BRIDGE_VALIDATION_FAILED` when their receipts report a revert.
    async fn ensure_allowance(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), WalletError> {
        let owner = self.dispatcher.sender();
        let current = self.erc20.allowance(token, owner, spender).await?;
        if current >= amount {
            return Ok(());
        }

        if !current.is_zero() {
            tracing::debug!(
                token = %token.to_checksum(),
                spender = %spender.to_checksum(),
                current = %current,
                "zeroing stale allowance before re-approval"
            );
            self.submit_approval(token, spender, U256::zero()).await?;
        }

        self.submit_approval(token, spender, amount).await
    }

    async fn submit_approval(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), WalletError> {
        let data = tokens::approve_calldata(spender, amount)?;
        match self.dispatcher.send(Some(token), U256::zero(), data).await {
            Ok((hash, _receipt)) => {
                tracing::debug!(tx_hash = %hash, amount = %amount, "approval confirmed");
                Ok(())
            }
            Err(WalletError::TransactionReverted { hash, .. }) => {
                Err(WalletError::BridgeValidationFailed {
                    reason: format!("approval transaction {hash} reverted"),
                })
            }
            Err(other) => Err(other),
        }
    }
}

fn filter_quote(
    quote: &BridgeQuote,
    preference: &RoutePreference,
    now: chrono::DateTime<Utc>,
) -> Result<(), String> {
    if quote.is_expired_at(now) {
        return Err("quote expired".to_string());
    }
    if preference.excluded.contains(&quote.protocol) {
        return Err("protocol excluded by preference".to_string());
    }
    if !preference.preferred.is_empty() && !preference.preferred.contains(&quote.protocol) {
        return Err("protocol not in preferred set".to_string());
    }
    if let Some(max_fee) = preference.max_fee_usd {
        if quote.fee.total_usd > max_fee {
            return Err(format!(
                "fee {:.4} USD above the {max_fee:.4} USD ceiling",
                quote.fee.total_usd
            ));
        }
    }
    if let Some(max_minutes) = preference.max_time_minutes {
        if quote.estimated_time.max_secs > max_minutes * 60 {
            return Err(format!(
                "worst-case {}s above the {}m ceiling",
                quote.estimated_time.max_secs, max_minutes
            ));
        }
    }
    if let (Some(max_bps), Some(quote_bps)) = (preference.max_slippage_bps, quote.slippage_bps) {
        if quote_bps > max_bps {
            return Err(format!(
                "slippage {quote_bps} bps above the {max_bps} bps ceiling"
            ));
        }
    }
    Ok(())
}

fn sort_by_preference(survivors: &mut [(BridgeQuote, u8)], priority: RoutePriority) {
    match priority {
        RoutePriority::Cost => survivors.sort_by(|(a, _), (b, _)| {
            a.fee
                .total_usd
                .partial_cmp(&b.fee.total_usd)
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
        RoutePriority::Speed => {
            survivors.sort_by_key(|(q, _)| q.estimated_time.max_secs);
        }
        RoutePriority::Reliability => survivors.sort_by(|(a, ra), (b, rb)| {
            ra.cmp(rb).then(
                a.fee
                    .total_usd
                    .partial_cmp(&b.fee.total_usd)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nonce::NonceManager;
    use crate::signer::Account;
    use crate::testing::MockRpc;
    use crate::types::Bytes;
    use chrono::Duration as ChronoDuration;

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn quote_for(protocol: BridgeProtocol, fee_usd: f64, max_secs: u64) -> BridgeQuote {
        BridgeQuote {
            protocol,
            input_amount: U256::from(100_000_000u64),
            output_amount: U256::from(99_000_000u64),
            fee: FeeBreakdown {
                protocol: U256::from(1_000_000u64),
                gas: U256::zero(),
                total: U256::from(1_000_000u64),
                total_usd: fee_usd,
            },
            slippage_bps: Some(10),
            estimated_time: EstimatedTime {
                min_secs: max_secs / 4,
                max_secs,
            },
            route: RouteInfo {
                source_chain_id: 1,
                dest_chain_id: 42161,
                steps: vec![],
                description: String::new(),
            },
            expires_at: Utc::now() + ChronoDuration::minutes(5),
            params: serde_json::Value::Null,
        }
    }

    /// Adapter stub with scripted quote/deposit/status behavior
    struct StubAdapter {
        protocol: BridgeProtocol,
        rank: u8,
        fee_usd: f64,
        max_secs: u64,
        fail_quote: bool,
    }

    #[async_trait]
    impl BridgeAdapter for StubAdapter {
        fn protocol(&self) -> BridgeProtocol {
            self.protocol
        }

        fn reliability_rank(&self) -> u8 {
            self.rank
        }

        fn supports_route(&self, _s: u64, _d: u64, token: &str) -> bool {
            token == "USDC"
        }

        fn destination_chains(&self, _s: u64, token: &str) -> Vec<u64> {
            if token == "USDC" {
                vec![42161, 10]
            } else {
                vec![]
            }
        }

        fn spender(&self, _source: u64) -> Result<Address, WalletError> {
            Ok(Address([0xBB; 20]))
        }

        async fn quote(&self, _request: &BridgeRequest) -> Result<BridgeQuote, WalletError> {
            if self.fail_quote {
                return Err(WalletError::BridgeProtocolUnavailable {
                    protocol: self.protocol.to_string(),
                    reason: "api down".to_string(),
                });
            }
            Ok(quote_for(self.protocol, self.fee_usd, self.max_secs))
        }

        async fn deposit(
            &self,
            _request: &BridgeRequest,
            _quote: &BridgeQuote,
        ) -> Result<DepositOutcome, WalletError> {
            Ok(DepositOutcome {
                tracking_id: TrackingId(Hash([self.rank; 32])),
                source_tx_hash: Hash([0xCC; 32]),
            })
        }

        async fn status(
            &self,
            tracking_id: &TrackingId,
        ) -> Result<UnifiedBridgeStatus, WalletError> {
            Ok(UnifiedBridgeStatus::new(
                *tracking_id,
                self.protocol,
                BridgeStatusKind::AttestationPending,
                "in flight",
            ))
        }
    }

    fn router_with_policy(
        adapters: Vec<Arc<dyn BridgeAdapter>>,
        policy: PolicyEngine,
    ) -> (Arc<MockRpc>, BridgeRouter) {
        let rpc = Arc::new(MockRpc::new(1));
        rpc.set_base_fee(Some(U256::from(1_000_000_000u64)));
        let account = Arc::new(Account::from_private_key(DEV_KEY).unwrap());
        let nonce = Arc::new(NonceManager::new(rpc.clone(), account.address()));
        let dispatcher = Arc::new(TxDispatcher::new(rpc.clone(), account, nonce));
        let router = BridgeRouter::new(dispatcher, Arc::new(policy), adapters);
        (rpc, router)
    }

    fn router_with(adapters: Vec<Arc<dyn BridgeAdapter>>) -> (Arc<MockRpc>, BridgeRouter) {
        router_with_policy(adapters, PolicyEngine::permissive())
    }

    fn tight_corridor_policy() -> PolicyEngine {
        let mut bridge_limits = HashMap::new();
        bridge_limits.insert(
            Corridor {
                token: "USDC".to_string(),
                dest_chain_id: 42161,
            },
            crate::policy::UsdLimits {
                per_transaction: Some(1),
                ..Default::default()
            },
        );
        PolicyEngine::new(
            crate::policy::SpendingLimits::default(),
            HashMap::new(),
            bridge_limits,
            None,
            std::collections::HashSet::new(),
            None,
        )
    }

    fn request() -> BridgeRequest {
        BridgeRequest {
            token: "USDC".to_string(),
            decimals: 6,
            amount: U256::from(100_000_000u64),
            source_chain_id: 1,
            dest_chain_id: 42161,
            sender: Address([1; 20]),
            recipient: Address([1; 20]),
            max_slippage_bps: 100,
        }
    }

    #[tokio::test]
    async fn test_scoring_by_cost_and_speed() {
        let adapters: Vec<Arc<dyn BridgeAdapter>> = vec![
            Arc::new(StubAdapter {
                protocol: BridgeProtocol::Cctp,
                rank: 0,
                fee_usd: 0.0,
                max_secs: 1200,
                fail_quote: false,
            }),
            Arc::new(StubAdapter {
                protocol: BridgeProtocol::Across,
                rank: 1,
                fee_usd: 1.5,
                max_secs: 300,
                fail_quote: false,
            }),
        ];
        let (_rpc, router) = router_with(adapters);

        let by_cost = router
            .compare_routes(&request(), &RoutePreference::default())
            .await
            .unwrap();
        assert_eq!(by_cost.recommended, Some(BridgeProtocol::Cctp));

        let by_speed = router
            .compare_routes(
                &request(),
                &RoutePreference {
                    priority: RoutePriority::Speed,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_speed.recommended, Some(BridgeProtocol::Across));
    }

    #[tokio::test]
    async fn test_failed_quotes_are_tolerated() {
        let adapters: Vec<Arc<dyn BridgeAdapter>> = vec![
            Arc::new(StubAdapter {
                protocol: BridgeProtocol::Cctp,
                rank: 0,
                fee_usd: 0.0,
                max_secs: 1200,
                fail_quote: true,
            }),
            Arc::new(StubAdapter {
                protocol: BridgeProtocol::Across,
                rank: 1,
                fee_usd: 1.5,
                max_secs: 300,
                fail_quote: false,
            }),
        ];
        let (_rpc, router) = router_with(adapters);

        let comparison = router
            .compare_routes(&request(), &RoutePreference::default())
            .await
            .unwrap();
        assert_eq!(comparison.quotes.len(), 1);
        assert_eq!(comparison.recommended, Some(BridgeProtocol::Across));
        assert_eq!(comparison.rejected.len(), 1);
        assert_eq!(comparison.rejected[0].0, BridgeProtocol::Cctp);
    }

    #[tokio::test]
    async fn test_hard_filters() {
        let adapters: Vec<Arc<dyn BridgeAdapter>> = vec![Arc::new(StubAdapter {
            protocol: BridgeProtocol::Across,
            rank: 1,
            fee_usd: 5.0,
            max_secs: 900,
            fail_quote: false,
        })];
        let (_rpc, router) = router_with(adapters);

        let comparison = router
            .compare_routes(
                &request(),
                &RoutePreference {
                    max_fee_usd: Some(1.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(comparison.quotes.is_empty());
        assert!(comparison.rejected[0].1.contains("fee"));

        let excluded = router
            .compare_routes(
                &request(),
                &RoutePreference {
                    excluded: vec![BridgeProtocol::Across],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(excluded.quotes.is_empty());
    }

    #[tokio::test]
    async fn test_no_route_for_unknown_token() {
        let (_rpc, router) = router_with(vec![Arc::new(StubAdapter {
            protocol: BridgeProtocol::Across,
            rank: 1,
            fee_usd: 1.0,
            max_secs: 300,
            fail_quote: false,
        })]);
        let mut req = request();
        req.token = "WBTC".to_string();
        let err = router
            .compare_routes(&req, &RoutePreference::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BRIDGE_NO_ROUTE");
    }

    #[tokio::test]
    async fn test_bridge_records_tracking_and_skips_approval_when_covered() {
        let (rpc, router) = router_with(vec![Arc::new(StubAdapter {
            protocol: BridgeProtocol::Across,
            rank: 1,
            fee_usd: 1.0,
            max_secs: 300,
            fail_quote: false,
        })]);

        // Existing allowance covers the transfer: no approval transactions
        let mut allowance = [0u8; 32];
        allowance[16..].copy_from_slice(&u128::MAX.to_be_bytes());
        rpc.push_call_result(
            crate::codec::abi::selector("allowance(address,address)").unwrap(),
            Bytes(allowance.to_vec()),
        );

        let result = router
            .bridge(BridgeOptions::new("USDC", "100", 42161))
            .await
            .unwrap();
        assert_eq!(result.protocol, BridgeProtocol::Across);
        assert!(rpc.sent_transactions().is_empty());

        let status = router
            .status_by_tracking_id(&result.tracking_id)
            .await
            .unwrap();
        assert_eq!(status.protocol, BridgeProtocol::Across);
        assert_eq!(status.status, BridgeStatusKind::AttestationPending);
    }

    #[tokio::test]
    async fn test_zero_then_set_allowance_sequence() {
        let (rpc, router) = router_with(vec![Arc::new(StubAdapter {
            protocol: BridgeProtocol::Across,
            rank: 1,
            fee_usd: 1.0,
            max_secs: 300,
            fail_quote: false,
        })]);

        // Stale non-zero allowance of 5 USDC, request needs 100
        let mut stale = [0u8; 32];
        stale[24..].copy_from_slice(&5_000_000u64.to_be_bytes());
        rpc.push_call_result(
            crate::codec::abi::selector("allowance(address,address)").unwrap(),
            Bytes(stale.to_vec()),
        );

        router
            .bridge(BridgeOptions::new("USDC", "100", 42161))
            .await
            .unwrap();

        // Exactly two transactions: approve(spender, 0) then approve(spender, 100e6)
        let sent = rpc.sent_transactions();
        assert_eq!(sent.len(), 2);
        let zero_word = [0u8; 32];
        assert!(sent[0].windows(32).any(|w| w == zero_word));
        let mut amount_word = [0u8; 32];
        amount_word[24..].copy_from_slice(&100_000_000u64.to_be_bytes());
        assert!(sent[1].windows(32).any(|w| w == amount_word));
    }

    #[tokio::test]
    async fn test_reverted_approval_aborts_with_validation_failure() {
        let (rpc, router) = router_with(vec![Arc::new(StubAdapter {
            protocol: BridgeProtocol::Across,
            rank: 1,
            fee_usd: 1.0,
            max_secs: 300,
            fail_quote: false,
        })]);

        // Zero allowance, so a single approve is needed, and it reverts
        rpc.set_next_send_reverts();
        let err = router
            .bridge(BridgeOptions::new("USDC", "100", 42161))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BRIDGE_VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn test_no_route_reported_before_corridor_limits() {
        // No adapter serves the corridor AND the transfer would bust its
        // limit; route resolution happens first, so the caller sees
        // BRIDGE_NO_ROUTE, not a limit error.
        let (_rpc, router) = router_with_policy(vec![], tight_corridor_policy());
        let err = router
            .bridge(BridgeOptions::new("USDC", "100", 42161))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BRIDGE_NO_ROUTE");
    }

    #[tokio::test]
    async fn test_corridor_limit_applies_once_routed() {
        let adapters: Vec<Arc<dyn BridgeAdapter>> = vec![Arc::new(StubAdapter {
            protocol: BridgeProtocol::Across,
            rank: 1,
            fee_usd: 1.0,
            max_secs: 300,
            fail_quote: false,
        })];
        let (rpc, router) = router_with_policy(adapters, tight_corridor_policy());

        let err = router
            .bridge(BridgeOptions::new("USDC", "100", 42161))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PER_TRANSACTION_LIMIT_EXCEEDED");
        // Rejected before any allowance or deposit transaction
        assert!(rpc.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tracking_id() {
        let (_rpc, router) = router_with(vec![]);
        let err = router
            .status_by_tracking_id(&TrackingId(Hash([9; 32])))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BRIDGE_UNKNOWN_TRACKING_ID");
    }
}
