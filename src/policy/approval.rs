//! Approval gate: requests, handlers, timeout policy
//!
//! When the policy engine decides an operation needs a human (or upstream
//! agent) in the loop, it builds an [`ApprovalRequest`] and awaits the
//! configured handler under a timeout. The default timeout disposition is
//! rejection; opting into approve-on-timeout is explicit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use primitive_types::U256;
use serde::Serialize;

use crate::error::WalletError;
use crate::types::Address;

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

/// What kind of operation is asking for sign-off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Send,
    Swap,
    Bridge,
    ContractCall,
}

/// Coarse risk grade shown to approvers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// Everything an approver sees about the pending operation
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalDetails {
    pub from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// Human-formatted amount, e.g. `"1.5 ETH"` / `"100 USDC"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_cost: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_method: Option<String>,
    pub risk: RiskLevel,
    pub warnings: Vec<String>,
}

/// A pending approval, terminal on handler response or timeout
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub operation: OperationKind,
    pub summary: String,
    pub details: ApprovalDetails,
    pub timestamp: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn new(operation: OperationKind, summary: String, details: ApprovalDetails) -> Self {
        let id = format!(
            "approval-{}",
            REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        ApprovalRequest {
            id,
            operation,
            summary,
            details,
            timestamp: Utc::now(),
        }
    }
}

/// Caller-provided approval decision point
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    /// Return `true` to approve the operation
    async fn handle(&self, request: ApprovalRequest) -> bool;
}

/// What to do when the handler does not answer in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    #[default]
    Reject,
    Approve,
}

/// Which conditions force an approval round-trip; they OR together
#[derive(Debug, Clone, Default)]
pub struct ApprovalPredicates {
    /// Amounts strictly above this threshold (in the operation's raw unit)
    pub amount_exceeds: Option<U256>,
    /// Recipient the wallet has never completed a spend to
    pub recipient_is_new: bool,
    /// Recipient absent from the trusted set
    pub recipient_not_in_trusted: bool,
    pub always: bool,
}

/// Full approval configuration carried by the policy engine
#[derive(Clone)]
pub struct ApprovalConfig {
    pub require_when: ApprovalPredicates,
    /// Absent handler + a triggered predicate = `APPROVAL_REQUIRED`
    pub handler: Option<Arc<dyn ApprovalHandler>>,
    pub timeout: Duration,
    pub timeout_policy: TimeoutPolicy,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        ApprovalConfig {
            require_when: ApprovalPredicates::default(),
            handler: None,
            timeout: Duration::from_secs(60),
            timeout_policy: TimeoutPolicy::Reject,
        }
    }
}

impl std::fmt::Debug for ApprovalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalConfig")
            .field("require_when", &self.require_when)
            .field("handler", &self.handler.as_ref().map(|_| "<handler>"))
            .field("timeout", &self.timeout)
            .field("timeout_policy", &self.timeout_policy)
            .finish()
    }
}

/// Run the approval round-trip under the configured timeout
pub async fn request_approval(
    config: &ApprovalConfig,
    request: ApprovalRequest,
) -> Result<(), WalletError> {
    let handler = config.handler.as_ref().ok_or(WalletError::ApprovalRequired)?;

    let id = request.id.clone();
    tracing::info!(
        approval_id = %id,
        summary = %request.summary,
        risk = request.details.risk.as_str(),
        "requesting approval"
    );

    match tokio::time::timeout(config.timeout, handler.handle(request)).await {
        Ok(true) => {
            tracing::info!(approval_id = %id, "approved");
            Ok(())
        }
        Ok(false) => {
            tracing::warn!(approval_id = %id, "denied by handler");
            Err(WalletError::ApprovalDenied)
        }
        Err(_) => match config.timeout_policy {
            TimeoutPolicy::Reject => {
                tracing::warn!(approval_id = %id, "approval timed out, rejecting");
                Err(WalletError::ApprovalTimeout {
                    waited_secs: config.timeout.as_secs(),
                })
            }
            TimeoutPolicy::Approve => {
                tracing::warn!(approval_id = %id, "approval timed out, auto-approving per policy");
                Ok(())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedHandler(bool);

    #[async_trait]
    impl ApprovalHandler for FixedHandler {
        async fn handle(&self, _request: ApprovalRequest) -> bool {
            self.0
        }
    }

    struct SilentHandler;

    #[async_trait]
    impl ApprovalHandler for SilentHandler {
        async fn handle(&self, _request: ApprovalRequest) -> bool {
            // Never answers inside any reasonable timeout
            tokio::time::sleep(Duration::from_secs(3600)).await;
            true
        }
    }

    fn request() -> ApprovalRequest {
        ApprovalRequest::new(
            OperationKind::Send,
            "send 1 ETH".to_string(),
            ApprovalDetails {
                from: Address::ZERO,
                to: Some(Address::ZERO),
                value: Some("1 ETH".to_string()),
                gas_cost: None,
                total_cost: None,
                contract_method: None,
                risk: RiskLevel::Low,
                warnings: vec![],
            },
        )
    }

    fn config(handler: Option<Arc<dyn ApprovalHandler>>, policy: TimeoutPolicy) -> ApprovalConfig {
        ApprovalConfig {
            require_when: ApprovalPredicates::default(),
            handler,
            timeout: Duration::from_millis(50),
            timeout_policy: policy,
        }
    }

    #[tokio::test]
    async fn test_approved() {
        let cfg = config(Some(Arc::new(FixedHandler(true))), TimeoutPolicy::Reject);
        request_approval(&cfg, request()).await.unwrap();
    }

    #[tokio::test]
    async fn test_denied() {
        let cfg = config(Some(Arc::new(FixedHandler(false))), TimeoutPolicy::Reject);
        let err = request_approval(&cfg, request()).await.unwrap_err();
        assert_eq!(err.code(), "APPROVAL_DENIED");
    }

    #[tokio::test]
    async fn test_timeout_rejects_by_default() {
        let cfg = config(Some(Arc::new(SilentHandler)), TimeoutPolicy::Reject);
        let err = request_approval(&cfg, request()).await.unwrap_err();
        assert_eq!(err.code(), "APPROVAL_TIMEOUT");
    }

    #[tokio::test]
    async fn test_timeout_can_approve() {
        let cfg = config(Some(Arc::new(SilentHandler)), TimeoutPolicy::Approve);
        request_approval(&cfg, request()).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_handler() {
        let cfg = config(None, TimeoutPolicy::Reject);
        let err = request_approval(&cfg, request()).await.unwrap_err();
        assert_eq!(err.code(), "APPROVAL_REQUIRED");
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = request();
        let b = request();
        assert_ne!(a.id, b.id);
    }
}
