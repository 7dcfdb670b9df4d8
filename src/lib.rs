//! Agent-Wallet: Wallet and Bridge Runtime for Autonomous Agents
//!
//! This crate turns high-level intents ("send 100 USDC to alice.eth",
//! "bridge 50 USDC to chain 42161") into signed, policy-checked,
//! nonce-ordered transactions against EVM JSON-RPC endpoints, and tracks
//! the asynchronous lifecycle of cross-chain transfers:
//!
//! - **Codec** - Solidity ABI head/tail encoding, RLP, keccak-256,
//!   selectors and event topics derived from canonical signatures
//! - **Signing** - zeroizing key container, RFC 6979 low-s signatures,
//!   EIP-55 addresses, EIP-155 / EIP-1559 transaction serialization
//! - **Transaction Engine** - serialized nonce reservation, fee estimation,
//!   simulation gate, one shared submit-and-confirm path
//! - **Policy** - sliding-window spending limits (native, token, bridge
//!   corridor), address allow/block lists, approval gate with timeouts
//! - **Bridging** - CCTP, Across, and Stargate adapters behind one router
//!   with quote scoring and a unified transfer state machine
//! - **Payments** - block-range `Transfer` log watcher with per-handler
//!   predicates and wait-for-payment semantics
//!
//! ## Usage
//!
//! ```no_run
//! use agent_wallet::{AgentWallet, WalletConfig};
//!
//! # async fn run() -> Result<(), agent_wallet::WalletError> {
//! let config = WalletConfig::load().expect("configuration");
//! let wallet = AgentWallet::new(config).await?;
//! let result = wallet.send("alice.eth", "0.5".into()).await?;
//! println!("{}", result.summary);
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod codec;
pub mod config;
pub mod ens;
pub mod error;
pub mod gas;
pub mod hash;
pub mod nonce;
pub mod policy;
pub mod rpc;
pub mod signer;
pub mod simulate;
pub mod tokens;
pub mod tx;
pub mod types;
pub mod wallet;
pub mod watcher;

// Test utilities (also available behind the `testing` feature)
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used items at the crate root
pub use bridge::{
    BridgeOptions, BridgeProtocol, BridgeQuote, BridgeResult, BridgeRouter, BridgeStatusKind,
    RoutePreference, RoutePriority, TrackingId, UnifiedBridgeStatus,
};
pub use config::WalletConfig;
pub use error::{ErrorReport, SafeOutcome, WalletError};
pub use policy::{
    AddressPolicy, AddressPolicyMode, ApprovalConfig, ApprovalHandler, ApprovalRequest,
    PolicyEngine, SpendingLimits, UsdLimits,
};
pub use rpc::{EthRpc, HttpRpc};
pub use signer::Account;
pub use types::{Address, Bytes, Hash, HumanAmount};
pub use wallet::{AgentWallet, SendResult, WalletStatus};
pub use watcher::{IncomingPayment, PaymentFilter, PaymentWatcher, WatchedToken};
