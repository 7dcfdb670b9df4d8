//! ERC-20 call encoding and the known-token registry
//!
//! Calldata for the ERC-20 surface is derived from canonical signatures via
//! the ABI codec, never hard-coded. The registry lists the stablecoin
//! deployments the wallet can address by symbol; per-chain lookups that miss
//! surface as `UNSUPPORTED_STABLECOIN` at the call site.

use std::sync::Arc;

use primitive_types::U256;

use crate::codec::abi::{self, AbiType, AbiValue};
use crate::error::WalletError;
use crate::rpc::{CallRequest, EthRpc};
use crate::types::{Address, Hash};

/// `Transfer(address,address,uint256)`, the event the payment watcher follows
pub const TRANSFER_EVENT: &str = "Transfer(address,address,uint256)";

/// Topic 0 for [`TRANSFER_EVENT`]
pub fn transfer_topic() -> Hash {
    abi::event_topic(TRANSFER_EVENT).expect("static signature")
}

// ============================================================================
// Known tokens
// ============================================================================

/// A token the wallet can address by symbol
#[derive(Debug, Clone, Copy)]
pub struct TokenInfo {
    pub symbol: &'static str,
    pub decimals: u8,
    /// `(chain_id, address)` deployments
    pub deployments: &'static [(u64, &'static str)],
}

/// Stablecoins with 1-token-=-1-USD ledger accounting
///
/// Chains where the token uses different decimals (e.g. BSC's 18-decimal
/// pegs) are intentionally absent; adding them requires per-deployment
/// decimals.
pub const KNOWN_TOKENS: &[TokenInfo] = &[
    TokenInfo {
        symbol: "USDC",
        decimals: 6,
        deployments: &[
            (1, "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            (10, "0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85"),
            (137, "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359"),
            (8453, "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            (42161, "0xaf88d065e77c8cC2239327C5EDb3A432268e5831"),
            (43114, "0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E"),
            (11155111, "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238"),
            (84532, "0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
        ],
    },
    TokenInfo {
        symbol: "USDT",
        decimals: 6,
        deployments: &[
            (1, "0xdAC17F958D2ee523a2206206994597C13D831ec7"),
            (10, "0x94b008aA00579c1307B0EF2c499aD98a8ce58e58"),
            (137, "0xc2132D05D31c914a87C6611C10748AEb04B58e8F"),
            (42161, "0xFd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9"),
        ],
    },
    TokenInfo {
        symbol: "DAI",
        decimals: 18,
        deployments: &[
            (1, "0x6B175474E89094C44Da98b954EedeAC495271d0F"),
            (10, "0xDA10009cBd5D07dd0CeCc66161FC93D7c9000da1"),
            (137, "0x8f3Cf7ad23Cd3CaDbD9735AFf958023239c6A063"),
            (42161, "0xDA10009cBd5D07dd0CeCc66161FC93D7c9000da1"),
        ],
    },
];

/// Look up a known token by symbol, case-insensitively
pub fn token_by_symbol(symbol: &str) -> Option<&'static TokenInfo> {
    KNOWN_TOKENS
        .iter()
        .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
}

/// Deployment address of a known token on a chain
pub fn token_address(symbol: &str, chain_id: u64) -> Option<Address> {
    let token = token_by_symbol(symbol)?;
    token
        .deployments
        .iter()
        .find(|(chain, _)| *chain == chain_id)
        .map(|(_, addr)| Address::from_hex(addr).expect("registry constant"))
}

// ============================================================================
// Calldata builders
// ============================================================================

pub fn transfer_calldata(to: Address, amount: U256) -> Result<Vec<u8>, WalletError> {
    Ok(abi::encode_call(
        "transfer(address,uint256)",
        &[AbiValue::Address(to), AbiValue::Uint(amount)],
    )?)
}

pub fn approve_calldata(spender: Address, amount: U256) -> Result<Vec<u8>, WalletError> {
    Ok(abi::encode_call(
        "approve(address,uint256)",
        &[AbiValue::Address(spender), AbiValue::Uint(amount)],
    )?)
}

pub fn allowance_calldata(owner: Address, spender: Address) -> Result<Vec<u8>, WalletError> {
    Ok(abi::encode_call(
        "allowance(address,address)",
        &[AbiValue::Address(owner), AbiValue::Address(spender)],
    )?)
}

pub fn balance_of_calldata(owner: Address) -> Result<Vec<u8>, WalletError> {
    Ok(abi::encode_call(
        "balanceOf(address)",
        &[AbiValue::Address(owner)],
    )?)
}

// ============================================================================
// Queries
// ============================================================================

/// Read-only ERC-20 queries over an RPC endpoint
pub struct Erc20 {
    rpc: Arc<dyn EthRpc>,
}

impl Erc20 {
    pub fn new(rpc: Arc<dyn EthRpc>) -> Self {
        Erc20 { rpc }
    }

    pub async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, WalletError> {
        let output = self.call(token, balance_of_calldata(owner)?).await?;
        decode_uint(token, &output)
    }

    pub async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, WalletError> {
        let output = self.call(token, allowance_calldata(owner, spender)?).await?;
        decode_uint(token, &output)
    }

    pub async fn decimals(&self, token: Address) -> Result<u8, WalletError> {
        let data = abi::encode_call("decimals()", &[])?;
        let output = self.call(token, data).await?;
        let value = decode_uint(token, &output)?;
        if value > U256::from(255u64) {
            return Err(WalletError::TokenCallFailed {
                address: token,
                reason: format!("decimals() returned {value}"),
            });
        }
        Ok(value.low_u64() as u8)
    }

    /// Token symbol; tolerates the legacy bytes32 return shape
    pub async fn symbol(&self, token: Address) -> Result<String, WalletError> {
        let data = abi::encode_call("symbol()", &[])?;
        let output = self.call(token, data).await?;

        if let Ok(decoded) = abi::decode(&[AbiType::String], &output) {
            if let Some(AbiValue::String(s)) = decoded.into_iter().next() {
                return Ok(s);
            }
        }

        // Pre-standard tokens return bytes32 padded with NULs
        if output.len() == 32 {
            let trimmed: Vec<u8> = output.iter().copied().take_while(|&b| b != 0).collect();
            if let Ok(s) = String::from_utf8(trimmed) {
                if !s.is_empty() {
                    return Ok(s);
                }
            }
        }

        Err(WalletError::TokenCallFailed {
            address: token,
            reason: "symbol() returned neither string nor bytes32".to_string(),
        })
    }

    async fn call(&self, token: Address, data: Vec<u8>) -> Result<Vec<u8>, WalletError> {
        let output = self
            .rpc
            .call(&CallRequest::to_contract(token, data))
            .await?;
        Ok(output.0)
    }
}

fn decode_uint(token: Address, output: &[u8]) -> Result<U256, WalletError> {
    let decoded =
        abi::decode(&[AbiType::Uint(256)], output).map_err(|e| WalletError::TokenCallFailed {
            address: token,
            reason: e.to_string(),
        })?;
    decoded
        .into_iter()
        .next()
        .and_then(|v| v.as_uint())
        .ok_or_else(|| WalletError::TokenCallFailed {
            address: token,
            reason: "expected a single uint word".to_string(),
        })
}
