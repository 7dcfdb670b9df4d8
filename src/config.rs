//! Wallet configuration
//!
//! Loads from environment variables (with `.env` support) or is built
//! programmatically. Approval handlers are code and attach after loading.
//! `Debug` output redacts the private key.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use eyre::{eyre, Result, WrapErr};
use primitive_types::U256;

use crate::policy::{AddressPolicyMode, ApprovalConfig, Corridor, SpendingLimits, UsdLimits};
use crate::types::Address;

/// Address policy as configured (resolved into the engine's policy set)
#[derive(Debug, Clone)]
pub struct AddressPolicyConfig {
    pub mode: AddressPolicyMode,
    pub addresses: Vec<Address>,
}

/// Full wallet configuration
#[derive(Clone, Default)]
pub struct WalletConfig {
    /// Hex-encoded secp256k1 private key
    pub private_key: String,
    pub rpc_url: String,
    /// Separate endpoint for ENS lookups (mainnet), when the wallet itself
    /// runs against an L2
    pub ens_rpc_url: Option<String>,
    /// Identifier stamped on logs and approval requests
    pub agent_id: String,
    /// Run the simulation gate before every send
    pub require_simulation: bool,
    pub limits: SpendingLimits,
    /// Per-token USD caps, keyed by symbol
    pub token_limits: HashMap<String, UsdLimits>,
    /// Per-corridor USD caps
    pub bridge_limits: HashMap<Corridor, UsdLimits>,
    pub address_policy: Option<AddressPolicyConfig>,
    pub trusted_addresses: Vec<Address>,
    /// Approval gate; the handler attaches programmatically
    pub approval: Option<ApprovalConfig>,
}

/// Custom Debug that redacts private_key to prevent accidental log leakage.
impl fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletConfig")
            .field("private_key", &"<redacted>")
            .field("rpc_url", &self.rpc_url)
            .field("ens_rpc_url", &self.ens_rpc_url)
            .field("agent_id", &self.agent_id)
            .field("require_simulation", &self.require_simulation)
            .field("limits", &self.limits)
            .field("token_limits", &self.token_limits)
            .field("bridge_limits", &self.bridge_limits)
            .field("address_policy", &self.address_policy)
            .field("trusted_addresses", &self.trusted_addresses)
            .field("approval", &self.approval)
            .finish()
    }
}

impl WalletConfig {
    /// Load configuration from environment variables
    /// Loads .env file if present, then reads from environment
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env").or_else(|_| Self::load_from_env())
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Self> {
        let private_key = env::var("WALLET_PRIVATE_KEY")
            .map_err(|_| eyre!("WALLET_PRIVATE_KEY environment variable is required"))?;
        let rpc_url = env::var("WALLET_RPC_URL")
            .map_err(|_| eyre!("WALLET_RPC_URL environment variable is required"))?;

        let limits = SpendingLimits {
            per_transaction: parse_wei_var("WALLET_MAX_PER_TX_WEI")?,
            per_hour: parse_wei_var("WALLET_MAX_PER_HOUR_WEI")?,
            per_day: parse_wei_var("WALLET_MAX_PER_DAY_WEI")?,
            per_week: parse_wei_var("WALLET_MAX_PER_WEEK_WEI")?,
            emergency_stop_below: parse_wei_var("WALLET_EMERGENCY_STOP_WEI")?,
        };

        let token_limits = match env::var("WALLET_TOKEN_LIMITS") {
            Ok(raw) => serde_json::from_str::<HashMap<String, UsdLimits>>(&raw)
                .wrap_err("WALLET_TOKEN_LIMITS must be a symbol → limits JSON object")?,
            Err(_) => HashMap::new(),
        };

        let bridge_limits = match env::var("WALLET_BRIDGE_LIMITS") {
            Ok(raw) => {
                let parsed: HashMap<String, UsdLimits> = serde_json::from_str(&raw)
                    .wrap_err("WALLET_BRIDGE_LIMITS must be a \"TOKEN:chain\" → limits JSON object")?;
                let mut out = HashMap::new();
                for (key, value) in parsed {
                    let (token, chain) = key
                        .split_once(':')
                        .ok_or_else(|| eyre!("bridge limit key `{key}` is not TOKEN:chain_id"))?;
                    let dest_chain_id: u64 = chain
                        .parse()
                        .wrap_err_with(|| format!("bad chain id in bridge limit key `{key}`"))?;
                    out.insert(
                        Corridor {
                            token: token.to_string(),
                            dest_chain_id,
                        },
                        value,
                    );
                }
                out
            }
            Err(_) => HashMap::new(),
        };

        let address_policy = match env::var("WALLET_ADDRESS_POLICY_MODE") {
            Ok(mode) => {
                let mode = match mode.to_ascii_lowercase().as_str() {
                    "allowlist" => AddressPolicyMode::Allowlist,
                    "blocklist" => AddressPolicyMode::Blocklist,
                    other => {
                        return Err(eyre!(
                            "WALLET_ADDRESS_POLICY_MODE must be allowlist or blocklist, got `{other}`"
                        ))
                    }
                };
                let addresses = parse_address_list_var("WALLET_ADDRESS_POLICY_LIST")?;
                Some(AddressPolicyConfig { mode, addresses })
            }
            Err(_) => None,
        };

        let config = WalletConfig {
            private_key,
            rpc_url,
            ens_rpc_url: env::var("WALLET_ENS_RPC_URL").ok(),
            agent_id: env::var("AGENT_ID").unwrap_or_else(|_| "agent".to_string()),
            require_simulation: env::var("WALLET_REQUIRE_SIMULATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            limits,
            token_limits,
            bridge_limits,
            address_policy,
            trusted_addresses: parse_address_list_var("WALLET_TRUSTED_ADDRESSES")?,
            approval: None,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.private_key.len() != 66 || !self.private_key.starts_with("0x") {
            return Err(eyre!(
                "private_key must be 66 chars (0x + 64 hex chars)"
            ));
        }
        if self.rpc_url.is_empty() {
            return Err(eyre!("rpc_url cannot be empty"));
        }
        if let Some(ens_url) = &self.ens_rpc_url {
            if ens_url.is_empty() {
                return Err(eyre!("ens_rpc_url cannot be empty when set"));
            }
        }
        if self.agent_id.is_empty() {
            return Err(eyre!("agent_id cannot be empty"));
        }

        // A per-transaction cap above the daily cap can never bind
        if let (Some(per_tx), Some(per_day)) =
            (self.limits.per_transaction, self.limits.per_day)
        {
            if per_tx > per_day {
                return Err(eyre!(
                    "per-transaction limit exceeds the daily limit; no transaction could pass"
                ));
            }
        }

        for (symbol, _) in &self.token_limits {
            if symbol.is_empty() {
                return Err(eyre!("token limit symbol cannot be empty"));
            }
        }

        Ok(())
    }
}

fn parse_wei_var(name: &str) -> Result<Option<U256>> {
    match env::var(name) {
        Ok(raw) => {
            let value = U256::from_dec_str(raw.trim())
                .map_err(|_| eyre!("{name} must be a decimal wei amount, got `{raw}`"))?;
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}

fn parse_address_list_var(name: &str) -> Result<Vec<Address>> {
    match env::var(name) {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Address::from_str(s).map_err(|e| eyre!("bad address in {name}: {e}"))
            })
            .collect(),
        Err(_) => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> WalletConfig {
        WalletConfig {
            private_key: "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
                .to_string(),
            rpc_url: "http://localhost:8545".to_string(),
            agent_id: "test-agent".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        base_config().validate().unwrap();
    }

    #[test]
    fn test_bad_private_key_rejected() {
        let mut config = base_config();
        config.private_key = "0x1234".to_string();
        assert!(config.validate().is_err());

        config.private_key =
            "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80aa".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_rpc_url_rejected() {
        let mut config = base_config();
        config.rpc_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_contradictory_limits_rejected() {
        let mut config = base_config();
        config.limits.per_transaction = Some(U256::from(100u64));
        config.limits.per_day = Some(U256::from(50u64));
        assert!(config.validate().is_err());

        config.limits.per_day = Some(U256::from(200u64));
        config.validate().unwrap();
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let rendered = format!("{:?}", base_config());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("ac0974"));
    }
}
