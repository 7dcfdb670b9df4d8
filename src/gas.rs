//! Gas and fee estimation
//!
//! Produces an EIP-1559 fee suggestion on networks whose latest block
//! carries `baseFeePerGas`, and a legacy gas-price suggestion elsewhere.
//! Gas limits come from `eth_estimateGas`; a reverting estimate surfaces as
//! a typed error carrying the decoded revert reason, never a default.

use std::sync::Arc;

use primitive_types::U256;

use crate::error::WalletError;
use crate::rpc::{BlockTag, CallRequest, EthRpc};
use crate::simulate;

/// Floor for the priority fee suggestion (1 gwei)
const MIN_PRIORITY_FEE: u64 = 1_000_000_000;

/// A complete fee suggestion for one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeeEstimate {
    Eip1559 {
        gas_limit: u64,
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
        estimated_cost: U256,
    },
    Legacy {
        gas_limit: u64,
        gas_price: U256,
        estimated_cost: U256,
    },
}

impl FeeEstimate {
    pub fn gas_limit(&self) -> u64 {
        match self {
            FeeEstimate::Eip1559 { gas_limit, .. } | FeeEstimate::Legacy { gas_limit, .. } => {
                *gas_limit
            }
        }
    }

    /// Worst-case wei spent on gas (`gas_limit × fee ceiling`)
    pub fn estimated_cost(&self) -> U256 {
        match self {
            FeeEstimate::Eip1559 { estimated_cost, .. }
            | FeeEstimate::Legacy { estimated_cost, .. } => *estimated_cost,
        }
    }
}

/// Fee oracle bound to one RPC endpoint
pub struct GasOracle {
    rpc: Arc<dyn EthRpc>,
}

impl GasOracle {
    pub fn new(rpc: Arc<dyn EthRpc>) -> Self {
        GasOracle { rpc }
    }

    /// Estimate gas limit and fees for a call
    pub async fn estimate(&self, request: &CallRequest) -> Result<FeeEstimate, WalletError> {
        let gas_limit = match self.rpc.estimate_gas(request).await {
            Ok(gas) => gas,
            Err(WalletError::Rpc { data, message, .. }) => {
                let reason = data
                    .as_deref()
                    .and_then(simulate::decode_revert_hex)
                    .or(Some(message));
                return Err(WalletError::GasEstimationFailed { reason });
            }
            Err(other) => return Err(other),
        };

        let base_fee = self
            .rpc
            .get_block(BlockTag::Latest)
            .await?
            .and_then(|block| block.base_fee_per_gas);

        match base_fee {
            Some(base_fee) => {
                let node_suggested = self
                    .rpc
                    .max_priority_fee_per_gas()
                    .await
                    .unwrap_or_else(|_| U256::from(MIN_PRIORITY_FEE));
                let priority = node_suggested.max(U256::from(MIN_PRIORITY_FEE));
                let max_fee = base_fee * U256::from(2u64) + priority;

                tracing::debug!(
                    gas_limit,
                    base_fee = %base_fee,
                    priority = %priority,
                    max_fee = %max_fee,
                    "eip-1559 fee estimate"
                );

                Ok(FeeEstimate::Eip1559 {
                    gas_limit,
                    max_fee_per_gas: max_fee,
                    max_priority_fee_per_gas: priority,
                    estimated_cost: U256::from(gas_limit) * max_fee,
                })
            }
            None => {
                let gas_price = self.rpc.gas_price().await?;

                tracing::debug!(gas_limit, gas_price = %gas_price, "legacy fee estimate");

                Ok(FeeEstimate::Legacy {
                    gas_limit,
                    gas_price,
                    estimated_cost: U256::from(gas_limit) * gas_price,
                })
            }
        }
    }
}
