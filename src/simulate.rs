//! Pre-flight simulation via `eth_call`
//!
//! Runs the exact call a transaction would make against pending state with
//! the sender's `from`, and decodes standard `Error(string)` / `Panic(uint256)`
//! revert payloads into readable reasons. Transport failures are kept
//! distinct from reverts: a node outage must never read as "would revert".

use std::sync::Arc;

use primitive_types::U256;

use crate::codec::abi::{self, AbiType, AbiValue};
use crate::error::WalletError;
use crate::rpc::{CallRequest, EthRpc};
use crate::types::Bytes;

/// `Error(string)` selector
const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
/// `Panic(uint256)` selector
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Result of a simulation run
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub success: bool,
    /// Return data when the call succeeded
    pub output: Bytes,
    /// Decoded reason when the call reverted
    pub revert_reason: Option<String>,
}

/// Simulation gate over an RPC endpoint
pub struct Simulator {
    rpc: Arc<dyn EthRpc>,
}

impl Simulator {
    pub fn new(rpc: Arc<dyn EthRpc>) -> Self {
        Simulator { rpc }
    }

    /// Execute the call against pending state
    ///
    /// Returns `Ok` with `success: false` for a revert; transport and node
    /// failures that are not reverts propagate as errors.
    pub async fn simulate(&self, request: &CallRequest) -> Result<SimulationOutcome, WalletError> {
        match self.rpc.call(request).await {
            Ok(output) => Ok(SimulationOutcome {
                success: true,
                output,
                revert_reason: None,
            }),
            Err(WalletError::Rpc {
                code,
                message,
                data,
            }) => {
                let lowered = message.to_lowercase();
                let is_revert = data.is_some() || lowered.contains("revert");
                if is_revert {
                    let reason = data.as_deref().and_then(decode_revert_hex);
                    tracing::debug!(reason = ?reason, "simulation reverted");
                    Ok(SimulationOutcome {
                        success: false,
                        output: Bytes::new(),
                        revert_reason: reason,
                    })
                } else {
                    Err(WalletError::Rpc {
                        code,
                        message,
                        data,
                    })
                }
            }
            Err(other) => Err(other),
        }
    }
}

/// Decode `0x…` revert data into a readable reason
pub fn decode_revert_hex(data: &str) -> Option<String> {
    let stripped = data.strip_prefix("0x").unwrap_or(data);
    let bytes = hex::decode(stripped).ok()?;
    decode_revert(&bytes)
}

/// Decode raw revert data into a readable reason
pub fn decode_revert(data: &[u8]) -> Option<String> {
    if data.len() < 4 {
        return None;
    }
    let selector = &data[..4];
    let payload = &data[4..];

    if selector == ERROR_SELECTOR {
        let decoded = abi::decode(&[AbiType::String], payload).ok()?;
        match decoded.into_iter().next() {
            Some(AbiValue::String(reason)) => Some(reason),
            _ => None,
        }
    } else if selector == PANIC_SELECTOR {
        let decoded = abi::decode(&[AbiType::Uint(256)], payload).ok()?;
        let code = decoded.into_iter().next()?.as_uint()?;
        Some(format!("panic 0x{:x} ({})", code, panic_name(code)))
    } else {
        None
    }
}

fn panic_name(code: U256) -> &'static str {
    match code.low_u64() {
        0x01 => "assertion failed",
        0x11 => "arithmetic overflow or underflow",
        0x12 => "division or modulo by zero",
        0x21 => "invalid enum conversion",
        0x22 => "corrupted storage byte array",
        0x31 => "pop on empty array",
        0x32 => "array index out of bounds",
        0x41 => "allocation of too much memory",
        0x51 => "call to invalid internal function",
        _ => "unknown panic code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRpc;
    use crate::types::Address;

    fn error_string_payload(reason: &str) -> String {
        let encoded = abi::encode_call(
            "Error(string)",
            &[AbiValue::String(reason.to_string())],
        )
        .unwrap();
        format!("0x{}", hex::encode(encoded))
    }

    #[test]
    fn test_decode_error_string() {
        let data = error_string_payload("transfer amount exceeds balance");
        assert_eq!(
            decode_revert_hex(&data).as_deref(),
            Some("transfer amount exceeds balance")
        );
    }

    #[test]
    fn test_decode_panic() {
        let encoded = abi::encode_call(
            "Panic(uint256)",
            &[AbiValue::Uint(U256::from(0x11u64))],
        )
        .unwrap();
        let data = format!("0x{}", hex::encode(encoded));
        assert_eq!(
            decode_revert_hex(&data).as_deref(),
            Some("panic 0x11 (arithmetic overflow or underflow)")
        );
    }

    #[test]
    fn test_decode_unknown_selector() {
        assert_eq!(decode_revert_hex("0xdeadbeef00"), None);
        assert_eq!(decode_revert_hex("0x"), None);
    }

    #[tokio::test]
    async fn test_successful_simulation() {
        let rpc = Arc::new(MockRpc::new(1));
        let simulator = Simulator::new(rpc);
        let outcome = simulator
            .simulate(&CallRequest::to_contract(Address::ZERO, vec![0, 0, 0, 0]))
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.revert_reason.is_none());
        assert_eq!(outcome.output.len(), 32);
    }

    #[tokio::test]
    async fn test_reverting_simulation() {
        let rpc = Arc::new(MockRpc::new(1));
        rpc.set_revert(&error_string_payload("nope"));
        let simulator = Simulator::new(rpc);
        let outcome = simulator
            .simulate(&CallRequest::to_contract(Address::ZERO, vec![]))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.revert_reason.as_deref(), Some("nope"));
    }
}
