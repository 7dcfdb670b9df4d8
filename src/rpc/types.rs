//! JSON wire shapes for the Ethereum RPC surface
//!
//! Quantities are `0x`-prefixed minimal hex per the JSON-RPC conventions;
//! the helper modules here convert them to and from `u64`/`U256`.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::WalletError;
use crate::types::{Address, Bytes, Hash};

// ============================================================================
// Hex quantity helpers
// ============================================================================

/// Parse a `0x…` hex quantity into a u64
pub fn parse_u64_hex(input: &str) -> Result<u64, WalletError> {
    let stripped = input.strip_prefix("0x").unwrap_or(input);
    u64::from_str_radix(stripped, 16).map_err(|e| WalletError::InvalidHex {
        reason: format!("bad u64 quantity `{input}`: {e}"),
    })
}

/// Parse a `0x…` hex quantity into a U256
pub fn parse_u256_hex(input: &str) -> Result<U256, WalletError> {
    let stripped = input.strip_prefix("0x").unwrap_or(input);
    U256::from_str_radix(stripped, 16).map_err(|e| WalletError::InvalidHex {
        reason: format!("bad u256 quantity `{input}`: {e}"),
    })
}

/// Minimal hex encoding of a u64 quantity
pub fn to_hex_u64(value: u64) -> String {
    format!("0x{value:x}")
}

/// Minimal hex encoding of a U256 quantity
pub fn to_hex_u256(value: U256) -> String {
    format!("0x{value:x}")
}

pub mod u64_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_hex_u64(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_u64_hex(&s).map_err(serde::de::Error::custom)
    }
}

pub mod u64_hex_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&super::to_hex_u64(*v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u64>, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?;
        match s {
            Some(s) => super::parse_u64_hex(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

pub mod u256_hex {
    use primitive_types::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_hex_u256(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_u256_hex(&s).map_err(serde::de::Error::custom)
    }
}

pub mod u256_hex_opt {
    use primitive_types::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<U256>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&super::to_hex_u256(*v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<U256>, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?;
        match s {
            Some(s) => super::parse_u256_hex(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

pub mod u256_vec_hex {
    use primitive_types::U256;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<U256>, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| super::parse_u256_hex(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

// ============================================================================
// Request shapes
// ============================================================================

/// Block selector for read calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Pending,
    Number(u64),
}

impl BlockTag {
    pub fn to_param(self) -> Value {
        match self {
            BlockTag::Latest => json!("latest"),
            BlockTag::Pending => json!("pending"),
            BlockTag::Number(n) => json!(to_hex_u64(n)),
        }
    }
}

/// A call/estimate request (`eth_call`, `eth_estimateGas`)
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none", with = "u64_hex_opt")]
    pub gas: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", with = "u256_hex_opt")]
    pub gas_price: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none", with = "u256_hex_opt")]
    pub value: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
}

impl CallRequest {
    pub fn to_contract(to: Address, data: Vec<u8>) -> Self {
        CallRequest {
            to: Some(to),
            data: Some(Bytes(data)),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn from_address(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }
}

/// `eth_getLogs` filter
#[derive(Debug, Clone)]
pub struct LogFilter {
    pub from_block: u64,
    pub to_block: u64,
    /// Contract addresses to match; empty matches any
    pub address: Vec<Address>,
    /// Topic positions; `None` is a wildcard slot
    pub topics: Vec<Option<Hash>>,
}

impl LogFilter {
    pub fn to_param(&self) -> Value {
        let topics: Vec<Value> = self
            .topics
            .iter()
            .map(|t| match t {
                Some(h) => json!(h.to_hex()),
                None => Value::Null,
            })
            .collect();
        let mut obj = json!({
            "fromBlock": to_hex_u64(self.from_block),
            "toBlock": to_hex_u64(self.to_block),
            "topics": topics,
        });
        if !self.address.is_empty() {
            obj["address"] = json!(self
                .address
                .iter()
                .map(Address::to_lowercase_hex)
                .collect::<Vec<_>>());
        }
        obj
    }
}

// ============================================================================
// Response shapes
// ============================================================================

/// Block header fields the wallet consumes
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(default, with = "u64_hex_opt")]
    pub number: Option<u64>,
    #[serde(default)]
    pub hash: Option<Hash>,
    #[serde(default, with = "u256_hex_opt")]
    pub base_fee_per_gas: Option<U256>,
    #[serde(with = "u64_hex")]
    pub timestamp: u64,
}

/// A single log entry from `eth_getLogs` or a receipt
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<Hash>,
    pub data: Bytes,
    #[serde(default, with = "u64_hex_opt")]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub transaction_hash: Option<Hash>,
    #[serde(default, with = "u64_hex_opt")]
    pub log_index: Option<u64>,
    #[serde(default)]
    pub removed: bool,
}

/// Transaction receipt; `status` decodes post-Byzantium success/failure
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: Hash,
    #[serde(default, with = "u64_hex_opt")]
    pub block_number: Option<u64>,
    #[serde(default, with = "u64_hex_opt")]
    pub status: Option<u64>,
    #[serde(with = "u64_hex")]
    pub gas_used: u64,
    #[serde(default, with = "u256_hex_opt")]
    pub effective_gas_price: Option<U256>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub contract_address: Option<Address>,
}

impl TransactionReceipt {
    /// Whether the transaction executed without reverting
    pub fn succeeded(&self) -> bool {
        self.status == Some(1)
    }
}

/// Fields of `eth_getTransactionByHash` the wallet consumes
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub hash: Hash,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(with = "u256_hex")]
    pub value: U256,
    #[serde(with = "u64_hex")]
    pub nonce: u64,
    #[serde(default, with = "u64_hex_opt")]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub input: Option<Bytes>,
}

/// `eth_feeHistory` response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeHistory {
    #[serde(with = "u64_hex")]
    pub oldest_block: u64,
    #[serde(with = "u256_vec_hex")]
    pub base_fee_per_gas: Vec<U256>,
    #[serde(default)]
    pub reward: Option<Vec<Vec<String>>>,
}

impl FeeHistory {
    /// Rewards parsed into quantities, shaped `[block][percentile]`
    pub fn rewards(&self) -> Result<Vec<Vec<U256>>, WalletError> {
        self.reward
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|block| block.iter().map(|s| parse_u256_hex(s)).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_parsing() {
        assert_eq!(parse_u64_hex("0x10").unwrap(), 16);
        assert_eq!(parse_u64_hex("0x0").unwrap(), 0);
        assert_eq!(
            parse_u256_hex("0xde0b6b3a7640000").unwrap(),
            U256::from(10u64).pow(U256::from(18u64))
        );
        assert!(parse_u64_hex("0xzz").is_err());
    }

    #[test]
    fn test_quantity_formatting() {
        assert_eq!(to_hex_u64(0), "0x0");
        assert_eq!(to_hex_u64(255), "0xff");
        assert_eq!(to_hex_u256(U256::from(1024u64)), "0x400");
    }

    #[test]
    fn test_call_request_serialization() {
        let req = CallRequest::to_contract(Address::ZERO, vec![0xa9, 0x05, 0x9c, 0xbb])
            .with_value(U256::from(7u64));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["to"], "0x0000000000000000000000000000000000000000");
        assert_eq!(value["value"], "0x7");
        assert_eq!(value["data"], "0xa9059cbb");
        assert!(value.get("from").is_none());
        assert!(value.get("gas").is_none());
    }

    #[test]
    fn test_log_filter_param() {
        let topic = Hash([0x11; 32]);
        let filter = LogFilter {
            from_block: 100,
            to_block: 110,
            address: vec![Address::ZERO],
            topics: vec![Some(topic), None, Some(Hash([0x22; 32]))],
        };
        let param = filter.to_param();
        assert_eq!(param["fromBlock"], "0x64");
        assert_eq!(param["toBlock"], "0x6e");
        assert_eq!(param["topics"][0], topic.to_hex());
        assert!(param["topics"][1].is_null());
        assert_eq!(
            param["address"][0],
            "0x0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn test_receipt_status_decoding() {
        let receipt: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "blockNumber": "0x10",
            "status": "0x1",
            "gasUsed": "0x5208",
            "logs": [],
        }))
        .unwrap();
        assert!(receipt.succeeded());
        assert_eq!(receipt.gas_used, 21000);

        let failed: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "status": "0x0",
            "gasUsed": "0x5208",
        }))
        .unwrap();
        assert!(!failed.succeeded());
    }

    #[test]
    fn test_block_deserialization() {
        let block: Block = serde_json::from_value(json!({
            "number": "0x112a880",
            "baseFeePerGas": "0x3b9aca00",
            "timestamp": "0x65f0f000",
        }))
        .unwrap();
        assert_eq!(block.number, Some(18_000_000));
        assert_eq!(block.base_fee_per_gas, Some(U256::from(1_000_000_000u64)));
    }

    #[test]
    fn test_log_entry_deserialization() {
        let log: LogEntry = serde_json::from_value(json!({
            "address": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
            "topics": [
                "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
            ],
            "data": "0x00000000000000000000000000000000000000000000000000000000000f4240",
            "blockNumber": "0x64",
            "logIndex": "0x2",
        }))
        .unwrap();
        assert_eq!(log.block_number, Some(100));
        assert_eq!(log.log_index, Some(2));
        assert_eq!(log.data.len(), 32);
        assert!(!log.removed);
    }
}
