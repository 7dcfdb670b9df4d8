//! Shared primitive types for wallet operations
//!
//! Provides the byte-array newtypes every other module builds on:
//! `Address` (20 bytes, EIP-55 checksummed text form), `Hash` (32 bytes),
//! `Bytes` (arbitrary hex payload), and `HumanAmount` (caller-facing amount
//! that normalizes to raw smallest-unit integers at the boundary).

use std::fmt;
use std::str::FromStr;

use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::WalletError;
use crate::hash::keccak256;

// ============================================================================
// Address
// ============================================================================

/// EVM address (20 bytes)
///
/// Equality is on the raw bytes, so any textual casing compares equal once
/// parsed. `Display` renders the EIP-55 checksummed form; the JSON wire form
/// is lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The reserved all-zero address (`address(0)` sentinel)
    pub const ZERO: Address = Address([0u8; 20]);

    /// Parse from hex without checksum validation (any casing accepted)
    ///
    /// This is the wire-side constructor: JSON-RPC responses carry lowercase
    /// hex. User-supplied strings should go through [`Address::from_str`],
    /// which enforces EIP-55 on mixed-case input.
    pub fn from_hex(input: &str) -> Result<Self, WalletError> {
        let stripped = input.strip_prefix("0x").unwrap_or(input);
        if stripped.len() != 40 {
            return Err(WalletError::InvalidAddress {
                input: input.to_string(),
                reason: format!("expected 40 hex chars, got {}", stripped.len()),
            });
        }
        let bytes = hex::decode(stripped).map_err(|e| WalletError::InvalidAddress {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        let mut result = [0u8; 20];
        result.copy_from_slice(&bytes);
        Ok(Address(result))
    }

    /// Create from raw bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.len() != 20 {
            return Err(WalletError::InvalidAddress {
                input: format!("0x{}", hex::encode(bytes)),
                reason: format!("expected 20 bytes, got {}", bytes.len()),
            });
        }
        let mut result = [0u8; 20];
        result.copy_from_slice(bytes);
        Ok(Address(result))
    }

    /// Extract from a 32-byte topic or ABI word (last 20 bytes)
    pub fn from_word(word: &[u8; 32]) -> Self {
        let mut result = [0u8; 20];
        result.copy_from_slice(&word[12..32]);
        Address(result)
    }

    /// Convert to the EIP-55 checksummed hex string
    ///
    /// Each alphabetic nibble is uppercased when the corresponding nibble of
    /// `keccak256(ascii(lowercase_hex))` is 8 or above.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let digest = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                digest[i / 2] >> 4
            } else {
                digest[i / 2] & 0x0f
            };
            if nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Lowercase hex form used on the JSON wire
    pub fn to_lowercase_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Left-pad to a 32-byte word (topic / ABI encoding)
    pub fn as_word(&self) -> [u8; 32] {
        let mut result = [0u8; 32];
        result[12..32].copy_from_slice(&self.0);
        result
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Whether this is the reserved zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl FromStr for Address {
    type Err = WalletError;

    /// Strict parse: all-lowercase and all-UPPERCASE hex are accepted as
    /// canonical-by-convention; mixed case must match the EIP-55 recasing
    /// exactly.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let addr = Address::from_hex(input)?;
        let stripped = input.strip_prefix("0x").unwrap_or(input);

        let has_upper = stripped.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = stripped.chars().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower {
            let expected = addr.to_checksum();
            if expected[2..] != *stripped {
                return Err(WalletError::InvalidAddress {
                    input: input.to_string(),
                    reason: "EIP-55 checksum mismatch".to_string(),
                });
            }
        }
        Ok(addr)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_checksum())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_lowercase_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Hash
// ============================================================================

/// 32-byte hash (transaction hashes, topics, tracking ids)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    /// Create from hex string (with or without 0x prefix)
    pub fn from_hex(input: &str) -> Result<Self, WalletError> {
        let stripped = input.strip_prefix("0x").unwrap_or(input);
        let bytes = hex::decode(stripped).map_err(|e| WalletError::InvalidHex {
            reason: e.to_string(),
        })?;
        if bytes.len() != 32 {
            return Err(WalletError::InvalidHex {
                reason: format!("expected 32 bytes, got {}", bytes.len()),
            });
        }
        let mut result = [0u8; 32];
        result.copy_from_slice(&bytes);
        Ok(Hash(result))
    }

    /// Create from raw bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.len() != 32 {
            return Err(WalletError::InvalidHex {
                reason: format!("expected 32 bytes, got {}", bytes.len()),
            });
        }
        let mut result = [0u8; 32];
        result.copy_from_slice(bytes);
        Ok(Hash(result))
    }

    /// Convert to lowercase hex string with 0x prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Bytes
// ============================================================================

/// Arbitrary-length byte payload, `0x…` hex on the wire
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    pub fn new() -> Self {
        Bytes(Vec::new())
    }

    /// Create from hex string (with or without 0x prefix)
    pub fn from_hex(input: &str) -> Result<Self, WalletError> {
        let stripped = input.strip_prefix("0x").unwrap_or(input);
        let bytes = hex::decode(stripped).map_err(|e| WalletError::InvalidHex {
            reason: e.to_string(),
        })?;
        Ok(Bytes(bytes))
    }

    /// Convert to lowercase hex string with 0x prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(bytes: Vec<u8>) -> Self {
        Bytes(bytes)
    }
}

impl fmt::Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Bytes::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Amounts
// ============================================================================

/// Caller-facing amount accepted by the public wallet surfaces
///
/// Internally every amount is a raw integer in the asset's smallest unit;
/// this type captures the three shapes callers supply and converts at the
/// boundary using the asset's declared decimals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HumanAmount {
    /// Decimal text such as `"1.5"`
    Text(String),
    /// Whole units of the asset (e.g. `100` meaning 100 USDC)
    Whole(u64),
    /// Already in the smallest unit; passed through untouched
    Raw(U256),
}

impl HumanAmount {
    /// Normalize to the raw smallest-unit integer
    pub fn to_raw(&self, decimals: u8) -> Result<U256, WalletError> {
        match self {
            HumanAmount::Text(text) => parse_units(text, decimals),
            HumanAmount::Whole(units) => {
                let scale = pow10(decimals);
                U256::from(*units)
                    .checked_mul(scale)
                    .ok_or_else(|| WalletError::InvalidAmount {
                        input: units.to_string(),
                        reason: "amount overflows 256 bits".to_string(),
                    })
            }
            HumanAmount::Raw(raw) => Ok(*raw),
        }
    }
}

impl From<&str> for HumanAmount {
    fn from(text: &str) -> Self {
        HumanAmount::Text(text.to_string())
    }
}

impl From<String> for HumanAmount {
    fn from(text: String) -> Self {
        HumanAmount::Text(text)
    }
}

impl From<u64> for HumanAmount {
    fn from(units: u64) -> Self {
        HumanAmount::Whole(units)
    }
}

impl From<U256> for HumanAmount {
    fn from(raw: U256) -> Self {
        HumanAmount::Raw(raw)
    }
}

/// 10^decimals as a U256
pub fn pow10(decimals: u8) -> U256 {
    U256::from(10u64).pow(U256::from(u64::from(decimals)))
}

/// Parse a decimal string into raw smallest units
///
/// `parse_units("1.5", 6) == 1_500_000`. Rejects empty input, multiple
/// decimal points, non-digit characters, and more fractional digits than the
/// asset carries.
pub fn parse_units(text: &str, decimals: u8) -> Result<U256, WalletError> {
    let text = text.trim();
    let invalid = |reason: &str| WalletError::InvalidAmount {
        input: text.to_string(),
        reason: reason.to_string(),
    };

    if text.is_empty() {
        return Err(invalid("empty amount"));
    }

    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("no digits"));
    }
    if frac.contains('.') {
        return Err(invalid("multiple decimal points"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("non-digit character"));
    }
    if frac.len() > decimals as usize {
        return Err(invalid("more fractional digits than the asset's decimals"));
    }

    let scale = pow10(decimals);
    let whole_part = if whole.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(whole).map_err(|_| invalid("whole part out of range"))?
    };
    let frac_part = if frac.is_empty() {
        U256::zero()
    } else {
        let padded = pow10(decimals - frac.len() as u8);
        U256::from_dec_str(frac)
            .map_err(|_| invalid("fractional part out of range"))?
            .checked_mul(padded)
            .ok_or_else(|| invalid("amount overflows 256 bits"))?
    };

    whole_part
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac_part))
        .ok_or_else(|| invalid("amount overflows 256 bits"))
}

/// Format raw smallest units back into decimal text, trimming trailing zeros
pub fn format_units(raw: U256, decimals: u8) -> String {
    let scale = pow10(decimals);
    let whole = raw / scale;
    let frac = raw % scale;
    if frac.is_zero() {
        return whole.to_string();
    }
    let frac_str = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    let trimmed = frac_str.trim_end_matches('0');
    format!("{}.{}", whole, trimmed)
}
