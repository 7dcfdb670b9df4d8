//! Keccak-256 and byte-padding helpers
//!
//! Everything hash-shaped in the wallet funnels through this module so the
//! digest implementation lives in exactly one place.

use tiny_keccak::{Hasher, Keccak};

/// Compute keccak256 hash of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Compute keccak256 over several concatenated segments without allocating
pub fn keccak256_concat(segments: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    for segment in segments {
        hasher.update(segment);
    }
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Convert an EVM address to bytes32 (left-padded with zeros)
pub fn address_to_bytes32(addr: &[u8; 20]) -> [u8; 32] {
    let mut result = [0u8; 32];
    result[12..32].copy_from_slice(addr);
    result
}

/// Extract raw 20-byte address from bytes32
pub fn bytes32_to_address(bytes: &[u8; 32]) -> [u8; 20] {
    let mut result = [0u8; 20];
    result.copy_from_slice(&bytes[12..32]);
    result
}

/// Convert bytes to hex string with 0x prefix
pub fn bytes32_to_hex(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}
