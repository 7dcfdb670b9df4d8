//! Account signing for EVM transactions
//!
//! Wraps a secp256k1 private key in a zeroizing, disposable container and
//! exposes deterministic (RFC 6979) digest signing with low-s normalization
//! plus public-key recovery. The key bytes never leave the container; all
//! use goes through a scoped callback.

use std::fmt;
use std::sync::Mutex;

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use zeroize::Zeroizing;

use crate::error::WalletError;
use crate::hash::keccak256;
use crate::types::Address;

// ============================================================================
// Key container
// ============================================================================

/// Scoped secp256k1 private key
///
/// The backing buffer zeroizes on drop and on [`PrivateKey::dispose`];
/// any use after disposal fails with `KEY_DISPOSED`.
pub struct PrivateKey {
    inner: Mutex<Option<Zeroizing<[u8; 32]>>>,
}

impl PrivateKey {
    /// Create from a hex string (with or without 0x prefix)
    pub fn from_hex(input: &str) -> Result<Self, WalletError> {
        let stripped = input.strip_prefix("0x").unwrap_or(input);
        if stripped.len() != 64 {
            return Err(WalletError::Signing {
                reason: format!("private key must be 64 hex chars, got {}", stripped.len()),
            });
        }
        let bytes = hex::decode(stripped).map_err(|e| WalletError::Signing {
            reason: format!("private key is not valid hex: {e}"),
        })?;
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        Ok(Self::from_bytes(key))
    }

    /// Create from raw bytes; the caller's copy should be dropped promptly
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        PrivateKey {
            inner: Mutex::new(Some(Zeroizing::new(bytes))),
        }
    }

    /// Run `f` with the raw key bytes; the reference must not escape
    pub fn use_key<T>(&self, f: impl FnOnce(&[u8; 32]) -> T) -> Result<T, WalletError> {
        let guard = self.inner.lock().expect("key mutex poisoned");
        match guard.as_ref() {
            Some(key) => Ok(f(key)),
            None => Err(WalletError::KeyDisposed),
        }
    }

    /// Overwrite the backing buffer; subsequent use errors
    pub fn dispose(&self) {
        let mut guard = self.inner.lock().expect("key mutex poisoned");
        *guard = None; // Zeroizing wipes on drop
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().expect("key mutex poisoned").is_none()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("key", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Signature
// ============================================================================

/// A recoverable secp256k1 signature over a 32-byte digest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// Recovery parity bit (0 or 1); EIP-1559 transactions use it directly
    pub y_parity: u8,
}

impl Signature {
    /// Legacy `v` value: EIP-155 packing when a chain id is present,
    /// pre-155 `27 + parity` otherwise
    pub fn v_legacy(&self, chain_id: Option<u64>) -> u64 {
        match chain_id {
            Some(id) => id * 2 + 35 + self.y_parity as u64,
            None => 27 + self.y_parity as u64,
        }
    }
}

// ============================================================================
// Account
// ============================================================================

/// A signing account: private key container plus its derived address
pub struct Account {
    key: PrivateKey,
    address: Address,
}

impl Account {
    /// Build from a hex-encoded private key
    pub fn from_private_key(input: &str) -> Result<Self, WalletError> {
        let key = PrivateKey::from_hex(input)?;
        let address = key.use_key(|bytes| derive_address(bytes))??;
        Ok(Account { key, address })
    }

    /// The EOA address derived from the key
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte digest deterministically (RFC 6979), low-s normalized
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature, WalletError> {
        self.key.use_key(|bytes| {
            let signing_key =
                SigningKey::from_bytes(k256::FieldBytes::from_slice(bytes)).map_err(|e| {
                    WalletError::Signing {
                        reason: format!("invalid private key scalar: {e}"),
                    }
                })?;

            let (mut sig, mut recid) = signing_key
                .sign_prehash_recoverable(digest)
                .map_err(|e| WalletError::Signing {
                    reason: e.to_string(),
                })?;

            // Enforce the lower half of the curve order; flipping s flips
            // the recovery parity.
            if let Some(normalized) = sig.normalize_s() {
                sig = normalized;
                recid = RecoveryId::from_byte(recid.to_byte() ^ 1).expect("parity bit");
            }

            let bytes = sig.to_bytes();
            let mut r = [0u8; 32];
            let mut s = [0u8; 32];
            r.copy_from_slice(&bytes[..32]);
            s.copy_from_slice(&bytes[32..]);

            Ok(Signature {
                r,
                s,
                y_parity: recid.to_byte() & 1,
            })
        })?
    }

    /// Dispose of the private key; the account keeps its address but can no
    /// longer sign
    pub fn dispose(&self) {
        self.key.dispose();
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address.to_checksum())
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Recover the signing address from a digest and signature
pub fn recover_address(digest: &[u8; 32], signature: &Signature) -> Result<Address, WalletError> {
    let sig = EcdsaSignature::from_scalars(signature.r, signature.s).map_err(|e| {
        WalletError::Signing {
            reason: format!("invalid signature scalars: {e}"),
        }
    })?;
    let recid = RecoveryId::from_byte(signature.y_parity).ok_or(WalletError::Signing {
        reason: "recovery parity must be 0 or 1".to_string(),
    })?;
    let verifying_key =
        VerifyingKey::recover_from_prehash(digest, &sig, recid).map_err(|e| {
            WalletError::Signing {
                reason: format!("recovery failed: {e}"),
            }
        })?;
    Ok(public_key_address(&verifying_key))
}

/// keccak of the uncompressed public key, last 20 bytes
fn public_key_address(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[12..]);
    Address(out)
}

fn derive_address(key_bytes: &[u8; 32]) -> Result<Address, WalletError> {
    let signing_key =
        SigningKey::from_bytes(k256::FieldBytes::from_slice(key_bytes)).map_err(|e| {
            WalletError::Signing {
                reason: format!("invalid private key scalar: {e}"),
            }
        })?;
    Ok(public_key_address(signing_key.verifying_key()))
}
