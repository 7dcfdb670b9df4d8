//! ENS resolution with caching and verified reverse lookup
//!
//! Forward resolution walks registry → resolver → `addr(bytes32)` and caches
//! both hits and misses in a bounded TTL map. Reverse resolution re-forwards
//! the claimed name and only accepts it when it resolves back to the
//! original address, which defeats spoofed reverse records.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::codec::abi::{self, AbiType, AbiValue};
use crate::error::WalletError;
use crate::hash::keccak256;
use crate::rpc::{CallRequest, EthRpc};
use crate::types::{Address, Hash};

/// The ENS registry, same address on mainnet and the major testnets
pub const ENS_REGISTRY: &str = "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e";

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const DEFAULT_CACHE_SIZE: usize = 1_000;

/// Recursive ENS namehash
///
/// `namehash("")` is 32 zero bytes; each label hashes as
/// `keccak(parent ‖ keccak(label))` from right to left. Labels are
/// Unicode-lowercased before hashing; callers wanting full UTS-46
/// normalization should pre-normalize the name.
pub fn namehash(name: &str) -> Hash {
    let mut node = [0u8; 32];
    if name.is_empty() {
        return Hash(node);
    }
    for label in name.rsplit('.') {
        let label_hash = keccak256(label.to_lowercase().as_bytes());
        let mut preimage = [0u8; 64];
        preimage[..32].copy_from_slice(&node);
        preimage[32..].copy_from_slice(&label_hash);
        node = keccak256(&preimage);
    }
    Hash(node)
}

// ============================================================================
// Cache
// ============================================================================

struct CacheEntry {
    value: Option<Address>,
    inserted: Instant,
}

/// Bounded name → address cache with TTL and evict-oldest-on-insert
struct ResolverCache {
    map: HashMap<String, CacheEntry>,
    max_size: usize,
    ttl: Duration,
}

impl ResolverCache {
    fn new(max_size: usize, ttl: Duration) -> Self {
        ResolverCache {
            map: HashMap::new(),
            max_size,
            ttl,
        }
    }

    fn get(&self, name: &str) -> Option<Option<Address>> {
        self.map
            .get(name)
            .filter(|e| e.inserted.elapsed() < self.ttl)
            .map(|e| e.value)
    }

    fn insert(&mut self, name: String, value: Option<Address>) {
        let now = Instant::now();
        self.map
            .retain(|_, e| now.duration_since(e.inserted) < self.ttl);
        while self.map.len() >= self.max_size && !self.map.is_empty() {
            let oldest = self
                .map
                .iter()
                .min_by_key(|(_, e)| e.inserted)
                .map(|(k, _)| k.clone());
            if let Some(k) = oldest {
                self.map.remove(&k);
            } else {
                break;
            }
        }
        self.map.insert(name, CacheEntry {
            value,
            inserted: now,
        });
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// ENS resolver bound to one RPC endpoint
pub struct EnsResolver {
    rpc: Arc<dyn EthRpc>,
    registry: Address,
    cache: Mutex<ResolverCache>,
}

impl EnsResolver {
    pub fn new(rpc: Arc<dyn EthRpc>) -> Self {
        EnsResolver {
            rpc,
            registry: Address::from_hex(ENS_REGISTRY).expect("registry constant"),
            cache: Mutex::new(ResolverCache::new(DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TTL)),
        }
    }

    #[must_use]
    pub fn with_cache(mut self, max_size: usize, ttl: Duration) -> Self {
        self.cache = Mutex::new(ResolverCache::new(max_size, ttl));
        self
    }

    /// Resolve a name to an address; `None` (including zero-address
    /// responses) is cached like a hit
    pub async fn resolve(&self, name: &str) -> Result<Option<Address>, WalletError> {
        {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.get(name) {
                tracing::trace!(name, "ens cache hit");
                return Ok(cached);
            }
        }

        let node = namehash(name);
        let result = match self.resolver_for(node).await? {
            None => None,
            Some(resolver) => self.addr_record(resolver, node).await?,
        };

        tracing::debug!(name, address = ?result.map(|a| a.to_checksum()), "ens resolved");

        let mut cache = self.cache.lock().await;
        cache.insert(name.to_string(), result);
        Ok(result)
    }

    /// Reverse-resolve an address, verifying the forward record matches
    pub async fn reverse(&self, address: Address) -> Result<Option<String>, WalletError> {
        let reverse_name = format!("{}.addr.reverse", hex::encode(address.0));
        let node = namehash(&reverse_name);

        let resolver = match self.resolver_for(node).await? {
            Some(resolver) => resolver,
            None => return Ok(None),
        };

        let name = match self.name_record(resolver, node).await? {
            Some(name) if !name.is_empty() => name,
            _ => return Ok(None),
        };

        // Re-forward the claimed name; a mismatch means the reverse record
        // points at a name its owner never claimed.
        match self.resolve(&name).await? {
            Some(forward) if forward == address => Ok(Some(name)),
            _ => {
                tracing::debug!(
                    address = %address.to_checksum(),
                    name,
                    "reverse record failed forward verification"
                );
                Ok(None)
            }
        }
    }

    /// `text(bytes32,string)` record lookup
    pub async fn text(&self, name: &str, key: &str) -> Result<Option<String>, WalletError> {
        let node = namehash(name);
        let resolver = match self.resolver_for(node).await? {
            Some(resolver) => resolver,
            None => return Ok(None),
        };
        let data = abi::encode_call(
            "text(bytes32,string)",
            &[
                AbiValue::FixedBytes(node.0.to_vec()),
                AbiValue::String(key.to_string()),
            ],
        )?;
        let output = self.call(resolver, data).await?;
        let decoded = abi::decode(&[AbiType::String], &output)?;
        match decoded.into_iter().next() {
            Some(AbiValue::String(s)) if !s.is_empty() => Ok(Some(s)),
            _ => Ok(None),
        }
    }

    /// `contenthash(bytes32)` record lookup
    pub async fn contenthash(&self, name: &str) -> Result<Option<Vec<u8>>, WalletError> {
        let node = namehash(name);
        let resolver = match self.resolver_for(node).await? {
            Some(resolver) => resolver,
            None => return Ok(None),
        };
        let data = abi::encode_call(
            "contenthash(bytes32)",
            &[AbiValue::FixedBytes(node.0.to_vec())],
        )?;
        let output = self.call(resolver, data).await?;
        let decoded = abi::decode(&[AbiType::Bytes], &output)?;
        match decoded.into_iter().next() {
            Some(AbiValue::Bytes(b)) if !b.is_empty() => Ok(Some(b)),
            _ => Ok(None),
        }
    }

    async fn resolver_for(&self, node: Hash) -> Result<Option<Address>, WalletError> {
        let data = abi::encode_call(
            "resolver(bytes32)",
            &[AbiValue::FixedBytes(node.0.to_vec())],
        )?;
        let output = self.call(self.registry, data).await?;
        let resolver = decode_address(&output)?;
        Ok((!resolver.is_zero()).then_some(resolver))
    }

    async fn addr_record(
        &self,
        resolver: Address,
        node: Hash,
    ) -> Result<Option<Address>, WalletError> {
        let data =
            abi::encode_call("addr(bytes32)", &[AbiValue::FixedBytes(node.0.to_vec())])?;
        let output = self.call(resolver, data).await?;
        if output.is_empty() {
            return Ok(None);
        }
        let address = decode_address(&output)?;
        Ok((!address.is_zero()).then_some(address))
    }

    async fn name_record(
        &self,
        resolver: Address,
        node: Hash,
    ) -> Result<Option<String>, WalletError> {
        let data =
            abi::encode_call("name(bytes32)", &[AbiValue::FixedBytes(node.0.to_vec())])?;
        let output = self.call(resolver, data).await?;
        if output.is_empty() {
            return Ok(None);
        }
        let decoded = abi::decode(&[AbiType::String], &output)?;
        match decoded.into_iter().next() {
            Some(AbiValue::String(s)) => Ok(Some(s)),
            _ => Ok(None),
        }
    }

    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, WalletError> {
        let output = self.rpc.call(&CallRequest::to_contract(to, data)).await?;
        Ok(output.0)
    }
}

fn decode_address(output: &[u8]) -> Result<Address, WalletError> {
    let decoded = abi::decode(&[AbiType::Address], output)?;
    decoded
        .into_iter()
        .next()
        .and_then(|v| v.as_address())
        .ok_or_else(|| WalletError::InvalidHex {
            reason: "expected a single address word".to_string(),
        })
}
