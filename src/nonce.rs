//! Serialized nonce reservation for a single sender
//!
//! Every transaction path in the wallet (direct sends, token transfers,
//! bridge approvals and deposits) submits from the same EOA, often
//! concurrently. This manager is the single authority that hands out nonces:
//! without it, interleaved submissions would collide or leave gaps that
//! strand funds behind an unmined slot.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::WalletError;
use crate::rpc::EthRpc;
use crate::types::Address;

#[derive(Default)]
struct NonceState {
    /// Next nonce to hand out; `None` forces a resync from the node
    reserved: Option<u64>,
}

/// Mutex-serialized nonce ledger for one sender address
pub struct NonceManager {
    rpc: Arc<dyn EthRpc>,
    address: Address,
    state: Mutex<NonceState>,
}

impl NonceManager {
    pub fn new(rpc: Arc<dyn EthRpc>, address: Address) -> Self {
        NonceManager {
            rpc,
            address,
            state: Mutex::new(NonceState::default()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Reserve the next nonce
    ///
    /// Holds the lock across the pending-count fetch so that no two callers
    /// can ever observe the same value. On first use (and after any
    /// failure) the reservation is re-seeded with
    /// `max(reserved, pending_count)`.
    pub async fn next_nonce(&self) -> Result<u64, WalletError> {
        let mut state = self.state.lock().await;

        let next = match state.reserved {
            Some(reserved) => reserved,
            None => {
                let pending = self
                    .rpc
                    .get_transaction_count(self.address, true)
                    .await?;
                tracing::debug!(address = %self.address, pending, "seeded nonce from node");
                pending
            }
        };

        state.reserved = Some(next + 1);
        Ok(next)
    }

    /// A reserved nonce's transaction was mined; the stream continues
    pub async fn on_confirmed(&self) {
        // The reservation already advanced at hand-out; nothing to roll.
        let state = self.state.lock().await;
        tracing::trace!(reserved = ?state.reserved, "nonce confirmed");
    }

    /// A reserved nonce's transaction failed to reach the chain
    ///
    /// The reservation is dropped so the next sender re-seeds from the
    /// node's pending count and sees the post-gap value.
    pub async fn on_failed(&self) {
        let mut state = self.state.lock().await;
        state.reserved = None;
        tracing::debug!(address = %self.address, "nonce reservation reset after failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRpc;
    use std::collections::HashSet;

    fn manager_with(pending: u64) -> (Arc<MockRpc>, NonceManager) {
        let rpc = Arc::new(MockRpc::new(1));
        rpc.set_pending_count(pending);
        let manager = NonceManager::new(rpc.clone(), Address::ZERO);
        (rpc, manager)
    }

    #[tokio::test]
    async fn test_sequential_nonces() {
        let (_rpc, manager) = manager_with(5);
        assert_eq!(manager.next_nonce().await.unwrap(), 5);
        assert_eq!(manager.next_nonce().await.unwrap(), 6);
        assert_eq!(manager.next_nonce().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_node_fetched_once_while_healthy() {
        let (rpc, manager) = manager_with(0);
        for _ in 0..10 {
            manager.next_nonce().await.unwrap();
        }
        assert_eq!(rpc.nonce_fetches(), 1);
    }

    #[tokio::test]
    async fn test_failure_reseeds_from_pending() {
        let (rpc, manager) = manager_with(3);
        assert_eq!(manager.next_nonce().await.unwrap(), 3);
        assert_eq!(manager.next_nonce().await.unwrap(), 4);

        // The node never saw nonce 4 land; after a failure the pending
        // count still reports 4 and the manager must hand it out again.
        rpc.set_pending_count(4);
        manager.on_failed().await;
        assert_eq!(manager.next_nonce().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_are_unique() {
        let (_rpc, manager) = manager_with(100);
        let manager = Arc::new(manager);

        let mut handles = Vec::new();
        for _ in 0..32 {
            let m = manager.clone();
            handles.push(tokio::spawn(async move { m.next_nonce().await.unwrap() }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            let nonce = handle.await.unwrap();
            assert!(seen.insert(nonce), "nonce {nonce} issued twice");
        }
        assert_eq!(seen.len(), 32);
        assert_eq!(*seen.iter().min().unwrap(), 100);
        assert_eq!(*seen.iter().max().unwrap(), 131);
    }

    #[tokio::test]
    async fn test_confirmed_keeps_stream() {
        let (_rpc, manager) = manager_with(0);
        assert_eq!(manager.next_nonce().await.unwrap(), 0);
        manager.on_confirmed().await;
        assert_eq!(manager.next_nonce().await.unwrap(), 1);
    }
}
