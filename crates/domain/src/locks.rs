//! Per-owner mutual exclusion for cart operations.

use std::collections::HashMap;
use std::sync::Arc;

use common::OwnerId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry size above which idle locks are dropped on the next acquire.
const PRUNE_THRESHOLD: usize = 1024;

/// Single-writer locks keyed by cart owner.
///
/// Add, remove and checkout for the same owner run one at a time; different
/// owners never contend. Cloning yields another handle to the same registry,
/// so the cart service and the checkout coordinator must share one.
#[derive(Debug, Clone, Default)]
pub struct CartLocks {
    registry: Arc<Mutex<HashMap<OwnerId, Arc<Mutex<()>>>>>,
}

/// Held while an operation owns a cart.
#[derive(Debug)]
pub struct CartGuard {
    owner_id: OwnerId,
    _guard: OwnedMutexGuard<()>,
}

impl CartGuard {
    /// Returns the owner whose cart is locked.
    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }
}

impl CartLocks {
    /// Creates an empty lock registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the owner's cart is free and locks it.
    pub async fn lock(&self, owner_id: OwnerId) -> CartGuard {
        let entry = {
            let mut registry = self.registry.lock().await;
            if registry.len() >= PRUNE_THRESHOLD {
                Self::retain_busy(&mut registry);
            }
            registry.entry(owner_id).or_default().clone()
        };

        CartGuard {
            owner_id,
            _guard: entry.lock_owned().await,
        }
    }

    /// Drops locks nobody holds or waits for.
    pub async fn prune(&self) {
        Self::retain_busy(&mut *self.registry.lock().await);
    }

    /// Returns the number of tracked owners.
    pub async fn len(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Returns true if no owners are tracked.
    pub async fn is_empty(&self) -> bool {
        self.registry.lock().await.is_empty()
    }

    // An entry referenced only by the registry is neither held nor awaited.
    fn retain_busy(registry: &mut HashMap<OwnerId, Arc<Mutex<()>>>) {
        registry.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_owner_is_exclusive() {
        let locks = CartLocks::new();
        let owner = OwnerId::new();

        let guard = locks.lock(owner).await;
        let contender = tokio::time::timeout(Duration::from_millis(50), locks.lock(owner)).await;
        assert!(contender.is_err());

        drop(guard);
        let guard = tokio::time::timeout(Duration::from_millis(50), locks.lock(owner)).await;
        assert!(guard.is_ok());
    }

    #[tokio::test]
    async fn test_different_owners_do_not_contend() {
        let locks = CartLocks::new();
        let _first = locks.lock(OwnerId::new()).await;

        let second =
            tokio::time::timeout(Duration::from_millis(50), locks.lock(OwnerId::new())).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks() {
        let locks = CartLocks::new();
        let held_owner = OwnerId::new();
        let held = locks.lock(held_owner).await;
        drop(locks.lock(OwnerId::new()).await);
        assert_eq!(locks.len().await, 2);

        locks.prune().await;

        assert_eq!(locks.len().await, 1);
        assert_eq!(held.owner_id(), held_owner);
    }

    #[tokio::test]
    async fn test_clones_share_registry() {
        let locks = CartLocks::new();
        let other = locks.clone();
        let owner = OwnerId::new();

        let _guard = locks.lock(owner).await;
        let contender = tokio::time::timeout(Duration::from_millis(50), other.lock(owner)).await;
        assert!(contender.is_err());
    }
}
