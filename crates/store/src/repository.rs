use async_trait::async_trait;

use crate::{CartId, CartRecord, OwnerId, Result, Version};

/// Persistence for carts.
///
/// Writes use optimistic concurrency: the caller passes the version it read,
/// and the write fails with `ConcurrencyConflict` if the stored version has
/// moved on. `Version::initial()` means the cart must not exist yet.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Loads the cart belonging to an owner.
    async fn find_by_owner(&self, owner_id: OwnerId) -> Result<Option<CartRecord>>;

    /// Loads a cart by its identifier.
    async fn find_by_id(&self, cart_id: CartId) -> Result<Option<CartRecord>>;

    /// Writes a cart, returning its new version.
    async fn save(&self, cart: CartRecord, expected_version: Version) -> Result<Version>;

    /// Deletes a cart.
    async fn delete(&self, cart_id: CartId, expected_version: Version) -> Result<()>;
}
