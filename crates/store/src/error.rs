use thiserror::Error;

use crate::{CartId, OwnerId, ProductId, Version};

/// Errors that can occur when interacting with the catalog or cart storage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A concurrency conflict occurred when writing a cart.
    /// The expected version did not match the stored version.
    #[error(
        "Concurrency conflict for cart {cart_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        cart_id: CartId,
        expected: Version,
        actual: Version,
    },

    /// A second cart was written for an owner that already has one.
    #[error("Owner {0} already has a cart")]
    DuplicateOwner(OwnerId),

    /// A product record violates the catalog invariants.
    #[error("Invalid product {product_id}: {reason}")]
    InvalidProduct {
        product_id: ProductId,
        reason: String,
    },

    /// The backing store could not serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if the error is an optimistic concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrencyConflict { .. } | StoreError::DuplicateOwner(_)
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
