//! Domain error types.

use common::{OwnerId, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// A requested quantity is not a positive integer.
    #[error("Invalid quantity {quantity} for product {product_id}: must be a positive integer")]
    InvalidQuantity {
        product_id: ProductId,
        /// The quantity as it was received.
        quantity: String,
    },

    /// The requested product does not exist in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The cart would hold more units than the product has in stock.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u64,
        available: u32,
    },

    /// The owner has no cart.
    #[error("Cart not found for owner {0}")]
    CartNotFound(OwnerId),

    /// The cart has no lines to remove.
    #[error("Cart is already empty")]
    EmptyCart,

    /// The product to remove is not in the cart.
    #[error("Product {0} is not in the cart")]
    LineNotFound(ProductId),

    /// Applying the line would push the cart total out of range.
    #[error("Cart total out of range after applying product {product_id}")]
    AmountOverflow { product_id: ProductId },

    /// The cart kept changing underneath us until the retry budget ran out.
    #[error("Cart for owner {owner_id} was modified concurrently ({attempts} attempts)")]
    ConcurrentModification { owner_id: OwnerId, attempts: u32 },

    /// The catalog or cart storage failed.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl CartError {
    /// Returns a short, stable name for the error kind.
    ///
    /// Used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            CartError::InvalidQuantity { .. } => "invalid_quantity",
            CartError::ProductNotFound(_) => "product_not_found",
            CartError::InsufficientStock { .. } => "insufficient_stock",
            CartError::CartNotFound(_) => "cart_not_found",
            CartError::EmptyCart => "empty_cart",
            CartError::LineNotFound(_) => "line_not_found",
            CartError::AmountOverflow { .. } => "amount_overflow",
            CartError::ConcurrentModification { .. } => "concurrent_modification",
            CartError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}
