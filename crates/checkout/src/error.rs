//! Checkout error types.

use common::{CartId, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during checkout.
///
/// A rejection for insufficient stock is an outcome, not an error.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// No cart exists with the given ID.
    #[error("Cart not found: {0}")]
    CartNotFound(CartId),

    /// A product in the cart no longer exists in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The catalog or cart storage failed.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl CheckoutError {
    /// Returns a short, stable name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutError::CartNotFound(_) => "cart_not_found",
            CheckoutError::ProductNotFound(_) => "product_not_found",
            CheckoutError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
