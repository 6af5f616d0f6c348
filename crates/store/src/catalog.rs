//! Product catalog trait and stock decrement types.

use async_trait::async_trait;

use crate::{Product, ProductId, Result, StoreError};

/// A request to take `quantity` units of a product out of stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDecrement {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl StockDecrement {
    /// Creates a new stock decrement.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A product that could not cover a requested decrement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockShortfall {
    pub product_id: ProductId,
    pub requested: u32,
    /// Stock at the time of the attempt; 0 when the product no longer exists.
    pub available: u32,
}

/// Result of an all-or-nothing stock decrement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecrementOutcome {
    /// Every product was decremented.
    Applied,

    /// At least one product was short; no stock was changed.
    Insufficient(Vec<StockShortfall>),
}

impl DecrementOutcome {
    /// Returns true if the decrement was applied.
    pub fn is_applied(&self) -> bool {
        matches!(self, DecrementOutcome::Applied)
    }
}

/// Read/write access to product prices and stock.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Looks up a product.
    ///
    /// Returns None if the product doesn't exist.
    async fn find_by_id(&self, product_id: &ProductId) -> Result<Option<Product>>;

    /// Inserts or replaces a product.
    async fn save(&self, product: Product) -> Result<()>;

    /// Decrements stock for every given product as one atomic step.
    ///
    /// Each product is decremented only if its stock covers the requested
    /// quantity. If any product falls short, nothing is decremented and the
    /// shortfalls are returned.
    async fn decrement_stock(&self, decrements: &[StockDecrement]) -> Result<DecrementOutcome>;

    /// Returns previously decremented units to stock.
    async fn restock(&self, decrements: &[StockDecrement]) -> Result<()>;
}

/// Checks the invariants every stored product must satisfy.
pub fn validate_product(product: &Product) -> Result<()> {
    if product.price.is_negative() {
        return Err(StoreError::InvalidProduct {
            product_id: product.id.clone(),
            reason: format!("price {} is negative", product.price),
        });
    }
    if product.name.trim().is_empty() {
        return Err(StoreError::InvalidProduct {
            product_id: product.id.clone(),
            reason: "name is empty".to_string(),
        });
    }
    Ok(())
}

/// Merges decrements that name the same product, keeping first-seen order.
pub fn merge_decrements(decrements: &[StockDecrement]) -> Vec<StockDecrement> {
    let mut merged: Vec<StockDecrement> = Vec::with_capacity(decrements.len());
    for decrement in decrements {
        match merged
            .iter_mut()
            .find(|d| d.product_id == decrement.product_id)
        {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(decrement.quantity),
            None => merged.push(decrement.clone()),
        }
    }
    merged
}
