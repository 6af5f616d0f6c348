use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CartId, Money, OwnerId, ProductId};

/// Version number of a stored cart, used for optimistic concurrency control.
///
/// A cart that was never persisted is at version 0; every successful save
/// increments the version by 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) for a cart that has not been saved.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the first version (1), assigned by the first save.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A sellable product with its price and available stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// The product identifier.
    pub id: ProductId,

    /// Human-readable product name.
    pub name: String,

    /// Current unit price. Never negative.
    pub price: Money,

    /// Units available for sale.
    pub stock: u32,
}

impl Product {
    /// Creates a new product record.
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            stock,
        }
    }

    /// Returns true if `quantity` units can be taken from stock.
    pub fn has_stock_for(&self, quantity: u32) -> bool {
        self.stock >= quantity
    }
}

/// A (product, quantity) line inside a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// The product in this line. Unique within a cart.
    pub product_id: ProductId,

    /// Units requested. Always positive.
    pub quantity: u32,
}

impl CartLine {
    /// Creates a new cart line.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// The stored form of a cart.
///
/// Lines keep their insertion order. `total` is the running total maintained
/// by the cart mutations and is stored as-is, never recomputed from prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartRecord {
    /// Unique cart identifier.
    pub id: CartId,

    /// The owner of the cart.
    pub owner_id: OwnerId,

    /// Lines in insertion order.
    pub lines: Vec<CartLine>,

    /// Running total.
    pub total: Money,

    /// Version of the stored record.
    pub version: Version,

    /// When the cart was first created.
    pub created_at: DateTime<Utc>,

    /// When the cart was last written.
    pub updated_at: DateTime<Utc>,
}

impl CartRecord {
    /// Creates an empty, never-persisted cart for an owner.
    pub fn empty(owner_id: OwnerId) -> Self {
        let now = Utc::now();
        Self {
            id: CartId::new(),
            owner_id,
            lines: Vec::new(),
            total: Money::zero(),
            version: Version::initial(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the line for a product, if present.
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| &line.product_id == product_id)
    }
}
