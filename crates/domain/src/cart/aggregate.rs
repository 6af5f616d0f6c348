//! Cart aggregate implementation.

use common::{CartId, Money, OwnerId, ProductId};
use store::{CartLine, CartRecord, Version};

use crate::error::CartError;

/// Cart aggregate root.
///
/// Holds an ordered set of lines (unique by product) and a running total.
/// The total is adjusted by each mutation using the unit price in effect
/// when that mutation was applied; it is never recomputed from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    record: CartRecord,
}

// Query methods
impl Cart {
    /// Creates an empty, unsaved cart for an owner.
    pub fn new(owner_id: OwnerId) -> Self {
        Self {
            record: CartRecord::empty(owner_id),
        }
    }

    /// Rebuilds a cart from its stored form.
    pub fn from_record(record: CartRecord) -> Self {
        Self { record }
    }

    /// Returns the stored form of the cart.
    pub fn as_record(&self) -> &CartRecord {
        &self.record
    }

    /// Consumes the cart, returning its stored form.
    pub fn into_record(self) -> CartRecord {
        self.record
    }

    /// Returns the cart ID.
    pub fn id(&self) -> CartId {
        self.record.id
    }

    /// Returns the owner ID.
    pub fn owner_id(&self) -> OwnerId {
        self.record.owner_id
    }

    /// Returns the lines in insertion order.
    pub fn lines(&self) -> &[CartLine] {
        &self.record.lines
    }

    /// Returns the line for a product.
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.record.line(product_id)
    }

    /// Returns the units of a product currently in the cart (0 if absent).
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.line(product_id).map_or(0, |line| line.quantity)
    }

    /// Returns the number of lines.
    pub fn line_count(&self) -> usize {
        self.record.lines.len()
    }

    /// Returns the total quantity over all lines.
    pub fn total_quantity(&self) -> u64 {
        self.record
            .lines
            .iter()
            .map(|line| u64::from(line.quantity))
            .sum()
    }

    /// Returns true if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.record.lines.is_empty()
    }

    /// Returns the running total.
    pub fn total(&self) -> Money {
        self.record.total
    }

    /// Returns the stored version (0 if never saved).
    pub fn version(&self) -> Version {
        self.record.version
    }
}

// Mutations. Callers are responsible for the stock check.
//
// A mutation that fails leaves the cart unchanged.
impl Cart {
    /// Adds units of a product, merging into an existing line.
    pub(crate) fn add_units(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<(), CartError> {
        let total = unit_price
            .checked_times(quantity)
            .and_then(|amount| self.record.total.checked_add(amount))
            .ok_or_else(|| CartError::AmountOverflow {
                product_id: product_id.clone(),
            })?;

        match self
            .record
            .lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
        {
            Some(line) => {
                line.quantity = line.quantity.checked_add(quantity).ok_or_else(|| {
                    CartError::AmountOverflow {
                        product_id: product_id.clone(),
                    }
                })?;
            }
            None => self.record.lines.push(CartLine::new(product_id, quantity)),
        }
        self.record.total = total;
        Ok(())
    }

    /// Removes units of a product, dropping the line when nothing is left.
    ///
    /// The total goes down by the requested quantity at `unit_price`, even
    /// when that is more than the line held.
    pub(crate) fn remove_units(
        &mut self,
        product_id: &ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<(), CartError> {
        let index = self
            .record
            .lines
            .iter()
            .position(|line| &line.product_id == product_id)
            .ok_or_else(|| CartError::LineNotFound(product_id.clone()))?;

        let total = unit_price
            .checked_times(quantity)
            .and_then(|amount| self.record.total.checked_sub(amount))
            .ok_or_else(|| CartError::AmountOverflow {
                product_id: product_id.clone(),
            })?;

        let line = &mut self.record.lines[index];
        if line.quantity > quantity {
            line.quantity -= quantity;
        } else {
            self.record.lines.remove(index);
        }

        self.record.total = total;
        Ok(())
    }

    pub(crate) fn set_version(&mut self, version: Version) {
        self.record.version = version;
    }
}
