//! Cart mutation requests.

use common::ProductId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CartError;

/// A requested (product, quantity) pair for an add or remove call.
///
/// The quantity is kept exactly as received; it is only turned into a unit
/// count once it has been checked to be a positive integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    /// The product to add or remove.
    pub product_id: ProductId,

    /// Requested number of units.
    pub quantity: Value,
}

impl LineRequest {
    /// Creates a new line request.
    pub fn new(product_id: impl Into<ProductId>, quantity: i64) -> Self {
        Self::with_raw_quantity(product_id, Value::from(quantity))
    }

    /// Creates a line request from an unchecked quantity value.
    pub fn with_raw_quantity(product_id: impl Into<ProductId>, quantity: Value) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }

    /// Returns the quantity as a positive unit count.
    pub fn validated_quantity(&self) -> Result<u32, CartError> {
        whole_units(&self.quantity).ok_or_else(|| CartError::InvalidQuantity {
            product_id: self.product_id.clone(),
            quantity: self.quantity.to_string(),
        })
    }
}

// Integral numbers such as `2` or `2.0` in 1..=u32::MAX
fn whole_units(value: &Value) -> Option<u32> {
    let Value::Number(number) = value else {
        return None;
    };

    let units = match number.as_u64() {
        Some(units) => units,
        None => {
            let float = number.as_f64()?;
            if float.fract() != 0.0 || float < 1.0 || float > f64::from(u32::MAX) {
                return None;
            }
            float as u64
        }
    };

    u32::try_from(units).ok().filter(|units| *units > 0)
}
