//! Checkout outcomes.

use chrono::{DateTime, Utc};
use common::{CartId, Money, OwnerId, ProductId};
use serde::{Deserialize, Serialize};
use store::CartLine;

use crate::state::CheckoutState;

/// A line whose requested quantity exceeded the stock available at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortLine {
    pub product_id: ProductId,
    pub product_name: String,
}

/// What a completed checkout committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub cart_id: CartId,
    pub owner_id: OwnerId,
    pub lines: Vec<CartLine>,
    pub total: Money,
    pub completed_at: DateTime<Utc>,
}

/// Terminal result of a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum CheckoutOutcome {
    /// Stock was decremented for every line and the cart was deleted.
    Completed(CheckoutReceipt),

    /// Some lines were short. Stock and cart are unchanged.
    RejectedInsufficientStock {
        cart_id: CartId,
        short_lines: Vec<ShortLine>,
    },
}

impl CheckoutOutcome {
    /// Returns the terminal state this outcome represents.
    pub fn state(&self) -> CheckoutState {
        match self {
            CheckoutOutcome::Completed(_) => CheckoutState::Completed,
            CheckoutOutcome::RejectedInsufficientStock { .. } => {
                CheckoutState::RejectedInsufficientStock
            }
        }
    }

    /// Returns the checked-out cart's ID.
    pub fn cart_id(&self) -> CartId {
        match self {
            CheckoutOutcome::Completed(receipt) => receipt.cart_id,
            CheckoutOutcome::RejectedInsufficientStock { cart_id, .. } => *cart_id,
        }
    }

    /// Returns true if the checkout completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, CheckoutOutcome::Completed(_))
    }

    /// Returns the short lines of a rejection (empty when completed).
    pub fn short_lines(&self) -> &[ShortLine] {
        match self {
            CheckoutOutcome::Completed(_) => &[],
            CheckoutOutcome::RejectedInsufficientStock { short_lines, .. } => short_lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_state_and_lines() {
        let cart_id = CartId::new();
        let outcome = CheckoutOutcome::RejectedInsufficientStock {
            cart_id,
            short_lines: vec![ShortLine {
                product_id: "B".into(),
                product_name: "Widget B".to_string(),
            }],
        };

        assert_eq!(outcome.state(), CheckoutState::RejectedInsufficientStock);
        assert_eq!(outcome.cart_id(), cart_id);
        assert!(!outcome.is_completed());
        assert_eq!(outcome.short_lines().len(), 1);
    }

    #[test]
    fn test_outcome_is_tagged_by_status() {
        let outcome = CheckoutOutcome::Completed(CheckoutReceipt {
            cart_id: CartId::new(),
            owner_id: OwnerId::new(),
            lines: vec![CartLine::new("A", 3)],
            total: Money::from_units(30),
            completed_at: Utc::now(),
        });

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "Completed");
        assert_eq!(json["total"], 3000);
        assert!(outcome.short_lines().is_empty());
    }
}
