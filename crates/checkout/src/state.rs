//! Checkout state machine.

use serde::{Deserialize, Serialize};

/// The state of a checkout.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Completed
///           └──► RejectedInsufficientStock
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckoutState {
    /// Lines are being classified against current stock.
    #[default]
    Pending,

    /// Stock was decremented and the cart deleted (terminal state).
    Completed,

    /// At least one line was short; nothing changed (terminal state).
    RejectedInsufficientStock,
}

impl CheckoutState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CheckoutState::Pending)
    }

    /// Returns true if the cart is deleted in this state.
    pub fn deletes_cart(&self) -> bool {
        matches!(self, CheckoutState::Completed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Pending => "Pending",
            CheckoutState::Completed => "Completed",
            CheckoutState::RejectedInsufficientStock => "RejectedInsufficientStock",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_pending() {
        assert_eq!(CheckoutState::default(), CheckoutState::Pending);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!CheckoutState::Pending.is_terminal());
        assert!(CheckoutState::Completed.is_terminal());
        assert!(CheckoutState::RejectedInsufficientStock.is_terminal());
    }

    #[test]
    fn test_only_completed_deletes_cart() {
        assert!(!CheckoutState::Pending.deletes_cart());
        assert!(CheckoutState::Completed.deletes_cart());
        assert!(!CheckoutState::RejectedInsufficientStock.deletes_cart());
    }

    #[test]
    fn test_display() {
        assert_eq!(CheckoutState::Pending.to_string(), "Pending");
        assert_eq!(
            CheckoutState::RejectedInsufficientStock.to_string(),
            "RejectedInsufficientStock"
        );
    }

    #[test]
    fn test_serialization() {
        let state = CheckoutState::Completed;
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, "\"Completed\"");
        let deserialized: CheckoutState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
