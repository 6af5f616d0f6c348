//! Shared types for the cart and checkout system.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{CartId, OwnerId, ProductId};
