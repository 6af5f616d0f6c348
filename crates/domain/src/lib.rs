//! Domain layer for the cart subsystem.
//!
//! This crate provides:
//! - The Cart aggregate with its line and running-total invariants
//! - CartService, which validates and applies add/remove requests against
//!   the product catalog
//! - Per-owner locking shared with the checkout coordinator

pub mod cart;
pub mod error;
pub mod locks;

pub use cart::{Cart, CartService, LineRequest, RetryPolicy};
pub use error::CartError;
pub use locks::{CartGuard, CartLocks};
