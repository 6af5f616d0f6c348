//! Cart aggregate and related types.

mod aggregate;
mod commands;
mod service;

pub use aggregate::Cart;
pub use commands::LineRequest;
pub use service::{CartService, RetryPolicy};
