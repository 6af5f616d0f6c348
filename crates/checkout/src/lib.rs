//! Checkout for the cart subsystem.
//!
//! Checkout turns a cart into a committed stock decrement or a rejection:
//! 1. Re-read every line's product and classify it as sufficient or short
//! 2. If any line is short, reject and change nothing
//! 3. Otherwise decrement stock for all lines in one atomic step
//! 4. Delete the cart, returning the stock if the delete fails

pub mod coordinator;
pub mod error;
pub mod outcome;
pub mod state;

pub use coordinator::CheckoutCoordinator;
pub use error::{CheckoutError, Result};
pub use outcome::{CheckoutOutcome, CheckoutReceipt, ShortLine};
pub use state::CheckoutState;
