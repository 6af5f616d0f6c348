//! Checkout coordinator.

use std::collections::HashMap;

use chrono::Utc;
use common::{CartId, ProductId};
use domain::{Cart, CartLocks};
use store::{CartRepository, DecrementOutcome, ProductCatalog, StockDecrement};

use crate::error::{CheckoutError, Result};
use crate::outcome::{CheckoutOutcome, CheckoutReceipt, ShortLine};
use crate::state::CheckoutState;

/// Converts carts into committed stock decrements.
///
/// Every line is classified against one fresh read of the catalog before
/// anything is written. Stock is only touched when all lines are covered,
/// and then for all lines in a single atomic decrement.
pub struct CheckoutCoordinator<C, R>
where
    C: ProductCatalog,
    R: CartRepository,
{
    catalog: C,
    carts: R,
    locks: CartLocks,
}

impl<C, R> CheckoutCoordinator<C, R>
where
    C: ProductCatalog,
    R: CartRepository,
{
    /// Creates a new checkout coordinator with its own lock registry.
    pub fn new(catalog: C, carts: R) -> Self {
        Self {
            catalog,
            carts,
            locks: CartLocks::new(),
        }
    }

    /// Uses a lock registry shared with the cart service.
    pub fn with_locks(mut self, locks: CartLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Returns the product catalog.
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Returns the cart repository.
    pub fn carts(&self) -> &R {
        &self.carts
    }

    /// Checks out a cart.
    ///
    /// Returns `Completed` after decrementing stock and deleting the cart, or
    /// `RejectedInsufficientStock` listing every short line with nothing
    /// changed. An empty cart completes without touching stock.
    #[tracing::instrument(skip(self), fields(state = %CheckoutState::Pending))]
    pub async fn checkout(&self, cart_id: CartId) -> Result<CheckoutOutcome> {
        let started = std::time::Instant::now();
        let result = self.checkout_locked(cart_id).await;

        if let Ok(outcome) = &result {
            let state = outcome.state();
            debug_assert!(state.is_terminal());
            tracing::Span::current().record("state", state.as_str());
            tracing::debug!(%cart_id, %state, cart_deleted = state.deletes_cart(), "checkout finished");
        }

        match &result {
            Ok(CheckoutOutcome::Completed(receipt)) => {
                metrics::counter!("checkout_completed_total").increment(1);
                tracing::info!(
                    %cart_id,
                    owner_id = %receipt.owner_id,
                    lines = receipt.lines.len(),
                    total = %receipt.total,
                    "checkout completed"
                );
            }
            Ok(CheckoutOutcome::RejectedInsufficientStock { short_lines, .. }) => {
                metrics::counter!("checkout_rejected_total").increment(1);
                tracing::info!(%cart_id, short = short_lines.len(), "checkout rejected: insufficient stock");
            }
            Err(err) => {
                metrics::counter!("checkout_failures_total", "reason" => err.kind()).increment(1);
                tracing::warn!(%cart_id, error = %err, "checkout failed");
            }
        }
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        result
    }

    async fn checkout_locked(&self, cart_id: CartId) -> Result<CheckoutOutcome> {
        // The owner is only known after a first read
        let owner_id = self
            .load(cart_id)
            .await?
            .ok_or(CheckoutError::CartNotFound(cart_id))?
            .owner_id();

        let _guard = self.locks.lock(owner_id).await;
        let cart = self
            .load(cart_id)
            .await?
            .ok_or(CheckoutError::CartNotFound(cart_id))?;

        // Classify every line before writing anything
        let mut names: HashMap<ProductId, String> = HashMap::new();
        let mut short_lines = Vec::new();
        for line in cart.lines() {
            let product = self
                .catalog
                .find_by_id(&line.product_id)
                .await?
                .ok_or_else(|| CheckoutError::ProductNotFound(line.product_id.clone()))?;

            if !product.has_stock_for(line.quantity) {
                tracing::debug!(
                    product_id = %product.id,
                    requested = line.quantity,
                    available = product.stock,
                    "short line"
                );
                short_lines.push(ShortLine {
                    product_id: product.id.clone(),
                    product_name: product.name.clone(),
                });
            }
            names.insert(product.id, product.name);
        }

        if !short_lines.is_empty() {
            return Ok(CheckoutOutcome::RejectedInsufficientStock {
                cart_id,
                short_lines,
            });
        }

        let decrements: Vec<StockDecrement> = cart
            .lines()
            .iter()
            .map(|line| StockDecrement::new(line.product_id.clone(), line.quantity))
            .collect();

        if !decrements.is_empty() {
            // Stock can still move between the read above and this write
            if let DecrementOutcome::Insufficient(shortfalls) =
                self.catalog.decrement_stock(&decrements).await?
            {
                let short_lines = shortfalls
                    .into_iter()
                    .map(|shortfall| ShortLine {
                        product_name: names.get(&shortfall.product_id).cloned().unwrap_or_default(),
                        product_id: shortfall.product_id,
                    })
                    .collect();
                return Ok(CheckoutOutcome::RejectedInsufficientStock {
                    cart_id,
                    short_lines,
                });
            }
        }

        if let Err(err) = self.carts.delete(cart_id, cart.version()).await {
            tracing::warn!(%cart_id, error = %err, "cart delete failed, returning stock");
            if let Err(restock_err) = self.catalog.restock(&decrements).await {
                tracing::error!(%cart_id, error = %restock_err, "restock after failed checkout failed");
            }
            return Err(err.into());
        }

        let record = cart.into_record();
        Ok(CheckoutOutcome::Completed(CheckoutReceipt {
            cart_id,
            owner_id: record.owner_id,
            lines: record.lines,
            total: record.total,
            completed_at: Utc::now(),
        }))
    }

    async fn load(&self, cart_id: CartId) -> Result<Option<Cart>> {
        Ok(CartRepository::find_by_id(&self.carts, cart_id)
            .await?
            .map(Cart::from_record))
    }
}
