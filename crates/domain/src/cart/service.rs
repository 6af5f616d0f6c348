//! Cart service: inventory-aware add and remove.

use std::collections::HashMap;

use common::{Money, OwnerId, ProductId};
use store::{CartRepository, ProductCatalog};

use crate::error::CartError;
use crate::locks::CartLocks;

use super::{Cart, LineRequest};

/// How often a cart mutation is attempted when its versioned save conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Creates a policy; at least one attempt is always made.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Service for mutating carts.
///
/// Every call is one read-validate-apply step under the owner's lock: the
/// cart and each product are read once, all checks run against that read,
/// and the cart is saved once at the end. A failed call leaves the stored
/// cart untouched.
pub struct CartService<C, R>
where
    C: ProductCatalog,
    R: CartRepository,
{
    catalog: C,
    carts: R,
    locks: CartLocks,
    retry: RetryPolicy,
}

impl<C, R> CartService<C, R>
where
    C: ProductCatalog,
    R: CartRepository,
{
    /// Creates a new cart service with its own lock registry.
    pub fn new(catalog: C, carts: R) -> Self {
        Self {
            catalog,
            carts,
            locks: CartLocks::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Uses a lock registry shared with other cart consumers.
    pub fn with_locks(mut self, locks: CartLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Overrides the conflict retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
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

    /// Loads the cart of an owner.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, owner_id: OwnerId) -> Result<Option<Cart>, CartError> {
        Ok(self
            .carts
            .find_by_owner(owner_id)
            .await?
            .map(Cart::from_record))
    }

    /// Adds lines to the owner's cart, creating the cart if needed.
    ///
    /// Every quantity must be a positive integer and, per product, the units
    /// already in the cart plus the units requested must fit in stock. If
    /// any line fails, nothing is applied.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn add_lines(
        &self,
        owner_id: OwnerId,
        lines: Vec<LineRequest>,
    ) -> Result<Cart, CartError> {
        let result = self.add_lines_locked(owner_id, &lines).await;
        record_outcome("add", &result);
        result
    }

    /// Removes lines from the owner's cart.
    ///
    /// Removing at least as many units as the cart holds drops the line.
    /// The first failing line aborts the call and nothing is saved.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn remove_lines(
        &self,
        owner_id: OwnerId,
        lines: Vec<LineRequest>,
    ) -> Result<Cart, CartError> {
        let result = self.remove_lines_locked(owner_id, &lines).await;
        record_outcome("remove", &result);
        result
    }

    async fn add_lines_locked(
        &self,
        owner_id: OwnerId,
        lines: &[LineRequest],
    ) -> Result<Cart, CartError> {
        let requested = lines
            .iter()
            .map(|line| Ok((line.product_id.clone(), line.validated_quantity()?)))
            .collect::<Result<Vec<_>, CartError>>()?;

        let _guard = self.locks.lock(owner_id).await;
        let mut attempt = 1;
        loop {
            let result = self.try_add_lines(owner_id, &requested).await;
            match self.settle(owner_id, attempt, result) {
                Some(result) => break result,
                None => attempt += 1,
            }
        }
    }

    async fn remove_lines_locked(
        &self,
        owner_id: OwnerId,
        lines: &[LineRequest],
    ) -> Result<Cart, CartError> {
        let _guard = self.locks.lock(owner_id).await;
        let mut attempt = 1;
        loop {
            let result = self.try_remove_lines(owner_id, lines).await;
            match self.settle(owner_id, attempt, result) {
                Some(result) => break result,
                None => attempt += 1,
            }
        }
    }

    async fn try_add_lines(
        &self,
        owner_id: OwnerId,
        requested: &[(ProductId, u32)],
    ) -> Result<Cart, CartError> {
        let mut cart = self
            .carts
            .find_by_owner(owner_id)
            .await?
            .map_or_else(|| Cart::new(owner_id), Cart::from_record);
        let expected_version = cart.version();

        // Check every line against one read of each product
        let mut prices: HashMap<ProductId, Money> = HashMap::new();
        let mut wanted: HashMap<ProductId, u64> = HashMap::new();
        for (product_id, quantity) in requested {
            let product = self
                .catalog
                .find_by_id(product_id)
                .await?
                .ok_or_else(|| CartError::ProductNotFound(product_id.clone()))?;

            let total = wanted
                .entry(product_id.clone())
                .or_insert_with(|| u64::from(cart.quantity_of(product_id)));
            *total += u64::from(*quantity);

            if *total > u64::from(product.stock) {
                return Err(CartError::InsufficientStock {
                    product_id: product_id.clone(),
                    requested: *total,
                    available: product.stock,
                });
            }

            prices.entry(product_id.clone()).or_insert(product.price);
        }

        for (product_id, quantity) in requested {
            let unit_price = prices.get(product_id).copied().unwrap_or_default();
            cart.add_units(product_id.clone(), *quantity, unit_price)?;
        }

        let version = self
            .carts
            .save(cart.as_record().clone(), expected_version)
            .await?;
        cart.set_version(version);

        tracing::info!(
            cart_id = %cart.id(),
            lines = cart.line_count(),
            total = %cart.total(),
            "lines added to cart"
        );
        Ok(cart)
    }

    async fn try_remove_lines(
        &self,
        owner_id: OwnerId,
        lines: &[LineRequest],
    ) -> Result<Cart, CartError> {
        let mut cart = self
            .carts
            .find_by_owner(owner_id)
            .await?
            .map(Cart::from_record)
            .ok_or(CartError::CartNotFound(owner_id))?;

        if cart.is_empty() {
            return Err(CartError::EmptyCart);
        }
        let expected_version = cart.version();

        // Mutations stay on this copy until the final save
        let mut prices: HashMap<ProductId, Money> = HashMap::new();
        for line in lines {
            let quantity = line.validated_quantity()?;
            if cart.line(&line.product_id).is_none() {
                return Err(CartError::LineNotFound(line.product_id.clone()));
            }

            let unit_price = match prices.get(&line.product_id) {
                Some(price) => *price,
                None => {
                    let product = self
                        .catalog
                        .find_by_id(&line.product_id)
                        .await?
                        .ok_or_else(|| CartError::ProductNotFound(line.product_id.clone()))?;
                    prices.insert(line.product_id.clone(), product.price);
                    product.price
                }
            };

            cart.remove_units(&line.product_id, quantity, unit_price)?;
        }

        let version = self
            .carts
            .save(cart.as_record().clone(), expected_version)
            .await?;
        cart.set_version(version);

        tracing::info!(
            cart_id = %cart.id(),
            lines = cart.line_count(),
            total = %cart.total(),
            "lines removed from cart"
        );
        Ok(cart)
    }

    /// Decides whether a finished attempt is final.
    ///
    /// Returns None when the attempt lost a write race and should be retried.
    fn settle(
        &self,
        owner_id: OwnerId,
        attempt: u32,
        result: Result<Cart, CartError>,
    ) -> Option<Result<Cart, CartError>> {
        match result {
            Err(CartError::StoreUnavailable(err)) if err.is_conflict() => {
                if attempt < self.retry.max_attempts {
                    tracing::debug!(%owner_id, attempt, error = %err, "cart write conflict, retrying");
                    None
                } else {
                    tracing::warn!(%owner_id, attempt, "cart write conflict, giving up");
                    Some(Err(CartError::ConcurrentModification {
                        owner_id,
                        attempts: attempt,
                    }))
                }
            }
            other => Some(other),
        }
    }
}

fn record_outcome(operation: &'static str, result: &Result<Cart, CartError>) {
    match result {
        Ok(_) => {
            metrics::counter!("cart_mutations_total", "operation" => operation).increment(1);
        }
        Err(err) => {
            metrics::counter!(
                "cart_mutation_failures_total",
                "operation" => operation,
                "reason" => err.kind()
            )
            .increment(1);
            tracing::info!(operation, error = %err, "cart mutation rejected");
        }
    }
}
