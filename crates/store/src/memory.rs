use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    CartId, CartRecord, OwnerId, Product, ProductId, Result, StoreError, Version,
    catalog::{
        DecrementOutcome, ProductCatalog, StockDecrement, StockShortfall, merge_decrements,
        validate_product,
    },
    repository::CartRepository,
};

#[derive(Debug, Default)]
struct CatalogState {
    products: HashMap<ProductId, Product>,
    unavailable: bool,
}

/// In-memory product catalog.
///
/// Cloning yields another handle to the same catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryProductCatalog {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog pre-loaded with products.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect::<HashMap<_, _>>();
        Self {
            state: Arc::new(RwLock::new(CatalogState {
                products,
                unavailable: false,
            })),
        }
    }

    /// Makes every subsequent call fail with `StoreError::Unavailable`.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Returns the current stock of a product, if it exists.
    pub async fn stock_of(&self, product_id: &ProductId) -> Option<u32> {
        self.state
            .read()
            .await
            .products
            .get(product_id)
            .map(|p| p.stock)
    }

    /// Returns the number of products in the catalog.
    pub async fn product_count(&self) -> usize {
        self.state.read().await.products.len()
    }
}

fn unavailable(what: &str) -> StoreError {
    StoreError::Unavailable(format!("in-memory {what} is offline"))
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn find_by_id(&self, product_id: &ProductId) -> Result<Option<Product>> {
        let state = self.state.read().await;
        if state.unavailable {
            return Err(unavailable("catalog"));
        }
        Ok(state.products.get(product_id).cloned())
    }

    async fn save(&self, product: Product) -> Result<()> {
        validate_product(&product)?;
        let mut state = self.state.write().await;
        if state.unavailable {
            return Err(unavailable("catalog"));
        }
        state.products.insert(product.id.clone(), product);
        Ok(())
    }

    async fn decrement_stock(&self, decrements: &[StockDecrement]) -> Result<DecrementOutcome> {
        let decrements = merge_decrements(decrements);
        let mut state = self.state.write().await;
        if state.unavailable {
            return Err(unavailable("catalog"));
        }

        // Check everything before touching anything
        let shortfalls: Vec<StockShortfall> = decrements
            .iter()
            .filter_map(|d| {
                let available = state.products.get(&d.product_id).map_or(0, |p| p.stock);
                (available < d.quantity).then(|| StockShortfall {
                    product_id: d.product_id.clone(),
                    requested: d.quantity,
                    available,
                })
            })
            .collect();

        if !shortfalls.is_empty() {
            return Ok(DecrementOutcome::Insufficient(shortfalls));
        }

        for d in &decrements {
            if let Some(product) = state.products.get_mut(&d.product_id) {
                product.stock -= d.quantity;
            }
        }

        Ok(DecrementOutcome::Applied)
    }

    async fn restock(&self, decrements: &[StockDecrement]) -> Result<()> {
        let mut state = self.state.write().await;
        if state.unavailable {
            return Err(unavailable("catalog"));
        }
        for d in merge_decrements(decrements) {
            if let Some(product) = state.products.get_mut(&d.product_id) {
                product.stock = product.stock.saturating_add(d.quantity);
            }
        }
        metrics::counter!("stock_restocks_total").increment(1);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RepositoryState {
    carts: HashMap<CartId, CartRecord>,
    owners: HashMap<OwnerId, CartId>,
    writes: usize,
    fail_on_save: bool,
    fail_on_delete: bool,
}

/// In-memory cart repository.
///
/// Provides the same versioning semantics as the PostgreSQL implementation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartRepository {
    state: Arc<RwLock<RepositoryState>>,
}

impl InMemoryCartRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the repository to fail every save.
    pub async fn set_fail_on_save(&self, fail: bool) {
        self.state.write().await.fail_on_save = fail;
    }

    /// Configures the repository to fail every delete.
    pub async fn set_fail_on_delete(&self, fail: bool) {
        self.state.write().await.fail_on_delete = fail;
    }

    /// Returns the number of stored carts.
    pub async fn cart_count(&self) -> usize {
        self.state.read().await.carts.len()
    }

    /// Returns the number of successful saves and deletes so far.
    pub async fn write_count(&self) -> usize {
        self.state.read().await.writes
    }
}

#[async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn find_by_owner(&self, owner_id: OwnerId) -> Result<Option<CartRecord>> {
        let state = self.state.read().await;
        Ok(state
            .owners
            .get(&owner_id)
            .and_then(|id| state.carts.get(id))
            .cloned())
    }

    async fn find_by_id(&self, cart_id: CartId) -> Result<Option<CartRecord>> {
        Ok(self.state.read().await.carts.get(&cart_id).cloned())
    }

    async fn save(&self, mut cart: CartRecord, expected_version: Version) -> Result<Version> {
        let mut state = self.state.write().await;
        if state.fail_on_save {
            return Err(unavailable("cart repository"));
        }

        let actual = state
            .carts
            .get(&cart.id)
            .map_or(Version::initial(), |c| c.version);

        if actual != expected_version {
            return Err(StoreError::ConcurrencyConflict {
                cart_id: cart.id,
                expected: expected_version,
                actual,
            });
        }

        if let Some(existing) = state.owners.get(&cart.owner_id)
            && *existing != cart.id
        {
            return Err(StoreError::DuplicateOwner(cart.owner_id));
        }

        let new_version = expected_version.next();
        cart.version = new_version;
        cart.updated_at = Utc::now();

        state.owners.insert(cart.owner_id, cart.id);
        state.carts.insert(cart.id, cart);
        state.writes += 1;

        Ok(new_version)
    }

    async fn delete(&self, cart_id: CartId, expected_version: Version) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_delete {
            return Err(unavailable("cart repository"));
        }

        let actual = state
            .carts
            .get(&cart_id)
            .map_or(Version::initial(), |c| c.version);

        if actual != expected_version || actual == Version::initial() {
            return Err(StoreError::ConcurrencyConflict {
                cart_id,
                expected: expected_version,
                actual,
            });
        }

        if let Some(cart) = state.carts.remove(&cart_id) {
            state.owners.remove(&cart.owner_id);
        }
        state.writes += 1;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CartLine, Money};

    fn catalog() -> InMemoryProductCatalog {
        InMemoryProductCatalog::with_products([
            Product::new("A", "Product A", Money::from_units(10), 5),
            Product::new("B", "Product B", Money::from_units(20), 2),
        ])
    }

    #[tokio::test]
    async fn test_find_and_save_product() {
        let catalog = InMemoryProductCatalog::new();
        assert!(catalog.find_by_id(&"A".into()).await.unwrap().is_none());

        catalog
            .save(Product::new("A", "Product A", Money::from_units(10), 5))
            .await
            .unwrap();

        let product = catalog.find_by_id(&"A".into()).await.unwrap().unwrap();
        assert_eq!(product.stock, 5);
        assert_eq!(catalog.product_count().await, 1);
    }

    #[tokio::test]
    async fn test_decrement_applies_all() {
        let catalog = catalog();
        let outcome = catalog
            .decrement_stock(&[StockDecrement::new("A", 3), StockDecrement::new("B", 2)])
            .await
            .unwrap();

        assert!(outcome.is_applied());
        assert_eq!(catalog.stock_of(&"A".into()).await, Some(2));
        assert_eq!(catalog.stock_of(&"B".into()).await, Some(0));
    }

    #[tokio::test]
    async fn test_decrement_is_all_or_nothing() {
        let catalog = catalog();
        let outcome = catalog
            .decrement_stock(&[StockDecrement::new("A", 3), StockDecrement::new("B", 3)])
            .await
            .unwrap();

        match outcome {
            DecrementOutcome::Insufficient(shortfalls) => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].product_id, ProductId::new("B"));
                assert_eq!(shortfalls[0].available, 2);
            }
            DecrementOutcome::Applied => panic!("expected shortfall"),
        }
        assert_eq!(catalog.stock_of(&"A".into()).await, Some(5));
        assert_eq!(catalog.stock_of(&"B".into()).await, Some(2));
    }

    #[tokio::test]
    async fn test_decrement_missing_product_is_short() {
        let catalog = catalog();
        let outcome = catalog
            .decrement_stock(&[StockDecrement::new("Z", 1)])
            .await
            .unwrap();
        assert!(!outcome.is_applied());
    }

    #[tokio::test]
    async fn test_restock() {
        let catalog = catalog();
        catalog
            .decrement_stock(&[StockDecrement::new("A", 5)])
            .await
            .unwrap();
        catalog
            .restock(&[StockDecrement::new("A", 5)])
            .await
            .unwrap();
        assert_eq!(catalog.stock_of(&"A".into()).await, Some(5));
    }

    #[tokio::test]
    async fn test_unavailable_catalog() {
        let catalog = catalog();
        catalog.set_unavailable(true).await;
        assert!(matches!(
            catalog.find_by_id(&"A".into()).await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_save_and_find_cart() {
        let repo = InMemoryCartRepository::new();
        let owner = OwnerId::new();
        let mut cart = CartRecord::empty(owner);
        cart.lines.push(CartLine::new("A", 1));

        let version = repo.save(cart.clone(), Version::initial()).await.unwrap();
        assert_eq!(version, Version::first());

        let by_owner = repo.find_by_owner(owner).await.unwrap().unwrap();
        assert_eq!(by_owner.id, cart.id);
        assert_eq!(by_owner.version, Version::first());

        let by_id = repo.find_by_id(cart.id).await.unwrap().unwrap();
        assert_eq!(by_id.lines, cart.lines);
    }

    #[tokio::test]
    async fn test_save_with_stale_version_conflicts() {
        let repo = InMemoryCartRepository::new();
        let cart = CartRecord::empty(OwnerId::new());
        repo.save(cart.clone(), Version::initial()).await.unwrap();

        let result = repo.save(cart, Version::initial()).await;
        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_second_cart_for_owner_is_rejected() {
        let repo = InMemoryCartRepository::new();
        let owner = OwnerId::new();
        repo.save(CartRecord::empty(owner), Version::initial())
            .await
            .unwrap();

        let result = repo.save(CartRecord::empty(owner), Version::initial()).await;
        assert!(matches!(result, Err(StoreError::DuplicateOwner(_))));
        assert!(result.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_delete_cart() {
        let repo = InMemoryCartRepository::new();
        let owner = OwnerId::new();
        let cart = CartRecord::empty(owner);
        let version = repo.save(cart.clone(), Version::initial()).await.unwrap();

        repo.delete(cart.id, version).await.unwrap();

        assert!(repo.find_by_id(cart.id).await.unwrap().is_none());
        assert!(repo.find_by_owner(owner).await.unwrap().is_none());
        assert_eq!(repo.cart_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_with_stale_version_conflicts() {
        let repo = InMemoryCartRepository::new();
        let cart = CartRecord::empty(OwnerId::new());
        let v1 = repo.save(cart.clone(), Version::initial()).await.unwrap();
        repo.save(cart.clone(), v1).await.unwrap();

        let result = repo.delete(cart.id, v1).await;
        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { .. })
        ));
        assert_eq!(repo.cart_count().await, 1);
    }

    #[tokio::test]
    async fn test_fail_on_save() {
        let repo = InMemoryCartRepository::new();
        repo.set_fail_on_save(true).await;

        let result = repo
            .save(CartRecord::empty(OwnerId::new()), Version::initial())
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(repo.write_count().await, 0);
    }
}
