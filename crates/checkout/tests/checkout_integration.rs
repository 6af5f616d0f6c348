//! Integration tests for checkout.
//!
//! These tests drive carts through CartService and then check them out,
//! verifying stock, cart lifecycle and behavior under concurrent checkouts.

use std::sync::Arc;

use checkout::{CheckoutCoordinator, CheckoutError, CheckoutOutcome, CheckoutState};
use common::{CartId, Money, OwnerId, ProductId};
use domain::{CartError, CartLocks, CartService, LineRequest};
use store::{InMemoryCartRepository, InMemoryProductCatalog, Product, ProductCatalog};

type TestService = CartService<InMemoryProductCatalog, InMemoryCartRepository>;
type TestCoordinator = CheckoutCoordinator<InMemoryProductCatalog, InMemoryCartRepository>;

struct TestHarness {
    service: TestService,
    coordinator: TestCoordinator,
    catalog: InMemoryProductCatalog,
    carts: InMemoryCartRepository,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_products([
            Product::new("A", "Widget A", Money::from_units(10), 5),
            Product::new("B", "Widget B", Money::from_units(20), 2),
        ])
    }

    fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let catalog = InMemoryProductCatalog::with_products(products);
        let carts = InMemoryCartRepository::new();
        let locks = CartLocks::new();

        let service = CartService::new(catalog.clone(), carts.clone()).with_locks(locks.clone());
        let coordinator = CheckoutCoordinator::new(catalog.clone(), carts.clone()).with_locks(locks);

        Self {
            service,
            coordinator,
            catalog,
            carts,
        }
    }

    async fn stock(&self, product_id: &str) -> u32 {
        self.catalog
            .stock_of(&ProductId::new(product_id))
            .await
            .unwrap()
    }

    async fn set_stock(&self, product_id: &str, stock: u32) {
        let mut product = self
            .catalog
            .find_by_id(&ProductId::new(product_id))
            .await
            .unwrap()
            .unwrap();
        product.stock = stock;
        self.catalog.save(product).await.unwrap();
    }
}

#[tokio::test]
async fn test_end_to_end_add_remove_checkout() {
    let h = TestHarness::new();
    let owner = OwnerId::new();

    // Add A:2
    let cart = h
        .service
        .add_lines(owner, vec![LineRequest::new("A", 2)])
        .await
        .unwrap();
    assert_eq!(cart.quantity_of(&"A".into()), 2);
    assert_eq!(cart.total(), Money::from_units(20));

    // Add A:4 exceeds stock 5
    let result = h
        .service
        .add_lines(owner, vec![LineRequest::new("A", 4)])
        .await;
    assert!(matches!(result, Err(CartError::InsufficientStock { .. })));

    // Add A:1 more
    let cart = h
        .service
        .add_lines(owner, vec![LineRequest::new("A", 1)])
        .await
        .unwrap();
    assert_eq!(cart.quantity_of(&"A".into()), 3);
    assert_eq!(cart.total(), Money::from_units(30));

    // Checkout
    let outcome = h.coordinator.checkout(cart.id()).await.unwrap();
    match &outcome {
        CheckoutOutcome::Completed(receipt) => {
            assert_eq!(receipt.owner_id, owner);
            assert_eq!(receipt.total, Money::from_units(30));
            assert_eq!(receipt.lines.len(), 1);
        }
        other => panic!("expected Completed, got {other:?}"),
    }
    assert_eq!(h.stock("A").await, 2);
    assert!(h.service.get_cart(owner).await.unwrap().is_none());

    // The cart is gone
    let result = h
        .service
        .remove_lines(owner, vec![LineRequest::new("A", 1)])
        .await;
    assert!(matches!(result, Err(CartError::CartNotFound(_))));
}

#[tokio::test]
async fn test_rejection_changes_nothing() {
    let h = TestHarness::with_products([
        Product::new("A", "Widget A", Money::from_units(10), 5),
        Product::new("B", "Widget B", Money::from_units(20), 3),
    ]);
    let owner = OwnerId::new();
    let cart = h
        .service
        .add_lines(owner, vec![LineRequest::new("A", 3), LineRequest::new("B", 3)])
        .await
        .unwrap();

    // Stock for B drops after it was added
    h.set_stock("B", 2).await;

    let outcome = h.coordinator.checkout(cart.id()).await.unwrap();

    assert_eq!(outcome.state(), CheckoutState::RejectedInsufficientStock);
    let short: Vec<(&str, &str)> = outcome
        .short_lines()
        .iter()
        .map(|l| (l.product_id.as_str(), l.product_name.as_str()))
        .collect();
    assert_eq!(short, vec![("B", "Widget B")]);

    assert_eq!(h.stock("A").await, 5);
    assert_eq!(h.stock("B").await, 2);

    let stored = h.service.get_cart(owner).await.unwrap().unwrap();
    assert_eq!(stored.lines(), cart.lines());
    assert_eq!(stored.total(), Money::from_units(90));
    assert_eq!(stored.version(), cart.version());
}

#[tokio::test]
async fn test_rejection_lists_every_short_line() {
    let h = TestHarness::new();
    let cart = h
        .service
        .add_lines(
            OwnerId::new(),
            vec![LineRequest::new("B", 2), LineRequest::new("A", 5)],
        )
        .await
        .unwrap();

    h.set_stock("A", 1).await;
    h.set_stock("B", 0).await;

    let outcome = h.coordinator.checkout(cart.id()).await.unwrap();

    let ids: Vec<&str> = outcome
        .short_lines()
        .iter()
        .map(|l| l.product_id.as_str())
        .collect();
    assert_eq!(ids, vec!["B", "A"]);
}

#[tokio::test]
async fn test_checkout_of_exact_stock_drains_it() {
    let h = TestHarness::new();
    let cart = h
        .service
        .add_lines(OwnerId::new(), vec![LineRequest::new("B", 2)])
        .await
        .unwrap();

    let outcome = h.coordinator.checkout(cart.id()).await.unwrap();

    assert!(outcome.is_completed());
    assert_eq!(h.stock("B").await, 0);
}

#[tokio::test]
async fn test_empty_cart_checks_out() {
    let h = TestHarness::new();
    let owner = OwnerId::new();
    h.service
        .add_lines(owner, vec![LineRequest::new("A", 1)])
        .await
        .unwrap();
    let cart = h
        .service
        .remove_lines(owner, vec![LineRequest::new("A", 1)])
        .await
        .unwrap();
    assert!(cart.is_empty());

    let outcome = h.coordinator.checkout(cart.id()).await.unwrap();

    assert!(outcome.is_completed());
    assert_eq!(h.stock("A").await, 5);
    assert_eq!(h.carts.cart_count().await, 0);
}

#[tokio::test]
async fn test_second_checkout_of_same_cart_fails() {
    let h = TestHarness::new();
    let cart = h
        .service
        .add_lines(OwnerId::new(), vec![LineRequest::new("A", 1)])
        .await
        .unwrap();

    h.coordinator.checkout(cart.id()).await.unwrap();
    let result = h.coordinator.checkout(cart.id()).await;

    assert!(matches!(result, Err(CheckoutError::CartNotFound(_))));
    assert_eq!(h.stock("A").await, 4);
}

#[tokio::test]
async fn test_unknown_cart_is_not_found() {
    let h = TestHarness::new();
    let result = h.coordinator.checkout(CartId::new()).await;
    assert!(matches!(result, Err(CheckoutError::CartNotFound(_))));
}

#[tokio::test]
async fn test_catalog_outage_fails_checkout() {
    let h = TestHarness::new();
    let cart = h
        .service
        .add_lines(OwnerId::new(), vec![LineRequest::new("A", 1)])
        .await
        .unwrap();
    h.catalog.set_unavailable(true).await;

    let result = h.coordinator.checkout(cart.id()).await;

    assert!(matches!(result, Err(CheckoutError::StoreUnavailable(_))));
    h.catalog.set_unavailable(false).await;
    assert_eq!(h.stock("A").await, 5);
    assert_eq!(h.carts.cart_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_never_oversell() {
    let h = Arc::new(TestHarness::new());

    // Five owners each hold 2 units of A (stock 5): at most two can complete
    let mut cart_ids = Vec::new();
    for _ in 0..5 {
        let cart = h
            .service
            .add_lines(OwnerId::new(), vec![LineRequest::new("A", 2)])
            .await
            .unwrap();
        cart_ids.push(cart.id());
    }

    let handles: Vec<_> = cart_ids
        .into_iter()
        .map(|cart_id| {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.coordinator.checkout(cart_id).await })
        })
        .collect();

    let mut completed = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            CheckoutOutcome::Completed(_) => completed += 1,
            CheckoutOutcome::RejectedInsufficientStock { short_lines, .. } => {
                assert_eq!(short_lines[0].product_id, ProductId::new("A"));
                rejected += 1;
            }
        }
    }

    assert_eq!(completed, 2);
    assert_eq!(rejected, 3);
    assert_eq!(h.stock("A").await, 1);
    assert_eq!(h.carts.cart_count().await, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_add_and_checkout_for_same_owner_are_serialized() {
    let h = Arc::new(TestHarness::new());
    let owner = OwnerId::new();
    let cart = h
        .service
        .add_lines(owner, vec![LineRequest::new("A", 2)])
        .await
        .unwrap();

    let adder = {
        let h = Arc::clone(&h);
        tokio::spawn(async move {
            h.service
                .add_lines(owner, vec![LineRequest::new("A", 1)])
                .await
        })
    };
    let cart_id = cart.id();
    let checkout = {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.coordinator.checkout(cart_id).await })
    };

    let added = adder.await.unwrap().unwrap();
    let outcome = checkout.await.unwrap().unwrap();
    let CheckoutOutcome::Completed(receipt) = outcome else {
        panic!("expected Completed");
    };

    if added.id() == cart.id() {
        // The add landed first and was checked out with the cart
        assert_eq!(receipt.lines[0].quantity, 3);
        assert_eq!(h.stock("A").await, 2);
        assert!(h.service.get_cart(owner).await.unwrap().is_none());
    } else {
        // Checkout went first; the add created a fresh cart
        assert_eq!(receipt.lines[0].quantity, 2);
        assert_eq!(h.stock("A").await, 3);
        let fresh = h.service.get_cart(owner).await.unwrap().unwrap();
        assert_eq!(fresh.quantity_of(&"A".into()), 1);
    }
}
