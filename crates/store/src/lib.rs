pub mod catalog;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod repository;

pub use catalog::{DecrementOutcome, ProductCatalog, StockDecrement, StockShortfall};
pub use common::{CartId, Money, OwnerId, ProductId};
pub use error::{Result, StoreError};
pub use memory::{InMemoryCartRepository, InMemoryProductCatalog};
pub use postgres::PostgresStore;
pub use record::{CartLine, CartRecord, Product, Version};
pub use repository::CartRepository;
