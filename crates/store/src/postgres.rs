use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CartId, CartLine, CartRecord, Money, OwnerId, Product, ProductId, Result, StoreError, Version,
    catalog::{
        DecrementOutcome, ProductCatalog, StockDecrement, StockShortfall, merge_decrements,
        validate_product,
    },
    repository::CartRepository,
};

/// PostgreSQL-backed product catalog and cart repository.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: to_u32(row.try_get("stock")?)?,
        })
    }

    async fn load_cart(&self, row: Option<PgRow>) -> Result<Option<CartRecord>> {
        let Some(row) = row else {
            return Ok(None);
        };

        let cart_id: Uuid = row.try_get("id")?;
        let lines = sqlx::query(
            r#"
            SELECT product_id, quantity
            FROM cart_lines
            WHERE cart_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|line| -> Result<CartLine> {
            Ok(CartLine {
                product_id: ProductId::new(line.try_get::<String, _>("product_id")?),
                quantity: to_u32(line.try_get("quantity")?)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

        Ok(Some(CartRecord {
            id: CartId::from_uuid(cart_id),
            owner_id: OwnerId::from_uuid(row.try_get::<Uuid, _>("owner_id")?),
            lines,
            total: Money::from_cents(row.try_get("total_cents")?),
            version: Version::new(row.try_get("version")?),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        }))
    }

    async fn current_version(
        tx: &mut Transaction<'_, Postgres>,
        cart_id: CartId,
    ) -> Result<Version> {
        let version: Option<i64> = sqlx::query_scalar("SELECT version FROM carts WHERE id = $1")
            .bind(cart_id.as_uuid())
            .fetch_optional(&mut **tx)
            .await?;
        Ok(Version::new(version.unwrap_or(0)))
    }
}

fn to_u32(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))
}

#[async_trait]
impl ProductCatalog for PostgresStore {
    async fn find_by_id(&self, product_id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, price_cents, stock FROM products WHERE id = $1")
            .bind(product_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn save(&self, product: Product) -> Result<()> {
        validate_product(&product)?;

        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, price_cents = EXCLUDED.price_cents, stock = EXCLUDED.stock
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(i64::from(product.stock))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn decrement_stock(&self, decrements: &[StockDecrement]) -> Result<DecrementOutcome> {
        let mut decrements = merge_decrements(decrements);
        // Lock rows in a stable order so concurrent checkouts cannot deadlock
        decrements.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        let mut tx = self.pool.begin().await?;
        let mut shortfalls = Vec::new();

        for d in &decrements {
            let updated = sqlx::query(
                "UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2",
            )
            .bind(d.product_id.as_str())
            .bind(i64::from(d.quantity))
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if updated == 0 {
                let stock: Option<i64> =
                    sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                        .bind(d.product_id.as_str())
                        .fetch_optional(&mut *tx)
                        .await?;
                shortfalls.push(StockShortfall {
                    product_id: d.product_id.clone(),
                    requested: d.quantity,
                    available: to_u32(stock.unwrap_or(0))?,
                });
            }
        }

        if shortfalls.is_empty() {
            tx.commit().await?;
            Ok(DecrementOutcome::Applied)
        } else {
            tx.rollback().await?;
            tracing::debug!(shortfalls = shortfalls.len(), "stock decrement rolled back");
            Ok(DecrementOutcome::Insufficient(shortfalls))
        }
    }

    async fn restock(&self, decrements: &[StockDecrement]) -> Result<()> {
        let mut decrements = merge_decrements(decrements);
        decrements.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        let mut tx = self.pool.begin().await?;
        for d in &decrements {
            sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1")
                .bind(d.product_id.as_str())
                .bind(i64::from(d.quantity))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        metrics::counter!("stock_restocks_total").increment(1);
        tracing::info!(products = decrements.len(), "stock returned to catalog");
        Ok(())
    }
}

#[async_trait]
impl CartRepository for PostgresStore {
    async fn find_by_owner(&self, owner_id: OwnerId) -> Result<Option<CartRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, total_cents, version, created_at, updated_at
            FROM carts
            WHERE owner_id = $1
            "#,
        )
        .bind(owner_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        self.load_cart(row).await
    }

    async fn find_by_id(&self, cart_id: CartId) -> Result<Option<CartRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, total_cents, version, created_at, updated_at
            FROM carts
            WHERE id = $1
            "#,
        )
        .bind(cart_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        self.load_cart(row).await
    }

    async fn save(&self, cart: CartRecord, expected_version: Version) -> Result<Version> {
        let new_version = expected_version.next();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let actual = Self::current_version(&mut tx, cart.id).await?;
        if actual != expected_version {
            return Err(StoreError::ConcurrencyConflict {
                cart_id: cart.id,
                expected: expected_version,
                actual,
            });
        }

        if expected_version == Version::initial() {
            sqlx::query(
                r#"
                INSERT INTO carts (id, owner_id, total_cents, version, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(cart.id.as_uuid())
            .bind(cart.owner_id.as_uuid())
            .bind(cart.total.cents())
            .bind(new_version.as_i64())
            .bind(cart.created_at)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e {
                    match db_err.constraint() {
                        Some("unique_cart_owner") => {
                            return StoreError::DuplicateOwner(cart.owner_id);
                        }
                        Some("carts_pkey") => {
                            return StoreError::ConcurrencyConflict {
                                cart_id: cart.id,
                                expected: expected_version,
                                actual: Version::first(),
                            };
                        }
                        _ => {}
                    }
                }
                StoreError::Database(e)
            })?;
        } else {
            let updated = sqlx::query(
                r#"
                UPDATE carts
                SET total_cents = $2, version = $3, updated_at = $4
                WHERE id = $1 AND version = $5
                "#,
            )
            .bind(cart.id.as_uuid())
            .bind(cart.total.cents())
            .bind(new_version.as_i64())
            .bind(now)
            .bind(expected_version.as_i64())
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if updated == 0 {
                let actual = Self::current_version(&mut tx, cart.id).await?;
                return Err(StoreError::ConcurrencyConflict {
                    cart_id: cart.id,
                    expected: expected_version,
                    actual,
                });
            }

            sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1")
                .bind(cart.id.as_uuid())
                .execute(&mut *tx)
                .await?;
        }

        for (position, line) in cart.lines.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|e| StoreError::Database(sqlx::Error::Encode(Box::new(e))))?;
            sqlx::query(
                r#"
                INSERT INTO cart_lines (cart_id, product_id, quantity, position)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(cart.id.as_uuid())
            .bind(line.product_id.as_str())
            .bind(i64::from(line.quantity))
            .bind(position)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(new_version)
    }

    async fn delete(&self, cart_id: CartId, expected_version: Version) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM carts WHERE id = $1 AND version = $2")
            .bind(cart_id.as_uuid())
            .bind(expected_version.as_i64())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            let actual = Self::current_version(&mut tx, cart_id).await?;
            return Err(StoreError::ConcurrencyConflict {
                cart_id,
                expected: expected_version,
                actual,
            });
        }

        tx.commit().await?;
        Ok(())
    }
}
