//! # Product Repository
//!
//! Database operations for the product catalog.
//!
//! ## Stock Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              in_stock is derived, never assigned                        │
//! │                                                                         │
//! │  ❌ WRONG: trust the caller's flag                                      │
//! │     UPDATE products SET stock_quantity = ?, in_stock = ?                │
//! │                                                                         │
//! │  ✅ CORRECT: recompute in the same statement                            │
//! │     UPDATE products SET stock_quantity = stock_quantity + ?,            │
//! │            in_stock = CASE WHEN stock_quantity + ? > 0                  │
//! │                            THEN 1 ELSE 0 END                            │
//! │                                                                         │
//! │  Every write path below (insert, update, adjust_stock, and the order    │
//! │  repository's decrement/restore) recomputes the flag this way, so the  │
//! │  projection can never drift from the quantity.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation is an explicit step: `insert` and `update` call
//! `validate_product` before any SQL runs - never a hook that a write path
//! might skip.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use toyshop_core::error::CoreError;
use toyshop_core::types::{Category, Product};
use toyshop_core::validation;

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let product = Product::new("Teddy bear", Category::Plush, 1499, 5);
/// repo.insert(&product).await?;
///
/// let found = repo.get_by_id(&product.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product.
    ///
    /// Validates the record first; `in_stock` is recomputed from
    /// `stock_quantity` rather than taken from the struct.
    pub async fn insert(&self, product: &Product) -> StoreResult<()> {
        validation::validate_product(product)?;

        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, category,
                price_cents, stock_quantity, in_stock,
                country, year, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.category)
        .bind(product.price_cents)
        .bind(product.stock_quantity)
        .bind(product.stock_quantity > 0)
        .bind(&product.country)
        .bind(product.year)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a product by its id.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, category,
                   price_cents, stock_quantity, in_stock,
                   country, year, created_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists all products, newest first (catalog default ordering).
    pub async fn list(&self) -> StoreResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, category,
                   price_cents, stock_quantity, in_stock,
                   country, year, created_at
            FROM products
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists products in a category, newest first.
    pub async fn list_by_category(&self, category: Category) -> StoreResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, category,
                   price_cents, stock_quantity, in_stock,
                   country, year, created_at
            FROM products
            WHERE category = ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists only products currently available for sale.
    pub async fn list_in_stock(&self) -> StoreResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, category,
                   price_cents, stock_quantity, in_stock,
                   country, year, created_at
            FROM products
            WHERE in_stock = 1
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Updates an existing product's catalog fields and stock level.
    ///
    /// Validates first; recomputes `in_stock` from the new stock level.
    /// `created_at` is immutable and not touched.
    ///
    /// ## Returns
    /// * `Err(CoreError::NotFound)` - Product doesn't exist
    pub async fn update(&self, product: &Product) -> StoreResult<()> {
        validation::validate_product(product)?;

        debug!(id = %product.id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                description = ?3,
                category = ?4,
                price_cents = ?5,
                stock_quantity = ?6,
                in_stock = ?7,
                country = ?8,
                year = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.category)
        .bind(product.price_cents)
        .bind(product.stock_quantity)
        .bind(product.stock_quantity > 0)
        .bind(&product.country)
        .bind(product.year)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Domain(CoreError::not_found(
                "Product",
                &product.id,
            )));
        }

        Ok(())
    }

    /// Adjusts a product's stock level by a delta (restock or correction).
    ///
    /// A negative delta that would drive the level below zero fails the
    /// whole operation with InsufficientStock - stock is never clamped.
    /// `in_stock` is recomputed in the same statement.
    ///
    /// ## Arguments
    /// * `id` - Product id
    /// * `delta` - Change in stock (positive for restocking, negative for
    ///   corrections)
    ///
    /// ## Returns
    /// The updated product.
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> StoreResult<Product> {
        debug!(id = %id, delta = %delta, "Adjusting stock");

        let mut tx = self.pool.begin().await?;

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, category,
                   price_cents, stock_quantity, in_stock,
                   country, year, created_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut product) = product else {
            return Err(StoreError::Domain(CoreError::not_found("Product", id)));
        };

        let new_quantity = product.stock_quantity + delta;
        if new_quantity < 0 {
            return Err(StoreError::Domain(CoreError::InsufficientStock {
                product_id: product.id,
                available: product.stock_quantity,
                requested: -delta,
            }));
        }

        sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = ?2,
                in_stock = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(new_quantity)
        .bind(new_quantity > 0)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        product.set_stock(new_quantity);
        Ok(product)
    }

    /// Deletes a product.
    ///
    /// Cart lines and order lines referencing it are removed by the
    /// schema's cascade rules.
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Domain(CoreError::not_found("Product", id)));
        }

        Ok(())
    }

    /// Counts products (for diagnostics and the seed binary).
    pub async fn count(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use toyshop_core::{CoreError, ValidationError};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn plush(name: &str, price_cents: i64, stock: i64) -> Product {
        Product::new(name, Category::Plush, price_cents, stock)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = test_db().await;
        let product = plush("Teddy bear", 1499, 5);

        db.products().insert(&product).await.unwrap();

        let found = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Teddy bear");
        assert_eq!(found.price_cents, 1499);
        assert_eq!(found.stock_quantity, 5);
        assert!(found.in_stock);
        assert_eq!(found.category, Category::Plush);
    }

    #[tokio::test]
    async fn test_insert_recomputes_in_stock() {
        let db = test_db().await;

        // Lie about the flag on the way in; the write path must not trust it.
        let mut product = plush("Bunny", 1199, 0);
        product.in_stock = true;

        db.products().insert(&product).await.unwrap();

        let found = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert!(!found.in_stock);
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid_product() {
        let db = test_db().await;

        let mut product = plush("", 1499, 5);
        let err = db.products().insert(&product).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(CoreError::Validation(ValidationError::Required { .. }))
        ));

        product.name = "Teddy bear".to_string();
        product.price_cents = -1;
        let err = db.products().insert(&product).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
    }

    #[tokio::test]
    async fn test_list_by_category() {
        let db = test_db().await;

        db.products().insert(&plush("Teddy bear", 1499, 5)).await.unwrap();
        db.products()
            .insert(&Product::new("Wooden blocks", Category::Educational, 899, 10))
            .await
            .unwrap();

        let plush_toys = db.products().list_by_category(Category::Plush).await.unwrap();
        assert_eq!(plush_toys.len(), 1);
        assert_eq!(plush_toys[0].name, "Teddy bear");

        assert_eq!(db.products().list().await.unwrap().len(), 2);
        assert_eq!(db.products().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_list_in_stock_excludes_sold_out() {
        let db = test_db().await;

        db.products().insert(&plush("Available", 1000, 3)).await.unwrap();
        db.products().insert(&plush("Sold out", 1000, 0)).await.unwrap();

        let available = db.products().list_in_stock().await.unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].name, "Available");
    }

    #[tokio::test]
    async fn test_update_recomputes_in_stock() {
        let db = test_db().await;
        let mut product = plush("Teddy bear", 1499, 5);
        db.products().insert(&product).await.unwrap();

        product.set_stock(0);
        product.price_cents = 1299;
        db.products().update(&product).await.unwrap();

        let found = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(found.price_cents, 1299);
        assert_eq!(found.stock_quantity, 0);
        assert!(!found.in_stock);
    }

    #[tokio::test]
    async fn test_update_missing_product() {
        let db = test_db().await;
        let product = plush("Ghost", 1000, 1);

        let err = db.products().update(&product).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(CoreError::NotFound { entity: "Product", .. })
        ));
    }

    #[tokio::test]
    async fn test_adjust_stock_restock() {
        let db = test_db().await;
        let product = plush("Teddy bear", 1499, 0);
        db.products().insert(&product).await.unwrap();

        let updated = db.products().adjust_stock(&product.id, 7).await.unwrap();
        assert_eq!(updated.stock_quantity, 7);
        assert!(updated.in_stock);

        let found = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(found.stock_quantity, 7);
        assert!(found.in_stock);
    }

    #[tokio::test]
    async fn test_adjust_stock_never_goes_negative() {
        let db = test_db().await;
        let product = plush("Teddy bear", 1499, 3);
        db.products().insert(&product).await.unwrap();

        let err = db.products().adjust_stock(&product.id, -5).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(CoreError::InsufficientStock {
                available: 3,
                requested: 5,
                ..
            })
        ));

        // Whole operation rejected: stock unchanged.
        let found = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(found.stock_quantity, 3);
        assert!(found.in_stock);
    }

    #[tokio::test]
    async fn test_delete() {
        let db = test_db().await;
        let product = plush("Teddy bear", 1499, 5);
        db.products().insert(&product).await.unwrap();

        db.products().delete(&product.id).await.unwrap();
        assert!(db.products().get_by_id(&product.id).await.unwrap().is_none());

        let err = db.products().delete(&product.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(CoreError::NotFound { .. })));
    }
}
