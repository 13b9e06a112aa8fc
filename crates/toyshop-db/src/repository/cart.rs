//! # Cart Repository
//!
//! Database operations for per-user shopping carts.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Storefront Action        Repository Call          State Change         │
//! │  ─────────────────        ───────────────          ────────────         │
//! │                                                                         │
//! │  Click "Add" ────────────► add_item() ───────────► line qty += 1        │
//! │                              (bounded by the product's stock level)     │
//! │                                                                         │
//! │  Click "-" ──────────────► decrement_item() ─────► qty -= 1, or the     │
//! │                                                    line is deleted      │
//! │                                                                         │
//! │  Click "Remove" ─────────► remove_item() ────────► line deleted         │
//! │                                                                         │
//! │  View cart ──────────────► get_cart() ───────────► (read only, joined   │
//! │                                                     with live prices)   │
//! │                                                                         │
//! │  The cart row is created lazily on first access and survives checkout; │
//! │  placing an order deletes the lines, not the cart.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation runs in one transaction: the stock check, the line write
//! and the totals read see a consistent snapshot, and a failure leaves the
//! cart untouched.
//!
//! Cart lines deliberately carry no price snapshot - the cart always prices
//! against the live catalog (only placed orders freeze prices).

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use toyshop_core::error::{CoreError, ValidationError};
use toyshop_core::types::{Cart, CartItem, CartTotals, Product};
use toyshop_core::{validation, MAX_CART_ITEMS};

/// One line of a cart view: the stored quantity joined with the product's
/// current name and price.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct CartLine {
    pub product_id: String,
    pub name: String,
    /// Current catalog price (not a snapshot).
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
}

/// A full cart read: lines plus aggregates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CartView {
    pub cart_id: String,
    pub lines: Vec<CartLine>,
    pub totals: CartTotals,
}

/// Result of a cart mutation: the affected line's new quantity (0 when the
/// line was deleted) and the cart's new total quantity.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CartUpdate {
    pub item_quantity: i64,
    pub total_quantity: i64,
}

/// Repository for cart database operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Adds one unit of a product to the user's cart.
    ///
    /// ## Behavior
    /// - Product missing or out of stock => NotFound
    /// - No line for the product yet => line created with quantity 1
    /// - Line exists => quantity += 1, unless that would exceed the
    ///   product's stock level => InsufficientStock
    /// - The user's cart is created lazily if absent
    pub async fn add_item(&self, user_id: &str, product_id: &str) -> StoreResult<CartUpdate> {
        validation::require_user(user_id)?;

        debug!(user_id = %user_id, product_id = %product_id, "Adding cart item");

        let mut tx = self.pool.begin().await?;

        let product = fetch_product(&mut tx, product_id).await?;
        let Some(product) = product else {
            return Err(StoreError::Domain(CoreError::not_found(
                "Product", product_id,
            )));
        };
        if !product.in_stock {
            // Sold-out products are not offered for adding; treat as absent.
            return Err(StoreError::Domain(CoreError::not_found(
                "Product", product_id,
            )));
        }

        let cart = get_or_create_cart(&mut tx, user_id).await?;

        let existing = sqlx::query_as::<_, CartItem>(
            r#"
            SELECT id, cart_id, product_id, quantity, added_at
            FROM cart_items
            WHERE cart_id = ?1 AND product_id = ?2
            "#,
        )
        .bind(&cart.id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;

        let item_quantity = match existing {
            None => {
                let line_count: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE cart_id = ?1")
                        .bind(&cart.id)
                        .fetch_one(&mut *tx)
                        .await?;
                if line_count >= MAX_CART_ITEMS {
                    return Err(StoreError::Domain(CoreError::Validation(
                        ValidationError::OutOfRange {
                            field: "cart items".to_string(),
                            min: 0,
                            max: MAX_CART_ITEMS,
                        },
                    )));
                }

                sqlx::query(
                    r#"
                    INSERT INTO cart_items (id, cart_id, product_id, quantity, added_at)
                    VALUES (?1, ?2, ?3, 1, ?4)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&cart.id)
                .bind(product_id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;

                1
            }
            Some(item) => {
                let requested = item.quantity + 1;
                validation::validate_quantity(requested)?;

                if requested > product.stock_quantity {
                    return Err(StoreError::Domain(CoreError::InsufficientStock {
                        product_id: product.id,
                        available: product.stock_quantity,
                        requested,
                    }));
                }

                sqlx::query("UPDATE cart_items SET quantity = quantity + 1 WHERE id = ?1")
                    .bind(&item.id)
                    .execute(&mut *tx)
                    .await?;

                requested
            }
        };

        touch_cart(&mut tx, &cart.id).await?;
        let total_quantity = cart_total_quantity(&mut tx, &cart.id).await?;

        tx.commit().await?;

        Ok(CartUpdate {
            item_quantity,
            total_quantity,
        })
    }

    /// Removes one unit of a product from the user's cart.
    ///
    /// ## Behavior
    /// - No matching line => NotFound
    /// - Quantity > 1 => quantity -= 1
    /// - Quantity == 1 => the line is deleted (item_quantity 0 in the result)
    pub async fn decrement_item(&self, user_id: &str, product_id: &str) -> StoreResult<CartUpdate> {
        validation::require_user(user_id)?;

        debug!(user_id = %user_id, product_id = %product_id, "Decrementing cart item");

        let mut tx = self.pool.begin().await?;

        let Some((cart, item)) = fetch_cart_line(&mut tx, user_id, product_id).await? else {
            return Err(StoreError::Domain(CoreError::not_found(
                "Cart item",
                product_id,
            )));
        };

        let item_quantity = if item.quantity > 1 {
            sqlx::query("UPDATE cart_items SET quantity = quantity - 1 WHERE id = ?1")
                .bind(&item.id)
                .execute(&mut *tx)
                .await?;
            item.quantity - 1
        } else {
            sqlx::query("DELETE FROM cart_items WHERE id = ?1")
                .bind(&item.id)
                .execute(&mut *tx)
                .await?;
            0
        };

        touch_cart(&mut tx, &cart.id).await?;
        let total_quantity = cart_total_quantity(&mut tx, &cart.id).await?;

        tx.commit().await?;

        Ok(CartUpdate {
            item_quantity,
            total_quantity,
        })
    }

    /// Removes a product's line from the cart entirely, whatever its
    /// quantity.
    ///
    /// ## Returns
    /// The cart's new total quantity. NotFound if there was no line.
    pub async fn remove_item(&self, user_id: &str, product_id: &str) -> StoreResult<i64> {
        validation::require_user(user_id)?;

        debug!(user_id = %user_id, product_id = %product_id, "Removing cart item");

        let mut tx = self.pool.begin().await?;

        let Some((cart, item)) = fetch_cart_line(&mut tx, user_id, product_id).await? else {
            return Err(StoreError::Domain(CoreError::not_found(
                "Cart item",
                product_id,
            )));
        };

        sqlx::query("DELETE FROM cart_items WHERE id = ?1")
            .bind(&item.id)
            .execute(&mut *tx)
            .await?;

        touch_cart(&mut tx, &cart.id).await?;
        let total_quantity = cart_total_quantity(&mut tx, &cart.id).await?;

        tx.commit().await?;

        Ok(total_quantity)
    }

    /// Reads the user's cart: lines joined with current product data, plus
    /// totals. Creates the (empty) cart lazily on first access.
    ///
    /// Total price sums `quantity × current price` - before checkout the
    /// cart always reflects today's catalog, not yesterday's.
    pub async fn get_cart(&self, user_id: &str) -> StoreResult<CartView> {
        validation::require_user(user_id)?;

        let mut tx = self.pool.begin().await?;

        let cart = get_or_create_cart(&mut tx, user_id).await?;

        let lines = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT ci.product_id,
                   p.name,
                   p.price_cents AS unit_price_cents,
                   ci.quantity,
                   ci.quantity * p.price_cents AS line_total_cents
            FROM cart_items ci
            INNER JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = ?1
            ORDER BY ci.added_at
            "#,
        )
        .bind(&cart.id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let totals = CartTotals {
            item_count: lines.len() as i64,
            total_quantity: lines.iter().map(|l| l.quantity).sum(),
            total_price_cents: lines.iter().map(|l| l.line_total_cents).sum(),
        };

        Ok(CartView {
            cart_id: cart.id,
            lines,
            totals,
        })
    }
}

// =============================================================================
// Transaction-Scoped Helpers
// =============================================================================

/// Fetches a product inside the current transaction.
async fn fetch_product(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        r#"
        SELECT id, name, description, category,
               price_cents, stock_quantity, in_stock,
               country, year, created_at
        FROM products
        WHERE id = ?1
        "#,
    )
    .bind(product_id)
    .fetch_optional(conn)
    .await
}

/// Gets the user's cart, creating it if this is the first access.
async fn get_or_create_cart(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Cart, sqlx::Error> {
    let existing = sqlx::query_as::<_, Cart>(
        "SELECT id, user_id, created_at, updated_at FROM carts WHERE user_id = ?1",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(cart) = existing {
        return Ok(cart);
    }

    let now = Utc::now();
    let cart = Cart {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        created_at: now,
        updated_at: now,
    };

    debug!(user_id = %user_id, cart_id = %cart.id, "Creating cart");

    sqlx::query("INSERT INTO carts (id, user_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)")
        .bind(&cart.id)
        .bind(&cart.user_id)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(conn)
        .await?;

    Ok(cart)
}

/// Looks up the user's cart and its line for a product, if both exist.
async fn fetch_cart_line(
    conn: &mut SqliteConnection,
    user_id: &str,
    product_id: &str,
) -> Result<Option<(Cart, CartItem)>, sqlx::Error> {
    let cart = sqlx::query_as::<_, Cart>(
        "SELECT id, user_id, created_at, updated_at FROM carts WHERE user_id = ?1",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(cart) = cart else {
        return Ok(None);
    };

    let item = sqlx::query_as::<_, CartItem>(
        r#"
        SELECT id, cart_id, product_id, quantity, added_at
        FROM cart_items
        WHERE cart_id = ?1 AND product_id = ?2
        "#,
    )
    .bind(&cart.id)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;

    Ok(item.map(|item| (cart, item)))
}

/// Sums line quantities for a cart.
async fn cart_total_quantity(
    conn: &mut SqliteConnection,
    cart_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COALESCE(SUM(quantity), 0) FROM cart_items WHERE cart_id = ?1")
        .bind(cart_id)
        .fetch_one(conn)
        .await
}

/// Bumps the cart's updated_at.
async fn touch_cart(conn: &mut SqliteConnection, cart_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE carts SET updated_at = ?2 WHERE id = ?1")
        .bind(cart_id)
        .bind(Utc::now())
        .execute(conn)
        .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use toyshop_core::types::Category;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, name: &str, price_cents: i64, stock: i64) -> Product {
        let product = Product::new(name, Category::Plush, price_cents, stock);
        db.products().insert(&product).await.unwrap();
        product
    }

    #[tokio::test]
    async fn test_add_item_creates_line_with_quantity_one() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Teddy bear", 1499, 5).await;

        let update = db.carts().add_item("user-1", &p1.id).await.unwrap();
        assert_eq!(update.item_quantity, 1);
        assert_eq!(update.total_quantity, 1);

        let view = db.carts().get_cart("user-1").await.unwrap();
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].quantity, 1);
        assert_eq!(view.totals.total_quantity, 1);
    }

    #[tokio::test]
    async fn test_repeat_add_increments_quantity() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Teddy bear", 1499, 5).await;

        db.carts().add_item("user-1", &p1.id).await.unwrap();
        let update = db.carts().add_item("user-1", &p1.id).await.unwrap();

        assert_eq!(update.item_quantity, 2);
        assert_eq!(update.total_quantity, 2);

        // Still one line, not two.
        let view = db.carts().get_cart("user-1").await.unwrap();
        assert_eq!(view.totals.item_count, 1);
    }

    #[tokio::test]
    async fn test_add_item_bounded_by_stock() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Teddy bear", 1499, 5).await;

        for _ in 0..5 {
            db.carts().add_item("user-1", &p1.id).await.unwrap();
        }

        // Sixth unit exceeds the 5 in stock.
        let err = db.carts().add_item("user-1", &p1.id).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(CoreError::InsufficientStock {
                available: 5,
                requested: 6,
                ..
            })
        ));

        // Quantity unchanged after the refused add.
        let view = db.carts().get_cart("user-1").await.unwrap();
        assert_eq!(view.lines[0].quantity, 5);
    }

    #[tokio::test]
    async fn test_add_unknown_or_sold_out_product() {
        let db = test_db().await;
        let sold_out = seed_product(&db, "Sold out", 1000, 0).await;

        let err = db.carts().add_item("user-1", "no-such-id").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(CoreError::NotFound { entity: "Product", .. })
        ));

        let err = db.carts().add_item("user-1", &sold_out.id).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(CoreError::NotFound { entity: "Product", .. })
        ));
    }

    #[tokio::test]
    async fn test_decrement_item() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Teddy bear", 1499, 5).await;

        db.carts().add_item("user-1", &p1.id).await.unwrap();
        db.carts().add_item("user-1", &p1.id).await.unwrap();

        let update = db.carts().decrement_item("user-1", &p1.id).await.unwrap();
        assert_eq!(update.item_quantity, 1);
        assert_eq!(update.total_quantity, 1);

        // Decrementing a 1-unit line deletes it.
        let update = db.carts().decrement_item("user-1", &p1.id).await.unwrap();
        assert_eq!(update.item_quantity, 0);
        assert_eq!(update.total_quantity, 0);

        let err = db.carts().decrement_item("user-1", &p1.id).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(CoreError::NotFound { entity: "Cart item", .. })
        ));
    }

    #[tokio::test]
    async fn test_remove_item() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Teddy bear", 1499, 5).await;
        let p2 = seed_product(&db, "Bunny", 1199, 5).await;

        for _ in 0..3 {
            db.carts().add_item("user-1", &p1.id).await.unwrap();
        }
        db.carts().add_item("user-1", &p2.id).await.unwrap();

        let total = db.carts().remove_item("user-1", &p1.id).await.unwrap();
        assert_eq!(total, 1);

        let err = db.carts().remove_item("user-1", &p1.id).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(CoreError::NotFound { entity: "Cart item", .. })
        ));
    }

    #[tokio::test]
    async fn test_cart_totals_use_current_price() {
        let db = test_db().await;
        let mut p1 = seed_product(&db, "Teddy bear", 1000, 5).await;

        db.carts().add_item("user-1", &p1.id).await.unwrap();
        db.carts().add_item("user-1", &p1.id).await.unwrap();

        let view = db.carts().get_cart("user-1").await.unwrap();
        assert_eq!(view.totals.total_price_cents, 2000);

        // Catalog price change is reflected immediately - no snapshot
        // before the order is placed.
        p1.price_cents = 1500;
        db.products().update(&p1).await.unwrap();

        let view = db.carts().get_cart("user-1").await.unwrap();
        assert_eq!(view.totals.total_price_cents, 3000);
        assert_eq!(view.totals.total_price().to_string(), "30.00");
    }

    #[tokio::test]
    async fn test_carts_are_per_user_and_lazy() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Teddy bear", 1499, 5).await;

        let view_a = db.carts().get_cart("user-a").await.unwrap();
        assert!(view_a.lines.is_empty());

        db.carts().add_item("user-b", &p1.id).await.unwrap();

        // user-a's lazily created cart is untouched by user-b's shopping.
        let view_a = db.carts().get_cart("user-a").await.unwrap();
        assert_eq!(view_a.totals.total_quantity, 0);

        // Repeated access reuses the same cart row.
        let again = db.carts().get_cart("user-a").await.unwrap();
        assert_eq!(view_a.cart_id, again.cart_id);
    }

    #[tokio::test]
    async fn test_operations_require_identity() {
        let db = test_db().await;

        let err = db.carts().add_item("", "p-1").await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(CoreError::Unauthorized)));

        let err = db.carts().get_cart("  ").await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(CoreError::Unauthorized)));
    }
}
