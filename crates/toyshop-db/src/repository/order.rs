//! # Order Repository
//!
//! Database operations for orders and their line items.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. PLACE (buyer)                                                      │
//! │     └── place_order() → Order { status: Pending }                      │
//! │         One transaction: re-validate stock, freeze the total, copy     │
//! │         cart lines to OrderItems with price-at-purchase, decrement     │
//! │         stock, clear the cart. All or nothing.                         │
//! │                                                                         │
//! │  2. CONFIRM (admin)                                                    │
//! │     └── confirm_order() → Pending → Processing (no stock effect)       │
//! │                                                                         │
//! │  3. COMPLETE (admin)                                                   │
//! │     └── complete_order() → Processing → Completed (no stock effect)    │
//! │                                                                         │
//! │  X. CANCEL                                                             │
//! │     └── cancel_order()        buyer, Pending only                      │
//! │     └── admin_cancel_order()  admin, Pending or Processing             │
//! │     └── bulk_cancel()         admin, Pending orders in the batch       │
//! │         Cancellation returns every line's quantity to stock.           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! OrderItems copy the product price at placement. Later catalog price
//! changes never rewrite history; cancelling restores quantities, not
//! prices.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use toyshop_core::error::{CoreError, ValidationError};
use toyshop_core::money::Money;
use toyshop_core::types::{Cart, Order, OrderItem, OrderStatus};
use toyshop_core::validation;

/// Result of a successful checkout.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PlacedOrder {
    pub order_id: String,
    pub total_price_cents: i64,
}

/// An order together with its frozen line items.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// A cart line joined with the product data checkout needs: the current
/// price (about to be frozen) and the current stock level (about to be
/// re-validated).
#[derive(Debug, sqlx::FromRow)]
struct CheckoutLine {
    product_id: String,
    quantity: i64,
    price_cents: i64,
    stock_quantity: i64,
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Converts the user's cart into a pending order.
    ///
    /// ## Effects (one atomic unit)
    /// 1. Every cart line is re-validated against current stock - the check
    ///    at cart-display time is advisory, this one is binding
    /// 2. The order is created with the total frozen at today's prices
    /// 3. Each line becomes an OrderItem carrying price-at-purchase
    /// 4. Stock is decremented, guarded against going negative
    /// 5. The cart is emptied (the cart row itself persists)
    ///
    /// Any failure rolls the whole transaction back: no order, no stock
    /// change, cart intact - so a failed checkout is safely retryable.
    pub async fn place_order(&self, user_id: &str) -> StoreResult<PlacedOrder> {
        validation::require_user(user_id)?;

        debug!(user_id = %user_id, "Placing order");

        let mut tx = self.pool.begin().await?;

        let cart = sqlx::query_as::<_, Cart>(
            "SELECT id, user_id, created_at, updated_at FROM carts WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        // A user with no cart row has, by definition, an empty cart.
        let Some(cart) = cart else {
            return Err(empty_cart());
        };

        let lines = sqlx::query_as::<_, CheckoutLine>(
            r#"
            SELECT ci.product_id,
                   ci.quantity,
                   p.price_cents,
                   p.stock_quantity
            FROM cart_items ci
            INNER JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = ?1
            ORDER BY ci.added_at
            "#,
        )
        .bind(&cart.id)
        .fetch_all(&mut *tx)
        .await?;

        if lines.is_empty() {
            return Err(empty_cart());
        }

        // Commit-time re-validation: the authoritative stock check.
        for line in &lines {
            if line.quantity > line.stock_quantity {
                return Err(StoreError::Domain(CoreError::InsufficientStock {
                    product_id: line.product_id.clone(),
                    available: line.stock_quantity,
                    requested: line.quantity,
                }));
            }
        }

        let total = lines.iter().fold(Money::zero(), |acc, line| {
            acc + Money::from_cents(line.price_cents).multiply_quantity(line.quantity)
        });

        let order_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, total_price_cents, status,
                cancellation_reason, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?5)
            "#,
        )
        .bind(&order_id)
        .bind(user_id)
        .bind(total.cents())
        .bind(OrderStatus::Pending)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for line in &lines {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, quantity, price_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&order_id)
            .bind(&line.product_id)
            .bind(line.quantity)
            .bind(line.price_cents)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            // The stock_quantity >= ? guard re-checks under the write lock;
            // a zero-row update aborts the whole checkout.
            let result = sqlx::query(
                r#"
                UPDATE products
                SET stock_quantity = stock_quantity - ?2,
                    in_stock = CASE WHEN stock_quantity - ?2 > 0 THEN 1 ELSE 0 END
                WHERE id = ?1 AND stock_quantity >= ?2
                "#,
            )
            .bind(&line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::Domain(CoreError::InsufficientStock {
                    product_id: line.product_id.clone(),
                    available: line.stock_quantity,
                    requested: line.quantity,
                }));
            }
        }

        sqlx::query("DELETE FROM cart_items WHERE cart_id = ?1")
            .bind(&cart.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE carts SET updated_at = ?2 WHERE id = ?1")
            .bind(&cart.id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            order_id = %order_id,
            total = %total,
            items = lines.len(),
            "Order placed"
        );

        Ok(PlacedOrder {
            order_id,
            total_price_cents: total.cents(),
        })
    }

    // =========================================================================
    // Status Transitions
    // =========================================================================

    /// Buyer-facing cancellation. Pending orders only; the order must
    /// belong to the requesting user.
    ///
    /// Restores every line's quantity to product stock.
    pub async fn cancel_order(
        &self,
        user_id: &str,
        order_id: &str,
        reason: Option<&str>,
    ) -> StoreResult<()> {
        validation::require_user(user_id)?;

        debug!(user_id = %user_id, order_id = %order_id, "Cancelling order");

        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, order_id).await?;
        let Some(order) = order.filter(|o| o.user_id == user_id) else {
            // Someone else's order is indistinguishable from a missing one.
            return Err(StoreError::not_found("Order", order_id));
        };

        // Self-service stops at Pending even though the machine also
        // admits Processing → Cancelled (that edge is for admins).
        if order.status != OrderStatus::Pending {
            return Err(StoreError::Domain(CoreError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            }));
        }

        cancel_in_tx(&mut tx, &order, reason).await?;

        tx.commit().await?;

        info!(order_id = %order_id, "Order cancelled");
        Ok(())
    }

    /// Back-office cancellation: allowed while the order is Pending or
    /// Processing. Restores stock like buyer cancellation.
    pub async fn admin_cancel_order(&self, order_id: &str, reason: Option<&str>) -> StoreResult<()> {
        debug!(order_id = %order_id, "Admin-cancelling order");

        let mut tx = self.pool.begin().await?;

        let Some(order) = fetch_order(&mut tx, order_id).await? else {
            return Err(StoreError::not_found("Order", order_id));
        };

        if !order.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(StoreError::Domain(CoreError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            }));
        }

        cancel_in_tx(&mut tx, &order, reason).await?;

        tx.commit().await?;

        info!(order_id = %order_id, "Order cancelled (admin)");
        Ok(())
    }

    /// Moves a Pending order to Processing. No stock effect (stock was
    /// already taken at placement).
    pub async fn confirm_order(&self, order_id: &str) -> StoreResult<()> {
        self.transition(order_id, OrderStatus::Processing).await
    }

    /// Moves a Processing order to Completed. No stock effect.
    pub async fn complete_order(&self, order_id: &str) -> StoreResult<()> {
        self.transition(order_id, OrderStatus::Completed).await
    }

    /// Shared status move for the stock-neutral transitions.
    async fn transition(&self, order_id: &str, to: OrderStatus) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let Some(order) = fetch_order(&mut tx, order_id).await? else {
            return Err(StoreError::not_found("Order", order_id));
        };

        if !order.status.can_transition_to(to) {
            return Err(StoreError::Domain(CoreError::InvalidTransition {
                from: order.status,
                to,
            }));
        }

        sqlx::query("UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(order_id)
            .bind(to)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(order_id = %order_id, from = ?order.status, to = ?to, "Order status changed");
        Ok(())
    }

    /// Cancels every **pending** order in the batch, restoring stock, in a
    /// single transaction. Orders in any other state (and unknown ids) are
    /// skipped, not failed.
    ///
    /// A non-empty reason is required and is checked before any order is
    /// touched.
    ///
    /// ## Returns
    /// The number of orders actually cancelled.
    pub async fn bulk_cancel(&self, order_ids: &[String], reason: &str) -> StoreResult<u64> {
        validation::validate_cancellation_reason(reason)?;

        debug!(count = order_ids.len(), "Bulk-cancelling orders");

        let mut tx = self.pool.begin().await?;
        let mut affected = 0u64;

        for order_id in order_ids {
            let Some(order) = fetch_order(&mut tx, order_id).await? else {
                continue;
            };
            if order.status != OrderStatus::Pending {
                continue;
            }

            cancel_in_tx(&mut tx, &order, Some(reason)).await?;
            affected += 1;
        }

        tx.commit().await?;

        info!(affected = affected, "Bulk cancel finished");
        Ok(affected)
    }

    // =========================================================================
    // Reads (storefront history + admin façade)
    // =========================================================================

    /// Gets an order by id, regardless of owner (admin read).
    pub async fn get_by_id(&self, order_id: &str) -> StoreResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, user_id, total_price_cents, status,
                   cancellation_reason, created_at, updated_at
            FROM orders
            WHERE id = ?1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets a user's order with its line items; NotFound when the order
    /// doesn't exist or belongs to someone else.
    pub async fn get_for_user(&self, user_id: &str, order_id: &str) -> StoreResult<OrderWithItems> {
        validation::require_user(user_id)?;

        let order = self
            .get_by_id(order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| StoreError::not_found("Order", order_id))?;

        let items = self.get_items(order_id).await?;

        Ok(OrderWithItems { order, items })
    }

    /// Lists a user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Order>> {
        validation::require_user(user_id)?;

        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, user_id, total_price_cents, status,
                   cancellation_reason, created_at, updated_at
            FROM orders
            WHERE user_id = ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Lists all orders in a given status, newest first (admin dashboards).
    pub async fn list_by_status(&self, status: OrderStatus) -> StoreResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, user_id, total_price_cents, status,
                   cancellation_reason, created_at, updated_at
            FROM orders
            WHERE status = ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Gets the frozen line items of an order.
    pub async fn get_items(&self, order_id: &str) -> StoreResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, quantity, price_cents, created_at
            FROM order_items
            WHERE order_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}

// =============================================================================
// Transaction-Scoped Helpers
// =============================================================================

/// The checkout refusal for a cart with nothing in it.
fn empty_cart() -> StoreError {
    StoreError::Domain(CoreError::Validation(ValidationError::Empty {
        field: "cart".to_string(),
    }))
}

/// Fetches an order inside the current transaction.
async fn fetch_order(
    conn: &mut SqliteConnection,
    order_id: &str,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        r#"
        SELECT id, user_id, total_price_cents, status,
               cancellation_reason, created_at, updated_at
        FROM orders
        WHERE id = ?1
        "#,
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await
}

/// Marks an order cancelled and returns its quantities to stock.
///
/// Caller has already checked the transition; this only applies effects.
async fn cancel_in_tx(
    conn: &mut SqliteConnection,
    order: &Order,
    reason: Option<&str>,
) -> Result<(), sqlx::Error> {
    let items = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT id, order_id, product_id, quantity, price_cents, created_at
        FROM order_items
        WHERE order_id = ?1
        "#,
    )
    .bind(&order.id)
    .fetch_all(&mut *conn)
    .await?;

    for item in &items {
        // Product may have been deleted since the order was placed; then
        // there is no stock row to restore and the update hits 0 rows.
        sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + ?2,
                in_stock = CASE WHEN stock_quantity + ?2 > 0 THEN 1 ELSE 0 END
            WHERE id = ?1
            "#,
        )
        .bind(&item.product_id)
        .bind(item.quantity)
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query(
        r#"
        UPDATE orders
        SET status = ?2, cancellation_reason = ?3, updated_at = ?4
        WHERE id = ?1
        "#,
    )
    .bind(&order.id)
    .bind(OrderStatus::Cancelled)
    .bind(reason)
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
    use toyshop_core::types::{Category, Product};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, name: &str, price_cents: i64, stock: i64) -> Product {
        let product = Product::new(name, Category::Constructor, price_cents, stock);
        db.products().insert(&product).await.unwrap();
        product
    }

    /// Puts `quantity` units of a product into the user's cart.
    async fn fill_cart(db: &Database, user_id: &str, product_id: &str, quantity: i64) {
        for _ in 0..quantity {
            db.carts().add_item(user_id, product_id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_place_order_freezes_total_and_adjusts_stock() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Blocks", 10_000, 5).await; // 100.00
        let p2 = seed_product(&db, "Art set", 5_000, 5).await; // 50.00

        fill_cart(&db, "user-1", &p1.id, 2).await;
        fill_cart(&db, "user-1", &p2.id, 1).await;

        let placed = db.orders().place_order("user-1").await.unwrap();
        assert_eq!(placed.total_price_cents, 25_000); // 250.00

        let order = db.orders().get_by_id(&placed.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_price_cents, 25_000);

        let items = db.orders().get_items(&placed.order_id).await.unwrap();
        assert_eq!(items.len(), 2);

        // Stock decremented, in_stock still true (units remain).
        let p1 = db.products().get_by_id(&p1.id).await.unwrap().unwrap();
        let p2 = db.products().get_by_id(&p2.id).await.unwrap().unwrap();
        assert_eq!(p1.stock_quantity, 3);
        assert_eq!(p2.stock_quantity, 4);
        assert!(p1.in_stock && p2.in_stock);

        // Cart emptied, but the cart row survives.
        let view = db.carts().get_cart("user-1").await.unwrap();
        assert!(view.lines.is_empty());
        assert_eq!(view.totals.total_quantity, 0);
    }

    #[tokio::test]
    async fn test_place_order_empty_cart() {
        let db = test_db().await;

        // No cart at all.
        let err = db.orders().place_order("user-1").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(CoreError::Validation(ValidationError::Empty { .. }))
        ));

        // A cart that exists but has no lines.
        db.carts().get_cart("user-2").await.unwrap();
        let err = db.orders().place_order("user-2").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(CoreError::Validation(ValidationError::Empty { .. }))
        ));
    }

    #[tokio::test]
    async fn test_place_order_buying_out_clears_in_stock() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Blocks", 1_000, 3).await;

        fill_cart(&db, "user-1", &p1.id, 3).await;
        db.orders().place_order("user-1").await.unwrap();

        let p1 = db.products().get_by_id(&p1.id).await.unwrap().unwrap();
        assert_eq!(p1.stock_quantity, 0);
        assert!(!p1.in_stock);
    }

    #[tokio::test]
    async fn test_place_order_revalidates_stock_at_commit() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Blocks", 1_000, 5).await;

        fill_cart(&db, "user-1", &p1.id, 3).await;

        // Stock shrinks after the cart was filled (a warehouse correction,
        // or another buyer): checkout must notice.
        db.products().adjust_stock(&p1.id, -4).await.unwrap();

        let err = db.orders().place_order("user-1").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(CoreError::InsufficientStock {
                available: 1,
                requested: 3,
                ..
            })
        ));

        // No partial effects: no order, stock untouched, cart intact.
        assert!(db.orders().list_for_user("user-1").await.unwrap().is_empty());
        let p1 = db.products().get_by_id(&p1.id).await.unwrap().unwrap();
        assert_eq!(p1.stock_quantity, 1);
        let view = db.carts().get_cart("user-1").await.unwrap();
        assert_eq!(view.totals.total_quantity, 3);

        // And retryable: freeing stock lets the same cart check out.
        db.products().adjust_stock(&p1.id, 4).await.unwrap();
        db.orders().place_order("user-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_order_items_freeze_price_at_purchase() {
        let db = test_db().await;
        let mut p1 = seed_product(&db, "Blocks", 2_000, 5).await;

        fill_cart(&db, "user-1", &p1.id, 2).await;
        let placed = db.orders().place_order("user-1").await.unwrap();

        // Reprice the product after the sale.
        p1 = db.products().get_by_id(&p1.id).await.unwrap().unwrap();
        p1.price_cents = 9_999;
        db.products().update(&p1).await.unwrap();

        let items = db.orders().get_items(&placed.order_id).await.unwrap();
        assert_eq!(items[0].price_cents, 2_000);
        assert_eq!(items[0].line_total().cents(), 4_000);

        let order = db.orders().get_by_id(&placed.order_id).await.unwrap().unwrap();
        assert_eq!(order.total_price_cents, 4_000);
    }

    #[tokio::test]
    async fn test_cancel_pending_restores_stock() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Blocks", 1_000, 2).await;

        fill_cart(&db, "user-1", &p1.id, 2).await;
        let placed = db.orders().place_order("user-1").await.unwrap();

        // Sold out after the order.
        let sold_out = db.products().get_by_id(&p1.id).await.unwrap().unwrap();
        assert_eq!(sold_out.stock_quantity, 0);
        assert!(!sold_out.in_stock);

        db.orders()
            .cancel_order("user-1", &placed.order_id, Some("changed my mind"))
            .await
            .unwrap();

        let order = db.orders().get_by_id(&placed.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.cancellation_reason.as_deref(), Some("changed my mind"));

        // Stock restored and in_stock recomputed.
        let p1 = db.products().get_by_id(&p1.id).await.unwrap().unwrap();
        assert_eq!(p1.stock_quantity, 2);
        assert!(p1.in_stock);
    }

    #[tokio::test]
    async fn test_cancel_requires_ownership() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Blocks", 1_000, 2).await;

        fill_cart(&db, "user-1", &p1.id, 1).await;
        let placed = db.orders().place_order("user-1").await.unwrap();

        let err = db
            .orders()
            .cancel_order("intruder", &placed.order_id, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(CoreError::NotFound { entity: "Order", .. })
        ));

        let order = db.orders().get_by_id(&placed.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_cancel_completed_is_invalid_and_changes_nothing() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Blocks", 1_000, 2).await;

        fill_cart(&db, "user-1", &p1.id, 2).await;
        let placed = db.orders().place_order("user-1").await.unwrap();

        db.orders().confirm_order(&placed.order_id).await.unwrap();
        db.orders().complete_order(&placed.order_id).await.unwrap();

        let err = db
            .orders()
            .cancel_order("user-1", &placed.order_id, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(CoreError::InvalidTransition {
                from: OrderStatus::Completed,
                to: OrderStatus::Cancelled,
            })
        ));

        // Terminal state and stock both untouched.
        let order = db.orders().get_by_id(&placed.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        let p1 = db.products().get_by_id(&p1.id).await.unwrap().unwrap();
        assert_eq!(p1.stock_quantity, 0);
    }

    #[tokio::test]
    async fn test_self_service_cannot_cancel_processing_but_admin_can() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Blocks", 1_000, 2).await;

        fill_cart(&db, "user-1", &p1.id, 2).await;
        let placed = db.orders().place_order("user-1").await.unwrap();
        db.orders().confirm_order(&placed.order_id).await.unwrap();

        let err = db
            .orders()
            .cancel_order("user-1", &placed.order_id, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(CoreError::InvalidTransition {
                from: OrderStatus::Processing,
                ..
            })
        ));

        db.orders()
            .admin_cancel_order(&placed.order_id, Some("courier unavailable"))
            .await
            .unwrap();

        let order = db.orders().get_by_id(&placed.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);

        let p1 = db.products().get_by_id(&p1.id).await.unwrap().unwrap();
        assert_eq!(p1.stock_quantity, 2);
    }

    #[tokio::test]
    async fn test_confirm_and_complete_follow_the_machine() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Blocks", 1_000, 5).await;

        fill_cart(&db, "user-1", &p1.id, 1).await;
        let placed = db.orders().place_order("user-1").await.unwrap();

        // Completing a pending order skips a state.
        let err = db.orders().complete_order(&placed.order_id).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(CoreError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Completed,
            })
        ));

        db.orders().confirm_order(&placed.order_id).await.unwrap();

        // Confirming twice is illegal.
        let err = db.orders().confirm_order(&placed.order_id).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(CoreError::InvalidTransition {
                from: OrderStatus::Processing,
                to: OrderStatus::Processing,
            })
        ));

        db.orders().complete_order(&placed.order_id).await.unwrap();

        let order = db.orders().get_by_id(&placed.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);

        // Unknown order id.
        let err = db.orders().confirm_order("no-such-order").await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_bulk_cancel_only_touches_pending() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Blocks", 1_000, 10).await;

        fill_cart(&db, "user-1", &p1.id, 2).await;
        let pending = db.orders().place_order("user-1").await.unwrap();

        fill_cart(&db, "user-2", &p1.id, 3).await;
        let processing = db.orders().place_order("user-2").await.unwrap();
        db.orders().confirm_order(&processing.order_id).await.unwrap();

        let ids = vec![
            pending.order_id.clone(),
            processing.order_id.clone(),
            "no-such-order".to_string(),
        ];

        let affected = db.orders().bulk_cancel(&ids, "seasonal cleanup").await.unwrap();
        assert_eq!(affected, 1);

        let cancelled = db.orders().get_by_id(&pending.order_id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("seasonal cleanup"));

        let untouched = db.orders().get_by_id(&processing.order_id).await.unwrap().unwrap();
        assert_eq!(untouched.status, OrderStatus::Processing);

        // Only the pending order's 2 units came back: 10 - 2 - 3 + 2 = 7.
        let p1 = db.products().get_by_id(&p1.id).await.unwrap().unwrap();
        assert_eq!(p1.stock_quantity, 7);
    }

    #[tokio::test]
    async fn test_bulk_cancel_requires_reason() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Blocks", 1_000, 5).await;

        fill_cart(&db, "user-1", &p1.id, 1).await;
        let placed = db.orders().place_order("user-1").await.unwrap();

        let err = db
            .orders()
            .bulk_cancel(&[placed.order_id.clone()], "")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(CoreError::Validation(ValidationError::Required { .. }))
        ));

        // Zero orders affected.
        let order = db.orders().get_by_id(&placed.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_order_reads() {
        let db = test_db().await;
        let p1 = seed_product(&db, "Blocks", 1_000, 10).await;

        fill_cart(&db, "user-1", &p1.id, 1).await;
        let first = db.orders().place_order("user-1").await.unwrap();
        fill_cart(&db, "user-1", &p1.id, 2).await;
        let second = db.orders().place_order("user-1").await.unwrap();

        let orders = db.orders().list_for_user("user-1").await.unwrap();
        assert_eq!(orders.len(), 2);

        let with_items = db
            .orders()
            .get_for_user("user-1", &second.order_id)
            .await
            .unwrap();
        assert_eq!(with_items.items.len(), 1);
        assert_eq!(with_items.items[0].quantity, 2);

        // Other users see nothing.
        let err = db
            .orders()
            .get_for_user("user-2", &first.order_id)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(CoreError::NotFound { .. })));

        let pending = db.orders().list_by_status(OrderStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(db
            .orders()
            .list_by_status(OrderStatus::Cancelled)
            .await
            .unwrap()
            .is_empty());
    }
}
