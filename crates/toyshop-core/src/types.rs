//! # Domain Types
//!
//! Core domain types used throughout the storefront.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Cart       │   │     Order       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  category       │   │  user_id (1:1)  │   │  user_id        │       │
//! │  │  price_cents    │   │                 │   │  status         │       │
//! │  │  stock_quantity │   │  CartItem*      │   │  total_cents    │       │
//! │  │  in_stock ◄─────┼───┼── derived from  │   │  OrderItem*     │       │
//! │  └─────────────────┘   │  stock_quantity │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! │                                                                         │
//! │  CartItem quantities track live product prices; OrderItems freeze the  │
//! │  price at the moment of purchase and never look at Product again.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;

// =============================================================================
// Category
// =============================================================================

/// Fixed product categories for the toy catalog.
///
/// Stored lowercase in the database; `label()` gives the storefront name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Plush and soft toys.
    Plush,
    /// Building sets and construction kits.
    Constructor,
    /// Dolls and doll accessories.
    Doll,
    /// Educational and developmental toys.
    Educational,
    /// Arts-and-crafts kits.
    Creative,
}

impl Category {
    /// All categories, in catalog display order.
    pub const ALL: [Category; 5] = [
        Category::Plush,
        Category::Constructor,
        Category::Doll,
        Category::Educational,
        Category::Creative,
    ];

    /// Human-readable category name.
    pub const fn label(&self) -> &'static str {
        match self {
            Category::Plush => "Plush toys",
            Category::Constructor => "Construction sets",
            Category::Doll => "Dolls",
            Category::Educational => "Educational toys",
            Category::Creative => "Creative kits",
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
///
/// ## Stock Invariant
/// `in_stock` is a stored projection of `stock_quantity`: it is true exactly
/// when `stock_quantity > 0`. It is never set independently - every write
/// path recomputes it (see [`Product::set_stock`] and the repository SQL).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown in the catalog.
    pub name: String,

    /// Optional long-form description (empty string when absent).
    pub description: String,

    /// Catalog category.
    pub category: Category,

    /// Price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Units available for sale. Never negative.
    pub stock_quantity: i64,

    /// Derived availability flag: `stock_quantity > 0`.
    pub in_stock: bool,

    /// Country of manufacture.
    pub country: String,

    /// Production year.
    pub year: i64,

    /// When the product was added to the catalog. Immutable.
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Creates a new product with a generated id and a derived `in_stock`.
    pub fn new(
        name: impl Into<String>,
        category: Category,
        price_cents: i64,
        stock_quantity: i64,
    ) -> Self {
        Product {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            category,
            price_cents,
            stock_quantity,
            in_stock: stock_quantity > 0,
            country: String::new(),
            year: 2024,
            created_at: Utc::now(),
        }
    }

    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Sets the stock level and recomputes `in_stock`.
    ///
    /// The only in-memory way to change stock; keeps the derived flag from
    /// drifting out of sync with the quantity.
    pub fn set_stock(&mut self, quantity: i64) {
        self.stock_quantity = quantity;
        self.in_stock = quantity > 0;
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A user's shopping cart (one per user, created lazily on first access).
///
/// The cart row itself is just identity and timestamps; the contents live in
/// `CartItem` rows. Placing an order empties the items but keeps the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Cart {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line in a cart: one product, some quantity.
///
/// Unique per (cart, product); repeat adds increment `quantity` instead of
/// creating a second line. Quantity is always >= 1 - decrementing a 1-unit
/// line deletes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartItem {
    pub id: String,
    pub cart_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub added_at: DateTime<Utc>,
}

/// Aggregated cart numbers for display and responses.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CartTotals {
    /// Number of distinct lines.
    pub item_count: i64,
    /// Sum of line quantities.
    pub total_quantity: i64,
    /// Sum of `quantity × current product price`, in cents. Carts always
    /// price against the live catalog - only orders freeze prices.
    pub total_price_cents: i64,
}

impl CartTotals {
    /// Returns the total as Money.
    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// The lifecycle state of an order.
///
/// ## State Machine
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                                                                         │
/// │   pending ────► processing ────► completed                             │
/// │      │               │                                                  │
/// │      │               │ (admin only)                                     │
/// │      ▼               ▼                                                  │
/// │   cancelled ◄────────┘                                                  │
/// │                                                                         │
/// │   pending is the sole initial state.                                    │
/// │   completed and cancelled are terminal.                                 │
/// │   Every other edge is an InvalidTransition.                             │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, awaiting confirmation.
    Pending,
    /// Confirmed, being prepared.
    Processing,
    /// Fulfilled. Terminal.
    Completed,
    /// Cancelled (by the buyer while pending, or by an admin). Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Whether the state machine admits moving from `self` to `next`.
    ///
    /// Note that `Processing → Cancelled` is admitted here; the self-service
    /// cancellation path additionally restricts itself to `Pending` before
    /// consulting the machine (only admins cancel in-flight orders).
    pub const fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Processing)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Processing, OrderStatus::Completed)
                | (OrderStatus::Processing, OrderStatus::Cancelled)
        )
    }

    /// Terminal states admit no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

// =============================================================================
// Order
// =============================================================================

/// An order: the immutable record of a completed checkout.
///
/// `total_price_cents` is computed once from the cart at placement and never
/// recomputed, even if product prices change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub total_price_cents: i64,
    pub status: OrderStatus,
    /// Set when the order is cancelled; free-form operator or buyer text.
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns the frozen order total as Money.
    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line item in an order.
/// Uses snapshot pattern to freeze the product price at purchase time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Quantity purchased.
    pub quantity: i64,
    /// Unit price in cents at time of purchase (frozen).
    pub price_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Returns the price-at-purchase as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the line total (price-at-purchase × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
