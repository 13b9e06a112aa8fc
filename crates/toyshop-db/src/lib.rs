//! # toyshop-db: Database Layer for the Storefront
//!
//! This crate provides database access and the transactional cart/order
//! services. It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storefront Data Flow                             │
//! │                                                                         │
//! │  Request (add to cart / checkout / admin action)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     toyshop-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ ProductRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ CartRepo      │    │ 001_init.sql │  │   │
//! │  │   │ WAL, FKs on   │    │ OrderRepo     │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   Every cart/order mutation = ONE transaction. The stock        │   │
//! │  │   invariant (in_stock == stock_quantity > 0, never negative)    │   │
//! │  │   holds at every commit point.                                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (or :memory: in tests)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and store error types
//! - [`repository`] - Repository implementations (product, cart, order)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use toyshop_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/toyshop.db")).await?;
//!
//! db.carts().add_item("user-1", &product_id).await?;
//! let placed = db.orders().place_order("user-1").await?;
//! db.orders().confirm_order(&placed.order_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, StoreError, StoreResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::cart::{CartLine, CartRepository, CartUpdate, CartView};
pub use repository::order::{OrderRepository, OrderWithItems, PlacedOrder};
pub use repository::product::ProductRepository;
