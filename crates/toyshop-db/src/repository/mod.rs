//! # Repositories
//!
//! One repository per aggregate:
//!
//! - [`product`] - The catalog store (leaf dependency of the other two)
//! - [`cart`] - Per-user carts, stock-bounded mutations
//! - [`order`] - Checkout, the status state machine, admin actions
//!
//! Repositories hold a cloned `SqlitePool` handle and open a transaction
//! per mutation; multi-table operations commit or roll back as a unit.

pub mod cart;
pub mod order;
pub mod product;
