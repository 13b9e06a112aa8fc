//! # Error Types
//!
//! Domain-specific error types for toyshop-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  toyshop-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  toyshop-db errors (separate crate)                                    │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── StoreError       - CoreError | DbError, returned by repositories  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → StoreError → caller               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, quantities, statuses)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message in the caller

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// They should be caught and translated to user-friendly messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An entity cannot be found, or is not visible to the requester.
    ///
    /// ## When This Occurs
    /// - Product id doesn't exist, or the product is out of stock when a
    ///   cart add requires an available product
    /// - No cart line exists for (user, product)
    /// - Order id doesn't exist or belongs to a different user
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Requested quantity exceeds available stock.
    ///
    /// ## When This Occurs
    /// - Incrementing a cart line past the product's stock level
    /// - Checkout re-validation finds the cart asks for more units than
    ///   remain (another buyer got there first)
    /// - An admin stock correction would drive the level below zero
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// An order-status change that the state machine does not admit.
    ///
    /// ## When This Occurs
    /// - Cancelling a completed order
    /// - Confirming an order that is not pending
    /// - Completing an order that is not processing
    #[error("Order cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No authenticated user identity was supplied.
    ///
    /// Cart and order operations require an opaque user id from the
    /// authentication collaborator; an empty id is refused before any
    /// persistence access.
    #[error("No authenticated user")]
    Unauthorized,
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and id.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// A collection that must have members is empty.
    #[error("{field} is empty")]
    Empty { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
