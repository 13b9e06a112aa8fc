//! # Validation Module
//!
//! Input validation utilities for the storefront.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE - explicit business rule validation              │
//! │  ├── Invoked by every repository write path, unconditionally           │
//! │  └── Never an optional save hook: no write without a validate call     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints (stock_quantity >= 0, price >= 0)    │
//! │  ├── UNIQUE constraints (one cart per user, one line per product)      │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Defense in depth: the constraints catch what the validators miss.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, ValidationError};
use crate::types::Product;
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identity
// =============================================================================

/// Requires an authenticated user identity.
///
/// The authentication collaborator supplies an opaque user id with every
/// cart/order request. An empty or whitespace id means no identity was
/// attached - that is an authorization failure, not bad input, so this
/// returns [`CoreError::Unauthorized`] rather than a validation error.
pub fn require_user(user_id: &str) -> Result<(), CoreError> {
    if user_id.trim().is_empty() {
        return Err(CoreError::Unauthorized);
    }
    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 200 characters
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a cancellation reason supplied with an admin bulk action.
///
/// ## Rules
/// - Must not be empty (bulk cancellation without a reason is refused
///   before any order is touched)
/// - Must be at most 500 characters
pub fn validate_cancellation_reason(reason: &str) -> ValidationResult<()> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: 500,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0); zero is allowed (promotional items)
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a stock level.
///
/// ## Rules
/// - Must be non-negative (>= 0); the catalog never records negative stock
pub fn validate_stock_quantity(qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::OutOfRange {
            field: "stock_quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a production year.
pub fn validate_year(year: i64) -> ValidationResult<()> {
    if !(1900..=2100).contains(&year) {
        return Err(ValidationError::OutOfRange {
            field: "year".to_string(),
            min: 1900,
            max: 2100,
        });
    }

    Ok(())
}

// =============================================================================
// Aggregate Validators
// =============================================================================

/// Validates a full product record before any catalog write.
///
/// Every insert/update path calls this; cross-field consistency (the
/// `in_stock` flag) is not checked here because write paths recompute it
/// rather than trusting the caller.
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    validate_product_name(&product.name)?;
    validate_price_cents(product.price_cents)?;
    validate_stock_quantity(product.stock_quantity)?;
    validate_year(product.year)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
