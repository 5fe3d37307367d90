//! # Error Types
//!
//! Domain-specific error types for gon-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  gon-core errors (this file)                                           │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  gon-db errors                                                         │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── LedgerError      - CoreError | DbError from the stock ledger      │
//! │                                                                         │
//! │  gon-api errors                                                        │
//! │  └── ServiceError     - Taxonomy mapped to HTTP status + ApiError body │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → ApiError           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Not enough on-hand stock to satisfy a request.
    ///
    /// ```text
    /// Sale line: product 1 × 20
    ///      │
    ///      ▼
    /// StockItem(product 1, branch 1).quantity = 7
    ///      │
    ///      ▼
    /// InsufficientStock { product_id: 1, available: 7, requested: 20 }
    /// ```
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: i64,
        available: i64,
        requested: i64,
    },

    /// Zero or negative quantity given to the stock ledger.
    #[error("Invalid quantity {0}: must be a positive whole number")]
    InvalidQuantity(i64),

    /// No stock record for a (product, branch) pair.
    #[error("No stock record for product {product_id} at branch {branch_id}")]
    StockNotFound { product_id: i64, branch_id: i64 },

    /// No stock record with this id.
    #[error("Stock record not found: {0}")]
    StockItemNotFound(i64),

    /// Illegal status change.
    #[error("Cannot change status from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Caller's scope does not cover the target.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        CoreError::Forbidden(reason.into())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised by [`crate::validation`] before any storage is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Duplicate value (e.g., a second stock record for the same product and branch).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// Request refers to something that cannot be acted on in its current state.
    #[error("{0}")]
    Rule(String),
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_names_amounts() {
        let err = CoreError::InsufficientStock {
            product_id: 1,
            available: 7,
            requested: 20,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product 1: available 7, requested 20"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "lines".to_string(),
        };
        assert_eq!(err.to_string(), "lines is required");

        let err = ValidationError::TooLong {
            field: "receiptNumber".to_string(),
            max: 50,
        };
        assert_eq!(err.to_string(), "receiptNumber must be at most 50 characters");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
