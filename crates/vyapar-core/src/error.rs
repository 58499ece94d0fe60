//! # Error Types
//!
//! Domain-specific error types for vyapar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  vyapar-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  vyapar-db errors (separate crate)                                     │
//! │  └── DbError          - Persistence failures, wraps CoreError          │
//! │                                                                         │
//! │  Server errors (apps/server)                                           │
//! │  └── ApiError         - What HTTP clients see (serialized)             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entities that exist under another tenant are reported exactly like
//! entities that do not exist at all.

use thiserror::Error;

use crate::floor::ItemStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product does not exist for the caller's tenant.
    #[error("Product {0} not found")]
    ProductNotFound(String),

    /// Requested quantity exceeds the aggregate stock figure.
    ///
    /// ```text
    /// Checkout (qty: 30)
    ///      │
    ///      ▼
    /// stock_quantity = 20
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Paneer Tikka", available: 20, requested: 30 }
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Customer does not exist for the caller's tenant.
    #[error("Customer {0} not found")]
    CustomerNotFound(String),

    /// Redemption exceeds balance (only raised under strict redemption).
    #[error("Customer {customer_id} has {balance} points, cannot redeem {requested}")]
    InsufficientPoints {
        customer_id: String,
        balance: i64,
        requested: i64,
    },

    /// Checkout cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Restaurant table does not exist for the caller's tenant.
    #[error("Table {0} not found")]
    TableNotFound(String),

    /// Table is not in a state that allows the requested operation.
    #[error("Table {table_id} is {status}, cannot {action}")]
    TableNotAvailable {
        table_id: String,
        status: String,
        action: &'static str,
    },

    /// Table has no current order.
    #[error("Table {0} has no active order")]
    NoActiveOrder(String),

    /// Item index is outside the order's item list.
    #[error("Item index {index} out of range (order has {len} items)")]
    ItemIndexOutOfRange { index: usize, len: usize },

    /// Only lines still pending may be physically removed.
    #[error("Item {index} was already sent to the kitchen ({status})")]
    ItemAlreadyDispatched { index: usize, status: ItemStatus },

    /// Item status change rejected by the transition table.
    #[error("Cannot move item from {from} to {to}")]
    InvalidTransition { from: ItemStatus, to: ItemStatus },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// True for errors that mean "absent, or not yours".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::ProductNotFound(_)
                | CoreError::CustomerNotFound(_)
                | CoreError::TableNotFound(_)
                | CoreError::NoActiveOrder(_)
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic runs.
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

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., unknown status string).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Well-formed value that the current state does not accept.
    #[error("{field} rejected: {reason}")]
    Rejected { field: String, reason: String },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

/// Convenience type alias for validation results.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product: "Masala Chai".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Masala Chai: available 3, requested 5"
        );

        let err = CoreError::InvalidTransition {
            from: ItemStatus::Served,
            to: ItemStatus::Pending,
        };
        assert_eq!(err.to_string(), "Cannot move item from served to pending");
    }

    #[test]
    fn test_not_found_classification() {
        assert!(CoreError::ProductNotFound("p1".into()).is_not_found());
        assert!(CoreError::TableNotFound("t1".into()).is_not_found());
        assert!(!CoreError::EmptyCart.is_not_found());
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
