//! # Validation Module
//!
//! Input validation run before any business logic or storage access.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: HTTP extractors (serde)   - shape and types                  │
//! │  Layer 2: THIS MODULE               - business ranges                  │
//! │  Layer 3: SQLite                    - NOT NULL, CHECK, FOREIGN KEY     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```rust
//! use vyapar_core::validation::{validate_name, validate_quantity};
//!
//! assert!(validate_name("Paneer Tikka", "name").is_ok());
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::{CoreError, CoreResult, ValidationError, ValidationResult};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Longest accepted display name.
pub const MAX_NAME_LEN: usize = 200;

/// Longest accepted batch code.
pub const MAX_BATCH_CODE_LEN: usize = 50;

/// Largest table capacity accepted.
pub const MAX_TABLE_CAPACITY: i64 = 50;

/// Widest expiry window accepted, in days.
pub const MAX_EXPIRY_WINDOW_DAYS: i64 = 365;

// =============================================================================
// String Validators
// =============================================================================

/// Non-empty after trimming and at most [`MAX_NAME_LEN`] characters.
pub fn validate_name(value: &str, field: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

pub fn validate_batch_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "batch_code".to_string(),
        });
    }

    if code.len() > MAX_BATCH_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "batch_code".to_string(),
            max: MAX_BATCH_CODE_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Line quantity: 1..=[`MAX_ITEM_QUANTITY`].
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

/// Prices and costs may be zero (free items) but never negative.
pub fn validate_price(paise: i64, field: &str) -> ValidationResult<()> {
    if paise < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Stock-in quantity for a new batch must be positive.
pub fn validate_batch_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

pub fn validate_capacity(capacity: i64) -> ValidationResult<()> {
    if !(1..=MAX_TABLE_CAPACITY).contains(&capacity) {
        return Err(ValidationError::OutOfRange {
            field: "capacity".to_string(),
            min: 1,
            max: MAX_TABLE_CAPACITY,
        });
    }
    Ok(())
}

pub fn validate_expiry_window(days: i64) -> ValidationResult<()> {
    if !(0..=MAX_EXPIRY_WINDOW_DAYS).contains(&days) {
        return Err(ValidationError::OutOfRange {
            field: "days".to_string(),
            min: 0,
            max: MAX_EXPIRY_WINDOW_DAYS,
        });
    }
    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// A checkout cart must have 1..=[`MAX_CART_ITEMS`] lines.
pub fn validate_cart_size(lines: usize) -> CoreResult<()> {
    if lines == 0 {
        return Err(CoreError::EmptyCart);
    }
    if lines > MAX_CART_ITEMS {
        return Err(CoreError::CartTooLarge {
            max: MAX_CART_ITEMS,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
