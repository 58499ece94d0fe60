//! # vyapar-core: Pure Business Logic for Vyapar POS
//!
//! Everything in this crate is deterministic given its inputs (plus an
//! entropy source for identifiers). Persistence lives in `vyapar-db`, the
//! kitchen display fan-out lives in `vyapar-realtime`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Vyapar Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           apps/server (axum HTTP + KDS WebSocket)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ vyapar-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐          │   │
//! │  │   │   ids    │ │ checkout │ │   fefo   │ │  floor   │          │   │
//! │  │   │ OsRng    │ │ profit   │ │ batch    │ │ item FSM │          │   │
//! │  │   │ ids      │ │ loyalty  │ │ plan     │ │ KOT      │          │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 vyapar-db (SQLite repositories)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`ids`] - Identifier generator (alphanumeric / numeric, optional prefix)
//! - [`money`] - Money type with integer arithmetic (paise, never floats)
//! - [`types`] - Retail domain types (Product, ProductBatch, Transaction, ...)
//! - [`tenant`] - Tenant records and the per-call tenant context
//! - [`checkout`] - Cart validation, profit and loyalty computation
//! - [`fefo`] - First-expire-first-out batch allocation
//! - [`floor`] - Restaurant tables, order items and their state machine
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation rules
//!
//! ## Example Usage
//!
//! ```rust
//! use vyapar_core::fefo::{allocate, BatchStock};
//!
//! let batches = vec![
//!     BatchStock::new("b1", 5),
//!     BatchStock::new("b2", 5),
//! ];
//! let allocation = allocate(&batches, 7);
//!
//! assert_eq!(allocation.deductions[0].quantity, 5);
//! assert_eq!(allocation.deductions[1].quantity, 2);
//! assert_eq!(allocation.shortfall, 0);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod fefo;
pub mod floor;
pub mod ids;
pub mod money;
pub mod tenant;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use checkout::{plan_checkout, CheckoutPlan, LoyaltyPolicy, PlannedLine};
pub use error::{CoreError, CoreResult, ValidationError};
pub use floor::{
    CancelOutcome, Dispatch, FloorTable, ItemEdit, ItemStatus, KitchenSection, NewOrderItem,
    NewTable, OrderItem, RestaurantTable, TableCheckout, TableOrder, TableStatus,
};
pub use money::Money;
pub use tenant::{Role, Tenant, TenantContext, TenantStatus};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single checkout cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single cart or order line.
///
/// Catches fat-finger entries such as 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Loyalty accrual rate: one point per this many paise spent (₹10).
pub const DEFAULT_PAISE_PER_POINT: i64 = 1_000;

/// Length of the numeric transaction identifier.
pub const TRANSACTION_ID_LENGTH: usize = 16;
