//! # Repository Module
//!
//! Database repository implementations for Vyapar.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  HTTP handler / KDS command                                            │
//! │       │                                                                 │
//! │       │  db.checkout().checkout(&tenant, &request)                     │
//! │       ▼                                                                 │
//! │  CheckoutRepository ──────► inventory::consume_fefo_in (same tx)       │
//! │  FloorRepository ─────────► checkout::checkout_in (same tx)            │
//! │  InventoryRepository                                                   │
//! │  CustomerRepository                                                    │
//! │  TenantRepository                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every tenant-owned query filters on `tenant_id`. A row that belongs to
//! another tenant is reported exactly as a row that does not exist.
//!
//! ## Available Repositories
//!
//! - [`TenantRepository`](tenant::TenantRepository) - Tenant accounts and status
//! - [`InventoryRepository`](inventory::InventoryRepository) - Products, batches, FEFO
//! - [`CustomerRepository`](customer::CustomerRepository) - Customers and loyalty balance
//! - [`CheckoutRepository`](checkout::CheckoutRepository) - Atomic sales
//! - [`FloorRepository`](floor::FloorRepository) - Tables, orders, KOT dispatch

pub mod checkout;
pub mod customer;
pub mod floor;
pub mod inventory;
pub mod tenant;

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::DbResult;

/// Opens a write transaction (`BEGIN IMMEDIATE`).
///
/// The write lock is taken before the first read, so a second writer waits
/// on the busy timeout instead of failing when it tries to upgrade a stale
/// read snapshot.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}
