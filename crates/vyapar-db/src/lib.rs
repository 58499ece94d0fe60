//! # vyapar-db: Database Layer for Vyapar POS
//!
//! SQLite persistence for tenants, the inventory ledger, checkout and the
//! restaurant floor. Every multi-row mutation runs inside one sqlx
//! transaction owned by a repository in this crate.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Vyapar Data Flow                                 │
//! │                                                                         │
//! │  HTTP handler (POST /api/pos/checkout)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     vyapar-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ Inventory     │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ Checkout      │    │ 0001_retail  │  │   │
//! │  │   │ LoyaltyPolicy │    │ Floor         │    │ 0002_restau… │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vyapar_core::{Role, TenantContext};
//! use vyapar_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./data/vyapar.db")).await?;
//! let tenant = TenantContext::new("acct-main", Role::Cashier);
//!
//! let sale = db.checkout().checkout(&tenant, &request).await?;
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

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::checkout::CheckoutRepository;
pub use repository::customer::CustomerRepository;
pub use repository::floor::{FloorRepository, OrderChange};
pub use repository::inventory::InventoryRepository;
pub use repository::tenant::TenantRepository;

// =============================================================================
// Test Fixtures
// =============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;
    use vyapar_core::{NewBatch, NewProduct, Role, TenantContext, TenantStatus};

    use crate::{Database, DbConfig};

    /// Fresh in-memory database with one active tenant.
    pub async fn setup() -> (Database, TenantContext) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = add_tenant(&db, "acct-main").await;
        (db, tenant)
    }

    /// File-backed database with a multi-connection pool, for tests that
    /// need writers to actually overlap. Keep the `TempDir` alive.
    pub async fn setup_file() -> (tempfile::TempDir, Database, TenantContext) {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("vyapar.db")).max_connections(5);
        let db = Database::new(config).await.unwrap();
        let tenant = add_tenant(&db, "acct-main").await;
        (dir, db, tenant)
    }

    pub async fn add_tenant(db: &Database, id: &str) -> TenantContext {
        db.tenants()
            .create(id, &format!("Store {id}"), TenantStatus::Active)
            .await
            .unwrap();
        TenantContext::new(id, Role::Admin)
    }

    /// Product selling at ₹25 with untracked opening stock.
    pub fn new_product(name: &str, stock: i64, cost_paise: i64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            category: None,
            price_paise: 2_500,
            cost_paise,
            stock_quantity: stock,
            tax_rate_bps: 0,
        }
    }

    pub fn new_batch(code: &str, expiry: NaiveDate, quantity: i64) -> NewBatch {
        NewBatch {
            batch_code: code.to_string(),
            expiry_date: expiry,
            quantity,
            unit_cost_paise: 0,
        }
    }
}
