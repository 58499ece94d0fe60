//! # Inventory Repository
//!
//! The inventory ledger: products, their aggregate stock figure and the
//! expiry-dated batches backing part of it.
//!
//! ## Stock Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Aggregate Stock vs Batches                           │
//! │                                                                         │
//! │  products.stock_quantity = 70   ◄── authoritative, checked at sale     │
//! │  ├── batch B1 (exp 2026-10-20)  20                                     │
//! │  └── untracked                  50   (opening stock, direct stock-in)  │
//! │                                                                         │
//! │  add_batch(qty 20)  ──► +20 batch row AND +20 aggregate, one commit    │
//! │  consume_fefo(30)   ──► B1 20→0, shortfall 10 left to the aggregate    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Batch tracking is bookkeeping on top of the aggregate figure. Running out
//! of batches during a consumption is not an error.

use chrono::{Duration, NaiveDate, Utc};
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, instrument};

use crate::error::{DbError, DbResult};
use crate::repository::begin_write;
use vyapar_core::fefo::{self, Allocation, BatchStock};
use vyapar_core::ids::{self, Alphabet};
use vyapar_core::validation;
use vyapar_core::{
    BatchDeduction, CoreError, ExpiringBatch, NewBatch, NewProduct, Product, ProductBatch,
    TenantContext,
};

const PRODUCT_COLUMNS: &str = "id, tenant_id, name, category, price_paise, cost_paise, \
     stock_quantity, tax_rate_bps, created_at, updated_at";

const BATCH_COLUMNS: &str =
    "id, tenant_id, product_id, batch_code, expiry_date, quantity, unit_cost_paise, created_at";

/// Repository for the inventory ledger.
///
/// ## Usage
/// ```rust,ignore
/// let inventory = db.inventory();
///
/// let product = inventory.create_product(&tenant, new_product).await?;
/// inventory.add_batch(&tenant, &product.id, batch).await?;
///
/// let taken = inventory.consume_fefo(&tenant, &product.id, 7).await?;
/// ```
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    // =========================================================================
    // Products
    // =========================================================================

    pub async fn create_product(
        &self,
        tenant: &TenantContext,
        new: NewProduct,
    ) -> DbResult<Product> {
        validation::validate_name(&new.name, "name").map_err(CoreError::from)?;
        validation::validate_price(new.price_paise, "price").map_err(CoreError::from)?;
        validation::validate_price(new.cost_paise, "cost").map_err(CoreError::from)?;
        if new.stock_quantity < 0 {
            return Err(CoreError::from(vyapar_core::ValidationError::MustNotBeNegative {
                field: "stock_quantity".to_string(),
            })
            .into());
        }

        let now = Utc::now();
        let product = Product {
            id: ids::generate_id(16, Alphabet::Alphanumeric, "PRD-"),
            tenant_id: tenant.tenant_id().to_string(),
            name: new.name.trim().to_string(),
            category: new.category.filter(|c| !c.trim().is_empty()),
            price_paise: new.price_paise,
            cost_paise: new.cost_paise,
            stock_quantity: new.stock_quantity,
            tax_rate_bps: new.tax_rate_bps,
            created_at: now,
            updated_at: now,
        };

        debug!(tenant_id = %product.tenant_id, product_id = %product.id, "Creating product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, tenant_id, name, category, price_paise, cost_paise,
                stock_quantity, tax_rate_bps, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.tenant_id)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.price_paise)
        .bind(product.cost_paise)
        .bind(product.stock_quantity)
        .bind(product.tax_rate_bps)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    pub async fn get_product(&self, tenant: &TenantContext, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND tenant_id = ?2"
        ))
        .bind(id)
        .bind(tenant.tenant_id())
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// All products of the tenant, by name.
    pub async fn list_products(&self, tenant: &TenantContext) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE tenant_id = ?1 ORDER BY name, id"
        ))
        .bind(tenant.tenant_id())
        .fetch_all(&self.pool)
        .await?;

        debug!(tenant_id = %tenant.tenant_id(), count = products.len(), "Listed products");
        Ok(products)
    }

    /// Deletes a product and its batches.
    ///
    /// A product that appears on any transaction is kept; the foreign key
    /// from `transaction_items` surfaces as [`DbError::ForeignKeyViolation`].
    pub async fn delete_product(&self, tenant: &TenantContext, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(tenant.tenant_id())
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::ForeignKeyViolation { .. } => DbError::ForeignKeyViolation {
                    message: format!("product {id} is referenced by past transactions"),
                },
                other => other,
            })?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(tenant_id = %tenant.tenant_id(), product_id = %id, "Product deleted");
        Ok(())
    }

    // =========================================================================
    // Stock
    // =========================================================================

    /// Adds `delta` (either sign) to the aggregate stock.
    ///
    /// Returns `false` without touching anything when the product is not the
    /// tenant's. A decrement below zero fails with `InsufficientStock`.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn adjust_stock(
        &self,
        tenant: &TenantContext,
        product_id: &str,
        delta: i64,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + ?1, updated_at = ?2
            WHERE id = ?3 AND tenant_id = ?4 AND stock_quantity + ?1 >= 0
            "#,
        )
        .bind(delta)
        .bind(Utc::now())
        .bind(product_id)
        .bind(tenant.tenant_id())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            debug!(product_id = %product_id, delta, "Stock adjusted");
            return Ok(true);
        }

        match self.get_product(tenant, product_id).await? {
            Some(product) => Err(CoreError::InsufficientStock {
                product: product.name,
                available: product.stock_quantity,
                requested: -delta,
            }
            .into()),
            None => {
                debug!(product_id = %product_id, "Stock adjustment ignored, product not found");
                Ok(false)
            }
        }
    }

    // =========================================================================
    // Batches
    // =========================================================================

    /// Records a stock-in batch and raises the aggregate stock by the same
    /// quantity. Both writes commit together.
    #[instrument(skip(self, tenant, new), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn add_batch(
        &self,
        tenant: &TenantContext,
        product_id: &str,
        new: NewBatch,
    ) -> DbResult<ProductBatch> {
        validation::validate_batch_code(&new.batch_code).map_err(CoreError::from)?;
        validation::validate_batch_quantity(new.quantity).map_err(CoreError::from)?;
        validation::validate_price(new.unit_cost_paise, "unit_cost").map_err(CoreError::from)?;

        let now = Utc::now();
        let batch = ProductBatch {
            id: ids::generate_id(16, Alphabet::Alphanumeric, "BAT-"),
            tenant_id: tenant.tenant_id().to_string(),
            product_id: product_id.to_string(),
            batch_code: new.batch_code.trim().to_string(),
            expiry_date: new.expiry_date,
            quantity: new.quantity,
            unit_cost_paise: new.unit_cost_paise,
            created_at: now,
        };

        let mut tx = begin_write(&self.pool).await?;

        let raised = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + ?1, updated_at = ?2
            WHERE id = ?3 AND tenant_id = ?4
            "#,
        )
        .bind(batch.quantity)
        .bind(now)
        .bind(product_id)
        .bind(tenant.tenant_id())
        .execute(&mut *tx)
        .await?;

        if raised.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(product_id.to_string()).into());
        }

        sqlx::query(
            r#"
            INSERT INTO product_batches (
                id, tenant_id, product_id, batch_code, expiry_date,
                quantity, unit_cost_paise, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&batch.id)
        .bind(&batch.tenant_id)
        .bind(&batch.product_id)
        .bind(&batch.batch_code)
        .bind(batch.expiry_date)
        .bind(batch.quantity)
        .bind(batch.unit_cost_paise)
        .bind(batch.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            product_id = %product_id,
            batch_id = %batch.id,
            quantity = batch.quantity,
            expiry = %batch.expiry_date,
            "Batch added"
        );
        Ok(batch)
    }

    /// Batches of one product in consumption order, drained ones included.
    pub async fn list_batches(
        &self,
        tenant: &TenantContext,
        product_id: &str,
    ) -> DbResult<Vec<ProductBatch>> {
        let batches = sqlx::query_as::<_, ProductBatch>(&format!(
            r#"
            SELECT {BATCH_COLUMNS} FROM product_batches
            WHERE tenant_id = ?1 AND product_id = ?2
            ORDER BY expiry_date ASC, rowid ASC
            "#
        ))
        .bind(tenant.tenant_id())
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }

    /// Takes up to `needed` units from the product's batches, earliest
    /// expiry first. Does not touch the aggregate stock.
    pub async fn consume_fefo(
        &self,
        tenant: &TenantContext,
        product_id: &str,
        needed: i64,
    ) -> DbResult<Vec<BatchDeduction>> {
        let mut tx = begin_write(&self.pool).await?;
        let allocation = consume_fefo_in(&mut tx, tenant.tenant_id(), product_id, needed).await?;
        tx.commit().await?;
        Ok(allocation.deductions)
    }

    // =========================================================================
    // Expiry Report
    // =========================================================================

    /// Live batches expiring in `[today, today + within_days]`, earliest first.
    ///
    /// Rows are fetched lazily; calling again restarts from the beginning.
    pub fn expiring_batches(
        &self,
        tenant: &TenantContext,
        today: NaiveDate,
        within_days: i64,
    ) -> BoxStream<'_, DbResult<ExpiringBatch>> {
        if let Err(e) = validation::validate_expiry_window(within_days) {
            let err: DbResult<ExpiringBatch> = Err(DbError::from(CoreError::from(e)));
            return futures_util::stream::once(async move { err }).boxed();
        }
        let until = today + Duration::days(within_days);

        sqlx::query_as::<_, ExpiringBatch>(
            r#"
            SELECT
                b.id AS batch_id,
                b.product_id,
                p.name AS product_name,
                p.price_paise,
                b.batch_code,
                b.expiry_date,
                b.quantity
            FROM product_batches b
            INNER JOIN products p ON p.tenant_id = b.tenant_id AND p.id = b.product_id
            WHERE b.tenant_id = ?1
              AND b.quantity > 0
              AND b.expiry_date >= ?2
              AND b.expiry_date <= ?3
            ORDER BY b.expiry_date ASC, b.rowid ASC
            "#,
        )
        .bind(tenant.tenant_id().to_string())
        .bind(today)
        .bind(until)
        .fetch(&self.pool)
        .map(|row| row.map_err(DbError::from))
        .boxed()
    }

    /// [`expiring_batches`](Self::expiring_batches) collected into a `Vec`.
    pub async fn expiring_batches_list(
        &self,
        tenant: &TenantContext,
        today: NaiveDate,
        within_days: i64,
    ) -> DbResult<Vec<ExpiringBatch>> {
        self.expiring_batches(tenant, today, within_days)
            .try_collect()
            .await
    }
}

// =============================================================================
// Shared Transaction Steps
// =============================================================================

/// FEFO consumption inside a caller's transaction.
///
/// Each batch update is guarded on the remaining quantity, so no batch can
/// go below zero even if the rows changed after they were read.
pub(crate) async fn consume_fefo_in(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    product_id: &str,
    needed: i64,
) -> DbResult<Allocation> {
    let rows: Vec<(String, i64, i64)> = sqlx::query_as(
        r#"
        SELECT id, quantity, unit_cost_paise
        FROM product_batches
        WHERE tenant_id = ?1 AND product_id = ?2 AND quantity > 0
        ORDER BY expiry_date ASC, rowid ASC
        "#,
    )
    .bind(tenant_id)
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?;

    let batches: Vec<BatchStock> = rows
        .into_iter()
        .map(|(id, quantity, cost)| BatchStock::new(id, quantity).with_cost(cost))
        .collect();
    let allocation = fefo::allocate(&batches, needed);

    for deduction in &allocation.deductions {
        let result = sqlx::query(
            "UPDATE product_batches SET quantity = quantity - ?1 WHERE id = ?2 AND quantity >= ?1",
        )
        .bind(deduction.quantity)
        .bind(&deduction.batch_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::TransactionFailed(format!(
                "batch {} changed during consumption",
                deduction.batch_id
            )));
        }
    }

    if allocation.shortfall > 0 {
        debug!(
            product_id = %product_id,
            shortfall = allocation.shortfall,
            "Batches exhausted, remainder taken from untracked stock"
        );
    }

    Ok(allocation)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{new_batch, new_product, setup};

    #[tokio::test]
    async fn test_fefo_drains_earliest_batch_first() {
        let (db, tenant) = setup().await;
        let inventory = db.inventory();
        let product = inventory
            .create_product(&tenant, new_product("Dahi 400g", 0, 0))
            .await
            .unwrap();

        let today = Utc::now().date_naive();
        // inserted later-expiring first, so rowid order alone would be wrong
        let b2 = inventory
            .add_batch(&tenant, &product.id, new_batch("B2", today + Duration::days(9), 5))
            .await
            .unwrap();
        let b1 = inventory
            .add_batch(&tenant, &product.id, new_batch("B1", today + Duration::days(2), 5))
            .await
            .unwrap();

        let taken = inventory.consume_fefo(&tenant, &product.id, 7).await.unwrap();
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].batch_id, b1.id);
        assert_eq!(taken[0].quantity, 5);
        assert_eq!(taken[1].batch_id, b2.id);
        assert_eq!(taken[1].quantity, 2);

        let batches = inventory.list_batches(&tenant, &product.id).await.unwrap();
        assert_eq!(batches[0].id, b1.id);
        assert_eq!(batches[0].quantity, 0);
        assert_eq!(batches[1].quantity, 3);
    }

    #[tokio::test]
    async fn test_same_expiry_uses_insertion_order() {
        let (db, tenant) = setup().await;
        let inventory = db.inventory();
        let product = inventory
            .create_product(&tenant, new_product("Paneer 200g", 0, 0))
            .await
            .unwrap();

        let expiry = Utc::now().date_naive() + Duration::days(3);
        let first = inventory
            .add_batch(&tenant, &product.id, new_batch("A", expiry, 4))
            .await
            .unwrap();
        inventory
            .add_batch(&tenant, &product.id, new_batch("B", expiry, 4))
            .await
            .unwrap();

        let taken = inventory.consume_fefo(&tenant, &product.id, 3).await.unwrap();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].batch_id, first.id);
    }

    #[tokio::test]
    async fn test_add_batch_raises_aggregate_stock() {
        let (db, tenant) = setup().await;
        let inventory = db.inventory();
        let product = inventory
            .create_product(&tenant, new_product("Basmati 1kg", 50, 1000))
            .await
            .unwrap();

        inventory
            .add_batch(
                &tenant,
                &product.id,
                new_batch("LOT-7", Utc::now().date_naive() + Duration::days(5), 20),
            )
            .await
            .unwrap();

        let product = inventory.get_product(&tenant, &product.id).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 70);
    }

    #[tokio::test]
    async fn test_add_batch_for_unknown_product_writes_nothing() {
        let (db, tenant) = setup().await;
        let inventory = db.inventory();

        let err = inventory
            .add_batch(
                &tenant,
                "PRD-MISSING",
                new_batch("X", Utc::now().date_naive(), 5),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_batches")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_shortfall_is_tolerated() {
        let (db, tenant) = setup().await;
        let inventory = db.inventory();
        let product = inventory
            .create_product(&tenant, new_product("Atta 5kg", 10, 0))
            .await
            .unwrap();
        inventory
            .add_batch(
                &tenant,
                &product.id,
                new_batch("L1", Utc::now().date_naive() + Duration::days(30), 2),
            )
            .await
            .unwrap();

        let taken = inventory.consume_fefo(&tenant, &product.id, 5).await.unwrap();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].quantity, 2);

        // nothing left to take
        let taken = inventory.consume_fefo(&tenant, &product.id, 5).await.unwrap();
        assert!(taken.is_empty());
    }

    #[tokio::test]
    async fn test_batches_never_exceed_aggregate_stock() {
        let (db, tenant) = setup().await;
        let inventory = db.inventory();
        let product = inventory
            .create_product(&tenant, new_product("Ghee 1L", 3, 0))
            .await
            .unwrap();
        let today = Utc::now().date_naive();

        let steps: &[(&str, i64)] = &[("batch", 4), ("sell", 5), ("batch", 6), ("sell", 2), ("sell", 6)];
        for (i, (op, qty)) in steps.iter().enumerate() {
            match *op {
                "batch" => {
                    inventory
                        .add_batch(
                            &tenant,
                            &product.id,
                            new_batch(&format!("L{i}"), today + Duration::days(i as i64), *qty),
                        )
                        .await
                        .unwrap();
                }
                _ => {
                    assert!(inventory.adjust_stock(&tenant, &product.id, -qty).await.unwrap());
                    inventory.consume_fefo(&tenant, &product.id, *qty).await.unwrap();
                }
            }

            let stock = inventory
                .get_product(&tenant, &product.id)
                .await
                .unwrap()
                .unwrap()
                .stock_quantity;
            let in_batches: i64 = inventory
                .list_batches(&tenant, &product.id)
                .await
                .unwrap()
                .iter()
                .map(|b| b.quantity)
                .sum();
            assert!(in_batches <= stock, "step {i}: batches {in_batches} > stock {stock}");
        }
    }

    #[tokio::test]
    async fn test_adjust_stock() {
        let (db, tenant) = setup().await;
        let inventory = db.inventory();
        let product = inventory
            .create_product(&tenant, new_product("Sugar 1kg", 5, 0))
            .await
            .unwrap();

        assert!(inventory.adjust_stock(&tenant, &product.id, 10).await.unwrap());
        assert!(inventory.adjust_stock(&tenant, &product.id, -15).await.unwrap());

        let err = inventory
            .adjust_stock(&tenant, &product.id, -1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 0, requested: 1, .. })
        ));

        // unknown product is a silent no-op
        assert!(!inventory.adjust_stock(&tenant, "PRD-NOPE", 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_expiring_batches_window() {
        let (db, tenant) = setup().await;
        let inventory = db.inventory();
        let product = inventory
            .create_product(&tenant, new_product("Bread", 0, 0))
            .await
            .unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

        for (code, offset, qty) in [("late", 6, 3), ("past", -1, 3), ("soon", 1, 3), ("far", 30, 3), ("empty", 2, 1)] {
            inventory
                .add_batch(&tenant, &product.id, new_batch(code, today + Duration::days(offset), qty))
                .await
                .unwrap();
        }
        // a drained batch inside the window is not reported
        sqlx::query("UPDATE product_batches SET quantity = 0 WHERE batch_code = 'empty'")
            .execute(db.pool())
            .await
            .unwrap();

        let rows = inventory
            .expiring_batches_list(&tenant, today, 7)
            .await
            .unwrap();
        let codes: Vec<&str> = rows.iter().map(|r| r.batch_code.as_str()).collect();
        assert_eq!(codes, vec!["soon", "late"]);
        assert_eq!(rows[0].product_name, "Bread");

        // restartable: a fresh stream yields the same rows
        let again = inventory
            .expiring_batches_list(&tenant, today, 7)
            .await
            .unwrap();
        assert_eq!(again.len(), 2);

        assert!(inventory
            .expiring_batches_list(&tenant, today, -1)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let (db, tenant) = setup().await;
        let other = crate::test_support::add_tenant(&db, "acct-other").await;
        let inventory = db.inventory();

        let product = inventory
            .create_product(&tenant, new_product("Masala Chai", 10, 0))
            .await
            .unwrap();

        assert!(inventory.get_product(&other, &product.id).await.unwrap().is_none());
        assert!(inventory.list_products(&other).await.unwrap().is_empty());
        assert!(!inventory.adjust_stock(&other, &product.id, -5).await.unwrap());
        assert!(inventory
            .add_batch(&other, &product.id, new_batch("X", Utc::now().date_naive(), 1))
            .await
            .unwrap_err()
            .is_not_found());
        assert!(inventory
            .delete_product(&other, &product.id)
            .await
            .unwrap_err()
            .is_not_found());

        let product = inventory.get_product(&tenant, &product.id).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 10);
    }

    #[tokio::test]
    async fn test_delete_product_cascades_batches() {
        let (db, tenant) = setup().await;
        let inventory = db.inventory();
        let product = inventory
            .create_product(&tenant, new_product("Curd", 0, 0))
            .await
            .unwrap();
        inventory
            .add_batch(&tenant, &product.id, new_batch("C1", Utc::now().date_naive(), 2))
            .await
            .unwrap();

        inventory.delete_product(&tenant, &product.id).await.unwrap();
        assert!(inventory.list_batches(&tenant, &product.id).await.unwrap().is_empty());
    }
}
