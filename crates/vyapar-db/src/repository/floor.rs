//! # Floor Repository
//!
//! Restaurant tables, their current order and the order's item rows.
//!
//! ## Per-Order Critical Section
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POS: add_item / cancel_item      KDS: set_item_status                 │
//! │             │                              │                            │
//! │             ▼                              ▼                            │
//! │  BEGIN                                                                  │
//! │   UPDATE table_orders SET version = version + 1   ◄── write lock taken │
//! │          WHERE table_id = ? AND closed_at IS NULL     before any read  │
//! │          RETURNING ...                                                  │
//! │   SELECT order_items ... ORDER BY seq                                  │
//! │   TableOrder::<operation>()          (vyapar-core, pure)               │
//! │   INSERT / UPDATE / DELETE only the affected item rows                 │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The version bump is the first statement of every mutation, so a second
//! writer waits on SQLite's lock instead of reading a list that is about to
//! change. Callers that remember the version they displayed can pass it as
//! `expected_version` and get [`DbError::StaleVersion`] on a mismatch.
//!
//! A mutation that turns out to change nothing (dispatch with no pending
//! lines, a repeated status) is rolled back so the version stays put.

use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction as SqlxTransaction};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

use crate::error::{DbError, DbResult};
use crate::repository::begin_write;
use crate::repository::checkout::checkout_in;
use vyapar_core::ids::{self, Alphabet};
use vyapar_core::validation;
use vyapar_core::{
    CancelOutcome, CoreError, Dispatch, FloorTable, ItemEdit, ItemStatus, LoyaltyPolicy,
    NewOrderItem, NewTable, OrderItem, RestaurantTable, TableCheckout, TableOrder, TableStatus,
    TenantContext, Transaction, ValidationError,
};

const TABLE_COLUMNS: &str = "id, tenant_id, label, capacity, zone, pos_x, pos_y, status, \
     current_order_id, waiter_id, merged_with, created_at";

const ORDER_COLUMNS: &str = "id, tenant_id, table_id, version, created_at, closed_at";

const ITEM_COLUMNS: &str = "id, order_id, seq, product_id, name, section, quantity, \
     unit_price_paise, line_total_paise, status, created_at, ordered_at, served_at, cancelled_at";

/// An order after a mutation, plus what the mutation did.
#[derive(Debug, Clone)]
pub struct OrderChange<T> {
    pub order: TableOrder,
    pub outcome: T,
}

/// Repository for tables and table orders.
///
/// ## Usage
/// ```rust,ignore
/// let floor = db.floor();
///
/// floor.occupy(&tenant, &table.id).await?;
/// floor.add_item(&tenant, &table.id, item, None).await?;
///
/// let change = floor.dispatch_pending(&tenant, &table.id, None).await?;
/// if change.outcome.changed() {
///     // notify the kitchen
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FloorRepository {
    pool: SqlitePool,
    policy: LoyaltyPolicy,
}

impl FloorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        FloorRepository {
            pool,
            policy: LoyaltyPolicy::default(),
        }
    }

    /// Loyalty policy applied by [`checkout_table`](Self::checkout_table).
    pub fn with_policy(mut self, policy: LoyaltyPolicy) -> Self {
        self.policy = policy;
        self
    }

    // =========================================================================
    // Table Management
    // =========================================================================

    pub async fn add_table(&self, tenant: &TenantContext, new: NewTable) -> DbResult<RestaurantTable> {
        validation::validate_name(&new.label, "label").map_err(CoreError::from)?;
        validation::validate_capacity(new.capacity).map_err(CoreError::from)?;

        let table = RestaurantTable {
            id: ids::generate_id(16, Alphabet::Alphanumeric, "TBL-"),
            tenant_id: tenant.tenant_id().to_string(),
            label: new.label.trim().to_string(),
            capacity: new.capacity,
            zone: new.zone.filter(|z| !z.trim().is_empty()),
            pos_x: new.pos_x,
            pos_y: new.pos_y,
            status: TableStatus::Available,
            current_order_id: None,
            waiter_id: None,
            merged_with: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO restaurant_tables (
                id, tenant_id, label, capacity, zone, pos_x, pos_y, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&table.id)
        .bind(&table.tenant_id)
        .bind(&table.label)
        .bind(table.capacity)
        .bind(&table.zone)
        .bind(table.pos_x)
        .bind(table.pos_y)
        .bind(table.status)
        .bind(table.created_at)
        .execute(&self.pool)
        .await?;

        info!(tenant_id = %table.tenant_id, table_id = %table.id, label = %table.label, "Table added");
        Ok(table)
    }

    pub async fn get_table(
        &self,
        tenant: &TenantContext,
        table_id: &str,
    ) -> DbResult<Option<RestaurantTable>> {
        let mut conn = self.pool.acquire().await?;
        find_table(&mut conn, tenant.tenant_id(), table_id).await
    }

    pub async fn list_tables(&self, tenant: &TenantContext) -> DbResult<Vec<RestaurantTable>> {
        let tables = sqlx::query_as::<_, RestaurantTable>(&format!(
            "SELECT {TABLE_COLUMNS} FROM restaurant_tables WHERE tenant_id = ?1 ORDER BY label, id"
        ))
        .bind(tenant.tenant_id())
        .fetch_all(&self.pool)
        .await?;

        Ok(tables)
    }

    /// Removes a table that is available and has no order.
    pub async fn delete_table(&self, tenant: &TenantContext, table_id: &str) -> DbResult<()> {
        let mut tx = begin_write(&self.pool).await?;

        let result = sqlx::query(
            r#"
            DELETE FROM restaurant_tables
            WHERE id = ?1 AND tenant_id = ?2
              AND status = 'available' AND current_order_id IS NULL
            "#,
        )
        .bind(table_id)
        .bind(tenant.tenant_id())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(table_state_error(&mut tx, tenant.tenant_id(), table_id, "delete").await);
        }

        sqlx::query(
            "UPDATE restaurant_tables SET merged_with = NULL WHERE tenant_id = ?1 AND merged_with = ?2",
        )
        .bind(tenant.tenant_id())
        .bind(table_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(tenant_id = %tenant.tenant_id(), table_id = %table_id, "Table deleted");
        Ok(())
    }

    pub async fn update_position(
        &self,
        tenant: &TenantContext,
        table_id: &str,
        pos_x: i64,
        pos_y: i64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE restaurant_tables SET pos_x = ?1, pos_y = ?2 WHERE id = ?3 AND tenant_id = ?4",
        )
        .bind(pos_x)
        .bind(pos_y)
        .bind(table_id)
        .bind(tenant.tenant_id())
        .execute(&self.pool)
        .await?;

        ensure_table_touched(result.rows_affected(), table_id)
    }

    pub async fn update_capacity(
        &self,
        tenant: &TenantContext,
        table_id: &str,
        capacity: i64,
    ) -> DbResult<()> {
        validation::validate_capacity(capacity).map_err(CoreError::from)?;

        let result = sqlx::query(
            "UPDATE restaurant_tables SET capacity = ?1 WHERE id = ?2 AND tenant_id = ?3",
        )
        .bind(capacity)
        .bind(table_id)
        .bind(tenant.tenant_id())
        .execute(&self.pool)
        .await?;

        ensure_table_touched(result.rows_affected(), table_id)
    }

    /// Staff-set status.
    ///
    /// `AVAILABLE` and `RESERVED` need a table without an order,
    /// `BILL_REQUESTED` needs one. `OCCUPIED` is only reachable through
    /// [`occupy`](Self::occupy).
    pub async fn set_table_status(
        &self,
        tenant: &TenantContext,
        table_id: &str,
        status: TableStatus,
    ) -> DbResult<RestaurantTable> {
        let guard = match status {
            TableStatus::Occupied => {
                return Err(CoreError::from(ValidationError::NotAllowed {
                    field: "status".to_string(),
                    allowed: [
                        TableStatus::Available,
                        TableStatus::Reserved,
                        TableStatus::BillRequested,
                    ]
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect(),
                })
                .into())
            }
            TableStatus::Available | TableStatus::Reserved => "current_order_id IS NULL",
            TableStatus::BillRequested => "current_order_id IS NOT NULL",
        };

        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(&format!(
            "UPDATE restaurant_tables SET status = ?1 WHERE id = ?2 AND tenant_id = ?3 AND {guard}"
        ))
        .bind(status)
        .bind(table_id)
        .bind(tenant.tenant_id())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(table_state_error(&mut conn, tenant.tenant_id(), table_id, "change status").await);
        }

        debug!(table_id = %table_id, status = %status, "Table status set");
        find_table(&mut conn, tenant.tenant_id(), table_id)
            .await?
            .ok_or_else(|| CoreError::TableNotFound(table_id.to_string()).into())
    }

    /// Hands the table to another waiter, or clears the assignment.
    pub async fn assign_waiter(
        &self,
        tenant: &TenantContext,
        table_id: &str,
        waiter_id: Option<&str>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE restaurant_tables SET waiter_id = ?1 WHERE id = ?2 AND tenant_id = ?3",
        )
        .bind(waiter_id)
        .bind(table_id)
        .bind(tenant.tenant_id())
        .execute(&self.pool)
        .await?;

        ensure_table_touched(result.rows_affected(), table_id)
    }

    // =========================================================================
    // Occupancy
    // =========================================================================

    /// Opens a fresh, empty order on an available (or reserved) table.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn occupy(&self, tenant: &TenantContext, table_id: &str) -> DbResult<TableOrder> {
        let order = TableOrder {
            id: ids::generate_id(16, Alphabet::Alphanumeric, "ORD-"),
            tenant_id: tenant.tenant_id().to_string(),
            table_id: table_id.to_string(),
            version: 0,
            created_at: Utc::now(),
            closed_at: None,
            items: Vec::new(),
        };

        let mut tx = begin_write(&self.pool).await?;

        let result = sqlx::query(
            r#"
            UPDATE restaurant_tables
            SET status = 'occupied', current_order_id = ?1
            WHERE id = ?2 AND tenant_id = ?3
              AND status IN ('available', 'reserved') AND current_order_id IS NULL
            "#,
        )
        .bind(&order.id)
        .bind(table_id)
        .bind(tenant.tenant_id())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(table_state_error(&mut tx, tenant.tenant_id(), table_id, "occupy").await);
        }

        sqlx::query(
            "INSERT INTO table_orders (id, tenant_id, table_id, version, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&order.id)
        .bind(&order.tenant_id)
        .bind(&order.table_id)
        .bind(order.version)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(order_id = %order.id, "Table occupied");
        Ok(order)
    }

    /// Drops the current order without a sale and makes the table available.
    ///
    /// Returns the id of the order that was closed, if there was one.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn free(&self, tenant: &TenantContext, table_id: &str) -> DbResult<Option<String>> {
        let mut tx = begin_write(&self.pool).await?;

        let closed: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE table_orders
            SET closed_at = ?1, close_reason = 'freed', version = version + 1
            WHERE tenant_id = ?2 AND table_id = ?3 AND closed_at IS NULL
            RETURNING id
            "#,
        )
        .bind(Utc::now())
        .bind(tenant.tenant_id())
        .bind(table_id)
        .fetch_optional(&mut *tx)
        .await?;

        release_table(&mut tx, tenant.tenant_id(), table_id).await?;

        tx.commit().await?;
        info!(order_id = ?closed, "Table freed");
        Ok(closed)
    }

    // =========================================================================
    // Merge
    // =========================================================================

    /// Points every child at `parent_id`. Occupancy is left alone.
    pub async fn merge(
        &self,
        tenant: &TenantContext,
        parent_id: &str,
        child_ids: &[String],
    ) -> DbResult<()> {
        if child_ids.is_empty() {
            return Err(CoreError::from(ValidationError::Required {
                field: "child_ids".to_string(),
            })
            .into());
        }

        let mut tx = begin_write(&self.pool).await?;

        let parent = find_table(&mut tx, tenant.tenant_id(), parent_id)
            .await?
            .ok_or_else(|| CoreError::TableNotFound(parent_id.to_string()))?;
        if parent.merged_with.is_some() {
            return Err(CoreError::from(ValidationError::Rejected {
                field: "parent_id".to_string(),
                reason: format!("table {parent_id} is itself merged into another table"),
            })
            .into());
        }

        for child_id in child_ids {
            if child_id == parent_id {
                return Err(CoreError::from(ValidationError::Rejected {
                    field: "child_ids".to_string(),
                    reason: "a table cannot be merged into itself".to_string(),
                })
                .into());
            }

            let result = sqlx::query(
                "UPDATE restaurant_tables SET merged_with = ?1 WHERE id = ?2 AND tenant_id = ?3",
            )
            .bind(parent_id)
            .bind(child_id)
            .bind(tenant.tenant_id())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(CoreError::TableNotFound(child_id.clone()).into());
            }
        }

        // a child that was itself a parent hands its children over
        for child_id in child_ids {
            sqlx::query(
                "UPDATE restaurant_tables SET merged_with = ?1 WHERE tenant_id = ?2 AND merged_with = ?3",
            )
            .bind(parent_id)
            .bind(tenant.tenant_id())
            .bind(child_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(parent_id = %parent_id, children = child_ids.len(), "Tables merged");
        Ok(())
    }

    /// Clears the table's own merge pointer and, when it is a parent, the
    /// pointers of all its children. Returns how many tables changed.
    pub async fn unmerge(&self, tenant: &TenantContext, table_id: &str) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE restaurant_tables
            SET merged_with = NULL
            WHERE tenant_id = ?1 AND merged_with IS NOT NULL
              AND (id = ?2 OR merged_with = ?2)
            "#,
        )
        .bind(tenant.tenant_id())
        .bind(table_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 && self.get_table(tenant, table_id).await?.is_none() {
            return Err(CoreError::TableNotFound(table_id.to_string()).into());
        }

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Every table with its current order, for the floor plan.
    pub async fn floor_status(&self, tenant: &TenantContext) -> DbResult<Vec<FloorTable>> {
        let tables = self.list_tables(tenant).await?;
        let mut orders: HashMap<String, TableOrder> = self
            .open_orders(tenant)
            .await?
            .into_iter()
            .map(|o| (o.table_id.clone(), o))
            .collect();

        Ok(tables
            .into_iter()
            .map(|table| {
                let order = orders.remove(&table.id);
                FloorTable { table, order }
            })
            .collect())
    }

    pub async fn get_order(
        &self,
        tenant: &TenantContext,
        table_id: &str,
    ) -> DbResult<Option<TableOrder>> {
        let mut conn = self.pool.acquire().await?;
        let order = sqlx::query_as::<_, TableOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM table_orders WHERE tenant_id = ?1 AND table_id = ?2 AND closed_at IS NULL"
        ))
        .bind(tenant.tenant_id())
        .bind(table_id)
        .fetch_optional(&mut *conn)
        .await?;

        match order {
            Some(mut order) => {
                order.items = load_items(&mut conn, &order.id).await?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    /// Lines of the current order that the kitchen has received.
    pub async fn kot_history(
        &self,
        tenant: &TenantContext,
        table_id: &str,
    ) -> DbResult<Vec<OrderItem>> {
        if let Some(order) = self.get_order(tenant, table_id).await? {
            return Ok(order.kot_history());
        }
        let mut conn = self.pool.acquire().await?;
        Err(no_order_error(&mut conn, tenant.tenant_id(), table_id).await)
    }

    /// Open orders with at least one dispatched line, oldest first. This is
    /// what a kitchen display loads when it connects.
    pub async fn active_orders(&self, tenant: &TenantContext) -> DbResult<Vec<TableOrder>> {
        Ok(self
            .open_orders(tenant)
            .await?
            .into_iter()
            .filter(TableOrder::has_dispatched)
            .collect())
    }

    async fn open_orders(&self, tenant: &TenantContext) -> DbResult<Vec<TableOrder>> {
        let mut orders = sqlx::query_as::<_, TableOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM table_orders WHERE tenant_id = ?1 AND closed_at IS NULL ORDER BY created_at, id"
        ))
        .bind(tenant.tenant_id())
        .fetch_all(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT i.id, i.order_id, i.seq, i.product_id, i.name, i.section, i.quantity,
                   i.unit_price_paise, i.line_total_paise, i.status, i.created_at,
                   i.ordered_at, i.served_at, i.cancelled_at
            FROM order_items i
            INNER JOIN table_orders o ON o.id = i.order_id
            WHERE o.tenant_id = ?1 AND o.closed_at IS NULL
            ORDER BY i.order_id, i.seq
            "#,
        )
        .bind(tenant.tenant_id())
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<String, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id.clone()).or_default().push(item);
        }
        for order in &mut orders {
            order.items = by_order.remove(&order.id).unwrap_or_default();
        }

        Ok(orders)
    }

    // =========================================================================
    // Order Mutations
    // =========================================================================

    /// Adds a line, merging into a still-pending line of the same product.
    #[instrument(skip(self, tenant, item), fields(tenant_id = %tenant.tenant_id(), product_id = %item.product_id))]
    pub async fn add_item(
        &self,
        tenant: &TenantContext,
        table_id: &str,
        mut item: NewOrderItem,
        expected_version: Option<i64>,
    ) -> DbResult<OrderChange<ItemEdit>> {
        let mut tx = begin_write(&self.pool).await?;
        let mut order = lock_order(&mut tx, tenant.tenant_id(), table_id, expected_version).await?;

        let category: Option<Option<String>> = sqlx::query_scalar(
            "SELECT category FROM products WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(&item.product_id)
        .bind(tenant.tenant_id())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(category) = category else {
            return Err(CoreError::ProductNotFound(item.product_id).into());
        };
        if item.category.is_none() {
            item.category = category;
        }

        let edit = order.add_item(item, Utc::now())?;
        let line = &order.items[edit.index()];
        match edit {
            ItemEdit::Merged { .. } => save_item(&mut tx, line).await?,
            ItemEdit::Appended { .. } => insert_item(&mut tx, line).await?,
        }

        tx.commit().await?;
        debug!(order_id = %order.id, version = order.version, edit = ?edit, "Item added");
        Ok(OrderChange {
            order,
            outcome: edit,
        })
    }

    /// Physically removes a line that has not been sent to the kitchen.
    pub async fn remove_item(
        &self,
        tenant: &TenantContext,
        table_id: &str,
        index: usize,
        expected_version: Option<i64>,
    ) -> DbResult<OrderChange<OrderItem>> {
        let mut tx = begin_write(&self.pool).await?;
        let mut order = lock_order(&mut tx, tenant.tenant_id(), table_id, expected_version).await?;

        let removed = order.remove_item(index)?;
        delete_item(&mut tx, &removed.id).await?;

        tx.commit().await?;
        debug!(order_id = %order.id, index, "Pending item removed");
        Ok(OrderChange {
            order,
            outcome: removed,
        })
    }

    /// Sends every pending line to the kitchen (KOT).
    ///
    /// With nothing pending the outcome reports no change and nothing is
    /// written, so a retried dispatch cannot notify the kitchen twice.
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn dispatch_pending(
        &self,
        tenant: &TenantContext,
        table_id: &str,
        expected_version: Option<i64>,
    ) -> DbResult<OrderChange<Dispatch>> {
        let mut tx = begin_write(&self.pool).await?;
        let mut order = lock_order(&mut tx, tenant.tenant_id(), table_id, expected_version).await?;

        let dispatch = order.dispatch_pending(Utc::now());
        if !dispatch.changed() {
            debug!(order_id = %order.id, "No new items to dispatch");
            return unchanged(tx, order, dispatch).await;
        }

        for &index in &dispatch.indices {
            save_item(&mut tx, &order.items[index]).await?;
        }

        tx.commit().await?;
        info!(
            order_id = %order.id,
            lines = dispatch.indices.len(),
            sections = ?dispatch.sections,
            "KOT dispatched"
        );
        Ok(OrderChange {
            order,
            outcome: dispatch,
        })
    }

    /// Cancels a line: pending lines are removed, dispatched lines are kept
    /// and marked cancelled.
    pub async fn cancel_item(
        &self,
        tenant: &TenantContext,
        table_id: &str,
        index: usize,
        expected_version: Option<i64>,
    ) -> DbResult<OrderChange<CancelOutcome>> {
        let mut tx = begin_write(&self.pool).await?;
        let mut order = lock_order(&mut tx, tenant.tenant_id(), table_id, expected_version).await?;

        let outcome = order.cancel_item(index, Utc::now())?;
        if let CancelOutcome::Unchanged { .. } = outcome {
            return unchanged(tx, order, outcome).await;
        }
        match &outcome {
            CancelOutcome::Removed(item) => delete_item(&mut tx, &item.id).await?,
            CancelOutcome::Cancelled { index } => save_item(&mut tx, &order.items[*index]).await?,
            CancelOutcome::Unchanged { .. } => {}
        }

        tx.commit().await?;
        debug!(order_id = %order.id, outcome = ?outcome, "Item cancelled");
        Ok(OrderChange { order, outcome })
    }

    /// Kitchen-driven status change.
    ///
    /// The outcome is `false` when the line already had `status`.
    pub async fn set_item_status(
        &self,
        tenant: &TenantContext,
        table_id: &str,
        index: usize,
        status: ItemStatus,
        expected_version: Option<i64>,
    ) -> DbResult<OrderChange<bool>> {
        let mut tx = begin_write(&self.pool).await?;
        let mut order = lock_order(&mut tx, tenant.tenant_id(), table_id, expected_version).await?;

        let changed = order.set_item_status(index, status, Utc::now())?;
        if !changed {
            return unchanged(tx, order, false).await;
        }
        save_item(&mut tx, &order.items[index]).await?;

        tx.commit().await?;
        debug!(order_id = %order.id, index, status = %status, "Item status changed");
        Ok(OrderChange {
            order,
            outcome: true,
        })
    }

    // =========================================================================
    // Table Checkout
    // =========================================================================

    /// Bills the current order and frees the table, all in one transaction.
    ///
    /// Cancelled lines are left off the bill. The returned order is the one
    /// that was closed.
    #[instrument(skip(self, tenant, payment), fields(tenant_id = %tenant.tenant_id()))]
    pub async fn checkout_table(
        &self,
        tenant: &TenantContext,
        table_id: &str,
        payment: &TableCheckout,
    ) -> DbResult<OrderChange<Transaction>> {
        let mut tx = begin_write(&self.pool).await?;
        let mut order =
            lock_order(&mut tx, tenant.tenant_id(), table_id, payment.expected_version).await?;

        let request = order.to_checkout(payment);
        let transaction = checkout_in(&mut tx, tenant.tenant_id(), &request, &self.policy).await?;

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE table_orders
            SET closed_at = ?1, close_reason = 'checked_out', transaction_id = ?2
            WHERE id = ?3
            "#,
        )
        .bind(now)
        .bind(&transaction.id)
        .bind(&order.id)
        .execute(&mut *tx)
        .await?;
        release_table(&mut tx, tenant.tenant_id(), table_id).await?;

        tx.commit().await?;
        order.closed_at = Some(now);

        info!(
            order_id = %order.id,
            transaction_id = %transaction.id,
            total = transaction.total_amount_paise,
            "Table checked out"
        );
        Ok(OrderChange {
            order,
            outcome: transaction,
        })
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Enters the order's critical section: bumps the version, then loads the
/// items.
async fn lock_order(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    table_id: &str,
    expected_version: Option<i64>,
) -> DbResult<TableOrder> {
    let order = sqlx::query_as::<_, TableOrder>(&format!(
        r#"
        UPDATE table_orders
        SET version = version + 1
        WHERE tenant_id = ?1 AND table_id = ?2 AND closed_at IS NULL
        RETURNING {ORDER_COLUMNS}
        "#
    ))
    .bind(tenant_id)
    .bind(table_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(mut order) = order else {
        return Err(no_order_error(conn, tenant_id, table_id).await);
    };

    if let Some(expected) = expected_version {
        let actual = order.version - 1;
        if actual != expected {
            return Err(DbError::StaleVersion {
                order_id: order.id,
                expected,
                actual,
            });
        }
    }

    order.items = load_items(conn, &order.id).await?;
    Ok(order)
}

/// Rolls back a mutation that changed nothing and reports the order as it
/// was before the version bump.
async fn unchanged<T>(
    tx: SqlxTransaction<'_, Sqlite>,
    mut order: TableOrder,
    outcome: T,
) -> DbResult<OrderChange<T>> {
    tx.rollback().await?;
    order.version -= 1;
    Ok(OrderChange { order, outcome })
}

async fn load_items(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY seq"
    ))
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
    sqlx::query(&format!(
        "INSERT INTO order_items ({ITEM_COLUMNS}) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
    ))
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(item.seq)
    .bind(&item.product_id)
    .bind(&item.name)
    .bind(item.section)
    .bind(item.quantity)
    .bind(item.unit_price_paise)
    .bind(item.line_total_paise)
    .bind(item.status)
    .bind(item.created_at)
    .bind(item.ordered_at)
    .bind(item.served_at)
    .bind(item.cancelled_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Writes back the mutable columns of one line.
async fn save_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE order_items
        SET quantity = ?1, line_total_paise = ?2, status = ?3,
            ordered_at = ?4, served_at = ?5, cancelled_at = ?6
        WHERE id = ?7
        "#,
    )
    .bind(item.quantity)
    .bind(item.line_total_paise)
    .bind(item.status)
    .bind(item.ordered_at)
    .bind(item.served_at)
    .bind(item.cancelled_at)
    .bind(&item.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn delete_item(conn: &mut SqliteConnection, item_id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM order_items WHERE id = ?1")
        .bind(item_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn release_table(conn: &mut SqliteConnection, tenant_id: &str, table_id: &str) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE restaurant_tables
        SET status = 'available', current_order_id = NULL
        WHERE id = ?1 AND tenant_id = ?2
        "#,
    )
    .bind(table_id)
    .bind(tenant_id)
    .execute(&mut *conn)
    .await?;

    ensure_table_touched(result.rows_affected(), table_id)
}

async fn find_table(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    table_id: &str,
) -> DbResult<Option<RestaurantTable>> {
    let table = sqlx::query_as::<_, RestaurantTable>(&format!(
        "SELECT {TABLE_COLUMNS} FROM restaurant_tables WHERE id = ?1 AND tenant_id = ?2"
    ))
    .bind(table_id)
    .bind(tenant_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(table)
}

fn ensure_table_touched(rows_affected: u64, table_id: &str) -> DbResult<()> {
    if rows_affected == 0 {
        return Err(CoreError::TableNotFound(table_id.to_string()).into());
    }
    Ok(())
}

/// Why a table-state guard matched no row: missing table, or wrong state.
async fn table_state_error(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    table_id: &str,
    action: &'static str,
) -> DbError {
    match find_table(conn, tenant_id, table_id).await {
        Ok(Some(table)) => {
            let status = if table.current_order_id.is_some() && table.status != TableStatus::Occupied {
                format!("{} with an open order", table.status)
            } else {
                table.status.to_string()
            };
            CoreError::TableNotAvailable {
                table_id: table_id.to_string(),
                status,
                action,
            }
            .into()
        }
        Ok(None) => CoreError::TableNotFound(table_id.to_string()).into(),
        Err(e) => e,
    }
}

/// Why there is no open order: missing table, or a table with no order.
async fn no_order_error(conn: &mut SqliteConnection, tenant_id: &str, table_id: &str) -> DbError {
    match find_table(conn, tenant_id, table_id).await {
        Ok(Some(_)) => CoreError::NoActiveOrder(table_id.to_string()).into(),
        Ok(None) => CoreError::TableNotFound(table_id.to_string()).into(),
        Err(e) => e,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{add_tenant, new_product, setup, setup_file};
    use crate::Database;
    use vyapar_core::{KitchenSection, NewProduct, PaymentMethod};

    struct Floor {
        db: Database,
        tenant: TenantContext,
        table: RestaurantTable,
        paneer: String,
        lassi: String,
    }

    async fn floor() -> Floor {
        let (db, tenant) = setup().await;
        let paneer = db
            .inventory()
            .create_product(&tenant, new_product("Paneer Tikka", 20, 9_000))
            .await
            .unwrap()
            .id;
        let lassi = db
            .inventory()
            .create_product(
                &tenant,
                NewProduct {
                    category: Some("Beverages".into()),
                    ..new_product("Sweet Lassi", 20, 2_000)
                },
            )
            .await
            .unwrap()
            .id;
        let table = db.floor().add_table(&tenant, new_table("T1")).await.unwrap();
        Floor {
            db,
            tenant,
            table,
            paneer,
            lassi,
        }
    }

    fn new_table(label: &str) -> NewTable {
        NewTable {
            label: label.to_string(),
            capacity: 4,
            zone: Some("Main Hall".into()),
            pos_x: 0,
            pos_y: 0,
        }
    }

    fn item(product_id: &str, name: &str, quantity: i64) -> NewOrderItem {
        NewOrderItem {
            product_id: product_id.to_string(),
            name: name.to_string(),
            category: None,
            quantity,
            unit_price_paise: 25_000,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_edits_on_one_table_serialize() {
        let (_dir, db, tenant) = setup_file().await;
        let mut menu = Vec::new();
        for name in ["Paneer Tikka", "Dal Makhani"] {
            let product = db
                .inventory()
                .create_product(&tenant, new_product(name, 50, 5_000))
                .await
                .unwrap();
            menu.push(product.id);
        }
        let table = db.floor().add_table(&tenant, new_table("T9")).await.unwrap();
        db.floor().occupy(&tenant, &table.id).await.unwrap();

        let adds: Vec<_> = (0..10)
            .map(|n| {
                let (db, tenant, table_id) = (db.clone(), tenant.clone(), table.id.clone());
                let dish = item(&menu[n % 2], "Dish", 1);
                tokio::spawn(async move { db.floor().add_item(&tenant, &table_id, dish, None).await })
            })
            .collect();
        for add in adds {
            add.await.unwrap().unwrap();
        }

        let order = db.floor().get_order(&tenant, &table.id).await.unwrap().unwrap();
        assert_eq!(order.version, 10);
        assert_eq!(order.items.len(), 2);
        assert!(order.items.iter().all(|i| i.quantity == 5));

        db.floor().dispatch_pending(&tenant, &table.id, None).await.unwrap();

        let marks: Vec<_> = (0..6)
            .map(|_| {
                let (db, tenant, table_id) = (db.clone(), tenant.clone(), table.id.clone());
                tokio::spawn(async move {
                    db.floor()
                        .set_item_status(&tenant, &table_id, 0, ItemStatus::Served, None)
                        .await
                })
            })
            .collect();
        let mut changed = 0;
        for mark in marks {
            if mark.await.unwrap().unwrap().outcome {
                changed += 1;
            }
        }
        assert_eq!(changed, 1);

        let order = db.floor().get_order(&tenant, &table.id).await.unwrap().unwrap();
        assert_eq!(order.version, 12);
        assert_eq!(order.items[0].status, ItemStatus::Served);
    }

    #[tokio::test]
    async fn test_occupy_twice_is_rejected() {
        let f = floor().await;
        let repo = f.db.floor();

        let order = repo.occupy(&f.tenant, &f.table.id).await.unwrap();
        assert!(order.items.is_empty());

        let table = repo.get_table(&f.tenant, &f.table.id).await.unwrap().unwrap();
        assert_eq!(table.status, TableStatus::Occupied);
        assert_eq!(table.current_order_id.as_deref(), Some(order.id.as_str()));

        let err = repo.occupy(&f.tenant, &f.table.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::TableNotAvailable { action: "occupy", .. })
        ));

        let err = repo.occupy(&f.tenant, "TBL-NOPE").await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::TableNotFound(_))));
    }

    #[tokio::test]
    async fn test_merge_only_while_pending() {
        let f = floor().await;
        let repo = f.db.floor();
        repo.occupy(&f.tenant, &f.table.id).await.unwrap();

        let first = repo
            .add_item(&f.tenant, &f.table.id, item(&f.paneer, "Paneer Tikka", 1), None)
            .await
            .unwrap();
        assert_eq!(first.outcome, ItemEdit::Appended { index: 0 });

        let second = repo
            .add_item(&f.tenant, &f.table.id, item(&f.paneer, "Paneer Tikka", 2), None)
            .await
            .unwrap();
        assert_eq!(second.outcome, ItemEdit::Merged { index: 0 });
        assert_eq!(second.order.items.len(), 1);
        assert_eq!(second.order.items[0].quantity, 3);
        assert_eq!(second.order.items[0].line_total_paise, 75_000);

        repo.dispatch_pending(&f.tenant, &f.table.id, None).await.unwrap();

        let third = repo
            .add_item(&f.tenant, &f.table.id, item(&f.paneer, "Paneer Tikka", 1), None)
            .await
            .unwrap();
        assert_eq!(third.outcome, ItemEdit::Appended { index: 1 });

        let order = repo.get_order(&f.tenant, &f.table.id).await.unwrap().unwrap();
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].status, ItemStatus::Ordered);
        assert_eq!(order.items[0].quantity, 3);
        assert_eq!(order.items[1].status, ItemStatus::Pending);
        assert_eq!(order.items[1].quantity, 1);
    }

    #[tokio::test]
    async fn test_section_from_product_category() {
        let f = floor().await;
        let repo = f.db.floor();
        repo.occupy(&f.tenant, &f.table.id).await.unwrap();

        let change = repo
            .add_item(&f.tenant, &f.table.id, item(&f.lassi, "Sweet Lassi", 2), None)
            .await
            .unwrap();
        assert_eq!(change.order.items[0].section, KitchenSection::Bar);

        let err = repo
            .add_item(&f.tenant, &f.table.id, item("PRD-GHOST", "Ghost", 1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_dispatch_is_idempotent() {
        let f = floor().await;
        let repo = f.db.floor();
        repo.occupy(&f.tenant, &f.table.id).await.unwrap();
        repo.add_item(&f.tenant, &f.table.id, item(&f.paneer, "Paneer Tikka", 1), None)
            .await
            .unwrap();
        repo.add_item(&f.tenant, &f.table.id, item(&f.lassi, "Sweet Lassi", 1), None)
            .await
            .unwrap();

        let sent = repo.dispatch_pending(&f.tenant, &f.table.id, None).await.unwrap();
        assert!(sent.outcome.changed());
        assert_eq!(sent.outcome.indices, vec![0, 1]);
        assert!(sent.outcome.sections.contains(&KitchenSection::Kitchen));
        assert!(sent.outcome.sections.contains(&KitchenSection::Bar));
        assert!(sent.order.items.iter().all(|i| i.ordered_at.is_some()));

        let again = repo.dispatch_pending(&f.tenant, &f.table.id, None).await.unwrap();
        assert!(!again.outcome.changed());
        assert_eq!(again.order.version, sent.order.version);

        let stored = repo.get_order(&f.tenant, &f.table.id).await.unwrap().unwrap();
        assert_eq!(stored.version, sent.order.version);
        assert_eq!(stored.items, sent.order.items);
    }

    #[tokio::test]
    async fn test_cancel_policy() {
        let f = floor().await;
        let repo = f.db.floor();
        repo.occupy(&f.tenant, &f.table.id).await.unwrap();
        repo.add_item(&f.tenant, &f.table.id, item(&f.paneer, "Paneer Tikka", 1), None)
            .await
            .unwrap();
        repo.add_item(&f.tenant, &f.table.id, item(&f.lassi, "Sweet Lassi", 1), None)
            .await
            .unwrap();
        repo.dispatch_pending(&f.tenant, &f.table.id, None).await.unwrap();
        repo.add_item(&f.tenant, &f.table.id, item(&f.lassi, "Sweet Lassi", 1), None)
            .await
            .unwrap();

        // pending line disappears
        let change = repo.cancel_item(&f.tenant, &f.table.id, 2, None).await.unwrap();
        assert!(matches!(change.outcome, CancelOutcome::Removed(_)));
        assert_eq!(change.order.items.len(), 2);

        // dispatched line stays, marked cancelled
        let change = repo.cancel_item(&f.tenant, &f.table.id, 1, None).await.unwrap();
        assert_eq!(change.outcome, CancelOutcome::Cancelled { index: 1 });
        let order = repo.get_order(&f.tenant, &f.table.id).await.unwrap().unwrap();
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[1].status, ItemStatus::Cancelled);
        assert!(order.items[1].cancelled_at.is_some());

        // served lines cannot be cancelled
        repo.set_item_status(&f.tenant, &f.table.id, 0, ItemStatus::Served, None)
            .await
            .unwrap();
        let err = repo.cancel_item(&f.tenant, &f.table.id, 0, None).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidTransition { .. })));

        let history = repo.kot_history(&f.tenant, &f.table.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, ItemStatus::Served);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let f = floor().await;
        let repo = f.db.floor();
        repo.occupy(&f.tenant, &f.table.id).await.unwrap();
        repo.add_item(&f.tenant, &f.table.id, item(&f.paneer, "Paneer Tikka", 1), None)
            .await
            .unwrap();

        // pending cannot jump to served
        let err = repo
            .set_item_status(&f.tenant, &f.table.id, 0, ItemStatus::Served, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidTransition { .. })));

        repo.dispatch_pending(&f.tenant, &f.table.id, None).await.unwrap();
        let served = repo
            .set_item_status(&f.tenant, &f.table.id, 0, ItemStatus::Served, None)
            .await
            .unwrap();
        assert!(served.outcome);
        assert!(served.order.items[0].served_at.is_some());

        let repeat = repo
            .set_item_status(&f.tenant, &f.table.id, 0, ItemStatus::Served, None)
            .await
            .unwrap();
        assert!(!repeat.outcome);
        assert_eq!(repeat.order.version, served.order.version);

        let err = repo
            .set_item_status(&f.tenant, &f.table.id, 0, ItemStatus::Pending, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidTransition { .. })));

        let err = repo
            .set_item_status(&f.tenant, &f.table.id, 5, ItemStatus::Served, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ItemIndexOutOfRange { index: 5, len: 1 })
        ));
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected() {
        let f = floor().await;
        let repo = f.db.floor();
        let order = repo.occupy(&f.tenant, &f.table.id).await.unwrap();
        assert_eq!(order.version, 0);

        let change = repo
            .add_item(&f.tenant, &f.table.id, item(&f.paneer, "Paneer Tikka", 1), Some(0))
            .await
            .unwrap();
        assert_eq!(change.order.version, 1);

        // a second client still showing version 0
        let err = repo
            .add_item(&f.tenant, &f.table.id, item(&f.lassi, "Sweet Lassi", 1), Some(0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::StaleVersion { expected: 0, actual: 1, .. }
        ));

        let order = repo.get_order(&f.tenant, &f.table.id).await.unwrap().unwrap();
        assert_eq!(order.version, 1);
        assert_eq!(order.items.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_only_pending() {
        let f = floor().await;
        let repo = f.db.floor();
        repo.occupy(&f.tenant, &f.table.id).await.unwrap();
        repo.add_item(&f.tenant, &f.table.id, item(&f.paneer, "Paneer Tikka", 1), None)
            .await
            .unwrap();
        repo.dispatch_pending(&f.tenant, &f.table.id, None).await.unwrap();
        repo.add_item(&f.tenant, &f.table.id, item(&f.lassi, "Sweet Lassi", 1), None)
            .await
            .unwrap();

        let err = repo.remove_item(&f.tenant, &f.table.id, 0, None).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ItemAlreadyDispatched { index: 0, .. })
        ));

        let removed = repo.remove_item(&f.tenant, &f.table.id, 1, None).await.unwrap();
        assert_eq!(removed.outcome.product_id, f.lassi);
        assert_eq!(removed.order.items.len(), 1);
    }

    #[tokio::test]
    async fn test_checkout_table() {
        let f = floor().await;
        let repo = f.db.floor();
        repo.occupy(&f.tenant, &f.table.id).await.unwrap();
        repo.add_item(&f.tenant, &f.table.id, item(&f.paneer, "Paneer Tikka", 2), None)
            .await
            .unwrap();
        repo.add_item(&f.tenant, &f.table.id, item(&f.lassi, "Sweet Lassi", 1), None)
            .await
            .unwrap();
        repo.dispatch_pending(&f.tenant, &f.table.id, None).await.unwrap();
        repo.cancel_item(&f.tenant, &f.table.id, 1, None).await.unwrap();

        let change = repo
            .checkout_table(
                &f.tenant,
                &f.table.id,
                &TableCheckout {
                    payment_method: PaymentMethod::Card,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let txn = change.outcome;
        assert_eq!(txn.items.len(), 1);
        assert_eq!(txn.total_amount_paise, 50_000);
        assert_eq!(txn.payment_method, PaymentMethod::Card);
        assert!(change.order.closed_at.is_some());

        let table = repo.get_table(&f.tenant, &f.table.id).await.unwrap().unwrap();
        assert_eq!(table.status, TableStatus::Available);
        assert!(table.current_order_id.is_none());
        assert!(repo.get_order(&f.tenant, &f.table.id).await.unwrap().is_none());

        let stock = f
            .db
            .inventory()
            .get_product(&f.tenant, &f.paneer)
            .await
            .unwrap()
            .unwrap()
            .stock_quantity;
        assert_eq!(stock, 18);

        // the table can be used again
        repo.occupy(&f.tenant, &f.table.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_table_checkout_keeps_order() {
        let f = floor().await;
        let repo = f.db.floor();
        repo.occupy(&f.tenant, &f.table.id).await.unwrap();

        let err = repo
            .checkout_table(&f.tenant, &f.table.id, &TableCheckout::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::EmptyCart)));

        let table = repo.get_table(&f.tenant, &f.table.id).await.unwrap().unwrap();
        assert_eq!(table.status, TableStatus::Occupied);
        let order = repo.get_order(&f.tenant, &f.table.id).await.unwrap().unwrap();
        assert_eq!(order.version, 0);
    }

    #[tokio::test]
    async fn test_free_closes_order() {
        let f = floor().await;
        let repo = f.db.floor();
        let order = repo.occupy(&f.tenant, &f.table.id).await.unwrap();
        repo.add_item(&f.tenant, &f.table.id, item(&f.paneer, "Paneer Tikka", 1), None)
            .await
            .unwrap();

        let closed = repo.free(&f.tenant, &f.table.id).await.unwrap();
        assert_eq!(closed.as_deref(), Some(order.id.as_str()));

        let table = repo.get_table(&f.tenant, &f.table.id).await.unwrap().unwrap();
        assert_eq!(table.status, TableStatus::Available);

        let err = repo
            .add_item(&f.tenant, &f.table.id, item(&f.paneer, "Paneer Tikka", 1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::NoActiveOrder(_))));

        // freeing an empty table is harmless
        assert!(repo.free(&f.tenant, &f.table.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_and_unmerge() {
        let f = floor().await;
        let repo = f.db.floor();
        let t2 = repo.add_table(&f.tenant, new_table("T2")).await.unwrap();
        let t3 = repo.add_table(&f.tenant, new_table("T3")).await.unwrap();

        repo.merge(&f.tenant, &f.table.id, &[t2.id.clone(), t3.id.clone()])
            .await
            .unwrap();
        let t2_row = repo.get_table(&f.tenant, &t2.id).await.unwrap().unwrap();
        assert_eq!(t2_row.merged_with.as_deref(), Some(f.table.id.as_str()));
        assert_eq!(t2_row.status, TableStatus::Available);

        // unmerging a child only touches that child
        assert_eq!(repo.unmerge(&f.tenant, &t2.id).await.unwrap(), 1);
        let t3_row = repo.get_table(&f.tenant, &t3.id).await.unwrap().unwrap();
        assert!(t3_row.merged_with.is_some());

        // unmerging the parent releases everyone
        repo.merge(&f.tenant, &f.table.id, &[t2.id.clone()]).await.unwrap();
        assert_eq!(repo.unmerge(&f.tenant, &f.table.id).await.unwrap(), 2);
        for table in repo.list_tables(&f.tenant).await.unwrap() {
            assert!(table.merged_with.is_none());
        }

        let err = repo
            .merge(&f.tenant, &f.table.id, &[f.table.id.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_table_management() {
        let f = floor().await;
        let repo = f.db.floor();

        repo.update_position(&f.tenant, &f.table.id, 3, 7).await.unwrap();
        repo.update_capacity(&f.tenant, &f.table.id, 6).await.unwrap();
        repo.assign_waiter(&f.tenant, &f.table.id, Some("waiter-raju"))
            .await
            .unwrap();
        let table = repo.get_table(&f.tenant, &f.table.id).await.unwrap().unwrap();
        assert_eq!((table.pos_x, table.pos_y, table.capacity), (3, 7, 6));
        assert_eq!(table.waiter_id.as_deref(), Some("waiter-raju"));

        assert!(repo.update_capacity(&f.tenant, &f.table.id, 0).await.is_err());

        // reserve, then occupy when the party arrives
        let table = repo
            .set_table_status(&f.tenant, &f.table.id, TableStatus::Reserved)
            .await
            .unwrap();
        assert_eq!(table.status, TableStatus::Reserved);
        repo.occupy(&f.tenant, &f.table.id).await.unwrap();

        // an occupied table cannot be marked available or deleted
        assert!(repo
            .set_table_status(&f.tenant, &f.table.id, TableStatus::Available)
            .await
            .is_err());
        let err = repo.delete_table(&f.tenant, &f.table.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::TableNotAvailable { action: "delete", .. })
        ));

        let table = repo
            .set_table_status(&f.tenant, &f.table.id, TableStatus::BillRequested)
            .await
            .unwrap();
        assert_eq!(table.status, TableStatus::BillRequested);
        assert!(table.current_order_id.is_some());

        repo.free(&f.tenant, &f.table.id).await.unwrap();
        repo.delete_table(&f.tenant, &f.table.id).await.unwrap();
        assert!(repo.get_table(&f.tenant, &f.table.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_floor_status_and_active_orders() {
        let f = floor().await;
        let repo = f.db.floor();
        let t2 = repo.add_table(&f.tenant, new_table("T2")).await.unwrap();
        repo.add_table(&f.tenant, new_table("T3")).await.unwrap();

        repo.occupy(&f.tenant, &f.table.id).await.unwrap();
        repo.occupy(&f.tenant, &t2.id).await.unwrap();
        repo.add_item(&f.tenant, &f.table.id, item(&f.paneer, "Paneer Tikka", 1), None)
            .await
            .unwrap();
        repo.add_item(&f.tenant, &t2.id, item(&f.lassi, "Sweet Lassi", 1), None)
            .await
            .unwrap();
        repo.dispatch_pending(&f.tenant, &f.table.id, None).await.unwrap();

        let floor = repo.floor_status(&f.tenant).await.unwrap();
        assert_eq!(floor.len(), 3);
        let with_orders = floor.iter().filter(|t| t.order.is_some()).count();
        assert_eq!(with_orders, 2);
        let t1 = floor.iter().find(|t| t.table.id == f.table.id).unwrap();
        assert_eq!(t1.order.as_ref().unwrap().items.len(), 1);

        let active = repo.active_orders(&f.tenant).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].table_id, f.table.id);
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let f = floor().await;
        let other = add_tenant(&f.db, "acct-other").await;
        let repo = f.db.floor();
        repo.occupy(&f.tenant, &f.table.id).await.unwrap();

        assert!(repo.floor_status(&other).await.unwrap().is_empty());
        assert!(repo.get_order(&other, &f.table.id).await.unwrap().is_none());

        let err = repo
            .add_item(&other, &f.table.id, item(&f.paneer, "Paneer Tikka", 1), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(repo.free(&other, &f.table.id).await.unwrap_err().is_not_found());
        assert!(repo.occupy(&other, &f.table.id).await.unwrap_err().is_not_found());

        let table = repo.get_table(&f.tenant, &f.table.id).await.unwrap().unwrap();
        assert_eq!(table.status, TableStatus::Occupied);
    }
}
