//! # Checkout Repository
//!
//! The checkout engine: one sale, one database transaction.
//!
//! ## Commit Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    checkout(tenant, request)                            │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   ├── load products + customer (tenant-scoped)                         │
//! │   ├── plan_checkout()          validation, profit, loyalty (pure)      │
//! │   ├── INSERT transactions, transaction_items                           │
//! │   ├── UPDATE products ... WHERE stock_quantity >= qty   (guarded)      │
//! │   ├── FEFO batch consumption + batch_consumptions rows                 │
//! │   └── UPDATE customers SET loyalty_points = loyalty_points + delta     │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any error before COMMIT drops the transaction: nothing is written.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guarded stock update is what keeps two concurrent checkouts from
//! both selling the last units: the second one sees zero affected rows and
//! aborts with `InsufficientStock`.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

use crate::error::{DbError, DbResult};
use crate::repository::begin_write;
use crate::repository::customer::CUSTOMER_COLUMNS;
use crate::repository::inventory::consume_fefo_in;
use vyapar_core::ids;
use vyapar_core::{
    plan_checkout, BatchDeduction, CheckoutRequest, CoreError, Customer, LoyaltyPolicy, Product,
    TenantContext, Transaction, TransactionItem,
};

#[derive(Debug, Clone)]
pub struct CheckoutRepository {
    pool: SqlitePool,
    policy: LoyaltyPolicy,
}

impl CheckoutRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CheckoutRepository {
            pool,
            policy: LoyaltyPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: LoyaltyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs a complete sale atomically and returns the stored transaction.
    #[instrument(skip(self, tenant, request), fields(tenant_id = %tenant.tenant_id(), lines = request.items.len()))]
    pub async fn checkout(
        &self,
        tenant: &TenantContext,
        request: &CheckoutRequest,
    ) -> DbResult<Transaction> {
        let mut tx = begin_write(&self.pool).await?;
        let transaction = checkout_in(&mut tx, tenant.tenant_id(), request, &self.policy).await?;
        tx.commit().await?;

        info!(
            transaction_id = %transaction.id,
            total = transaction.total_amount_paise,
            profit = transaction.total_profit_paise,
            "Checkout committed"
        );
        Ok(transaction)
    }

    /// A stored transaction with its lines.
    pub async fn get_transaction(
        &self,
        tenant: &TenantContext,
        id: &str,
    ) -> DbResult<Option<Transaction>> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, tenant_id, customer_id, total_amount_paise, total_profit_paise,
                   payment_method, points_redeemed, loyalty_delta, transaction_hash, created_at
            FROM transactions
            WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(id)
        .bind(tenant.tenant_id())
        .fetch_optional(&self.pool)
        .await?;

        let Some(mut transaction) = transaction else {
            return Ok(None);
        };

        transaction.items = sqlx::query_as::<_, TransactionItem>(
            r#"
            SELECT id, transaction_id, product_id, product_name, quantity,
                   price_at_sale_paise, cost_at_sale_paise
            FROM transaction_items
            WHERE transaction_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(&transaction.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(transaction))
    }

    /// Batch deductions recorded for a transaction, in consumption order.
    pub async fn consumed_batches(
        &self,
        tenant: &TenantContext,
        transaction_id: &str,
    ) -> DbResult<Vec<BatchDeduction>> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT c.batch_id, c.quantity, c.unit_cost_paise
            FROM batch_consumptions c
            INNER JOIN transaction_items i ON i.id = c.transaction_item_id
            WHERE i.transaction_id = ?1 AND i.tenant_id = ?2
            ORDER BY c.id
            "#,
        )
        .bind(transaction_id)
        .bind(tenant.tenant_id())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(batch_id, quantity, unit_cost_paise)| BatchDeduction {
                batch_id,
                quantity,
                unit_cost_paise,
            })
            .collect())
    }
}

// =============================================================================
// Shared Transaction Step
// =============================================================================

/// The checkout body, run inside a transaction the caller owns.
///
/// Table checkout reuses this so closing the order and recording the sale
/// commit together.
pub(crate) async fn checkout_in(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    request: &CheckoutRequest,
    policy: &LoyaltyPolicy,
) -> DbResult<Transaction> {
    // --- validating ---------------------------------------------------------
    let mut products: HashMap<String, Product> = HashMap::new();
    for line in &request.items {
        if products.contains_key(&line.product_id) {
            continue;
        }
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, tenant_id, name, category, price_paise, cost_paise,
                   stock_quantity, tax_rate_bps, created_at, updated_at
            FROM products
            WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(&line.product_id)
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(product) = product {
            products.insert(product.id.clone(), product);
        }
    }

    let customer = match &request.customer_id {
        Some(id) => {
            sqlx::query_as::<_, Customer>(&format!(
                "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1 AND tenant_id = ?2"
            ))
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&mut *conn)
            .await?
        }
        None => None,
    };

    let plan = plan_checkout(request, &products, customer.as_ref(), policy)?;
    debug!(
        total = plan.total_amount.paise(),
        points_earned = plan.points_earned,
        loyalty_delta = plan.loyalty_delta,
        "Checkout planned"
    );

    // --- committing ---------------------------------------------------------
    let mut transaction = Transaction {
        id: ids::transaction_id(),
        tenant_id: tenant_id.to_string(),
        customer_id: plan.customer_id.clone(),
        total_amount_paise: plan.total_amount.paise(),
        total_profit_paise: plan.total_profit.paise(),
        payment_method: request.payment_method,
        points_redeemed: plan.points_redeemed,
        loyalty_delta: plan.loyalty_delta,
        transaction_hash: ids::transaction_hash(),
        created_at: Utc::now(),
        items: Vec::with_capacity(plan.lines.len()),
    };

    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, tenant_id, customer_id, total_amount_paise, total_profit_paise,
            payment_method, points_redeemed, loyalty_delta, transaction_hash, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&transaction.id)
    .bind(&transaction.tenant_id)
    .bind(&transaction.customer_id)
    .bind(transaction.total_amount_paise)
    .bind(transaction.total_profit_paise)
    .bind(transaction.payment_method)
    .bind(transaction.points_redeemed)
    .bind(transaction.loyalty_delta)
    .bind(&transaction.transaction_hash)
    .bind(transaction.created_at)
    .execute(&mut *conn)
    .await?;

    for line in &plan.lines {
        let item = TransactionItem {
            id: ids::entity_id(),
            transaction_id: transaction.id.clone(),
            product_id: line.product_id.clone(),
            product_name: line.product_name.clone(),
            quantity: line.quantity,
            price_at_sale_paise: line.price_at_sale.paise(),
            cost_at_sale_paise: line.cost_at_sale.paise(),
        };

        sqlx::query(
            r#"
            INSERT INTO transaction_items (
                id, transaction_id, tenant_id, product_id, product_name,
                quantity, price_at_sale_paise, cost_at_sale_paise
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&item.id)
        .bind(&item.transaction_id)
        .bind(tenant_id)
        .bind(&item.product_id)
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(item.price_at_sale_paise)
        .bind(item.cost_at_sale_paise)
        .execute(&mut *conn)
        .await?;

        transaction.items.push(item);
    }

    let now = Utc::now();
    for (product_id, quantity) in plan.quantity_by_product() {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity - ?1, updated_at = ?2
            WHERE id = ?3 AND tenant_id = ?4 AND stock_quantity >= ?1
            "#,
        )
        .bind(quantity)
        .bind(now)
        .bind(product_id)
        .bind(tenant_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let available: i64 = sqlx::query_scalar(
                "SELECT stock_quantity FROM products WHERE id = ?1 AND tenant_id = ?2",
            )
            .bind(product_id)
            .bind(tenant_id)
            .fetch_optional(&mut *conn)
            .await?
            .unwrap_or(0);

            warn!(product_id = %product_id, available, requested = quantity, "Stock changed under checkout");
            let product = products
                .get(product_id)
                .map_or_else(|| product_id.to_string(), |p| p.name.clone());
            return Err(CoreError::InsufficientStock {
                product,
                available,
                requested: quantity,
            }
            .into());
        }
    }

    for item in &transaction.items {
        let allocation = consume_fefo_in(conn, tenant_id, &item.product_id, item.quantity).await?;
        for deduction in &allocation.deductions {
            sqlx::query(
                r#"
                INSERT INTO batch_consumptions (transaction_item_id, batch_id, quantity, unit_cost_paise)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&item.id)
            .bind(&deduction.batch_id)
            .bind(deduction.quantity)
            .bind(deduction.unit_cost_paise)
            .execute(&mut *conn)
            .await?;
        }
    }

    if let Some(customer_id) = &plan.customer_id {
        if plan.loyalty_delta != 0 {
            let result = sqlx::query(
                "UPDATE customers SET loyalty_points = loyalty_points + ?1 WHERE id = ?2 AND tenant_id = ?3",
            )
            .bind(plan.loyalty_delta)
            .bind(customer_id)
            .bind(tenant_id)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() == 0 {
                return Err(DbError::Domain(CoreError::CustomerNotFound(
                    customer_id.clone(),
                )));
            }
        }
    }

    Ok(transaction)
}

// =============================================================================
// Unit Tests
// =============================================================================
