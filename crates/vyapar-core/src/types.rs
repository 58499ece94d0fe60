//! # Domain Types
//!
//! Retail domain types: the product catalogue, its dated batches,
//! customers and the immutable transaction records a checkout produces.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │◄──│  ProductBatch   │   │    Customer     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  price_paise    │   │  expiry_date    │   │  loyalty_points │       │
//! │  │  cost_paise     │   │  quantity       │   └────────▲────────┘       │
//! │  │  stock_quantity │   │  unit_cost      │            │                │
//! │  └────────▲────────┘   └─────────────────┘            │                │
//! │           │                                            │                │
//! │  ┌────────┴────────┐   ┌─────────────────┐            │                │
//! │  │ TransactionItem │──►│   Transaction   │────────────┘                │
//! │  │  price_at_sale  │   │  total_amount   │                             │
//! │  │  cost_at_sale   │   │  total_profit   │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All monetary fields are integer paise. Every persisted entity carries
//! `tenant_id`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A sellable product.
///
/// `stock_quantity` is the authoritative sellable figure: the remaining
/// quantity of every batch plus any stock that was never batch-tracked.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub category: Option<String>,
    /// Unit selling price in paise.
    pub price_paise: i64,
    /// Current unit cost in paise, used for profit at checkout.
    pub cost_paise: i64,
    pub stock_quantity: i64,
    /// Tax rate in basis points (1800 = 18%).
    pub tax_rate_bps: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_paise(self.price_paise)
    }

    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_paise(self.cost_paise)
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub price_paise: i64,
    #[serde(default)]
    pub cost_paise: i64,
    /// Opening stock that is not tracked by any batch.
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default)]
    pub tax_rate_bps: i64,
}

// =============================================================================
// Product Batch
// =============================================================================

/// An expiry-dated lot backing part of a product's stock.
///
/// Consumed earliest-expiry first. A batch at quantity 0 stays for audit.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductBatch {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    /// Human label printed on the lot; not unique.
    pub batch_code: String,
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,
    /// Remaining quantity.
    pub quantity: i64,
    pub unit_cost_paise: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input for a stock-in that creates a batch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewBatch {
    pub batch_code: String,
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,
    pub quantity: i64,
    #[serde(default)]
    pub unit_cost_paise: i64,
}

/// One step of a FEFO consumption: how much was taken from which batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BatchDeduction {
    pub batch_id: String,
    pub quantity: i64,
    pub unit_cost_paise: i64,
}

/// Row of the expiry report: a live batch plus its product's name and price.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ExpiringBatch {
    pub batch_id: String,
    pub product_id: String,
    pub product_name: String,
    pub price_paise: i64,
    pub batch_code: String,
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,
    pub quantity: i64,
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Upi,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "upi",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Checkout Input
// =============================================================================

/// One cart line as submitted by the till.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    /// Display name as the till saw it. The stored snapshot uses the
    /// product's own name.
    #[serde(default)]
    pub name: String,
    pub quantity: i64,
    pub price_at_sale_paise: i64,
}

/// A checkout request.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub points_redeemed: i64,
    pub items: Vec<CartLine>,
}

// =============================================================================
// Transaction
// =============================================================================

/// A completed sale. Written once per checkout, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Transaction {
    /// 16-digit numeric identifier.
    pub id: String,
    pub tenant_id: String,
    pub customer_id: Option<String>,
    pub total_amount_paise: i64,
    /// Σ (price_at_sale − cost_at_sale) × quantity, computed server-side.
    pub total_profit_paise: i64,
    pub payment_method: PaymentMethod,
    pub points_redeemed: i64,
    /// Net change applied to the customer's balance (0 without a customer).
    pub loyalty_delta: i64,
    pub transaction_hash: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub items: Vec<TransactionItem>,
}

impl Transaction {
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_paise(self.total_amount_paise)
    }

    #[inline]
    pub fn total_profit(&self) -> Money {
        Money::from_paise(self.total_profit_paise)
    }
}

/// A line of a transaction, with product data frozen at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TransactionItem {
    pub id: String,
    pub transaction_id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub price_at_sale_paise: i64,
    /// The product's cost when the sale happened, not the batch cost.
    pub cost_at_sale_paise: i64,
}

impl TransactionItem {
    pub fn profit(&self) -> Money {
        (Money::from_paise(self.price_at_sale_paise) - Money::from_paise(self.cost_at_sale_paise))
            .multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Customer
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub city: Option<String>,
    pub pincode: Option<String>,
    /// May be negative when redemption overdraft is allowed.
    pub loyalty_points: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewCustomer {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_profit() {
        let item = TransactionItem {
            id: "i1".into(),
            transaction_id: "t1".into(),
            product_id: "p1".into(),
            product_name: "Basmati 1kg".into(),
            quantity: 30,
            price_at_sale_paise: 2500,
            cost_at_sale_paise: 1000,
        };
        assert_eq!(item.profit().paise(), 45_000);
    }

    #[test]
    fn test_checkout_request_defaults() {
        let json = r#"{"items":[{"product_id":"p1","quantity":2,"price_at_sale_paise":500}]}"#;
        let req: CheckoutRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.payment_method, PaymentMethod::Cash);
        assert_eq!(req.points_redeemed, 0);
        assert!(req.customer_id.is_none());
        assert_eq!(req.items[0].name, "");
    }
}
