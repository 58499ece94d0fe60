//! # Floor and Order State Machine
//!
//! Restaurant tables, the single active order per table, and the lifecycle of
//! every order line.
//!
//! ## Table lifecycle
//! ```text
//!   AVAILABLE ──occupy──► OCCUPIED ──free────────► AVAILABLE
//!       ▲                    │
//!       │                    └──checkout──► Transaction
//!       └────────────────────────────────────────┘
//!   RESERVED / BILL_REQUESTED are set by staff and never drop an order.
//! ```
//!
//! ## Item lifecycle
//! ```text
//!   pending ──dispatch──► ordered ──kitchen──► served
//!      │                     │
//!      └──cancel(remove)     └──cancel──► cancelled
//! ```
//!
//! [`ItemStatus::can_transition_to`] is the only authority on which moves are
//! legal. Repeating the current status is accepted as a no-op.
//!
//! Operations here mutate an in-memory [`TableOrder`] and describe the change
//! so the db layer can write exactly the affected rows inside the order's
//! critical section.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::ids;
use crate::money::Money;
use crate::types::{CartLine, CheckoutRequest, PaymentMethod};
use crate::validation;

// =============================================================================
// Table Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum TableStatus {
    Available,
    Occupied,
    Reserved,
    BillRequested,
}

impl TableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Available => "AVAILABLE",
            TableStatus::Occupied => "OCCUPIED",
            TableStatus::Reserved => "RESERVED",
            TableStatus::BillRequested => "BILL_REQUESTED",
        }
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Item Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ItemStatus {
    /// Added at the table, not yet sent to the kitchen.
    Pending,
    /// Sent to the kitchen on a KOT.
    Ordered,
    Served,
    Cancelled,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Ordered => "ordered",
            ItemStatus::Served => "served",
            ItemStatus::Cancelled => "cancelled",
        }
    }

    /// Transition table. Same-status is allowed (no-op).
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        self == next
            || matches!(
                (self, next),
                (Pending, Ordered) | (Pending, Cancelled) | (Ordered, Served) | (Ordered, Cancelled)
            )
    }

    /// The kitchen has seen this line.
    pub fn is_dispatched(self) -> bool {
        matches!(self, ItemStatus::Ordered | ItemStatus::Served)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ItemStatus::Pending),
            "ordered" => Ok(ItemStatus::Ordered),
            "served" => Ok(ItemStatus::Served),
            "cancelled" => Ok(ItemStatus::Cancelled),
            _ => Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: ["pending", "ordered", "served", "cancelled"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Kitchen Section
// =============================================================================

/// Which station prepares a line. Printed on the KOT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum KitchenSection {
    Kitchen,
    Bar,
    Dessert,
}

const BAR_WORDS: &[&str] = &[
    "bar", "cocktail", "wine", "beer", "drink", "beverage", "alcohol",
];
const DESSERT_WORDS: &[&str] = &["dessert", "ice cream", "cake", "sweet"];

impl KitchenSection {
    /// Keyword match on the product category. Bar words win over dessert
    /// words; anything else goes to the kitchen.
    pub fn from_category(category: Option<&str>) -> Self {
        let Some(category) = category else {
            return KitchenSection::Kitchen;
        };
        let category = category.to_lowercase();

        if BAR_WORDS.iter().any(|w| category.contains(w)) {
            KitchenSection::Bar
        } else if DESSERT_WORDS.iter().any(|w| category.contains(w)) {
            KitchenSection::Dessert
        } else {
            KitchenSection::Kitchen
        }
    }
}

// =============================================================================
// Restaurant Table
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RestaurantTable {
    pub id: String,
    pub tenant_id: String,
    /// Number or name painted on the table.
    pub label: String,
    pub capacity: i64,
    pub zone: Option<String>,
    /// Grid position on the floor plan.
    pub pos_x: i64,
    pub pos_y: i64,
    pub status: TableStatus,
    pub current_order_id: Option<String>,
    pub waiter_id: Option<String>,
    /// Parent table when this one is merged into another.
    pub merged_with: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input for adding a table to the floor plan.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewTable {
    pub label: String,
    #[serde(default = "default_capacity")]
    pub capacity: i64,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub pos_x: i64,
    #[serde(default)]
    pub pos_y: i64,
}

fn default_capacity() -> i64 {
    4
}

/// Payment details for converting a table's order into a sale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TableCheckout {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub points_redeemed: i64,
    /// Order version the cashier saw; `None` skips the check.
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// A table with its current order, for the floor plan view.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FloorTable {
    pub table: RestaurantTable,
    pub order: Option<TableOrder>,
}

// =============================================================================
// Order Items
// =============================================================================

/// One line of a table's order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    /// Sort key; the API index is the position in `seq` order.
    pub seq: i64,
    pub product_id: String,
    pub name: String,
    pub section: KitchenSection,
    pub quantity: i64,
    pub unit_price_paise: i64,
    pub line_total_paise: i64,
    pub status: ItemStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub ordered_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub served_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        Money::from_paise(self.line_total_paise)
    }

    fn stamp(&mut self, status: ItemStatus, now: DateTime<Utc>) {
        self.status = status;
        match status {
            ItemStatus::Ordered => self.ordered_at = Some(now),
            ItemStatus::Served => self.served_at = Some(now),
            ItemStatus::Cancelled => self.cancelled_at = Some(now),
            ItemStatus::Pending => {}
        }
    }
}

/// A line as the waiter adds it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewOrderItem {
    pub product_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub quantity: i64,
    pub unit_price_paise: i64,
}

// =============================================================================
// Table Order
// =============================================================================

/// The active order of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TableOrder {
    pub id: String,
    pub tenant_id: String,
    pub table_id: String,
    /// Bumped by every mutation; clients may send it back for an
    /// optimistic check.
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

/// What [`TableOrder::add_item`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemEdit {
    /// Quantity added onto an existing pending line.
    Merged { index: usize },
    /// New pending line at the end.
    Appended { index: usize },
}

impl ItemEdit {
    pub fn index(&self) -> usize {
        match *self {
            ItemEdit::Merged { index } | ItemEdit::Appended { index } => index,
        }
    }
}

/// What [`TableOrder::cancel_item`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// A pending line was dropped from the order.
    Removed(OrderItem),
    /// A dispatched line was marked cancelled.
    Cancelled { index: usize },
    /// The line was already cancelled.
    Unchanged { index: usize },
}

/// Result of a KOT dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatch {
    /// Indices that moved pending → ordered.
    pub indices: Vec<usize>,
    pub sections: BTreeSet<KitchenSection>,
}

impl Dispatch {
    /// False when nothing was pending ("No new items").
    pub fn changed(&self) -> bool {
        !self.indices.is_empty()
    }
}

impl TableOrder {
    fn item_mut(&mut self, index: usize) -> CoreResult<&mut OrderItem> {
        let len = self.items.len();
        self.items
            .get_mut(index)
            .ok_or(CoreError::ItemIndexOutOfRange { index, len })
    }

    pub fn next_seq(&self) -> i64 {
        self.items.iter().map(|i| i.seq).max().map_or(0, |s| s + 1)
    }

    /// Adds a line, merging into an existing line only while that line is
    /// still pending for the same product at the same unit price.
    pub fn add_item(&mut self, new: NewOrderItem, now: DateTime<Utc>) -> CoreResult<ItemEdit> {
        validation::validate_name(&new.name, "name")?;
        validation::validate_quantity(new.quantity)?;
        validation::validate_price(new.unit_price_paise, "unit_price")?;

        let added_total = Money::from_paise(new.unit_price_paise).multiply_quantity(new.quantity);

        if let Some(index) = self
            .items
            .iter()
            .position(|i| {
                i.product_id == new.product_id
                    && i.unit_price_paise == new.unit_price_paise
                    && i.status == ItemStatus::Pending
            })
        {
            let line = &mut self.items[index];
            let merged = line.quantity + new.quantity;
            validation::validate_quantity(merged)?;
            line.quantity = merged;
            line.line_total_paise = Money::from_paise(line.unit_price_paise)
                .multiply_quantity(merged)
                .paise();
            return Ok(ItemEdit::Merged { index });
        }

        let item = OrderItem {
            id: ids::entity_id(),
            order_id: self.id.clone(),
            seq: self.next_seq(),
            product_id: new.product_id,
            name: new.name.trim().to_string(),
            section: KitchenSection::from_category(new.category.as_deref()),
            quantity: new.quantity,
            unit_price_paise: new.unit_price_paise,
            line_total_paise: added_total.paise(),
            status: ItemStatus::Pending,
            created_at: now,
            ordered_at: None,
            served_at: None,
            cancelled_at: None,
        };
        self.items.push(item);
        Ok(ItemEdit::Appended {
            index: self.items.len() - 1,
        })
    }

    /// Moves every pending line to ordered with one dispatch timestamp.
    pub fn dispatch_pending(&mut self, now: DateTime<Utc>) -> Dispatch {
        let mut dispatch = Dispatch::default();
        for (index, item) in self.items.iter_mut().enumerate() {
            if item.status == ItemStatus::Pending {
                item.stamp(ItemStatus::Ordered, now);
                dispatch.indices.push(index);
                dispatch.sections.insert(item.section);
            }
        }
        dispatch
    }

    /// Pending lines disappear, dispatched lines stay as cancelled.
    pub fn cancel_item(&mut self, index: usize, now: DateTime<Utc>) -> CoreResult<CancelOutcome> {
        let status = self.item_mut(index)?.status;
        match status {
            ItemStatus::Pending => Ok(CancelOutcome::Removed(self.items.remove(index))),
            ItemStatus::Ordered => {
                self.items[index].stamp(ItemStatus::Cancelled, now);
                Ok(CancelOutcome::Cancelled { index })
            }
            ItemStatus::Cancelled => Ok(CancelOutcome::Unchanged { index }),
            from @ ItemStatus::Served => Err(CoreError::InvalidTransition {
                from,
                to: ItemStatus::Cancelled,
            }),
        }
    }

    /// Drops a pending line. Dispatched lines are kept for the audit trail.
    pub fn remove_item(&mut self, index: usize) -> CoreResult<OrderItem> {
        let status = self.item_mut(index)?.status;
        if status != ItemStatus::Pending {
            return Err(CoreError::ItemAlreadyDispatched { index, status });
        }
        Ok(self.items.remove(index))
    }

    /// Kitchen-driven status change, guarded by the transition table.
    ///
    /// Returns `false` when the line already had `status`.
    pub fn set_item_status(
        &mut self,
        index: usize,
        status: ItemStatus,
        now: DateTime<Utc>,
    ) -> CoreResult<bool> {
        let item = self.item_mut(index)?;
        if !item.status.can_transition_to(status) {
            return Err(CoreError::InvalidTransition {
                from: item.status,
                to: status,
            });
        }
        if item.status == status {
            return Ok(false);
        }
        item.stamp(status, now);
        Ok(true)
    }

    /// Lines the kitchen has received (ordered or served).
    pub fn kot_history(&self) -> Vec<OrderItem> {
        self.items
            .iter()
            .filter(|i| i.status.is_dispatched())
            .cloned()
            .collect()
    }

    /// Lines that end up on the bill.
    pub fn billable_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items
            .iter()
            .filter(|i| i.status != ItemStatus::Cancelled)
    }

    pub fn has_dispatched(&self) -> bool {
        self.items.iter().any(|i| i.status.is_dispatched())
    }

    pub fn total(&self) -> Money {
        self.billable_items().map(OrderItem::line_total).sum()
    }

    /// The bill as a checkout cart: every line that was not cancelled.
    pub fn to_checkout(&self, payment: &TableCheckout) -> CheckoutRequest {
        CheckoutRequest {
            customer_id: payment.customer_id.clone(),
            payment_method: payment.payment_method,
            points_redeemed: payment.points_redeemed,
            items: self
                .billable_items()
                .map(|item| CartLine {
                    product_id: item.product_id.clone(),
                    name: item.name.clone(),
                    quantity: item.quantity,
                    price_at_sale_paise: item.unit_price_paise,
                })
                .collect(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
