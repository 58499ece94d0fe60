//! # Kitchen Display Protocol
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Kitchen Display Messages                            │
//! │                                                                         │
//! │  ON CONNECT (direct)                                                   │
//! │  ───────────────────                                                   │
//! │  SERVER ───► ACTIVE_ORDERS { orders: [...] }                           │
//! │                                                                         │
//! │  BROADCAST (every session of the tenant)                               │
//! │  ───────────────────────────────────────                               │
//! │  SERVER ───► NEW_ORDER { table_id, order_id, items, sections }         │
//! │  SERVER ───► ITEM_STATUS_CHANGED { table_id, order_id, index, item }   │
//! │  SERVER ───► ITEM_CANCELLED { table_id, order_id, index, item }        │
//! │  SERVER ───► TABLE_CLOSED { table_id, order_id, reason, ... }          │
//! │                                                                         │
//! │  COMMANDS (display → server)                                           │
//! │  ───────────────────────────                                           │
//! │  KDS    ───► SET_ITEM_STATUS { table_id, index, status }               │
//! │  KDS    ───► PING                                                      │
//! │  SERVER ───► PONG { server_time }                (direct)              │
//! │  SERVER ───► ERROR { code, message }             (direct)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Adjacently tagged JSON:
//! ```json
//! { "type": "NEW_ORDER", "data": { "table_id": "TBL-...", ... } }
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vyapar_core::{ItemStatus, KitchenSection, OrderItem, TableOrder};

use crate::error::{RealtimeError, RealtimeResult};

// =============================================================================
// Broadcast Events
// =============================================================================

/// State changes pushed to every kitchen display of a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KitchenEvent {
    /// A KOT was dispatched.
    NewOrder(NewOrder),
    ItemStatusChanged(ItemChange),
    ItemCancelled(ItemChange),
    /// The table's order was checked out or dropped.
    TableClosed(TableClosed),
}

impl KitchenEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            KitchenEvent::NewOrder(_) => "NEW_ORDER",
            KitchenEvent::ItemStatusChanged(_) => "ITEM_STATUS_CHANGED",
            KitchenEvent::ItemCancelled(_) => "ITEM_CANCELLED",
            KitchenEvent::TableClosed(_) => "TABLE_CLOSED",
        }
    }

    pub fn table_id(&self) -> &str {
        match self {
            KitchenEvent::NewOrder(e) => &e.table_id,
            KitchenEvent::ItemStatusChanged(e) | KitchenEvent::ItemCancelled(e) => &e.table_id,
            KitchenEvent::TableClosed(e) => &e.table_id,
        }
    }

    pub fn to_json(&self) -> RealtimeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub table_id: String,
    pub order_id: String,
    /// Only the lines sent on this KOT.
    pub items: Vec<OrderItem>,
    pub sections: BTreeSet<KitchenSection>,
    pub dispatched_at: DateTime<Utc>,
}

impl NewOrder {
    /// Builds the event from the order after a dispatch, keeping the lines
    /// at `indices`.
    pub fn from_dispatch(
        order: &TableOrder,
        indices: &[usize],
        sections: &BTreeSet<KitchenSection>,
    ) -> Self {
        let items: Vec<OrderItem> = indices
            .iter()
            .filter_map(|&i| order.items.get(i).cloned())
            .collect();
        let dispatched_at = items
            .iter()
            .find_map(|i| i.ordered_at)
            .unwrap_or_else(Utc::now);

        NewOrder {
            table_id: order.table_id.clone(),
            order_id: order.id.clone(),
            items,
            sections: sections.clone(),
            dispatched_at,
        }
    }
}

/// One line after a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemChange {
    pub table_id: String,
    pub order_id: String,
    pub index: usize,
    pub item: OrderItem,
    /// Order version after the change.
    pub version: i64,
}

impl ItemChange {
    /// `None` when `index` is no longer in the order.
    pub fn from_order(order: &TableOrder, index: usize) -> Option<Self> {
        order.items.get(index).map(|item| ItemChange {
            table_id: order.table_id.clone(),
            order_id: order.id.clone(),
            index,
            item: item.clone(),
            version: order.version,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    CheckedOut,
    Freed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableClosed {
    pub table_id: String,
    pub order_id: String,
    pub reason: CloseReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

// =============================================================================
// Direct Replies
// =============================================================================

/// Messages sent to a single session only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionReply {
    /// Initial load: open orders with dispatched lines.
    ActiveOrders { orders: Vec<TableOrder> },
    Pong { server_time: DateTime<Utc> },
    Error { code: String, message: String },
}

impl SessionReply {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        SessionReply::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> RealtimeResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// =============================================================================
// Commands
// =============================================================================

/// What a kitchen display may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KdsCommand {
    SetItemStatus {
        table_id: String,
        index: usize,
        status: ItemStatus,
    },
    Ping,
}

impl KdsCommand {
    pub fn from_json(text: &str) -> RealtimeResult<Self> {
        serde_json::from_str(text).map_err(|e| RealtimeError::Protocol(e.to_string()))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order() -> TableOrder {
        TableOrder {
            id: "ORD-1".into(),
            tenant_id: "acct-main".into(),
            table_id: "TBL-1".into(),
            version: 3,
            created_at: Utc::now(),
            closed_at: None,
            items: Vec::new(),
        }
    }

    #[test]
    fn test_event_envelope() {
        let event = KitchenEvent::TableClosed(TableClosed {
            table_id: "TBL-1".into(),
            order_id: "ORD-1".into(),
            reason: CloseReason::Freed,
            transaction_id: None,
        });
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "TABLE_CLOSED",
                "data": { "table_id": "TBL-1", "order_id": "ORD-1", "reason": "freed" }
            })
        );
        assert_eq!(event.type_name(), "TABLE_CLOSED");
        assert_eq!(event.table_id(), "TBL-1");
    }

    #[test]
    fn test_command_parsing() {
        let cmd = KdsCommand::from_json(
            r#"{"type":"SET_ITEM_STATUS","data":{"table_id":"TBL-1","index":2,"status":"served"}}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            KdsCommand::SetItemStatus {
                table_id: "TBL-1".into(),
                index: 2,
                status: ItemStatus::Served,
            }
        );

        assert_eq!(KdsCommand::from_json(r#"{"type":"PING"}"#).unwrap(), KdsCommand::Ping);

        let err = KdsCommand::from_json(r#"{"type":"REBOOT"}"#).unwrap_err();
        assert_eq!(err.code(), "BAD_MESSAGE");
        assert!(KdsCommand::from_json(
            r#"{"type":"SET_ITEM_STATUS","data":{"table_id":"TBL-1","index":0,"status":"cooking"}}"#
        )
        .is_err());
    }

    #[test]
    fn test_item_change_out_of_range() {
        assert!(ItemChange::from_order(&order(), 0).is_none());
    }

    #[test]
    fn test_new_order_keeps_dispatched_lines_only() {
        let mut order = order();
        let now = Utc::now();
        for (product, category) in [("p1", "Starters"), ("p2", "Mocktails")] {
            order
                .add_item(
                    vyapar_core::NewOrderItem {
                        product_id: product.into(),
                        name: product.into(),
                        category: Some(category.into()),
                        quantity: 1,
                        unit_price_paise: 10_000,
                    },
                    now,
                )
                .unwrap();
        }
        order.dispatch_pending(now);
        order
            .add_item(
                vyapar_core::NewOrderItem {
                    product_id: "p3".into(),
                    name: "p3".into(),
                    category: None,
                    quantity: 1,
                    unit_price_paise: 10_000,
                },
                now,
            )
            .unwrap();
        let dispatch = order.dispatch_pending(now);

        let event = NewOrder::from_dispatch(&order, &dispatch.indices, &dispatch.sections);
        assert_eq!(event.items.len(), 1);
        assert_eq!(event.items[0].product_id, "p3");
        assert_eq!(event.dispatched_at, now);
        assert!(event.sections.contains(&KitchenSection::Kitchen));
    }
}
