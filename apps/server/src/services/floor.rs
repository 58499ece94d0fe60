//! # Floor Service
//!
//! Order mutations that the kitchen must hear about. Each call commits
//! through [`FloorRepository`](vyapar_db::FloorRepository) first and then
//! broadcasts the resulting [`KitchenEvent`]. HTTP handlers and kitchen
//! display commands both come through here, so a change made from either
//! side reaches every display the same way.
//!
//! ```text
//! mutation              committed outcome         event
//! ────────────────────  ────────────────────────  ─────────────────────
//! dispatch_pending      lines moved to ordered    NEW_ORDER
//! set_item_status       status changed            ITEM_STATUS_CHANGED
//! cancel_item           ordered line cancelled    ITEM_CANCELLED
//! free                  an order was open         TABLE_CLOSED (freed)
//! checkout_table        sale recorded             TABLE_CLOSED (checked_out)
//! ```
//!
//! No-op outcomes (nothing pending, status already set, line already
//! cancelled, pending line removed before the kitchen saw it) broadcast
//! nothing.

use tracing::{debug, info};
use vyapar_core::{
    CancelOutcome, Dispatch, ItemStatus, TableCheckout, TenantContext, Transaction,
};
use vyapar_db::{Database, DbResult, OrderChange};
use vyapar_realtime::{
    CloseReason, ItemChange, KitchenEvent, KitchenHub, NewOrder, TableClosed,
};

#[derive(Debug, Clone)]
pub struct FloorService {
    db: Database,
    hub: KitchenHub,
}

impl FloorService {
    pub fn new(db: Database, hub: KitchenHub) -> Self {
        FloorService { db, hub }
    }

    /// Sends the table's pending lines to the kitchen.
    pub async fn dispatch_pending(
        &self,
        tenant: &TenantContext,
        table_id: &str,
        expected_version: Option<i64>,
    ) -> DbResult<OrderChange<Dispatch>> {
        let change = self
            .db
            .floor()
            .dispatch_pending(tenant, table_id, expected_version)
            .await?;

        if change.outcome.changed() {
            let event =
                NewOrder::from_dispatch(&change.order, &change.outcome.indices, &change.outcome.sections);
            self.publish(tenant, KitchenEvent::NewOrder(event));
        } else {
            debug!(table_id = %table_id, "No new items to dispatch");
        }
        Ok(change)
    }

    pub async fn set_item_status(
        &self,
        tenant: &TenantContext,
        table_id: &str,
        index: usize,
        status: ItemStatus,
        expected_version: Option<i64>,
    ) -> DbResult<OrderChange<bool>> {
        let change = self
            .db
            .floor()
            .set_item_status(tenant, table_id, index, status, expected_version)
            .await?;

        if change.outcome {
            if let Some(event) = ItemChange::from_order(&change.order, index) {
                self.publish(tenant, KitchenEvent::ItemStatusChanged(event));
            }
        }
        Ok(change)
    }

    pub async fn cancel_item(
        &self,
        tenant: &TenantContext,
        table_id: &str,
        index: usize,
        expected_version: Option<i64>,
    ) -> DbResult<OrderChange<CancelOutcome>> {
        let change = self
            .db
            .floor()
            .cancel_item(tenant, table_id, index, expected_version)
            .await?;

        if let CancelOutcome::Cancelled { index } = change.outcome {
            if let Some(event) = ItemChange::from_order(&change.order, index) {
                self.publish(tenant, KitchenEvent::ItemCancelled(event));
            }
        }
        Ok(change)
    }

    /// Drops the table's order without a sale. Returns the closed order's
    /// id, or `None` when the table had no order.
    pub async fn free(&self, tenant: &TenantContext, table_id: &str) -> DbResult<Option<String>> {
        let closed = self.db.floor().free(tenant, table_id).await?;

        if let Some(order_id) = &closed {
            self.publish(
                tenant,
                KitchenEvent::TableClosed(TableClosed {
                    table_id: table_id.to_string(),
                    order_id: order_id.clone(),
                    reason: CloseReason::Freed,
                    transaction_id: None,
                }),
            );
        }
        Ok(closed)
    }

    /// Bills the table's order as one sale and frees the table.
    pub async fn checkout_table(
        &self,
        tenant: &TenantContext,
        table_id: &str,
        payment: &TableCheckout,
    ) -> DbResult<OrderChange<Transaction>> {
        let change = self
            .db
            .floor()
            .checkout_table(tenant, table_id, payment)
            .await?;

        self.publish(
            tenant,
            KitchenEvent::TableClosed(TableClosed {
                table_id: table_id.to_string(),
                order_id: change.order.id.clone(),
                reason: CloseReason::CheckedOut,
                transaction_id: Some(change.outcome.id.clone()),
            }),
        );
        Ok(change)
    }

    fn publish(&self, tenant: &TenantContext, event: KitchenEvent) {
        let event_type = event.type_name();
        let table_id = event.table_id().to_string();
        let delivered = self.hub.broadcast(tenant.tenant_id(), event);
        info!(
            tenant_id = %tenant.tenant_id(),
            table_id = %table_id,
            event = event_type,
            delivered,
            "Kitchen notified"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_floor, FloorFixture};
    use vyapar_core::PaymentMethod;

    async fn fixture() -> (FloorService, KitchenHub, FloorFixture) {
        let fixture = seed_floor().await;
        let hub = KitchenHub::default();
        (
            FloorService::new(fixture.db.clone(), hub.clone()),
            hub,
            fixture,
        )
    }

    #[tokio::test]
    async fn test_dispatch_broadcasts_once() {
        let (service, hub, f) = fixture().await;
        let mut display = hub.connect(f.tenant.tenant_id());
        f.order_paneer(2).await;

        let first = service.dispatch_pending(&f.tenant, &f.table_id, None).await.unwrap();
        assert!(first.outcome.changed());
        let second = service.dispatch_pending(&f.tenant, &f.table_id, None).await.unwrap();
        assert!(!second.outcome.changed());

        let KitchenEvent::NewOrder(event) = display.next_event().await.unwrap() else {
            panic!("expected NEW_ORDER");
        };
        assert_eq!(event.items.len(), 1);
        assert_eq!(event.items[0].quantity, 2);

        // the second dispatch produced nothing for the kitchen
        hub.broadcast(
            f.tenant.tenant_id(),
            KitchenEvent::TableClosed(TableClosed {
                table_id: "marker".into(),
                order_id: "marker".into(),
                reason: CloseReason::Freed,
                transaction_id: None,
            }),
        );
        assert_eq!(display.next_event().await.unwrap().table_id(), "marker");
    }

    #[tokio::test]
    async fn test_status_and_cancel_events() {
        let (service, hub, f) = fixture().await;
        f.order_paneer(1).await;
        f.order_lassi(1).await;
        service.dispatch_pending(&f.tenant, &f.table_id, None).await.unwrap();
        let mut display = hub.connect(f.tenant.tenant_id());

        let served = service
            .set_item_status(&f.tenant, &f.table_id, 0, ItemStatus::Served, None)
            .await
            .unwrap();
        assert!(served.outcome);
        let repeat = service
            .set_item_status(&f.tenant, &f.table_id, 0, ItemStatus::Served, None)
            .await
            .unwrap();
        assert!(!repeat.outcome);

        service.cancel_item(&f.tenant, &f.table_id, 1, None).await.unwrap();
        let again = service.cancel_item(&f.tenant, &f.table_id, 1, None).await.unwrap();
        assert!(matches!(again.outcome, CancelOutcome::Unchanged { index: 1 }));

        let KitchenEvent::ItemStatusChanged(changed) = display.next_event().await.unwrap() else {
            panic!("expected ITEM_STATUS_CHANGED");
        };
        assert_eq!(changed.item.status, ItemStatus::Served);

        let KitchenEvent::ItemCancelled(cancelled) = display.next_event().await.unwrap() else {
            panic!("expected ITEM_CANCELLED");
        };
        assert_eq!(cancelled.index, 1);
        assert_eq!(cancelled.item.status, ItemStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_failed_mutation_broadcasts_nothing() {
        let (service, hub, f) = fixture().await;
        f.order_paneer(1).await;
        let mut display = hub.connect(f.tenant.tenant_id());

        // pending lines cannot be served
        assert!(service
            .set_item_status(&f.tenant, &f.table_id, 0, ItemStatus::Served, None)
            .await
            .is_err());

        let change = service.cancel_item(&f.tenant, &f.table_id, 0, None).await.unwrap();
        assert!(matches!(change.outcome, CancelOutcome::Removed(_)));

        assert!(service.free(&f.tenant, &f.table_id).await.unwrap().is_some());
        let KitchenEvent::TableClosed(closed) = display.next_event().await.unwrap() else {
            panic!("expected TABLE_CLOSED");
        };
        assert_eq!(closed.reason, CloseReason::Freed);
        assert!(service.free(&f.tenant, &f.table_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_checkout_closes_table() {
        let (service, hub, f) = fixture().await;
        f.order_paneer(2).await;
        service.dispatch_pending(&f.tenant, &f.table_id, None).await.unwrap();
        let mut display = hub.connect(f.tenant.tenant_id());

        let change = service
            .checkout_table(
                &f.tenant,
                &f.table_id,
                &TableCheckout {
                    payment_method: PaymentMethod::Upi,
                    ..TableCheckout::default()
                },
            )
            .await
            .unwrap();

        let KitchenEvent::TableClosed(closed) = display.next_event().await.unwrap() else {
            panic!("expected TABLE_CLOSED");
        };
        assert_eq!(closed.reason, CloseReason::CheckedOut);
        assert_eq!(closed.order_id, change.order.id);
        assert_eq!(closed.transaction_id.as_deref(), Some(change.outcome.id.as_str()));
    }
}
