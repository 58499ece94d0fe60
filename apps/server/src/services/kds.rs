//! Kitchen display command processor.
//!
//! One task drains the commands every session forwards. Commands run with a
//! kitchen-role context for the session's tenant; a failure goes back to
//! the sending display only, a success reaches all displays through the
//! normal broadcast.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use vyapar_core::{Role, TenantContext};
use vyapar_realtime::{InboundCommand, ItemStatusChange, SessionReply};

use crate::error::ApiError;
use crate::services::FloorService;

/// Runs until every sender (the app state and its clones) is dropped.
pub async fn run_command_processor(floor: FloorService, mut commands: mpsc::Receiver<InboundCommand>) {
    info!("Kitchen display command processor started");

    while let Some(inbound) = commands.recv().await {
        let InboundCommand {
            tenant_id,
            session_id,
            change:
                ItemStatusChange {
                    table_id,
                    index,
                    status,
                },
            reply,
        } = inbound;
        let tenant = TenantContext::new(tenant_id, Role::Kitchen);

        let result = floor
            .set_item_status(&tenant, &table_id, index, status, None)
            .await;

        match result {
            Ok(change) => {
                debug!(session_id, table_id = %table_id, index, changed = change.outcome, "Item status set from display");
            }
            Err(e) => {
                let e = ApiError::from(e);
                warn!(tenant_id = %tenant.tenant_id(), session_id, error = %e, "Kitchen display command failed");
                let _ = reply
                    .send(&SessionReply::error(e.code.as_str(), e.message))
                    .await;
            }
        }
    }

    info!("Kitchen display command processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::seed_floor;
    use axum::extract::ws::Message;
    use vyapar_core::ItemStatus;
    use vyapar_realtime::KitchenHub;

    #[tokio::test]
    async fn test_commands_apply_and_report_errors() {
        let f = seed_floor().await;
        f.order_paneer(1).await;
        let hub = KitchenHub::default();
        let floor = FloorService::new(f.db.clone(), hub.clone());
        floor.dispatch_pending(&f.tenant, &f.table_id, None).await.unwrap();

        let (tx, rx) = mpsc::channel(8);
        let processor = tokio::spawn(run_command_processor(floor, rx));
        let mut display = hub.connect(f.tenant.tenant_id());
        let (reply, mut replies) = vyapar_realtime::ReplyTo::detached(8);

        for index in [0, 7] {
            tx.send(InboundCommand {
                tenant_id: f.tenant.tenant_id().to_string(),
                session_id: 1,
                change: ItemStatusChange {
                    table_id: f.table_id.clone(),
                    index,
                    status: ItemStatus::Served,
                },
                reply: reply.clone(),
            })
            .await
            .unwrap();
        }

        // the good command reaches every display
        let event = display.next_event().await.unwrap();
        assert_eq!(event.type_name(), "ITEM_STATUS_CHANGED");

        // the bad one is answered to the sender only
        let Some(Message::Text(text)) = replies.recv().await else {
            panic!("expected an error reply");
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(value["type"], "ERROR");
        assert_eq!(value["data"]["code"], "VALIDATION");

        drop(tx);
        processor.await.unwrap();
    }
}
