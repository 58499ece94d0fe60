//! Kitchen display WebSocket endpoint.
//!
//! GET /ws/kds?token=<JWT>
//!
//! Browsers cannot set headers on a WebSocket, so the token may come in the
//! query string. The session joins the tenant's hub before the active
//! orders are read: an event raised in between can arrive twice but is
//! never missed.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;
use tracing::info;
use vyapar_core::TenantContext;
use vyapar_realtime::{run_session, SessionReply, MAX_MESSAGE_SIZE};

use crate::error::ApiResult;
use crate::AppState;

pub async fn kitchen_display(
    State(state): State<AppState>,
    tenant: TenantContext,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let session = state.hub.connect(tenant.tenant_id());
    let orders = state.db.floor().active_orders(&tenant).await?;

    info!(
        tenant_id = %tenant.tenant_id(),
        session_id = session.id(),
        active_orders = orders.len(),
        "Kitchen display upgrading"
    );

    let config = state.config.session_config();
    let commands = state.commands.clone();
    Ok(ws
        .max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| {
            run_session(
                socket,
                session,
                config,
                Some(SessionReply::ActiveOrders { orders }),
                commands,
            )
        }))
}
