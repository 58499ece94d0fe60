//! # vyapar-realtime: Kitchen Display Notifier
//!
//! Pushes order changes to every kitchen display (KDS) connected for a
//! tenant and carries the displays' commands back to the server.
//!
//! ## Module Organization
//!
//! - [`notifier`] - [`KitchenHub`]: per-tenant membership and broadcast
//! - [`protocol`] - Event, reply and command messages (`{type, data}` JSON)
//! - [`ws`] - The per-socket pump run after an axum WebSocket upgrade
//! - [`error`] - Realtime error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! let hub = KitchenHub::new(256);
//!
//! // in the WebSocket handler
//! let session = hub.connect(tenant.tenant_id());
//! ws.on_upgrade(move |socket| run_session(socket, session, config, greeting, commands_tx));
//!
//! // after a KOT dispatch
//! hub.broadcast(tenant.tenant_id(), KitchenEvent::NewOrder(event));
//! ```

pub mod error;
pub mod notifier;
pub mod protocol;
pub mod ws;

pub use error::{RealtimeError, RealtimeResult};
pub use notifier::{KitchenHub, Session, DEFAULT_CHANNEL_CAPACITY};
pub use protocol::{
    CloseReason, ItemChange, KdsCommand, KitchenEvent, NewOrder, SessionReply, TableClosed,
};
pub use ws::{
    run_session, InboundCommand, ItemStatusChange, ReplyTo, SessionConfig, MAX_MESSAGE_SIZE,
};
