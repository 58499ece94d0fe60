//! # Session Pump
//!
//! Drives one kitchen display WebSocket after the HTTP upgrade.
//!
//! ## Tasks per session
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Session (hub) ──► event task ──┐                                       │
//! │                                 │                                       │
//! │  ping task (interval) ──────────┼──► outgoing mpsc ──► writer task ──► socket
//! │                                 │                                       │
//! │  ReplyTo (command processor) ───┘                                       │
//! │                                                                         │
//! │  socket ──► receive loop ──► PING: answered here                        │
//! │                         └──► SET_ITEM_STATUS: InboundCommand ──► mpsc   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! When the receive loop ends (close frame, socket error, EOF) the other
//! tasks are aborted. Aborting the event task drops the [`Session`], which
//! takes the display out of the hub.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use vyapar_core::ItemStatus;

use crate::error::{RealtimeError, RealtimeResult};
use crate::notifier::Session;
use crate::protocol::{KdsCommand, SessionReply};

/// Outgoing queue depth per session.
const OUTGOING_BUFFER: usize = 64;

/// Maximum inbound message size (64KB). Commands are tiny.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ping_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            ping_interval: Duration::from_secs(30),
        }
    }
}

/// Direct line back to one session, for command results and errors.
#[derive(Debug, Clone)]
pub struct ReplyTo {
    tx: mpsc::Sender<Message>,
}

impl ReplyTo {
    /// A reply handle that is not attached to a socket, with the receiving
    /// end of its queue.
    pub fn detached(buffer: usize) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(buffer);
        (ReplyTo { tx }, rx)
    }

    pub async fn send(&self, reply: &SessionReply) -> RealtimeResult<()> {
        let json = reply.to_json()?;
        self.tx
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| RealtimeError::ChannelClosed)
    }
}

/// A line status change requested by a kitchen display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStatusChange {
    pub table_id: String,
    pub index: usize,
    pub status: ItemStatus,
}

/// A state-changing command from a kitchen display, tagged with who sent
/// it. PING never leaves the session.
#[derive(Debug)]
pub struct InboundCommand {
    pub tenant_id: String,
    pub session_id: u64,
    pub change: ItemStatusChange,
    pub reply: ReplyTo,
}

/// Runs the session until the display disconnects.
///
/// `greeting` is sent before any broadcast event.
pub async fn run_session(
    socket: WebSocket,
    mut session: Session,
    config: SessionConfig,
    greeting: Option<SessionReply>,
    commands: mpsc::Sender<InboundCommand>,
) {
    let tenant_id = session.tenant_id().to_string();
    let session_id = session.id();
    let (mut sender, mut receiver) = socket.split();

    info!(tenant_id = %tenant_id, session_id, "Kitchen display session started");

    let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Message>(OUTGOING_BUFFER);
    let reply = ReplyTo {
        tx: outgoing_tx.clone(),
    };

    if let Some(greeting) = greeting {
        if let Err(e) = reply.send(&greeting).await {
            warn!(session_id, ?e, "Failed to queue greeting");
        }
    }

    // Outgoing message task
    let outgoing_handle = tokio::spawn(async move {
        while let Some(msg) = outgoing_rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Broadcast forwarding task (owns the session)
    let events_tx = outgoing_tx.clone();
    let events_handle = tokio::spawn(async move {
        while let Some(event) = session.next_event().await {
            match event.to_json() {
                Ok(json) => {
                    if events_tx.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!(?e, event = event.type_name(), "Failed to encode kitchen event"),
            }
        }
    });

    // Ping task
    let ping_tx = outgoing_tx.clone();
    let ping_every = config.ping_interval;
    let ping_handle = tokio::spawn(async move {
        let mut ticker = interval(ping_every);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if ping_tx.send(Message::Ping(axum::body::Bytes::new())).await.is_err() {
                break;
            }
        }
    });

    // Main receive loop
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                handle_text(&tenant_id, session_id, text.as_str(), &reply, &commands).await;
            }
            Some(Ok(Message::Binary(data))) => {
                let text = String::from_utf8_lossy(&data);
                handle_text(&tenant_id, session_id, &text, &reply, &commands).await;
            }
            Some(Ok(Message::Ping(data))) => {
                let _ = outgoing_tx.send(Message::Pong(data)).await;
            }
            Some(Ok(Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) => {
                info!(session_id, "Kitchen display requested close");
                break;
            }
            Some(Err(e)) => {
                warn!(session_id, ?e, "WebSocket error");
                break;
            }
            None => {
                info!(session_id, "Kitchen display disconnected");
                break;
            }
        }
    }

    // Cleanup
    ping_handle.abort();
    events_handle.abort();
    outgoing_handle.abort();
}

async fn handle_text(
    tenant_id: &str,
    session_id: u64,
    text: &str,
    reply: &ReplyTo,
    commands: &mpsc::Sender<InboundCommand>,
) {
    let command = match KdsCommand::from_json(text) {
        Ok(command) => command,
        Err(e) => {
            debug!(session_id, ?e, "Invalid kitchen display message");
            let _ = reply.send(&SessionReply::error(e.code(), e.to_string())).await;
            return;
        }
    };

    match command {
        KdsCommand::Ping => {
            let _ = reply
                .send(&SessionReply::Pong {
                    server_time: Utc::now(),
                })
                .await;
        }
        KdsCommand::SetItemStatus {
            table_id,
            index,
            status,
        } => {
            let change = ItemStatusChange {
                table_id,
                index,
                status,
            };
            debug!(session_id, ?change, "Forwarding kitchen display command");
            let inbound = InboundCommand {
                tenant_id: tenant_id.to_string(),
                session_id,
                change,
                reply: reply.clone(),
            };
            if let Err(e) = commands.send(inbound).await {
                error!(?e, "Command processor is gone");
                let _ = reply
                    .send(&SessionReply::error("UNAVAILABLE", "command processor stopped"))
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reply_to_encodes_json() {
        let (reply, mut rx) = ReplyTo::detached(4);
        reply
            .send(&SessionReply::error("NOT_FOUND", "Table TBL-1 not found"))
            .await
            .unwrap();

        let Some(Message::Text(text)) = rx.recv().await else {
            panic!("expected a text frame");
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(value["type"], "ERROR");
        assert_eq!(value["data"]["code"], "NOT_FOUND");

        drop(rx);
        assert!(matches!(
            reply.send(&SessionReply::error("X", "y")).await,
            Err(RealtimeError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_ping_is_answered_without_forwarding() {
        let (reply, mut rx) = ReplyTo::detached(4);
        let (cmd_tx, mut cmd_rx) = mpsc::channel(4);

        handle_text("acct-main", 1, r#"{"type":"PING"}"#, &reply, &cmd_tx).await;
        let Some(Message::Text(text)) = rx.recv().await else {
            panic!("expected a pong");
        };
        assert!(text.as_str().contains("PONG"));
        assert!(cmd_rx.try_recv().is_err());

        handle_text(
            "acct-main",
            1,
            r#"{"type":"SET_ITEM_STATUS","data":{"table_id":"TBL-1","index":0,"status":"served"}}"#,
            &reply,
            &cmd_tx,
        )
        .await;
        let inbound = cmd_rx.recv().await.unwrap();
        assert_eq!(inbound.tenant_id, "acct-main");
        assert_eq!(
            inbound.change,
            ItemStatusChange {
                table_id: "TBL-1".into(),
                index: 0,
                status: ItemStatus::Served,
            }
        );

        handle_text("acct-main", 1, "not json", &reply, &cmd_tx).await;
        let Some(Message::Text(text)) = rx.recv().await else {
            panic!("expected an error reply");
        };
        assert!(text.as_str().contains("BAD_MESSAGE"));
    }
}
