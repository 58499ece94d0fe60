//! # Kitchen Hub
//!
//! Per-tenant fan-out of [`KitchenEvent`]s to connected kitchen displays.
//!
//! ```text
//! floor service (HTTP or KDS command)
//!       │ hub.broadcast(tenant_id, event)
//!       ▼
//! KitchenHub
//!   └── tenants: DashMap<tenant_id, broadcast::Sender<KitchenEvent>>
//!             │
//!             ├──► Session (display 1) ──► ws pump ──► socket
//!             ├──► Session (display 2) ──► ws pump ──► socket
//!             └──► ...
//! ```
//!
//! Each session owns a `broadcast::Receiver`, so one session always sees
//! events in the order they were sent and a slow or dead session cannot hold
//! up the others. There is no replay: a receiver only sees events sent after
//! it subscribed. Dropping a [`Session`] unsubscribes it, and the tenant's
//! channel is removed with its last session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::protocol::KitchenEvent;

/// Default per-tenant buffer. A session further behind than this skips
/// ahead.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

struct HubInner {
    tenants: DashMap<String, broadcast::Sender<KitchenEvent>>,
    capacity: usize,
    next_session: AtomicU64,
}

/// Membership registry and broadcaster. Cheap to clone.
#[derive(Clone)]
pub struct KitchenHub {
    inner: Arc<HubInner>,
}

impl Default for KitchenHub {
    fn default() -> Self {
        KitchenHub::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl std::fmt::Debug for KitchenHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KitchenHub")
            .field("tenants", &self.inner.tenants.len())
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

impl KitchenHub {
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        KitchenHub {
            inner: Arc::new(HubInner {
                tenants: DashMap::new(),
                capacity: capacity.max(1),
                next_session: AtomicU64::new(1),
            }),
        }
    }

    /// Joins the tenant's membership set.
    pub fn connect(&self, tenant_id: &str) -> Session {
        let rx = self
            .inner
            .tenants
            .entry(tenant_id.to_string())
            .or_insert_with(|| broadcast::channel(self.inner.capacity).0)
            .subscribe();
        let id = self.inner.next_session.fetch_add(1, Ordering::Relaxed);

        debug!(tenant_id = %tenant_id, session_id = id, "Kitchen display connected");
        Session {
            id,
            tenant_id: tenant_id.to_string(),
            rx: Some(rx),
            hub: self.clone(),
        }
    }

    /// Sends `event` to every open session of the tenant. Returns how many
    /// sessions it was queued for; 0 when nobody is listening.
    pub fn broadcast(&self, tenant_id: &str, event: KitchenEvent) -> usize {
        let Some(tx) = self.inner.tenants.get(tenant_id) else {
            debug!(tenant_id = %tenant_id, event = event.type_name(), "No kitchen displays connected");
            return 0;
        };
        let event_type = event.type_name();
        let delivered = tx.send(event).unwrap_or(0);
        debug!(tenant_id = %tenant_id, event = event_type, delivered, "Kitchen event broadcast");
        delivered
    }

    pub fn session_count(&self, tenant_id: &str) -> usize {
        self.inner
            .tenants
            .get(tenant_id)
            .map_or(0, |tx| tx.receiver_count())
    }

    /// Tenants with at least one channel entry.
    pub fn tenant_count(&self) -> usize {
        self.inner.tenants.len()
    }

    /// Drops the tenant's channel once no receiver is left. Callers drop
    /// their receiver first.
    fn release(&self, tenant_id: &str) {
        self.inner
            .tenants
            .remove_if(tenant_id, |_, tx| tx.receiver_count() == 0);
    }
}

/// One connected kitchen display.
pub struct Session {
    id: u64,
    tenant_id: String,
    /// Only `None` while the session is being dropped.
    rx: Option<broadcast::Receiver<KitchenEvent>>,
    hub: KitchenHub,
}

impl Session {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Next event for this session, or `None` once the hub is gone.
    ///
    /// A session that fell more than the channel capacity behind skips the
    /// events it missed and carries on.
    pub async fn next_event(&mut self) -> Option<KitchenEvent> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        tenant_id = %self.tenant_id,
                        session_id = self.id,
                        skipped,
                        "Kitchen display lagged, skipping missed events"
                    );
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Leaves the membership set. Same as dropping the session.
    pub fn disconnect(self) {}
}

impl Drop for Session {
    fn drop(&mut self) {
        drop(self.rx.take());
        self.hub.release(&self.tenant_id);
        debug!(tenant_id = %self.tenant_id, session_id = self.id, "Kitchen display disconnected");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CloseReason, TableClosed};

    fn closed(table_id: &str) -> KitchenEvent {
        KitchenEvent::TableClosed(TableClosed {
            table_id: table_id.into(),
            order_id: format!("ORD-{table_id}"),
            reason: CloseReason::CheckedOut,
            transaction_id: Some("1234567890123456".into()),
        })
    }

    #[tokio::test]
    async fn test_fan_out_preserves_order() {
        let hub = KitchenHub::default();
        let mut a = hub.connect("acct-main");
        let mut b = hub.connect("acct-main");
        assert_eq!(hub.session_count("acct-main"), 2);

        for table in ["T1", "T2", "T3"] {
            assert_eq!(hub.broadcast("acct-main", closed(table)), 2);
        }

        for session in [&mut a, &mut b] {
            for table in ["T1", "T2", "T3"] {
                assert_eq!(session.next_event().await.unwrap().table_id(), table);
            }
        }
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let hub = KitchenHub::default();
        let mut main = hub.connect("acct-main");
        let _other = hub.connect("acct-other");

        hub.broadcast("acct-other", closed("T9"));
        hub.broadcast("acct-main", closed("T1"));

        // the first event this session sees is its own tenant's
        assert_eq!(main.next_event().await.unwrap().table_id(), "T1");
    }

    #[tokio::test]
    async fn test_no_replay_for_late_joiners() {
        let hub = KitchenHub::default();
        let _early = hub.connect("acct-main");
        hub.broadcast("acct-main", closed("T1"));

        let mut late = hub.connect("acct-main");
        hub.broadcast("acct-main", closed("T2"));
        assert_eq!(late.next_event().await.unwrap().table_id(), "T2");
    }

    #[tokio::test]
    async fn test_dropped_session_leaves_membership() {
        let hub = KitchenHub::default();
        assert_eq!(hub.broadcast("acct-main", closed("T1")), 0);

        let a = hub.connect("acct-main");
        let mut b = hub.connect("acct-main");
        drop(a);
        assert_eq!(hub.session_count("acct-main"), 1);

        // a departed session does not block delivery to the rest
        assert_eq!(hub.broadcast("acct-main", closed("T1")), 1);
        assert_eq!(b.next_event().await.unwrap().table_id(), "T1");

        b.disconnect();
        assert_eq!(hub.session_count("acct-main"), 0);
        assert_eq!(hub.tenant_count(), 0);
    }

    #[test]
    fn test_sessions_leaving_together_release_the_tenant() {
        let hub = KitchenHub::default();
        for _ in 0..200 {
            let a = hub.connect("acct-main");
            let b = hub.connect("acct-main");
            let barrier = Arc::new(std::sync::Barrier::new(2));
            let leave = |session: Session| {
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    drop(session);
                })
            };
            let (ta, tb) = (leave(a), leave(b));
            ta.join().unwrap();
            tb.join().unwrap();
            assert_eq!(hub.tenant_count(), 0);
        }
    }

    #[tokio::test]
    async fn test_lagged_session_skips_ahead() {
        let hub = KitchenHub::new(2);
        let mut slow = hub.connect("acct-main");

        for table in ["T1", "T2", "T3", "T4"] {
            hub.broadcast("acct-main", closed(table));
        }

        // T1 and T2 fell out of the buffer
        assert_eq!(slow.next_event().await.unwrap().table_id(), "T3");
        assert_eq!(slow.next_event().await.unwrap().table_id(), "T4");
    }
}
