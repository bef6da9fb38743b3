//! Event fan-out to connected WebSocket clients.
//!
//! Three delivery scopes: the admin observer set, one session's private
//! group, and everyone. Delivery is best-effort — no acknowledgment, no
//! retry, no ordering guarantee across observers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::{counter, gauge};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::protocol::ServerEvent;

use super::connection::ClientConnection;

/// Maximum total lifetime message drops before forcibly disconnecting a slow client.
const MAX_TOTAL_DROPS: u64 = 100;

/// Manages event broadcasting to connected clients.
pub struct BroadcastManager {
    /// Connected clients indexed by connection ID.
    connections: RwLock<HashMap<String, Arc<ClientConnection>>>,
    /// Atomic counter tracking total connections (avoids read-locking for count queries).
    active_count: AtomicUsize,
    /// Atomic counter tracking flagged admin observers.
    admin_count: AtomicUsize,
}

impl BroadcastManager {
    /// Create a new broadcast manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
            admin_count: AtomicUsize::new(0),
        }
    }

    /// Add a connection.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        if conns.insert(connection.id.clone(), connection).is_none() {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        }
        gauge!("ws_connections_active").set(self.active_count.load(Ordering::Relaxed) as f64);
    }

    /// Remove a connection by ID, releasing its admin membership if flagged.
    pub async fn remove(&self, connection_id: &str) {
        let mut conns = self.connections.write().await;
        if let Some(conn) = conns.remove(connection_id) {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
            if conn.is_admin() {
                let _ = self.admin_count.fetch_sub(1, Ordering::Relaxed);
            }
        }
        gauge!("ws_connections_active").set(self.active_count.load(Ordering::Relaxed) as f64);
        gauge!("admin_observers_active").set(self.admin_count.load(Ordering::Relaxed) as f64);
    }

    /// Flag a connection as an admin observer.
    ///
    /// Idempotent per connection; the observer set is exactly the flagged
    /// connections still registered here.
    pub fn mark_admin(&self, connection: &ClientConnection) {
        if !connection.is_admin() {
            connection.set_admin();
            let _ = self.admin_count.fetch_add(1, Ordering::Relaxed);
            gauge!("admin_observers_active").set(self.admin_count.load(Ordering::Relaxed) as f64);
        }
    }

    /// Broadcast an event to every admin observer.
    pub async fn broadcast_to_admins(&self, event: &ServerEvent) {
        self.broadcast_to(ClientConnection::is_admin, event, "admins")
            .await;
    }

    /// Broadcast an event to all connections bound to the given session.
    pub async fn broadcast_to_session(&self, session_id: &str, event: &ServerEvent) {
        self.broadcast_to(
            |c| c.session_id().as_deref() == Some(session_id),
            event,
            session_id,
        )
        .await;
    }

    /// Broadcast an event to all connections.
    pub async fn broadcast_all(&self, event: &ServerEvent) {
        self.broadcast_to(|_| true, event, "all").await;
    }

    /// Serialize event, fan out to matching clients, remove slow clients.
    async fn broadcast_to(
        &self,
        filter: impl Fn(&ClientConnection) -> bool,
        event: &ServerEvent,
        label: &str,
    ) {
        let json = match serde_json::to_string(event) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(error = %e, "failed to serialize event");
                return;
            }
        };
        let mut to_remove = Vec::new();
        {
            let conns = self.connections.read().await;
            let mut recipients = 0u32;
            for conn in conns.values() {
                if filter(conn) {
                    recipients += 1;
                    if !conn.send(Arc::clone(&json)) {
                        counter!("ws_broadcast_drops_total").increment(1);
                        let drops = conn.drop_count();
                        if drops >= MAX_TOTAL_DROPS {
                            warn!(conn_id = %conn.id, label, drops, "disconnecting slow client");
                            to_remove.push(conn.id.clone());
                        } else {
                            warn!(conn_id = %conn.id, label, total_drops = drops, "failed to send event to client (channel full)");
                        }
                    }
                }
            }
            debug!(label, recipients, "broadcast event");
        }
        for id in &to_remove {
            self.remove(id).await;
        }
    }

    /// Number of active connections.
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Number of connected admin observers.
    pub fn admin_count(&self) -> usize {
        self.admin_count.load(Ordering::Relaxed)
    }

    /// Get connections bound to a specific session.
    pub async fn session_connections(&self, session_id: &str) -> Vec<Arc<ClientConnection>> {
        let conns = self.connections.read().await;
        conns
            .values()
            .filter(|c| c.session_id().as_deref() == Some(session_id))
            .cloned()
            .collect()
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}
