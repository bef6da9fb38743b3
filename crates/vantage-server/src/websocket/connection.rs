//! WebSocket upgrade and per-connection read/write loops.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use metrics::counter;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::protocol::ServerEvent;
use crate::state::AppState;
use crate::websocket::handler;

/// Per-connection outbound buffer. A client this far behind starts dropping
/// frames (and is eventually evicted by the broadcast manager).
const EVENT_BUFFER: usize = 256;

/// One live WebSocket client.
///
/// Outbound frames go through a bounded channel of pre-serialized JSON so a
/// slow reader cannot stall broadcast fan-out. The session binding and admin
/// flag are the connection's only mutable state.
pub struct ClientConnection {
    /// Connection id (distinct from any session id).
    pub id: String,
    ip: Option<String>,
    sender: mpsc::Sender<Arc<String>>,
    session_id: RwLock<Option<String>>,
    is_admin: AtomicBool,
    drops: AtomicU64,
}

impl ClientConnection {
    /// Create a connection around an outbound channel.
    pub fn new(id: String, ip: Option<String>, sender: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            ip,
            sender,
            session_id: RwLock::new(None),
            is_admin: AtomicBool::new(false),
            drops: AtomicU64::new(0),
        }
    }

    /// Resolved client address (forwarded header or transport peer).
    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    /// Queue a pre-serialized frame. Returns false (and counts a drop) when
    /// the client's buffer is full or its writer is gone.
    pub fn send(&self, frame: Arc<String>) -> bool {
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(_) => {
                let _ = self.drops.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Serialize and queue a single event for this connection only.
    pub fn send_event(&self, event: &ServerEvent) -> bool {
        match serde_json::to_string(event) {
            Ok(json) => self.send(Arc::new(json)),
            Err(e) => {
                warn!(conn_id = %self.id, error = %e, "failed to serialize event");
                false
            }
        }
    }

    /// Lifetime count of dropped frames.
    pub fn drop_count(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }

    /// Claim a session for this connection.
    pub fn bind_session(&self, session_id: &str) {
        *self.session_id.write() = Some(session_id.to_string());
    }

    /// The claimed session, if any.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Flag this connection as an admin observer.
    pub fn set_admin(&self) {
        self.is_admin.store(true, Ordering::Relaxed);
    }

    /// Whether this connection is an admin observer.
    pub fn is_admin(&self) -> bool {
        self.is_admin.load(Ordering::Relaxed)
    }
}

/// Resolve the client address: first entry of `x-forwarded-for` (split on
/// comma, trimmed) when present, otherwise the transport peer address.
pub fn resolve_client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|first| first.trim().to_string())
        .filter(|first| !first.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}

/// `GET /ws` — upgrade to a WebSocket session.
pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    let ip = resolve_client_ip(&headers, peer);
    ws.on_upgrade(move |socket| handle_socket(state, socket, ip))
}

/// Drive one connection to completion: spawn the writer, pump inbound
/// frames through the dispatcher, then run the disconnect transition.
async fn handle_socket(state: AppState, socket: WebSocket, ip: String) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Arc<String>>(EVENT_BUFFER);

    let conn = Arc::new(ClientConnection::new(
        Uuid::now_v7().to_string(),
        Some(ip),
        tx,
    ));
    state.broadcast.add(Arc::clone(&conn)).await;
    counter!("ws_connections_total").increment(1);
    debug!(conn_id = %conn.id, "client connected");

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_tx
                .send(Message::Text(frame.as_str().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    while let Some(Ok(message)) = ws_rx.next().await {
        match message {
            Message::Text(text) => handler::dispatch(&state, &conn, text.as_str()).await,
            Message::Close(_) => break,
            // Pings are answered by axum; binary frames are not part of
            // the protocol.
            _ => {}
        }
    }

    handler::handle_disconnect(&state, &conn).await;
    writer.abort();
    debug!(conn_id = %conn.id, "client connection closed");
}
