//! Shared server state handed to every handler.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use vantage_sessions::SessionStore;

use crate::websocket::broadcast::BroadcastManager;

/// Application state: the session store, the broadcast manager, and the
/// metrics handle. Cloned into each request; all fields are shared handles.
///
/// The store is injected rather than ambient so tests can run against an
/// isolated registry with a throwaway snapshot file.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative session registry.
    pub store: Arc<SessionStore>,
    /// WebSocket fan-out manager.
    pub broadcast: Arc<BroadcastManager>,
    /// Renders the `/metrics` endpoint.
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// Assemble state around an opened store.
    pub fn new(store: Arc<SessionStore>, metrics: PrometheusHandle) -> Self {
        Self {
            store,
            broadcast: Arc::new(BroadcastManager::new()),
            metrics,
        }
    }
}
