//! Inbound message dispatch and presence transitions.
//!
//! One function per inbound message type, mirroring the wire protocol.
//! Registry mutations go through [`AppState::store`]; every mutation's
//! admin-visible side effects are broadcast from the cloned result, never
//! from re-reads, so observers see each mutation exactly once.

use std::sync::Arc;

use metrics::counter;
use serde_json::{Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::protocol::{ClientMessage, ServerEvent};
use crate::state::AppState;

use super::connection::ClientConnection;

/// Parse a raw text frame and route it. Unparseable frames are dropped
/// with a warning — the wire contract never rejects a payload.
pub async fn dispatch(state: &AppState, conn: &Arc<ClientConnection>, raw: &str) {
    match serde_json::from_str::<ClientMessage>(raw) {
        Ok(ClientMessage::RegisterSession { session_id }) => {
            handle_register_session(state, conn, session_id.as_deref()).await;
        }
        Ok(ClientMessage::RegisterAdmin) => handle_register_admin(state, conn).await,
        Ok(ClientMessage::UpdateSession { fields }) => {
            handle_update_session(state, conn, fields).await;
        }
        Ok(ClientMessage::RedirectSession {
            session_id,
            next_page,
        }) => handle_redirect(state, &session_id, next_page).await,
        Ok(ClientMessage::SubmitComment { fields }) => handle_submit_comment(state, fields).await,
        Ok(ClientMessage::ReviewComment { id, action }) => {
            handle_review_comment(state, id, action).await;
        }
        Err(e) => warn!(conn_id = %conn.id, error = %e, "ignoring unparseable frame"),
    }
}

/// Visitor registration: resolve the session id, claim it for this
/// connection, and bring admins up to date.
pub async fn handle_register_session(
    state: &AppState,
    conn: &Arc<ClientConnection>,
    existing: Option<&str>,
) {
    let registration = state
        .store
        .register(existing, conn.ip().map(str::to_string));
    let session_id = registration.session_id.into_string();

    conn.bind_session(&session_id);
    let _ = conn.send_event(&ServerEvent::SessionAssigned {
        session_id: session_id.clone(),
    });

    state
        .broadcast
        .broadcast_to_admins(&ServerEvent::SessionUpdated {
            session_id: session_id.clone(),
            session: registration.record,
            highlight_fields: None,
            highlight: None,
        })
        .await;
    broadcast_stats(state).await;

    info!(%session_id, first_visit = registration.first_visit, "visitor connected");
}

/// Admin join: flag the connection, refresh every admin's dashboard, then
/// replay the full registry to the newcomer so its view converges.
pub async fn handle_register_admin(state: &AppState, conn: &Arc<ClientConnection>) {
    state.broadcast.mark_admin(conn);
    broadcast_stats(state).await;

    for (session_id, record) in state.store.all() {
        let _ = conn.send_event(&ServerEvent::SessionUpdated {
            session_id,
            session: record,
            highlight_fields: None,
            highlight: None,
        });
    }

    info!(conn_id = %conn.id, "admin connected");
}

/// Partial update to the sender's own session. Connections with no claim
/// are silently ignored — a client cannot update an arbitrary target.
pub async fn handle_update_session(
    state: &AppState,
    conn: &Arc<ClientConnection>,
    fields: Map<String, Value>,
) {
    let Some(session_id) = conn.session_id() else {
        return;
    };

    match state.store.apply_update(&session_id, fields) {
        Ok(outcome) => {
            state
                .broadcast
                .broadcast_to_admins(&ServerEvent::SessionUpdated {
                    session_id,
                    session: outcome.record,
                    highlight_fields: Some(outcome.highlight_fields),
                    highlight: Some(true),
                })
                .await;
        }
        Err(e) => {
            counter!("snapshot_failures_total").increment(1);
            error!(%session_id, error = %e, "failed to persist session update");
        }
    }
}

/// Admin redirect: unknown sessions are logged and dropped with no outbound
/// traffic; known sessions get the navigation instruction on their private
/// group.
pub async fn handle_redirect(state: &AppState, session_id: &str, next_page: String) {
    if state.store.mark_redirected(session_id).is_none() {
        warn!(session_id, "redirect for unknown session dropped");
        return;
    }

    info!(session_id, %next_page, "redirecting session");
    state
        .broadcast
        .broadcast_to_session(session_id, &ServerEvent::RedirectUser { next_page })
        .await;
}

/// Comment submission (peripheral): assign an id and echo to everyone as
/// pending. Reserved keys in the submission are dropped so the generated
/// id and status always win.
pub async fn handle_submit_comment(state: &AppState, mut fields: Map<String, Value>) {
    let _ = fields.remove("id");
    let _ = fields.remove("status");
    let id = Uuid::now_v7().to_string();

    info!(comment_id = %id, "comment received");
    state
        .broadcast
        .broadcast_all(&ServerEvent::CommentPending {
            id,
            status: "pending".to_string(),
            fields,
        })
        .await;
}

/// Comment review decision (peripheral): echo the decision to everyone.
pub async fn handle_review_comment(state: &AppState, id: Value, action: String) {
    info!(comment_id = %id, %action, "comment reviewed");
    state
        .broadcast
        .broadcast_all(&ServerEvent::CommentReviewed { id, status: action })
        .await;
}

/// Disconnect transition: drop broadcast membership (and admin flag with
/// it); if the connection claimed a session, take it offline, notify
/// admins, and refresh the dashboard.
pub async fn handle_disconnect(state: &AppState, conn: &Arc<ClientConnection>) {
    state.broadcast.remove(&conn.id).await;
    counter!("ws_disconnections_total").increment(1);

    if conn.is_admin() {
        info!(conn_id = %conn.id, "admin disconnected");
    }

    let Some(session_id) = conn.session_id() else {
        return;
    };

    match state.store.mark_offline(&session_id) {
        Ok(Some(record)) => {
            state
                .broadcast
                .broadcast_to_admins(&ServerEvent::SessionOffline {
                    session_id: session_id.clone(),
                })
                .await;
            state
                .broadcast
                .broadcast_to_admins(&ServerEvent::SessionUpdated {
                    session_id: session_id.clone(),
                    session: record,
                    highlight_fields: None,
                    highlight: None,
                })
                .await;
            info!(%session_id, "visitor disconnected");
        }
        Ok(None) => {}
        Err(e) => {
            counter!("snapshot_failures_total").increment(1);
            error!(%session_id, error = %e, "failed to persist offline transition");
        }
    }

    broadcast_stats(state).await;
}

/// Recompute the dashboard aggregate and push it to every admin observer.
async fn broadcast_stats(state: &AppState) {
    let stats = state.store.stats(state.broadcast.admin_count());
    state
        .broadcast
        .broadcast_to_admins(&ServerEvent::DashboardStats { stats })
        .await;
}
