//! WebSocket wire protocol.
//!
//! Both directions use internally tagged JSON (`"type"` field, camelCase
//! tags). Inbound frames that fail to parse are logged and dropped by the
//! dispatcher — no payload is rejected back to the client.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vantage_sessions::{DashboardStats, SessionRecord};

/// Messages clients send to the server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Claim a session: resume with a previously issued id, or mint a new
    /// one when `sessionId` is absent.
    #[serde(rename_all = "camelCase")]
    RegisterSession {
        /// Previously issued session id, if the visitor has one.
        #[serde(default)]
        session_id: Option<String>,
    },

    /// Self-declare as an admin observer. Deliberately unauthenticated —
    /// gating this message is the capability seam for a real deployment.
    RegisterAdmin,

    /// Partial update to the sender's own claimed session. The payload is
    /// schema-free apart from `highlightFields` (broadcast metadata) and
    /// `questions` (append semantics).
    UpdateSession {
        /// Flat field map to merge into the record.
        #[serde(flatten)]
        fields: Map<String, Value>,
    },

    /// Admin command: push a one-shot navigation instruction to a session.
    #[serde(rename_all = "camelCase")]
    RedirectSession {
        /// Target session.
        session_id: String,
        /// Where the visitor should go next.
        next_page: String,
    },

    /// Submit a comment for review (peripheral workflow; broadcast-only).
    SubmitComment {
        /// Opaque comment fields.
        #[serde(flatten)]
        fields: Map<String, Value>,
    },

    /// Admin decision on a pending comment (peripheral workflow).
    ReviewComment {
        /// Identifier from the matching `commentPending` event.
        id: Value,
        /// Decision status, e.g. "approved" or "declined".
        action: String,
    },
}

/// Events the server pushes to clients.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// The resolved session id, sent to the registering connection only.
    #[serde(rename_all = "camelCase")]
    SessionAssigned {
        /// Resolved (minted or adopted) id.
        session_id: String,
    },

    /// A session record changed; sent to admin observers, and replayed
    /// per-record to a newly joined admin.
    #[serde(rename_all = "camelCase")]
    SessionUpdated {
        /// The session that changed.
        session_id: String,
        /// Full record after the change.
        session: SessionRecord,
        /// Fields the admin UI should flag (update merges only).
        #[serde(skip_serializing_if = "Option::is_none")]
        highlight_fields: Option<Vec<String>>,
        /// Set on update merges so the UI can animate the change.
        #[serde(skip_serializing_if = "Option::is_none")]
        highlight: Option<bool>,
    },

    /// A session's connection went away; sent to admin observers.
    #[serde(rename_all = "camelCase")]
    SessionOffline {
        /// The session that dropped.
        session_id: String,
    },

    /// Current dashboard aggregate; sent to admin observers.
    DashboardStats {
        /// Recomputed aggregate.
        #[serde(flatten)]
        stats: DashboardStats,
    },

    /// One-shot navigation instruction for the targeted session.
    #[serde(rename_all = "camelCase")]
    RedirectUser {
        /// Destination page.
        next_page: String,
    },

    /// A submitted comment awaiting review; sent to all connections.
    CommentPending {
        /// Generated identifier.
        id: String,
        /// Always "pending".
        status: String,
        /// Submitted comment fields, echoed through.
        #[serde(flatten)]
        fields: Map<String, Value>,
    },

    /// A review decision; sent to all connections.
    CommentReviewed {
        /// Identifier from the submission.
        id: Value,
        /// The decision status.
        status: String,
    },
}
