//! Session record and dashboard aggregate wire types.
//!
//! These serialize with camelCase field names — the same shape travels over
//! the WebSocket to admin observers and into the snapshot file, so a restored
//! record is byte-for-byte what was saved.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vantage_core::clock;
use vantage_core::ids::SessionId;

fn default_status() -> String {
    "idle".to_string()
}

/// One visitor's workflow state, addressable by a stable [`SessionId`].
///
/// `status` is a free-text workflow marker — any string is legal, there is
/// no enum. Fields not modeled here (ad hoc scalars contributed by update
/// payloads) live in `extra` and round-trip verbatim through broadcasts and
/// snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Free-text workflow marker (e.g. "idle", "login submitted").
    #[serde(default = "default_status")]
    pub status: String,
    /// True while a live connection claims this session.
    #[serde(default)]
    pub online: bool,
    /// Best-effort client address, refreshed on every (re)registration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Ordered, append-only records contributed by the client over time.
    /// Never truncated or reordered.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<Value>,
    /// Epoch milliseconds of the last mutation; never decreases.
    #[serde(default)]
    pub last_update: i64,
    /// Ad hoc fields introduced by update payloads.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionRecord {
    /// A record as created by explicit registration.
    pub fn registered(ip: Option<String>) -> Self {
        Self {
            status: default_status(),
            online: true,
            ip,
            questions: Vec::new(),
            last_update: clock::now_millis(),
            extra: Map::new(),
        }
    }

    /// A record created implicitly when an update arrives for an unknown id.
    pub fn implicit() -> Self {
        Self {
            status: "login submitted".to_string(),
            online: true,
            ip: None,
            questions: Vec::new(),
            last_update: clock::now_millis(),
            extra: Map::new(),
        }
    }

    /// Refresh `last_update` without ever moving it backwards.
    pub fn touch(&mut self) {
        self.last_update = clock::monotonic_refresh(self.last_update);
    }
}

/// Result of a registration call.
#[derive(Debug)]
pub struct Registration {
    /// The resolved session id (minted or adopted).
    pub session_id: SessionId,
    /// The record after the registration applied.
    pub record: SessionRecord,
    /// True when the caller supplied no prior id — exactly these calls
    /// increment the lifetime visit counter.
    pub first_visit: bool,
}

/// Result of an update merge.
#[derive(Debug)]
pub struct UpdateOutcome {
    /// The record after the merge applied.
    pub record: SessionRecord,
    /// Field names the admin UI should visually flag. Broadcast metadata
    /// only — never stored on the record.
    pub highlight_fields: Vec<String>,
}

/// Dashboard aggregate, recomputed on demand and broadcast to admins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Records in the registry, online or not.
    pub total_users: usize,
    /// Lifetime count of first-time registrations (process lifetime; the
    /// snapshot does not carry it).
    pub total_visits: u64,
    /// Records currently online.
    pub total_online_users: usize,
    /// Currently connected admin observers.
    pub total_handlers: usize,
}
