//! The authoritative session registry.
//!
//! [`SessionStore`] owns the `sessionId -> record` mapping, the lifetime
//! visit counter, and the snapshot store. A single mutex guards all three,
//! and persisting mutations write their snapshot while still holding it —
//! the on-disk file therefore always reflects a fully applied mutation, and
//! racing saves cannot interleave.
//!
//! INVARIANT: records are never deleted; ids are never reused; iteration
//! order of [`SessionStore::all`] is insertion order.

use indexmap::IndexMap;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, instrument};
use vantage_core::ids::SessionId;

use crate::errors::Result;
use crate::merge::{apply_payload, split_highlight_fields};
use crate::record::{DashboardStats, Registration, SessionRecord, UpdateOutcome};
use crate::snapshot::SnapshotStore;

struct RegistryInner {
    sessions: IndexMap<String, SessionRecord>,
    total_visits: u64,
}

/// Authoritative in-memory session registry with snapshot persistence.
pub struct SessionStore {
    inner: Mutex<RegistryInner>,
    snapshot: SnapshotStore,
}

impl SessionStore {
    /// Open the store, restoring prior state from the snapshot file.
    ///
    /// Restored records are taken verbatim — a crash that left `online: true`
    /// flags behind is visible to admins until those sessions reconnect or
    /// the records are updated. The visit counter always starts at zero; the
    /// snapshot layout carries only the session mapping.
    pub fn open(snapshot: SnapshotStore) -> Result<Self> {
        let sessions = snapshot.load()?;
        gauge!("sessions_active").set(sessions.values().filter(|r| r.online).count() as f64);
        Ok(Self {
            inner: Mutex::new(RegistryInner {
                sessions,
                total_visits: 0,
            }),
            snapshot,
        })
    }

    /// Register a visitor connection, resolving its session id.
    ///
    /// No supplied id: mint a fresh one and create a default record. A
    /// supplied but unknown id is adopted verbatim and gets a default record.
    /// A known id is marked online with its address refreshed. Idempotent
    /// for known ids; `first_visit` is true only when no id was supplied.
    ///
    /// Registration does not persist a snapshot — only disconnects and
    /// update merges are durable points.
    #[instrument(skip(self, ip))]
    pub fn register(&self, existing: Option<&str>, ip: Option<String>) -> Registration {
        let first_visit = existing.is_none();
        let session_id = match existing {
            Some(raw) => SessionId::adopt(raw),
            None => SessionId::mint(),
        };

        let mut inner = self.inner.lock();
        if first_visit {
            inner.total_visits += 1;
            counter!("visits_total").increment(1);
        }

        let record = match inner.sessions.get_mut(session_id.as_str()) {
            Some(record) => {
                record.online = true;
                record.ip = ip;
                record.touch();
                record.clone()
            }
            None => {
                let record = SessionRecord::registered(ip);
                let _ = inner
                    .sessions
                    .insert(session_id.as_str().to_string(), record.clone());
                record
            }
        };
        gauge!("sessions_active").set(Self::online_count(&inner) as f64);
        debug!(session_id = %session_id, first_visit, "session registered");

        Registration {
            session_id,
            record,
            first_visit,
        }
    }

    /// Mark a session offline and persist a snapshot.
    ///
    /// Absent records are a no-op mutation but still persist — every
    /// disconnect of a session claim is a durable point.
    #[instrument(skip(self))]
    pub fn mark_offline(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let mut inner = self.inner.lock();
        let record = match inner.sessions.get_mut(session_id) {
            Some(record) => {
                record.online = false;
                record.touch();
                Some(record.clone())
            }
            None => None,
        };
        gauge!("sessions_active").set(Self::online_count(&inner) as f64);
        self.snapshot.save(&inner.sessions)?;
        Ok(record)
    }

    /// Apply a partial update to a session and persist a snapshot.
    ///
    /// Unknown ids get a minimal implicit record first. `highlightFields`
    /// is split off into the outcome; the remaining payload merges under
    /// the overwrite-except-questions-append rules.
    #[instrument(skip(self, payload))]
    pub fn apply_update(
        &self,
        session_id: &str,
        mut payload: Map<String, Value>,
    ) -> Result<UpdateOutcome> {
        let highlight_fields = split_highlight_fields(&mut payload);

        let mut inner = self.inner.lock();
        let record = {
            let record = inner
                .sessions
                .entry(session_id.to_string())
                .or_insert_with(SessionRecord::implicit);
            apply_payload(record, payload);
            record.clone()
        };

        self.snapshot.save(&inner.sessions)?;
        Ok(UpdateOutcome {
            record,
            highlight_fields,
        })
    }

    /// Set a session's status to `"redirected"`.
    ///
    /// Returns `None` for unknown ids. Not a durable point — redirects only
    /// touch `status`, and the session's next disconnect persists it.
    #[instrument(skip(self))]
    pub fn mark_redirected(&self, session_id: &str) -> Option<SessionRecord> {
        let mut inner = self.inner.lock();
        inner.sessions.get_mut(session_id).map(|record| {
            record.status = "redirected".to_string();
            record.touch();
            record.clone()
        })
    }

    /// Look up a session record.
    pub fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.inner.lock().sessions.get(session_id).cloned()
    }

    /// Whether a session id is known.
    pub fn contains(&self, session_id: &str) -> bool {
        self.inner.lock().sessions.contains_key(session_id)
    }

    /// All records in insertion order — backs full-state replay to a newly
    /// joined admin observer.
    pub fn all(&self) -> Vec<(String, SessionRecord)> {
        self.inner
            .lock()
            .sessions
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }

    /// Recompute the dashboard aggregate.
    ///
    /// `handler_count` is supplied by the broadcast layer, which owns admin
    /// observer membership.
    pub fn stats(&self, handler_count: usize) -> DashboardStats {
        let inner = self.inner.lock();
        DashboardStats {
            total_users: inner.sessions.len(),
            total_visits: inner.total_visits,
            total_online_users: Self::online_count(&inner),
            total_handlers: handler_count,
        }
    }

    /// Lifetime count of first-time registrations.
    pub fn total_visits(&self) -> u64 {
        self.inner.lock().total_visits
    }

    /// Number of records in the registry.
    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Whether the registry holds no records.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().sessions.is_empty()
    }

    fn online_count(inner: &RegistryInner) -> usize {
        inner.sessions.values().filter(|r| r.online).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open_store(dir: &tempfile::TempDir) -> SessionStore {
        SessionStore::open(SnapshotStore::new(dir.path().join("logs.json"))).unwrap()
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn fresh_registrations_mint_distinct_ids_and_count_visits() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let a = store.register(None, None);
        let b = store.register(None, None);
        let c = store.register(None, None);

        assert_ne!(a.session_id, b.session_id);
        assert_ne!(b.session_id, c.session_id);
        assert!(a.first_visit && b.first_visit && c.first_visit);
        assert_eq!(store.total_visits(), 3);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn re_registration_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let first = store.register(None, Some("1.1.1.1".into()));
        let again = store.register(Some(first.session_id.as_str()), Some("2.2.2.2".into()));

        assert_eq!(first.session_id, again.session_id);
        assert!(!again.first_visit);
        assert_eq!(store.total_visits(), 1);
        assert_eq!(store.len(), 1);
        // Address refreshed on re-registration.
        assert_eq!(again.record.ip.as_deref(), Some("2.2.2.2"));
    }

    #[test]
    fn unknown_supplied_id_is_adopted_without_counting_a_visit() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let reg = store.register(Some("token-from-before-restart"), None);

        assert_eq!(reg.session_id.as_str(), "token-from-before-restart");
        assert!(!reg.first_visit);
        assert_eq!(store.total_visits(), 0);
        assert!(store.contains("token-from-before-restart"));
        assert_eq!(reg.record.status, "idle");
        assert!(reg.record.online);
    }

    #[test]
    fn mark_offline_flips_the_flag_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let reg = store.register(None, None);

        let record = store.mark_offline(reg.session_id.as_str()).unwrap();
        assert!(!record.unwrap().online);
        assert!(!store.get(reg.session_id.as_str()).unwrap().online);

        // The durable point wrote the flag to disk.
        let restored = SnapshotStore::new(dir.path().join("logs.json"))
            .load()
            .unwrap();
        assert!(!restored[reg.session_id.as_str()].online);
    }

    #[test]
    fn mark_offline_for_unknown_id_is_a_persisted_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let result = store.mark_offline("ghost").unwrap();
        assert!(result.is_none());
        assert!(dir.path().join("logs.json").exists());
    }

    #[test]
    fn update_for_unknown_session_creates_implicit_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let outcome = store
            .apply_update("implicit-1", object(json!({"username": "v7"})))
            .unwrap();

        assert_eq!(outcome.record.status, "login submitted");
        assert!(outcome.record.online);
        assert_eq!(outcome.record.extra["username"], "v7");
        assert!(store.contains("implicit-1"));
    }

    #[test]
    fn update_merges_and_reports_highlight_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let reg = store.register(None, None);

        let outcome = store
            .apply_update(
                reg.session_id.as_str(),
                object(json!({"status": "x", "highlightFields": ["status"]})),
            )
            .unwrap();

        assert_eq!(outcome.record.status, "x");
        assert_eq!(outcome.highlight_fields, vec!["status".to_string()]);

        // The metadata never reaches disk.
        let raw = std::fs::read_to_string(dir.path().join("logs.json")).unwrap();
        assert!(!raw.contains("highlightFields"));
    }

    #[test]
    fn update_appends_questions_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let reg = store.register(None, None);
        let id = reg.session_id.as_str();

        let _ = store
            .apply_update(id, object(json!({"questions": ["a", "b"]})))
            .unwrap();
        let outcome = store
            .apply_update(id, object(json!({"questions": ["c"]})))
            .unwrap();

        assert_eq!(
            outcome.record.questions,
            vec![json!("a"), json!("b"), json!("c")]
        );
    }

    #[test]
    fn redirect_marks_known_sessions_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let reg = store.register(None, None);

        let record = store.mark_redirected(reg.session_id.as_str()).unwrap();
        assert_eq!(record.status, "redirected");

        assert!(store.mark_redirected("ghost").is_none());
        assert!(!store.contains("ghost"));
    }

    #[test]
    fn stats_reflect_registry_and_handler_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let first = store.register(None, None);
        let _ = store.register(Some(first.session_id.as_str()), None);
        let second = store.register(None, None);
        let _ = store.mark_offline(second.session_id.as_str()).unwrap();

        let stats = store.stats(1);
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.total_visits, 2);
        assert_eq!(stats.total_online_users, 1);
        assert_eq!(stats.total_handlers, 1);
    }

    #[test]
    fn open_restores_prior_snapshot_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open_store(&dir);
            let reg = store.register(None, None);
            let _ = store
                .apply_update(reg.session_id.as_str(), object(json!({"plan": "premium"})))
                .unwrap();
        }

        let store = open_store(&dir);
        assert_eq!(store.len(), 1);
        let (_, record) = store.all().into_iter().next().unwrap();
        // Online flag survives the restart untouched (update left it true).
        assert!(record.online);
        assert_eq!(record.extra["plan"], "premium");
        // Visit counter is process-lifetime only.
        assert_eq!(store.total_visits(), 0);
    }

    #[test]
    fn all_preserves_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let _ = store.register(Some("first"), None);
        let _ = store.register(Some("second"), None);
        let _ = store.register(Some("third"), None);

        let ids: Vec<String> = store.all().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["first", "second", "third"]);
    }

    #[test]
    fn records_are_never_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let reg = store.register(None, None);
        let _ = store.mark_offline(reg.session_id.as_str()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get(reg.session_id.as_str()).is_some());
    }
}
