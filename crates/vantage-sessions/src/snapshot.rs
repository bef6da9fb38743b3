//! Whole-registry snapshot persistence.
//!
//! The snapshot is a single JSON file holding the full `sessionId -> record`
//! mapping, pretty-printed, overwritten wholesale on each durable mutation.
//! There is no incremental log; last writer wins. Writes go through a temp
//! sibling and a rename so readers never observe a torn file.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use metrics::counter;
use tracing::debug;

use crate::errors::{Result, SessionStoreError};
use crate::record::SessionRecord;

/// Loads and saves the session registry as one JSON document.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Create a store persisting to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the registry state from disk.
    ///
    /// An absent file yields an empty registry. A present file is restored
    /// verbatim — including stale `online: true` flags left by a crash; no
    /// reconciliation is performed. A corrupt file is an error.
    pub fn load(&self) -> Result<IndexMap<String, SessionRecord>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no snapshot file, starting empty");
            return Ok(IndexMap::new());
        }
        let raw = std::fs::read_to_string(&self.path).map_err(|source| SessionStoreError::Load {
            path: self.path.clone(),
            source,
        })?;
        let sessions: IndexMap<String, SessionRecord> = serde_json::from_str(&raw)?;
        debug!(path = %self.path.display(), count = sessions.len(), "snapshot restored");
        Ok(sessions)
    }

    /// Persist the full registry, replacing any previous snapshot.
    pub fn save(&self, sessions: &IndexMap<String, SessionRecord>) -> Result<()> {
        let json = serde_json::to_string_pretty(sessions)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| SessionStoreError::Persist {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|source| SessionStoreError::Persist {
            path: self.path.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| SessionStoreError::Persist {
            path: self.path.clone(),
            source,
        })?;

        counter!("snapshot_writes_total").increment(1);
        debug!(path = %self.path.display(), count = sessions.len(), "snapshot written");
        Ok(())
    }
}
