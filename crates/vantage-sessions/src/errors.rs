//! Session store error types.

use std::path::PathBuf;

/// Errors raised by the session store and snapshot persistence.
#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    /// The snapshot file exists but could not be read.
    #[error("failed to read snapshot {path}: {source}")]
    Load {
        /// Snapshot file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The snapshot file could not be written or moved into place.
    ///
    /// The in-memory registry stays authoritative; callers log the fault
    /// loudly and keep serving.
    #[error("failed to persist snapshot {path}: {source}")]
    Persist {
        /// Snapshot file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Snapshot contents could not be serialized or deserialized.
    #[error("invalid snapshot contents: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Convenience result alias for store operations.
pub type Result<T> = std::result::Result<T, SessionStoreError>;
