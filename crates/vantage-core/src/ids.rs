//! Branded session identifier.
//!
//! Session ids are opaque strings on the wire. A freshly registered visitor
//! gets a minted UUID; a reconnecting visitor supplies the id it was issued
//! earlier, and the registry adopts whatever token arrives. The newtype keeps
//! the two directions (mint vs. adopt) explicit at call sites.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, stable session identifier.
///
/// Survives reconnects: the client stores the assigned value and resends it
/// when it re-registers. Ids are never reused once issued.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a fresh unique id.
    pub fn mint() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Adopt a client-supplied token verbatim.
    pub fn adopt(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The wire representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the wire string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for SessionId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
