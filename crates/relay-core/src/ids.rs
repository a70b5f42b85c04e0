//! Branded ID newtypes.
//!
//! IDs are UUID v7 (time-ordered) strings, so connection IDs sort by
//! connect time in logs.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix applied to generated connection IDs.
const CONNECTION_PREFIX: &str = "conn_";

/// Unique identifier of one connected real-time client.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Create a new random ID (`conn_` + UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(format!("{CONNECTION_PREFIX}{}", Uuid::now_v7()))
    }

    /// Create from an existing string value.
    #[must_use]
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<str> for ConnectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
