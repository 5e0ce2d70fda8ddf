//! Entity identifiers.
//!
//! An entity is the addressable subject of introspection. Its identifier is
//! the string `<serviceName>-<serverName>` (e.g. `"ca-manager-staging"`).
//! A client owns exactly one entity but may publish components on behalf of
//! others, so the id is an ordinary value type, not a singleton.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an introspection entity, formed as `service-server`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Builds the id for a service on a named server.
    #[must_use]
    pub fn new(service: &str, server: &str) -> Self {
        Self(format!("{service}-{server}"))
    }

    /// Wraps an already-joined id (multi-entity publishing).
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the id is empty (invalid for registration).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}
