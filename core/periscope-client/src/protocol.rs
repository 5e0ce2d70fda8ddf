//! Wire protocol with the registrar.
//!
//! The sync protocol is a two-request exchange over HTTP/2 + mTLS:
//! 1. `POST /sync/checksums` — the client sends a checksum per registered
//!    component, the registrar answers with the component ids it needs.
//! 2. `POST /sync/components` — the client uploads only those components.
//!
//! Any non-200 status is a failure; error bodies are opaque and only logged.

use periscope_types::{Component, EntityId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Component id of the static service facts provider.
pub const SERVICE_INFO_COMPONENT: &str = "service-info";

/// Component id of the log ring provider.
pub const RECENT_LOGS_COMPONENT: &str = "recent-logs";

/// Component id of the connectivity tracker provider.
pub const CONNECTIVITY_COMPONENT: &str = "inter-service-connectivity";

/// Component id of the certificate monitor provider.
pub const CERTIFICATES_COMPONENT: &str = "certificates";

/// Component id of the heartbeat synthesised per sync (never registered).
pub const HEARTBEAT_COMPONENT: &str = "heartbeat";

/// Checksums for every currently registered component, keyed by entity.
pub type ChecksumTable = HashMap<EntityId, HashMap<String, String>>;

/// Body of `POST /sync/checksums` (checksum phase).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksumRequest {
    /// Service name of the publishing client.
    pub service: String,
    /// Server name the client runs on.
    pub server: String,
    /// Checksum per (entity, component).
    pub checksums: ChecksumTable,
}

/// Registrar response to the checksum phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChecksumResponse {
    /// Component ids the registrar wants uploaded, per entity.
    #[serde(default)]
    pub needed: HashMap<EntityId, Vec<String>>,
}

impl ChecksumResponse {
    /// True when the registrar needs nothing, i.e. the data phase is skipped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.needed.values().all(Vec::is_empty)
    }
}

/// Body of `POST /sync/components` (data phase).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentUpload {
    /// Service name of the publishing client.
    pub service: String,
    /// Server name the client runs on.
    pub server: String,
    /// Full component values the registrar asked for, per entity.
    pub components: HashMap<EntityId, Vec<Component>>,
}
