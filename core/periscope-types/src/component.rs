//! The checksummed component value.
//!
//! A component is the only data structure services hand to the registrar:
//! a named JSON payload plus a content-addressed checksum. Two components
//! with equal checksums carry byte-identical serialized data, which is what
//! makes the differential sync protocol cheap.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// A single introspection component describing one aspect of an entity.
///
/// Immutable once constructed; the checksum is the lowercase hex SHA-256
/// of the canonical JSON encoding of `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    /// Component identifier. Equals `type` for singleton components.
    pub id: String,
    /// Component type (e.g. `"service-info"`).
    #[serde(rename = "type")]
    pub component_type: String,
    /// Lowercase hex SHA-256 over the canonical JSON of `data`.
    pub checksum: String,
    /// The payload. Opaque to the protocol layer.
    pub data: Value,
}

impl Component {
    /// Creates a singleton component (`id == type`) with a computed checksum.
    #[must_use]
    pub fn new(component_type: impl Into<String>, data: Value) -> Self {
        let component_type = component_type.into();
        Self::with_id(component_type.clone(), component_type, data)
    }

    /// Creates a component with an explicit id.
    #[must_use]
    pub fn with_id(id: impl Into<String>, component_type: impl Into<String>, data: Value) -> Self {
        let bytes = canonical_json(&data);
        Self {
            id: id.into(),
            component_type: component_type.into(),
            checksum: checksum_of_bytes(&bytes),
            data,
        }
    }
}

/// Components are equal iff their checksums match. Equal checksums imply
/// identical serialized data, so this is full value equality.
impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.checksum == other.checksum
    }
}

impl Eq for Component {}

/// Canonical JSON encoding of a value.
///
/// `serde_json::Value` objects are backed by a sorted map, so encoding the
/// same logical value always yields the same bytes.
pub(crate) fn canonical_json(data: &Value) -> Vec<u8> {
    serde_json::to_vec(data).expect("serde_json::Value encoding is infallible")
}

/// Lowercase hex SHA-256 of the given bytes.
#[must_use]
pub fn checksum_of_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
