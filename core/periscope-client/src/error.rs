//! Error types for the introspection client.

use thiserror::Error;

/// Result type for introspection operations.
pub type IntrospectionResult<T> = Result<T, IntrospectionError>;

/// Errors that can occur in introspection operations.
///
/// Only construction and registration errors ever reach the caller. The
/// background systems (heartbeat, update, sync) log failures through the
/// non-triggering log channels and retry with backoff.
#[derive(Debug, Error)]
pub enum IntrospectionError {
    /// Configuration is missing a required field.
    #[error("invalid config: {0}")]
    Config(String),

    /// The (entity, component) pair is already registered.
    #[error("component {component} already registered for entity {entity}")]
    DuplicateRegistration { entity: String, component: String },

    /// A caller-supplied argument is unusable (e.g. empty id).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The (entity, component) pair is unknown.
    #[error("component {component} not registered for entity {entity}")]
    NotRegistered { entity: String, component: String },

    /// A producer returned a value that could not be encoded as JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Connection or TLS level failure talking to the registrar.
    #[error("transport error: {0}")]
    Transport(String),

    /// The registrar answered with a non-200 status.
    #[error("registrar returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// `start` was called while the client is running.
    #[error("client already running")]
    AlreadyRunning,

    /// `stop` was called while the client is not running.
    #[error("client not running")]
    NotRunning,
}
