//! Core type definitions for the Periscope introspection protocol.
//!
//! This crate defines the wire-level values shared by the client library
//! and any registrar-side tooling:
//! - Checksummed introspection components
//! - Entity identifiers (`service-server`)
//! - Update cadence classes (Fast/Medium/Slow)
//! - The uniform wire timestamp format
//!
//! Everything protocol-engine related (registry, sync state machines,
//! transport) lives in `periscope-client`, not here.

mod component;
mod ids;
mod interval;
mod timestamp;

pub use component::{checksum_of_bytes, Component};
pub use ids::EntityId;
pub use interval::Interval;
pub use timestamp::{format_utc, now_utc_string};
