//! Introspection client for the Periscope registrar.
//!
//! A service embeds this library to continuously publish structured
//! self-descriptions ("components") to a central registrar over mutually
//! authenticated HTTP/2, with minimal bandwidth and graceful behavior
//! through registrar outages.
//!
//! # Architecture
//!
//! Four independent systems cooperate inside the engine:
//!
//! - **Heartbeat** — fixed 59 s liveness signal carrying an `idle_since`
//!   timestamp that only real activity advances
//! - **Update** — a dynamic timer refreshing components on their registered
//!   cadence (Fast 5 s / Medium 23 s / Slow 59 s)
//! - **Sync** — a coalescing, single-flight three-phase protocol: collect,
//!   checksum exchange, then upload of only the components the registrar
//!   actually needs
//! - **Backoff** — prime-spaced retries (1, 2, 3, 5, 11, 23, 47, 61 s,
//!   capped at 59 s) while the registrar is unreachable
//!
//! Services provide plain data through registered producers; the library
//! handles all protocol mechanics. Four standard components are registered
//! automatically: `service-info`, `recent-logs`,
//! `inter-service-connectivity`, and `certificates`.
//!
//! # Example
//!
//! ```no_run
//! use periscope_client::{Client, Config};
//! use serde_json::json;
//!
//! # async fn run() -> periscope_client::IntrospectionResult<()> {
//! let client = Client::new(Config {
//!     service_name: "ca-manager".into(),
//!     version: "1.0.0".into(),
//!     port: 8443,
//!     server: "staging".into(),
//!     registrar_url: "https://registrar:9080".into(),
//!     cert_path: "/certs/ca-manager.cert.pem".into(),
//!     key_path: "/certs/ca-manager.key.pem".into(),
//!     ca_path: "/certs/ca.cert.pem".into(),
//!     cert_dir: "/certs".into(),
//! })?;
//!
//! client.register("queue-depth", || json!({ "depth": 17 }), None)?;
//! client.start().await?;
//!
//! // Error/Warn log entries sync immediately and reset the idle clock.
//! client.logs().error("upstream unreachable", json!({ "peer": "billing" }));
//! # Ok(())
//! # }
//! ```

mod backoff;
mod client;
mod config;
mod error;
pub mod protocol;
mod registry;
pub mod standard;
mod transport;

pub use backoff::{Backoff, MAX_BACKOFF_SECS};
pub use client::{Client, HEARTBEAT_INTERVAL};
pub use config::Config;
pub use error::{IntrospectionError, IntrospectionResult};
pub use registry::{DataProvider, Registry};
pub use transport::build_http2_client;
