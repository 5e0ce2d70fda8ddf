//! Client configuration.
//!
//! Every field is required; there are no defaults. A service that cannot
//! name its certificate paths has no business talking to the registrar.

use crate::error::{IntrospectionError, IntrospectionResult};
use std::path::PathBuf;

/// Configuration for the introspection client.
#[derive(Debug, Clone)]
pub struct Config {
    /// Service name (e.g. `"ca-manager"`).
    pub service_name: String,
    /// Service version (e.g. `"1.0.0"`).
    pub version: String,
    /// Port the service itself listens on.
    pub port: u16,
    /// Server name the service runs on (e.g. `"staging"`).
    pub server: String,
    /// Base URL of the registrar (e.g. `"https://registrar:9080"`).
    pub registrar_url: String,
    /// Path to the client certificate (PEM).
    pub cert_path: PathBuf,
    /// Path to the client private key (PEM).
    pub key_path: PathBuf,
    /// Path to the CA certificate (PEM).
    pub ca_path: PathBuf,
    /// Directory containing `*.cert.pem` files to monitor.
    pub cert_dir: PathBuf,
}

impl Config {
    /// Checks that every required field is present.
    pub fn validate(&self) -> IntrospectionResult<()> {
        if self.service_name.is_empty() {
            return Err(IntrospectionError::Config("service_name required".into()));
        }
        if self.version.is_empty() {
            return Err(IntrospectionError::Config("version required".into()));
        }
        if self.port == 0 {
            return Err(IntrospectionError::Config("port required (must be >= 1)".into()));
        }
        if self.server.is_empty() {
            return Err(IntrospectionError::Config(
                "server required (e.g. staging or production)".into(),
            ));
        }
        if self.registrar_url.is_empty() {
            return Err(IntrospectionError::Config("registrar_url required".into()));
        }
        if self.cert_path.as_os_str().is_empty() {
            return Err(IntrospectionError::Config("cert_path required".into()));
        }
        if self.key_path.as_os_str().is_empty() {
            return Err(IntrospectionError::Config("key_path required".into()));
        }
        if self.ca_path.as_os_str().is_empty() {
            return Err(IntrospectionError::Config("ca_path required".into()));
        }
        if self.cert_dir.as_os_str().is_empty() {
            return Err(IntrospectionError::Config("cert_dir required".into()));
        }
        Ok(())
    }
}
