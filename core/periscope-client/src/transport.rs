//! HTTP/2 transport with mutual TLS 1.3.

use crate::error::{IntrospectionError, IntrospectionResult};
use reqwest::{Certificate, Client, Identity};
use std::fs;
use std::path::Path;
use tracing::debug;

/// File name of the aggregated CA chain inside the certificate directory.
const CA_CHAIN_FILE: &str = "ca-chain.cert.pem";

/// Builds the HTTP/2 client used for registrar sync.
///
/// TLS is pinned to 1.3 on both ends of the version range. The trust root
/// prefers `<cert_dir>/ca-chain.cert.pem` when that file exists, falling
/// back to `ca_path`.
pub fn build_http2_client(
    cert_path: &Path,
    key_path: &Path,
    ca_path: &Path,
    cert_dir: &Path,
) -> IntrospectionResult<Client> {
    let cert_pem = read_pem(cert_path, "client certificate")?;
    let key_pem = read_pem(key_path, "client key")?;

    let mut identity_pem = cert_pem;
    identity_pem.extend_from_slice(&key_pem);
    let identity = Identity::from_pem(&identity_pem).map_err(|err| {
        IntrospectionError::Transport(format!("failed to load client identity: {err}"))
    })?;

    let chain_path = cert_dir.join(CA_CHAIN_FILE);
    let trust_path = if chain_path.is_file() {
        debug!(path = %chain_path.display(), "using CA chain from certificate directory");
        chain_path
    } else {
        ca_path.to_path_buf()
    };
    let ca_pem = read_pem(&trust_path, "CA certificate")?;
    let roots = Certificate::from_pem_bundle(&ca_pem).map_err(|err| {
        IntrospectionError::Transport(format!(
            "failed to parse CA certificate {}: {err}",
            trust_path.display()
        ))
    })?;

    let mut builder = Client::builder()
        .use_rustls_tls()
        .identity(identity)
        .min_tls_version(reqwest::tls::Version::TLS_1_3)
        .max_tls_version(reqwest::tls::Version::TLS_1_3)
        .http2_prior_knowledge();
    for root in roots {
        builder = builder.add_root_certificate(root);
    }

    builder
        .build()
        .map_err(|err| IntrospectionError::Transport(format!("failed to build HTTP client: {err}")))
}

fn read_pem(path: &Path, what: &str) -> IntrospectionResult<Vec<u8>> {
    fs::read(path).map_err(|err| {
        IntrospectionError::Transport(format!("failed to read {what} {}: {err}", path.display()))
    })
}
