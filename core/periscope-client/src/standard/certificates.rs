//! X.509 certificate monitoring.
//!
//! Scans a directory for `*.cert.pem` files and reports subject, issuer,
//! validity window, SANs, and expiry status per file. The scan runs on
//! every collect of the `certificates` component, so a renewed certificate
//! shows up on the next triggered update without restarting the service.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use periscope_types::format_utc;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use tracing::warn;
use x509_parser::prelude::*;

/// Files matching this suffix are scanned.
const CERT_SUFFIX: &str = ".cert.pem";

/// Certificates expiring within this many days carry a warning flag.
const EXPIRY_WARNING_DAYS: i64 = 30;

/// Parsed metadata of one certificate file.
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    pub path: String,
    /// Inferred from the file name: `ca-chain`, `ca`, `client`, or `server`.
    pub purpose: String,
    pub subject: String,
    pub issuer: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub days_until_expiry: i64,
    /// Subject alternative names, `DNS:`/`IP:` prefixed.
    pub sans: Vec<String>,
    pub is_expired: bool,
    /// Set when expiry is at most 30 days away and the cert is still valid.
    pub expiry_warning: bool,
}

#[derive(Default)]
struct ScanState {
    certs: BTreeMap<String, CertificateInfo>,
    last_scan: Option<DateTime<Utc>>,
}

/// Tracks the certificates in a configured directory.
pub struct CertificateMonitor {
    cert_dir: PathBuf,
    state: RwLock<ScanState>,
}

impl CertificateMonitor {
    /// Creates a monitor for the given directory. Nothing is read until
    /// [`scan`](Self::scan) runs.
    #[must_use]
    pub fn new(cert_dir: impl Into<PathBuf>) -> Self {
        Self {
            cert_dir: cert_dir.into(),
            state: RwLock::new(ScanState::default()),
        }
    }

    /// Discovers and parses every `*.cert.pem` file in the directory.
    ///
    /// Unparseable files are logged and skipped; only an unreadable
    /// directory fails the scan.
    pub fn scan(&self) -> io::Result<()> {
        let mut certs = BTreeMap::new();

        for entry in fs::read_dir(&self.cert_dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !file_name.ends_with(CERT_SUFFIX) {
                continue;
            }

            match parse_certificate_file(&path) {
                Ok(mut info) => {
                    info.purpose = purpose_for(file_name).to_string();
                    certs.insert(file_name.to_string(), info);
                }
                Err(err) => {
                    warn!(path = %path.display(), "failed to parse certificate: {err}");
                }
            }
        }

        let mut state = self.state.write();
        state.certs = certs;
        state.last_scan = Some(Utc::now());
        Ok(())
    }

    /// Data for the `certificates` component, keyed by file name.
    #[must_use]
    pub fn data(&self) -> Value {
        let state = self.state.read();
        let mut out = Map::new();
        for (file_name, info) in &state.certs {
            out.insert(
                file_name.clone(),
                json!({
                    "path": info.path,
                    "purpose": info.purpose,
                    "subject": info.subject,
                    "issuer": info.issuer,
                    "valid_from": format_utc(info.valid_from),
                    "valid_until": format_utc(info.valid_until),
                    "days_until_expiry": info.days_until_expiry,
                    "sans": info.sans,
                    "is_expired": info.is_expired,
                    "expiry_warning": info.expiry_warning,
                }),
            );
        }
        Value::Object(out)
    }

    /// Certificates expiring within the given number of days, expired ones
    /// excluded.
    #[must_use]
    pub fn expiring_within(&self, days: i64) -> Vec<CertificateInfo> {
        let state = self.state.read();
        state
            .certs
            .values()
            .filter(|info| !info.is_expired && info.days_until_expiry <= days)
            .cloned()
            .collect()
    }

    /// Certificates whose validity window has already closed.
    #[must_use]
    pub fn expired(&self) -> Vec<CertificateInfo> {
        let state = self.state.read();
        state
            .certs
            .values()
            .filter(|info| info.is_expired)
            .cloned()
            .collect()
    }

    /// Time of the most recent scan, if any.
    #[must_use]
    pub fn last_scan(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_scan
    }
}

fn parse_certificate_file(path: &Path) -> Result<CertificateInfo, String> {
    let pem = fs::read(path).map_err(|err| format!("read failed: {err}"))?;

    // Only the first PEM block matters; for a ca-chain this is the leaf of
    // the chain file.
    let der = rustls_pemfile::certs(&mut pem.as_slice())
        .next()
        .ok_or_else(|| "no PEM certificate block found".to_string())?
        .map_err(|err| format!("invalid PEM: {err}"))?;

    let (_, cert) = X509Certificate::from_der(der.as_ref())
        .map_err(|err| format!("invalid X.509 certificate: {err}"))?;

    let valid_from = asn1_to_utc(&cert.validity().not_before)?;
    let valid_until = asn1_to_utc(&cert.validity().not_after)?;

    let now = Utc::now();
    let remaining_secs = (valid_until - now).num_seconds();
    let days_until_expiry = remaining_secs.div_euclid(3600).div_euclid(24);
    let is_expired = now > valid_until;
    let expiry_warning = days_until_expiry <= EXPIRY_WARNING_DAYS && !is_expired;

    let mut sans = Vec::new();
    if let Ok(Some(extension)) = cert.subject_alternative_name() {
        for name in &extension.value.general_names {
            match name {
                GeneralName::DNSName(dns) => sans.push(format!("DNS:{dns}")),
                GeneralName::IPAddress(bytes) => {
                    if let Some(ip) = ip_from_bytes(bytes) {
                        sans.push(format!("IP:{ip}"));
                    }
                }
                _ => {}
            }
        }
    }

    Ok(CertificateInfo {
        path: path.display().to_string(),
        purpose: String::new(),
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        valid_from,
        valid_until,
        days_until_expiry,
        sans,
        is_expired,
        expiry_warning,
    })
}

fn asn1_to_utc(time: &ASN1Time) -> Result<DateTime<Utc>, String> {
    DateTime::<Utc>::from_timestamp(time.timestamp(), 0)
        .ok_or_else(|| "certificate validity time out of range".to_string())
}

fn ip_from_bytes(bytes: &[u8]) -> Option<std::net::IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(Ipv4Addr::from(octets).into())
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(Ipv6Addr::from(octets).into())
        }
        _ => None,
    }
}

/// Infers certificate purpose from its file name.
fn purpose_for(file_name: &str) -> &'static str {
    let lower = file_name.to_lowercase();
    if lower.contains("ca-chain") {
        return "ca-chain";
    }
    if lower.contains("ca.cert") {
        return "ca";
    }
    // Client certificates are named after the connection they authenticate,
    // e.g. "frontend-to-backend.cert.pem".
    if lower.contains("-to-") {
        return "client";
    }
    "server"
}
