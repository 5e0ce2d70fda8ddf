use chrono::{Datelike, Duration as ChronoDuration, Utc};
use periscope_client::standard::CertificateMonitor;
use rcgen::{CertificateParams, DnType, KeyPair};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_cert(dir: &Path, file_name: &str, params: CertificateParams) {
    let key = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key).unwrap();
    fs::write(dir.join(file_name), cert.pem()).unwrap();
}

fn params_with_cn(cn: &str, sans: Vec<String>) -> CertificateParams {
    let mut params = CertificateParams::new(sans).unwrap();
    params.distinguished_name.push(DnType::CommonName, cn);
    params
}

fn set_validity(params: &mut CertificateParams, from_days: i64, to_days: i64) {
    let from = Utc::now() + ChronoDuration::days(from_days);
    let to = Utc::now() + ChronoDuration::days(to_days);
    params.not_before = rcgen::date_time_ymd(from.year(), from.month() as u8, from.day() as u8);
    params.not_after = rcgen::date_time_ymd(to.year(), to.month() as u8, to.day() as u8);
}

// ── Scanning ────────────────────────────────────────────────────

#[test]
fn empty_directory_scans_clean() {
    let dir = TempDir::new().unwrap();
    let monitor = CertificateMonitor::new(dir.path());

    monitor.scan().unwrap();
    assert_eq!(monitor.data(), serde_json::json!({}));
    assert!(monitor.last_scan().is_some());
}

#[test]
fn missing_directory_fails_the_scan() {
    let monitor = CertificateMonitor::new("/nonexistent/certs");
    assert!(monitor.scan().is_err());
}

#[test]
fn only_cert_pem_files_are_picked_up() {
    let dir = TempDir::new().unwrap();
    write_cert(dir.path(), "server.cert.pem", params_with_cn("srv", vec!["srv".into()]));
    fs::write(dir.path().join("README.md"), "not a cert").unwrap();
    fs::write(dir.path().join("server.key.pem"), "not scanned").unwrap();

    let monitor = CertificateMonitor::new(dir.path());
    monitor.scan().unwrap();

    let data = monitor.data();
    let files = data.as_object().unwrap();
    assert_eq!(files.len(), 1);
    assert!(files.contains_key("server.cert.pem"));
}

#[test]
fn unparseable_files_are_skipped() {
    let dir = TempDir::new().unwrap();
    write_cert(dir.path(), "good.cert.pem", params_with_cn("good", vec!["good".into()]));
    fs::write(dir.path().join("broken.cert.pem"), "garbage").unwrap();

    let monitor = CertificateMonitor::new(dir.path());
    monitor.scan().unwrap();

    let data = monitor.data();
    let files = data.as_object().unwrap();
    assert_eq!(files.len(), 1);
    assert!(files.contains_key("good.cert.pem"));
}

#[test]
fn rescan_drops_removed_files() {
    let dir = TempDir::new().unwrap();
    write_cert(dir.path(), "old.cert.pem", params_with_cn("old", vec!["old".into()]));

    let monitor = CertificateMonitor::new(dir.path());
    monitor.scan().unwrap();
    assert_eq!(monitor.data().as_object().unwrap().len(), 1);

    fs::remove_file(dir.path().join("old.cert.pem")).unwrap();
    monitor.scan().unwrap();
    assert_eq!(monitor.data().as_object().unwrap().len(), 0);
}

// ── Reported fields ─────────────────────────────────────────────

#[test]
fn reports_subject_issuer_and_validity() {
    let dir = TempDir::new().unwrap();
    let mut params = params_with_cn("Test Server", vec!["example.com".into()]);
    set_validity(&mut params, -1, 365);
    write_cert(dir.path(), "server.cert.pem", params);

    let monitor = CertificateMonitor::new(dir.path());
    monitor.scan().unwrap();

    let data = monitor.data();
    let cert = &data["server.cert.pem"];
    assert!(cert["subject"].as_str().unwrap().contains("Test Server"));
    // Self-signed: issuer equals subject.
    assert_eq!(cert["issuer"], cert["subject"]);
    assert!(cert["valid_from"].as_str().unwrap().ends_with("+00:00"));
    assert!(cert["valid_until"].as_str().unwrap().ends_with("+00:00"));
    assert_eq!(cert["is_expired"], false);
    assert!(cert["path"].as_str().unwrap().ends_with("server.cert.pem"));
}

#[test]
fn reports_dns_and_ip_sans() {
    let dir = TempDir::new().unwrap();
    let params = params_with_cn("srv", vec!["example.com".into(), "10.0.0.1".into()]);
    write_cert(dir.path(), "server.cert.pem", params);

    let monitor = CertificateMonitor::new(dir.path());
    monitor.scan().unwrap();

    let data = monitor.data();
    let sans: Vec<&str> = data["server.cert.pem"]["sans"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s.as_str().unwrap())
        .collect();
    assert!(sans.contains(&"DNS:example.com"));
    assert!(sans.contains(&"IP:10.0.0.1"));
}

// ── Purpose inference ───────────────────────────────────────────

#[test]
fn purpose_is_inferred_from_file_name() {
    let dir = TempDir::new().unwrap();
    for name in [
        "ca-chain.cert.pem",
        "ca.cert.pem",
        "web-to-api.cert.pem",
        "frontend.cert.pem",
    ] {
        write_cert(dir.path(), name, params_with_cn("x", vec!["x".into()]));
    }

    let monitor = CertificateMonitor::new(dir.path());
    monitor.scan().unwrap();

    let data = monitor.data();
    assert_eq!(data["ca-chain.cert.pem"]["purpose"], "ca-chain");
    assert_eq!(data["ca.cert.pem"]["purpose"], "ca");
    assert_eq!(data["web-to-api.cert.pem"]["purpose"], "client");
    assert_eq!(data["frontend.cert.pem"]["purpose"], "server");
}

// ── Expiry ──────────────────────────────────────────────────────

#[test]
fn expired_certificate_is_flagged() {
    let dir = TempDir::new().unwrap();
    let mut params = params_with_cn("old", vec!["old".into()]);
    params.not_before = rcgen::date_time_ymd(2020, 1, 1);
    params.not_after = rcgen::date_time_ymd(2021, 1, 1);
    write_cert(dir.path(), "old.cert.pem", params);

    let monitor = CertificateMonitor::new(dir.path());
    monitor.scan().unwrap();

    let data = monitor.data();
    let cert = &data["old.cert.pem"];
    assert_eq!(cert["is_expired"], true);
    assert_eq!(cert["expiry_warning"], false);
    assert!(cert["days_until_expiry"].as_i64().unwrap() < 0);

    assert_eq!(monitor.expired().len(), 1);
    assert!(monitor.expiring_within(30).is_empty());
}

#[test]
fn certificate_close_to_expiry_carries_a_warning() {
    let dir = TempDir::new().unwrap();
    let mut params = params_with_cn("soon", vec!["soon".into()]);
    set_validity(&mut params, -30, 10);
    write_cert(dir.path(), "soon.cert.pem", params);

    let monitor = CertificateMonitor::new(dir.path());
    monitor.scan().unwrap();

    let data = monitor.data();
    let cert = &data["soon.cert.pem"];
    assert_eq!(cert["is_expired"], false);
    assert_eq!(cert["expiry_warning"], true);
    let days = cert["days_until_expiry"].as_i64().unwrap();
    assert!((8..=10).contains(&days), "days: {days}");

    assert_eq!(monitor.expiring_within(30).len(), 1);
    assert!(monitor.expired().is_empty());
}

#[test]
fn long_lived_certificate_has_no_warning() {
    let dir = TempDir::new().unwrap();
    let mut params = params_with_cn("fresh", vec!["fresh".into()]);
    set_validity(&mut params, -1, 365);
    write_cert(dir.path(), "fresh.cert.pem", params);

    let monitor = CertificateMonitor::new(dir.path());
    monitor.scan().unwrap();

    let data = monitor.data();
    let cert = &data["fresh.cert.pem"];
    assert_eq!(cert["is_expired"], false);
    assert_eq!(cert["expiry_warning"], false);
}
