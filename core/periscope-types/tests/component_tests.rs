use periscope_types::{checksum_of_bytes, Component};
use serde_json::json;

// ── Construction ─────────────────────────────────────────────────

#[test]
fn new_sets_id_equal_to_type() {
    let comp = Component::new("service-info", json!({"name": "svc"}));
    assert_eq!(comp.id, "service-info");
    assert_eq!(comp.component_type, "service-info");
}

#[test]
fn with_id_keeps_distinct_id() {
    let comp = Component::with_id("disk-sda", "disk", json!({"free": 42}));
    assert_eq!(comp.id, "disk-sda");
    assert_eq!(comp.component_type, "disk");
}

#[test]
fn checksum_is_lowercase_hex_sha256() {
    let comp = Component::new("x", json!({"a": 1}));
    assert_eq!(comp.checksum.len(), 64);
    assert!(comp.checksum.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    // Matches a direct hash of the canonical encoding.
    let expected = checksum_of_bytes(serde_json::to_vec(&json!({"a": 1})).unwrap().as_slice());
    assert_eq!(comp.checksum, expected);
}

#[test]
fn checksum_is_deterministic_for_equivalent_values() {
    // serde_json maps are sorted, so key insertion order cannot leak into
    // the checksum.
    let a = Component::new("x", json!({"b": 2, "a": 1}));
    let b = Component::new("x", json!({"a": 1, "b": 2}));
    assert_eq!(a.checksum, b.checksum);
}

#[test]
fn different_data_different_checksum() {
    let a = Component::new("x", json!({"a": 1}));
    let b = Component::new("x", json!({"a": 2}));
    assert_ne!(a.checksum, b.checksum);
}

// ── Equality ─────────────────────────────────────────────────────

#[test]
fn equality_is_checksum_equality() {
    let a = Component::new("x", json!({"a": 1}));
    let b = Component::new("x", json!({"a": 1}));
    let c = Component::new("x", json!({"a": 2}));
    assert_eq!(a, b);
    assert_ne!(a, c);
}

// ── Serde shape ──────────────────────────────────────────────────

#[test]
fn serializes_with_type_field() {
    let comp = Component::new("heartbeat", json!({"idle_since": "t"}));
    let value = serde_json::to_value(&comp).unwrap();
    assert_eq!(value["id"], "heartbeat");
    assert_eq!(value["type"], "heartbeat");
    assert_eq!(value["checksum"], serde_json::Value::String(comp.checksum.clone()));
    assert_eq!(value["data"]["idle_since"], "t");
}

#[test]
fn serde_roundtrip_preserves_checksum() {
    let comp = Component::new("certificates", json!({"server.cert.pem": {"purpose": "server"}}));
    let text = serde_json::to_string(&comp).unwrap();
    let parsed: Component = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, comp);
    assert_eq!(parsed.data, comp.data);
}
