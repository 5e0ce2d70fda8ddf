use chrono::{TimeZone, Utc};
use periscope_types::{format_utc, now_utc_string};

#[test]
fn format_uses_literal_offset_not_z() {
    let ts = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
    assert_eq!(format_utc(ts), "2025-03-14T09:26:53+00:00");
}

#[test]
fn format_has_second_resolution_only() {
    let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
    let formatted = format_utc(ts);
    assert!(!formatted.contains('.'));
    assert!(formatted.ends_with("+00:00"));
    assert_eq!(formatted.len(), "2023-11-14T22:13:20+00:00".len());
}

#[test]
fn now_is_parseable_rfc3339() {
    let now = now_utc_string();
    assert!(chrono::DateTime::parse_from_rfc3339(&now).is_ok());
    assert!(now.ends_with("+00:00"));
}
