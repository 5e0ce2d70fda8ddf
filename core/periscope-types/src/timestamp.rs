//! Wire timestamp formatting.
//!
//! All timestamps on the wire are RFC3339 at second resolution with a
//! literal `+00:00` offset — never `Z`, never fractional seconds. The
//! registrar and every publishing service agree on this one shape.

use chrono::{DateTime, Utc};

const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S+00:00";

/// Formats a UTC timestamp in the uniform wire format.
#[must_use]
pub fn format_utc(ts: DateTime<Utc>) -> String {
    ts.format(WIRE_FORMAT).to_string()
}

/// The current time in the uniform wire format.
#[must_use]
pub fn now_utc_string() -> String {
    format_utc(Utc::now())
}
