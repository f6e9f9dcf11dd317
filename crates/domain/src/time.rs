//! Time and timestamp helpers.

use chrono::{DateTime, Datelike, SecondsFormat, Utc};

/// UTC timestamp used for `last_connected`, snapshots, logs and readings.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Parse a device-supplied timestamp.
///
/// Accepts RFC 3339 strings and integral Unix epoch milliseconds. Instants
/// outside years 0 to 9999 are rejected because [`to_sortable`] can only
/// render four-digit years.
#[must_use]
pub fn parse_device_timestamp(value: &serde_json::Value) -> Option<Timestamp> {
    let ts = match value {
        serde_json::Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|ts| ts.to_utc()),
        serde_json::Value::Number(number) => number
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }?;
    (0..=9999).contains(&ts.year()).then_some(ts)
}

/// Fixed-width RFC 3339 rendering (millisecond precision, `Z` suffix) so that
/// stored timestamps sort lexicographically.
#[must_use]
pub fn to_sortable(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
