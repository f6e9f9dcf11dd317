//! Telemetry readings pushed by sensors and the rules that sanitize them.
//!
//! Readings are never persisted; they only travel from the transport to the
//! live subscribers of a device. Sanitizing a reading that has already been
//! sanitized yields the same reading.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PayloadError;
use crate::id::DeviceId;
use crate::time::{Timestamp, now, parse_device_timestamp};

/// Measured quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TelemetryKind {
    Temperature,
    Humidity,
    GasLevel,
}

impl TelemetryKind {
    /// Segment of the sensor push topic, e.g. `iot/device/gaslevel`.
    #[must_use]
    pub fn topic_segment(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::GasLevel => "gaslevel",
        }
    }

    #[must_use]
    pub fn from_topic_segment(segment: &str) -> Option<Self> {
        match segment {
            "temperature" => Some(Self::Temperature),
            "humidity" => Some(Self::Humidity),
            "gaslevel" => Some(Self::GasLevel),
            _ => None,
        }
    }
}

/// A reading as received, before sanitization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawReading {
    #[serde(rename = "type")]
    pub kind: TelemetryKind,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

impl RawReading {
    /// Coerce the value to a finite number (0 when impossible) and stamp a
    /// missing or unreadable timestamp with the current time.
    #[must_use]
    pub fn sanitize(self) -> TelemetryReading {
        TelemetryReading {
            kind: self.kind,
            value: coerce_value(&self.value),
            timestamp: self
                .timestamp
                .as_ref()
                .and_then(parse_device_timestamp)
                .unwrap_or_else(now),
        }
    }
}

impl From<TelemetryReading> for RawReading {
    fn from(reading: TelemetryReading) -> Self {
        Self {
            kind: reading.kind,
            value: serde_json::Number::from_f64(reading.value).map_or(Value::Null, Value::Number),
            timestamp: Some(Value::String(
                reading.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            )),
        }
    }
}

/// Coerce an arbitrary JSON value into a finite number.
///
/// Numbers pass through, numeric strings are parsed, booleans map to 1/0 and
/// everything else (including NaN and infinities) becomes 0.
#[must_use]
pub fn coerce_value(value: &Value) -> f64 {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    };
    number.filter(|n| n.is_finite()).unwrap_or(0.0)
}

/// A sanitized reading, serialized as `{type, value, timestamp}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    #[serde(rename = "type")]
    pub kind: TelemetryKind,
    pub value: f64,
    pub timestamp: Timestamp,
}

/// An inbound sensor push: `{deviceId, value, timestamp?}` on the kind's topic.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorPush {
    pub device_id: DeviceId,
    pub reading: RawReading,
}

impl SensorPush {
    /// Extract the reporting device and its raw reading.
    ///
    /// Only the device id is mandatory; the value and timestamp are left for
    /// [`RawReading::sanitize`] to repair.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] when the payload is not an object or carries
    /// no valid `deviceId`.
    pub fn from_payload(kind: TelemetryKind, payload: &Value) -> Result<Self, PayloadError> {
        let object = payload.as_object().ok_or(PayloadError::NotAnObject)?;
        let device_id = object
            .get("deviceId")
            .and_then(Value::as_str)
            .ok_or(PayloadError::Field("deviceId"))?;
        Ok(Self {
            device_id: DeviceId::parse(device_id)?,
            reading: RawReading {
                kind,
                value: object.get("value").cloned().unwrap_or(Value::Null),
                timestamp: object.get("timestamp").cloned(),
            },
        })
    }
}

/// Frame delivered to one subscriber: `{event: "sensor_data_<id>", data}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryFrame {
    pub event: String,
    pub data: TelemetryReading,
}

impl TelemetryFrame {
    #[must_use]
    pub fn sensor_data(device_id: &DeviceId, data: TelemetryReading) -> Self {
        Self {
            event: format!("sensor_data_{device_id}"),
            data,
        }
    }
}
