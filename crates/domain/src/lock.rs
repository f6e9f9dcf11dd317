//! Smart-lock state pushed by devices outside of any command exchange.
//!
//! Both records are append-only. The most recent status snapshot is the
//! authoritative view of a lock.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PayloadError;
use crate::id::DeviceId;
use crate::time::{Timestamp, now, parse_device_timestamp};

/// One `iot/smartlock/{id}/status` push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStatusSnapshot {
    pub device_id: DeviceId,
    pub locked: bool,
    pub failed_attempts: u32,
    pub timestamp: Timestamp,
}

impl LockStatusSnapshot {
    /// Build a snapshot from a status push. The device id comes from the
    /// topic; a missing timestamp is stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] when `locked` is not a boolean or
    /// `failedAttempts` is not a non-negative integer.
    pub fn from_push(device_id: DeviceId, payload: &Value) -> Result<Self, PayloadError> {
        let object = payload.as_object().ok_or(PayloadError::NotAnObject)?;
        let locked = object
            .get("locked")
            .and_then(Value::as_bool)
            .ok_or(PayloadError::Field("locked"))?;
        let failed_attempts = match object.get("failedAttempts") {
            None | Some(Value::Null) => 0,
            Some(value) => value
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or(PayloadError::Field("failedAttempts"))?,
        };
        Ok(Self {
            device_id,
            locked,
            failed_attempts,
            timestamp: stamp(object.get("timestamp")),
        })
    }
}

/// One `iot/smartlock/{id}/log` push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoorLogEntry {
    pub device_id: DeviceId,
    pub event: String,
    pub status: String,
    pub timestamp: Timestamp,
}

impl DoorLogEntry {
    /// Build a log entry from a door-log push.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] when `event` or `status` is missing.
    pub fn from_push(device_id: DeviceId, payload: &Value) -> Result<Self, PayloadError> {
        let object = payload.as_object().ok_or(PayloadError::NotAnObject)?;
        let text = |field: &'static str| {
            object
                .get(field)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(PayloadError::Field(field))
        };
        Ok(Self {
            device_id,
            event: text("event")?,
            status: text("status")?,
            timestamp: stamp(object.get("timestamp")),
        })
    }
}

fn stamp(value: Option<&Value>) -> Timestamp {
    value.and_then(parse_device_timestamp).unwrap_or_else(now)
}
