//! Commands sent to devices and the replies they produce.
//!
//! Two families exist and the distinction is carried by [`CommandKind`]:
//! security-relevant operations are **correlated** (the caller waits for the
//! device's reply or a deadline), comfort toggles are **fire-and-forget**.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::PayloadError;
use crate::id::DeviceId;
use crate::topic::{ControlKind, Topic};

/// Default deadline for lock operations.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Default deadline for verify/connect/disconnect handshakes.
pub const DEFAULT_LIFECYCLE_TIMEOUT: Duration = Duration::from_secs(10);

/// A device operation that expects a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Verify,
    Connect,
    Disconnect,
    Unlock,
    Lock,
    ChangePassword,
}

impl Operation {
    /// Name used in correlation keys and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Unlock => "unlock",
            Self::Lock => "lock",
            Self::ChangePassword => "password",
        }
    }

    /// Whether this operation drives the device lifecycle (as opposed to a
    /// lock operation).
    #[must_use]
    pub fn is_lifecycle(self) -> bool {
        matches!(self, Self::Verify | Self::Connect | Self::Disconnect)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite `operation:deviceId` key matching an outbound command to its reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    pub operation: Operation,
    pub device_id: DeviceId,
}

impl CorrelationKey {
    #[must_use]
    pub fn new(operation: Operation, device_id: DeviceId) -> Self {
        Self {
            operation,
            device_id,
        }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.operation, self.device_id)
    }
}

/// Per-operation deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTimeouts {
    pub verify: Duration,
    pub connect: Duration,
    pub disconnect: Duration,
    pub lock: Duration,
}

impl Default for CommandTimeouts {
    fn default() -> Self {
        Self {
            verify: DEFAULT_LIFECYCLE_TIMEOUT,
            connect: DEFAULT_LIFECYCLE_TIMEOUT,
            disconnect: DEFAULT_LIFECYCLE_TIMEOUT,
            lock: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl CommandTimeouts {
    #[must_use]
    pub fn for_operation(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Verify => self.verify,
            Operation::Connect => self.connect,
            Operation::Disconnect => self.disconnect,
            Operation::Unlock | Operation::Lock | Operation::ChangePassword => self.lock,
        }
    }
}

/// How a command is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Register a pending command, publish, and wait for the reply.
    Correlated {
        operation: Operation,
        timeout: Duration,
    },
    /// Publish and return; any confirmation arrives through unsolicited pushes.
    FireAndForget,
}

/// Fire-and-forget controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    WarningOn,
    WarningOff,
    FanOn,
    FanOff,
    WarningLevel { gas_value: f64, tem_value: f64 },
    Led { on: bool },
}

impl ControlCommand {
    #[must_use]
    pub fn kind(&self) -> ControlKind {
        match self {
            Self::WarningOn => ControlKind::WarningOn,
            Self::WarningOff => ControlKind::WarningOff,
            Self::FanOn => ControlKind::FanOn,
            Self::FanOff => ControlKind::FanOff,
            Self::WarningLevel { .. } => ControlKind::WarningLevel,
            Self::Led { .. } => ControlKind::Led,
        }
    }

    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::WarningOn | Self::FanOn => json!({ "enabled": true }),
            Self::WarningOff | Self::FanOff => json!({ "enabled": false }),
            Self::WarningLevel {
                gas_value,
                tem_value,
            } => json!({ "gasValue": gas_value, "temValue": tem_value }),
            Self::Led { on } => json!({ "on": on }),
        }
    }
}

/// A fully addressed command ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCommand {
    pub device_id: DeviceId,
    pub topic: Topic,
    pub payload: Value,
    pub kind: CommandKind,
}

impl DeviceCommand {
    /// Build a command that waits for the device's reply.
    #[must_use]
    pub fn correlated(
        operation: Operation,
        device_id: DeviceId,
        payload: Value,
        timeout: Duration,
    ) -> Self {
        Self {
            topic: Topic::request(operation, &device_id),
            device_id,
            payload,
            kind: CommandKind::Correlated { operation, timeout },
        }
    }

    /// Build a control that is published without tracking.
    #[must_use]
    pub fn fire_and_forget(control: ControlCommand, device_id: DeviceId) -> Self {
        Self {
            topic: Topic::control(control.kind(), &device_id),
            device_id,
            payload: control.payload(),
            kind: CommandKind::FireAndForget,
        }
    }

    /// Correlation key, present only for correlated commands.
    #[must_use]
    pub fn key(&self) -> Option<CorrelationKey> {
        match self.kind {
            CommandKind::Correlated { operation, .. } => {
                Some(CorrelationKey::new(operation, self.device_id.clone()))
            }
            CommandKind::FireAndForget => None,
        }
    }
}

/// A structurally valid device reply: a JSON object with a string `status`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceReply {
    status: String,
    payload: Value,
}

impl DeviceReply {
    /// Validate a reply payload.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] when the payload is not an object or has no
    /// string `status` field.
    pub fn from_payload(payload: Value) -> Result<Self, PayloadError> {
        let object = payload.as_object().ok_or(PayloadError::NotAnObject)?;
        let status = object
            .get("status")
            .and_then(Value::as_str)
            .ok_or(PayloadError::Field("status"))?
            .to_string();
        Ok(Self { status, payload })
    }

    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Human-readable failure reason supplied by the device.
    #[must_use]
    pub fn reason(&self) -> String {
        reason_from(&self.payload)
    }

    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    #[must_use]
    pub fn into_payload(self) -> Value {
        self.payload
    }
}

/// Extract a failure reason from a reply or error-channel payload.
#[must_use]
pub fn reason_from(payload: &Value) -> String {
    let text = match payload {
        Value::String(reason) => Some(reason.as_str()),
        Value::Object(object) => object
            .get("reason")
            .and_then(Value::as_str)
            .or_else(|| object.get("message").and_then(Value::as_str)),
        _ => None,
    };
    match text {
        Some(reason) if !reason.trim().is_empty() => reason.to_string(),
        _ => "device reported failure".to_string(),
    }
}

/// Caller-facing result of a device command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CommandOutcome {
    #[must_use]
    pub fn success(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    /// Map a device reply: `status == "success"` succeeds with the reply as
    /// `data`, anything else fails with the device's reason.
    #[must_use]
    pub fn from_reply(reply: DeviceReply, success_message: &str) -> Self {
        if reply.is_success() {
            let message = reply
                .payload()
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or(success_message)
                .to_string();
            Self::success(message, Some(reply.into_payload()))
        } else {
            Self::failure(reply.reason())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev(id: &str) -> DeviceId {
        DeviceId::parse(id).unwrap()
    }

    #[test]
    fn should_render_correlation_key_as_operation_and_device() {
        let key = CorrelationKey::new(Operation::Connect, dev("lock-42"));
        assert_eq!(key.to_string(), "connect:lock-42");
    }

    #[test]
    fn should_distinguish_keys_by_operation() {
        let a = CorrelationKey::new(Operation::Lock, dev("lock-42"));
        let b = CorrelationKey::new(Operation::Unlock, dev("lock-42"));
        assert_ne!(a, b);
    }

    #[test]
    fn should_use_ten_second_lock_timeout_by_default() {
        let timeouts = CommandTimeouts::default();
        assert_eq!(
            timeouts.for_operation(Operation::Unlock),
            Duration::from_secs(10)
        );
        assert_eq!(
            timeouts.for_operation(Operation::ChangePassword),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn should_build_correlated_command_with_key() {
        let cmd = DeviceCommand::correlated(
            Operation::Unlock,
            dev("lock-42"),
            json!({ "password": "123456" }),
            DEFAULT_LOCK_TIMEOUT,
        );
        assert_eq!(cmd.topic.to_string(), "iot/smartlock/unlock/lock-42");
        assert_eq!(
            cmd.key(),
            Some(CorrelationKey::new(Operation::Unlock, dev("lock-42")))
        );
    }

    #[test]
    fn should_build_fire_and_forget_command_without_key() {
        let cmd = DeviceCommand::fire_and_forget(
            ControlCommand::WarningLevel {
                gas_value: 300.0,
                tem_value: 45.5,
            },
            dev("gas-1"),
        );
        assert_eq!(cmd.kind, CommandKind::FireAndForget);
        assert_eq!(cmd.topic.to_string(), "iot/gaswarning/level/gas-1");
        assert_eq!(cmd.payload, json!({ "gasValue": 300.0, "temValue": 45.5 }));
        assert!(cmd.key().is_none());
    }

    #[test]
    fn should_reject_reply_without_status() {
        assert!(matches!(
            DeviceReply::from_payload(json!({ "ok": true })),
            Err(PayloadError::Field("status"))
        ));
        assert!(matches!(
            DeviceReply::from_payload(json!("success")),
            Err(PayloadError::NotAnObject)
        ));
    }

    #[test]
    fn should_map_success_reply_to_successful_outcome() {
        let reply = DeviceReply::from_payload(json!({ "status": "success" })).unwrap();
        let outcome = CommandOutcome::from_reply(reply, "Door unlocked");
        assert!(outcome.success);
        assert_eq!(outcome.message, "Door unlocked");
        assert_eq!(outcome.data, Some(json!({ "status": "success" })));
    }

    #[test]
    fn should_map_failed_reply_to_reason() {
        let reply =
            DeviceReply::from_payload(json!({ "status": "failed", "reason": "bad password" }))
                .unwrap();
        let outcome = CommandOutcome::from_reply(reply, "Door unlocked");
        assert_eq!(outcome, CommandOutcome::failure("bad password"));
    }

    #[test]
    fn should_fall_back_to_generic_reason() {
        assert_eq!(reason_from(&json!({ "status": "failed" })), "device reported failure");
        assert_eq!(reason_from(&json!("jammed")), "jammed");
        assert_eq!(reason_from(&json!({ "message": "low battery" })), "low battery");
    }

    #[test]
    fn should_omit_missing_data_when_serialized() {
        let json = serde_json::to_value(CommandOutcome::failure("nope")).unwrap();
        assert_eq!(json, json!({ "success": false, "message": "nope" }));
    }
}
