//! Message-bus topic model.
//!
//! Every topic the gateway publishes or consumes is a [`Topic`]. Device
//! identity on inbound traffic is recovered from the topic path, never from
//! the payload.
//!
//! | Kind | Topic |
//! |------|-------|
//! | verify / connect / disconnect request | `iot/device/create`, `iot/device/connect`, `iot/device/disconnect` |
//! | verify reply | `iot/device/{id}/response` |
//! | connect / disconnect reply | `iot/device/{id}/{op}/response` |
//! | lock request | `iot/smartlock/{op}/{id}` |
//! | lock reply | `iot/smartlock/{id}/{op}/response` |
//! | error channel | any reply topic ending in `error` instead of `response` |
//! | lock status / door log push | `iot/smartlock/{id}/status`, `iot/smartlock/{id}/log` |
//! | sensor push | `iot/device/{temperature,humidity,gaslevel}` |
//! | control | `iot/gaswarning/{control}/{id}`, `iot/device/led/{id}` |

use std::fmt;

use crate::command::Operation;
use crate::id::DeviceId;
use crate::telemetry::TelemetryKind;

/// Filters the transport subscribes to for inbound traffic.
pub const INBOUND_FILTERS: [&str; 11] = [
    "iot/device/+/response",
    "iot/device/+/error",
    "iot/device/+/+/response",
    "iot/device/+/+/error",
    "iot/smartlock/+/+/response",
    "iot/smartlock/+/+/error",
    "iot/smartlock/+/status",
    "iot/smartlock/+/log",
    "iot/device/temperature",
    "iot/device/humidity",
    "iot/device/gaslevel",
];

/// Fire-and-forget control families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    WarningOn,
    WarningOff,
    FanOn,
    FanOff,
    WarningLevel,
    Led,
}

impl ControlKind {
    fn segment(self) -> &'static str {
        match self {
            Self::WarningOn => "onwarning",
            Self::WarningOff => "offwarning",
            Self::FanOn => "onfan",
            Self::FanOff => "offfan",
            Self::WarningLevel => "level",
            Self::Led => "led",
        }
    }

    fn from_gaswarning_segment(segment: &str) -> Option<Self> {
        match segment {
            "onwarning" => Some(Self::WarningOn),
            "offwarning" => Some(Self::WarningOff),
            "onfan" => Some(Self::FanOn),
            "offfan" => Some(Self::FanOff),
            "level" => Some(Self::WarningLevel),
            _ => None,
        }
    }
}

/// What a topic addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    Request(Operation),
    Response(Operation),
    Error(Operation),
    LockStatus,
    DoorLog,
    Sensor(TelemetryKind),
    Control(ControlKind),
}

impl TopicKind {
    /// Whether topics of this kind carry a device id path segment.
    #[must_use]
    pub fn carries_device_id(self) -> bool {
        match self {
            Self::Request(operation) => !operation.is_lifecycle(),
            Self::Sensor(_) => false,
            _ => true,
        }
    }
}

/// Errors produced while parsing a topic string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    #[error("unrecognized topic {0:?}")]
    Unrecognized(String),

    #[error("topic {topic:?} carries an invalid device id")]
    InvalidDeviceId { topic: String },

    #[error("{0:?} topics carry a device id")]
    MissingDeviceId(TopicKind),
}

/// A parsed topic: its kind plus the device id segment, when it has one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    kind: TopicKind,
    device_id: Option<DeviceId>,
}

impl Topic {
    /// Assemble a topic, checking that the device id is present exactly when
    /// the kind carries one. A surplus id is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TopicError::MissingDeviceId`] when the kind needs an id and
    /// none is given.
    pub fn new(kind: TopicKind, device_id: Option<DeviceId>) -> Result<Self, TopicError> {
        if kind.carries_device_id() {
            let device_id = device_id.ok_or(TopicError::MissingDeviceId(kind))?;
            Ok(Self {
                kind,
                device_id: Some(device_id),
            })
        } else {
            Ok(Self {
                kind,
                device_id: None,
            })
        }
    }

    #[must_use]
    pub fn request(operation: Operation, device_id: &DeviceId) -> Self {
        Self::addressed(TopicKind::Request(operation), device_id)
    }

    #[must_use]
    pub fn response(operation: Operation, device_id: &DeviceId) -> Self {
        Self::addressed(TopicKind::Response(operation), device_id)
    }

    #[must_use]
    pub fn error(operation: Operation, device_id: &DeviceId) -> Self {
        Self::addressed(TopicKind::Error(operation), device_id)
    }

    #[must_use]
    pub fn lock_status(device_id: &DeviceId) -> Self {
        Self::addressed(TopicKind::LockStatus, device_id)
    }

    #[must_use]
    pub fn door_log(device_id: &DeviceId) -> Self {
        Self::addressed(TopicKind::DoorLog, device_id)
    }

    #[must_use]
    pub fn sensor(kind: TelemetryKind) -> Self {
        Self {
            kind: TopicKind::Sensor(kind),
            device_id: None,
        }
    }

    #[must_use]
    pub fn control(control: ControlKind, device_id: &DeviceId) -> Self {
        Self::addressed(TopicKind::Control(control), device_id)
    }

    fn addressed(kind: TopicKind, device_id: &DeviceId) -> Self {
        Self {
            kind,
            device_id: kind.carries_device_id().then(|| device_id.clone()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> TopicKind {
        self.kind
    }

    #[must_use]
    pub fn device_id(&self) -> Option<&DeviceId> {
        self.device_id.as_ref()
    }

    /// Parse a concrete topic string.
    ///
    /// # Errors
    ///
    /// Returns [`TopicError`] when the string matches no known shape or its
    /// device segment is not a valid [`DeviceId`].
    pub fn parse(topic: &str) -> Result<Self, TopicError> {
        let segments: Vec<&str> = topic.split('/').collect();
        let unrecognized = || TopicError::Unrecognized(topic.to_string());
        let id = |segment: &str| device_segment(topic, segment);

        let (kind, device_id) = match segments.as_slice() {
            ["iot", "device", "create"] => (TopicKind::Request(Operation::Verify), None),
            ["iot", "device", "connect"] => (TopicKind::Request(Operation::Connect), None),
            ["iot", "device", "disconnect"] => (TopicKind::Request(Operation::Disconnect), None),
            ["iot", "device", sensor] => {
                let kind = TelemetryKind::from_topic_segment(*sensor).ok_or_else(unrecognized)?;
                (TopicKind::Sensor(kind), None)
            }
            ["iot", "device", "led", device] => {
                (TopicKind::Control(ControlKind::Led), Some(id(*device)?))
            }
            ["iot", "device", device, tail] => {
                let kind = reply_kind(Operation::Verify, *tail).ok_or_else(unrecognized)?;
                (kind, Some(id(*device)?))
            }
            ["iot", "device", device, operation, tail] => {
                let operation = match *operation {
                    "connect" => Operation::Connect,
                    "disconnect" => Operation::Disconnect,
                    _ => return Err(unrecognized()),
                };
                let kind = reply_kind(operation, *tail).ok_or_else(unrecognized)?;
                (kind, Some(id(*device)?))
            }
            ["iot", "smartlock", operation, device]
                if lock_operation(*operation).is_some() =>
            {
                let operation = lock_operation(*operation).ok_or_else(unrecognized)?;
                (TopicKind::Request(operation), Some(id(*device)?))
            }
            ["iot", "smartlock", device, "status"] => (TopicKind::LockStatus, Some(id(*device)?)),
            ["iot", "smartlock", device, "log"] => (TopicKind::DoorLog, Some(id(*device)?)),
            ["iot", "smartlock", device, operation, tail] => {
                let operation = lock_operation(*operation).ok_or_else(unrecognized)?;
                let kind = reply_kind(operation, *tail).ok_or_else(unrecognized)?;
                (kind, Some(id(*device)?))
            }
            ["iot", "gaswarning", control, device] => {
                let control =
                    ControlKind::from_gaswarning_segment(*control).ok_or_else(unrecognized)?;
                (TopicKind::Control(control), Some(id(*device)?))
            }
            _ => return Err(unrecognized()),
        };

        Self::new(kind, device_id)
    }
}

fn device_segment(topic: &str, segment: &str) -> Result<DeviceId, TopicError> {
    DeviceId::parse(segment).map_err(|_| TopicError::InvalidDeviceId {
        topic: topic.to_string(),
    })
}

fn reply_kind(operation: Operation, tail: &str) -> Option<TopicKind> {
    match tail {
        "response" => Some(TopicKind::Response(operation)),
        "error" => Some(TopicKind::Error(operation)),
        _ => None,
    }
}

fn lock_operation(segment: &str) -> Option<Operation> {
    match segment {
        "unlock" => Some(Operation::Unlock),
        "lock" => Some(Operation::Lock),
        "password" => Some(Operation::ChangePassword),
        _ => None,
    }
}

fn lifecycle_request_segment(operation: Operation) -> &'static str {
    match operation {
        Operation::Verify => "create",
        other => other.as_str(),
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.device_id.as_ref().map_or("", DeviceId::as_str);
        match self.kind {
            TopicKind::Request(operation) if operation.is_lifecycle() => {
                write!(f, "iot/device/{}", lifecycle_request_segment(operation))
            }
            TopicKind::Request(operation) => write!(f, "iot/smartlock/{operation}/{id}"),
            TopicKind::Response(operation) | TopicKind::Error(operation) => {
                let tail = if matches!(self.kind, TopicKind::Response(_)) {
                    "response"
                } else {
                    "error"
                };
                match operation {
                    Operation::Verify => write!(f, "iot/device/{id}/{tail}"),
                    Operation::Connect | Operation::Disconnect => {
                        write!(f, "iot/device/{id}/{operation}/{tail}")
                    }
                    Operation::Unlock | Operation::Lock | Operation::ChangePassword => {
                        write!(f, "iot/smartlock/{id}/{operation}/{tail}")
                    }
                }
            }
            TopicKind::LockStatus => write!(f, "iot/smartlock/{id}/status"),
            TopicKind::DoorLog => write!(f, "iot/smartlock/{id}/log"),
            TopicKind::Sensor(kind) => write!(f, "iot/device/{}", kind.topic_segment()),
            TopicKind::Control(ControlKind::Led) => write!(f, "iot/device/led/{id}"),
            TopicKind::Control(control) => {
                write!(f, "iot/gaswarning/{}/{id}", control.segment())
            }
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
    fn should_format_lifecycle_requests_without_device_segment() {
        let id = dev("lock-42");
        assert_eq!(
            Topic::request(Operation::Verify, &id).to_string(),
            "iot/device/create"
        );
        assert_eq!(
            Topic::request(Operation::Connect, &id).to_string(),
            "iot/device/connect"
        );
        assert_eq!(
            Topic::request(Operation::Disconnect, &id).to_string(),
            "iot/device/disconnect"
        );
    }

    #[test]
    fn should_format_reply_topics_from_table() {
        let id = dev("lock-42");
        assert_eq!(
            Topic::response(Operation::Verify, &id).to_string(),
            "iot/device/lock-42/response"
        );
        assert_eq!(
            Topic::response(Operation::Connect, &id).to_string(),
            "iot/device/lock-42/connect/response"
        );
        assert_eq!(
            Topic::error(Operation::Disconnect, &id).to_string(),
            "iot/device/lock-42/disconnect/error"
        );
        assert_eq!(
            Topic::response(Operation::ChangePassword, &id).to_string(),
            "iot/smartlock/lock-42/password/response"
        );
    }

    #[test]
    fn should_extract_device_id_from_response_topic() {
        let topic = Topic::parse("iot/device/sensor-7/connect/response").unwrap();
        assert_eq!(topic.kind(), TopicKind::Response(Operation::Connect));
        assert_eq!(topic.device_id(), Some(&dev("sensor-7")));
    }

    #[test]
    fn should_parse_verify_reply_and_error() {
        let topic = Topic::parse("iot/device/cam-1/response").unwrap();
        assert_eq!(topic.kind(), TopicKind::Response(Operation::Verify));

        let topic = Topic::parse("iot/device/cam-1/error").unwrap();
        assert_eq!(topic.kind(), TopicKind::Error(Operation::Verify));
    }

    #[test]
    fn should_parse_unsolicited_lock_pushes() {
        let status = Topic::parse("iot/smartlock/lock-42/status").unwrap();
        assert_eq!(status.kind(), TopicKind::LockStatus);
        let log = Topic::parse("iot/smartlock/lock-42/log").unwrap();
        assert_eq!(log.kind(), TopicKind::DoorLog);
        assert_eq!(log.device_id(), Some(&dev("lock-42")));
    }

    #[test]
    fn should_parse_sensor_topics_without_device() {
        let topic = Topic::parse("iot/device/gaslevel").unwrap();
        assert_eq!(topic.kind(), TopicKind::Sensor(TelemetryKind::GasLevel));
        assert!(topic.device_id().is_none());
    }

    #[test]
    fn should_roundtrip_every_topic_shape() {
        let id = dev("dev-1");
        let topics = [
            Topic::request(Operation::Verify, &id),
            Topic::request(Operation::Unlock, &id),
            Topic::request(Operation::ChangePassword, &id),
            Topic::response(Operation::Verify, &id),
            Topic::response(Operation::Lock, &id),
            Topic::error(Operation::Connect, &id),
            Topic::lock_status(&id),
            Topic::door_log(&id),
            Topic::sensor(TelemetryKind::Humidity),
            Topic::control(ControlKind::FanOff, &id),
            Topic::control(ControlKind::Led, &id),
        ];
        for topic in topics {
            let text = topic.to_string();
            assert_eq!(Topic::parse(&text).unwrap(), topic, "{text}");
        }
    }

    #[test]
    fn should_reject_unknown_topic() {
        assert!(matches!(
            Topic::parse("iot/device/dev-1/reboot/response"),
            Err(TopicError::Unrecognized(_))
        ));
        assert!(matches!(
            Topic::parse("home/lights"),
            Err(TopicError::Unrecognized(_))
        ));
    }

    #[test]
    fn should_reject_invalid_device_segment() {
        assert!(matches!(
            Topic::parse("iot/smartlock//status"),
            Err(TopicError::InvalidDeviceId { .. })
        ));
    }

    #[test]
    fn should_require_device_id_for_addressed_kinds() {
        assert_eq!(
            Topic::new(TopicKind::LockStatus, None),
            Err(TopicError::MissingDeviceId(TopicKind::LockStatus))
        );
        let topic = Topic::new(TopicKind::Request(Operation::Verify), Some(dev("x-1"))).unwrap();
        assert!(topic.device_id().is_none());
    }
}
