//! Inbound router — dispatches every message the transport receives.
//!
//! The device a message concerns is always taken from the topic string, never
//! from the payload:
//! - replies resolve the matching pending command in the [`CommandBroker`]
//! - error-channel messages reject it
//! - lock status and door-log pushes are appended to the [`LockSnapshotStore`]
//! - sensor pushes are broadcast through the [`TelemetryHub`]
//!
//! A reply without a string `status` is *malformed*: it is logged and never
//! resolves anything, so the command still times out.

use serde_json::Value;

use homelink_domain::command::{CorrelationKey, DeviceReply, Operation, reason_from};
use homelink_domain::error::{HomeLinkError, PayloadError};
use homelink_domain::id::DeviceId;
use homelink_domain::lock::{DoorLogEntry, LockStatusSnapshot};
use homelink_domain::telemetry::{SensorPush, TelemetryKind};
use homelink_domain::topic::{Topic, TopicError, TopicKind};

use crate::command_broker::CommandBroker;
use crate::ports::{InboundHandler, LockSnapshotStore};
use crate::telemetry_hub::TelemetryHub;

/// What happened to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// A reply completed a pending command.
    Resolved(CorrelationKey),
    /// An error-channel message failed a pending command.
    Rejected(CorrelationKey),
    /// A reply or error arrived with nothing pending (late or duplicate).
    Unmatched(CorrelationKey),
    LockStatusRecorded(DeviceId),
    DoorLogRecorded(DeviceId),
    /// A sensor reading was queued for this many subscribers.
    Broadcast { device_id: DeviceId, delivered: usize },
    /// Outbound topics echoed back by the broker.
    Ignored,
}

/// Failures while routing one inbound message.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error(transparent)]
    UnknownTopic(#[from] TopicError),

    #[error("malformed response on {topic}")]
    MalformedResponse {
        topic: String,
        #[source]
        source: PayloadError,
    },

    #[error("malformed push on {topic}")]
    MalformedPush {
        topic: String,
        #[source]
        source: PayloadError,
    },

    #[error(transparent)]
    Storage(#[from] HomeLinkError),
}

/// Routes inbound messages to the broker, the snapshot store and the hub.
pub struct InboundRouter<SS> {
    broker: CommandBroker,
    snapshots: SS,
    hub: TelemetryHub,
}

impl<SS: LockSnapshotStore> InboundRouter<SS> {
    pub fn new(broker: CommandBroker, snapshots: SS, hub: TelemetryHub) -> Self {
        Self {
            broker,
            snapshots,
            hub,
        }
    }

    /// Route one message.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] when the topic is not part of the protocol, a
    /// payload lacks required fields, or a push cannot be stored.
    pub async fn route(&self, topic: &str, payload: &[u8]) -> Result<Routed, RouteError> {
        let parsed = Topic::parse(topic)?;
        let device_id = parsed.device_id().cloned();
        match (parsed.kind(), device_id) {
            (TopicKind::Response(operation), Some(device_id)) => {
                self.on_response(topic, operation, device_id, payload)
            }
            (TopicKind::Error(operation), Some(device_id)) => {
                Ok(self.on_error(operation, device_id, payload))
            }
            (TopicKind::LockStatus, Some(device_id)) => {
                let value = decode(topic, payload)?;
                let snapshot = LockStatusSnapshot::from_push(device_id.clone(), &value)
                    .map_err(|source| malformed_push(topic, source))?;
                self.snapshots.record_status(snapshot).await?;
                Ok(Routed::LockStatusRecorded(device_id))
            }
            (TopicKind::DoorLog, Some(device_id)) => {
                let value = decode(topic, payload)?;
                let entry = DoorLogEntry::from_push(device_id.clone(), &value)
                    .map_err(|source| malformed_push(topic, source))?;
                self.snapshots.append_log(entry).await?;
                Ok(Routed::DoorLogRecorded(device_id))
            }
            (TopicKind::Sensor(kind), _) => self.on_sensor(topic, kind, payload),
            _ => Ok(Routed::Ignored),
        }
    }

    fn on_response(
        &self,
        topic: &str,
        operation: Operation,
        device_id: DeviceId,
        payload: &[u8],
    ) -> Result<Routed, RouteError> {
        let reply = serde_json::from_slice::<Value>(payload)
            .map_err(PayloadError::from)
            .and_then(DeviceReply::from_payload)
            .map_err(|source| RouteError::MalformedResponse {
                topic: topic.to_string(),
                source,
            })?;
        let key = CorrelationKey::new(operation, device_id);
        if self.broker.resolve(&key, reply) {
            Ok(Routed::Resolved(key))
        } else {
            tracing::debug!(%key, "reply without pending command");
            Ok(Routed::Unmatched(key))
        }
    }

    fn on_error(&self, operation: Operation, device_id: DeviceId, payload: &[u8]) -> Routed {
        let reason = match serde_json::from_slice::<Value>(payload) {
            Ok(value) => reason_from(&value),
            Err(_) => reason_from(&Value::String(
                String::from_utf8_lossy(payload).into_owned(),
            )),
        };
        let key = CorrelationKey::new(operation, device_id);
        if self.broker.reject(&key, reason) {
            Routed::Rejected(key)
        } else {
            tracing::debug!(%key, "error without pending command");
            Routed::Unmatched(key)
        }
    }

    fn on_sensor(
        &self,
        topic: &str,
        kind: TelemetryKind,
        payload: &[u8],
    ) -> Result<Routed, RouteError> {
        let value = decode(topic, payload)?;
        let push =
            SensorPush::from_payload(kind, &value).map_err(|source| malformed_push(topic, source))?;
        let delivered = self.hub.broadcast(&push.device_id, push.reading);
        Ok(Routed::Broadcast {
            device_id: push.device_id,
            delivered,
        })
    }
}

fn decode(topic: &str, payload: &[u8]) -> Result<Value, RouteError> {
    serde_json::from_slice(payload).map_err(|err| malformed_push(topic, err.into()))
}

fn malformed_push(topic: &str, source: PayloadError) -> RouteError {
    RouteError::MalformedPush {
        topic: topic.to_string(),
        source,
    }
}

impl<SS: LockSnapshotStore + Send + Sync> InboundHandler for InboundRouter<SS> {
    async fn handle(&self, topic: &str, payload: &[u8]) {
        match self.route(topic, payload).await {
            Ok(routed) => tracing::trace!(topic, ?routed, "inbound message routed"),
            Err(RouteError::Storage(err)) => {
                tracing::error!(topic, error = %err, "failed to store lock push");
            }
            Err(err) => tracing::warn!(topic, error = %err, "inbound message dropped"),
        }
    }
}
