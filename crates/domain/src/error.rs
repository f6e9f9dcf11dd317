//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`HomeLinkError`] via `#[from]` or an explicit `From` impl.

use std::time::Duration;

use crate::command::CorrelationKey;
use crate::device::DeviceState;
use crate::id::DeviceId;

/// Base error type shared by the application core and its adapters.
#[derive(Debug, thiserror::Error)]
pub enum HomeLinkError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// `DeviceNotFound` and friends.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// The device exists but is not in a state that allows the operation.
    #[error(transparent)]
    Unauthorized(#[from] UnauthorizedError),

    #[error(transparent)]
    Command(#[from] CommandError),

    /// The message bus could not accept a publish or is disconnected.
    #[error("transport unavailable")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("invalid device id {id:?}: {reason}")]
    InvalidDeviceId { id: String, reason: &'static str },

    #[error("password must not be empty")]
    EmptyPassword,

    #[error("{field} must be a finite, non-negative number")]
    InvalidThreshold { field: &'static str },
}

/// A referenced record does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// The device is registered but its state forbids the requested operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("device {device_id} is {state}, operation requires an active device")]
pub struct UnauthorizedError {
    pub device_id: DeviceId,
    pub state: DeviceState,
}

/// Failures of a correlated command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Another command with the same correlation key is still outstanding.
    #[error("command {key} is already in flight")]
    AlreadyInFlight { key: CorrelationKey },

    /// The device did not answer before the deadline.
    #[error("device did not answer {key} within {}ms", .timeout.as_millis())]
    Timeout {
        key: CorrelationKey,
        timeout: Duration,
    },

    /// The device answered, or reported on its error channel, that it failed.
    #[error("{reason}")]
    Rejected { key: CorrelationKey, reason: String },

    #[error("device {device_id} already has {limit} outstanding commands")]
    OutstandingLimit { device_id: DeviceId, limit: usize },

    /// The registration was withdrawn before any answer arrived.
    #[error("command {key} was cancelled")]
    Cancelled { key: CorrelationKey },
}

/// A device payload did not have the expected shape.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON")]
    Json(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing or invalid field `{0}`")]
    Field(&'static str),

    #[error(transparent)]
    DeviceId(#[from] ValidationError),
}
