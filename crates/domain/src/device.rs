//! Device — a physical thing reachable over the message bus.
//!
//! A device record is created once the device answers the verification
//! handshake. Its `state` is only ever mutated by the lifecycle coordinator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::command::Operation;
use crate::error::{HomeLinkError, ValidationError};
use crate::id::{DeviceId, HomeId};
use crate::time::Timestamp;

/// Capability family of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceType {
    Light,
    AtmosphereSensor,
    SecurityCamera,
    SmartLock,
    #[default]
    Other,
}

impl DeviceType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "Light",
            Self::AtmosphereSensor => "AtmosphereSensor",
            Self::SecurityCamera => "SecurityCamera",
            Self::SmartLock => "SmartLock",
            Self::Other => "Other",
        }
    }

    /// Parse the persisted representation; unknown values map to [`Other`](Self::Other).
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "Light" => Self::Light,
            "AtmosphereSensor" => Self::AtmosphereSensor,
            "SecurityCamera" => Self::SecurityCamera,
            "SmartLock" => Self::SmartLock,
            _ => Self::Other,
        }
    }
}

/// Persisted connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceState {
    #[default]
    Inactive,
    Active,
}

impl DeviceState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "INACTIVE",
            Self::Active => "ACTIVE",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "INACTIVE" => Some(Self::Inactive),
            "ACTIVE" => Some(Self::Active),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handshake state, including the pre-registration `Unverified` stage that
/// has no persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unverified,
    Inactive,
    Active,
}

impl LifecycleState {
    /// State reached after `operation` completes with `succeeded`.
    ///
    /// Failures never move the device. Operations that do not belong to the
    /// lifecycle, or that are not accepted from the current state, leave it
    /// unchanged too.
    #[must_use]
    pub fn after(self, operation: Operation, succeeded: bool) -> Self {
        if !succeeded {
            return self;
        }
        match (self, operation) {
            (Self::Unverified, Operation::Verify) | (Self::Active, Operation::Disconnect) => {
                Self::Inactive
            }
            (Self::Inactive, Operation::Connect) => Self::Active,
            (state, _) => state,
        }
    }

    /// Persisted counterpart, `None` while unverified.
    #[must_use]
    pub fn persisted(self) -> Option<DeviceState> {
        match self {
            Self::Unverified => None,
            Self::Inactive => Some(DeviceState::Inactive),
            Self::Active => Some(DeviceState::Active),
        }
    }
}

impl From<DeviceState> for LifecycleState {
    fn from(state: DeviceState) -> Self {
        match state {
            DeviceState::Inactive => Self::Inactive,
            DeviceState::Active => Self::Active,
        }
    }
}

/// A registered device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: DeviceId,
    pub name: String,
    pub home_id: HomeId,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub state: DeviceState,
    pub last_connected: Option<Timestamp>,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HomeLinkError::Validation`] when `name` is empty.
    pub fn validate(&self) -> Result<(), HomeLinkError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == DeviceState::Active
    }

    #[must_use]
    pub fn lifecycle(&self) -> LifecycleState {
        self.state.into()
    }

    /// Apply a successful lifecycle operation, stamping `last_connected` on connect.
    pub fn apply(&mut self, operation: Operation, at: Timestamp) {
        let next = self.lifecycle().after(operation, true);
        if let Some(state) = next.persisted() {
            if state == DeviceState::Active && self.state != DeviceState::Active {
                self.last_connected = Some(at);
            }
            self.state = state;
        }
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    device_id: Option<DeviceId>,
    name: Option<String>,
    home_id: Option<HomeId>,
    device_type: Option<DeviceType>,
    state: Option<DeviceState>,
    last_connected: Option<Timestamp>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn device_id(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn home_id(mut self, home_id: HomeId) -> Self {
        self.home_id = Some(home_id);
        self
    }

    #[must_use]
    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = Some(device_type);
        self
    }

    #[must_use]
    pub fn state(mut self, state: DeviceState) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn last_connected(mut self, at: Timestamp) -> Self {
        self.last_connected = Some(at);
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// # Errors
    ///
    /// Returns [`HomeLinkError::Validation`] if the device id is missing or
    /// `name` is missing or empty.
    pub fn build(self) -> Result<Device, HomeLinkError> {
        let device_id = self.device_id.ok_or(ValidationError::InvalidDeviceId {
            id: String::new(),
            reason: "must not be empty",
        })?;
        let device = Device {
            device_id,
            name: self.name.unwrap_or_default(),
            home_id: self.home_id.unwrap_or_default(),
            device_type: self.device_type.unwrap_or_default(),
            state: self.state.unwrap_or_default(),
            last_connected: self.last_connected,
        };
        device.validate()?;
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    fn lock() -> Device {
        Device::builder()
            .device_id(DeviceId::parse("lock-42").unwrap())
            .name("Front door")
            .device_type(DeviceType::SmartLock)
            .build()
            .unwrap()
    }

    #[test]
    fn should_build_inactive_device_by_default() {
        let device = lock();
        assert_eq!(device.state, DeviceState::Inactive);
        assert!(device.last_connected.is_none());
        assert!(!device.is_active());
    }

    #[test]
    fn should_return_validation_error_when_name_is_empty() {
        let result = Device::builder()
            .device_id(DeviceId::parse("lock-42").unwrap())
            .name("  ")
            .build();
        assert!(matches!(
            result,
            Err(HomeLinkError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_require_device_id() {
        let result = Device::builder().name("Front door").build();
        assert!(matches!(
            result,
            Err(HomeLinkError::Validation(
                ValidationError::InvalidDeviceId { .. }
            ))
        ));
    }

    #[test]
    fn should_follow_lifecycle_table() {
        use LifecycleState::{Active, Inactive, Unverified};
        let cases = [
            (Unverified, Operation::Verify, true, Inactive),
            (Unverified, Operation::Verify, false, Unverified),
            (Inactive, Operation::Connect, true, Active),
            (Inactive, Operation::Connect, false, Inactive),
            (Active, Operation::Disconnect, true, Inactive),
            (Active, Operation::Disconnect, false, Active),
        ];
        for (from, op, ok, to) in cases {
            assert_eq!(from.after(op, ok), to, "{from:?} --{op:?}/{ok}-->");
        }
    }

    #[test]
    fn should_ignore_operations_not_accepted_from_state() {
        assert_eq!(
            LifecycleState::Inactive.after(Operation::Disconnect, true),
            LifecycleState::Inactive
        );
        assert_eq!(
            LifecycleState::Active.after(Operation::Unlock, true),
            LifecycleState::Active
        );
    }

    #[test]
    fn should_stamp_last_connected_on_connect() {
        let mut device = lock();
        let at = now();
        device.apply(Operation::Connect, at);
        assert_eq!(device.state, DeviceState::Active);
        assert_eq!(device.last_connected, Some(at));

        device.apply(Operation::Disconnect, now());
        assert_eq!(device.state, DeviceState::Inactive);
        assert_eq!(device.last_connected, Some(at));
    }

    #[test]
    fn should_serialize_with_wire_field_names() {
        let json = serde_json::to_value(lock()).unwrap();
        assert_eq!(json["deviceId"], "lock-42");
        assert_eq!(json["type"], "SmartLock");
        assert_eq!(json["state"], "INACTIVE");
        assert!(json["lastConnected"].is_null());
    }
}
