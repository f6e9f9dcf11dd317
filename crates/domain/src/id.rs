//! Typed identifier newtypes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for the home a [`Device`](crate::device::Device) belongs to.
    HomeId
);

define_id!(
    /// Identifier of one live telemetry connection.
    ConnectionId
);

/// Topic segments that a device id may not take, so that every topic parses
/// back to exactly one meaning.
const RESERVED_SEGMENTS: &[&str] = &[
    "create",
    "connect",
    "disconnect",
    "unlock",
    "lock",
    "password",
    "response",
    "error",
    "status",
    "log",
    "led",
    "temperature",
    "humidity",
    "gaslevel",
];

/// Globally unique, device-chosen identifier.
///
/// Device ids appear as a single path segment of message-bus topics, so they
/// may not be empty, may not contain `/`, `+` or `#`, and may not equal a
/// protocol keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Validate and wrap a device id.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDeviceId`] when the value cannot be
    /// used as a topic segment.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let reason = if value.is_empty() {
            Some("must not be empty")
        } else if value.contains(['/', '+', '#']) {
            Some("must not contain '/', '+' or '#'")
        } else if value.chars().any(char::is_whitespace) {
            Some("must not contain whitespace")
        } else if RESERVED_SEGMENTS.contains(&value.as_str()) {
            Some("is a reserved topic keyword")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(ValidationError::InvalidDeviceId { id: value, reason }),
            None => Ok(Self(value)),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<DeviceId> for String {
    fn from(value: DeviceId) -> Self {
        value.0
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
