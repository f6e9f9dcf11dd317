//! MQTT adapter error types.

use homelink_domain::error::HomeLinkError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The request queue is full or the event loop is gone.
    #[error("MQTT client error")]
    Client(#[from] rumqttc::ClientError),
}

impl From<MqttError> for HomeLinkError {
    fn from(err: MqttError) -> Self {
        Self::Transport(Box::new(err))
    }
}
