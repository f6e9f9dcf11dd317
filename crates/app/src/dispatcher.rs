//! Command dispatcher — delivers a [`DeviceCommand`] according to its
//! [`CommandKind`].
//!
//! Correlated commands are registered with the [`CommandBroker`] *before*
//! their request is published and the dispatcher waits for the reply.
//! Fire-and-forget commands are published and never tracked.

use std::time::Duration;

use serde_json::Value;

use homelink_domain::command::{
    CommandKind, ControlCommand, CorrelationKey, DeviceCommand, DeviceReply, Operation,
};
use homelink_domain::error::{CommandError, HomeLinkError};
use homelink_domain::id::DeviceId;
use homelink_domain::topic::Topic;

use crate::command_broker::CommandBroker;
use crate::ports::MessagePublisher;

/// Result of dispatching a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// A fire-and-forget command left the gateway.
    Sent,
    /// A correlated command was answered by the device.
    Reply(DeviceReply),
}

/// Sends commands to devices through a [`MessagePublisher`].
pub struct CommandDispatcher<P> {
    broker: CommandBroker,
    publisher: P,
}

impl<P: MessagePublisher> CommandDispatcher<P> {
    pub fn new(broker: CommandBroker, publisher: P) -> Self {
        Self { broker, publisher }
    }

    #[must_use]
    pub fn broker(&self) -> &CommandBroker {
        &self.broker
    }

    /// Deliver `command` the way its kind requires.
    ///
    /// A correlated command is registered before its request is published,
    /// and the publish itself must finish within the command's deadline.
    ///
    /// # Errors
    ///
    /// Returns [`HomeLinkError::Transport`] when the publish fails and
    /// [`HomeLinkError::Command`] when a correlated command is refused by the
    /// broker, times out, or is rejected on the device's error channel.
    #[tracing::instrument(
        skip(self, command),
        fields(device_id = %command.device_id, topic = %command.topic)
    )]
    pub async fn dispatch(&self, command: DeviceCommand) -> Result<Dispatched, HomeLinkError> {
        match (command.key(), command.kind) {
            (Some(key), CommandKind::Correlated { timeout, .. }) => {
                let reply = self
                    .correlate(key, &command.topic, &command.payload, timeout)
                    .await?;
                tracing::debug!(status = reply.status(), "device replied");
                Ok(Dispatched::Reply(reply))
            }
            _ => {
                self.publish(&command.topic, &command.payload).await?;
                Ok(Dispatched::Sent)
            }
        }
    }

    /// Send a correlated command and wait for the device's reply.
    ///
    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch).
    pub async fn request(
        &self,
        operation: Operation,
        device_id: DeviceId,
        payload: Value,
        timeout: Duration,
    ) -> Result<DeviceReply, HomeLinkError> {
        let key = CorrelationKey::new(operation, device_id.clone());
        let command = DeviceCommand::correlated(operation, device_id, payload, timeout);
        match self.dispatch(command).await? {
            Dispatched::Reply(reply) => Ok(reply),
            Dispatched::Sent => Err(CommandError::Cancelled { key }.into()),
        }
    }

    /// Publish a control without waiting for any confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`HomeLinkError::Transport`] when the publish fails.
    pub async fn send(
        &self,
        control: ControlCommand,
        device_id: DeviceId,
    ) -> Result<(), HomeLinkError> {
        let command = DeviceCommand::fire_and_forget(control, device_id);
        self.dispatch(command).await.map(|_| ())
    }

    async fn correlate(
        &self,
        key: CorrelationKey,
        topic: &Topic,
        payload: &Value,
        timeout: Duration,
    ) -> Result<DeviceReply, HomeLinkError> {
        let pending = self.broker.register(key.clone(), timeout)?;
        match tokio::time::timeout(timeout, self.publish(topic, payload)).await {
            Ok(Ok(())) => Ok(pending.await?),
            Ok(Err(err)) => {
                self.broker.cancel(&key);
                Err(err)
            }
            Err(_) => {
                tracing::warn!(%key, "publish did not complete before the deadline");
                self.broker.cancel(&key);
                Err(CommandError::Timeout { key, timeout }.into())
            }
        }
    }

    async fn publish(&self, topic: &Topic, payload: &Value) -> Result<(), HomeLinkError> {
        tracing::debug!(%topic, "publishing");
        self.publisher
            .publish(topic, payload.to_string().into_bytes())
            .await
    }
}
