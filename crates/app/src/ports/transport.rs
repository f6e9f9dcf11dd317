//! Transport ports — the message bus as seen from the core.

use std::future::Future;
use std::sync::Arc;

use homelink_domain::error::HomeLinkError;
use homelink_domain::topic::Topic;

/// Publishes a payload on a message-bus topic.
///
/// A failed publish surfaces as [`HomeLinkError::Transport`].
pub trait MessagePublisher {
    fn publish(
        &self,
        topic: &Topic,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), HomeLinkError>> + Send;
}

/// Receives every message the transport delivers from its subscriptions.
///
/// Implementations deal with their own failures; nothing flows back to the
/// transport.
pub trait InboundHandler {
    fn handle(&self, topic: &str, payload: &[u8]) -> impl Future<Output = ()> + Send;
}

impl<T: MessagePublisher + Send + Sync> MessagePublisher for Arc<T> {
    fn publish(
        &self,
        topic: &Topic,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), HomeLinkError>> + Send {
        (**self).publish(topic, payload)
    }
}

impl<T: InboundHandler + Send + Sync> InboundHandler for Arc<T> {
    fn handle(&self, topic: &str, payload: &[u8]) -> impl Future<Output = ()> + Send {
        (**self).handle(topic, payload)
    }
}
