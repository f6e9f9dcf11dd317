//! # homelink-adapter-mqtt
//!
//! MQTT transport adapter built on [rumqttc](https://docs.rs/rumqttc).
//!
//! ## Responsibilities
//! - Publish device commands on behalf of the core ([`MessagePublisher`])
//! - Subscribe to every inbound topic filter, again after each reconnect
//! - Hand every inbound publish to the core's [`InboundHandler`]
//!
//! The client and its event loop are split: [`MqttTransport`] is cheap to
//! clone and only enqueues requests, while [`MqttEventLoop`] owns the network
//! connection and must be driven (see [`MqttEventLoop::spawn`]) for anything
//! to leave the process.
//!
//! ## Dependency rule
//! Same as other adapters: depends on `homelink-app` and `homelink-domain`.

mod config;
mod error;

use std::future::Future;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeFilter};
use tokio::task::JoinHandle;

use homelink_app::ports::{InboundHandler, MessagePublisher};
use homelink_domain::error::HomeLinkError;
use homelink_domain::topic::{INBOUND_FILTERS, Topic};

pub use config::MqttConfig;
pub use error::MqttError;

/// Publishing half of the MQTT connection.
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
}

impl MqttTransport {
    /// Create the client and its event loop. Nothing touches the network
    /// until the event loop is polled.
    #[must_use]
    pub fn connect(config: &MqttConfig) -> (Self, MqttEventLoop) {
        let mut options = MqttOptions::new(
            config.client_id.clone(),
            config.broker_host.clone(),
            config.broker_port,
        );
        options.set_keep_alive(config.keep_alive());
        options.set_clean_session(true);
        if let Some(username) = &config.username {
            options.set_credentials(username.clone(), config.password.clone().unwrap_or_default());
        }

        let (client, event_loop) = AsyncClient::new(options, config.channel_capacity.max(1));
        let transport = Self {
            client: client.clone(),
        };
        let event_loop = MqttEventLoop {
            client,
            event_loop,
            reconnect_delay: config.reconnect_delay(),
        };
        (transport, event_loop)
    }

    /// Ask the broker to close the session.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Client`] when the event loop is gone.
    pub async fn disconnect(&self) -> Result<(), MqttError> {
        self.client.disconnect().await?;
        Ok(())
    }
}

impl MessagePublisher for MqttTransport {
    /// Enqueue the publish without waiting for room in the request queue.
    ///
    /// While the broker is unreachable the event loop stops draining the
    /// queue; once it is full every publish fails with a transport error
    /// instead of blocking the caller.
    fn publish(
        &self,
        topic: &Topic,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), HomeLinkError>> + Send {
        let topic = topic.to_string();
        tracing::debug!(%topic, bytes = payload.len(), "publishing");
        let result = self
            .client
            .try_publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(|err| HomeLinkError::from(MqttError::from(err)));
        std::future::ready(result)
    }
}

/// Network half of the MQTT connection.
pub struct MqttEventLoop {
    client: AsyncClient,
    event_loop: EventLoop,
    reconnect_delay: Duration,
}

impl MqttEventLoop {
    /// Drive the connection on a background task.
    pub fn spawn<H>(self, handler: H) -> JoinHandle<()>
    where
        H: InboundHandler + Send + Sync + 'static,
    {
        tokio::spawn(self.run(handler))
    }

    /// Poll the connection forever, resubscribing after every `ConnAck` and
    /// forwarding each inbound publish to `handler`.
    ///
    /// Connection errors are logged and retried after the reconnect delay;
    /// rumqttc reconnects on the next poll.
    pub async fn run<H: InboundHandler>(mut self, handler: H) {
        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    tracing::info!(code = ?ack.code, "connected to broker");
                    if let Err(err) = self.client.try_subscribe_many(subscriptions()) {
                        tracing::error!(error = %err, "failed to subscribe to device topics");
                    }
                }
                Ok(event) => {
                    if let Some((topic, payload)) = extract_publish(&event) {
                        handler.handle(topic, payload).await;
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "broker connection lost, retrying");
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }
}

/// Every inbound filter at QoS 1.
fn subscriptions() -> Vec<SubscribeFilter> {
    INBOUND_FILTERS
        .iter()
        .map(|filter| SubscribeFilter::new((*filter).to_string(), QoS::AtLeastOnce))
        .collect()
}

/// Topic and payload of an inbound publish; `None` for any other packet.
fn extract_publish(event: &Event) -> Option<(&str, &[u8])> {
    match event {
        Event::Incoming(Packet::Publish(publish)) => {
            Some((publish.topic.as_str(), &publish.payload[..]))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homelink_domain::command::Operation;
    use homelink_domain::id::DeviceId;
    use rumqttc::Publish;

    struct Discard;

    impl InboundHandler for Discard {
        fn handle(&self, _topic: &str, _payload: &[u8]) -> impl Future<Output = ()> + Send {
            std::future::ready(())
        }
    }

    fn lock_topic() -> Topic {
        Topic::request(Operation::Lock, &DeviceId::parse("lock-42").unwrap())
    }

    fn config() -> MqttConfig {
        MqttConfig {
            channel_capacity: 4,
            ..MqttConfig::default()
        }
    }

    #[test]
    fn should_subscribe_every_inbound_filter_at_least_once() {
        let filters = subscriptions();
        assert_eq!(filters.len(), INBOUND_FILTERS.len());
        assert!(filters.iter().all(|f| f.qos == QoS::AtLeastOnce));
        assert!(filters.iter().any(|f| f.path == "iot/smartlock/+/status"));
    }

    #[test]
    fn should_extract_topic_and_payload_from_incoming_publish() {
        let event = Event::Incoming(Packet::Publish(Publish::new(
            "iot/device/temperature",
            QoS::AtLeastOnce,
            br#"{"deviceId":"t-1","value":21.5}"#.to_vec(),
        )));

        let (topic, payload) = extract_publish(&event).unwrap();
        assert_eq!(topic, "iot/device/temperature");
        assert_eq!(payload, br#"{"deviceId":"t-1","value":21.5}"#);
    }

    #[test]
    fn should_ignore_packets_other_than_publish() {
        assert!(extract_publish(&Event::Incoming(Packet::PingResp)).is_none());
    }

    #[tokio::test]
    async fn should_enqueue_publish_while_event_loop_is_alive() {
        let (transport, _event_loop) = MqttTransport::connect(&config());
        let topic = Topic::request(Operation::Lock, &DeviceId::parse("lock-42").unwrap());

        let result = transport.publish(&topic, b"{}".to_vec()).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn should_report_transport_error_when_event_loop_is_gone() {
        let (transport, event_loop) = MqttTransport::connect(&config());
        drop(event_loop);
        let topic = Topic::request(Operation::Lock, &DeviceId::parse("lock-42").unwrap());

        let result = transport.publish(&topic, b"{}".to_vec()).await;

        assert!(matches!(result, Err(HomeLinkError::Transport(_))));
    }

    #[tokio::test]
    async fn should_fail_instead_of_blocking_when_request_queue_is_full() {
        let (transport, _event_loop) = MqttTransport::connect(&config());

        for _ in 0..4 {
            transport.publish(&lock_topic(), b"{}".to_vec()).await.unwrap();
        }
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            transport.publish(&lock_topic(), b"{}".to_vec()),
        )
        .await
        .expect("publish must not block");

        assert!(matches!(result, Err(HomeLinkError::Transport(_))));
    }

    #[tokio::test]
    async fn should_report_transport_error_once_unreachable_broker_backs_up() {
        let (transport, event_loop) = MqttTransport::connect(&MqttConfig {
            broker_port: 1,
            reconnect_delay_secs: 1,
            ..config()
        });
        let task = event_loop.spawn(Discard);

        let mut results = Vec::new();
        for _ in 0..8 {
            let outcome = tokio::time::timeout(
                Duration::from_secs(1),
                transport.publish(&lock_topic(), b"{}".to_vec()),
            )
            .await
            .expect("publish must not block");
            results.push(outcome.is_ok());
        }
        task.abort();

        assert_eq!(results.iter().filter(|ok| **ok).count(), 4);
        assert!(!results[7]);
    }
}
