//! Device lifecycle — verify, connect and disconnect handshakes.
//!
//! Every transition is a correlated exchange with the device. The device
//! record is only written after the device confirmed; failures and timeouts
//! leave it untouched and surface to the caller.

use std::sync::Arc;

use serde_json::json;

use homelink_domain::command::{CommandTimeouts, CorrelationKey, DeviceReply, Operation};
use homelink_domain::device::{Device, DeviceState};
use homelink_domain::error::{CommandError, HomeLinkError, UnauthorizedError};
use homelink_domain::id::DeviceId;
use homelink_domain::time::now;

use super::find_device;
use crate::dispatcher::CommandDispatcher;
use crate::ports::{DeviceRepository, MessagePublisher};

/// Coordinates the device state machine.
pub struct DeviceLifecycle<R, P> {
    repo: R,
    dispatcher: Arc<CommandDispatcher<P>>,
    timeouts: CommandTimeouts,
}

impl<R: DeviceRepository, P: MessagePublisher> DeviceLifecycle<R, P> {
    pub fn new(repo: R, dispatcher: Arc<CommandDispatcher<P>>, timeouts: CommandTimeouts) -> Self {
        Self {
            repo,
            dispatcher,
            timeouts,
        }
    }

    /// Verify a new device with a single request/response exchange and
    /// persist it as `INACTIVE`.
    ///
    /// Registering an id that already exists returns the stored record and
    /// sends nothing.
    ///
    /// # Errors
    ///
    /// Returns [`HomeLinkError::Validation`] for an invalid device,
    /// [`HomeLinkError::Command`] when the device rejects, does not answer or
    /// is already being verified, and [`HomeLinkError::Transport`] when the
    /// request cannot be published.
    #[tracing::instrument(skip(self, device), fields(device_id = %device.device_id))]
    pub async fn register_device(&self, mut device: Device) -> Result<Device, HomeLinkError> {
        device.validate()?;
        if let Some(existing) = self.repo.get_by_id(&device.device_id).await? {
            tracing::debug!("device already registered");
            return Ok(existing);
        }

        let payload = json!({
            "deviceId": device.device_id,
            "name": device.name,
            "homeId": device.home_id,
            "type": device.device_type,
        });
        self.exchange(Operation::Verify, &device.device_id, payload)
            .await?;

        device.state = DeviceState::Inactive;
        device.last_connected = None;
        let device = self.repo.create(device).await?;
        tracing::info!("device verified");
        Ok(device)
    }

    /// Bring an `INACTIVE` device online. A device that is already `ACTIVE`
    /// is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`HomeLinkError::NotFound`] for an unknown device, and the
    /// command or transport errors of [`register_device`](Self::register_device).
    #[tracing::instrument(skip(self))]
    pub async fn connect(&self, device_id: DeviceId) -> Result<Device, HomeLinkError> {
        let mut device = find_device(&self.repo, &device_id).await?;
        if device.is_active() {
            return Ok(device);
        }

        self.exchange(
            Operation::Connect,
            &device_id,
            json!({ "deviceId": device_id }),
        )
        .await?;

        device.apply(Operation::Connect, now());
        let device = self.repo.update(device).await?;
        tracing::info!("device connected");
        Ok(device)
    }

    /// Take an `ACTIVE` device offline.
    ///
    /// # Errors
    ///
    /// Returns [`HomeLinkError::Unauthorized`] without contacting the device
    /// when it is not `ACTIVE`, [`HomeLinkError::NotFound`] for an unknown
    /// device, and the command or transport errors of
    /// [`register_device`](Self::register_device).
    #[tracing::instrument(skip(self))]
    pub async fn disconnect(&self, device_id: DeviceId) -> Result<Device, HomeLinkError> {
        let mut device = find_device(&self.repo, &device_id).await?;
        if !device.is_active() {
            return Err(UnauthorizedError {
                device_id,
                state: device.state,
            }
            .into());
        }

        self.exchange(
            Operation::Disconnect,
            &device_id,
            json!({ "deviceId": device_id }),
        )
        .await?;

        device.apply(Operation::Disconnect, now());
        let device = self.repo.update(device).await?;
        tracing::info!("device disconnected");
        Ok(device)
    }

    /// Look up a device.
    ///
    /// # Errors
    ///
    /// Returns [`HomeLinkError::NotFound`] when no device with `device_id`
    /// exists, or a storage error from the repository.
    pub async fn get_device(&self, device_id: &DeviceId) -> Result<Device, HomeLinkError> {
        find_device(&self.repo, device_id).await
    }

    async fn exchange(
        &self,
        operation: Operation,
        device_id: &DeviceId,
        payload: serde_json::Value,
    ) -> Result<DeviceReply, HomeLinkError> {
        let reply = self
            .dispatcher
            .request(
                operation,
                device_id.clone(),
                payload,
                self.timeouts.for_operation(operation),
            )
            .await?;
        if reply.is_success() {
            Ok(reply)
        } else {
            let key = CorrelationKey::new(operation, device_id.clone());
            tracing::warn!(%key, reason = %reply.reason(), "device refused");
            Err(CommandError::Rejected {
                key,
                reason: reply.reason(),
            }
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::command_broker::CommandBroker;
    use crate::testing::{InMemoryDeviceRepo, RecordingPublisher};
    use homelink_domain::device::DeviceType;

    type Lifecycle = DeviceLifecycle<Arc<InMemoryDeviceRepo>, Arc<RecordingPublisher>>;

    struct Harness {
        lifecycle: Arc<Lifecycle>,
        repo: Arc<InMemoryDeviceRepo>,
        publisher: Arc<RecordingPublisher>,
        broker: CommandBroker,
    }

    fn harness(devices: Vec<Device>) -> Harness {
        let repo = Arc::new(InMemoryDeviceRepo::with(devices));
        let publisher = Arc::new(RecordingPublisher::default());
        let broker = CommandBroker::new();
        let dispatcher = Arc::new(CommandDispatcher::new(broker.clone(), Arc::clone(&publisher)));
        let timeouts = CommandTimeouts {
            verify: Duration::from_secs(5),
            connect: Duration::from_secs(5),
            disconnect: Duration::from_secs(5),
            lock: Duration::from_secs(10),
        };
        Harness {
            lifecycle: Arc::new(DeviceLifecycle::new(Arc::clone(&repo), dispatcher, timeouts)),
            repo,
            publisher,
            broker,
        }
    }

    fn device(id: &str, state: DeviceState) -> Device {
        Device::builder()
            .device_id(DeviceId::parse(id).unwrap())
            .name("Front door")
            .device_type(DeviceType::SmartLock)
            .state(state)
            .build()
            .unwrap()
    }

    fn answer(broker: &CommandBroker, operation: Operation, id: &str, status: &str) {
        let key = CorrelationKey::new(operation, DeviceId::parse(id).unwrap());
        let reply =
            DeviceReply::from_payload(json!({ "status": status, "reason": "nope" })).unwrap();
        assert!(broker.resolve(&key, reply));
    }

    #[tokio::test]
    async fn should_register_device_as_inactive_after_verify() {
        let h = harness(vec![]);
        let task = tokio::spawn({
            let lifecycle = Arc::clone(&h.lifecycle);
            async move {
                lifecycle
                    .register_device(device("cam-1", DeviceState::Active))
                    .await
            }
        });

        h.publisher.wait_for(1).await;
        let (topic, payload) = h.publisher.published().remove(0);
        assert_eq!(topic, "iot/device/create");
        assert_eq!(payload["deviceId"], "cam-1");
        answer(&h.broker, Operation::Verify, "cam-1", "success");

        let registered = task.await.unwrap().unwrap();
        assert_eq!(registered.state, DeviceState::Inactive);
        assert!(h.repo.get("cam-1").is_some());
    }

    #[tokio::test]
    async fn should_not_persist_when_verify_fails() {
        let h = harness(vec![]);
        let task = tokio::spawn({
            let lifecycle = Arc::clone(&h.lifecycle);
            async move {
                lifecycle
                    .register_device(device("cam-1", DeviceState::Inactive))
                    .await
            }
        });

        h.publisher.wait_for(1).await;
        answer(&h.broker, Operation::Verify, "cam-1", "failed");

        let result = task.await.unwrap();
        assert!(matches!(
            result,
            Err(HomeLinkError::Command(CommandError::Rejected { ref reason, .. }))
                if reason == "nope"
        ));
        assert!(h.repo.get("cam-1").is_none());
    }

    #[tokio::test]
    async fn should_return_existing_device_without_publishing() {
        let h = harness(vec![device("cam-1", DeviceState::Active)]);
        let registered = h
            .lifecycle
            .register_device(device("cam-1", DeviceState::Inactive))
            .await
            .unwrap();
        assert_eq!(registered.state, DeviceState::Active);
        assert!(h.publisher.published().is_empty());
    }

    #[tokio::test]
    async fn should_activate_device_and_stamp_last_connected() {
        let h = harness(vec![device("sensor-1", DeviceState::Inactive)]);
        let task = tokio::spawn({
            let lifecycle = Arc::clone(&h.lifecycle);
            async move { lifecycle.connect(DeviceId::parse("sensor-1").unwrap()).await }
        });

        h.publisher.wait_for(1).await;
        assert_eq!(h.publisher.published()[0].0, "iot/device/connect");
        answer(&h.broker, Operation::Connect, "sensor-1", "success");

        let connected = task.await.unwrap().unwrap();
        assert_eq!(connected.state, DeviceState::Active);
        assert!(connected.last_connected.is_some());
        assert_eq!(h.repo.get("sensor-1").unwrap().state, DeviceState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn should_leave_device_inactive_when_connect_times_out() {
        let h = harness(vec![device("sensor-1", DeviceState::Inactive)]);

        let result = h
            .lifecycle
            .connect(DeviceId::parse("sensor-1").unwrap())
            .await;

        assert!(matches!(
            result,
            Err(HomeLinkError::Command(CommandError::Timeout { .. }))
        ));
        assert_eq!(h.repo.get("sensor-1").unwrap().state, DeviceState::Inactive);
        assert_eq!(h.broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn should_return_active_device_unchanged_on_connect() {
        let h = harness(vec![device("sensor-1", DeviceState::Active)]);
        let device = h
            .lifecycle
            .connect(DeviceId::parse("sensor-1").unwrap())
            .await
            .unwrap();
        assert_eq!(device.state, DeviceState::Active);
        assert!(h.publisher.published().is_empty());
    }

    #[tokio::test]
    async fn should_fail_fast_when_disconnecting_inactive_device() {
        let h = harness(vec![device("lock-42", DeviceState::Inactive)]);

        let result = h
            .lifecycle
            .disconnect(DeviceId::parse("lock-42").unwrap())
            .await;

        assert!(matches!(result, Err(HomeLinkError::Unauthorized(_))));
        assert_eq!(h.broker.pending_count(), 0);
        assert!(h.publisher.published().is_empty());
    }

    #[tokio::test]
    async fn should_deactivate_device_on_disconnect() {
        let h = harness(vec![device("lock-42", DeviceState::Active)]);
        let task = tokio::spawn({
            let lifecycle = Arc::clone(&h.lifecycle);
            async move { lifecycle.disconnect(DeviceId::parse("lock-42").unwrap()).await }
        });

        h.publisher.wait_for(1).await;
        assert_eq!(h.publisher.published()[0].0, "iot/device/disconnect");
        answer(&h.broker, Operation::Disconnect, "lock-42", "success");

        let device = task.await.unwrap().unwrap();
        assert_eq!(device.state, DeviceState::Inactive);
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_device() {
        let h = harness(vec![]);
        let result = h
            .lifecycle
            .connect(DeviceId::parse("ghost").unwrap())
            .await;
        assert!(matches!(result, Err(HomeLinkError::NotFound(_))));
    }
}
