//! Smart-lock service — correlated lock commands and snapshot reads.
//!
//! Lock, unlock and password changes always answer with a
//! [`CommandOutcome`]: a device refusal, a timeout or a failed precondition
//! becomes `{success: false, message}`. Only storage failures propagate.
//! Reads go to the snapshot store and never touch the broker.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use homelink_domain::command::{CommandOutcome, DEFAULT_LOCK_TIMEOUT, DeviceReply, Operation};
use homelink_domain::error::{HomeLinkError, NotFoundError, UnauthorizedError, ValidationError};
use homelink_domain::id::DeviceId;
use homelink_domain::lock::{DoorLogEntry, LockStatusSnapshot};

use super::find_device;
use crate::dispatcher::CommandDispatcher;
use crate::ports::{DeviceRepository, LockSnapshotStore, MessagePublisher};

/// Application service for smart locks.
pub struct SmartLockService<R, SS, P> {
    repo: R,
    snapshots: SS,
    dispatcher: Arc<CommandDispatcher<P>>,
    timeout: Duration,
}

impl<R, SS, P> SmartLockService<R, SS, P>
where
    R: DeviceRepository,
    SS: LockSnapshotStore,
    P: MessagePublisher,
{
    pub fn new(repo: R, snapshots: SS, dispatcher: Arc<CommandDispatcher<P>>) -> Self {
        Self {
            repo,
            snapshots,
            dispatcher,
            timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Override the deadline of lock commands.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ask the lock to open.
    ///
    /// # Errors
    ///
    /// Returns [`HomeLinkError::Storage`] when the device record cannot be read.
    #[tracing::instrument(skip(self, password))]
    pub async fn unlock(
        &self,
        device_id: DeviceId,
        password: &str,
    ) -> Result<CommandOutcome, HomeLinkError> {
        if password.is_empty() {
            return Ok(CommandOutcome::failure(
                ValidationError::EmptyPassword.to_string(),
            ));
        }
        let payload = json!({ "deviceId": device_id, "password": password });
        self.run(Operation::Unlock, device_id, payload, "door unlocked")
            .await
    }

    /// Ask the lock to close.
    ///
    /// # Errors
    ///
    /// Returns [`HomeLinkError::Storage`] when the device record cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn lock(&self, device_id: DeviceId) -> Result<CommandOutcome, HomeLinkError> {
        let payload = json!({ "deviceId": device_id });
        self.run(Operation::Lock, device_id, payload, "door locked")
            .await
    }

    /// Replace the lock's password.
    ///
    /// # Errors
    ///
    /// Returns [`HomeLinkError::Storage`] when the device record cannot be read.
    #[tracing::instrument(skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        device_id: DeviceId,
        old_password: &str,
        new_password: &str,
    ) -> Result<CommandOutcome, HomeLinkError> {
        if new_password.is_empty() {
            return Ok(CommandOutcome::failure(
                ValidationError::EmptyPassword.to_string(),
            ));
        }
        let payload = json!({
            "deviceId": device_id,
            "oldPassword": old_password,
            "newPassword": new_password,
        });
        self.run(Operation::ChangePassword, device_id, payload, "password changed")
            .await
    }

    /// Latest status snapshot pushed by the lock.
    ///
    /// # Errors
    ///
    /// Returns [`HomeLinkError::NotFound`] when the device is unknown or has
    /// never reported its status.
    pub async fn lock_status(
        &self,
        device_id: &DeviceId,
    ) -> Result<LockStatusSnapshot, HomeLinkError> {
        find_device(&self.repo, device_id).await?;
        self.snapshots
            .latest_status(device_id)
            .await?
            .ok_or_else(|| {
                NotFoundError {
                    entity: "Lock status",
                    id: device_id.to_string(),
                }
                .into()
            })
    }

    /// Door-log entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`HomeLinkError::NotFound`] when the device is unknown.
    pub async fn door_logs(
        &self,
        device_id: &DeviceId,
        limit: Option<usize>,
    ) -> Result<Vec<DoorLogEntry>, HomeLinkError> {
        find_device(&self.repo, device_id).await?;
        self.snapshots.recent_logs(device_id, limit).await
    }

    async fn run(
        &self,
        operation: Operation,
        device_id: DeviceId,
        payload: Value,
        success_message: &str,
    ) -> Result<CommandOutcome, HomeLinkError> {
        match self.exchange(operation, device_id, payload).await {
            Ok(reply) => Ok(CommandOutcome::from_reply(reply, success_message)),
            Err(HomeLinkError::Storage(err)) => Err(HomeLinkError::Storage(err)),
            Err(err) => {
                tracing::warn!(%operation, error = %err, "lock command failed");
                Ok(CommandOutcome::failure(err.to_string()))
            }
        }
    }

    async fn exchange(
        &self,
        operation: Operation,
        device_id: DeviceId,
        payload: Value,
    ) -> Result<DeviceReply, HomeLinkError> {
        let device = find_device(&self.repo, &device_id).await?;
        if !device.is_active() {
            return Err(UnauthorizedError {
                device_id,
                state: device.state,
            }
            .into());
        }
        self.dispatcher
            .request(operation, device_id, payload, self.timeout)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_broker::CommandBroker;
    use crate::testing::{InMemoryDeviceRepo, InMemorySnapshotStore, RecordingPublisher};
    use homelink_domain::command::CorrelationKey;
    use homelink_domain::device::{Device, DeviceState, DeviceType};
    use homelink_domain::time::{Timestamp, now};

    type Service = SmartLockService<
        Arc<InMemoryDeviceRepo>,
        Arc<InMemorySnapshotStore>,
        Arc<RecordingPublisher>,
    >;

    struct Harness {
        service: Arc<Service>,
        snapshots: Arc<InMemorySnapshotStore>,
        publisher: Arc<RecordingPublisher>,
        broker: CommandBroker,
    }

    fn lock_id() -> DeviceId {
        DeviceId::parse("lock-42").unwrap()
    }

    fn harness(state: DeviceState) -> Harness {
        harness_with(state, RecordingPublisher::default())
    }

    fn harness_with(state: DeviceState, publisher: RecordingPublisher) -> Harness {
        let device = Device::builder()
            .device_id(lock_id())
            .name("Front door")
            .device_type(DeviceType::SmartLock)
            .state(state)
            .build()
            .unwrap();
        let repo = Arc::new(InMemoryDeviceRepo::with([device]));
        let snapshots = Arc::new(InMemorySnapshotStore::default());
        let publisher = Arc::new(publisher);
        let broker = CommandBroker::new();
        let dispatcher = Arc::new(CommandDispatcher::new(broker.clone(), Arc::clone(&publisher)));
        Harness {
            service: Arc::new(SmartLockService::new(repo, Arc::clone(&snapshots), dispatcher)),
            snapshots,
            publisher,
            broker,
        }
    }

    fn spawn_unlock(h: &Harness) -> tokio::task::JoinHandle<Result<CommandOutcome, HomeLinkError>> {
        let service = Arc::clone(&h.service);
        tokio::spawn(async move { service.unlock(lock_id(), "123456").await })
    }

    #[tokio::test]
    async fn should_succeed_when_device_confirms_unlock() {
        let h = harness(DeviceState::Active);
        let task = spawn_unlock(&h);

        h.publisher.wait_for(1).await;
        let (topic, payload) = h.publisher.published().remove(0);
        assert_eq!(topic, "iot/smartlock/unlock/lock-42");
        assert_eq!(payload["password"], "123456");
        let key = CorrelationKey::new(Operation::Unlock, lock_id());
        h.broker.resolve(
            &key,
            DeviceReply::from_payload(json!({ "status": "success" })).unwrap(),
        );

        let outcome = task.await.unwrap().unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.message, "door unlocked");
    }

    #[tokio::test]
    async fn should_report_device_reason_when_unlock_refused() {
        let h = harness(DeviceState::Active);
        let task = spawn_unlock(&h);

        h.publisher.wait_for(1).await;
        let key = CorrelationKey::new(Operation::Unlock, lock_id());
        h.broker.resolve(
            &key,
            DeviceReply::from_payload(json!({ "status": "failed", "reason": "bad password" }))
                .unwrap(),
        );

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, CommandOutcome::failure("bad password"));
    }

    #[tokio::test(start_paused = true)]
    async fn should_convert_timeout_into_failure_outcome() {
        let h = harness(DeviceState::Active);

        let outcome = h.service.lock(lock_id()).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(
            outcome.message,
            "device did not answer lock:lock-42 within 10000ms"
        );
        assert_eq!(h.broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn should_convert_publish_failure_into_failure_outcome() {
        let h = harness_with(DeviceState::Active, RecordingPublisher::failing());

        let outcome = h.service.unlock(lock_id(), "123456").await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.message, "transport unavailable");
        assert_eq!(h.broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn should_refuse_inactive_lock_without_publishing() {
        let h = harness(DeviceState::Inactive);

        let outcome = h.service.unlock(lock_id(), "123456").await.unwrap();

        assert!(!outcome.success);
        assert!(outcome.message.contains("INACTIVE"));
        assert!(h.publisher.published().is_empty());
    }

    #[tokio::test]
    async fn should_refuse_concurrent_unlock_for_same_lock() {
        let h = harness(DeviceState::Active);
        let first = spawn_unlock(&h);
        h.publisher.wait_for(1).await;

        let second = h.service.unlock(lock_id(), "123456").await.unwrap();
        assert!(!second.success);
        assert!(second.message.contains("already in flight"));

        let key = CorrelationKey::new(Operation::Unlock, lock_id());
        h.broker.resolve(
            &key,
            DeviceReply::from_payload(json!({ "status": "success" })).unwrap(),
        );
        assert!(first.await.unwrap().unwrap().success);
    }

    #[tokio::test]
    async fn should_reject_empty_new_password() {
        let h = harness(DeviceState::Active);
        let outcome = h
            .service
            .change_password(lock_id(), "123456", "")
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::failure("password must not be empty"));
    }

    #[tokio::test]
    async fn should_read_latest_status_snapshot() {
        let h = harness(DeviceState::Active);
        let older = LockStatusSnapshot {
            device_id: lock_id(),
            locked: false,
            failed_attempts: 0,
            timestamp: minutes_ago(5),
        };
        let newer = LockStatusSnapshot {
            locked: true,
            failed_attempts: 3,
            timestamp: now(),
            ..older.clone()
        };
        h.snapshots.record_status(newer.clone()).await.unwrap();
        h.snapshots.record_status(older).await.unwrap();

        let status = h.service.lock_status(&lock_id()).await.unwrap();
        assert_eq!(status, newer);
        assert_eq!(h.broker.pending_count(), 0);
    }

    #[tokio::test]
    async fn should_return_not_found_without_status_snapshot() {
        let h = harness(DeviceState::Active);
        let result = h.service.lock_status(&lock_id()).await;
        assert!(matches!(result, Err(HomeLinkError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_return_limited_logs_newest_first() {
        let h = harness(DeviceState::Active);
        for (minutes, event) in [(3, "unlock"), (1, "lock"), (2, "unlock")] {
            h.snapshots
                .append_log(DoorLogEntry {
                    device_id: lock_id(),
                    event: event.to_string(),
                    status: "success".to_string(),
                    timestamp: minutes_ago(minutes),
                })
                .await
                .unwrap();
        }

        let logs = h.service.door_logs(&lock_id(), Some(2)).await.unwrap();

        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].event, "lock");
        assert!(logs[0].timestamp > logs[1].timestamp);
    }

    fn minutes_ago(minutes: i64) -> Timestamp {
        now() - chrono::Duration::minutes(minutes)
    }
}
