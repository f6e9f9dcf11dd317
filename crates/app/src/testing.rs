//! In-memory port implementations shared by the unit tests of this crate.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::Notify;

use homelink_domain::device::Device;
use homelink_domain::error::HomeLinkError;
use homelink_domain::id::DeviceId;
use homelink_domain::lock::{DoorLogEntry, LockStatusSnapshot};
use homelink_domain::topic::Topic;

use crate::ports::{DeviceRepository, LockSnapshotStore, MessagePublisher};

#[derive(Default)]
pub struct InMemoryDeviceRepo {
    store: Mutex<HashMap<DeviceId, Device>>,
}

impl InMemoryDeviceRepo {
    pub fn with(devices: impl IntoIterator<Item = Device>) -> Self {
        let repo = Self::default();
        for device in devices {
            repo.store
                .lock()
                .unwrap()
                .insert(device.device_id.clone(), device);
        }
        repo
    }

    pub fn get(&self, id: &str) -> Option<Device> {
        let id = DeviceId::parse(id).unwrap();
        self.store.lock().unwrap().get(&id).cloned()
    }
}

impl DeviceRepository for InMemoryDeviceRepo {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, HomeLinkError>> + Send {
        let mut store = self.store.lock().unwrap();
        store.insert(device.device_id.clone(), device.clone());
        async { Ok(device) }
    }

    fn get_by_id(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, HomeLinkError>> + Send {
        let result = self.store.lock().unwrap().get(id).cloned();
        async { Ok(result) }
    }

    fn update(&self, device: Device) -> impl Future<Output = Result<Device, HomeLinkError>> + Send {
        let mut store = self.store.lock().unwrap();
        store.insert(device.device_id.clone(), device.clone());
        async { Ok(device) }
    }
}

#[derive(Default)]
pub struct InMemorySnapshotStore {
    statuses: Mutex<Vec<LockStatusSnapshot>>,
    logs: Mutex<Vec<DoorLogEntry>>,
}

impl InMemorySnapshotStore {
    pub fn status_count(&self) -> usize {
        self.statuses.lock().unwrap().len()
    }
}

impl LockSnapshotStore for InMemorySnapshotStore {
    fn record_status(
        &self,
        snapshot: LockStatusSnapshot,
    ) -> impl Future<Output = Result<(), HomeLinkError>> + Send {
        self.statuses.lock().unwrap().push(snapshot);
        async { Ok(()) }
    }

    fn latest_status(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Option<LockStatusSnapshot>, HomeLinkError>> + Send {
        let latest = self
            .statuses
            .lock()
            .unwrap()
            .iter()
            .filter(|s| &s.device_id == device_id)
            .max_by_key(|s| s.timestamp)
            .cloned();
        async { Ok(latest) }
    }

    fn append_log(
        &self,
        entry: DoorLogEntry,
    ) -> impl Future<Output = Result<(), HomeLinkError>> + Send {
        self.logs.lock().unwrap().push(entry);
        async { Ok(()) }
    }

    fn recent_logs(
        &self,
        device_id: &DeviceId,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<Vec<DoorLogEntry>, HomeLinkError>> + Send {
        let mut logs: Vec<DoorLogEntry> = self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|e| &e.device_id == device_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            logs.truncate(limit);
        }
        async { Ok(logs) }
    }
}

/// Publisher that records every message, optionally failing all publishes.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, Value)>>,
    notify: Notify,
    fail: bool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<(String, Value)> {
        self.published.lock().unwrap().clone()
    }

    /// Wait until at least `count` messages have been published.
    pub async fn wait_for(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.published.lock().unwrap().len() >= count {
                return;
            }
            notified.await;
        }
    }
}

impl MessagePublisher for RecordingPublisher {
    fn publish(
        &self,
        topic: &Topic,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), HomeLinkError>> + Send {
        let result = if self.fail {
            Err(HomeLinkError::Transport("broker unreachable".into()))
        } else {
            let payload = serde_json::from_slice(&payload).unwrap_or(Value::Null);
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload));
            self.notify.notify_waiters();
            Ok(())
        };
        async { result }
    }
}
