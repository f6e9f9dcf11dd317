//! Storage port — repository traits for persistence.

use std::future::Future;
use std::sync::Arc;

use homelink_domain::device::Device;
use homelink_domain::error::HomeLinkError;
use homelink_domain::id::DeviceId;
use homelink_domain::lock::{DoorLogEntry, LockStatusSnapshot};

/// Repository for [`Device`] records.
///
/// Devices are never deleted by the core.
pub trait DeviceRepository {
    /// Persist a new device.
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, HomeLinkError>> + Send;

    /// Get a device by its identifier.
    fn get_by_id(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, HomeLinkError>> + Send;

    /// Overwrite an existing device.
    fn update(&self, device: Device) -> impl Future<Output = Result<Device, HomeLinkError>> + Send;
}

/// Append-only store of smart-lock pushes.
pub trait LockSnapshotStore {
    /// Append a status snapshot.
    fn record_status(
        &self,
        snapshot: LockStatusSnapshot,
    ) -> impl Future<Output = Result<(), HomeLinkError>> + Send;

    /// Most recent snapshot by timestamp, if any.
    fn latest_status(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Option<LockStatusSnapshot>, HomeLinkError>> + Send;

    /// Append a door-log entry.
    fn append_log(
        &self,
        entry: DoorLogEntry,
    ) -> impl Future<Output = Result<(), HomeLinkError>> + Send;

    /// Door-log entries ordered newest-first, optionally limited.
    fn recent_logs(
        &self,
        device_id: &DeviceId,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<Vec<DoorLogEntry>, HomeLinkError>> + Send;
}

impl<T: DeviceRepository + Send + Sync> DeviceRepository for Arc<T> {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, HomeLinkError>> + Send {
        (**self).create(device)
    }

    fn get_by_id(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, HomeLinkError>> + Send {
        (**self).get_by_id(id)
    }

    fn update(&self, device: Device) -> impl Future<Output = Result<Device, HomeLinkError>> + Send {
        (**self).update(device)
    }
}

impl<T: LockSnapshotStore + Send + Sync> LockSnapshotStore for Arc<T> {
    fn record_status(
        &self,
        snapshot: LockStatusSnapshot,
    ) -> impl Future<Output = Result<(), HomeLinkError>> + Send {
        (**self).record_status(snapshot)
    }

    fn latest_status(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Option<LockStatusSnapshot>, HomeLinkError>> + Send {
        (**self).latest_status(device_id)
    }

    fn append_log(
        &self,
        entry: DoorLogEntry,
    ) -> impl Future<Output = Result<(), HomeLinkError>> + Send {
        (**self).append_log(entry)
    }

    fn recent_logs(
        &self,
        device_id: &DeviceId,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<Vec<DoorLogEntry>, HomeLinkError>> + Send {
        (**self).recent_logs(device_id, limit)
    }
}
