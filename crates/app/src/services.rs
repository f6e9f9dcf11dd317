//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.
//! Services that talk to devices share one [`CommandDispatcher`](crate::dispatcher::CommandDispatcher).

pub mod device_lifecycle;
pub mod gas_warning_service;
pub mod smartlock_service;

use homelink_domain::device::Device;
use homelink_domain::error::{HomeLinkError, NotFoundError};
use homelink_domain::id::DeviceId;

use crate::ports::DeviceRepository;

/// Load a device or fail with `DeviceNotFound`.
async fn find_device<R: DeviceRepository>(
    repo: &R,
    device_id: &DeviceId,
) -> Result<Device, HomeLinkError> {
    repo.get_by_id(device_id).await?.ok_or_else(|| {
        NotFoundError {
            entity: "Device",
            id: device_id.to_string(),
        }
        .into()
    })
}
