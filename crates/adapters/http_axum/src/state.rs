//! Shared application state for axum handlers.

use std::sync::Arc;

use homelink_app::ports::{DeviceRepository, LockSnapshotStore, MessagePublisher};
use homelink_app::services::device_lifecycle::DeviceLifecycle;
use homelink_app::services::gas_warning_service::GasWarningService;
use homelink_app::services::smartlock_service::SmartLockService;
use homelink_app::telemetry_hub::TelemetryHub;

/// Application state shared across all axum handlers.
///
/// Generic over the device repository, the lock snapshot store and the
/// message publisher to avoid dynamic dispatch. `Clone` is implemented
/// manually so the underlying types themselves do not need to be `Clone`;
/// only the `Arc` wrappers are cloned.
pub struct AppState<DR, SS, P> {
    /// Verify / connect / disconnect handshakes and device reads.
    pub lifecycle: Arc<DeviceLifecycle<DR, P>>,
    /// Correlated smart-lock commands and snapshot reads.
    pub smartlock: Arc<SmartLockService<DR, SS, P>>,
    /// Fire-and-forget controls.
    pub gas_warning: Arc<GasWarningService<DR, P>>,
    /// Subscriber groups for the telemetry WebSocket.
    pub hub: TelemetryHub,
}

impl<DR, SS, P> Clone for AppState<DR, SS, P> {
    fn clone(&self) -> Self {
        Self {
            lifecycle: Arc::clone(&self.lifecycle),
            smartlock: Arc::clone(&self.smartlock),
            gas_warning: Arc::clone(&self.gas_warning),
            hub: self.hub.clone(),
        }
    }
}

impl<DR, SS, P> AppState<DR, SS, P>
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    /// Create a new application state from service instances.
    pub fn new(
        lifecycle: DeviceLifecycle<DR, P>,
        smartlock: SmartLockService<DR, SS, P>,
        gas_warning: GasWarningService<DR, P>,
        hub: TelemetryHub,
    ) -> Self {
        Self {
            lifecycle: Arc::new(lifecycle),
            smartlock: Arc::new(smartlock),
            gas_warning: Arc::new(gas_warning),
            hub,
        }
    }
}
