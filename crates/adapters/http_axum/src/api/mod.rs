//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod devices;
#[allow(clippy::missing_errors_doc)]
pub mod gaswarning;
#[allow(clippy::missing_errors_doc)]
pub mod smartlock;

use axum::Router;
use axum::routing::{get, post};

use homelink_app::ports::{DeviceRepository, LockSnapshotStore, MessagePublisher};

use crate::state::AppState;

/// Build the device, smart-lock and gas-warning routes.
pub fn routes<DR, SS, P>() -> Router<AppState<DR, SS, P>>
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    Router::new()
        // Device lifecycle
        .route("/device/create", post(devices::create::<DR, SS, P>))
        .route("/device/{id}", get(devices::get::<DR, SS, P>))
        .route("/device/{id}/connect", post(devices::connect::<DR, SS, P>))
        .route(
            "/device/{id}/disconnect",
            post(devices::disconnect::<DR, SS, P>),
        )
        .route("/device/{id}/led", post(devices::led::<DR, SS, P>))
        // Smart locks
        .route("/smartlock/{id}/unlock", post(smartlock::unlock::<DR, SS, P>))
        .route("/smartlock/{id}/lock", post(smartlock::lock::<DR, SS, P>))
        .route(
            "/smartlock/{id}/password",
            post(smartlock::change_password::<DR, SS, P>),
        )
        .route("/smartlock/{id}/status", get(smartlock::status::<DR, SS, P>))
        .route("/smartlock/{id}/logs", get(smartlock::logs::<DR, SS, P>))
        // Gas warning
        .route(
            "/gaswarning/{id}/onwarning",
            post(gaswarning::warning_on::<DR, SS, P>),
        )
        .route(
            "/gaswarning/{id}/offwarning",
            post(gaswarning::warning_off::<DR, SS, P>),
        )
        .route(
            "/gaswarning/{id}/onfanwarning",
            post(gaswarning::fan_on::<DR, SS, P>),
        )
        .route(
            "/gaswarning/{id}/offfanwarning",
            post(gaswarning::fan_off::<DR, SS, P>),
        )
        .route(
            "/gaswarning/{id}/warningLevel",
            post(gaswarning::warning_level::<DR, SS, P>),
        )
}
