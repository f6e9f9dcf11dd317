//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use homelink_app::ports::{DeviceRepository, LockSnapshotStore, MessagePublisher};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Merges the REST routes with the telemetry WebSocket at `/ws`.
/// Includes a [`TraceLayer`] that logs each HTTP request/response at the
/// `DEBUG` level using the `tracing` ecosystem.
pub fn build<DR, SS, P>(state: AppState<DR, SS, P>) -> Router
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(crate::ws::telemetry::<DR, SS, P>))
        .merge(crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
