//! JSON REST handlers for smart locks.
//!
//! Lock commands always answer `200 OK` with a [`CommandOutcome`]; whether
//! the lock obeyed is in `success`. Only storage failures become errors.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use homelink_app::ports::{DeviceRepository, LockSnapshotStore, MessagePublisher};
use homelink_domain::command::CommandOutcome;
use homelink_domain::id::DeviceId;
use homelink_domain::lock::{DoorLogEntry, LockStatusSnapshot};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UnlockRequest {
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Query parameters for `GET /smartlock/{id}/logs`.
#[derive(Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

/// `POST /smartlock/{id}/unlock`
pub async fn unlock<DR, SS, P>(
    State(state): State<AppState<DR, SS, P>>,
    Path(id): Path<String>,
    Json(req): Json<UnlockRequest>,
) -> Result<Json<CommandOutcome>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let outcome = state
        .smartlock
        .unlock(DeviceId::parse(id)?, &req.password)
        .await?;
    Ok(Json(outcome))
}

/// `POST /smartlock/{id}/lock`
pub async fn lock<DR, SS, P>(
    State(state): State<AppState<DR, SS, P>>,
    Path(id): Path<String>,
) -> Result<Json<CommandOutcome>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let outcome = state.smartlock.lock(DeviceId::parse(id)?).await?;
    Ok(Json(outcome))
}

/// `POST /smartlock/{id}/password`
pub async fn change_password<DR, SS, P>(
    State(state): State<AppState<DR, SS, P>>,
    Path(id): Path<String>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<CommandOutcome>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let outcome = state
        .smartlock
        .change_password(DeviceId::parse(id)?, &req.old_password, &req.new_password)
        .await?;
    Ok(Json(outcome))
}

/// `GET /smartlock/{id}/status`
pub async fn status<DR, SS, P>(
    State(state): State<AppState<DR, SS, P>>,
    Path(id): Path<String>,
) -> Result<Json<LockStatusSnapshot>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let snapshot = state.smartlock.lock_status(&DeviceId::parse(id)?).await?;
    Ok(Json(snapshot))
}

/// `GET /smartlock/{id}/logs?limit=N`
pub async fn logs<DR, SS, P>(
    State(state): State<AppState<DR, SS, P>>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<DoorLogEntry>>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let entries = state
        .smartlock
        .door_logs(&DeviceId::parse(id)?, query.limit)
        .await?;
    Ok(Json(entries))
}
