//! JSON REST handlers for gas-warning controls.
//!
//! Every endpoint publishes one fire-and-forget command and answers
//! `202 Accepted`; nothing waits for the device.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use homelink_app::ports::{DeviceRepository, LockSnapshotStore, MessagePublisher};
use homelink_domain::id::DeviceId;

use super::devices::AcceptedResponse;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningLevelRequest {
    pub gas_value: f64,
    pub tem_value: f64,
}

/// `POST /gaswarning/{id}/onwarning`
pub async fn warning_on<DR, SS, P>(
    State(state): State<AppState<DR, SS, P>>,
    Path(id): Path<String>,
) -> Result<AcceptedResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let outcome = state
        .gas_warning
        .set_warning(DeviceId::parse(id)?, true)
        .await?;
    Ok(AcceptedResponse::Accepted(Json(outcome)))
}

/// `POST /gaswarning/{id}/offwarning`
pub async fn warning_off<DR, SS, P>(
    State(state): State<AppState<DR, SS, P>>,
    Path(id): Path<String>,
) -> Result<AcceptedResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let outcome = state
        .gas_warning
        .set_warning(DeviceId::parse(id)?, false)
        .await?;
    Ok(AcceptedResponse::Accepted(Json(outcome)))
}

/// `POST /gaswarning/{id}/onfanwarning`
pub async fn fan_on<DR, SS, P>(
    State(state): State<AppState<DR, SS, P>>,
    Path(id): Path<String>,
) -> Result<AcceptedResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let outcome = state
        .gas_warning
        .set_fan(DeviceId::parse(id)?, true)
        .await?;
    Ok(AcceptedResponse::Accepted(Json(outcome)))
}

/// `POST /gaswarning/{id}/offfanwarning`
pub async fn fan_off<DR, SS, P>(
    State(state): State<AppState<DR, SS, P>>,
    Path(id): Path<String>,
) -> Result<AcceptedResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let outcome = state
        .gas_warning
        .set_fan(DeviceId::parse(id)?, false)
        .await?;
    Ok(AcceptedResponse::Accepted(Json(outcome)))
}

/// `POST /gaswarning/{id}/warningLevel`
pub async fn warning_level<DR, SS, P>(
    State(state): State<AppState<DR, SS, P>>,
    Path(id): Path<String>,
    Json(req): Json<WarningLevelRequest>,
) -> Result<AcceptedResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let outcome = state
        .gas_warning
        .set_warning_level(DeviceId::parse(id)?, req.gas_value, req.tem_value)
        .await?;
    Ok(AcceptedResponse::Accepted(Json(outcome)))
}
