//! JSON REST handlers for the device lifecycle.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use homelink_app::ports::{DeviceRepository, LockSnapshotStore, MessagePublisher};
use homelink_domain::command::CommandOutcome;
use homelink_domain::device::{Device, DeviceType};
use homelink_domain::id::{DeviceId, HomeId};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for registering a device.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeviceRequest {
    pub device_id: String,
    pub name: String,
    pub home_id: Option<HomeId>,
    #[serde(rename = "type", default)]
    pub device_type: DeviceType,
}

/// Request body for switching the LED.
#[derive(Deserialize)]
pub struct LedRequest {
    pub on: bool,
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<Device>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Response of the get, connect and disconnect endpoints.
pub enum DeviceResponse {
    Ok(Json<Device>),
}

impl IntoResponse for DeviceResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Response of fire-and-forget endpoints.
pub enum AcceptedResponse {
    Accepted(Json<CommandOutcome>),
}

impl IntoResponse for AcceptedResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Accepted(json) => (StatusCode::ACCEPTED, json).into_response(),
        }
    }
}

/// `POST /device/create`
pub async fn create<DR, SS, P>(
    State(state): State<AppState<DR, SS, P>>,
    Json(req): Json<CreateDeviceRequest>,
) -> Result<CreateResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let mut builder = Device::builder()
        .device_id(DeviceId::parse(req.device_id)?)
        .name(req.name)
        .device_type(req.device_type);
    if let Some(home_id) = req.home_id {
        builder = builder.home_id(home_id);
    }

    let device = builder.build()?;
    let registered = state.lifecycle.register_device(device).await?;
    Ok(CreateResponse::Created(Json(registered)))
}

/// `GET /device/{id}`
pub async fn get<DR, SS, P>(
    State(state): State<AppState<DR, SS, P>>,
    Path(id): Path<String>,
) -> Result<DeviceResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let device_id = DeviceId::parse(id)?;
    let device = state.lifecycle.get_device(&device_id).await?;
    Ok(DeviceResponse::Ok(Json(device)))
}

/// `POST /device/{id}/connect`
pub async fn connect<DR, SS, P>(
    State(state): State<AppState<DR, SS, P>>,
    Path(id): Path<String>,
) -> Result<DeviceResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let device = state.lifecycle.connect(DeviceId::parse(id)?).await?;
    Ok(DeviceResponse::Ok(Json(device)))
}

/// `POST /device/{id}/disconnect`
pub async fn disconnect<DR, SS, P>(
    State(state): State<AppState<DR, SS, P>>,
    Path(id): Path<String>,
) -> Result<DeviceResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let device = state.lifecycle.disconnect(DeviceId::parse(id)?).await?;
    Ok(DeviceResponse::Ok(Json(device)))
}

/// `POST /device/{id}/led`
pub async fn led<DR, SS, P>(
    State(state): State<AppState<DR, SS, P>>,
    Path(id): Path<String>,
    Json(req): Json<LedRequest>,
) -> Result<AcceptedResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let outcome = state
        .gas_warning
        .set_led(DeviceId::parse(id)?, req.on)
        .await?;
    Ok(AcceptedResponse::Accepted(Json(outcome)))
}
