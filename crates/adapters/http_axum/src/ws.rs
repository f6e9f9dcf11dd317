//! Telemetry WebSocket.
//!
//! Each socket is one hub connection. Clients send
//! `{"event":"subscribe_device","data":"<id>"}` or
//! `{"event":"unsubscribe_device","data":"<id>"}` and receive
//! `sensor_data_<id>` frames for the devices they watch. A frame the server
//! cannot honour is answered with `{"event":"error","data":"<message>"}`.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;

use homelink_app::ports::{DeviceRepository, LockSnapshotStore, MessagePublisher};
use homelink_app::telemetry_hub::TelemetryHub;
use homelink_domain::id::{ConnectionId, DeviceId};

use crate::state::AppState;

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum ClientFrame {
    SubscribeDevice(String),
    UnsubscribeDevice(String),
}

/// `GET /ws`
pub async fn telemetry<DR, SS, P>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<DR, SS, P>>,
) -> Response
where
    DR: DeviceRepository + Send + Sync + 'static,
    SS: LockSnapshotStore + Send + Sync + 'static,
    P: MessagePublisher + Send + Sync + 'static,
{
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| session(socket, hub))
}

async fn session(mut socket: WebSocket, hub: TelemetryHub) {
    let (connection_id, mut frames) = hub.connect();

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Err(message) = apply_client_frame(&hub, connection_id, text.as_str()) {
                        let error = json!({ "event": "error", "data": message }).to_string();
                        if socket.send(Message::Text(error.into())).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::warn!(%err, "failed to serialize telemetry frame");
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    let left = hub.on_disconnect(connection_id);
    tracing::debug!(%connection_id, groups_left = left, "telemetry socket closed");
}

/// Apply one client text frame to the hub; `Err` carries the message for
/// the error frame.
fn apply_client_frame(
    hub: &TelemetryHub,
    connection_id: ConnectionId,
    text: &str,
) -> Result<(), String> {
    let frame: ClientFrame =
        serde_json::from_str(text).map_err(|err| format!("invalid frame: {err}"))?;
    match frame {
        ClientFrame::SubscribeDevice(id) => {
            let device_id = DeviceId::parse(id).map_err(|err| err.to_string())?;
            hub.subscribe(connection_id, device_id)
                .map_err(|err| err.to_string())?;
        }
        ClientFrame::UnsubscribeDevice(id) => {
            let device_id = DeviceId::parse(id).map_err(|err| err.to_string())?;
            hub.unsubscribe(connection_id, &device_id);
        }
    }
    Ok(())
}
