//! Telemetry hub — fans sensor readings out to per-device subscriber groups.
//!
//! Every live connection owns a bounded channel of [`TelemetryFrame`]s. A
//! subscriber group maps a device to the connections interested in it; it is
//! created on the first subscribe and removed as soon as it becomes empty.
//! Delivery is at-most-once: readings for a device nobody watches are
//! dropped, and a connection whose buffer is full misses the frame.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use homelink_domain::id::{ConnectionId, DeviceId};
use homelink_domain::telemetry::{RawReading, TelemetryFrame};

/// Hub limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Frames buffered per connection before new frames are dropped.
    pub connection_buffer: usize,
    /// Devices a single connection may watch at once.
    pub max_subscriptions_per_connection: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            connection_buffer: 64,
            max_subscriptions_per_connection: 32,
        }
    }
}

/// Errors returned by [`TelemetryHub::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    #[error("connection {connection_id} already watches {limit} devices")]
    SubscriptionLimit {
        connection_id: ConnectionId,
        limit: usize,
    },
}

struct Connection {
    sender: mpsc::Sender<TelemetryFrame>,
    devices: HashSet<DeviceId>,
}

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnectionId, Connection>,
    groups: HashMap<DeviceId, HashSet<ConnectionId>>,
}

impl HubState {
    /// Drop a connection and its membership in every group.
    fn remove_connection(&mut self, connection_id: ConnectionId) -> usize {
        self.connections.remove(&connection_id);
        let mut removed = 0;
        self.groups.retain(|_, members| {
            if members.remove(&connection_id) {
                removed += 1;
            }
            !members.is_empty()
        });
        removed
    }
}

/// Subscriber-group registry.
///
/// Cloning is cheap and every clone shares the same groups.
#[derive(Clone, Default)]
pub struct TelemetryHub {
    state: Arc<Mutex<HubState>>,
    config: HubConfig,
}

impl TelemetryHub {
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        Self {
            state: Arc::default(),
            config,
        }
    }

    fn state(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new live connection and return the stream of frames
    /// destined to it.
    #[must_use]
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<TelemetryFrame>) {
        let connection_id = ConnectionId::new();
        let (sender, receiver) = mpsc::channel(self.config.connection_buffer.max(1));
        self.state().connections.insert(
            connection_id,
            Connection {
                sender,
                devices: HashSet::new(),
            },
        );
        tracing::debug!(%connection_id, "telemetry connection opened");
        (connection_id, receiver)
    }

    /// Add `connection_id` to the group of `device_id`, creating the group if
    /// needed. Returns `false` when the connection was already a member.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::UnknownConnection`] for a connection that was never
    /// opened (or already closed) and [`HubError::SubscriptionLimit`] when the
    /// connection watches too many devices.
    pub fn subscribe(
        &self,
        connection_id: ConnectionId,
        device_id: DeviceId,
    ) -> Result<bool, HubError> {
        let limit = self.config.max_subscriptions_per_connection;
        let mut state = self.state();
        let connection = state
            .connections
            .get_mut(&connection_id)
            .ok_or(HubError::UnknownConnection(connection_id))?;
        if connection.devices.contains(&device_id) {
            return Ok(false);
        }
        if connection.devices.len() >= limit {
            return Err(HubError::SubscriptionLimit {
                connection_id,
                limit,
            });
        }
        connection.devices.insert(device_id.clone());
        tracing::debug!(%connection_id, %device_id, "subscribed");
        state.groups.entry(device_id).or_default().insert(connection_id);
        Ok(true)
    }

    /// Remove `connection_id` from the group of `device_id`, deleting the
    /// group when it becomes empty. Returns whether it was a member.
    pub fn unsubscribe(&self, connection_id: ConnectionId, device_id: &DeviceId) -> bool {
        let mut state = self.state();
        if let Some(connection) = state.connections.get_mut(&connection_id) {
            connection.devices.remove(device_id);
        }
        let Some(members) = state.groups.get_mut(device_id) else {
            return false;
        };
        let removed = members.remove(&connection_id);
        if members.is_empty() {
            state.groups.remove(device_id);
        }
        if removed {
            tracing::debug!(%connection_id, %device_id, "unsubscribed");
        }
        removed
    }

    /// Forget a closed connection, removing it from every group it joined.
    /// Returns the number of groups it was removed from.
    pub fn on_disconnect(&self, connection_id: ConnectionId) -> usize {
        let removed = self.state().remove_connection(connection_id);
        tracing::debug!(%connection_id, groups = removed, "telemetry connection closed");
        removed
    }

    /// Sanitize `reading` and deliver it to every subscriber of `device_id`.
    ///
    /// Returns the number of connections the frame was queued for. Members
    /// whose connection has gone away are pruned on the way.
    pub fn broadcast(&self, device_id: &DeviceId, reading: RawReading) -> usize {
        let frame = TelemetryFrame::sensor_data(device_id, reading.sanitize());
        let mut state = self.state();
        let Some(members) = state.groups.get(device_id) else {
            tracing::trace!(%device_id, "no subscribers, reading dropped");
            return 0;
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for connection_id in members {
            let Some(connection) = state.connections.get(connection_id) else {
                closed.push(*connection_id);
                continue;
            };
            match connection.sender.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::debug!(
                        %connection_id,
                        %device_id,
                        "subscriber lagging, frame dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*connection_id),
            }
        }
        for connection_id in closed {
            state.remove_connection(connection_id);
        }
        delivered
    }

    /// Drop connections whose receiving side is gone and delete the groups
    /// they leave empty. Returns the number of connections removed.
    pub fn reap_idle(&self) -> usize {
        let mut state = self.state();
        let closed: Vec<ConnectionId> = state
            .connections
            .iter()
            .filter(|(_, connection)| connection.sender.is_closed())
            .map(|(id, _)| *id)
            .collect();
        for connection_id in &closed {
            state.remove_connection(*connection_id);
        }
        let orphans: Vec<ConnectionId> = state
            .groups
            .values()
            .flatten()
            .filter(|id| !state.connections.contains_key(*id))
            .copied()
            .collect();
        for connection_id in orphans {
            state.remove_connection(connection_id);
        }
        closed.len()
    }

    /// Periodically run [`reap_idle`](Self::reap_idle). Never returns.
    pub async fn reaper_task(self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let reaped = self.reap_idle();
            if reaped > 0 {
                tracing::debug!(reaped, "reaped idle telemetry connections");
            }
        }
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.state().groups.len()
    }

    #[must_use]
    pub fn subscriber_count(&self, device_id: &DeviceId) -> usize {
        self.state().groups.get(device_id).map_or(0, HashSet::len)
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.state().connections.len()
    }
}
