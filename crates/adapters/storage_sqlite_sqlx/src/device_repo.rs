//! `SQLite` implementation of [`DeviceRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use homelink_app::ports::DeviceRepository;
use homelink_domain::device::{Device, DeviceState, DeviceType};
use homelink_domain::error::HomeLinkError;
use homelink_domain::id::{DeviceId, HomeId};
use homelink_domain::time::to_sortable;

use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`Device`].
struct Wrapper(Device);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Device> {
        value.map(|w| w.0)
    }
}

fn decode<E: std::error::Error + Send + Sync + 'static>(err: E) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let device_id: String = row.try_get("device_id")?;
        let name: String = row.try_get("name")?;
        let home_id: String = row.try_get("home_id")?;
        let device_type: String = row.try_get("device_type")?;
        let state: String = row.try_get("state")?;
        let last_connected: Option<String> = row.try_get("last_connected")?;

        let device_id = DeviceId::parse(device_id).map_err(decode)?;
        let home_id = HomeId::from_str(&home_id).map_err(decode)?;
        let state = DeviceState::from_name(&state).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown device state {state:?}").into())
        })?;
        let last_connected = last_connected
            .map(|ts| chrono::DateTime::parse_from_rfc3339(&ts).map(|ts| ts.to_utc()))
            .transpose()
            .map_err(decode)?;

        Ok(Self(Device {
            device_id,
            name,
            home_id,
            device_type: DeviceType::from_name(&device_type),
            state,
            last_connected,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO devices (device_id, name, home_id, device_type, state, last_connected)
    VALUES (?, ?, ?, ?, ?, ?)
";
const SELECT_BY_ID: &str = "SELECT * FROM devices WHERE device_id = ?";
const UPDATE: &str = r"
    UPDATE devices
    SET name = ?, home_id = ?, device_type = ?, state = ?, last_connected = ?
    WHERE device_id = ?
";

/// `SQLite`-backed device repository.
pub struct SqliteDeviceRepository {
    pool: SqlitePool,
}

impl SqliteDeviceRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl DeviceRepository for SqliteDeviceRepository {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, HomeLinkError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(INSERT)
                .bind(device.device_id.as_str())
                .bind(&device.name)
                .bind(device.home_id.to_string())
                .bind(device.device_type.as_str())
                .bind(device.state.as_str())
                .bind(device.last_connected.map(to_sortable))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(device)
        }
    }

    fn get_by_id(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, HomeLinkError>> + Send {
        let pool = self.pool.clone();
        let id = id.to_string();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn update(&self, device: Device) -> impl Future<Output = Result<Device, HomeLinkError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(UPDATE)
                .bind(&device.name)
                .bind(device.home_id.to_string())
                .bind(device.device_type.as_str())
                .bind(device.state.as_str())
                .bind(device.last_connected.map(to_sortable))
                .bind(device.device_id.as_str())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(device)
        }
    }
}
