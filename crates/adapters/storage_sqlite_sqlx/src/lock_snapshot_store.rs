//! `SQLite` implementation of [`LockSnapshotStore`].
//!
//! Status snapshots and door logs are append-only. Rows get a random id so
//! two pushes carrying the same timestamp never collide; `rowid` breaks ties
//! in favour of the later insert.

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};
use uuid::Uuid;

use homelink_app::ports::LockSnapshotStore;
use homelink_domain::error::HomeLinkError;
use homelink_domain::id::DeviceId;
use homelink_domain::lock::{DoorLogEntry, LockStatusSnapshot};
use homelink_domain::time::{Timestamp, to_sortable};

use crate::error::StorageError;

fn parse_timestamp(row: &SqliteRow) -> Result<Timestamp, sqlx::Error> {
    let raw: String = row.try_get("timestamp")?;
    chrono::DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.to_utc())
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

fn parse_device_id(row: &SqliteRow) -> Result<DeviceId, sqlx::Error> {
    let raw: String = row.try_get("device_id")?;
    DeviceId::parse(raw).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

struct StatusWrapper(LockStatusSnapshot);

impl<'r> FromRow<'r, SqliteRow> for StatusWrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let failed_attempts: i64 = row.try_get("failed_attempts")?;
        let failed_attempts =
            u32::try_from(failed_attempts).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(LockStatusSnapshot {
            device_id: parse_device_id(row)?,
            locked: row.try_get("locked")?,
            failed_attempts,
            timestamp: parse_timestamp(row)?,
        }))
    }
}

struct LogWrapper(DoorLogEntry);

impl<'r> FromRow<'r, SqliteRow> for LogWrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self(DoorLogEntry {
            device_id: parse_device_id(row)?,
            event: row.try_get("event")?,
            status: row.try_get("status")?,
            timestamp: parse_timestamp(row)?,
        }))
    }
}

const INSERT_STATUS: &str = r"
    INSERT INTO lock_status_snapshots (id, device_id, locked, failed_attempts, timestamp)
    VALUES (?, ?, ?, ?, ?)
";
const SELECT_LATEST_STATUS: &str = r"
    SELECT * FROM lock_status_snapshots
    WHERE device_id = ?
    ORDER BY timestamp DESC, rowid DESC
    LIMIT 1
";
const INSERT_LOG: &str = r"
    INSERT INTO door_logs (id, device_id, event, status, timestamp)
    VALUES (?, ?, ?, ?, ?)
";
// A negative LIMIT means no limit in SQLite.
const SELECT_RECENT_LOGS: &str = r"
    SELECT * FROM door_logs
    WHERE device_id = ?
    ORDER BY timestamp DESC, rowid DESC
    LIMIT ?
";

/// `SQLite`-backed store of smart-lock pushes.
pub struct SqliteLockSnapshotStore {
    pool: SqlitePool,
}

impl SqliteLockSnapshotStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl LockSnapshotStore for SqliteLockSnapshotStore {
    fn record_status(
        &self,
        snapshot: LockStatusSnapshot,
    ) -> impl Future<Output = Result<(), HomeLinkError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(INSERT_STATUS)
                .bind(Uuid::new_v4())
                .bind(snapshot.device_id.as_str())
                .bind(snapshot.locked)
                .bind(i64::from(snapshot.failed_attempts))
                .bind(to_sortable(snapshot.timestamp))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }

    fn latest_status(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Option<LockStatusSnapshot>, HomeLinkError>> + Send {
        let pool = self.pool.clone();
        let device_id = device_id.to_string();
        async move {
            let row: Option<StatusWrapper> = sqlx::query_as(SELECT_LATEST_STATUS)
                .bind(device_id)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|w| w.0))
        }
    }

    fn append_log(
        &self,
        entry: DoorLogEntry,
    ) -> impl Future<Output = Result<(), HomeLinkError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(INSERT_LOG)
                .bind(Uuid::new_v4())
                .bind(entry.device_id.as_str())
                .bind(&entry.event)
                .bind(&entry.status)
                .bind(to_sortable(entry.timestamp))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }

    fn recent_logs(
        &self,
        device_id: &DeviceId,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<Vec<DoorLogEntry>, HomeLinkError>> + Send {
        let pool = self.pool.clone();
        let device_id = device_id.to_string();
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        async move {
            let rows: Vec<LogWrapper> = sqlx::query_as(SELECT_RECENT_LOGS)
                .bind(device_id)
                .bind(limit)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }
}
