//! Postgres/TimescaleDB backed stores
//!
//! `REAL` columns are cast to `float8` on the way out so rows decode
//! straight into `f64` fields.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{PreferenceStore, ReadingStore, RecordStore, StorageError};
use crate::data::{
    AlertPreference, DeviceHeartbeat, NewDeviceHeartbeat, NewPumpRunTime, NewTemperatureReading,
    PumpRunTime, TemperatureReading,
};

const TEMPERATURE_COLUMNS: &str = "id, value::float8 AS value, location, timestamp";

const PUMP_RUN_COLUMNS: &str = "id, run_time, current::float8 AS current, low_current, timestamp";

const HEARTBEAT_COLUMNS: &str = "id, device_id, pump, timestamp";

/// Create a connection pool from a database URL.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StorageError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Reading store over the sensor database
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn pump_runs_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<PumpRunTime>, StorageError> {
        let query = format!(
            "SELECT {PUMP_RUN_COLUMNS} FROM pump_run_times \
             WHERE timestamp > $1 \
             ORDER BY timestamp ASC, id ASC"
        );
        let runs = sqlx::query_as::<_, PumpRunTime>(&query)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;
        Ok(runs)
    }

    async fn latest_temperature(
        &self,
        location: &str,
        since: DateTime<Utc>,
        above: Option<f64>,
    ) -> Result<Option<TemperatureReading>, StorageError> {
        let query = format!(
            "SELECT {TEMPERATURE_COLUMNS} FROM temperatures \
             WHERE location = $1 AND timestamp > $2 \
               AND ($3::float8 IS NULL OR value > $3::float8) \
             ORDER BY timestamp DESC, id DESC \
             LIMIT 1"
        );
        let reading = sqlx::query_as::<_, TemperatureReading>(&query)
            .bind(location)
            .bind(since)
            .bind(above)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reading)
    }

    async fn count_pump_heartbeats(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM device_heartbeats WHERE pump = true AND timestamp > $1",
        )
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn count_temperatures(
        &self,
        location: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM temperatures WHERE location = $1 AND timestamp > $2",
        )
        .bind(location)
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn insert_temperature(
        &self,
        reading: NewTemperatureReading,
    ) -> Result<TemperatureReading, StorageError> {
        reading.validate().map_err(StorageError::Invalid)?;

        let query = format!(
            "INSERT INTO temperatures (value, location, timestamp) \
             VALUES ($1, $2, COALESCE($3, NOW())) \
             RETURNING {TEMPERATURE_COLUMNS}"
        );
        let stored = sqlx::query_as::<_, TemperatureReading>(&query)
            .bind(reading.value)
            .bind(&reading.location)
            .bind(reading.timestamp)
            .fetch_one(&self.pool)
            .await?;
        Ok(stored)
    }

    async fn list_temperatures(
        &self,
        location: Option<&str>,
    ) -> Result<Vec<TemperatureReading>, StorageError> {
        let query = format!(
            "SELECT {TEMPERATURE_COLUMNS} FROM temperatures \
             WHERE ($1::text IS NULL OR location = $1) \
             ORDER BY timestamp ASC, id ASC"
        );
        let readings = sqlx::query_as::<_, TemperatureReading>(&query)
            .bind(location)
            .fetch_all(&self.pool)
            .await?;
        Ok(readings)
    }

    async fn get_temperature(&self, id: i32) -> Result<Option<TemperatureReading>, StorageError> {
        let query = format!("SELECT {TEMPERATURE_COLUMNS} FROM temperatures WHERE id = $1");
        let reading = sqlx::query_as::<_, TemperatureReading>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(reading)
    }

    async fn delete_temperature(&self, id: i32) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM temperatures WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_pump_run(&self, run: NewPumpRunTime) -> Result<PumpRunTime, StorageError> {
        run.validate().map_err(StorageError::Invalid)?;

        let query = format!(
            "INSERT INTO pump_run_times (run_time, current, low_current, timestamp) \
             VALUES ($1, $2, $3, COALESCE($4, NOW())) \
             RETURNING {PUMP_RUN_COLUMNS}"
        );
        let stored = sqlx::query_as::<_, PumpRunTime>(&query)
            .bind(run.run_time)
            .bind(run.current)
            .bind(run.low_current)
            .bind(run.timestamp)
            .fetch_one(&self.pool)
            .await?;

        if stored.low_current {
            // The reading itself is already stored; a failed copy is only logged.
            let copied = sqlx::query(
                "INSERT INTO pump_run_times_critical (run_time, current, low_current, timestamp) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(stored.run_time)
            .bind(stored.current)
            .bind(stored.low_current)
            .bind(stored.timestamp)
            .execute(&self.pool)
            .await;

            if let Err(e) = copied {
                tracing::warn!(run_id = stored.id, error = %e, "Failed to record critical pump run");
            }
        }

        Ok(stored)
    }

    async fn list_pump_runs(&self) -> Result<Vec<PumpRunTime>, StorageError> {
        let query =
            format!("SELECT {PUMP_RUN_COLUMNS} FROM pump_run_times ORDER BY timestamp ASC, id ASC");
        let runs = sqlx::query_as::<_, PumpRunTime>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(runs)
    }

    async fn get_pump_run(&self, id: i32) -> Result<Option<PumpRunTime>, StorageError> {
        let query = format!("SELECT {PUMP_RUN_COLUMNS} FROM pump_run_times WHERE id = $1");
        let run = sqlx::query_as::<_, PumpRunTime>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(run)
    }

    async fn delete_pump_run(&self, id: i32) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM pump_run_times WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_critical_pump_runs(&self) -> Result<Vec<PumpRunTime>, StorageError> {
        let query = format!(
            "SELECT {PUMP_RUN_COLUMNS} FROM pump_run_times_critical \
             ORDER BY timestamp DESC, id DESC"
        );
        let runs = sqlx::query_as::<_, PumpRunTime>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(runs)
    }

    async fn insert_heartbeat(
        &self,
        heartbeat: NewDeviceHeartbeat,
    ) -> Result<DeviceHeartbeat, StorageError> {
        let heartbeat = heartbeat.normalize().map_err(StorageError::Invalid)?;

        let query = format!(
            "INSERT INTO device_heartbeats (device_id, pump, timestamp) \
             VALUES ($1, $2, COALESCE($3, NOW())) \
             RETURNING {HEARTBEAT_COLUMNS}"
        );
        let stored = sqlx::query_as::<_, DeviceHeartbeat>(&query)
            .bind(&heartbeat.device_id)
            .bind(heartbeat.pump)
            .bind(heartbeat.timestamp)
            .fetch_one(&self.pool)
            .await?;
        Ok(stored)
    }
}

/// Preference store over the dashboard database.
///
/// Each row joins a user's Gotify token onto one of their alert preferences.
#[derive(Debug, Clone)]
pub struct PgPreferenceStore {
    pool: PgPool,
}

impl PgPreferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceStore for PgPreferenceStore {
    async fn load_preferences(&self) -> Result<Vec<AlertPreference>, StorageError> {
        let preferences = sqlx::query_as::<_, AlertPreference>(
            r#"SELECT
                 "AlertPreference".location AS location,
                 "AlertPreference".enabled AS enabled,
                 "AlertPreference".threshold::float8 AS threshold,
                 "AlertPreference"."offlineThreshold"::float8 AS offline_threshold_minutes,
                 "User"."gotifyToken" AS notify_token
               FROM "User"
               JOIN "AlertPreference" ON "AlertPreference"."userId" = "User".id
               ORDER BY "AlertPreference".location"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(preferences)
    }
}
