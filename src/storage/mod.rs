//! Reading and preference storage
//!
//! The evaluation core only reads through [`ReadingStore`] and
//! [`PreferenceStore`]; the HTTP API writes through [`RecordStore`].

pub mod memory;
pub mod postgres;
pub mod schema;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::data::{
    AlertPreference, DeviceHeartbeat, NewDeviceHeartbeat, NewPumpRunTime, NewTemperatureReading,
    PumpRunTime, TemperatureReading,
};

pub use memory::MemoryStore;
pub use postgres::{connect, PgPreferenceStore, PgStore};
pub use schema::ensure_schema;

/// Windowed read queries used by the evaluators.
///
/// All windows are exclusive of their lower bound: a row counts only when
/// its timestamp is strictly after `since`/`cutoff`.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Pump runs after `since`, oldest first (ties by insertion order)
    async fn pump_runs_since(&self, since: DateTime<Utc>)
        -> Result<Vec<PumpRunTime>, StorageError>;

    /// Most recent temperature for `location` after `since`, optionally only
    /// among readings strictly above `above`. Timestamp ties go to the most
    /// recently inserted row.
    async fn latest_temperature(
        &self,
        location: &str,
        since: DateTime<Utc>,
        above: Option<f64>,
    ) -> Result<Option<TemperatureReading>, StorageError>;

    /// Number of pump heartbeats after `cutoff`
    async fn count_pump_heartbeats(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError>;

    /// Number of temperature readings for `location` after `cutoff`
    async fn count_temperatures(
        &self,
        location: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn load_preferences(&self) -> Result<Vec<AlertPreference>, StorageError>;
}

/// Record-level access backing the CRUD API
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_temperature(
        &self,
        reading: NewTemperatureReading,
    ) -> Result<TemperatureReading, StorageError>;

    async fn list_temperatures(
        &self,
        location: Option<&str>,
    ) -> Result<Vec<TemperatureReading>, StorageError>;

    async fn get_temperature(&self, id: i32) -> Result<Option<TemperatureReading>, StorageError>;

    /// Returns false when no row had that id
    async fn delete_temperature(&self, id: i32) -> Result<bool, StorageError>;

    /// Inserts a pump run; low-current runs are also copied to the critical table
    async fn insert_pump_run(&self, run: NewPumpRunTime) -> Result<PumpRunTime, StorageError>;

    async fn list_pump_runs(&self) -> Result<Vec<PumpRunTime>, StorageError>;

    async fn get_pump_run(&self, id: i32) -> Result<Option<PumpRunTime>, StorageError>;

    async fn delete_pump_run(&self, id: i32) -> Result<bool, StorageError>;

    /// Critical (low-current) pump runs, newest first
    async fn list_critical_pump_runs(&self) -> Result<Vec<PumpRunTime>, StorageError>;

    async fn insert_heartbeat(
        &self,
        heartbeat: NewDeviceHeartbeat,
    ) -> Result<DeviceHeartbeat, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid record: {0}")]
    Invalid(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
