//! In-process store used by tests and by the server when no database is configured

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{PreferenceStore, ReadingStore, RecordStore, StorageError};
use crate::data::{
    AlertPreference, DeviceHeartbeat, NewDeviceHeartbeat, NewPumpRunTime, NewTemperatureReading,
    PumpRunTime, TemperatureReading,
};

/// Monotonic id allocator mirroring a SERIAL column
#[derive(Debug, Default)]
struct Sequence(i32);

impl Sequence {
    fn next(&mut self) -> i32 {
        self.0 += 1;
        self.0
    }
}

#[derive(Debug, Default)]
struct Tables {
    temperatures: Vec<TemperatureReading>,
    temperature_ids: Sequence,
    pump_runs: Vec<PumpRunTime>,
    pump_run_ids: Sequence,
    critical_runs: Vec<PumpRunTime>,
    critical_ids: Sequence,
    heartbeats: Vec<DeviceHeartbeat>,
    heartbeat_ids: Sequence,
    preferences: Vec<AlertPreference>,
}

/// Unbounded in-memory implementation of every store trait
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preferences(preferences: Vec<AlertPreference>) -> Self {
        let store = Self::new();
        store.tables.write().preferences = preferences;
        store
    }

    pub fn add_preference(&self, preference: AlertPreference) {
        self.tables.write().preferences.push(preference);
    }

    /// Remove all readings, runs and heartbeats, keeping preferences
    pub fn clear_readings(&self) {
        let mut tables = self.tables.write();
        tables.temperatures.clear();
        tables.pump_runs.clear();
        tables.critical_runs.clear();
        tables.heartbeats.clear();
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn pump_runs_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<PumpRunTime>, StorageError> {
        let tables = self.tables.read();
        let mut runs: Vec<PumpRunTime> = tables
            .pump_runs
            .iter()
            .filter(|r| r.timestamp > since)
            .cloned()
            .collect();
        runs.sort_by_key(|r| (r.timestamp, r.id));
        Ok(runs)
    }

    async fn latest_temperature(
        &self,
        location: &str,
        since: DateTime<Utc>,
        above: Option<f64>,
    ) -> Result<Option<TemperatureReading>, StorageError> {
        let tables = self.tables.read();
        Ok(tables
            .temperatures
            .iter()
            .filter(|r| r.location == location && r.timestamp > since)
            .filter(|r| above.map_or(true, |threshold| r.value > threshold))
            .max_by_key(|r| (r.timestamp, r.id))
            .cloned())
    }

    async fn count_pump_heartbeats(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let tables = self.tables.read();
        Ok(tables
            .heartbeats
            .iter()
            .filter(|h| h.pump && h.timestamp > cutoff)
            .count() as u64)
    }

    async fn count_temperatures(
        &self,
        location: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let tables = self.tables.read();
        Ok(tables
            .temperatures
            .iter()
            .filter(|r| r.location == location && r.timestamp > cutoff)
            .count() as u64)
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn load_preferences(&self) -> Result<Vec<AlertPreference>, StorageError> {
        Ok(self.tables.read().preferences.clone())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_temperature(
        &self,
        reading: NewTemperatureReading,
    ) -> Result<TemperatureReading, StorageError> {
        reading.validate().map_err(StorageError::Invalid)?;

        let mut tables = self.tables.write();
        let stored = TemperatureReading {
            id: tables.temperature_ids.next(),
            value: reading.value,
            location: reading.location,
            timestamp: reading.timestamp.unwrap_or_else(Utc::now),
        };
        tables.temperatures.push(stored.clone());
        Ok(stored)
    }

    async fn list_temperatures(
        &self,
        location: Option<&str>,
    ) -> Result<Vec<TemperatureReading>, StorageError> {
        let tables = self.tables.read();
        Ok(tables
            .temperatures
            .iter()
            .filter(|r| location.map_or(true, |l| r.location == l))
            .cloned()
            .collect())
    }

    async fn get_temperature(&self, id: i32) -> Result<Option<TemperatureReading>, StorageError> {
        let tables = self.tables.read();
        Ok(tables.temperatures.iter().find(|r| r.id == id).cloned())
    }

    async fn delete_temperature(&self, id: i32) -> Result<bool, StorageError> {
        let mut tables = self.tables.write();
        let before = tables.temperatures.len();
        tables.temperatures.retain(|r| r.id != id);
        Ok(tables.temperatures.len() < before)
    }

    async fn insert_pump_run(&self, run: NewPumpRunTime) -> Result<PumpRunTime, StorageError> {
        run.validate().map_err(StorageError::Invalid)?;

        let mut tables = self.tables.write();
        let timestamp = run.timestamp.unwrap_or_else(Utc::now);
        let stored = PumpRunTime {
            id: tables.pump_run_ids.next(),
            run_time: run.run_time,
            current: run.current,
            low_current: run.low_current,
            timestamp,
        };
        tables.pump_runs.push(stored.clone());

        if stored.low_current {
            let critical = PumpRunTime {
                id: tables.critical_ids.next(),
                ..stored.clone()
            };
            tables.critical_runs.push(critical);
        }

        Ok(stored)
    }

    async fn list_pump_runs(&self) -> Result<Vec<PumpRunTime>, StorageError> {
        Ok(self.tables.read().pump_runs.clone())
    }

    async fn get_pump_run(&self, id: i32) -> Result<Option<PumpRunTime>, StorageError> {
        let tables = self.tables.read();
        Ok(tables.pump_runs.iter().find(|r| r.id == id).cloned())
    }

    async fn delete_pump_run(&self, id: i32) -> Result<bool, StorageError> {
        let mut tables = self.tables.write();
        let before = tables.pump_runs.len();
        tables.pump_runs.retain(|r| r.id != id);
        Ok(tables.pump_runs.len() < before)
    }

    async fn list_critical_pump_runs(&self) -> Result<Vec<PumpRunTime>, StorageError> {
        let mut runs = self.tables.read().critical_runs.clone();
        runs.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
        Ok(runs)
    }

    async fn insert_heartbeat(
        &self,
        heartbeat: NewDeviceHeartbeat,
    ) -> Result<DeviceHeartbeat, StorageError> {
        let heartbeat = heartbeat.normalize().map_err(StorageError::Invalid)?;

        let mut tables = self.tables.write();
        let stored = DeviceHeartbeat {
            id: tables.heartbeat_ids.next(),
            device_id: heartbeat.device_id,
            pump: heartbeat.pump,
            timestamp: heartbeat.timestamp.unwrap_or_else(Utc::now),
        };
        tables.heartbeats.push(stored.clone());
        Ok(stored)
    }
}
