use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device id that always reports as a pump heartbeat
pub const PUMP_DEVICE_ID: &str = "pump";

/// A single value at a point in time, independent of sensor kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    pub fn new(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self { value, timestamp }
    }
}

/// Stored temperature reading (degrees Fahrenheit)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TemperatureReading {
    pub id: i32,
    pub value: f64,
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&TemperatureReading> for Sample {
    fn from(reading: &TemperatureReading) -> Self {
        Sample::new(reading.value, reading.timestamp)
    }
}

/// Temperature reading as submitted by a sensor
#[derive(Debug, Clone, Deserialize)]
pub struct NewTemperatureReading {
    pub value: f64,
    pub location: String,
    /// Defaults to the time of insertion
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewTemperatureReading {
    pub fn new(value: f64, location: impl Into<String>) -> Self {
        Self {
            value,
            location: location.into(),
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.location.trim().is_empty() {
            return Err("Location is required".to_string());
        }
        if !self.value.is_finite() {
            return Err(format!("Invalid temperature value: {}", self.value));
        }
        Ok(())
    }
}

/// Stored pump run: how long the pump ran and the current it drew (amps)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PumpRunTime {
    pub id: i32,
    /// Run time in seconds
    pub run_time: i32,
    pub current: f64,
    pub low_current: bool,
    pub timestamp: DateTime<Utc>,
}

impl From<&PumpRunTime> for Sample {
    fn from(run: &PumpRunTime) -> Self {
        Sample::new(run.current, run.timestamp)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPumpRunTime {
    pub run_time: i32,
    pub current: f64,
    #[serde(default)]
    pub low_current: bool,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewPumpRunTime {
    pub fn new(run_time: i32, current: f64) -> Self {
        Self {
            run_time,
            current,
            low_current: false,
            timestamp: None,
        }
    }

    pub fn low_current(mut self, low_current: bool) -> Self {
        self.low_current = low_current;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.run_time < 0 {
            return Err(format!("Invalid run time: {}", self.run_time));
        }
        if !self.current.is_finite() {
            return Err(format!("Invalid current: {}", self.current));
        }
        Ok(())
    }
}

/// Stored liveness signal from a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeviceHeartbeat {
    pub id: i32,
    pub device_id: String,
    pub pump: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDeviceHeartbeat {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub pump: bool,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewDeviceHeartbeat {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            pump: false,
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Validate the heartbeat and apply the pump device-id rule.
    ///
    /// The well pump's controller reports as `"pump"` without setting the
    /// flag, so that id is always classed as a pump heartbeat.
    pub fn normalize(mut self) -> Result<Self, String> {
        if self.device_id.trim().is_empty() {
            return Err("Device ID is required".to_string());
        }
        if self.device_id == PUMP_DEVICE_ID {
            self.pump = true;
        }
        Ok(self)
    }
}
