//! Alert pass configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{self, ConfigError};

/// Default lookback for both pump and temperature evaluation
pub const DEFAULT_WINDOW_MINUTES: i64 = 120;

/// Location evaluated with the pump algorithm unless configured otherwise
pub const DEFAULT_PUMP_LOCATION: &str = "wellpump";

/// Inputs of a single evaluation pass besides the current time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassConfig {
    /// Lookback for pump current samples
    #[serde(with = "minutes_serde")]
    pub pump_window: chrono::Duration,
    /// Lookback for temperature exceedance
    #[serde(with = "minutes_serde")]
    pub temperature_window: chrono::Duration,
    /// Locations evaluated as pumps; all others are temperature locations
    pub pump_locations: Vec<String>,
    /// Dashboard link appended to every notification body
    pub details_url: String,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            pump_window: chrono::Duration::minutes(DEFAULT_WINDOW_MINUTES),
            temperature_window: chrono::Duration::minutes(DEFAULT_WINDOW_MINUTES),
            pump_locations: vec![DEFAULT_PUMP_LOCATION.to_string()],
            details_url: String::new(),
        }
    }
}

impl PassConfig {
    pub fn with_pump_window(mut self, window: chrono::Duration) -> Self {
        self.pump_window = window;
        self
    }

    pub fn with_temperature_window(mut self, window: chrono::Duration) -> Self {
        self.temperature_window = window;
        self
    }

    pub fn with_details_url(mut self, url: impl Into<String>) -> Self {
        self.details_url = url.into();
        self
    }

    /// Create a pass config from environment variables
    /// PUMP_WINDOW_MINUTES=120
    /// TEMPERATURE_WINDOW_MINUTES=120
    /// PUMP_LOCATIONS=wellpump
    /// HOMEIOTA_URL=https://dashboard.example
    pub fn from_env() -> Result<Self, ConfigError> {
        let pump_minutes = config::parse_or("PUMP_WINDOW_MINUTES", DEFAULT_WINDOW_MINUTES)?;
        let temperature_minutes =
            config::parse_or("TEMPERATURE_WINDOW_MINUTES", DEFAULT_WINDOW_MINUTES)?;

        Ok(Self {
            pump_window: chrono::Duration::minutes(pump_minutes),
            temperature_window: chrono::Duration::minutes(temperature_minutes),
            pump_locations: config::list_or("PUMP_LOCATIONS", &[DEFAULT_PUMP_LOCATION]),
            details_url: config::optional("HOMEIOTA_URL").unwrap_or_default(),
        })
    }
}

/// Process-level settings of the alert pass binary
#[derive(Debug, Clone)]
pub struct AlertServiceConfig {
    /// Sensor database (readings, runs, heartbeats)
    pub readings_db_url: String,
    /// Dashboard database (users and alert preferences)
    pub preferences_db_url: String,
    /// Gotify server base URL; notifications are only logged when unset
    pub gotify_url: Option<String>,
    pub notify_timeout: Duration,
    pub pass: PassConfig,
}

impl AlertServiceConfig {
    /// GOHOME_DB_URL=postgres://...
    /// HOMEIOTA_DB_URL=postgres://...   (defaults to GOHOME_DB_URL)
    /// GOTIFY_URL=https://gotify.example
    /// GOTIFY_TIMEOUT_SECS=10
    pub fn from_env() -> Result<Self, ConfigError> {
        let readings_db_url = config::required("GOHOME_DB_URL")?;
        let preferences_db_url =
            config::optional("HOMEIOTA_DB_URL").unwrap_or_else(|| readings_db_url.clone());
        let timeout_secs: u64 = config::parse_or("GOTIFY_TIMEOUT_SECS", 10)?;

        Ok(Self {
            readings_db_url,
            preferences_db_url,
            gotify_url: config::optional("GOTIFY_URL"),
            notify_timeout: Duration::from_secs(timeout_secs),
            pass: PassConfig::from_env()?,
        })
    }
}

/// Kinds of notification a location can receive in one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// No heartbeat or reading inside the offline window
    Offline,
    /// Sustained temperature exceedance
    Temperature,
    /// Pump drawing current in the fault band
    Pump,
}

impl AlertKind {
    /// Dispatch order within a location
    pub const ALL: [AlertKind; 3] = [AlertKind::Offline, AlertKind::Temperature, AlertKind::Pump];

    /// Gotify message priority
    pub fn priority(&self) -> u8 {
        match self {
            AlertKind::Offline => 7,
            AlertKind::Temperature => 10,
            AlertKind::Pump => 7,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AlertKind::Offline => "Device Offline",
            AlertKind::Temperature => "Temperature Alert",
            AlertKind::Pump => "Pump Alert",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for AlertKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offline" => Ok(AlertKind::Offline),
            "temperature" => Ok(AlertKind::Temperature),
            "pump" => Ok(AlertKind::Pump),
            other => Err(format!(
                "Unknown alert kind {:?} (expected offline, temperature or pump)",
                other
            )),
        }
    }
}

/// Serializes a window as whole minutes
mod minutes_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &chrono::Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_minutes())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<chrono::Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let minutes = i64::deserialize(deserializer)?;
        Ok(chrono::Duration::minutes(minutes))
    }
}
