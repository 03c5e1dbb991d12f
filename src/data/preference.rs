//! Per-location alert configuration

use serde::{Deserialize, Serialize};

/// Alert preference row as stored by the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AlertPreference {
    /// Monitored location, e.g. "freezer" or "wellpump"
    pub location: String,
    pub enabled: bool,
    /// Trigger threshold (°F for temperature, amps for the pump)
    pub threshold: f64,
    /// Minutes without a signal before the device counts as offline
    pub offline_threshold_minutes: Option<f64>,
    /// Gotify application token of the owning user
    pub notify_token: Option<String>,
}

impl AlertPreference {
    pub fn new(location: impl Into<String>, threshold: f64) -> Self {
        Self {
            location: location.into(),
            enabled: true,
            threshold,
            offline_threshold_minutes: None,
            notify_token: None,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_offline_threshold(mut self, minutes: f64) -> Self {
        self.offline_threshold_minutes = Some(minutes);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.notify_token = Some(token.into());
        self
    }
}

/// Which evaluator branch a location goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationClass {
    Pump,
    Temperature,
}

impl LocationClass {
    pub fn classify(location: &str, pump_locations: &[String]) -> Self {
        if pump_locations.iter().any(|p| p == location) {
            LocationClass::Pump
        } else {
            LocationClass::Temperature
        }
    }
}

impl std::fmt::Display for LocationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationClass::Pump => write!(f, "pump"),
            LocationClass::Temperature => write!(f, "temperature"),
        }
    }
}

/// Everything an evaluation pass knows about one location.
///
/// Built once per pass from the location's preference and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationContext {
    pub location: String,
    pub class: LocationClass,
    pub enabled: bool,
    pub threshold: f64,
    pub offline_threshold_minutes: Option<f64>,
    #[serde(skip)]
    notify_token: String,
}

impl LocationContext {
    pub fn new(preference: &AlertPreference, pump_locations: &[String]) -> Self {
        Self {
            location: preference.location.clone(),
            class: LocationClass::classify(&preference.location, pump_locations),
            enabled: preference.enabled,
            threshold: preference.threshold,
            offline_threshold_minutes: preference.offline_threshold_minutes,
            notify_token: preference.notify_token.clone().unwrap_or_default(),
        }
    }

    /// Notification token, `None` when missing or blank
    pub fn token(&self) -> Option<&str> {
        let token = self.notify_token.trim();
        if token.is_empty() {
            None
        } else {
            Some(token)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pumps() -> Vec<String> {
        vec!["wellpump".to_string()]
    }

    #[test]
    fn test_classify() {
        assert_eq!(LocationClass::classify("wellpump", &pumps()), LocationClass::Pump);
        assert_eq!(
            LocationClass::classify("freezer", &pumps()),
            LocationClass::Temperature
        );
        assert_eq!(
            LocationClass::classify("wellpump", &[]),
            LocationClass::Temperature
        );
    }

    #[test]
    fn test_context_token() {
        let pref = AlertPreference::new("freezer", 10.0);
        assert_eq!(LocationContext::new(&pref, &pumps()).token(), None);

        let pref = pref.with_token("  ");
        assert_eq!(LocationContext::new(&pref, &pumps()).token(), None);

        let pref = AlertPreference::new("freezer", 10.0).with_token("AbC123");
        let ctx = LocationContext::new(&pref, &pumps());
        assert_eq!(ctx.token(), Some("AbC123"));
        assert_eq!(ctx.class, LocationClass::Temperature);
        assert!(ctx.enabled);
    }
}
