//! Per-location outcome of an evaluation pass

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::data::Sample;

/// Result of the threshold evaluators for one location
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThresholdOutcome {
    /// Whether the location's alert rule is met
    pub has_exceedance: bool,
    /// Pump: most recent qualifying sample. Temperature: most recent sample above threshold.
    pub exceedance: Option<Sample>,
    /// Temperature only: most recent sample in the window
    pub latest: Option<Sample>,
    /// Temperature only: time from the exceedance sample to the latest sample
    #[serde(skip)]
    pub sustained_for: Option<chrono::Duration>,
    /// Pump only: number of samples that passed the fault-band filter
    pub qualifying_rows: usize,
}

impl ThresholdOutcome {
    /// Outcome used when the window is empty or the store failed
    pub fn no_data() -> Self {
        Self::default()
    }
}

/// Everything decided about one location, computed fresh each pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationResult {
    #[serde(flatten)]
    pub threshold: ThresholdOutcome,
    pub is_live: bool,
}

impl EvaluationResult {
    pub fn new(threshold: ThresholdOutcome, is_live: bool) -> Self {
        Self { threshold, is_live }
    }

    pub fn has_exceedance(&self) -> bool {
        self.threshold.has_exceedance
    }

    pub fn exceedance_value(&self) -> Option<f64> {
        self.threshold.exceedance.map(|s| s.value)
    }

    pub fn exceedance_timestamp(&self) -> Option<DateTime<Utc>> {
        self.threshold.exceedance.map(|s| s.timestamp)
    }

    pub fn latest_value(&self) -> Option<f64> {
        self.threshold.latest.map(|s| s.value)
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.threshold.latest.map(|s| s.timestamp)
    }

    pub fn sustained_for(&self) -> Option<chrono::Duration> {
        self.threshold.sustained_for
    }
}
