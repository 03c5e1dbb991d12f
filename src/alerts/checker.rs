//! Evaluation pass over every configured location

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::config::{AlertKind, PassConfig};
use super::dispatcher::{AlertDispatcher, DispatchOutcome, DispatchRecord};
use super::evaluation::{EvaluationResult, ThresholdOutcome};
use super::liveness;
use super::notifier::NotificationSink;
use super::threshold;
use crate::data::{AlertPreference, LocationContext};
use crate::storage::{PreferenceStore, ReadingStore, StorageError};

/// Runs one evaluation pass at a time against the configured stores
pub struct AlertChecker {
    readings: Arc<dyn ReadingStore>,
    preferences: Arc<dyn PreferenceStore>,
    dispatcher: AlertDispatcher,
    config: PassConfig,
}

/// Evaluation of a single location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationEvaluation {
    pub context: LocationContext,
    pub result: EvaluationResult,
}

/// Everything a pass decided and sent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub evaluations: Vec<LocationEvaluation>,
    pub dispatched: Vec<DispatchRecord>,
}

impl PassReport {
    pub fn evaluation(&self, location: &str) -> Option<&LocationEvaluation> {
        self.evaluations
            .iter()
            .find(|e| e.context.location == location)
    }

    /// Count of alerts accepted by the sink
    pub fn sent(&self) -> usize {
        self.dispatched
            .iter()
            .filter(|r| matches!(r.outcome, DispatchOutcome::Sent { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.dispatched
            .iter()
            .filter(|r| matches!(r.outcome, DispatchOutcome::Failed { .. }))
            .count()
    }
}

impl AlertChecker {
    pub fn new(
        readings: Arc<dyn ReadingStore>,
        preferences: Arc<dyn PreferenceStore>,
        sink: Arc<dyn NotificationSink>,
        config: PassConfig,
    ) -> Self {
        let dispatcher = AlertDispatcher::new(sink, config.details_url.clone());
        Self {
            readings,
            preferences,
            dispatcher,
            config,
        }
    }

    pub fn config(&self) -> &PassConfig {
        &self.config
    }

    /// Evaluate every location as of `now` and dispatch the resulting alerts.
    ///
    /// Store failures for a single location are logged and that location is
    /// treated as having no data. Only a failure to load preferences aborts
    /// the pass.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> Result<PassReport, PassError> {
        tracing::info!(now = %now.to_rfc3339(), "Alert pass starting");

        let result = self.run_locations(now).await;

        match &result {
            Ok(report) => tracing::info!(
                locations = report.evaluations.len(),
                alerts = report.dispatched.len(),
                sent = report.sent(),
                failed = report.failed(),
                "Alert pass finished"
            ),
            Err(e) => tracing::error!(error = %e, "Alert pass aborted"),
        }

        result
    }

    async fn run_locations(&self, now: DateTime<Utc>) -> Result<PassReport, PassError> {
        let preferences = self
            .preferences
            .load_preferences()
            .await
            .map_err(PassError::Preferences)?;
        let contexts = build_contexts(&preferences, &self.config.pump_locations);

        let mut report = PassReport {
            started_at: now,
            evaluations: Vec::with_capacity(contexts.len()),
            dispatched: Vec::new(),
        };

        for context in contexts {
            let result = self.evaluate_location(&context, now).await;
            let records = self.dispatcher.dispatch(&context, &result, now).await;
            report.dispatched.extend(records);
            report.evaluations.push(LocationEvaluation { context, result });
        }

        Ok(report)
    }

    /// Send a single synthetic alert of `kind` for a configured location
    pub async fn send_test_alert(
        &self,
        location: &str,
        kind: AlertKind,
        now: DateTime<Utc>,
    ) -> Result<DispatchRecord, PassError> {
        let preferences = self
            .preferences
            .load_preferences()
            .await
            .map_err(PassError::Preferences)?;
        let ctx = build_contexts(&preferences, &self.config.pump_locations)
            .into_iter()
            .find(|c| c.location == location)
            .ok_or_else(|| PassError::UnknownLocation(location.to_string()))?;

        Ok(self.dispatcher.send_test_alert(&ctx, kind, now).await)
    }

    /// Threshold and liveness for one location
    pub async fn evaluate_location(
        &self,
        ctx: &LocationContext,
        now: DateTime<Utc>,
    ) -> EvaluationResult {
        let store = self.readings.as_ref();

        let outcome = threshold::evaluate(
            store,
            ctx,
            now,
            self.config.pump_window,
            self.config.temperature_window,
        )
        .await
        .unwrap_or_else(|e| {
            tracing::error!(
                location = %ctx.location,
                class = %ctx.class,
                error = %e,
                "Threshold query failed"
            );
            ThresholdOutcome::no_data()
        });

        let is_live = liveness::is_live(store, ctx, now)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(location = %ctx.location, error = %e, "Liveness query failed");
                false
            });

        tracing::debug!(
            location = %ctx.location,
            exceedance = outcome.has_exceedance,
            is_live,
            "Location evaluated"
        );

        EvaluationResult::new(outcome, is_live)
    }
}

/// One context per distinct location, in preference order.
///
/// A repeated location replaces the earlier entry in place.
pub fn build_contexts(
    preferences: &[AlertPreference],
    pump_locations: &[String],
) -> Vec<LocationContext> {
    let mut contexts: Vec<LocationContext> = Vec::with_capacity(preferences.len());

    for pref in preferences {
        let ctx = LocationContext::new(pref, pump_locations);
        match contexts.iter_mut().find(|c| c.location == ctx.location) {
            Some(existing) => {
                tracing::warn!(location = %ctx.location, "Duplicate alert preference, using the later one");
                *existing = ctx;
            }
            None => contexts.push(ctx),
        }
    }

    contexts
}

/// Errors that abort a pass
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error("Failed to load alert preferences: {0}")]
    Preferences(StorageError),

    #[error("No alert preference for location {0:?}")]
    UnknownLocation(String),
}
