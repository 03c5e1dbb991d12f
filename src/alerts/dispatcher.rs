//! Alert selection, formatting and delivery

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::config::AlertKind;
use super::evaluation::EvaluationResult;
use super::notifier::{DeliveryStatus, Notification, NotificationSink};
use super::threshold::PUMP_OFF_CURRENT_AMPS;
use crate::data::{LocationClass, LocationContext, Sample};

/// What happened to one alert
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Sent { delivery: DeliveryStatus },
    /// The location has no notification token; nothing was sent
    SkippedNoToken,
    Failed { error: String },
}

/// Log entry for one (location, kind) alert in a pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchRecord {
    pub at: DateTime<Utc>,
    pub location: String,
    pub kind: AlertKind,
    /// Value the alert was raised on, if any
    pub value: Option<f64>,
    pub notification: Notification,
    pub outcome: DispatchOutcome,
}

impl DispatchRecord {
    /// Short human-readable line, e.g. `Pump Alert: wellpump: 4.10`
    pub fn summary(&self) -> String {
        match self.value {
            Some(value) => format!("{}: {}: {:.2}", self.kind, self.location, value),
            None => format!("{}: {}", self.kind, self.location),
        }
    }
}

/// Turns evaluation results into notifications
pub struct AlertDispatcher {
    sink: Arc<dyn NotificationSink>,
    details_url: String,
}

impl AlertDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>, details_url: impl Into<String>) -> Self {
        Self {
            sink,
            details_url: details_url.into(),
        }
    }

    /// Alerts due for a location, at most one per kind, in dispatch order.
    /// Disabled locations never produce alerts.
    pub fn pending_alerts(
        &self,
        ctx: &LocationContext,
        result: &EvaluationResult,
    ) -> Vec<(AlertKind, Notification, Option<f64>)> {
        if !ctx.enabled {
            return Vec::new();
        }

        AlertKind::ALL
            .iter()
            .filter_map(|kind| match kind {
                AlertKind::Offline if !result.is_live => {
                    Some((*kind, self.offline_notification(ctx), None))
                }
                AlertKind::Temperature
                    if ctx.class == LocationClass::Temperature && result.has_exceedance() =>
                {
                    result.threshold.latest.map(|latest| {
                        let n = self.temperature_notification(ctx, latest, result.sustained_for());
                        (*kind, n, Some(latest.value))
                    })
                }
                AlertKind::Pump if ctx.class == LocationClass::Pump && result.has_exceedance() => {
                    result
                        .threshold
                        .exceedance
                        .map(|sample| (*kind, self.pump_notification(ctx, sample), Some(sample.value)))
                }
                _ => None,
            })
            .collect()
    }

    /// Send every pending alert for a location.
    ///
    /// Delivery failures are logged and reported in the returned records;
    /// they never stop the remaining alerts.
    pub async fn dispatch(
        &self,
        ctx: &LocationContext,
        result: &EvaluationResult,
        now: DateTime<Utc>,
    ) -> Vec<DispatchRecord> {
        let mut records = Vec::new();

        for (kind, notification, value) in self.pending_alerts(ctx, result) {
            records.push(self.deliver(ctx, kind, notification, value, now).await);
        }

        records
    }

    /// Send one alert of `kind` for a location built from a synthetic
    /// reading, regardless of its data or enabled flag. Used to check that
    /// notifications reach the operator.
    pub async fn send_test_alert(
        &self,
        ctx: &LocationContext,
        kind: AlertKind,
        now: DateTime<Utc>,
    ) -> DispatchRecord {
        let (notification, value) = match kind {
            AlertKind::Offline => (self.offline_notification(ctx), None),
            AlertKind::Temperature => {
                let sample = Sample::new(ctx.threshold + 5.0, now);
                let notification =
                    self.temperature_notification(ctx, sample, Some(chrono::Duration::zero()));
                (notification, Some(sample.value))
            }
            AlertKind::Pump => {
                // Middle of the fault band
                let sample = Sample::new((ctx.threshold + PUMP_OFF_CURRENT_AMPS) / 2.0, now);
                (self.pump_notification(ctx, sample), Some(sample.value))
            }
        };

        self.deliver(ctx, kind, notification, value, now).await
    }

    async fn deliver(
        &self,
        ctx: &LocationContext,
        kind: AlertKind,
        notification: Notification,
        value: Option<f64>,
        now: DateTime<Utc>,
    ) -> DispatchRecord {
        let outcome = match ctx.token() {
            None => DispatchOutcome::SkippedNoToken,
            Some(_) => match self.sink.notify(&notification).await {
                Ok(delivery) => DispatchOutcome::Sent { delivery },
                Err(e) => DispatchOutcome::Failed {
                    error: e.to_string(),
                },
            },
        };

        let record = DispatchRecord {
            at: now,
            location: ctx.location.clone(),
            kind,
            value,
            notification,
            outcome,
        };
        log_record(&record);
        record
    }

    fn offline_notification(&self, ctx: &LocationContext) -> Notification {
        let body = format!(
            "No heartbeat/reading for '{}' in the last offline threshold window. \
             Device may be offline.",
            ctx.location
        );
        self.notification(
            ctx,
            AlertKind::Offline,
            format!("{}: {}", AlertKind::Offline, ctx.location),
            body,
        )
    }

    fn temperature_notification(
        &self,
        ctx: &LocationContext,
        latest: Sample,
        sustained_for: Option<chrono::Duration>,
    ) -> Notification {
        let title = format!(
            "{}: {} at {:.2}°F",
            AlertKind::Temperature,
            ctx.location,
            latest.value
        );
        let body = format!(
            "Temperature for '{}' is {:.2}°F at {}, above the threshold of {:.2}°F.\n\
             Sustained duration: {}.",
            ctx.location,
            latest.value,
            format_timestamp(latest.timestamp),
            ctx.threshold,
            format_sustained(sustained_for),
        );
        self.notification(ctx, AlertKind::Temperature, title, body)
    }

    fn pump_notification(&self, ctx: &LocationContext, sample: Sample) -> Notification {
        let body = format!(
            "Well may be low or dry. '{}' is running at {:.2} Amps at {}.",
            ctx.location,
            sample.value,
            format_timestamp(sample.timestamp)
        );
        self.notification(
            ctx,
            AlertKind::Pump,
            format!("{}: {}", AlertKind::Pump, ctx.location),
            body,
        )
    }

    fn notification(
        &self,
        ctx: &LocationContext,
        kind: AlertKind,
        title: String,
        body: String,
    ) -> Notification {
        let body = if self.details_url.is_empty() {
            body
        } else {
            format!("{}\n\nView details: {}", body, self.details_url)
        };

        Notification {
            token: ctx.token().unwrap_or_default().to_string(),
            title,
            body,
            priority: kind.priority(),
        }
    }
}

fn log_record(record: &DispatchRecord) {
    let at = format_timestamp(record.at);
    match &record.outcome {
        DispatchOutcome::Sent { .. } => {
            tracing::info!(location = %record.location, "{} Sent alert: {}", at, record.summary());
        }
        DispatchOutcome::SkippedNoToken => {
            tracing::info!(
                location = %record.location,
                "{} No notification token, skipping alert: {}",
                at,
                record.summary()
            );
        }
        DispatchOutcome::Failed { error } => {
            tracing::error!(
                location = %record.location,
                error = %error,
                "{} Failed to send alert: {}",
                at,
                record.summary()
            );
        }
    }
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Render a sustained-exceedance duration in whole minutes
pub fn format_sustained(duration: Option<chrono::Duration>) -> String {
    match duration.map(|d| d.num_minutes()) {
        None => "unavailable".to_string(),
        Some(1) => "1 minute".to_string(),
        Some(minutes) => format!("{} minutes", minutes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::evaluation::ThresholdOutcome;
    use crate::alerts::notifier::MemoryNotifier;
    use crate::data::AlertPreference;
    use chrono::{Duration, TimeZone};

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, minute, 0).unwrap()
    }

    fn ctx(pref: AlertPreference) -> LocationContext {
        LocationContext::new(&pref, &["wellpump".to_string()])
    }

    fn dispatcher(sink: Arc<MemoryNotifier>) -> AlertDispatcher {
        AlertDispatcher::new(sink, "https://home.example")
    }

    fn pump_result(current: f64, timestamp: DateTime<Utc>, is_live: bool) -> EvaluationResult {
        EvaluationResult::new(
            ThresholdOutcome {
                has_exceedance: true,
                exceedance: Some(Sample::new(current, timestamp)),
                qualifying_rows: 1,
                ..ThresholdOutcome::no_data()
            },
            is_live,
        )
    }

    #[test]
    fn test_format_sustained() {
        assert_eq!(format_sustained(None), "unavailable");
        assert_eq!(format_sustained(Some(Duration::zero())), "0 minutes");
        assert_eq!(format_sustained(Some(Duration::seconds(90))), "1 minute");
        assert_eq!(format_sustained(Some(Duration::minutes(45))), "45 minutes");
    }

    #[test]
    fn test_disabled_location_has_no_alerts() {
        let sink = Arc::new(MemoryNotifier::new());
        let ctx = ctx(AlertPreference::new("wellpump", 5.0).with_enabled(false));
        let result = pump_result(4.1, at(2), false);
        assert!(dispatcher(sink).pending_alerts(&ctx, &result).is_empty());
    }

    #[test]
    fn test_alerts_in_dispatch_order() {
        let sink = Arc::new(MemoryNotifier::new());
        let ctx = ctx(AlertPreference::new("wellpump", 5.0).with_offline_threshold(30.0));
        let result = pump_result(4.1, at(2), false);

        let alerts = dispatcher(sink).pending_alerts(&ctx, &result);
        let kinds: Vec<AlertKind> = alerts.iter().map(|(k, _, _)| *k).collect();
        assert_eq!(kinds, vec![AlertKind::Offline, AlertKind::Pump]);
    }

    #[test]
    fn test_pump_notification_format() {
        let sink = Arc::new(MemoryNotifier::new());
        let ctx = ctx(AlertPreference::new("wellpump", 5.0).with_token("tok"));
        let result = pump_result(4.1, at(2), true);

        let alerts = dispatcher(sink).pending_alerts(&ctx, &result);
        assert_eq!(alerts.len(), 1);
        let (kind, notification, value) = &alerts[0];
        assert_eq!(*kind, AlertKind::Pump);
        assert_eq!(*value, Some(4.1));
        assert_eq!(notification.title, "Pump Alert: wellpump");
        assert_eq!(notification.priority, 7);
        assert_eq!(notification.token, "tok");
        assert!(notification.body.contains("4.10 Amps"));
        assert!(notification.body.contains("2025-06-01T09:02:00Z"));
        assert!(notification.body.ends_with("View details: https://home.example"));
    }

    #[test]
    fn test_temperature_notification_format() {
        let sink = Arc::new(MemoryNotifier::new());
        let ctx = ctx(AlertPreference::new("freezer", 40.0));
        let sample = Sample::new(45.0, at(2));
        let result = EvaluationResult::new(
            ThresholdOutcome {
                has_exceedance: true,
                exceedance: Some(sample),
                latest: Some(sample),
                sustained_for: Some(Duration::zero()),
                qualifying_rows: 0,
            },
            true,
        );

        let alerts = dispatcher(sink).pending_alerts(&ctx, &result);
        assert_eq!(alerts.len(), 1);
        let (kind, notification, _) = &alerts[0];
        assert_eq!(*kind, AlertKind::Temperature);
        assert_eq!(notification.priority, 10);
        assert_eq!(notification.title, "Temperature Alert: freezer at 45.00°F");
        assert!(notification.body.contains("threshold of 40.00°F"));
        assert!(notification.body.contains("Sustained duration: 0 minutes."));
    }

    #[test]
    fn test_offline_notification_format() {
        let sink = Arc::new(MemoryNotifier::new());
        let ctx = ctx(AlertPreference::new("garage", 90.0));
        let result = EvaluationResult::new(ThresholdOutcome::no_data(), false);

        let alerts = AlertDispatcher::new(sink, "").pending_alerts(&ctx, &result);
        assert_eq!(alerts.len(), 1);
        let (kind, notification, value) = &alerts[0];
        assert_eq!(*kind, AlertKind::Offline);
        assert_eq!(*value, None);
        assert_eq!(notification.title, "Device Offline: garage");
        assert_eq!(notification.priority, 7);
        assert!(notification.body.starts_with("No heartbeat/reading for 'garage'"));
        assert!(!notification.body.contains("View details"));
    }

    #[tokio::test]
    async fn test_offline_summary_has_no_value() {
        let sink = Arc::new(MemoryNotifier::new());
        let ctx = ctx(AlertPreference::new("garage", 90.0).with_offline_threshold(30.0));
        let result = EvaluationResult::new(ThresholdOutcome::no_data(), false);

        let records = dispatcher(sink).dispatch(&ctx, &result, at(10)).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, None);
        assert_eq!(records[0].summary(), "Device Offline: garage");
    }

    #[tokio::test]
    async fn test_send_test_alert_each_kind() {
        let sink = Arc::new(MemoryNotifier::new());
        let dispatcher = dispatcher(Arc::clone(&sink));
        // Disabled locations can still be tested
        let freezer = ctx(
            AlertPreference::new("freezer", 40.0)
                .with_token("tok")
                .with_enabled(false),
        );
        let pump = ctx(AlertPreference::new("wellpump", 5.0).with_token("tok"));

        let record = dispatcher
            .send_test_alert(&freezer, AlertKind::Temperature, at(10))
            .await;
        assert_eq!(record.value, Some(45.0));
        assert_eq!(record.notification.title, "Temperature Alert: freezer at 45.00°F");

        let record = dispatcher.send_test_alert(&pump, AlertKind::Pump, at(10)).await;
        assert_eq!(record.value, Some(3.0));
        assert!(record.notification.body.contains("3.00 Amps"));

        let record = dispatcher
            .send_test_alert(&freezer, AlertKind::Offline, at(10))
            .await;
        assert_eq!(record.notification.title, "Device Offline: freezer");

        let titles: Vec<String> = sink.sent().into_iter().map(|n| n.title).collect();
        assert_eq!(
            titles,
            vec![
                "Temperature Alert: freezer at 45.00°F".to_string(),
                "Pump Alert: wellpump".to_string(),
                "Device Offline: freezer".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_token_skips_sink() {
        let sink = Arc::new(MemoryNotifier::new());
        let ctx = ctx(AlertPreference::new("wellpump", 5.0));
        let result = pump_result(4.1, at(2), true);

        let records = dispatcher(Arc::clone(&sink)).dispatch(&ctx, &result, at(10)).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, DispatchOutcome::SkippedNoToken);
        assert_eq!(records[0].summary(), "Pump Alert: wellpump: 4.10");
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_is_recorded() {
        let sink = Arc::new(MemoryNotifier::failing("connection refused"));
        let ctx = ctx(
            AlertPreference::new("wellpump", 5.0)
                .with_token("tok")
                .with_offline_threshold(30.0),
        );
        let result = pump_result(4.1, at(2), false);

        let records = dispatcher(Arc::clone(&sink)).dispatch(&ctx, &result, at(10)).await;
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| matches!(r.outcome, DispatchOutcome::Failed { .. })));
        assert_eq!(sink.sent().len(), 2);
    }
}
