use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use homewatch::alerts::{
    AlertChecker, AlertKind, DispatchOutcome, MemoryNotifier, PassConfig, PassError,
};
use homewatch::data::{
    AlertPreference, NewDeviceHeartbeat, NewPumpRunTime, NewTemperatureReading, PumpRunTime,
    TemperatureReading,
};
use homewatch::storage::{
    MemoryStore, PreferenceStore, ReadingStore, RecordStore, StorageError,
};

fn t(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 14, minute, 0).unwrap()
}

fn now() -> DateTime<Utc> {
    t(45)
}

fn checker(store: Arc<MemoryStore>, sink: Arc<MemoryNotifier>) -> AlertChecker {
    AlertChecker::new(
        store.clone(),
        store,
        sink,
        PassConfig::default().with_details_url("https://home.example/devices"),
    )
}

async fn temperatures(store: &MemoryStore, location: &str, readings: &[(u32, f64)]) {
    for &(minute, value) in readings {
        store
            .insert_temperature(NewTemperatureReading::new(value, location).at(t(minute)))
            .await
            .unwrap();
    }
}

async fn pump_runs(store: &MemoryStore, runs: &[(u32, f64)]) {
    for &(minute, current) in runs {
        store
            .insert_pump_run(NewPumpRunTime::new(30, current).at(t(minute)))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn wellpump_low_current_end_to_end() {
    let store = Arc::new(MemoryStore::with_preferences(vec![AlertPreference::new(
        "wellpump", 5.0,
    )
    .with_token("pump-token")
    .with_offline_threshold(30.0)]));
    pump_runs(&store, &[(1, 3.2), (2, 4.1)]).await;
    store
        .insert_heartbeat(NewDeviceHeartbeat::new("pump").at(t(40)))
        .await
        .unwrap();

    let sink = Arc::new(MemoryNotifier::new());
    let report = checker(store, sink.clone()).run_pass(now()).await.unwrap();

    let eval = report.evaluation("wellpump").unwrap();
    assert!(eval.result.is_live);
    assert_eq!(eval.result.exceedance_value(), Some(4.1));

    let sent = sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "Pump Alert: wellpump");
    assert_eq!(sent[0].token, "pump-token");
    assert_eq!(sent[0].priority, 7);
    assert!(sent[0].body.contains("4.10 Amps"));
    assert!(sent[0].body.contains("2025-06-01T14:02:00Z"));
    assert!(sent[0].body.contains("View details: https://home.example/devices"));
}

#[tokio::test]
async fn temperature_must_still_exceed_at_latest_reading() {
    let store = Arc::new(MemoryStore::with_preferences(vec![
        AlertPreference::new("freezer", 40.0).with_token("tok"),
        AlertPreference::new("fridge", 40.0).with_token("tok"),
    ]));
    // Dropped back below the threshold
    temperatures(&store, "freezer", &[(1, 38.0), (2, 45.0), (3, 39.0)]).await;
    // Latest reading is the exceedance
    temperatures(&store, "fridge", &[(1, 38.0), (2, 45.0)]).await;

    let sink = Arc::new(MemoryNotifier::new());
    let report = checker(store, sink.clone()).run_pass(now()).await.unwrap();

    assert!(!report.evaluation("freezer").unwrap().result.has_exceedance());
    let fridge = &report.evaluation("fridge").unwrap().result;
    assert!(fridge.has_exceedance());
    assert_eq!(fridge.sustained_for(), Some(Duration::zero()));

    let temperature_alerts: Vec<_> = report
        .dispatched
        .iter()
        .filter(|r| r.kind == AlertKind::Temperature)
        .collect();
    assert_eq!(temperature_alerts.len(), 1);
    assert_eq!(temperature_alerts[0].location, "fridge");
    assert!(temperature_alerts[0]
        .notification
        .body
        .contains("Sustained duration: 0 minutes."));
    assert_eq!(temperature_alerts[0].notification.priority, 10);
}

#[tokio::test]
async fn disabled_locations_never_dispatch() {
    let store = Arc::new(MemoryStore::with_preferences(vec![
        AlertPreference::new("freezer", 40.0)
            .with_token("tok")
            .with_enabled(false),
        AlertPreference::new("wellpump", 5.0)
            .with_token("tok")
            .with_enabled(false),
    ]));
    temperatures(&store, "freezer", &[(1, 50.0)]).await;
    pump_runs(&store, &[(1, 3.2), (2, 4.1)]).await;

    let sink = Arc::new(MemoryNotifier::new());
    let report = checker(store, sink.clone()).run_pass(now()).await.unwrap();

    // Still evaluated, never sent
    assert_eq!(report.evaluations.len(), 2);
    assert!(report.evaluation("freezer").unwrap().result.has_exceedance());
    assert!(report.dispatched.is_empty());
    assert!(sink.sent().is_empty());
}

#[tokio::test]
async fn missing_token_skips_delivery() {
    let store = Arc::new(MemoryStore::with_preferences(vec![
        AlertPreference::new("garage", 90.0).with_offline_threshold(15.0),
        AlertPreference::new("attic", 90.0)
            .with_offline_threshold(15.0)
            .with_token("  "),
    ]));

    let sink = Arc::new(MemoryNotifier::new());
    let report = checker(store, sink.clone()).run_pass(now()).await.unwrap();

    assert_eq!(report.dispatched.len(), 2);
    assert!(report
        .dispatched
        .iter()
        .all(|r| r.kind == AlertKind::Offline && r.outcome == DispatchOutcome::SkippedNoToken));
    assert!(sink.sent().is_empty());
}

#[tokio::test]
async fn offline_threshold_controls_liveness() {
    let store = Arc::new(MemoryStore::with_preferences(vec![
        AlertPreference::new("freezer", 40.0)
            .with_token("tok")
            .with_offline_threshold(10.0),
        AlertPreference::new("garage", 90.0).with_token("tok"),
    ]));
    temperatures(&store, "freezer", &[(40, 20.0)]).await;
    temperatures(&store, "garage", &[(44, 60.0)]).await;

    let sink = Arc::new(MemoryNotifier::new());
    let report = checker(store, sink.clone()).run_pass(now()).await.unwrap();

    assert!(report.evaluation("freezer").unwrap().result.is_live);
    // No offline threshold configured
    assert!(!report.evaluation("garage").unwrap().result.is_live);

    let titles: Vec<String> = sink.sent().into_iter().map(|n| n.title).collect();
    assert_eq!(titles, vec!["Device Offline: garage".to_string()]);
}

#[tokio::test]
async fn out_of_range_offline_threshold_does_not_abort_pass() {
    let store = Arc::new(MemoryStore::with_preferences(vec![
        AlertPreference::new("freezer", 40.0)
            .with_token("tok")
            .with_offline_threshold(1e12),
        AlertPreference::new("fridge", 40.0).with_token("tok"),
    ]));
    temperatures(&store, "freezer", &[(40, 20.0)]).await;

    let sink = Arc::new(MemoryNotifier::new());
    let report = checker(store, sink.clone()).run_pass(now()).await.unwrap();

    assert_eq!(report.evaluations.len(), 2);
    assert!(!report.evaluation("freezer").unwrap().result.is_live);

    let titles: Vec<String> = sink.sent().into_iter().map(|n| n.title).collect();
    assert_eq!(
        titles,
        vec![
            "Device Offline: freezer".to_string(),
            "Device Offline: fridge".to_string(),
        ]
    );
}

#[tokio::test]
async fn repeated_pass_is_identical() {
    let store = Arc::new(MemoryStore::with_preferences(vec![
        AlertPreference::new("wellpump", 5.0).with_token("tok"),
        AlertPreference::new("freezer", 40.0)
            .with_token("tok")
            .with_offline_threshold(30.0),
    ]));
    pump_runs(&store, &[(1, 3.2), (2, 4.1), (3, 6.0), (4, 2.2), (5, 3.3)]).await;
    temperatures(&store, "freezer", &[(10, 41.0), (20, 43.5)]).await;

    let sink = Arc::new(MemoryNotifier::new());
    let checker = checker(store, sink.clone());

    let first = checker.run_pass(now()).await.unwrap();
    let first_sent = sink.sent();
    sink.clear();
    let second = checker.run_pass(now()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first_sent, sink.sent());
    assert!(!first.dispatched.is_empty());
}

/// Reading store that fails every query for one location
struct FlakyStore {
    inner: MemoryStore,
    broken_location: &'static str,
}

impl FlakyStore {
    fn check(&self, location: &str) -> Result<(), StorageError> {
        if location == self.broken_location {
            Err(StorageError::Unavailable("connection reset".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ReadingStore for FlakyStore {
    async fn pump_runs_since(&self, since: DateTime<Utc>) -> Result<Vec<PumpRunTime>, StorageError> {
        self.inner.pump_runs_since(since).await
    }

    async fn latest_temperature(
        &self,
        location: &str,
        since: DateTime<Utc>,
        above: Option<f64>,
    ) -> Result<Option<TemperatureReading>, StorageError> {
        self.check(location)?;
        self.inner.latest_temperature(location, since, above).await
    }

    async fn count_pump_heartbeats(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        self.inner.count_pump_heartbeats(cutoff).await
    }

    async fn count_temperatures(
        &self,
        location: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        self.check(location)?;
        self.inner.count_temperatures(location, cutoff).await
    }
}

#[tokio::test]
async fn store_failure_is_isolated_to_its_location() {
    let inner = MemoryStore::new();
    temperatures(&inner, "freezer", &[(30, 50.0)]).await;
    temperatures(&inner, "fridge", &[(30, 50.0)]).await;

    let readings = Arc::new(FlakyStore {
        inner,
        broken_location: "freezer",
    });
    let preferences = Arc::new(MemoryStore::with_preferences(vec![
        AlertPreference::new("freezer", 40.0)
            .with_token("tok")
            .with_offline_threshold(60.0),
        AlertPreference::new("fridge", 40.0)
            .with_token("tok")
            .with_offline_threshold(60.0),
    ]));

    let sink = Arc::new(MemoryNotifier::new());
    let checker = AlertChecker::new(readings, preferences, sink.clone(), PassConfig::default());
    let report = checker.run_pass(now()).await.unwrap();

    let freezer = &report.evaluation("freezer").unwrap().result;
    assert!(!freezer.has_exceedance());
    assert!(!freezer.is_live);

    let fridge = &report.evaluation("fridge").unwrap().result;
    assert!(fridge.has_exceedance());
    assert!(fridge.is_live);

    let titles: Vec<String> = sink.sent().into_iter().map(|n| n.title).collect();
    assert_eq!(
        titles,
        vec![
            "Device Offline: freezer".to_string(),
            "Temperature Alert: fridge at 50.00°F".to_string(),
        ]
    );
}

struct UnreachablePreferences;

#[async_trait]
impl PreferenceStore for UnreachablePreferences {
    async fn load_preferences(&self) -> Result<Vec<AlertPreference>, StorageError> {
        Err(StorageError::Unavailable("dashboard database down".to_string()))
    }
}

#[tokio::test]
async fn preference_failure_is_fatal() {
    let sink = Arc::new(MemoryNotifier::new());
    let checker = AlertChecker::new(
        Arc::new(MemoryStore::new()),
        Arc::new(UnreachablePreferences),
        sink.clone(),
        PassConfig::default(),
    );

    let err = checker.run_pass(now()).await.unwrap_err();
    assert!(matches!(err, PassError::Preferences(StorageError::Unavailable(_))));
    assert!(sink.sent().is_empty());
}
