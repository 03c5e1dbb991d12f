//! One-shot alert evaluation pass
//!
//! Evaluates every location's alert preference once and exits; run it from
//! cron or a systemd timer.
//!
//! Environment variables (a `.env` file in the working directory is also read):
//! - GOHOME_DB_URL: Sensor readings database (required)
//! - HOMEIOTA_DB_URL: Users and alert preferences database (default: GOHOME_DB_URL)
//! - GOTIFY_URL: Gotify server; notifications are only logged when unset
//! - GOTIFY_TIMEOUT_SECS: Notification request timeout (default: 10)
//! - HOMEIOTA_URL: Dashboard link appended to notifications
//! - PUMP_WINDOW_MINUTES / TEMPERATURE_WINDOW_MINUTES: Lookback windows (default: 120)
//! - PUMP_LOCATIONS: Comma-separated pump locations (default: wellpump)
//!
//! `alert_pass --test-alert <offline|temperature|pump> <location>` sends one
//! synthetic alert of that kind to the location's token instead of running a
//! pass.

use std::sync::Arc;

use homewatch::alerts::{
    AlertChecker, AlertKind, AlertServiceConfig, GotifyNotifier, LogNotifier, NotificationSink,
};
use homewatch::config::load_dotenv;
use homewatch::storage::{connect, PgPreferenceStore, PgStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const POOL_CONNECTIONS: u32 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "homewatch=info,alert_pass=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let test_alert = parse_test_alert(std::env::args().skip(1))?;
    let config = AlertServiceConfig::from_env()?;

    let sink: Arc<dyn NotificationSink> = match &config.gotify_url {
        Some(url) => Arc::new(GotifyNotifier::new(url.as_str(), config.notify_timeout)?),
        None => {
            tracing::warn!("GOTIFY_URL not set, alerts will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let readings_pool = connect(&config.readings_db_url, POOL_CONNECTIONS).await?;
    let preferences_pool = if config.preferences_db_url == config.readings_db_url {
        readings_pool.clone()
    } else {
        connect(&config.preferences_db_url, POOL_CONNECTIONS).await?
    };

    let checker = AlertChecker::new(
        Arc::new(PgStore::new(readings_pool)),
        Arc::new(PgPreferenceStore::new(preferences_pool)),
        sink,
        config.pass,
    );

    if let Some((kind, location)) = test_alert {
        let record = checker
            .send_test_alert(&location, kind, chrono::Utc::now())
            .await?;
        tracing::info!(outcome = ?record.outcome, "Test alert: {}", record.summary());
        return Ok(());
    }

    let report = checker.run_pass(chrono::Utc::now()).await?;

    for record in &report.dispatched {
        tracing::debug!(
            location = %record.location,
            kind = %record.kind,
            outcome = ?record.outcome,
            "Dispatch record"
        );
    }

    Ok(())
}

/// `--test-alert <kind> <location>`, if present
fn parse_test_alert(
    mut args: impl Iterator<Item = String>,
) -> Result<Option<(AlertKind, String)>, Box<dyn std::error::Error>> {
    match args.next().as_deref() {
        None => Ok(None),
        Some("--test-alert") => {
            let kind: AlertKind = args
                .next()
                .ok_or("--test-alert needs an alert kind")?
                .parse()?;
            let location = args.next().ok_or("--test-alert needs a location")?;
            Ok(Some((kind, location)))
        }
        Some(other) => Err(format!("Unknown argument {:?}", other).into()),
    }
}
