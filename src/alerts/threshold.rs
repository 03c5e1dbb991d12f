//! Threshold evaluation for pump and temperature locations

use chrono::{DateTime, Utc};

use super::evaluation::ThresholdOutcome;
use crate::data::{LocationClass, LocationContext, PumpRunTime, Sample};
use crate::storage::{ReadingStore, StorageError};

/// Current at or below this means the pump is off rather than faulting
pub const PUMP_OFF_CURRENT_AMPS: f64 = 1.0;

/// Run the evaluator matching the location's class
pub async fn evaluate(
    store: &dyn ReadingStore,
    ctx: &LocationContext,
    now: DateTime<Utc>,
    pump_window: chrono::Duration,
    temperature_window: chrono::Duration,
) -> Result<ThresholdOutcome, StorageError> {
    match ctx.class {
        LocationClass::Pump => evaluate_pump(store, ctx, now, pump_window).await,
        LocationClass::Temperature => {
            evaluate_temperature(store, ctx, now, temperature_window).await
        }
    }
}

/// A pump that runs but draws less than its threshold signals a low or dry
/// well. Any qualifying run inside the window triggers.
pub async fn evaluate_pump(
    store: &dyn ReadingStore,
    ctx: &LocationContext,
    now: DateTime<Utc>,
    window: chrono::Duration,
) -> Result<ThresholdOutcome, StorageError> {
    let runs = store.pump_runs_since(now - window).await?;
    let qualifying = qualifying_pump_runs(&runs, ctx.threshold);

    tracing::debug!(
        location = %ctx.location,
        samples = runs.len(),
        qualifying = qualifying.len(),
        "Pump window evaluated"
    );

    Ok(ThresholdOutcome {
        has_exceedance: !qualifying.is_empty(),
        exceedance: qualifying.last().map(|run| Sample::from(*run)),
        latest: None,
        sustained_for: None,
        qualifying_rows: qualifying.len(),
    })
}

/// Runs (oldest first) that, together with their immediate predecessor,
/// lie strictly inside the fault band `(PUMP_OFF_CURRENT_AMPS, threshold)`
/// and differ from it in both value and timestamp.
///
/// The first run of the window has no predecessor and never qualifies.
/// Repeated identical readings are treated as a stuck sensor.
pub fn qualifying_pump_runs(runs: &[PumpRunTime], threshold: f64) -> Vec<&PumpRunTime> {
    let in_band = |current: f64| current > PUMP_OFF_CURRENT_AMPS && current < threshold;

    runs.windows(2)
        .filter_map(|pair| {
            let (prev, cur) = (&pair[0], &pair[1]);
            let qualifies = in_band(cur.current)
                && in_band(prev.current)
                && cur.current != prev.current
                && cur.timestamp != prev.timestamp;
            qualifies.then_some(cur)
        })
        .collect()
}

/// A temperature location alerts only while it is still above threshold:
/// both the newest reading over threshold and the newest reading overall
/// must exceed it.
pub async fn evaluate_temperature(
    store: &dyn ReadingStore,
    ctx: &LocationContext,
    now: DateTime<Utc>,
    window: chrono::Duration,
) -> Result<ThresholdOutcome, StorageError> {
    let since = now - window;
    let exceedance = store
        .latest_temperature(&ctx.location, since, Some(ctx.threshold))
        .await?;
    let latest = store.latest_temperature(&ctx.location, since, None).await?;

    Ok(temperature_outcome(
        exceedance.as_ref().map(Sample::from),
        latest.as_ref().map(Sample::from),
        ctx.threshold,
    ))
}

/// Combine the two temperature candidates into an outcome
pub fn temperature_outcome(
    exceedance: Option<Sample>,
    latest: Option<Sample>,
    threshold: f64,
) -> ThresholdOutcome {
    let above = |sample: Option<Sample>| sample.map_or(false, |s| s.value > threshold);

    let sustained_for = match (exceedance, latest) {
        (Some(e), Some(l)) => Some(l.timestamp - e.timestamp),
        _ => None,
    };

    ThresholdOutcome {
        has_exceedance: above(exceedance) && above(latest),
        exceedance,
        latest,
        sustained_for,
        qualifying_rows: 0,
    }
}
