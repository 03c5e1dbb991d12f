//! Offline detection

use chrono::{DateTime, Utc};

use crate::data::{LocationClass, LocationContext};
use crate::storage::{ReadingStore, StorageError};

/// Liveness reported for a location without an offline threshold.
///
/// Without a window there is nothing to check against, so the location is
/// reported as not live and receives offline alerts while enabled.
pub const LIVENESS_WHEN_UNCONFIGURED: bool = false;

/// Start of the offline window, or `None` when no usable threshold is set.
///
/// Thresholds that are not finite, or whose window falls outside the
/// representable date range, are unusable.
pub fn offline_cutoff(
    offline_threshold_minutes: Option<f64>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let minutes = offline_threshold_minutes.filter(|m| m.is_finite())?;
    let millis = (minutes * 60_000.0).round();
    if millis.abs() >= i64::MAX as f64 {
        return None;
    }
    let window = chrono::Duration::try_milliseconds(millis as i64)?;
    now.checked_sub_signed(window)
}

/// Whether the location produced a signal strictly after its cutoff.
///
/// Pump locations count pump heartbeats; every other location counts its
/// own temperature readings.
pub async fn is_live(
    store: &dyn ReadingStore,
    ctx: &LocationContext,
    now: DateTime<Utc>,
) -> Result<bool, StorageError> {
    let Some(cutoff) = offline_cutoff(ctx.offline_threshold_minutes, now) else {
        if let Some(minutes) = ctx.offline_threshold_minutes {
            tracing::warn!(
                location = %ctx.location,
                offline_threshold_minutes = minutes,
                "Unusable offline threshold, treating as unconfigured"
            );
        }
        return Ok(LIVENESS_WHEN_UNCONFIGURED);
    };

    let count = match ctx.class {
        LocationClass::Pump => store.count_pump_heartbeats(cutoff).await?,
        LocationClass::Temperature => store.count_temperatures(&ctx.location, cutoff).await?,
    };

    Ok(count >= 1)
}
