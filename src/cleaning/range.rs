//! Numeric and geographic bounds.
//!
//! A row failing several checks is attributed to the first one, in this order:
//!
//! | Dataset | Check                         | Reason                    |
//! |---------|-------------------------------|---------------------------|
//! | trips   | unlock timestamp unparsable   | `invalid_unlock`          |
//! | trips   | lock timestamp unparsable     | `invalid_lock`            |
//! | trips   | lock <= unlock                | `lock_not_after_unlock`   |
//! | trips   | duration <= 0 or > max        | `invalid_duration`        |
//! | trips   | distance missing or out of range | `invalid_distance`     |
//! | trips   | cost negative                 | `invalid_cost`            |
//! | gps     | timestamp unparsable          | `invalid_coord_timestamp` |
//! | gps     | lat/lon missing or outside box| `invalid_gps`             |

use chrono::NaiveDateTime;

use crate::config::PipelineConfig;
use crate::records::{RowFlag, TimedGpsPoint, TimedTrip, TimestampField, ValidGpsPoint, ValidTrip};
use crate::report::{DatasetLedger, RemovalReason};

struct TripValues {
    unlock: NaiveDateTime,
    lock: NaiveDateTime,
    duration_minutes: f64,
    distance_km: f64,
}

fn check_trip(row: &TimedTrip, config: &PipelineConfig) -> Result<TripValues, RemovalReason> {
    match row.flag {
        Some(RowFlag::InvalidTimestamp(TimestampField::Unlock)) => {
            return Err(RemovalReason::InvalidUnlock);
        }
        Some(RowFlag::InvalidTimestamp(_)) => return Err(RemovalReason::InvalidLock),
        None => {}
    }
    let unlock = row.unlock_timestamp.ok_or(RemovalReason::InvalidUnlock)?;
    let lock = row.lock_timestamp.ok_or(RemovalReason::InvalidLock)?;

    if lock <= unlock {
        return Err(RemovalReason::LockNotAfterUnlock);
    }

    let duration_minutes = (lock - unlock).num_seconds() as f64 / 60.0;
    if duration_minutes <= 0.0 || duration_minutes > config.max_duration_minutes {
        return Err(RemovalReason::InvalidDuration);
    }

    let distance_km = match row.record.distance_km {
        Some(d) if d >= config.min_distance_km && d <= config.max_distance_km => d,
        _ => return Err(RemovalReason::InvalidDistance),
    };

    if row.record.cost.is_some_and(|c| c < 0.0) {
        return Err(RemovalReason::InvalidCost);
    }

    Ok(TripValues {
        unlock,
        lock,
        duration_minutes,
        distance_km,
    })
}

/// Drops trips failing any range check and computes `duration_minutes` for
/// the survivors.
#[tracing::instrument(skip_all, fields(rows = rows.len()))]
pub fn validate_trips(
    rows: Vec<TimedTrip>,
    config: &PipelineConfig,
    ledger: &mut DatasetLedger,
) -> Vec<ValidTrip> {
    let mut kept = Vec::with_capacity(rows.len());
    for row in rows {
        match check_trip(&row, config) {
            Ok(v) => kept.push(ValidTrip {
                record: row.record,
                unlock_timestamp: v.unlock,
                lock_timestamp: v.lock,
                duration_minutes: v.duration_minutes,
                distance_km: v.distance_km,
            }),
            Err(reason) => ledger.record(reason, &row.record.trip_id),
        }
    }

    ledger.log_removals(
        "range",
        &[
            RemovalReason::InvalidUnlock,
            RemovalReason::InvalidLock,
            RemovalReason::LockNotAfterUnlock,
            RemovalReason::InvalidDuration,
            RemovalReason::InvalidDistance,
            RemovalReason::InvalidCost,
        ],
    );
    kept
}

fn check_gps_point(
    row: &TimedGpsPoint,
    config: &PipelineConfig,
) -> Result<(NaiveDateTime, f64, f64), RemovalReason> {
    let recorded = match (row.flag, row.recorded_timestamp) {
        (None, Some(ts)) => ts,
        _ => return Err(RemovalReason::InvalidCoordTimestamp),
    };

    match (row.record.latitude, row.record.longitude) {
        (Some(lat), Some(lon)) if config.bounding_box.contains(lat, lon) => Ok((recorded, lat, lon)),
        _ => Err(RemovalReason::InvalidGps),
    }
}

/// Drops GPS points with a bad timestamp or coordinates outside the box.
#[tracing::instrument(skip_all, fields(rows = rows.len()))]
pub fn validate_gps_points(
    rows: Vec<TimedGpsPoint>,
    config: &PipelineConfig,
    ledger: &mut DatasetLedger,
) -> Vec<ValidGpsPoint> {
    let mut kept = Vec::with_capacity(rows.len());
    for row in rows {
        match check_gps_point(&row, config) {
            Ok((recorded_timestamp, latitude, longitude)) => kept.push(ValidGpsPoint {
                record: row.record,
                recorded_timestamp,
                latitude,
                longitude,
            }),
            Err(reason) => ledger.record(reason, &row.record.trip_id),
        }
    }

    ledger.log_removals(
        "range",
        &[RemovalReason::InvalidCoordTimestamp, RemovalReason::InvalidGps],
    );
    kept
}
